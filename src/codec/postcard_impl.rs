/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */
use bytes::{Buf, BufMut};

use crate::{Codec, Token};

// A flag variant plus a zigzag varint i64
const MAX_TOKEN_SIZE: usize = 16;

/// PostcardCodec encodes/decodes tokens using [`postcard`].
#[derive(Debug, Clone, Copy)]
pub struct PostcardCodec;

// XXX We can use Buf::chunk here because tokens are tiny and
//     messengers hand us contiguous buffers
impl Codec for PostcardCodec {
    type Error = postcard::Error;

    fn encode_token(&mut self, token: &Token, mut buf: impl BufMut) -> Result<(), Self::Error> {
        let mut scratch = [0u8; MAX_TOKEN_SIZE];
        let encoded = postcard::to_slice(token, &mut scratch)?;
        if buf.remaining_mut() < encoded.len() {
            return Err(postcard::Error::SerializeBufferFull);
        }
        buf.put_slice(encoded);
        Ok(())
    }

    fn decode_token(&mut self, mut buf: impl Buf) -> Result<Token, Self::Error> {
        let remaining = buf.remaining();
        debug_assert_eq!(remaining, buf.chunk().len());
        let (token, rest) = postcard::take_from_bytes(buf.chunk())?;
        let after = rest.len();
        buf.advance(remaining - after);
        Ok(token)
    }
}

#[cfg(test)]
mod test {
    use super::PostcardCodec;

    #[test]
    fn postcard_roundtrip() -> Result<(), postcard::Error> {
        crate::testing::verify_codec_roundtrip(PostcardCodec)
    }

    #[test]
    fn terminal_token_count_is_discarded() -> Result<(), postcard::Error> {
        // Variant index 2, then 5 zigzag-encoded
        crate::testing::verify_terminal_count_is_discarded(PostcardCodec, &[2, 10])
    }
}
