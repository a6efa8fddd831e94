/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */
use crate::{Codec, Token};

/// `BincodeCodec` encodes/decodes tokens using [`bincode`].
///
/// This struct simply wraps a [`bincode::config::Config`] type:
///
/// ~~~rust
/// let codec =
///     safra::BincodeCodec(bincode::config::standard());
/// ~~~
#[derive(Debug, Clone, Copy)]
pub struct BincodeCodec<O: bincode::config::Config>(pub O);

/// `Error` wraps [`bincode::error`] error enums
#[derive(Debug)]
pub enum Error {
    /// See [`bincode::error::EncodeError`]
    Encode(bincode::error::EncodeError),
    /// See [`bincode::error::DecodeError`]
    Decode(bincode::error::DecodeError),
}

impl core::fmt::Display for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl std::error::Error for Error {}

impl<O> Codec for BincodeCodec<O>
where
    O: bincode::config::Config + Copy,
{
    type Error = Error;

    fn encode_token(&mut self, token: &Token, buf: impl bytes::BufMut) -> Result<(), Self::Error> {
        // Encoded up-front so that a short buffer is left untouched
        let encoded = bincode::serde::encode_to_vec(token, self.0).map_err(Error::Encode)?;
        let mut buf = buf;
        if buf.remaining_mut() < encoded.len() {
            return Err(Error::Encode(bincode::error::EncodeError::UnexpectedEnd));
        }
        buf.put_slice(&encoded);
        Ok(())
    }

    fn decode_token(&mut self, buf: impl bytes::Buf) -> Result<Token, Self::Error> {
        let mut reader = buf.reader();
        bincode::serde::decode_from_std_read(&mut reader, self.0).map_err(Error::Decode)
    }
}
