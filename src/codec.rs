/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */
use core::fmt;

use bytes::{Buf, BufMut};

use crate::Token;

#[cfg(feature = "bincode-codec")]
pub(crate) mod bincode_impl;

#[cfg(feature = "postcard-codec")]
pub(crate) mod postcard_impl;

/// A Codec is responsible for encoding and decoding tokens when a
/// [`crate::TokenMessenger`] moves them across process boundaries.
///
/// Terminators never touch bytes themselves: codecs are meant to be
/// used by messenger implementations backed by sockets, pipes, MPI
/// buffers and the like.
pub trait Codec {
    /// The codec error type.
    type Error: fmt::Debug + fmt::Display + Send + Sync + 'static;

    /// Encodes a [`Token`] into the given buffer.
    ///
    /// Implementations MUST NOT leave the buffer dirty when there's
    /// not enough space to encode the item.
    fn encode_token(&mut self, token: &Token, buf: impl BufMut) -> Result<(), Self::Error>;

    /// Decode a [`Token`] from the given buffer.
    ///
    /// Implementations MUST read a single item from the buffer and
    /// advance the cursor accordingly.
    ///
    /// Implementations may assume the data in the buffer is contiguous.
    fn decode_token(&mut self, buf: impl Buf) -> Result<Token, Self::Error>;
}

impl<C> Codec for &mut C
where
    C: Codec,
{
    type Error = C::Error;

    fn encode_token(&mut self, token: &Token, buf: impl BufMut) -> Result<(), Self::Error> {
        C::encode_token(self, token, buf)
    }

    fn decode_token(&mut self, buf: impl Buf) -> Result<Token, Self::Error> {
        C::decode_token(self, buf)
    }
}
