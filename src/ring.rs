/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */
use core::fmt;

use crate::{Error, Result, Token, TokenMessenger};

/// A Ring describes the position of a process within a fixed ring of
/// `size` processes identified by consecutive ids `0..size`.
///
/// The process with id `0` is the master. Every other process is a
/// slave.
///
/// This is suitable for MPI-like systems where processes already
/// know their rank and the total process count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Ring {
    id: usize,
    size: usize,
}

impl Ring {
    /// Position process `id` in a ring of `size` processes.
    ///
    /// Fails with [`Error::InvalidRing`] if the ring is empty or if
    /// `id` is not smaller than `size`.
    pub fn new(id: usize, size: usize) -> Result<Self> {
        if size == 0 || id >= size {
            Err(Error::InvalidRing { id, size })
        } else {
            Ok(Self { id, size })
        }
    }

    /// Id of the process at this position.
    pub const fn id(&self) -> usize {
        self.id
    }

    /// Total number of processes participating in the ring.
    pub const fn size(&self) -> usize {
        self.size
    }

    /// Id of the process tokens are sent to.
    pub const fn successor(&self) -> usize {
        (self.id + 1) % self.size
    }

    /// Id of the process tokens are received from.
    pub const fn predecessor(&self) -> usize {
        (self.id + self.size - 1) % self.size
    }

    /// Whether this position belongs to the master.
    pub const fn is_master(&self) -> bool {
        self.id == 0
    }

    /// Iterate over every position of a ring with `size` processes.
    pub fn positions(size: usize) -> impl ExactSizeIterator<Item = Ring> {
        (0..size).map(move |id| Ring { id, size })
    }
}

/// A Transport moves tokens between processes addressed by their
/// ring id.
///
/// It's the id-addressed half of a [`TokenMessenger`]: wrap it in a
/// [`RingMessenger`] and the ring topology gets taken care of.
///
/// The same delivery guarantees apply: no loss, no reordering
/// between any pair of processes, and non-blocking sends.
pub trait Transport {
    /// The transport error type.
    type Error: fmt::Debug + fmt::Display + Send + Sync + 'static;

    /// Send `token` to process `dst` without blocking.
    fn send_to(&self, dst: usize, token: Token) -> core::result::Result<(), Self::Error>;

    /// Block until a token from process `src` is available.
    fn receive_from(&self, src: usize) -> core::result::Result<Token, Self::Error>;
}

/// A [`TokenMessenger`] that routes tokens through a [`Transport`]
/// according to a [`Ring`] position.
#[derive(Debug, Clone)]
pub struct RingMessenger<T> {
    ring: Ring,
    transport: T,
}

impl<T: Transport> RingMessenger<T> {
    /// Create a messenger for the process at position `ring`.
    pub fn new(ring: Ring, transport: T) -> Self {
        Self { ring, transport }
    }

    /// Getter for this messenger's position.
    pub fn ring(&self) -> &Ring {
        &self.ring
    }

    /// Getter for the underlying transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }
}

impl<T: Transport> TokenMessenger for RingMessenger<T> {
    type Error = T::Error;

    fn send_to_next_async(&self, token: Token) -> core::result::Result<(), Self::Error> {
        self.transport.send_to(self.ring.successor(), token)
    }

    fn receive_from_previous(&self) -> core::result::Result<Token, Self::Error> {
        self.transport.receive_from(self.ring.predecessor())
    }

    fn is_master(&self) -> bool {
        self.ring.is_master()
    }
}
