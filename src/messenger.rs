/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */
use core::fmt;
use std::sync::Arc;

use crate::Token;

/// A `TokenMessenger` is a terminator's gateway to the rest of the
/// ring: here is where implementations decide how tokens travel
/// between processes.
///
/// It requires a total, fixed ordering of the participating
/// processes so that every process has exactly one successor and one
/// predecessor. See [`crate::RingMessenger`] for an implementation
/// that derives both from a numeric process id.
///
/// Delivery MUST be reliable and order-preserving between every pair
/// of neighbours: the protocol has zero tolerance for lost, reordered
/// or duplicated tokens and does not attempt to detect them.
///
/// A terminator calls into its messenger from whichever thread is
/// driving it (application threads via [`crate::Terminator::set_done`]
/// as well as the thread blocked on
/// [`crate::Terminator::wait_for_termination`]), hence `&self`.
pub trait TokenMessenger {
    /// The messenger error type. Will be wrapped by
    /// [`crate::Error::Messenger`].
    type Error: fmt::Debug + fmt::Display + Send + Sync + 'static;

    /// Send a token to the successor of this process. If this is the
    /// last process in the ordering, the successor is the first one.
    ///
    /// Implementations MUST NOT block: terminators call this while
    /// holding their state lock and a successor may be blocked
    /// sending to us.
    fn send_to_next_async(&self, token: Token) -> Result<(), Self::Error>;

    /// Block until a token arrives from the predecessor of this
    /// process. If this is the first process in the ordering, the
    /// predecessor is the last one.
    fn receive_from_previous(&self) -> Result<Token, Self::Error>;

    /// Whether this process initiates the termination detection.
    ///
    /// Exactly one process of the ring must be the master.
    fn is_master(&self) -> bool;
}

// A reference to a TokenMessenger is a TokenMessenger too
impl<M> TokenMessenger for &M
where
    M: TokenMessenger + ?Sized,
{
    type Error = M::Error;

    fn send_to_next_async(&self, token: Token) -> Result<(), Self::Error> {
        M::send_to_next_async(self, token)
    }

    fn receive_from_previous(&self) -> Result<Token, Self::Error> {
        M::receive_from_previous(self)
    }

    fn is_master(&self) -> bool {
        M::is_master(self)
    }
}

impl<M> TokenMessenger for Arc<M>
where
    M: TokenMessenger + ?Sized,
{
    type Error = M::Error;

    fn send_to_next_async(&self, token: Token) -> Result<(), Self::Error> {
        M::send_to_next_async(self, token)
    }

    fn receive_from_previous(&self) -> Result<Token, Self::Error> {
        M::receive_from_previous(self)
    }

    fn is_master(&self) -> bool {
        M::is_master(self)
    }
}
