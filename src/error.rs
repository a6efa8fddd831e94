/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */
use core::fmt;

use crate::Token;

#[derive(Debug)]
/// This type represents all possible errors operating a
/// [`crate::Terminator`].
///
/// Apart from [`Error::Messenger`], every variant signals a usage
/// bug: terminators never retry nor recover from them.
pub enum Error {
    /// Attempt to use a terminator after
    /// [`crate::Terminator::wait_for_termination`] returned.
    ///
    /// Terminators are single-use: create a new one for every
    /// detection round (see [`crate::Factory`]).
    AlreadyFinalized,

    /// Called [`crate::Terminator::set_done`] or
    /// [`crate::Terminator::message_sent`] while idle.
    ///
    /// Doesn't affect the terminator's state.
    NotWorking,

    /// Called [`crate::Terminator::wait_for_termination`] while
    /// another thread is already running the termination loop.
    ///
    /// Doesn't affect the terminator's state.
    AlreadyWaiting,

    /// The master received a token without having a probe in
    /// flight. The messenger duplicated or invented a token.
    ///
    /// Must not happen under normal circumstances. The terminator
    /// is finalized and must be discarded.
    UnexpectedToken(Token),

    /// Tried to build a [`crate::Ring`] with an empty ring or with
    /// a process id outside of it.
    InvalidRing {
        /// The requested process id
        id: usize,
        /// The requested amount of processes
        size: usize,
    },

    /// Wraps [`crate::TokenMessenger`] failures.
    ///
    /// When raised by the termination loop the terminator is
    /// finalized: the ring can't be trusted anymore.
    Messenger(anyhow::Error),
}

impl PartialEq for Error {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            // Wrapped errors have to allocate to compare
            (Error::Messenger(a), Error::Messenger(b)) => a.to_string().eq(&b.to_string()),

            (Error::AlreadyFinalized, Error::AlreadyFinalized) => true,
            (Error::NotWorking, Error::NotWorking) => true,
            (Error::AlreadyWaiting, Error::AlreadyWaiting) => true,
            (Error::UnexpectedToken(a), Error::UnexpectedToken(b)) => a == b,
            (
                Error::InvalidRing { id, size },
                Error::InvalidRing {
                    id: other_id,
                    size: other_size,
                },
            ) => id == other_id && size == other_size,

            // Explicitly enumerated so that adding a variant
            // fails to compile here
            (Error::Messenger(_), _) => false,
            (Error::AlreadyFinalized, _) => false,
            (Error::NotWorking, _) => false,
            (Error::AlreadyWaiting, _) => false,
            (Error::UnexpectedToken(_), _) => false,
            (Error::InvalidRing { .. }, _) => false,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::AlreadyFinalized => {
                formatter.write_str("This terminator has been already finalized")
            }
            Error::NotWorking => formatter.write_str("This terminator is not working"),
            Error::AlreadyWaiting => {
                formatter.write_str("Termination loop is already running for this terminator")
            }
            Error::UnexpectedToken(token) => write!(
                formatter,
                "BUG! Master received token {} while not waiting for one",
                token
            ),
            Error::InvalidRing { id, size } => write!(
                formatter,
                "Invalid ring position: id {} in a ring of {} processes",
                id, size
            ),
            Error::Messenger(err) => err.fmt(formatter),
        }
    }
}

impl std::error::Error for Error {}
