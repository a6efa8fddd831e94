/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */
//! An in-process [`Transport`], mostly useful for tests and for
//! running every process of a ring as threads of a single program.
use core::fmt;
use std::{collections::VecDeque, sync::Arc, vec::Vec};

use parking_lot::{Condvar, Mutex};

use crate::{Result, Ring, RingMessenger, Token, Transport};

/// Build a ring of `size` processes living in the same address space.
///
/// Each process owns an unbounded FIFO queue. Sending a token pushes
/// it into the queue of the destination and receiving pops from the
/// process' own queue, so delivery is reliable and ordered.
///
/// The messenger at index `i` belongs to process `i`; index `0` is
/// the master. Fails with [`crate::Error::InvalidRing`] if `size` is
/// zero.
pub fn ring(size: usize) -> Result<Vec<RingMessenger<MemoryTransport>>> {
    // Validates before allocating anything
    Ring::new(0, size)?;

    let queues: Arc<[Queue]> = (0..size).map(|_| Queue::default()).collect();

    Ok(Ring::positions(size)
        .map(|position| {
            RingMessenger::new(
                position,
                MemoryTransport {
                    id: position.id(),
                    queues: Arc::clone(&queues),
                },
            )
        })
        .collect())
}

#[derive(Default)]
struct Queue {
    tokens: Mutex<VecDeque<Token>>,
    available: Condvar,
}

impl Queue {
    fn push(&self, token: Token) {
        self.tokens.lock().push_back(token);
        self.available.notify_one();
    }

    fn take(&self) -> Token {
        let mut tokens = self.tokens.lock();
        loop {
            if let Some(token) = tokens.pop_front() {
                return token;
            }
            self.available.wait(&mut tokens);
        }
    }
}

/// A [`Transport`] backed by in-memory queues shared by every
/// process of the ring. See [`ring`].
#[derive(Clone)]
pub struct MemoryTransport {
    id: usize,
    queues: Arc<[Queue]>,
}

impl fmt::Debug for MemoryTransport {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("MemoryTransport")
            .field("id", &self.id)
            .field("processes", &self.queues.len())
            .finish()
    }
}

/// Error type for [`MemoryTransport`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryError {
    /// Tried to send to a process id that isn't part of the ring.
    UnknownProcess(usize),
}

impl fmt::Display for MemoryError {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MemoryError::UnknownProcess(id) => write!(formatter, "No process with id {}", id),
        }
    }
}

impl std::error::Error for MemoryError {}

impl MemoryTransport {
    /// The number of tokens waiting to be received by this process.
    pub fn pending(&self) -> usize {
        self.queues[self.id].tokens.lock().len()
    }

    /// The number of tokens waiting to be received by any process
    /// of the ring.
    pub fn pending_in_ring(&self) -> usize {
        self.queues.iter().map(|queue| queue.tokens.lock().len()).sum()
    }
}

impl Transport for MemoryTransport {
    type Error = MemoryError;

    fn send_to(&self, dst: usize, token: Token) -> core::result::Result<(), Self::Error> {
        self.queues
            .get(dst)
            .ok_or(MemoryError::UnknownProcess(dst))?
            .push(token);
        Ok(())
    }

    // Every queue has a single consumer, so the source is implied
    fn receive_from(&self, _src: usize) -> core::result::Result<Token, Self::Error> {
        Ok(self.queues[self.id].take())
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use super::*;
    use crate::{Error, Flag, TokenMessenger};

    #[test]
    fn tokens_travel_around_the_ring() -> Result<()> {
        let messengers = ring(3)?;

        for (idx, messenger) in messengers.iter().enumerate() {
            messenger
                .send_to_next_async(Token::new(Flag::Dirty, idx as i64))
                .expect("known successor");
        }

        assert_eq!(
            Ok(Token::new(Flag::Dirty, 0)),
            messengers[1].receive_from_previous()
        );
        assert_eq!(
            Ok(Token::new(Flag::Dirty, 1)),
            messengers[2].receive_from_previous()
        );
        assert_eq!(
            Ok(Token::new(Flag::Dirty, 2)),
            messengers[0].receive_from_previous()
        );

        Ok(())
    }

    #[test]
    fn delivery_preserves_order() -> Result<()> {
        let messengers = ring(3)?;

        for count in 0..3 {
            messengers[0]
                .send_to_next_async(Token::new(Flag::Dirty, count))
                .expect("known successor");
        }

        assert_eq!(3, messengers[1].transport().pending());
        assert_eq!(3, messengers[2].transport().pending_in_ring());
        for count in 0..3 {
            assert_eq!(
                Ok(Token::new(Flag::Dirty, count)),
                messengers[1].receive_from_previous()
            );
        }
        assert_eq!(0, messengers[1].transport().pending());

        Ok(())
    }

    #[test]
    fn receive_blocks_until_a_token_arrives() -> Result<()> {
        let messengers = ring(2)?;

        thread::scope(|scope| {
            let receiver = scope.spawn(|| messengers[1].receive_from_previous());
            messengers[0]
                .send_to_next_async(Token::probe())
                .expect("known successor");
            assert_eq!(Ok(Token::probe()), receiver.join().expect("no panic"));
        });

        Ok(())
    }

    #[test]
    fn single_process_ring_loops_back() -> Result<()> {
        let messengers = ring(1)?;
        assert_eq!(1, messengers.len());

        let master = &messengers[0];
        assert!(master.is_master());
        master
            .send_to_next_async(Token::probe())
            .expect("known successor");
        assert_eq!(Ok(Token::probe()), master.receive_from_previous());

        Ok(())
    }

    #[test]
    fn empty_ring_is_rejected() {
        assert_eq!(Some(Error::InvalidRing { id: 0, size: 0 }), ring(0).err());
    }

    #[test]
    fn sending_outside_the_ring_fails() -> Result<()> {
        let messengers = ring(2)?;

        assert_eq!(
            Err(MemoryError::UnknownProcess(5)),
            messengers[0].transport().send_to(5, Token::probe())
        );

        Ok(())
    }
}
