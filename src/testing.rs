/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */
use std::{
    boxed::Box,
    collections::VecDeque,
    sync::atomic::{AtomicUsize, Ordering},
    thread,
    vec::Vec,
};

use parking_lot::{Condvar, Mutex};
use rand::{rngs::SmallRng, Rng, SeedableRng};

use crate::{memory, Terminator, Token, TokenMessenger};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TestingError {
    ScriptExhausted,
}

impl core::fmt::Display for TestingError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            TestingError::ScriptExhausted => f.write_str("script exhausted"),
        }
    }
}

#[derive(Default)]
struct Log {
    sent: Vec<Token>,
    received: usize,
}

/// A messenger that replays a fixed sequence of tokens as if they
/// came from the predecessor and records everything sent.
///
/// When gated, the n-th token is only delivered after `n + lead`
/// tokens were sent, mimicking a ring that only answers what it
/// was given.
pub(crate) struct ScriptedMessenger {
    master: bool,
    lead: Option<usize>,
    script: Vec<Token>,
    log: Mutex<Log>,
    changed: Condvar,
}

impl ScriptedMessenger {
    fn new(master: bool, lead: Option<usize>, script: Vec<Token>) -> Self {
        Self {
            master,
            lead,
            script,
            log: Mutex::new(Log::default()),
            changed: Condvar::new(),
        }
    }

    /// A master that only receives a token after having sent one
    pub(crate) fn master(script: Vec<Token>) -> Self {
        Self::new(true, Some(1), script)
    }

    /// A master whose ring delivers tokens unprompted
    pub(crate) fn unprompted_master(script: Vec<Token>) -> Self {
        Self::new(true, None, script)
    }

    pub(crate) fn slave(script: Vec<Token>) -> Self {
        Self::new(false, None, script)
    }

    /// A slave that only receives the next token after forwarding
    /// the previous one
    pub(crate) fn slave_gated(script: Vec<Token>) -> Self {
        Self::new(false, Some(0), script)
    }

    pub(crate) fn sent(&self) -> Vec<Token> {
        self.log.lock().sent.clone()
    }

    pub(crate) fn received(&self) -> usize {
        self.log.lock().received
    }
}

impl TokenMessenger for ScriptedMessenger {
    type Error = TestingError;

    fn send_to_next_async(&self, token: Token) -> Result<(), Self::Error> {
        self.log.lock().sent.push(token);
        self.changed.notify_all();
        Ok(())
    }

    fn receive_from_previous(&self) -> Result<Token, Self::Error> {
        let mut log = self.log.lock();
        let idx = log.received;
        let token = *self
            .script
            .get(idx)
            .ok_or(TestingError::ScriptExhausted)?;

        if let Some(lead) = self.lead {
            while log.sent.len() < idx + lead {
                self.changed.wait(&mut log);
            }
        }

        log.received += 1;
        Ok(token)
    }

    fn is_master(&self) -> bool {
        self.master
    }
}

type RingFn = Box<dyn Fn(Token) -> Token + Send + Sync>;

/// A master alone in its ring: everything it sends comes back to it,
/// optionally transformed by a function simulating the other
/// processes.
pub(crate) struct LoopbackMessenger {
    ring: RingFn,
    sent: Mutex<Vec<Token>>,
    queue: Mutex<VecDeque<Token>>,
    available: Condvar,
}

impl Default for LoopbackMessenger {
    fn default() -> Self {
        Self::with_ring(|token| token)
    }
}

impl LoopbackMessenger {
    pub(crate) fn with_ring(ring: impl Fn(Token) -> Token + Send + Sync + 'static) -> Self {
        Self {
            ring: Box::new(ring),
            sent: Mutex::new(Vec::new()),
            queue: Mutex::new(VecDeque::new()),
            available: Condvar::new(),
        }
    }

    pub(crate) fn sent(&self) -> Vec<Token> {
        self.sent.lock().clone()
    }

    pub(crate) fn pending(&self) -> usize {
        self.queue.lock().len()
    }
}

impl TokenMessenger for LoopbackMessenger {
    type Error = core::convert::Infallible;

    fn send_to_next_async(&self, token: Token) -> Result<(), Self::Error> {
        self.sent.lock().push(token);
        self.queue.lock().push_back((self.ring)(token));
        self.available.notify_one();
        Ok(())
    }

    fn receive_from_previous(&self) -> Result<Token, Self::Error> {
        let mut queue = self.queue.lock();
        loop {
            if let Some(token) = queue.pop_front() {
                return Ok(token);
            }
            self.available.wait(&mut queue);
        }
    }

    fn is_master(&self) -> bool {
        true
    }
}

#[cfg(any(feature = "bincode-codec", feature = "postcard-codec"))]
pub(crate) fn verify_codec_roundtrip<C: crate::Codec>(mut codec: C) -> Result<(), C::Error> {
    use crate::Flag;

    let tokens = [
        Token::probe(),
        Token::terminate(),
        Token::new(Flag::Dirty, -1),
        Token::new(Flag::Clean, i64::MAX),
        Token::new(Flag::Dirty, i64::MIN),
    ];

    let mut buf = bytes::BytesMut::new();
    for token in tokens.iter() {
        codec.encode_token(token, &mut buf)?;
    }

    let mut data = buf.freeze();
    for token in tokens.iter() {
        assert_eq!(token, &codec.decode_token(&mut data)?);
    }
    assert!(data.is_empty(), "codec didn't consume everything it wrote");

    Ok(())
}

/// Decodes `encoded`, which must be the codec's encoding of a
/// `(Terminate, 5)` pair, and checks that the count gets dropped.
#[cfg(any(feature = "bincode-codec", feature = "postcard-codec"))]
pub(crate) fn verify_terminal_count_is_discarded<C: crate::Codec>(
    mut codec: C,
    encoded: &[u8],
) -> Result<(), C::Error> {
    let mut data = encoded;
    let token = codec.decode_token(&mut data)?;

    assert!(data.is_empty(), "codec didn't consume the whole token");
    assert!(token.is_terminal());
    assert_eq!(0, token.count());
    assert_eq!(Token::terminate(), token);

    Ok(())
}

/// A blocking FIFO of application messages. `None` is the poison
/// pill that stops a reader.
#[derive(Default)]
struct Inbox {
    messages: Mutex<VecDeque<Option<u32>>>,
    available: Condvar,
}

impl Inbox {
    fn push(&self, message: Option<u32>) {
        self.messages.lock().push_back(message);
        self.available.notify_one();
    }

    fn take(&self) -> Option<u32> {
        let mut messages = self.messages.lock();
        loop {
            if let Some(message) = messages.pop_front() {
                return message;
            }
            self.available.wait(&mut messages);
        }
    }

    fn is_empty(&self) -> bool {
        self.messages.lock().is_empty()
    }
}

/// Outcome of a [`simulate`] run, indexed by process id.
#[derive(Debug)]
pub(crate) struct Report {
    pub(crate) sent: Vec<usize>,
    pub(crate) received: Vec<usize>,
    pub(crate) counts: Vec<i64>,
    pub(crate) leftover_messages: usize,
    pub(crate) leftover_tokens: usize,
}

/// Runs a ring of `processes` where every process sends up to
/// `messages` messages with random payloads to random processes.
///
/// Receiving a message may trigger sending another one with a
/// smaller payload, so the whole computation is finite but its
/// length is unpredictable. Every process has a writer thread that
/// also runs the termination loop and a reader thread that handles
/// incoming messages until poisoned.
pub(crate) fn simulate(seed: u64, processes: usize, messages: usize) -> Report {
    let messengers = memory::ring(processes).expect("valid ring size");
    let inboxes: Vec<Inbox> = (0..processes).map(|_| Inbox::default()).collect();
    let terminators: Vec<_> = messengers.iter().map(Terminator::create_new).collect();
    // Guards the per-process "writer is done" flag and serializes
    // message handling against the writer's final set_done
    let main_done: Vec<Mutex<bool>> = (0..processes).map(|_| Mutex::new(false)).collect();
    let sent: Vec<AtomicUsize> = (0..processes).map(|_| AtomicUsize::new(0)).collect();
    let received: Vec<AtomicUsize> = (0..processes).map(|_| AtomicUsize::new(0)).collect();

    let send = |from: usize, to: usize, payload: u32| {
        terminators[from].message_sent().expect("sender is working");
        sent[from].fetch_add(1, Ordering::SeqCst);
        inboxes[to].push(Some(payload));
    };

    thread::scope(|scope| {
        for id in 0..processes {
            let send = &send;
            let terminator = &terminators[id];
            let inbox = &inboxes[id];
            let main_done = &main_done[id];
            let received = &received[id];

            // Writer
            scope.spawn(move || {
                let mut rng = SmallRng::seed_from_u64(seed.wrapping_add(id as u64));
                let amount = rng.random_range(0..=messages);
                for _ in 0..amount {
                    send(id, rng.random_range(0..processes), rng.random_range(0..200));
                    if rng.random_bool(0.1) {
                        thread::yield_now();
                    }
                }

                {
                    let mut done = main_done.lock();
                    if terminator.is_working() {
                        terminator.set_done().expect("working before");
                    }
                    *done = true;
                }

                terminator.wait_for_termination().expect("terminates");
                inbox.push(None);
            });

            // Reader
            scope.spawn(move || {
                let mut rng = SmallRng::seed_from_u64(seed.wrapping_mul(31).wrapping_add(id as u64));
                while let Some(payload) = inbox.take() {
                    let done = main_done.lock();
                    terminator.message_received().expect("not finalized");
                    received.fetch_add(1, Ordering::SeqCst);

                    if rng.random_bool(0.5 * f64::from(payload) / 200.0) {
                        send(id, rng.random_range(0..processes), payload * 2 / 3);
                    }

                    if *done && terminator.is_working() {
                        terminator.set_done().expect("working before");
                    }
                }
            });
        }
    });

    Report {
        sent: sent.iter().map(|s| s.load(Ordering::SeqCst)).collect(),
        received: received.iter().map(|r| r.load(Ordering::SeqCst)).collect(),
        counts: terminators.iter().map(Terminator::local_count).collect(),
        leftover_messages: inboxes.iter().filter(|inbox| !inbox.is_empty()).count(),
        leftover_tokens: messengers[0].transport().pending_in_ring(),
    }
}
