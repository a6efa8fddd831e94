/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */
use core::fmt;

use parking_lot::Mutex;

use crate::{master::Master, slave::Slave, Error, Result, TokenMessenger};

/// Terminator manages termination detection for the current process
/// using the given [`TokenMessenger`].
///
/// It implements Safra's algorithm: the master process sends a token
/// around the ring and every process folds its local state into it.
/// Termination is declared once a token returns to the master
/// without having seen any activity and with every sent message
/// accounted for as received.
///
/// Terminators start out working. Even if no messages are sent or
/// received and only local work is performed, [`Terminator::set_done`]
/// must be called at least once; this prevents terminating right
/// after creation.
///
/// Terminators are not reusable: once
/// [`Terminator::wait_for_termination`] returns, every method fails
/// with [`Error::AlreadyFinalized`]. Use a [`Factory`] for algorithms
/// that need multiple rounds.
///
/// All methods take `&self` and are serialized on an internal lock:
/// application threads report activity while another thread is
/// blocked on [`Terminator::wait_for_termination`].
pub struct Terminator<M> {
    messenger: M,
    state: Mutex<State>,
}

/// Process-local state shared by both roles.
#[derive(Debug)]
pub(crate) struct Local {
    /// Received a message since the last token left this process
    pub(crate) dirty: bool,
    /// Messages sent minus messages received, since creation
    pub(crate) count: i64,
    pub(crate) working: bool,
}

#[derive(Debug)]
pub(crate) enum Role {
    Master(Master),
    Slave(Slave),
}

#[derive(Debug)]
struct State {
    local: Local,
    role: Role,
    finalized: bool,
    // The termination loop is running
    waiting: bool,
}

impl State {
    fn ensure_usable(&self) -> Result<()> {
        if self.finalized {
            Err(Error::AlreadyFinalized)
        } else {
            Ok(())
        }
    }

    fn ensure_working(&self) -> Result<()> {
        if self.local.working {
            Ok(())
        } else {
            Err(Error::NotWorking)
        }
    }
}

pub(crate) fn wrap_messenger_error<E: fmt::Display + fmt::Debug + Send + Sync + 'static>(
    err: E,
) -> Error {
    Error::Messenger(anyhow::Error::msg(err))
}

impl<M: TokenMessenger> Terminator<M> {
    /// Create a new terminator according to the given messenger.
    ///
    /// The role is picked via [`TokenMessenger::is_master`].
    pub fn create_new(messenger: M) -> Self {
        let role = if messenger.is_master() {
            Role::Master(Master::new())
        } else {
            Role::Slave(Slave::new())
        };

        Self {
            messenger,
            state: Mutex::new(State {
                local: Local {
                    dirty: false,
                    count: 0,
                    working: true,
                },
                role,
                finalized: false,
                waiting: false,
            }),
        }
    }

    /// Tell the terminator that local work is done. I.e.: after all
    /// received messages have been processed.
    ///
    /// This is what allows the protocol to make progress: the master
    /// only starts probing after it, and a slave holds on to the
    /// token while it's working.
    pub fn set_done(&self) -> Result<()> {
        let mut guard = self.state.lock();
        guard.ensure_usable()?;
        guard.ensure_working()?;

        let state = &mut *guard;
        state.local.working = false;

        match &mut state.role {
            Role::Master(master) => master.on_done(&mut state.local, &self.messenger),
            Role::Slave(slave) => slave.on_done(&mut state.local, &self.messenger),
        }
    }

    /// Indicate that an application message has been sent from this
    /// process.
    ///
    /// Only a working process may send messages.
    pub fn message_sent(&self) -> Result<()> {
        let mut state = self.state.lock();
        state.ensure_usable()?;
        state.ensure_working()?;

        state.local.count += 1;
        Ok(())
    }

    /// Indicate that an application message has been received and
    /// this process is now processing it.
    ///
    /// Receiving always (re)activates the process, so any sequence of
    /// `message_received` calls must be followed by a
    /// [`Terminator::set_done`] eventually, otherwise the ring never
    /// terminates.
    pub fn message_received(&self) -> Result<()> {
        let mut state = self.state.lock();
        state.ensure_usable()?;

        state.local.count -= 1;
        state.local.dirty = true;
        state.local.working = true;
        Ok(())
    }

    /// Run the termination detection protocol until every process
    /// in the ring agrees that the computation is over.
    ///
    /// Blocks the calling thread, possibly forever if the ring
    /// never quiesces. Activity reported before this call is
    /// preserved, but tokens are only exchanged once it starts.
    ///
    /// The terminator is finalized when this returns, even if it
    /// returns an error.
    pub fn wait_for_termination(&self) -> Result<()> {
        {
            let mut state = self.state.lock();
            state.ensure_usable()?;
            if state.waiting {
                return Err(Error::AlreadyWaiting);
            }
            state.waiting = true;
        }

        let result = self.termination_loop();

        #[cfg(feature = "tracing")]
        if let Err(err) = &result {
            tracing::error!(
                terminator = tracing::field::debug(&self),
                error = tracing::field::display(err),
                "termination loop failed"
            );
        }

        let mut state = self.state.lock();
        state.waiting = false;
        state.finalized = true;

        result
    }

    // Exchanges tokens until the fix point is reached. The lock is
    // never held while waiting for a token.
    fn termination_loop(&self) -> Result<()> {
        loop {
            let token = self
                .messenger
                .receive_from_previous()
                .map_err(wrap_messenger_error)?;

            let mut guard = self.state.lock();
            let state = &mut *guard;

            if token.is_terminal() {
                match &mut state.role {
                    Role::Master(master) => master.on_terminate(token)?,
                    Role::Slave(slave) => slave.on_terminate(&self.messenger)?,
                }

                #[cfg(feature = "tracing")]
                tracing::debug!(
                    role = tracing::field::debug(&state.role),
                    count = state.local.count,
                    "termination detected"
                );

                return Ok(());
            }

            match &mut state.role {
                Role::Master(master) => master.on_token(token, &mut state.local, &self.messenger)?,
                Role::Slave(slave) => slave.on_token(token, &mut state.local, &self.messenger)?,
            }
        }
    }

    /// Whether this process is currently working. I.e.: it has
    /// received messages since it last called
    /// [`Terminator::set_done`], or never called it at all.
    pub fn is_working(&self) -> bool {
        self.state.lock().local.working
    }

    /// Whether [`Terminator::wait_for_termination`] already returned.
    pub fn is_finalized(&self) -> bool {
        self.state.lock().finalized
    }

    /// Whether this terminator plays the master role.
    pub fn is_master(&self) -> bool {
        matches!(self.state.lock().role, Role::Master(_))
    }

    /// Getter for the messenger this terminator uses.
    pub fn messenger(&self) -> &M {
        &self.messenger
    }

    /// Consumes the terminator, yielding its messenger back.
    pub fn into_messenger(self) -> M {
        self.messenger
    }

    #[cfg(test)]
    pub(crate) fn local_count(&self) -> i64 {
        self.state.lock().local.count
    }
}

impl<M> fmt::Debug for Terminator<M> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.state.try_lock() {
            Some(state) => formatter
                .debug_struct("Terminator")
                .field("role", &state.role)
                .field("dirty", &state.local.dirty)
                .field("count", &state.local.count)
                .field("working", &state.local.working)
                .field("finalized", &state.finalized)
                .finish(),
            // Debug output must not deadlock when formatted while
            // the state is locked (e.g.: tracing inside a handler)
            None => formatter
                .debug_struct("Terminator")
                .finish_non_exhaustive(),
        }
    }
}

/// Creates new terminators based on the given messenger.
///
/// Great for multi-round algorithms, where every round uses the same
/// messenger but a new terminator. The messenger is cloned for every
/// terminator, so use a reference, an `Arc` or any cheaply cloneable
/// handle.
#[derive(Debug, Clone)]
pub struct Factory<M> {
    messenger: M,
}

impl<M: TokenMessenger + Clone> Factory<M> {
    /// Create a factory that hands out terminators bound to
    /// `messenger`.
    pub fn new(messenger: M) -> Self {
        Self { messenger }
    }

    /// Create a terminator for a new round.
    ///
    /// See [`Terminator::create_new`].
    pub fn create_new(&self) -> Terminator<M> {
        Terminator::create_new(self.messenger.clone())
    }
}
