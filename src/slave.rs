/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */
use crate::{
    terminator::{wrap_messenger_error, Local},
    Result, Token, TokenMessenger,
};

/// A slave relays the master's probes, folding its local state into
/// them, but only while idle: a token that arrives while working is
/// held until the next `set_done`.
#[derive(Debug)]
pub(crate) struct Slave {
    pending: Option<Token>,
}

impl Slave {
    pub(crate) const fn new() -> Self {
        Self { pending: None }
    }

    // `local.working` is false here
    fn forward(token: Token, local: &mut Local, messenger: &impl TokenMessenger) -> Result<()> {
        let outgoing = token.merge(local.dirty, local.count);

        #[cfg(feature = "tracing")]
        tracing::trace!(
            incoming = tracing::field::display(&token),
            outgoing = tracing::field::display(&outgoing),
            "Forwarding token"
        );

        // Never blocks, so it's fine to hold the lock here
        messenger
            .send_to_next_async(outgoing)
            .map_err(wrap_messenger_error)?;
        local.dirty = false;
        Ok(())
    }

    pub(crate) fn on_done(&mut self, local: &mut Local, messenger: &impl TokenMessenger) -> Result<()> {
        match self.pending.take() {
            Some(token) => Self::forward(token, local, messenger),
            None => Ok(()),
        }
    }

    pub(crate) fn on_token(
        &mut self,
        token: Token,
        local: &mut Local,
        messenger: &impl TokenMessenger,
    ) -> Result<()> {
        if local.working {
            #[cfg(feature = "tracing")]
            tracing::trace!(
                token = tracing::field::display(&token),
                "Working, holding token"
            );
            // A single token circulates at any given time
            debug_assert!(self.pending.is_none());
            self.pending = Some(token);
            Ok(())
        } else {
            Self::forward(token, local, messenger)
        }
    }

    pub(crate) fn on_terminate(&mut self, messenger: &impl TokenMessenger) -> Result<()> {
        messenger
            .send_to_next_async(Token::terminate())
            .map_err(wrap_messenger_error)
    }
}
