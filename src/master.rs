/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */
use crate::{
    terminator::{wrap_messenger_error, Local},
    Error, Flag, Result, Token, TokenMessenger,
};

/// The master initiates every probe and is the only one that may
/// declare termination.
#[derive(Debug)]
pub(crate) struct Master {
    // A probe is circulating and hasn't returned yet
    waiting_for_token: bool,
    // The termination token has been sent
    declared: bool,
}

impl Master {
    pub(crate) const fn new() -> Self {
        Self {
            waiting_for_token: false,
            declared: false,
        }
    }

    fn init_probe(&mut self, local: &mut Local, messenger: &impl TokenMessenger) -> Result<()> {
        #[cfg(feature = "tracing")]
        tracing::debug!(count = local.count, "Probe start");

        local.dirty = false;
        self.waiting_for_token = true;
        messenger
            .send_to_next_async(Token::probe())
            .map_err(wrap_messenger_error)
    }

    // `local.working` is false here
    pub(crate) fn on_done(&mut self, local: &mut Local, messenger: &impl TokenMessenger) -> Result<()> {
        // Sending a probe while the rest of the ring is still busy is
        // fine: it only comes back after every slave is idle, and any
        // activity in-between shows up in its flag and count
        if !self.waiting_for_token && !self.declared {
            self.init_probe(local, messenger)
        } else {
            Ok(())
        }
    }

    pub(crate) fn on_token(
        &mut self,
        token: Token,
        local: &mut Local,
        messenger: &impl TokenMessenger,
    ) -> Result<()> {
        if !self.waiting_for_token {
            #[cfg(feature = "tracing")]
            tracing::error!(
                token = tracing::field::display(&token),
                "Master received a token it was not waiting for"
            );
            return Err(Error::UnexpectedToken(token));
        }
        self.waiting_for_token = false;

        if !local.dirty && token.flag() == Flag::Clean && token.count() + local.count == 0 {
            #[cfg(feature = "tracing")]
            tracing::debug!(
                token = tracing::field::display(&token),
                "Clean round, declaring termination"
            );

            // Slaves relay this and it comes back to us, ending the loop
            self.declared = true;
            messenger
                .send_to_next_async(Token::terminate())
                .map_err(wrap_messenger_error)
        } else if !local.working {
            #[cfg(feature = "tracing")]
            tracing::trace!(
                token = tracing::field::display(&token),
                dirty = local.dirty,
                count = local.count,
                "Dirty round while idle, probing again"
            );
            self.init_probe(local, messenger)
        } else {
            // Working: the next set_done starts another probe
            #[cfg(feature = "tracing")]
            tracing::trace!(
                token = tracing::field::display(&token),
                "Dirty round while working"
            );
            Ok(())
        }
    }

    pub(crate) fn on_terminate(&mut self, token: Token) -> Result<()> {
        if self.declared {
            Ok(())
        } else {
            #[cfg(feature = "tracing")]
            tracing::error!("Master received a termination token it didn't send");
            Err(Error::UnexpectedToken(token))
        }
    }
}
