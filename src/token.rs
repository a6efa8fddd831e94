/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */
use core::fmt;

/// The color of a [`Token`].
///
/// A token starts every probe [`Flag::Clean`] and turns
/// [`Flag::Dirty`] as soon as it visits a process that did
/// anything relevant since it last saw a token. The master uses
/// [`Flag::Terminate`] to announce that the ring has quiesced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Flag {
    /// No activity observed since the probe started.
    Clean,
    /// At least one visited process received a message since
    /// its previous token.
    Dirty,
    /// Termination has been declared. Terminal: every process
    /// must relay it unchanged.
    Terminate,
}

impl Flag {
    /// The integer representation of this flag: `0`, `1` or `2`.
    pub const fn raw(self) -> u8 {
        match self {
            Flag::Clean => 0,
            Flag::Dirty => 1,
            Flag::Terminate => 2,
        }
    }

    /// Inverse of [`Flag::raw`]. Yields `None` for anything above `2`.
    pub const fn from_raw(raw: u8) -> Option<Self> {
        match raw {
            0 => Some(Flag::Clean),
            1 => Some(Flag::Dirty),
            2 => Some(Flag::Terminate),
            _ => None,
        }
    }
}

/// A Token is the control message that circulates the ring.
///
/// It carries a [`Flag`] and the running sum of "messages sent
/// minus messages received" of every process it visited during the
/// current probe. Tokens are plain values: processes never modify
/// one in place, they forward a new one instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(from = "RawToken"))]
pub struct Token {
    flag: Flag,
    count: i64,
}

// Same layout as `Token`. Decoded tokens go through `Token::new` so
// that a terminal token never carries a count
#[cfg(feature = "serde")]
#[derive(serde::Deserialize)]
struct RawToken {
    flag: Flag,
    count: i64,
}

#[cfg(feature = "serde")]
impl From<RawToken> for Token {
    fn from(raw: RawToken) -> Self {
        Token::new(raw.flag, raw.count)
    }
}

impl Token {
    /// Creates a token from its raw parts.
    ///
    /// A [`Flag::Terminate`] token always carries a zero count, so
    /// `count` is discarded in that case.
    pub const fn new(flag: Flag, count: i64) -> Self {
        match flag {
            Flag::Terminate => Self::terminate(),
            _ => Self { flag, count },
        }
    }

    /// The token the master sends when starting a probe.
    pub const fn probe() -> Self {
        Self {
            flag: Flag::Clean,
            count: 0,
        }
    }

    /// The termination token (a.k.a. poison pill).
    pub const fn terminate() -> Self {
        Self {
            flag: Flag::Terminate,
            count: 0,
        }
    }

    /// Getter for this token's flag.
    pub const fn flag(&self) -> Flag {
        self.flag
    }

    /// Getter for this token's accumulated message count.
    pub const fn count(&self) -> i64 {
        self.count
    }

    /// Whether this is the termination token.
    pub const fn is_terminal(&self) -> bool {
        matches!(self.flag, Flag::Terminate)
    }

    /// Whether this token passed through an active process.
    pub const fn is_dirty(&self) -> bool {
        matches!(self.flag, Flag::Dirty)
    }

    /// Folds a process' local state into this token, yielding the
    /// token that process should forward to its successor.
    ///
    /// The resulting token is dirty if either this token or the
    /// process is dirty and its count is the sum of both counts.
    ///
    /// Terminal tokens are returned as-is.
    #[must_use]
    pub const fn merge(self, dirty: bool, count: i64) -> Self {
        if self.is_terminal() {
            return self;
        }

        Self {
            flag: if dirty || self.is_dirty() {
                Flag::Dirty
            } else {
                Flag::Clean
            },
            count: self.count + count,
        }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "({}, {})", self.flag.raw(), self.count)
    }
}
