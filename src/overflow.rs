//! State machine for recovering from context-length overflow.
//!
//! When the server rejects a non-streaming request because the prompt no
//! longer fits the model's context window, the client keeps only the most
//! recent user message and retries once.  Everything older is lost.
//!
//! ```text
//! Normal --overflow error--> Overflowed --retry ok----> Recovered
//!                                       --retry error-> Fatal
//! ```

use std::fmt;

use crate::error::Error;

/// Where a single user turn stands with respect to overflow recovery.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
pub enum OverflowState {
    /// No overflow has been seen this turn.
    #[default]
    Normal,

    /// The server reported an overflow; the transcript has been cut down to
    /// the last user message and one retry is due.
    Overflowed,

    /// The retry succeeded.
    Recovered,

    /// The retry failed too; its error is surfaced.
    Fatal,
}

impl OverflowState {
    /// Next state after a failed attempt.
    pub fn after_failure(self, err: &Error) -> Self {
        match self {
            OverflowState::Normal if err.is_context_overflow() => OverflowState::Overflowed,
            OverflowState::Overflowed => OverflowState::Fatal,
            other => other,
        }
    }

    /// Next state after a successful attempt.
    pub fn after_success(self) -> Self {
        match self {
            OverflowState::Overflowed => OverflowState::Recovered,
            other => other,
        }
    }

    /// Returns true when another attempt is due.
    pub fn should_retry(self) -> bool {
        self == OverflowState::Overflowed
    }
}

impl fmt::Display for OverflowState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OverflowState::Normal => write!(f, "normal"),
            OverflowState::Overflowed => write!(f, "overflowed"),
            OverflowState::Recovered => write!(f, "recovered"),
            OverflowState::Fatal => write!(f, "fatal"),
        }
    }
}
