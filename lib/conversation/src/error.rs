//! Error types for the conversation crate.

use std::fmt;

/// Errors from session store operations.
///
/// Unknown sessions are not errors: reads return nothing and writes create
/// the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// The store's lock was poisoned by a panicking writer.
    LockPoisoned,
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LockPoisoned => write!(f, "session store lock poisoned"),
        }
    }
}

impl std::error::Error for SessionError {}
