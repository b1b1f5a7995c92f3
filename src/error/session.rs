// Session error types and constants

use crate::error::ErrorCode;
use crate::session::{SessionCommand, SessionState};
use std::fmt;

/// Session error code constants
///
/// Error code range: 2001-2002
pub struct SessionErrorCodes {}

impl SessionErrorCodes {
    /// Command is not valid in the current session state
    pub const INVALID_TRANSITION: i32 = 2001;

    /// Session lock was poisoned by a panicking task
    pub const LOCK_POISONED: i32 = 2002;
}

/// Dashboard session errors
///
/// A rejected command never changes session state.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionError {
    /// The command has no transition from the current state
    InvalidTransition {
        from: SessionState,
        command: SessionCommand,
    },

    /// Session mutex was poisoned
    LockPoisoned,
}

impl ErrorCode for SessionError {
    fn code(&self) -> i32 {
        match self {
            SessionError::InvalidTransition { .. } => SessionErrorCodes::INVALID_TRANSITION,
            SessionError::LockPoisoned => SessionErrorCodes::LOCK_POISONED,
        }
    }

    fn message(&self) -> String {
        match self {
            SessionError::InvalidTransition { from, command } => {
                format!("Cannot {} while session is {}", command, from)
            }
            SessionError::LockPoisoned => "Session state lock poisoned".to_string(),
        }
    }
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SessionError (code {}): {}", self.code(), self.message())
    }
}

impl std::error::Error for SessionError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_transition_message() {
        let err = SessionError::InvalidTransition {
            from: SessionState::Ready,
            command: SessionCommand::Pause,
        };
        assert_eq!(err.code(), SessionErrorCodes::INVALID_TRANSITION);
        assert_eq!(err.message(), "Cannot pause while session is READY");
    }

    #[test]
    fn test_lock_poisoned_code() {
        assert_eq!(
            SessionError::LockPoisoned.code(),
            SessionErrorCodes::LOCK_POISONED
        );
    }
}
