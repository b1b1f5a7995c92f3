// Relay error types and constants

use crate::error::ErrorCode;
use log::error;
use std::fmt;

/// Relay error code constants
///
/// Error code range: 1001-1003
pub struct RelayErrorCodes {}

impl RelayErrorCodes {
    /// A listener (UDP ingress or WebSocket) could not be bound
    pub const BIND_FAILED: i32 = 1001;

    /// The stream server stopped with an I/O error
    pub const SERVE_FAILED: i32 = 1002;

    /// The ingress loop terminated unexpectedly
    pub const INGRESS_STOPPED: i32 = 1003;
}

/// Log a relay error with structured context
///
/// The logging is non-blocking and will not panic on failure.
pub fn log_relay_error(err: &RelayError, context: &str) {
    error!(
        "Relay error in {}: code={}, component=Relay, message={}",
        context,
        err.code(),
        err.message()
    );
}

/// Relay-related errors
///
/// Only startup failures are fatal; malformed datagrams and delivery
/// failures are recovered locally and never surface as a `RelayError`.
#[derive(Debug, Clone, PartialEq)]
pub enum RelayError {
    /// Binding a listener failed
    BindFailed { endpoint: String, reason: String },

    /// Serving WebSocket connections failed
    ServeFailed { reason: String },

    /// The ingress task ended
    IngressStopped { reason: String },
}

impl ErrorCode for RelayError {
    fn code(&self) -> i32 {
        match self {
            RelayError::BindFailed { .. } => RelayErrorCodes::BIND_FAILED,
            RelayError::ServeFailed { .. } => RelayErrorCodes::SERVE_FAILED,
            RelayError::IngressStopped { .. } => RelayErrorCodes::INGRESS_STOPPED,
        }
    }

    fn message(&self) -> String {
        match self {
            RelayError::BindFailed { endpoint, reason } => {
                format!("Failed to bind {}: {}", endpoint, reason)
            }
            RelayError::ServeFailed { reason } => {
                format!("Stream server failed: {}", reason)
            }
            RelayError::IngressStopped { reason } => {
                format!("Datagram ingress stopped: {}", reason)
            }
        }
    }
}

impl fmt::Display for RelayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RelayError (code {}): {}", self.code(), self.message())
    }
}

impl std::error::Error for RelayError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relay_error_codes() {
        let bind = RelayError::BindFailed {
            endpoint: "udp://127.0.0.1:9001".to_string(),
            reason: "address in use".to_string(),
        };
        assert_eq!(bind.code(), RelayErrorCodes::BIND_FAILED);
        assert_eq!(
            RelayError::ServeFailed {
                reason: "closed".to_string()
            }
            .code(),
            RelayErrorCodes::SERVE_FAILED
        );
        assert_eq!(
            RelayError::IngressStopped {
                reason: "join".to_string()
            }
            .code(),
            RelayErrorCodes::INGRESS_STOPPED
        );
    }

    #[test]
    fn test_bind_failure_message_names_endpoint() {
        let err = RelayError::BindFailed {
            endpoint: "ws://0.0.0.0:8765".to_string(),
            reason: "permission denied".to_string(),
        };
        let display = err.to_string();
        assert!(display.contains("code 1001"));
        assert!(display.contains("ws://0.0.0.0:8765"));
        assert!(display.contains("permission denied"));
    }
}
