// Error types for the telemetry relay and dashboard sessions
//
// This module defines custom error types for relay startup and session
// commands, providing structured error handling with stable error codes
// that the CLI shells print alongside the message.

mod relay;
mod session;

pub use relay::{log_relay_error, RelayError, RelayErrorCodes};
pub use session::{SessionError, SessionErrorCodes};

/// Error codes for structured error reporting
///
/// This trait provides a standard way to get error codes and messages
/// from custom error types, enabling consistent error handling across
/// the relay and dashboard binaries.
pub trait ErrorCode {
    /// Get the numeric error code
    fn code(&self) -> i32;

    /// Get the human-readable error message
    fn message(&self) -> String;
}
