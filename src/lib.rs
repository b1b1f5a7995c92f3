// Telemetry Relay
// UDP detection telemetry fanned out to WebSocket dashboards, plus the
// dashboard-side session that consumes it

// Module declarations
pub mod config;
pub mod error;
pub mod http;
pub mod managers;
pub mod overlay;
pub mod producer;
pub mod relay;
pub mod session;
pub mod telemetry;

// Re-exports for convenience
pub use config::{AppConfig, RelayConfig, SessionConfig};
pub use error::{ErrorCode, RelayError, SessionError};
pub use overlay::{DisplayRect, OverlayBox, OverlayProjector};
pub use relay::{BoundRelay, Relay};
pub use session::{DashboardSession, SessionCommand, SessionEvent, SessionState};
pub use telemetry::{decode_message, Detection, TelemetryMessage, Timestamp};

use tracing::level_filters::LevelFilter;

/// Initialize process-wide logging for the binaries.
///
/// `log` records from the library are bridged into the tracing subscriber.
/// Calling this twice is harmless; the second call leaves the first
/// subscriber in place.
pub fn init_logging(level: LevelFilter) {
    let result = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
    if result.is_ok() {
        log::debug!("Logging initialized at {}", level);
    }
}
