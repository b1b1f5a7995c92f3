//! Configuration for the relay and dashboard session
//!
//! Both binaries read the same JSON file. Every field has a default, so a
//! partial file (or no file at all) still yields a usable configuration.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;
use time::UtcOffset;

/// Complete application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub relay: RelayConfig,
    pub session: SessionConfig,
}

/// Relay endpoints and fan-out tuning
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    /// Local address the datagram ingress listens on
    pub udp_addr: String,
    /// Address the stream server accepts WebSocket clients on
    pub ws_addr: String,
    /// Path the WebSocket upgrade is served at
    pub ws_path: String,
    /// Per-client outbound queue depth
    pub outbound_capacity: usize,
    /// How long a single delivery may block before the client is pruned
    pub send_timeout_ms: u64,
    /// Receive buffer size; longer datagrams are truncated by the OS
    pub max_datagram_bytes: usize,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            udp_addr: "127.0.0.1:9001".to_string(),
            ws_addr: "0.0.0.0:8765".to_string(),
            ws_path: "/".to_string(),
            outbound_capacity: 64,
            send_timeout_ms: 250,
            max_datagram_bytes: 65_535,
        }
    }
}

impl RelayConfig {
    pub fn send_timeout(&self) -> Duration {
        Duration::from_millis(self.send_timeout_ms)
    }
}

/// Dashboard session parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Stream server URL the subscriber connects to
    pub relay_url: String,
    pub reconnect_delay_ms: u64,
    /// Event log length (newest first)
    pub log_capacity: usize,
    /// Confidence series length (oldest first)
    pub series_capacity: usize,
    /// Offset used to render epoch and zoned timestamps
    pub utc_offset_minutes: i32,
    /// Depth of the session event channel
    pub event_buffer: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            relay_url: "ws://127.0.0.1:8765/".to_string(),
            reconnect_delay_ms: 800,
            log_capacity: 50,
            series_capacity: 60,
            utc_offset_minutes: 0,
            event_buffer: 256,
        }
    }
}

impl SessionConfig {
    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }

    /// Configured display offset; out-of-range values fall back to UTC.
    pub fn utc_offset(&self) -> UtcOffset {
        let seconds = self.utc_offset_minutes.saturating_mul(60);
        UtcOffset::from_whole_seconds(seconds).unwrap_or_else(|_| {
            log::warn!(
                "[Config] utc_offset_minutes {} out of range. Using UTC.",
                self.utc_offset_minutes
            );
            UtcOffset::UTC
        })
    }
}

impl AppConfig {
    /// Load configuration from JSON file
    ///
    /// # Arguments
    /// * `path` - Path to JSON config file
    ///
    /// # Returns
    /// The parsed configuration, or defaults if the file is missing or invalid
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Self {
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(config) => {
                    log::info!("[Config] Loaded configuration from {:?}", path.as_ref());
                    config
                }
                Err(err) => {
                    log::warn!(
                        "[Config] Failed to parse JSON from {:?}: {}. Using defaults.",
                        path.as_ref(),
                        err
                    );
                    Self::default()
                }
            },
            Err(err) => {
                log::warn!(
                    "[Config] Failed to read config file {:?}: {}. Using defaults.",
                    path.as_ref(),
                    err
                );
                Self::default()
            }
        }
    }

    /// Load from the optional path, or use defaults when none is given
    pub fn load(path: Option<&Path>) -> Self {
        match path {
            Some(path) => Self::load_from_file(path),
            None => {
                log::info!("[Config] No config file given. Using defaults.");
                Self::default()
            }
        }
    }
}
