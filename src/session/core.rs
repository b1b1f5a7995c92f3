//! SessionCore: synchronous heart of a dashboard session.
//!
//! Owns the state machine, both presentation buffers and the overlay inputs.
//! It performs no I/O; the async [`super::DashboardSession`] wrapper drives
//! it from commands and from the subscriber task, and turns its return
//! values into events and subscriber lifecycle actions.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use time::UtcOffset;

use crate::config::SessionConfig;
use crate::error::SessionError;
use crate::overlay::{DisplayRect, OverlayBox, OverlayProjector};
use crate::telemetry::{decode_message, DecodeError, Detection, TelemetryMessage};

use super::buffers::{ConfidenceSeries, EventLog};
use super::clock::{format_log_time, TimeSource};
use super::entry::{LogEntry, StatusBanner};
use super::state::{SessionCommand, SessionState};

/// Connection indicator shown by the dashboard.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionStatus {
    Connecting,
    Connected,
    #[default]
    Disconnected,
}

/// What the subscriber must do after a successful command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriberAction {
    /// Close any current subscriber and open a fresh one.
    Reopen,
    /// Open a subscriber only if none is alive.
    EnsureOpen,
    /// Leave the subscriber alone.
    Keep,
    /// Tear the subscriber down.
    Close,
}

/// Outcome of applying a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub from: SessionState,
    pub to: SessionState,
    pub action: SubscriberAction,
}

/// Everything derived from one accepted telemetry message.
#[derive(Debug, Clone, PartialEq)]
pub struct AcceptedTelemetry {
    pub entry: LogEntry,
    /// True exactly when the entry status is ALERT.
    pub alert: bool,
    pub overlay: Vec<OverlayBox>,
}

/// Producer rates from the last accepted message, for the video caption.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RateDiagnostics {
    pub loop_rate_hz: f64,
    pub det_rate_hz: f64,
}

/// Read-only copy of session state for display shells.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionSnapshot {
    pub state: SessionState,
    pub connection: ConnectionStatus,
    pub entries: Vec<LogEntry>,
    pub series: Vec<f64>,
    pub banner: Option<StatusBanner>,
    pub overlay: Vec<OverlayBox>,
    pub diagnostics: Option<RateDiagnostics>,
}

pub struct SessionCore {
    state: SessionState,
    connection: ConnectionStatus,
    log: EventLog,
    series: ConfidenceSeries,
    projector: OverlayProjector,
    display: DisplayRect,
    detections: Vec<Detection>,
    diagnostics: Option<RateDiagnostics>,
    clock: Arc<dyn TimeSource>,
    utc_offset: UtcOffset,
}

impl SessionCore {
    pub fn new(config: &SessionConfig, clock: Arc<dyn TimeSource>) -> Self {
        Self {
            state: SessionState::Ready,
            connection: ConnectionStatus::Disconnected,
            log: EventLog::new(config.log_capacity),
            series: ConfidenceSeries::new(config.series_capacity),
            projector: OverlayProjector::default(),
            display: DisplayRect::default(),
            detections: Vec::new(),
            diagnostics: None,
            clock,
            utc_offset: config.utc_offset(),
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn connection(&self) -> ConnectionStatus {
        self.connection
    }

    pub fn log(&self) -> &EventLog {
        &self.log
    }

    pub fn series(&self) -> &ConfidenceSeries {
        &self.series
    }

    pub fn display(&self) -> DisplayRect {
        self.display
    }

    /// Apply a shell command. Rejected commands leave everything untouched.
    pub fn apply(&mut self, command: SessionCommand) -> Result<Transition, SessionError> {
        let from = self.state;
        let to = from.next(command)?;

        let action = match command.resolve(from) {
            SessionCommand::Start => {
                self.clear_presentation();
                SubscriberAction::Reopen
            }
            SessionCommand::Pause | SessionCommand::TogglePause => SubscriberAction::Keep,
            SessionCommand::Resume => SubscriberAction::EnsureOpen,
            SessionCommand::Reset => {
                self.clear_presentation();
                SubscriberAction::Close
            }
        };

        self.state = to;
        Ok(Transition { from, to, action })
    }

    /// Decode and fold one text frame.
    ///
    /// Returns `Ok(None)` when the frame decoded but the session is not
    /// running, so it was discarded.
    pub fn ingest_frame(&mut self, text: &str) -> Result<Option<AcceptedTelemetry>, DecodeError> {
        let message = decode_message(text, self.clock.now())?;
        Ok(self.ingest(&message))
    }

    /// Fold one message into the presentation state if running.
    pub fn ingest(&mut self, message: &TelemetryMessage) -> Option<AcceptedTelemetry> {
        if !self.state.is_running() {
            return None;
        }

        let time = format_log_time(&message.timestamp, self.utc_offset, self.clock.now());
        let entry = LogEntry::from_message(message, time);

        self.log.push(entry.clone());
        self.series.push(entry.confidence);
        self.detections = message.detections.clone();
        self.diagnostics = Some(RateDiagnostics {
            loop_rate_hz: message.loop_rate_hz,
            det_rate_hz: message.det_rate_hz,
        });

        Some(AcceptedTelemetry {
            alert: entry.is_alert(),
            overlay: self.overlay(),
            entry,
        })
    }

    /// Record a new display rect and re-project the current detections.
    pub fn resize(&mut self, display: DisplayRect) -> Vec<OverlayBox> {
        self.display = display;
        self.overlay()
    }

    /// Returns true when the status actually changed.
    pub fn set_connection(&mut self, status: ConnectionStatus) -> bool {
        let changed = self.connection != status;
        self.connection = status;
        changed
    }

    pub fn banner(&self) -> Option<StatusBanner> {
        self.log.newest().map(StatusBanner::from_entry)
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            state: self.state,
            connection: self.connection,
            entries: self.log.to_vec(),
            series: self.series.to_vec(),
            banner: self.banner(),
            overlay: self.overlay(),
            diagnostics: self.diagnostics,
        }
    }

    fn overlay(&self) -> Vec<OverlayBox> {
        self.projector.project(self.display, &self.detections)
    }

    fn clear_presentation(&mut self) {
        self.log.clear();
        self.series.clear();
        self.detections.clear();
        self.diagnostics = None;
    }
}
