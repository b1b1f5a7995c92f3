// LogEntry derivation: one row per accepted telemetry message

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::telemetry::TelemetryMessage;

/// Label shown when the producer flagged a person.
pub const PERSON_LABEL: &str = "Person";

/// Label shown when there is no detection to report.
pub const NO_OBJECT_LABEL: &str = "None";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EntryStatus {
    Ok,
    Alert,
}

impl fmt::Display for EntryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntryStatus::Ok => f.write_str("OK"),
            EntryStatus::Alert => f.write_str("ALERT"),
        }
    }
}

/// One row of the dashboard's event log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub time: String,
    pub object: String,
    /// Best clamped confidence, `0.0` without detections.
    pub confidence: f64,
    /// Whole-percent text, e.g. `"91%"`.
    pub confidence_text: String,
    pub status: EntryStatus,
}

impl LogEntry {
    /// Derive the log row for `message`, stamped with pre-formatted `time`.
    pub fn from_message(message: &TelemetryMessage, time: String) -> Self {
        let best = message.best_detection();
        let confidence = best.map(|d| d.clamped_confidence()).unwrap_or(0.0);

        let object = if message.person_detected {
            PERSON_LABEL.to_string()
        } else {
            best.map(|d| d.class_name.clone())
                .unwrap_or_else(|| NO_OBJECT_LABEL.to_string())
        };

        let status = if message.person_detected {
            EntryStatus::Alert
        } else {
            EntryStatus::Ok
        };

        Self {
            time,
            object,
            confidence,
            confidence_text: percent_text(confidence),
            status,
        }
    }

    pub fn is_alert(&self) -> bool {
        self.status == EntryStatus::Alert
    }
}

fn percent_text(confidence: f64) -> String {
    format!("{:.0}%", confidence * 100.0)
}

/// Alert banner derived from the newest log entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StatusBanner {
    Normal,
    Warning { object: String },
}

impl StatusBanner {
    pub fn from_entry(entry: &LogEntry) -> Self {
        match entry.status {
            EntryStatus::Ok => StatusBanner::Normal,
            EntryStatus::Alert => StatusBanner::Warning {
                object: entry.object.clone(),
            },
        }
    }
}

impl fmt::Display for StatusBanner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatusBanner::Normal => f.write_str("SYSTEM NORMAL"),
            StatusBanner::Warning { object } => write!(f, "WARNING: {}", object),
        }
    }
}
