//! Canonical telemetry types produced by the detection device and consumed
//! by dashboard sessions.
//!
//! The wire format tolerates key aliases and missing fields; decoding into
//! these types happens once in [`super::decode_message`], so nothing
//! downstream ever looks at raw keys.

use serde::{Deserialize, Serialize};

/// Width of the virtual coordinate space detections are expressed in.
pub const VIRTUAL_WIDTH: f64 = 640.0;

/// Height of the virtual coordinate space detections are expressed in.
pub const VIRTUAL_HEIGHT: f64 = 480.0;

/// Clamp a confidence value into `[0, 1]`, mapping NaN to zero.
pub fn clamp_confidence(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

/// When a detection cycle happened, as reported by the producer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Timestamp {
    /// Seconds since the Unix epoch (fractional allowed).
    EpochSeconds(f64),
    /// Calendar time text, e.g. RFC 3339 or `YYYY-MM-DD HH:MM:SS`.
    Text(String),
}

/// One detected object.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Detection {
    /// `[x1, y1, x2, y2]` in the 640x480 virtual space.
    #[serde(rename = "bbox")]
    pub bbox: [f64; 4],
    #[serde(rename = "cls")]
    pub class_name: String,
    /// Raw confidence as received; use [`Detection::clamped_confidence`].
    #[serde(rename = "conf")]
    pub confidence: f64,
}

impl Detection {
    pub fn new(bbox: [f64; 4], class_name: impl Into<String>, confidence: f64) -> Self {
        Self {
            bbox,
            class_name: class_name.into(),
            confidence,
        }
    }

    pub fn clamped_confidence(&self) -> f64 {
        clamp_confidence(self.confidence)
    }
}

/// One detection-cycle report.
///
/// Serializes with the primary wire keys (`person`, `ts`, `loop_fps`,
/// `det_fps`) so a publisher and the decoder agree on the format.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TelemetryMessage {
    #[serde(rename = "person")]
    pub person_detected: bool,
    pub detections: Vec<Detection>,
    #[serde(rename = "ts")]
    pub timestamp: Timestamp,
    /// Producer loop rate; diagnostic only.
    #[serde(rename = "loop_fps")]
    pub loop_rate_hz: f64,
    /// Detector rate; diagnostic only.
    #[serde(rename = "det_fps")]
    pub det_rate_hz: f64,
}

impl TelemetryMessage {
    /// The detection with the highest clamped confidence.
    ///
    /// Ties resolve to the earliest detection in the sequence.
    pub fn best_detection(&self) -> Option<&Detection> {
        let mut best: Option<&Detection> = None;
        for detection in &self.detections {
            match best {
                Some(current)
                    if detection.clamped_confidence() <= current.clamped_confidence() => {}
                _ => best = Some(detection),
            }
        }
        best
    }
}
