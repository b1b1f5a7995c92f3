//! Telemetry wire decoding.
//!
//! Producers are loose about key names (`person` vs `person_found`, `ts` vs
//! `timestamp`) and omit fields freely. [`decode_message`] is the single
//! normalization step that turns one JSON text frame into a canonical
//! [`TelemetryMessage`].

use std::fmt;

use serde::Deserialize;
use time::OffsetDateTime;

pub mod events;

pub use events::{
    clamp_confidence, Detection, TelemetryMessage, Timestamp, VIRTUAL_HEIGHT, VIRTUAL_WIDTH,
};

/// Reasons a text frame could not be turned into a [`TelemetryMessage`].
#[derive(Debug)]
pub enum DecodeError {
    /// The frame is not JSON, or a known field has the wrong type.
    InvalidJson(serde_json::Error),
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeError::InvalidJson(err) => write!(f, "invalid telemetry JSON: {}", err),
        }
    }
}

impl std::error::Error for DecodeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DecodeError::InvalidJson(err) => Some(err),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct WireMessage {
    #[serde(default)]
    person: Option<bool>,
    #[serde(default)]
    person_found: Option<bool>,
    #[serde(default)]
    detections: Option<Vec<WireDetection>>,
    #[serde(default)]
    ts: Option<Timestamp>,
    #[serde(default)]
    timestamp: Option<Timestamp>,
    #[serde(default)]
    loop_fps: Option<f64>,
    #[serde(default)]
    det_fps: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
struct WireDetection {
    #[serde(default)]
    bbox: [f64; 4],
    #[serde(default)]
    cls: String,
    #[serde(default)]
    conf: f64,
}

/// Decode one telemetry frame.
///
/// `received_at` stands in for the timestamp when the producer sent none.
/// When both alias keys are present, the primary key (`person`, `ts`) wins.
pub fn decode_message(
    text: &str,
    received_at: OffsetDateTime,
) -> Result<TelemetryMessage, DecodeError> {
    let wire: WireMessage = serde_json::from_str(text).map_err(DecodeError::InvalidJson)?;

    let timestamp = wire
        .ts
        .or(wire.timestamp)
        .unwrap_or_else(|| Timestamp::EpochSeconds(epoch_seconds(received_at)));

    let detections = wire
        .detections
        .unwrap_or_default()
        .into_iter()
        .map(|d| Detection {
            bbox: d.bbox,
            class_name: d.cls,
            confidence: d.conf,
        })
        .collect();

    Ok(TelemetryMessage {
        person_detected: wire.person.or(wire.person_found).unwrap_or(false),
        detections,
        timestamp,
        loop_rate_hz: wire.loop_fps.unwrap_or(0.0),
        det_rate_hz: wire.det_fps.unwrap_or(0.0),
    })
}

fn epoch_seconds(at: OffsetDateTime) -> f64 {
    at.unix_timestamp() as f64 + f64::from(at.nanosecond()) / 1_000_000_000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    const RECEIVED: OffsetDateTime = datetime!(2024-05-01 12:00:00 UTC);

    #[test]
    fn decodes_full_message() {
        let msg = decode_message(
            r#"{"person":true,"detections":[{"bbox":[10,10,50,50],"cls":"person","conf":0.91}],"ts":1000,"loop_fps":29.5,"det_fps":9.8}"#,
            RECEIVED,
        )
        .unwrap();

        assert!(msg.person_detected);
        assert_eq!(msg.detections.len(), 1);
        assert_eq!(msg.detections[0].bbox, [10.0, 10.0, 50.0, 50.0]);
        assert_eq!(msg.detections[0].class_name, "person");
        assert_eq!(msg.timestamp, Timestamp::EpochSeconds(1000.0));
        assert_eq!(msg.loop_rate_hz, 29.5);
        assert_eq!(msg.det_rate_hz, 9.8);
    }

    #[test]
    fn accepts_alias_keys() {
        let msg = decode_message(
            r#"{"person_found":true,"timestamp":"2024-05-01 08:30:00"}"#,
            RECEIVED,
        )
        .unwrap();

        assert!(msg.person_detected);
        assert_eq!(
            msg.timestamp,
            Timestamp::Text("2024-05-01 08:30:00".to_string())
        );
    }

    #[test]
    fn primary_key_wins_over_alias() {
        let msg = decode_message(
            r#"{"person":false,"person_found":true,"ts":5,"timestamp":9}"#,
            RECEIVED,
        )
        .unwrap();

        assert!(!msg.person_detected);
        assert_eq!(msg.timestamp, Timestamp::EpochSeconds(5.0));
    }

    #[test]
    fn missing_fields_take_defaults() {
        let msg = decode_message("{}", RECEIVED).unwrap();

        assert!(!msg.person_detected);
        assert!(msg.detections.is_empty());
        assert_eq!(
            msg.timestamp,
            Timestamp::EpochSeconds(RECEIVED.unix_timestamp() as f64)
        );
        assert_eq!(msg.loop_rate_hz, 0.0);
        assert_eq!(msg.det_rate_hz, 0.0);
    }

    #[test]
    fn unknown_fields_are_ignored() {
        let msg = decode_message(r#"{"person":true,"frame_id":77,"extra":{"a":1}}"#, RECEIVED)
            .unwrap();
        assert!(msg.person_detected);
    }

    #[test]
    fn rejects_non_json_and_wrong_types() {
        assert!(decode_message("not json", RECEIVED).is_err());
        assert!(decode_message(r#"{"detections":"none"}"#, RECEIVED).is_err());
        assert!(decode_message("[1,2,3]", RECEIVED).is_err());
    }
}
