//! Wall-clock access and log timestamp formatting.

use time::macros::format_description;
use time::format_description::well_known::Rfc3339;
use time::{OffsetDateTime, PrimitiveDateTime, Time, UtcOffset};

use crate::telemetry::Timestamp;

/// Trait representing the wall clock used for receive times and fallbacks.
pub trait TimeSource: Send + Sync {
    fn now(&self) -> OffsetDateTime;
}

/// Default time source backed by the system clock.
#[derive(Default)]
pub struct SystemTimeSource {
    _unit: (),
}

impl TimeSource for SystemTimeSource {
    fn now(&self) -> OffsetDateTime {
        OffsetDateTime::now_utc()
    }
}

/// Time source frozen at one instant, for deterministic tests and replays.
#[derive(Debug, Clone, Copy)]
pub struct FixedTimeSource {
    at: OffsetDateTime,
}

impl FixedTimeSource {
    pub fn new(at: OffsetDateTime) -> Self {
        Self { at }
    }
}

impl TimeSource for FixedTimeSource {
    fn now(&self) -> OffsetDateTime {
        self.at
    }
}

/// Format a telemetry timestamp as `HH:MM:SS` for the event log.
///
/// Instants (epoch seconds, RFC 3339) are shown at `offset`; naive calendar
/// text is shown as written. Unparseable values fall back to `now`.
pub fn format_log_time(timestamp: &Timestamp, offset: UtcOffset, now: OffsetDateTime) -> String {
    let time = wall_time(timestamp, offset).unwrap_or_else(|| now.to_offset(offset).time());
    format!(
        "{:02}:{:02}:{:02}",
        time.hour(),
        time.minute(),
        time.second()
    )
}

fn wall_time(timestamp: &Timestamp, offset: UtcOffset) -> Option<Time> {
    match timestamp {
        Timestamp::EpochSeconds(seconds) => epoch_wall_time(*seconds, offset),
        Timestamp::Text(text) => text_wall_time(text.trim(), offset),
    }
}

fn epoch_wall_time(seconds: f64, offset: UtcOffset) -> Option<Time> {
    if !seconds.is_finite() {
        return None;
    }
    let nanos = (seconds * 1_000_000_000.0) as i128;
    OffsetDateTime::from_unix_timestamp_nanos(nanos)
        .ok()
        .map(|at| at.to_offset(offset).time())
}

fn text_wall_time(text: &str, offset: UtcOffset) -> Option<Time> {
    if let Ok(at) = OffsetDateTime::parse(text, &Rfc3339) {
        return Some(at.to_offset(offset).time());
    }

    let naive = PrimitiveDateTime::parse(
        text,
        format_description!("[year]-[month]-[day] [hour]:[minute]:[second]"),
    )
    .or_else(|_| {
        PrimitiveDateTime::parse(
            text,
            format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]"),
        )
    })
    .or_else(|_| {
        PrimitiveDateTime::parse(
            text,
            format_description!("[year]-[month]-[day] [hour]:[minute]:[second].[subsecond]"),
        )
    })
    .or_else(|_| {
        PrimitiveDateTime::parse(
            text,
            format_description!("[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond]"),
        )
    });
    if let Ok(at) = naive {
        return Some(at.time());
    }

    if let Ok(time) = Time::parse(text, format_description!("[hour]:[minute]:[second]")) {
        return Some(time);
    }

    // Some producers send the epoch as a string.
    text.parse::<f64>()
        .ok()
        .and_then(|seconds| epoch_wall_time(seconds, offset))
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::{datetime, offset};

    const NOW: OffsetDateTime = datetime!(2024-05-01 12:34:56 UTC);

    fn fmt(ts: Timestamp) -> String {
        format_log_time(&ts, UtcOffset::UTC, NOW)
    }

    #[test]
    fn formats_epoch_seconds() {
        assert_eq!(fmt(Timestamp::EpochSeconds(1000.0)), "00:16:40");
        assert_eq!(fmt(Timestamp::EpochSeconds(1000.75)), "00:16:40");
    }

    #[test]
    fn applies_display_offset_to_instants() {
        let ts = Timestamp::EpochSeconds(1000.0);
        assert_eq!(format_log_time(&ts, offset!(+7), NOW), "07:16:40");

        let rfc = Timestamp::Text("2024-05-01T10:00:05+02:00".to_string());
        assert_eq!(format_log_time(&rfc, UtcOffset::UTC, NOW), "08:00:05");
    }

    #[test]
    fn naive_text_is_shown_as_written() {
        let ts = Timestamp::Text("2024-05-01 08:30:15".to_string());
        assert_eq!(format_log_time(&ts, offset!(+7), NOW), "08:30:15");
        assert_eq!(fmt(Timestamp::Text("2024-05-01T08:30:15.250".to_string())), "08:30:15");
        assert_eq!(fmt(Timestamp::Text("23:59:01".to_string())), "23:59:01");
    }

    #[test]
    fn numeric_text_is_epoch() {
        assert_eq!(fmt(Timestamp::Text("1000".to_string())), "00:16:40");
    }

    #[test]
    fn unparseable_falls_back_to_now() {
        assert_eq!(fmt(Timestamp::Text("yesterday-ish".to_string())), "12:34:56");
        assert_eq!(fmt(Timestamp::EpochSeconds(f64::INFINITY)), "12:34:56");
        assert_eq!(fmt(Timestamp::EpochSeconds(1e30)), "12:34:56");
    }

    #[test]
    fn fixed_time_source_is_stable() {
        let clock = FixedTimeSource::new(NOW);
        assert_eq!(clock.now(), clock.now());
    }
}
