// Presentation buffers: bounded rolling windows over an unbounded stream
//
// EventLog keeps the newest entry first; ConfidenceSeries keeps points in
// arrival order for the chart. Both evict the oldest item on overflow.

use std::collections::VecDeque;

use super::entry::LogEntry;

/// Default number of log rows kept per session.
pub const DEFAULT_LOG_CAPACITY: usize = 50;

/// Default number of chart points kept per session.
pub const DEFAULT_SERIES_CAPACITY: usize = 60;

/// Newest-first log of accepted telemetry.
#[derive(Debug, Clone)]
pub struct EventLog {
    entries: VecDeque<LogEntry>,
    capacity: usize,
}

impl EventLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Insert at the front, dropping the oldest entry when full.
    pub fn push(&mut self, entry: LogEntry) {
        if self.capacity == 0 {
            return;
        }
        if self.entries.len() == self.capacity {
            self.entries.pop_back();
        }
        self.entries.push_front(entry);
    }

    pub fn newest(&self) -> Option<&LogEntry> {
        self.entries.front()
    }

    pub fn iter(&self) -> impl Iterator<Item = &LogEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn to_vec(&self) -> Vec<LogEntry> {
        self.entries.iter().cloned().collect()
    }
}

impl Default for EventLog {
    fn default() -> Self {
        Self::new(DEFAULT_LOG_CAPACITY)
    }
}

/// Rolling confidence values, oldest first.
#[derive(Debug, Clone)]
pub struct ConfidenceSeries {
    points: VecDeque<f64>,
    capacity: usize,
}

impl ConfidenceSeries {
    pub fn new(capacity: usize) -> Self {
        Self {
            points: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append at the end, dropping the oldest point when full.
    pub fn push(&mut self, value: f64) {
        if self.capacity == 0 {
            return;
        }
        if self.points.len() == self.capacity {
            self.points.pop_front();
        }
        self.points.push_back(value);
    }

    pub fn latest(&self) -> Option<f64> {
        self.points.back().copied()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.points.clear();
    }

    pub fn to_vec(&self) -> Vec<f64> {
        self.points.iter().copied().collect()
    }
}

impl Default for ConfidenceSeries {
    fn default() -> Self {
        Self::new(DEFAULT_SERIES_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::entry::EntryStatus;

    fn entry(n: usize) -> LogEntry {
        LogEntry {
            time: format!("00:00:{:02}", n % 60),
            object: format!("obj-{}", n),
            confidence: 0.5,
            confidence_text: "50%".to_string(),
            status: EntryStatus::Ok,
        }
    }

    #[test]
    fn event_log_is_newest_first_and_bounded() {
        let mut log = EventLog::default();
        for n in 0..120 {
            log.push(entry(n));
            assert!(log.len() <= DEFAULT_LOG_CAPACITY);
        }

        assert_eq!(log.len(), 50);
        assert_eq!(log.newest().unwrap().object, "obj-119");
        assert_eq!(log.iter().last().unwrap().object, "obj-70");
    }

    #[test]
    fn series_drops_oldest_point() {
        let mut series = ConfidenceSeries::new(3);
        for value in [0.1, 0.2, 0.3, 0.4] {
            series.push(value);
        }
        assert_eq!(series.to_vec(), vec![0.2, 0.3, 0.4]);
        assert_eq!(series.latest(), Some(0.4));
    }

    #[test]
    fn series_default_capacity() {
        let mut series = ConfidenceSeries::default();
        for n in 0..200 {
            series.push(n as f64);
            assert!(series.len() <= DEFAULT_SERIES_CAPACITY);
        }
        assert_eq!(series.len(), 60);
        assert_eq!(series.to_vec()[0], 140.0);
    }

    #[test]
    fn zero_capacity_keeps_nothing() {
        let mut log = EventLog::new(0);
        log.push(entry(1));
        assert!(log.is_empty());

        let mut series = ConfidenceSeries::new(0);
        series.push(1.0);
        assert!(series.is_empty());
    }

    #[test]
    fn clear_empties_buffers() {
        let mut log = EventLog::default();
        let mut series = ConfidenceSeries::default();
        log.push(entry(1));
        series.push(0.3);
        log.clear();
        series.clear();
        assert!(log.is_empty());
        assert!(series.is_empty());
    }
}
