//! Relay counters exposed through the health endpoint.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

use crate::managers::BroadcastReport;

/// Lock-free counters updated by the ingress loop.
#[derive(Debug, Default)]
pub struct RelayStats {
    received: AtomicU64,
    malformed: AtomicU64,
    broadcast: AtomicU64,
    pruned: AtomicU64,
}

/// Point-in-time copy of [`RelayStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RelayStatsSnapshot {
    /// Datagrams read from the socket, valid or not
    pub received: u64,
    pub malformed: u64,
    /// Messages handed to the broadcaster
    pub broadcast: u64,
    /// Clients removed after a failed delivery
    pub pruned: u64,
}

impl RelayStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_received(&self) {
        self.received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_malformed(&self) {
        self.malformed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_broadcast(&self, report: &BroadcastReport) {
        self.broadcast.fetch_add(1, Ordering::Relaxed);
        self.pruned
            .fetch_add(report.pruned.len() as u64, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> RelayStatsSnapshot {
        RelayStatsSnapshot {
            received: self.received.load(Ordering::Relaxed),
            malformed: self.malformed.load(Ordering::Relaxed),
            broadcast: self.broadcast.load(Ordering::Relaxed),
            pruned: self.pruned.load(Ordering::Relaxed),
        }
    }
}
