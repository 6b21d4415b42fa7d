//! Routing counters.
//!
//! Counters are plain relaxed atomics: they are only read for periodic
//! statistics logging, so no ordering with the registries is required.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::application::router::RouteOutcome;

/// Monotonic counters updated by the router.
#[derive(Debug, Default)]
pub struct BrokerStats {
    frames: AtomicU64,
    unicast: AtomicU64,
    multicast: AtomicU64,
    commands: AtomicU64,
    ignored: AtomicU64,
    delivered: AtomicU64,
    dropped: AtomicU64,
}

/// Point-in-time copy of [`BrokerStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    /// Frames received from any connection.
    pub frames: u64,
    pub unicast: u64,
    pub multicast: u64,
    pub commands: u64,
    pub ignored: u64,
    /// Frames written to a recipient (replies included).
    pub delivered: u64,
    /// Recipients that were not live or timed out.
    pub dropped: u64,
}

impl BrokerStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accounts for one routed frame.
    pub fn record(&self, outcome: &RouteOutcome) {
        self.frames.fetch_add(1, Ordering::Relaxed);
        match outcome {
            RouteOutcome::Unicast { delivery, .. } => {
                self.unicast.fetch_add(1, Ordering::Relaxed);
                self.count_delivery(delivery.is_written());
            }
            RouteOutcome::Multicast {
                delivered, dropped, ..
            } => {
                self.multicast.fetch_add(1, Ordering::Relaxed);
                self.delivered.fetch_add(*delivered as u64, Ordering::Relaxed);
                self.dropped.fetch_add(*dropped as u64, Ordering::Relaxed);
            }
            RouteOutcome::Command { delivery, .. } => {
                self.commands.fetch_add(1, Ordering::Relaxed);
                self.count_delivery(delivery.is_written());
            }
            RouteOutcome::Ignored(_) => {
                self.ignored.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    fn count_delivery(&self, written: bool) {
        let counter = if written { &self.delivered } else { &self.dropped };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            frames: self.frames.load(Ordering::Relaxed),
            unicast: self.unicast.load(Ordering::Relaxed),
            multicast: self.multicast.load(Ordering::Relaxed),
            commands: self.commands.load(Ordering::Relaxed),
            ignored: self.ignored.load(Ordering::Relaxed),
            delivered: self.delivered.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
        }
    }
}

impl StatsSnapshot {
    /// Counter increments between `earlier` and `self`.
    pub fn since(&self, earlier: &StatsSnapshot) -> StatsSnapshot {
        StatsSnapshot {
            frames: self.frames.saturating_sub(earlier.frames),
            unicast: self.unicast.saturating_sub(earlier.unicast),
            multicast: self.multicast.saturating_sub(earlier.multicast),
            commands: self.commands.saturating_sub(earlier.commands),
            ignored: self.ignored.saturating_sub(earlier.ignored),
            delivered: self.delivered.saturating_sub(earlier.delivered),
            dropped: self.dropped.saturating_sub(earlier.dropped),
        }
    }
}
