//! Periodic statistics logging (`--statistics`).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::time::{interval, MissedTickBehavior};
use tracing::info;

use crate::application::{Broker, StatsSnapshot};

/// Logs the message rate every `period` until `running` is cleared.
pub async fn run_stats_reporter(broker: Arc<Broker>, period: Duration, running: Arc<AtomicBool>) {
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately.
    ticker.tick().await;

    let mut previous = broker.stats().snapshot();
    while running.load(Ordering::Relaxed) {
        ticker.tick().await;
        let current = broker.stats().snapshot();
        let live = broker.registries().await.connections.len();
        info!("{}", format_rate(&current.since(&previous), period, live));
        previous = current;
    }
}

/// Renders one statistics line.
pub fn format_rate(delta: &StatsSnapshot, period: Duration, live: usize) -> String {
    let secs = period.as_secs_f64().max(f64::EPSILON);
    format!(
        "{:.1} msg/s ({} unicast, {} multicast, {} commands, {} ignored; {} delivered, {} dropped) {} connections",
        delta.frames as f64 / secs,
        delta.unicast,
        delta.multicast,
        delta.commands,
        delta.ignored,
        delta.delivered,
        delta.dropped,
        live,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_rate_divides_by_period() {
        let delta = StatsSnapshot {
            frames: 50,
            multicast: 50,
            delivered: 100,
            ..StatsSnapshot::default()
        };

        let line = format_rate(&delta, Duration::from_secs(10), 3);

        assert!(line.starts_with("5.0 msg/s"));
        assert!(line.contains("50 multicast"));
        assert!(line.ends_with("3 connections"));
    }
}
