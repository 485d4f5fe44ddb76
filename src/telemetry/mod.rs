//! Diagnostics telemetry collector and helpers.
//!
//! The collector keeps sample-rate, drop, sink-fault, source-state and
//! lifecycle events in a bounded history served by the debug tooling.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::{SystemTime, UNIX_EPOCH};

use once_cell::sync::Lazy;

use crate::sensor::SourceState;

pub mod events;

pub use events::{DropReason, LifecyclePhase, MetricEvent};

/// Publish a `SampleRate` event once every this many accepted samples.
const RATE_REPORT_EVERY: u64 = 50;

/// Global telemetry hub shared across the crate.
static HUB: Lazy<TelemetryHub> = Lazy::new(TelemetryHub::default);

/// Access the global telemetry hub.
pub fn hub() -> &'static TelemetryHub {
    &HUB
}

/// Snapshot of collector state for HTTP/CLI reporting.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct TelemetrySnapshot {
    pub recent: Vec<MetricEvent>,
    pub total_events: u64,
    pub dropped_events: u64,
}

/// Collector retaining a bounded history of metrics.
pub struct TelemetryCollector {
    history: Mutex<VecDeque<MetricEvent>>,
    history_capacity: usize,
    total_events: AtomicU64,
    dropped_history: AtomicU64,
}

impl TelemetryCollector {
    pub fn new(history_capacity: usize) -> Self {
        let history_capacity = history_capacity.max(1);
        Self {
            history: Mutex::new(VecDeque::with_capacity(history_capacity)),
            history_capacity,
            total_events: AtomicU64::new(0),
            dropped_history: AtomicU64::new(0),
        }
    }

    pub fn publish(&self, event: MetricEvent) {
        self.total_events.fetch_add(1, Ordering::Relaxed);
        {
            let mut history = self.history.lock().unwrap_or_else(PoisonError::into_inner);
            if history.len() == self.history_capacity {
                history.pop_front();
                self.dropped_history.fetch_add(1, Ordering::Relaxed);
            }
            history.push_back(event);
        }
    }

    pub fn snapshot(&self) -> TelemetrySnapshot {
        let history = self.history.lock().unwrap_or_else(PoisonError::into_inner);
        TelemetrySnapshot {
            recent: history.iter().cloned().collect(),
            total_events: self.total_events.load(Ordering::Relaxed),
            dropped_events: self.dropped_history.load(Ordering::Relaxed),
        }
    }
}

impl Default for TelemetryCollector {
    fn default() -> Self {
        Self::new(64)
    }
}

/// Rolling window of sample timestamps used to estimate the delivered rate.
struct RateTracker {
    timestamps: VecDeque<i64>,
    max_samples: usize,
}

impl RateTracker {
    fn new(max_samples: usize) -> Self {
        Self {
            timestamps: VecDeque::with_capacity(max_samples),
            max_samples: max_samples.max(2),
        }
    }

    /// Record a timestamp and return `(hz, window)`.
    ///
    /// A timestamp earlier than the previous one means a new backend session
    /// began, so the window restarts.
    fn observe(&mut self, timestamp_nanos: i64) -> (f32, usize) {
        if self
            .timestamps
            .back()
            .is_some_and(|last| timestamp_nanos < *last)
        {
            self.timestamps.clear();
        }
        if self.timestamps.len() == self.max_samples {
            self.timestamps.pop_front();
        }
        self.timestamps.push_back(timestamp_nanos);

        let count = self.timestamps.len();
        let span = match (self.timestamps.front(), self.timestamps.back()) {
            (Some(first), Some(last)) => last - first,
            _ => 0,
        };
        let hz = if count < 2 || span <= 0 {
            0.0
        } else {
            (count - 1) as f32 / (span as f32 / 1_000_000_000.0)
        };
        (hz, count)
    }
}

/// Top-level hub wrapping collector state plus derived gauges.
pub struct TelemetryHub {
    collector: TelemetryCollector,
    rate: Mutex<RateTracker>,
    samples_seen: AtomicU64,
    dropped_readings: AtomicU64,
}

impl TelemetryHub {
    pub fn new(history_capacity: usize, rate_window: usize) -> Self {
        Self {
            collector: TelemetryCollector::new(history_capacity),
            rate: Mutex::new(RateTracker::new(rate_window)),
            samples_seen: AtomicU64::new(0),
            dropped_readings: AtomicU64::new(0),
        }
    }

    pub fn snapshot(&self) -> TelemetrySnapshot {
        self.collector.snapshot()
    }

    pub fn samples_seen(&self) -> u64 {
        self.samples_seen.load(Ordering::Relaxed)
    }

    pub fn record_sample(&self, timestamp_nanos: i64) {
        let seen = self.samples_seen.fetch_add(1, Ordering::Relaxed) + 1;
        let (hz, window) = self
            .rate
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .observe(timestamp_nanos);

        if seen % RATE_REPORT_EVERY == 0 {
            self.collector.publish(MetricEvent::SampleRate { hz, window });
        }
    }

    pub fn record_dropped(&self, reason: DropReason) {
        let total = self.dropped_readings.fetch_add(1, Ordering::Relaxed) + 1;
        self.collector
            .publish(MetricEvent::ReadingDropped { reason, total });
    }

    pub fn record_sink_fault(&self, subscription_id: u64, sink: &str) {
        self.collector.publish(MetricEvent::SinkFault {
            subscription_id,
            sink: sink.to_string(),
        });
    }

    pub fn record_source_state(&self, state: SourceState) {
        self.collector.publish(MetricEvent::SourceState {
            state,
            timestamp_ms: now_timestamp_ms(),
        });
    }

    pub fn record_lifecycle(&self, phase: LifecyclePhase) {
        self.collector.publish(MetricEvent::Lifecycle {
            phase,
            timestamp_ms: now_timestamp_ms(),
        });
    }
}

impl Default for TelemetryHub {
    fn default() -> Self {
        Self::new(64, 32)
    }
}

fn now_timestamp_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collector_preserves_order_within_history() {
        let collector = TelemetryCollector::new(3);
        collector.publish(MetricEvent::SampleRate { hz: 5.0, window: 2 });
        collector.publish(MetricEvent::ReadingDropped {
            reason: DropReason::Malformed,
            total: 1,
        });
        collector.publish(MetricEvent::SinkFault {
            subscription_id: 4,
            sink: "view".to_string(),
        });

        let snapshot = collector.snapshot();
        assert_eq!(snapshot.recent.len(), 3);
        assert!(
            matches!(snapshot.recent[0], MetricEvent::SampleRate { hz, .. } if (hz - 5.0).abs() < f32::EPSILON)
        );
        assert!(matches!(snapshot.recent[2], MetricEvent::SinkFault { .. }));
    }

    #[test]
    fn collector_drops_history_when_full() {
        let collector = TelemetryCollector::new(2);
        for total in 1..=3 {
            collector.publish(MetricEvent::ReadingDropped {
                reason: DropReason::Stale,
                total,
            });
        }

        let snapshot = collector.snapshot();
        assert_eq!(snapshot.recent.len(), 2);
        assert_eq!(snapshot.dropped_events, 1);
        assert!(matches!(
            snapshot.recent[0],
            MetricEvent::ReadingDropped { total: 2, .. }
        ));
    }

    #[test]
    fn rate_tracker_estimates_frequency() {
        let mut tracker = RateTracker::new(8);
        let mut last = (0.0, 0);
        for i in 0..8 {
            last = tracker.observe(i * 20_000_000);
        }
        let (hz, window) = last;
        assert_eq!(window, 8);
        assert!((hz - 50.0).abs() < 0.01);
    }

    #[test]
    fn rate_tracker_resets_on_backwards_timestamp() {
        let mut tracker = RateTracker::new(8);
        tracker.observe(1_000_000_000);
        tracker.observe(1_200_000_000);
        let (hz, window) = tracker.observe(0);
        assert_eq!(window, 1);
        assert_eq!(hz, 0.0);
    }

    #[test]
    fn hub_reports_rate_every_n_samples() {
        let hub = TelemetryHub::new(8, 16);
        for i in 0..RATE_REPORT_EVERY as i64 {
            hub.record_sample(i * 5_000_000);
        }

        let snapshot = hub.snapshot();
        assert_eq!(hub.samples_seen(), RATE_REPORT_EVERY);
        assert!(snapshot
            .recent
            .iter()
            .any(|event| matches!(event, MetricEvent::SampleRate { hz, .. } if *hz > 150.0)));
    }

    #[test]
    fn hub_counts_drops_and_lifecycle() {
        let hub = TelemetryHub::new(8, 4);
        hub.record_dropped(DropReason::Malformed);
        hub.record_dropped(DropReason::Stale);
        hub.record_lifecycle(LifecyclePhase::HostActivated);
        hub.record_source_state(SourceState::Active);

        let snapshot = hub.snapshot();
        assert_eq!(snapshot.total_events, 4);
        assert!(matches!(
            snapshot.recent[1],
            MetricEvent::ReadingDropped { total: 2, .. }
        ));
        assert!(matches!(
            snapshot.recent[3],
            MetricEvent::SourceState {
                state: SourceState::Active,
                ..
            }
        ));
    }
}
