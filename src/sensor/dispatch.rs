//! Per-sink delivery.
//!
//! Every registered sink is wrapped in a [`SinkEntry`] that owns its delivery
//! route. `Inline` routes call the sink on the delivery thread; `Isolated`
//! routes push into a lock-free SPSC ring drained by a dedicated worker so a
//! slow sink cannot stall the others.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use rtrb::{Consumer, Producer, RingBuffer};
use serde::{Deserialize, Serialize};

use crate::error::SensorError;
use crate::telemetry;

use super::rate::RateHint;
use super::sample::{AccuracyHint, OrientationSample};
use super::sink::SampleSink;

/// Upper bound on how long an idle isolated worker sleeps between polls.
const IDLE_PARK: Duration = Duration::from_millis(50);

/// How samples reach a sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchMode {
    /// Queue per sink, drained by a dedicated worker thread
    #[default]
    Isolated,
    /// Call the sink directly on the delivery thread. Sinks run one after
    /// another, so a slow sink delays the ones registered after it.
    Inline,
}

/// Source-wide delivery counters.
#[derive(Default)]
pub(crate) struct DispatchCounters {
    accepted: AtomicU64,
    malformed: AtomicU64,
    stale: AtomicU64,
    sink_faults: AtomicU64,
    queue_overflows: AtomicU64,
}

impl DispatchCounters {
    pub(crate) fn record_accepted(&self) {
        self.accepted.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_malformed(&self) {
        self.malformed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_stale(&self) {
        self.stale.fetch_add(1, Ordering::Relaxed);
    }

    fn record_fault(&self) {
        self.sink_faults.fetch_add(1, Ordering::Relaxed);
    }

    fn record_overflow(&self) {
        self.queue_overflows.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> SourceStats {
        SourceStats {
            accepted: self.accepted.load(Ordering::Relaxed),
            malformed: self.malformed.load(Ordering::Relaxed),
            stale: self.stale.load(Ordering::Relaxed),
            sink_faults: self.sink_faults.load(Ordering::Relaxed),
            queue_overflows: self.queue_overflows.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of the delivery counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceStats {
    /// Readings normalized into samples and dispatched
    pub accepted: u64,
    /// Partial or non-finite readings dropped before dispatch
    pub malformed: u64,
    /// Readings from a backend session that had already been stopped
    pub stale: u64,
    /// Sink callbacks that panicked
    pub sink_faults: u64,
    /// Samples dropped because an isolated sink's queue was full
    pub queue_overflows: u64,
}

enum SinkMessage {
    Sample(OrientationSample),
    Accuracy(AccuracyHint),
}

enum Route {
    Inline(Arc<dyn SampleSink>),
    Isolated {
        producer: Mutex<Producer<SinkMessage>>,
        worker: thread::Thread,
    },
}

/// Result of handing one message to one sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum DeliveryOutcome {
    Delivered,
    Queued,
    Faulted,
    Overflow,
    Inactive,
}

/// A registered sink together with its delivery route.
pub(crate) struct SinkEntry {
    pub(crate) id: u64,
    pub(crate) key: usize,
    pub(crate) rate: RateHint,
    name: String,
    active: Arc<AtomicBool>,
    counters: Arc<DispatchCounters>,
    route: Route,
}

impl SinkEntry {
    pub(crate) fn new(
        id: u64,
        sink: Arc<dyn SampleSink>,
        rate: RateHint,
        mode: DispatchMode,
        queue_capacity: usize,
        counters: Arc<DispatchCounters>,
    ) -> Result<Self, SensorError> {
        let key = sink_key(&sink);
        let name = sink.name().to_string();
        let active = Arc::new(AtomicBool::new(true));

        let route = match mode {
            DispatchMode::Inline => Route::Inline(sink),
            DispatchMode::Isolated => {
                let (producer, consumer) = RingBuffer::new(queue_capacity.max(1));
                let worker_active = Arc::clone(&active);
                let worker_counters = Arc::clone(&counters);
                let worker_name = name.clone();
                let handle = thread::Builder::new()
                    .name(format!("tilt-sink-{}", id))
                    .spawn(move || {
                        run_worker(
                            id,
                            &worker_name,
                            sink,
                            consumer,
                            worker_active,
                            worker_counters,
                        )
                    })?;
                Route::Isolated {
                    producer: Mutex::new(producer),
                    worker: handle.thread().clone(),
                }
            }
        };

        Ok(Self {
            id,
            key,
            rate,
            name,
            active,
            counters,
            route,
        })
    }

    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Stop delivery. A message already being handled may still complete.
    pub(crate) fn deactivate(&self) {
        self.active.store(false, Ordering::Release);
        if let Route::Isolated { worker, .. } = &self.route {
            worker.unpark();
        }
    }

    pub(crate) fn deliver(&self, sample: &OrientationSample) -> DeliveryOutcome {
        self.route_message(SinkMessage::Sample(*sample))
    }

    pub(crate) fn deliver_accuracy(&self, accuracy: AccuracyHint) -> DeliveryOutcome {
        self.route_message(SinkMessage::Accuracy(accuracy))
    }

    fn route_message(&self, message: SinkMessage) -> DeliveryOutcome {
        if !self.is_active() {
            return DeliveryOutcome::Inactive;
        }

        match &self.route {
            Route::Inline(sink) => invoke(self.id, &self.name, sink.as_ref(), message, &self.counters),
            Route::Isolated { producer, worker } => {
                let pushed = {
                    let mut producer = producer.lock().unwrap_or_else(|err| err.into_inner());
                    producer.push(message).is_ok()
                };

                if pushed {
                    worker.unpark();
                    DeliveryOutcome::Queued
                } else {
                    self.counters.record_overflow();
                    tracing::warn!(
                        "[OrientationSource] Queue full for sink '{}' (#{}); dropping sample",
                        self.name, self.id
                    );
                    DeliveryOutcome::Overflow
                }
            }
        }
    }
}

/// Identity of a sink allocation, used to reject duplicate subscriptions.
pub(crate) fn sink_key(sink: &Arc<dyn SampleSink>) -> usize {
    Arc::as_ptr(sink) as *const () as usize
}

fn invoke(
    id: u64,
    name: &str,
    sink: &dyn SampleSink,
    message: SinkMessage,
    counters: &DispatchCounters,
) -> DeliveryOutcome {
    let result = catch_unwind(AssertUnwindSafe(|| match &message {
        SinkMessage::Sample(sample) => sink.on_sample(sample),
        SinkMessage::Accuracy(accuracy) => sink.on_accuracy_changed(*accuracy),
    }));

    match result {
        Ok(()) => DeliveryOutcome::Delivered,
        Err(_) => {
            counters.record_fault();
            telemetry::hub().record_sink_fault(id, name);
            tracing::error!(
                "[OrientationSource] Sink '{}' (#{}) panicked; continuing delivery",
                name, id
            );
            DeliveryOutcome::Faulted
        }
    }
}

fn run_worker(
    id: u64,
    name: &str,
    sink: Arc<dyn SampleSink>,
    mut consumer: Consumer<SinkMessage>,
    active: Arc<AtomicBool>,
    counters: Arc<DispatchCounters>,
) {
    while active.load(Ordering::Acquire) {
        match consumer.pop() {
            Ok(message) => {
                if !active.load(Ordering::Acquire) {
                    break;
                }
                invoke(id, name, sink.as_ref(), message, &counters);
            }
            Err(_) => {
                if consumer.is_abandoned() {
                    break;
                }
                thread::park_timeout(IDLE_PARK);
            }
        }
    }
    tracing::debug!("[OrientationSource] Worker for sink '{}' (#{}) exited", name, id);
}
