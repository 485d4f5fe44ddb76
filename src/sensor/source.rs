//! OrientationSource: bridges one sensor backend to zero or more sinks.
//!
//! Lock order is `delivery` then `registration`. Sinks are always invoked
//! outside the registration lock, so a sink may unsubscribe itself (or
//! others) from inside its callback.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::engine::backend::{BackendStartContext, SensorBackend};
use crate::error::{log_sensor_error, log_subscription_error, SensorError, SubscriptionError};
use crate::telemetry::{self, DropReason};

use super::dispatch::{sink_key, DeliveryOutcome, DispatchCounters, DispatchMode, SinkEntry, SourceStats};
use super::rate::RateHint;
use super::registry::SinkRegistry;
use super::sample::{AccuracyHint, OrientationSample, RawReading};
use super::sink::SampleSink;

static NEXT_SOURCE_ID: AtomicU64 = AtomicU64::new(1);

/// Lifecycle of an [`OrientationSource`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceState {
    Inactive,
    Active,
}

/// Token for one (source, sink) registration.
///
/// Handles are `Copy` so a stale handle can be presented again; doing so
/// yields [`SubscriptionError::UnknownHandle`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionHandle {
    source_id: u64,
    id: u64,
}

impl SubscriptionHandle {
    pub fn id(&self) -> u64 {
        self.id
    }
}

/// Outcome of ingesting one raw reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestOutcome {
    /// Partial or non-finite reading, dropped
    Malformed,
    /// Reading from a backend session that has since been stopped
    Stale,
    /// Valid reading but no sink registered
    Idle,
    /// Sample handed to `sinks` registered sinks
    Delivered { sinks: usize },
}

/// Dispatch options for a source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceOptions {
    pub dispatch: DispatchMode,
    /// Per-sink queue depth in [`DispatchMode::Isolated`]
    pub queue_capacity: usize,
}

impl SourceOptions {
    /// Synchronous delivery on the producer thread, without per-sink isolation.
    pub fn inline() -> Self {
        Self {
            dispatch: DispatchMode::Inline,
            ..Self::default()
        }
    }
}

impl Default for SourceOptions {
    fn default() -> Self {
        Self {
            dispatch: DispatchMode::Isolated,
            queue_capacity: 64,
        }
    }
}

struct Registration {
    sinks: SinkRegistry,
    state: SourceState,
    running_rate: Option<RateHint>,
}

struct SourceInner {
    id: u64,
    backend: Arc<dyn SensorBackend>,
    options: SourceOptions,
    registration: Mutex<Registration>,
    delivery: Mutex<()>,
    session: AtomicU64,
    counters: Arc<DispatchCounters>,
}

/// Wraps a 3-axis motion sensor and pushes normalized samples to sinks.
///
/// Cloning yields another handle to the same source.
#[derive(Clone)]
pub struct OrientationSource {
    inner: Arc<SourceInner>,
}

impl OrientationSource {
    pub fn new(backend: Arc<dyn SensorBackend>) -> Self {
        Self::with_options(backend, SourceOptions::default())
    }

    pub fn with_options(backend: Arc<dyn SensorBackend>, options: SourceOptions) -> Self {
        Self {
            inner: Arc::new(SourceInner {
                id: NEXT_SOURCE_ID.fetch_add(1, Ordering::Relaxed),
                backend,
                options,
                registration: Mutex::new(Registration {
                    sinks: SinkRegistry::default(),
                    state: SourceState::Inactive,
                    running_rate: None,
                }),
                delivery: Mutex::new(()),
                session: AtomicU64::new(0),
                counters: Arc::new(DispatchCounters::default()),
            }),
        }
    }

    /// Register `sink` to receive samples at roughly `rate`.
    ///
    /// The first subscription starts the backend and moves the source to
    /// `Active`. If the backend reports no hardware the call fails with
    /// `SensorUnavailable` and the source stays `Inactive`.
    pub fn subscribe(
        &self,
        sink: Arc<dyn SampleSink>,
        rate: RateHint,
    ) -> Result<SubscriptionHandle, SubscriptionError> {
        let inner = &self.inner;
        let mut registration = inner.lock_registration()?;

        if let Some(existing) = registration.sinks.find_key(sink_key(&sink)) {
            let err = SubscriptionError::AlreadySubscribed {
                subscription_id: existing,
            };
            log_subscription_error(&err, "subscribe");
            return Err(err);
        }

        if registration.state == SourceState::Inactive && !inner.backend.is_available() {
            let err = SubscriptionError::SensorUnavailable;
            log_subscription_error(&err, "subscribe");
            return Err(err);
        }

        let id = registration.sinks.allocate_id();
        let entry = Arc::new(
            SinkEntry::new(
                id,
                sink,
                rate,
                inner.options.dispatch,
                inner.options.queue_capacity,
                Arc::clone(&inner.counters),
            )
            .map_err(SubscriptionError::from)?,
        );

        match registration.state {
            SourceState::Inactive => {
                let session = inner.session.fetch_add(1, Ordering::AcqRel) + 1;
                let ctx = BackendStartContext {
                    rate,
                    ingest: ReadingIngest {
                        source: Arc::downgrade(inner),
                        session,
                    },
                };

                if let Err(err) = inner.backend.start(ctx) {
                    entry.deactivate();
                    inner.session.fetch_add(1, Ordering::AcqRel);
                    log_sensor_error(&err, "subscribe");
                    return Err(err.into());
                }

                registration.state = SourceState::Active;
                registration.running_rate = Some(rate);
                telemetry::hub().record_source_state(SourceState::Active);
                info!(
                    "[OrientationSource] Activated backend '{}' at {} rate",
                    inner.backend.name(),
                    rate
                );
            }
            SourceState::Active => {
                if registration.running_rate.map_or(true, |current| rate < current) {
                    inner.apply_rate(&mut registration, rate);
                }
            }
        }

        info!(
            "[OrientationSource] Subscribed sink '{}' (#{}) at {} rate",
            entry.name(),
            id,
            rate
        );
        registration.sinks.insert(entry);

        Ok(SubscriptionHandle {
            source_id: inner.id,
            id,
        })
    }

    /// Remove a registration.
    ///
    /// Releasing the last sink stops the backend and returns the source to
    /// `Inactive`. A sample already in flight to the sink may still arrive.
    pub fn unsubscribe(&self, handle: SubscriptionHandle) -> Result<(), SubscriptionError> {
        let inner = &self.inner;
        let unknown = SubscriptionError::UnknownHandle {
            subscription_id: handle.id,
        };

        if handle.source_id != inner.id {
            log_subscription_error(&unknown, "unsubscribe");
            return Err(unknown);
        }

        let mut registration = inner.lock_registration()?;
        let entry = match registration.sinks.remove(handle.id) {
            Some(entry) => entry,
            None => {
                log_subscription_error(&unknown, "unsubscribe");
                return Err(unknown);
            }
        };
        entry.deactivate();
        info!(
            "[OrientationSource] Unsubscribed sink '{}' (#{})",
            entry.name(),
            entry.id
        );

        if registration.sinks.is_empty() {
            inner.session.fetch_add(1, Ordering::AcqRel);
            registration.state = SourceState::Inactive;
            registration.running_rate = None;
            if let Err(err) = inner.backend.stop() {
                log_sensor_error(&err, "unsubscribe");
            }
            telemetry::hub().record_source_state(SourceState::Inactive);
            info!(
                "[OrientationSource] Deactivated backend '{}'",
                inner.backend.name()
            );
        } else if let Some(fastest) = registration.sinks.fastest_rate() {
            if registration.running_rate != Some(fastest) {
                inner.apply_rate(&mut registration, fastest);
            }
        }

        Ok(())
    }

    /// Normalize and deliver one reading to every registered sink.
    pub fn ingest(&self, reading: &RawReading) -> IngestOutcome {
        self.inner.ingest(reading)
    }

    /// Forward a hardware accuracy change to every registered sink.
    pub fn ingest_accuracy(&self, accuracy: AccuracyHint) {
        self.inner.ingest_accuracy(accuracy)
    }

    pub fn id(&self) -> u64 {
        self.inner.id
    }

    pub fn state(&self) -> SourceState {
        self.inner.registration_guard().state
    }

    pub fn is_active(&self) -> bool {
        self.state() == SourceState::Active
    }

    pub fn sink_count(&self) -> usize {
        self.inner.registration_guard().sinks.len()
    }

    /// Rate the backend currently runs at, `None` while inactive.
    pub fn effective_rate(&self) -> Option<RateHint> {
        self.inner.registration_guard().running_rate
    }

    pub fn stats(&self) -> SourceStats {
        self.inner.counters.snapshot()
    }

    pub fn backend_name(&self) -> &str {
        self.inner.backend.name()
    }
}

impl fmt::Debug for OrientationSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OrientationSource")
            .field("id", &self.inner.id)
            .field("backend", &self.inner.backend.name())
            .field("state", &self.state())
            .finish()
    }
}

impl SourceInner {
    fn lock_registration(&self) -> Result<MutexGuard<'_, Registration>, SubscriptionError> {
        self.registration.lock().map_err(|_| {
            SubscriptionError::Backend(SensorError::LockPoisoned {
                component: "sink registry".to_string(),
            })
        })
    }

    fn registration_guard(&self) -> MutexGuard<'_, Registration> {
        self.registration
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn apply_rate(&self, registration: &mut Registration, rate: RateHint) {
        match self.backend.set_rate(rate) {
            Ok(()) => {
                registration.running_rate = Some(rate);
                info!("[OrientationSource] Backend rate now {}", rate);
            }
            Err(err) => log_sensor_error(&err, "set_rate"),
        }
    }

    fn ingest(&self, reading: &RawReading) -> IngestOutcome {
        let sample = match OrientationSample::from_reading(reading) {
            Some(sample) => sample,
            None => {
                self.counters.record_malformed();
                telemetry::hub().record_dropped(DropReason::Malformed);
                tracing::trace!(
                    "[OrientationSource] Dropping malformed reading ({} values)",
                    reading.values.len()
                );
                return IngestOutcome::Malformed;
            }
        };

        let _delivery = self.delivery.lock().unwrap_or_else(PoisonError::into_inner);
        let targets = self.registration_guard().sinks.snapshot();
        if targets.is_empty() {
            return IngestOutcome::Idle;
        }

        self.counters.record_accepted();
        telemetry::hub().record_sample(sample.timestamp_nanos);

        let sinks = targets
            .iter()
            .map(|entry| entry.deliver(&sample))
            .filter(|outcome| {
                matches!(outcome, DeliveryOutcome::Delivered | DeliveryOutcome::Queued)
            })
            .count();

        IngestOutcome::Delivered { sinks }
    }

    fn ingest_accuracy(&self, accuracy: AccuracyHint) {
        let _delivery = self.delivery.lock().unwrap_or_else(PoisonError::into_inner);
        let targets = self.registration_guard().sinks.snapshot();
        for entry in targets {
            entry.deliver_accuracy(accuracy);
        }
    }
}

impl Drop for SourceInner {
    fn drop(&mut self) {
        let registration = self
            .registration
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner);

        for entry in registration.sinks.snapshot() {
            entry.deactivate();
        }

        if registration.state == SourceState::Active {
            warn!(
                "[OrientationSource] Dropped while active; stopping backend '{}'",
                self.backend.name()
            );
            if let Err(err) = self.backend.stop() {
                log_sensor_error(&err, "drop");
            }
        }
    }
}

/// Callback handle given to a backend on start.
///
/// Readings pushed after the source stopped that backend session are
/// rejected as stale, so a producer thread that is still winding down cannot
/// leak samples into a later session.
#[derive(Clone)]
pub struct ReadingIngest {
    source: Weak<SourceInner>,
    session: u64,
}

impl ReadingIngest {
    pub fn push(&self, reading: &RawReading) -> IngestOutcome {
        match self.current_source() {
            Some(inner) => inner.ingest(reading),
            None => IngestOutcome::Stale,
        }
    }

    pub fn push_accuracy(&self, accuracy: AccuracyHint) {
        if let Some(inner) = self.current_source() {
            inner.ingest_accuracy(accuracy);
        }
    }

    /// Whether the session this handle was issued for is still running.
    pub fn is_current(&self) -> bool {
        self.source
            .upgrade()
            .map(|inner| inner.session.load(Ordering::Acquire) == self.session)
            .unwrap_or(false)
    }

    fn current_source(&self) -> Option<Arc<SourceInner>> {
        let inner = self.source.upgrade()?;
        if inner.session.load(Ordering::Acquire) != self.session {
            inner.counters.record_stale();
            telemetry::hub().record_dropped(DropReason::Stale);
            return None;
        }
        Some(inner)
    }
}

impl fmt::Debug for ReadingIngest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReadingIngest")
            .field("session", &self.session)
            .field("current", &self.is_current())
            .finish()
    }
}
