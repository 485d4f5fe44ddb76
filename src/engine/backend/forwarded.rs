//! Backend fed by the host shell.
//!
//! On Android the platform `SensorManager` listener lives on the Java side;
//! the host forwards every `onSensorChanged` / `onAccuracyChanged` call
//! through JNI into [`ForwardedBackend::forward`]. Start/stop only gate
//! whether forwarded readings are accepted and record the rate the host
//! should register its listener with. Tests drive it the same way.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Mutex, PoisonError};

use crate::error::SensorError;
use crate::sensor::{AccuracyHint, IngestOutcome, RateHint, RawReading, ReadingIngest};

use super::{BackendStartContext, SensorBackend};

#[derive(Default)]
struct ForwardedState {
    ingest: Option<ReadingIngest>,
    last_ingest: Option<ReadingIngest>,
    rate: Option<RateHint>,
}

/// Accelerometer backend whose readings are pushed in from outside.
pub struct ForwardedBackend {
    name: String,
    available: AtomicBool,
    state: Mutex<ForwardedState>,
    starts: AtomicU32,
    stops: AtomicU32,
}

impl ForwardedBackend {
    pub fn new() -> Self {
        Self::named("forwarded")
    }

    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            available: AtomicBool::new(true),
            state: Mutex::new(ForwardedState::default()),
            starts: AtomicU32::new(0),
            stops: AtomicU32::new(0),
        }
    }

    /// Backend for a device without an accelerometer.
    pub fn unavailable() -> Self {
        let backend = Self::new();
        backend.set_available(false);
        backend
    }

    /// Host reports whether the platform returned a default accelerometer.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Forward one hardware callback. Returns `None` while stopped.
    pub fn forward(&self, values: &[f32], timestamp_nanos: i64) -> Option<IngestOutcome> {
        let ingest = self.state().ingest.clone()?;
        Some(ingest.push(&RawReading::new(values, timestamp_nanos)))
    }

    /// Forward an accuracy change. Returns `false` while stopped.
    pub fn forward_accuracy(&self, accuracy: AccuracyHint) -> bool {
        match self.state().ingest.clone() {
            Some(ingest) => {
                ingest.push_accuracy(accuracy);
                true
            }
            None => false,
        }
    }

    /// Ingest handle of the most recent activation, kept after stop.
    pub fn last_ingest(&self) -> Option<ReadingIngest> {
        self.state().last_ingest.clone()
    }

    pub fn is_running(&self) -> bool {
        self.state().ingest.is_some()
    }

    /// Rate the host should register its platform listener with.
    pub fn requested_rate(&self) -> Option<RateHint> {
        self.state().rate
    }

    pub fn start_count(&self) -> u32 {
        self.starts.load(Ordering::SeqCst)
    }

    pub fn stop_count(&self) -> u32 {
        self.stops.load(Ordering::SeqCst)
    }

    fn state(&self) -> std::sync::MutexGuard<'_, ForwardedState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for ForwardedBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl SensorBackend for ForwardedBackend {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_available(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }

    fn start(&self, ctx: BackendStartContext) -> Result<(), SensorError> {
        if !self.is_available() {
            return Err(SensorError::Unavailable {
                sensor: self.name.clone(),
            });
        }

        let mut state = self.state();
        if state.ingest.is_some() {
            return Err(SensorError::AlreadyRunning);
        }

        state.last_ingest = Some(ctx.ingest.clone());
        state.ingest = Some(ctx.ingest);
        state.rate = Some(ctx.rate);
        self.starts.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn stop(&self) -> Result<(), SensorError> {
        let mut state = self.state();
        if state.ingest.take().is_none() {
            return Err(SensorError::NotRunning);
        }
        state.rate = None;
        self.stops.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn set_rate(&self, rate: RateHint) -> Result<(), SensorError> {
        let mut state = self.state();
        if state.ingest.is_none() {
            return Err(SensorError::NotRunning);
        }
        state.rate = Some(rate);
        Ok(())
    }
}
