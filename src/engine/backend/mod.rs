//! Backend abstractions for the orientation source.

use std::time::Instant;

use crate::error::SensorError;
use crate::sensor::{RateHint, ReadingIngest};

/// Context provided to sensor backends when the source activates.
///
/// `ingest` is only valid for this activation; once the source stops the
/// backend, readings pushed through it are discarded as stale.
pub struct BackendStartContext {
    pub rate: RateHint,
    pub ingest: ReadingIngest,
}

/// Trait implemented by platform-specific accelerometer backends.
///
/// Only the owning [`OrientationSource`](crate::sensor::OrientationSource)
/// starts and stops a backend; it is shared by all of the source's sinks.
/// `stop` must not wait on the producer thread, since that thread may be
/// blocked delivering into the source.
pub trait SensorBackend: Send + Sync {
    fn name(&self) -> &str;
    fn is_available(&self) -> bool;
    fn start(&self, ctx: BackendStartContext) -> Result<(), SensorError>;
    fn stop(&self) -> Result<(), SensorError>;
    fn set_rate(&self, rate: RateHint) -> Result<(), SensorError>;
}

/// Trait representing a monotonic time source used for telemetry timestamps.
pub trait TimeSource: Send + Sync {
    fn now(&self) -> Instant;
}

/// Default time source backed by `Instant::now`.
#[derive(Default)]
pub struct SystemTimeSource {
    _unit: (),
}

impl TimeSource for SystemTimeSource {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

mod forwarded;
mod simulated;

pub use forwarded::ForwardedBackend;
pub use simulated::{SimulatedBackend, StubTimeSource};
