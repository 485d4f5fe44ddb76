// Process-wide API used by the JNI bridge and other host integrations.
// The host shell drives the engine through these free functions; the engine
// itself is created lazily on first use.

use once_cell::sync::Lazy;

use crate::engine::TiltEngine;
use crate::error::SubscriptionError;
use crate::indicator::IndicatorSnapshot;
use crate::sensor::{IngestOutcome, RateHint, SourceStats};

// Re-export error code constants for host exposure
pub use crate::error::{SensorErrorCodes, SubscriptionErrorCodes};

/// Global TiltEngine instance
///
/// Holds the orientation source, the tilt indicator and the broadcast
/// channels for the lifetime of the process.
static ENGINE: Lazy<TiltEngine> = Lazy::new(TiltEngine::new);

/// Access the global engine (CLI/debug tooling).
pub fn engine() -> &'static TiltEngine {
    &ENGINE
}

/// Get the version of the sensor core
pub fn version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

/// Host became visible: start delivering samples to the tilt indicator
///
/// Calling it while already active is a no-op.
///
/// # Errors
/// - `SensorUnavailable` if the device has no accelerometer
/// - `Backend` if the platform refused the registration
pub fn activate() -> Result<(), SubscriptionError> {
    ENGINE.activate()
}

/// Host went to the background: stop delivering samples
///
/// Calling it while inactive is a no-op.
pub fn deactivate() -> Result<(), SubscriptionError> {
    ENGINE.deactivate()
}

/// Whether the orientation source currently has at least one sink
pub fn is_active() -> bool {
    ENGINE.is_active()
}

/// Current tilt bubble geometry
pub fn indicator() -> IndicatorSnapshot {
    ENGINE.indicator_snapshot()
}

/// Renderer reports its canvas size
pub fn set_canvas(width: f32, height: f32) {
    ENGINE.set_canvas(width, height)
}

/// Forward one platform reading (`SensorEvent.values`, `SensorEvent.timestamp`)
pub fn on_sensor_changed(values: &[f32], timestamp_nanos: i64) -> Option<IngestOutcome> {
    ENGINE.forward_reading(values, timestamp_nanos)
}

/// Forward a platform accuracy status code
pub fn on_accuracy_changed(status: i32) -> bool {
    ENGINE.forward_accuracy(status)
}

/// Host reports whether `getDefaultSensor(TYPE_ACCELEROMETER)` returned a sensor
pub fn set_sensor_available(available: bool) {
    ENGINE.set_sensor_available(available)
}

/// Rate the host should register its platform listener with
pub fn requested_rate() -> Option<RateHint> {
    ENGINE.requested_rate()
}

/// Delivery counters of the global source
pub fn stats() -> SourceStats {
    ENGINE.stats()
}
