//! Orientation sample types and raw reading normalization.

use serde::{Deserialize, Serialize};

/// Number of axes a reading must carry to become an [`OrientationSample`].
pub const AXIS_COUNT: usize = 3;

/// A single timestamped 3-axis accelerometer reading.
///
/// `x` and `y` carry device tilt in gravity-scaled units (roughly -10..10):
/// - `x`: tilting the top edge up gives -10..0, down gives 0..10
/// - `y`: tilting left gives -10..0, right gives 0..10
///
/// `z` is captured for completeness; the tilt indicator ignores it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OrientationSample {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub timestamp_nanos: i64,
}

impl OrientationSample {
    /// Build a sample from a raw reading.
    ///
    /// Returns `None` for partial readings (fewer than three values) or when any
    /// of the first three values is NaN or infinite. Extra trailing values are
    /// ignored, matching platforms that append uncalibrated/bias components.
    pub fn from_reading(reading: &RawReading) -> Option<Self> {
        let [x, y, z] = match reading.values.get(..AXIS_COUNT)? {
            [x, y, z] => [*x, *y, *z],
            _ => return None,
        };

        if !(x.is_finite() && y.is_finite() && z.is_finite()) {
            return None;
        }

        Some(Self {
            x,
            y,
            z,
            timestamp_nanos: reading.timestamp_nanos,
        })
    }

    /// Planar tilt magnitude (ignores `z`).
    pub fn tilt_magnitude(&self) -> f32 {
        (self.x * self.x + self.y * self.y).sqrt()
    }
}

/// Reading as handed over by a sensor backend, before validation.
#[derive(Debug, Clone, PartialEq)]
pub struct RawReading {
    pub values: Vec<f32>,
    pub timestamp_nanos: i64,
}

impl RawReading {
    pub fn new(values: impl Into<Vec<f32>>, timestamp_nanos: i64) -> Self {
        Self {
            values: values.into(),
            timestamp_nanos,
        }
    }
}

/// Hardware precision level reported alongside readings.
///
/// Mirrors the four Android `SENSOR_STATUS_*` levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccuracyHint {
    Unreliable,
    Low,
    Medium,
    High,
}

impl AccuracyHint {
    /// Map a platform status code (0..=3). Unknown codes are treated as unreliable.
    pub fn from_status(status: i32) -> Self {
        match status {
            1 => AccuracyHint::Low,
            2 => AccuracyHint::Medium,
            3 => AccuracyHint::High,
            _ => AccuracyHint::Unreliable,
        }
    }
}
