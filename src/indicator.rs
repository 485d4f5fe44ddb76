//! Tilt bubble geometry.
//!
//! [`TiltIndicator`] is the sink behind the on-screen level: it keeps the
//! most recent sample and turns it into the bubble position for the current
//! canvas. The display is locked to landscape, so sensor `y` moves the bubble
//! horizontally and sensor `x` moves it vertically.

use std::sync::{Mutex, PoisonError};

use serde::{Deserialize, Serialize};

use crate::config::IndicatorConfig;
use crate::sensor::{AccuracyHint, OrientationSample, SampleSink};

/// Point on the canvas in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

/// Everything a renderer needs to draw one frame of the indicator.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IndicatorSnapshot {
    /// Bubble center
    pub bubble: Point,
    pub radius: f32,
    /// Crosshair position (canvas center)
    pub center: Point,
    pub width: f32,
    pub height: f32,
    /// Sample the bubble was computed from; `None` before the first reading
    pub sample: Option<OrientationSample>,
    pub accuracy: Option<AccuracyHint>,
}

impl IndicatorSnapshot {
    /// Distance of the bubble from the crosshair in pixels.
    pub fn offset(&self) -> f32 {
        let dx = self.bubble.x - self.center.x;
        let dy = self.bubble.y - self.center.y;
        (dx * dx + dy * dy).sqrt()
    }
}

#[derive(Debug)]
struct IndicatorState {
    width: f32,
    height: f32,
    latest: Option<OrientationSample>,
    accuracy: Option<AccuracyHint>,
}

/// Sink computing the tilt bubble position.
#[derive(Debug)]
pub struct TiltIndicator {
    scale: f32,
    radius: f32,
    state: Mutex<IndicatorState>,
}

impl TiltIndicator {
    pub fn new(config: &IndicatorConfig) -> Self {
        Self {
            scale: config.scale,
            radius: config.radius,
            state: Mutex::new(IndicatorState {
                width: config.width,
                height: config.height,
                latest: None,
                accuracy: None,
            }),
        }
    }

    /// Renderer reports a new canvas size (rotation, window resize).
    pub fn set_canvas(&self, width: f32, height: f32) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.width = width.max(0.0);
        state.height = height.max(0.0);
    }

    pub fn latest(&self) -> Option<OrientationSample> {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .latest
    }

    pub fn snapshot(&self) -> IndicatorSnapshot {
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let center = Point {
            x: state.width / 2.0,
            y: state.height / 2.0,
        };
        let bubble = match state.latest {
            Some(sample) => bubble_position(center, &sample, self.scale),
            None => center,
        };

        IndicatorSnapshot {
            bubble,
            radius: self.radius,
            center,
            width: state.width,
            height: state.height,
            sample: state.latest,
            accuracy: state.accuracy,
        }
    }
}

impl Default for TiltIndicator {
    fn default() -> Self {
        Self::new(&IndicatorConfig::default())
    }
}

impl SampleSink for TiltIndicator {
    fn on_sample(&self, sample: &OrientationSample) {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .latest = Some(*sample);
    }

    fn on_accuracy_changed(&self, accuracy: AccuracyHint) {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .accuracy = Some(accuracy);
    }

    fn name(&self) -> &str {
        "tilt-indicator"
    }
}

/// Landscape mapping: sensor axes are swapped relative to the screen.
pub fn bubble_position(center: Point, sample: &OrientationSample, scale: f32) -> Point {
    Point {
        x: center.x + sample.y * scale,
        y: center.y + sample.x * scale,
    }
}
