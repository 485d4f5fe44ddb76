//! Sample sink contract and the general purpose sinks shipped with the crate.

use log::debug;
use tokio::sync::broadcast;

use super::sample::{AccuracyHint, OrientationSample};

/// Consumer registered with an [`OrientationSource`](super::OrientationSource).
///
/// `on_sample` is invoked for every accepted reading while the sink is
/// subscribed, never concurrently for the same sink and always in arrival
/// order. A panic inside a sink is caught by the source, logged and counted;
/// the other sinks still receive the sample.
pub trait SampleSink: Send + Sync {
    fn on_sample(&self, sample: &OrientationSample);

    /// Hardware precision changed. Ignored unless a sink cares.
    fn on_accuracy_changed(&self, _accuracy: AccuracyHint) {}

    /// Short label used in log lines.
    fn name(&self) -> &str {
        "sink"
    }
}

/// Sink backed by a closure.
pub struct FnSink<F> {
    name: String,
    f: F,
}

impl<F> FnSink<F>
where
    F: Fn(&OrientationSample) + Send + Sync,
{
    pub fn new(name: impl Into<String>, f: F) -> Self {
        Self {
            name: name.into(),
            f,
        }
    }
}

impl<F> SampleSink for FnSink<F>
where
    F: Fn(&OrientationSample) + Send + Sync,
{
    fn on_sample(&self, sample: &OrientationSample) {
        (self.f)(sample)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Forwards samples and accuracy changes into tokio broadcast channels.
///
/// Lagging receivers lose the oldest messages; sends with no receiver are
/// silently discarded.
pub struct ChannelSink {
    samples: broadcast::Sender<OrientationSample>,
    accuracy: Option<broadcast::Sender<AccuracyHint>>,
}

impl ChannelSink {
    pub fn new(samples: broadcast::Sender<OrientationSample>) -> Self {
        Self {
            samples,
            accuracy: None,
        }
    }

    pub fn with_accuracy(mut self, accuracy: broadcast::Sender<AccuracyHint>) -> Self {
        self.accuracy = Some(accuracy);
        self
    }
}

impl SampleSink for ChannelSink {
    fn on_sample(&self, sample: &OrientationSample) {
        let _ = self.samples.send(*sample);
    }

    fn on_accuracy_changed(&self, accuracy: AccuracyHint) {
        if let Some(tx) = &self.accuracy {
            let _ = tx.send(accuracy);
        }
    }

    fn name(&self) -> &str {
        "channel"
    }
}

/// Logs every sample at debug level.
#[derive(Default)]
pub struct SampleLogger {
    _unit: (),
}

impl SampleSink for SampleLogger {
    fn on_sample(&self, sample: &OrientationSample) {
        debug!(
            "onSensorChanged: x: {}, y: {}, z: {}",
            sample.x, sample.y, sample.z
        );
    }

    fn on_accuracy_changed(&self, accuracy: AccuracyHint) {
        debug!("onAccuracyChanged: {:?}", accuracy);
    }

    fn name(&self) -> &str {
        "logger"
    }
}
