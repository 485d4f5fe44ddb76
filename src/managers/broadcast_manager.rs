// BroadcastChannelManager: Centralized tokio broadcast channel management
// Single Responsibility: Broadcast channel lifecycle and subscription

use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::broadcast;

use crate::sensor::{AccuracyHint, OrientationSample};

/// Default buffer for the sample channel (about 6 seconds at the game rate).
pub const DEFAULT_SAMPLE_BUFFER: usize = 128;

/// Manages the tokio broadcast channels feeding async sample consumers
///
/// # Channel Types
/// - Samples: every accepted orientation sample while the host is active
/// - Accuracy: hardware precision changes
pub struct BroadcastChannelManager {
    sample_buffer: usize,
    samples: Arc<Mutex<Option<broadcast::Sender<OrientationSample>>>>,
    accuracy: Arc<Mutex<Option<broadcast::Sender<AccuracyHint>>>>,
}

impl BroadcastChannelManager {
    /// Create a manager with all channels uninitialized
    ///
    /// Channels must be explicitly initialized via init_* methods before use.
    pub fn new() -> Self {
        Self::with_buffer(DEFAULT_SAMPLE_BUFFER)
    }

    pub fn with_buffer(sample_buffer: usize) -> Self {
        Self {
            sample_buffer: sample_buffer.max(1),
            samples: Arc::new(Mutex::new(None)),
            accuracy: Arc::new(Mutex::new(None)),
        }
    }

    // ========================================================================
    // SAMPLE CHANNEL
    // ========================================================================

    /// Initialize the sample broadcast channel
    ///
    /// Returns the sender the stream sink publishes into. Re-initializing
    /// replaces the channel; receivers of the old one see it close once the
    /// previous sender is dropped.
    ///
    /// # Notes
    /// - Lagging subscribers lose the oldest samples
    pub fn init_samples(&self) -> broadcast::Sender<OrientationSample> {
        let (tx, _) = broadcast::channel(self.sample_buffer);
        *self.samples.lock().unwrap_or_else(PoisonError::into_inner) = Some(tx.clone());
        tx
    }

    /// Subscribe to samples, or `None` if init_samples() was never called
    pub fn subscribe_samples(&self) -> Option<broadcast::Receiver<OrientationSample>> {
        self.samples
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|tx| tx.subscribe())
    }

    // ========================================================================
    // ACCURACY CHANNEL
    // ========================================================================

    /// Initialize the accuracy broadcast channel
    ///
    /// Accuracy changes are rare, so the buffer stays small.
    pub fn init_accuracy(&self) -> broadcast::Sender<AccuracyHint> {
        let (tx, _) = broadcast::channel(16);
        *self.accuracy.lock().unwrap_or_else(PoisonError::into_inner) = Some(tx.clone());
        tx
    }

    pub fn subscribe_accuracy(&self) -> Option<broadcast::Receiver<AccuracyHint>> {
        self.accuracy
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|tx| tx.subscribe())
    }
}

impl Default for BroadcastChannelManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(x: f32) -> OrientationSample {
        OrientationSample {
            x,
            y: 0.0,
            z: 9.81,
            timestamp_nanos: 1,
        }
    }

    #[test]
    fn test_sample_channel_lifecycle() {
        let manager = BroadcastChannelManager::new();

        // Initially no subscription possible
        assert!(manager.subscribe_samples().is_none());

        let _tx = manager.init_samples();
        assert!(manager.subscribe_samples().is_some());
    }

    #[test]
    fn test_sample_multiple_subscribers() {
        let manager = BroadcastChannelManager::new();
        let tx = manager.init_samples();

        let mut rx1 = manager.subscribe_samples().unwrap();
        let mut rx2 = manager.subscribe_samples().unwrap();

        tx.send(sample(1.5)).unwrap();

        assert_eq!(rx1.try_recv().unwrap().x, 1.5);
        assert_eq!(rx2.try_recv().unwrap().x, 1.5);
    }

    #[test]
    fn test_lagging_subscriber_loses_oldest() {
        let manager = BroadcastChannelManager::with_buffer(2);
        let tx = manager.init_samples();
        let mut rx = manager.subscribe_samples().unwrap();

        for i in 0..3 {
            tx.send(sample(i as f32)).unwrap();
        }

        assert!(matches!(
            rx.try_recv(),
            Err(broadcast::error::TryRecvError::Lagged(1))
        ));
        assert_eq!(rx.try_recv().unwrap().x, 1.0);
    }

    #[test]
    fn test_accuracy_channel_lifecycle() {
        let manager = BroadcastChannelManager::default();
        assert!(manager.subscribe_accuracy().is_none());

        let tx = manager.init_accuracy();
        let mut rx = manager.subscribe_accuracy().unwrap();
        tx.send(AccuracyHint::High).unwrap();
        assert_eq!(rx.try_recv().unwrap(), AccuracyHint::High);
    }
}
