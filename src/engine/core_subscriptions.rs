use futures::Stream;
use tokio::runtime::Builder;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, mpsc};
use tokio_stream::wrappers::UnboundedReceiverStream;

use super::TelemetryEvent;
use crate::config::AppConfig;
use crate::sensor::{AccuracyHint, OrientationSample};

use super::TiltEngine;

/// Bridge a broadcast receiver into an unbounded mpsc channel.
///
/// The forwarding loop runs on its own thread with a current-thread runtime so
/// callers without a Tokio context (JNI, plain tests) can subscribe. Lagged
/// messages are skipped; the bridge ends when either side closes.
fn bridge<T>(mut broadcast_rx: broadcast::Receiver<T>, label: &'static str) -> mpsc::UnboundedReceiver<T>
where
    T: Clone + Send + 'static,
{
    let (tx, rx) = mpsc::unbounded_channel();

    let spawned = std::thread::Builder::new()
        .name(format!("tilt-bridge-{}", label))
        .spawn(move || {
            let rt = match Builder::new_current_thread().enable_all().build() {
                Ok(rt) => rt,
                Err(err) => {
                    log::error!("[TiltEngine] Failed to create Tokio runtime for {}: {}", label, err);
                    return;
                }
            };
            rt.block_on(async move {
                loop {
                    match broadcast_rx.recv().await {
                        Ok(item) => {
                            if tx.send(item).is_err() {
                                break;
                            }
                        }
                        Err(RecvError::Lagged(skipped)) => {
                            log::debug!("[TiltEngine] {} subscriber lagged by {}", label, skipped);
                        }
                        Err(RecvError::Closed) => break,
                    }
                }
            });
        });

    if let Err(err) = spawned {
        log::error!("[TiltEngine] Failed to spawn {} bridge: {}", label, err);
    }

    rx
}

impl TiltEngine {
    // ========================================================================
    // STREAM SUBSCRIPTIONS
    // ========================================================================

    /// Samples delivered while the host is active.
    pub fn subscribe_samples(&self) -> mpsc::UnboundedReceiver<OrientationSample> {
        match self.broadcasts.subscribe_samples() {
            Some(broadcast_rx) => bridge(broadcast_rx, "samples"),
            None => mpsc::unbounded_channel().1,
        }
    }

    /// Raw broadcast receiver for consumers already inside a runtime (SSE).
    pub fn sample_receiver(&self) -> Option<broadcast::Receiver<OrientationSample>> {
        self.broadcasts.subscribe_samples()
    }

    /// Accuracy changes forwarded while the host is active.
    pub fn accuracy_receiver(&self) -> Option<broadcast::Receiver<AccuracyHint>> {
        self.broadcasts.subscribe_accuracy()
    }

    pub fn telemetry_receiver(&self) -> broadcast::Receiver<TelemetryEvent> {
        self.telemetry_tx.subscribe()
    }

    // ========================================================================
    // ASYNC STREAM ADAPTERS
    // ========================================================================

    pub fn sample_stream(&self) -> impl Stream<Item = OrientationSample> + Unpin {
        UnboundedReceiverStream::new(self.subscribe_samples())
    }

    // ========================================================================
    // TOOLING HELPERS
    // ========================================================================

    /// Milliseconds elapsed since the engine was created (used for telemetry).
    pub fn uptime_ms(&self) -> u64 {
        self.time_source
            .now()
            .saturating_duration_since(self.start_instant)
            .as_millis() as u64
    }

    /// Snapshot the current app configuration (tooling helper).
    pub fn config_snapshot(&self) -> AppConfig {
        self.config
            .read()
            .map(|cfg| cfg.clone())
            .unwrap_or_else(|err| err.into_inner().clone())
    }
}
