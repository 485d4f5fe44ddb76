//! TiltEngine: orchestration layer around the orientation source.
//!
//! Owns the platform backend, the source, the tilt indicator host session and
//! the broadcast channels behind the async sample streams. Shared by the JNI
//! entry points, the CLI and the debug HTTP server.

use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::config::AppConfig;
use crate::engine::backend::{ForwardedBackend, SensorBackend, SystemTimeSource, TimeSource};
use crate::engine::lifecycle::HostSession;
use crate::error::SubscriptionError;
use crate::indicator::{IndicatorSnapshot, TiltIndicator};
use crate::managers::BroadcastChannelManager;
use crate::sensor::{
    AccuracyHint, ChannelSink, IngestOutcome, OrientationSource, RateHint, SampleSink,
    SourceStats, SubscriptionHandle,
};
use crate::telemetry::{self, LifecyclePhase};

#[path = "core_subscriptions.rs"]
mod core_subscriptions;

/// Telemetry event emitted by the engine core.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryEvent {
    pub timestamp_ms: u64,
    pub kind: TelemetryEventKind,
    pub detail: Option<String>,
}

/// Types of telemetry events supported by the core.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TelemetryEventKind {
    SourceActivated { rate: RateHint },
    SourceDeactivated,
    SinkSubscribed { subscription_id: u64 },
    SinkUnsubscribed { subscription_id: u64 },
    Warning,
}

/// TiltEngine wires the backend, source and host-facing sinks together.
pub struct TiltEngine {
    config: Arc<RwLock<AppConfig>>,
    source: OrientationSource,
    forwarded: Option<Arc<ForwardedBackend>>,
    indicator: Arc<TiltIndicator>,
    host: HostSession,
    stream: HostSession,
    pub(crate) broadcasts: BroadcastChannelManager,
    telemetry_tx: broadcast::Sender<TelemetryEvent>,
    last_event: Mutex<Option<TelemetryEvent>>,
    time_source: Arc<dyn TimeSource>,
    start_instant: Instant,
}

impl TiltEngine {
    /// Create a new TiltEngine with platform defaults.
    pub fn new() -> Self {
        Self::from_config(AppConfig::load())
    }

    pub fn from_config(config: AppConfig) -> Self {
        let (backend, forwarded) = create_backend(&config);
        Self::build(config, backend, forwarded, Arc::new(SystemTimeSource::default()))
    }

    /// Engine over an arbitrary backend (CLI tools, tests).
    pub fn with_backend(config: AppConfig, backend: Arc<dyn SensorBackend>) -> Self {
        Self::build(config, backend, None, Arc::new(SystemTimeSource::default()))
    }

    /// Engine whose readings are pushed in through [`TiltEngine::forward_reading`].
    pub fn with_forwarded(config: AppConfig, forwarded: Arc<ForwardedBackend>) -> Self {
        let backend: Arc<dyn SensorBackend> = forwarded.clone();
        Self::build(
            config,
            backend,
            Some(forwarded),
            Arc::new(SystemTimeSource::default()),
        )
    }

    /// Replace the clock used for telemetry timestamps and uptime.
    pub fn with_time_source(mut self, time_source: Arc<dyn TimeSource>) -> Self {
        self.start_instant = time_source.now();
        self.time_source = time_source;
        self
    }

    fn build(
        config: AppConfig,
        backend: Arc<dyn SensorBackend>,
        forwarded: Option<Arc<ForwardedBackend>>,
        time_source: Arc<dyn TimeSource>,
    ) -> Self {
        let source = OrientationSource::with_options(backend, config.sensor.source_options());
        let rate = config.sensor.default_rate;

        let indicator = Arc::new(TiltIndicator::new(&config.indicator));
        let host = HostSession::new(source.clone(), indicator.clone(), rate);

        let broadcasts = BroadcastChannelManager::with_buffer(config.sensor.stream_buffer);
        let stream_sink =
            ChannelSink::new(broadcasts.init_samples()).with_accuracy(broadcasts.init_accuracy());
        let stream = HostSession::new(source.clone(), Arc::new(stream_sink), rate);

        let (telemetry_tx, _) = broadcast::channel(128);
        let start_instant = time_source.now();

        Self {
            config: Arc::new(RwLock::new(config)),
            source,
            forwarded,
            indicator,
            host,
            stream,
            broadcasts,
            telemetry_tx,
            last_event: Mutex::new(None),
            time_source,
            start_instant,
        }
    }

    /// Record `kind` as the latest event and broadcast it to live receivers.
    fn emit_event(&self, kind: TelemetryEventKind, detail: Option<String>) {
        let event = TelemetryEvent {
            timestamp_ms: self.uptime_ms(),
            kind,
            detail,
        };
        *self
            .last_event
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(event.clone());
        let _ = self.telemetry_tx.send(event);
    }

    /// Most recent telemetry event, kept for consumers that subscribe late.
    pub fn latest_event(&self) -> Option<TelemetryEvent> {
        self.last_event
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn emit_source_transition(&self, was_active: bool) {
        match (was_active, self.source.is_active()) {
            (false, true) => {
                let rate = self
                    .source
                    .effective_rate()
                    .unwrap_or(self.host.rate());
                self.emit_event(TelemetryEventKind::SourceActivated { rate }, None);
            }
            (true, false) => self.emit_event(TelemetryEventKind::SourceDeactivated, None),
            _ => {}
        }
    }

    // ========================================================================
    // HOST LIFECYCLE
    // ========================================================================

    /// Host became visible: subscribe the indicator and the stream sink.
    ///
    /// Calling it again while active is a no-op.
    pub fn activate(&self) -> Result<(), SubscriptionError> {
        let was_active = self.source.is_active();

        if let Err(err) = self.host.activate() {
            self.emit_event(
                TelemetryEventKind::Warning,
                Some(format!("Failed to activate tilt indicator: {}", err)),
            );
            return Err(err);
        }

        if let Err(err) = self.stream.activate() {
            if let Err(rollback) = self.host.deactivate() {
                log::warn!("[TiltEngine] Rollback after failed activate: {}", rollback);
            }
            self.emit_event(
                TelemetryEventKind::Warning,
                Some(format!("Failed to activate sample stream: {}", err)),
            );
            self.emit_source_transition(was_active);
            return Err(err);
        }

        telemetry::hub().record_lifecycle(LifecyclePhase::HostActivated);
        self.emit_source_transition(was_active);
        Ok(())
    }

    /// Host went to the background: release both host subscriptions.
    ///
    /// Calling it while inactive is a no-op. Both sessions are always released;
    /// the first failure is returned.
    pub fn deactivate(&self) -> Result<(), SubscriptionError> {
        let was_active = self.source.is_active();
        let mut first_error = None;

        for (label, session) in [("tilt indicator", &self.host), ("sample stream", &self.stream)] {
            if let Err(err) = session.deactivate() {
                self.emit_event(
                    TelemetryEventKind::Warning,
                    Some(format!("Failed to deactivate {}: {}", label, err)),
                );
                first_error.get_or_insert(err);
            }
        }

        telemetry::hub().record_lifecycle(LifecyclePhase::HostDeactivated);
        self.emit_source_transition(was_active);
        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Whether the host session currently holds its subscriptions.
    pub fn is_host_active(&self) -> bool {
        self.host.is_active()
    }

    // ========================================================================
    // SUBSCRIPTIONS
    // ========================================================================

    /// Register an additional sink alongside the host's own.
    pub fn subscribe(
        &self,
        sink: Arc<dyn SampleSink>,
        rate: RateHint,
    ) -> Result<SubscriptionHandle, SubscriptionError> {
        let was_active = self.source.is_active();
        let handle = self.source.subscribe(sink, rate)?;
        self.emit_event(
            TelemetryEventKind::SinkSubscribed {
                subscription_id: handle.id(),
            },
            None,
        );
        self.emit_source_transition(was_active);
        Ok(handle)
    }

    pub fn unsubscribe(&self, handle: SubscriptionHandle) -> Result<(), SubscriptionError> {
        let was_active = self.source.is_active();
        self.source.unsubscribe(handle)?;
        self.emit_event(
            TelemetryEventKind::SinkUnsubscribed {
                subscription_id: handle.id(),
            },
            None,
        );
        self.emit_source_transition(was_active);
        Ok(())
    }

    // ========================================================================
    // FORWARDED READINGS
    // ========================================================================

    /// Push a reading from the host's platform listener.
    ///
    /// Returns `None` when the engine has no forwarded backend or the backend
    /// is stopped.
    pub fn forward_reading(&self, values: &[f32], timestamp_nanos: i64) -> Option<IngestOutcome> {
        self.forwarded.as_ref()?.forward(values, timestamp_nanos)
    }

    /// Push an `onAccuracyChanged` status code from the host.
    pub fn forward_accuracy(&self, status: i32) -> bool {
        match &self.forwarded {
            Some(forwarded) => forwarded.forward_accuracy(AccuracyHint::from_status(status)),
            None => false,
        }
    }

    /// Host reports whether the platform has an accelerometer.
    pub fn set_sensor_available(&self, available: bool) {
        if let Some(forwarded) = &self.forwarded {
            forwarded.set_available(available);
        }
    }

    /// Rate the host should register its platform listener with, if running.
    pub fn requested_rate(&self) -> Option<RateHint> {
        self.forwarded.as_ref()?.requested_rate()
    }

    // ========================================================================
    // INDICATOR
    // ========================================================================

    pub fn indicator(&self) -> Arc<TiltIndicator> {
        Arc::clone(&self.indicator)
    }

    pub fn indicator_snapshot(&self) -> IndicatorSnapshot {
        self.indicator.snapshot()
    }

    pub fn set_canvas(&self, width: f32, height: f32) {
        self.indicator.set_canvas(width, height);
    }

    // ========================================================================
    // SOURCE STATE
    // ========================================================================

    pub fn source(&self) -> &OrientationSource {
        &self.source
    }

    pub fn is_active(&self) -> bool {
        self.source.is_active()
    }

    pub fn stats(&self) -> SourceStats {
        self.source.stats()
    }
}

cfg_if::cfg_if! {
    if #[cfg(target_os = "android")] {
        /// The host shell owns the platform listener and forwards readings.
        fn create_backend(
            _config: &AppConfig,
        ) -> (Arc<dyn SensorBackend>, Option<Arc<ForwardedBackend>>) {
            let forwarded = Arc::new(ForwardedBackend::named("android-accelerometer"));
            let backend: Arc<dyn SensorBackend> = forwarded.clone();
            (backend, Some(forwarded))
        }
    } else {
        fn create_backend(
            config: &AppConfig,
        ) -> (Arc<dyn SensorBackend>, Option<Arc<ForwardedBackend>>) {
            let backend: Arc<dyn SensorBackend> =
                Arc::new(crate::engine::backend::SimulatedBackend::new(config.simulation.clone()));
            (backend, None)
        }
    }
}

// ========================================================================
// TEST HELPERS
// ========================================================================

#[cfg(test)]
mod tests;

impl Default for TiltEngine {
    fn default() -> Self {
        Self::new()
    }
}
