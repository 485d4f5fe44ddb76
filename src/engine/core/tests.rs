use super::*;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crate::engine::backend::StubTimeSource;
use crate::sensor::{DispatchMode, FnSink, OrientationSample};

fn inline_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.sensor.dispatch = DispatchMode::Inline;
    config
}

fn wait_until(limit: Duration, mut done: impl FnMut() -> bool) -> bool {
    let deadline = std::time::Instant::now() + limit;
    while std::time::Instant::now() < deadline {
        if done() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(2));
    }
    done()
}

impl TiltEngine {
    /// Inline dispatch, so sink effects are visible as soon as `forward_reading` returns.
    pub fn new_test() -> (Arc<ForwardedBackend>, Self) {
        let forwarded = Arc::new(ForwardedBackend::new());
        let engine = Self::with_forwarded(inline_config(), forwarded.clone());
        (forwarded, engine)
    }

    fn drain_telemetry(rx: &mut broadcast::Receiver<TelemetryEvent>) -> Vec<TelemetryEventKind> {
        let mut kinds = Vec::new();
        while let Ok(event) = rx.try_recv() {
            kinds.push(event.kind);
        }
        kinds
    }
}

#[test]
fn activate_subscribes_host_sinks_once() {
    let (backend, engine) = TiltEngine::new_test();

    engine.activate().unwrap();
    engine.activate().unwrap();

    assert!(engine.is_active());
    assert!(engine.is_host_active());
    assert_eq!(engine.source().sink_count(), 2);
    assert_eq!(backend.start_count(), 1);
    assert_eq!(engine.requested_rate(), Some(RateHint::Normal));
}

#[test]
fn deactivate_releases_everything_and_is_idempotent() {
    let (backend, engine) = TiltEngine::new_test();

    engine.deactivate().unwrap();
    engine.activate().unwrap();
    engine.deactivate().unwrap();
    engine.deactivate().unwrap();

    assert!(!engine.is_active());
    assert_eq!(engine.source().sink_count(), 0);
    assert_eq!(backend.stop_count(), 1);
}

#[test]
fn forwarded_readings_move_the_bubble() {
    let (_backend, engine) = TiltEngine::new_test();
    engine.set_canvas(1000.0, 500.0);

    assert_eq!(engine.forward_reading(&[1.0, 2.0, 9.5], 10), None);

    engine.activate().unwrap();
    let outcome = engine.forward_reading(&[1.0, 2.0, 9.5], 20);
    assert_eq!(outcome, Some(IngestOutcome::Delivered { sinks: 2 }));

    let snapshot = engine.indicator_snapshot();
    assert_eq!(snapshot.bubble.x, 540.0);
    assert_eq!(snapshot.bubble.y, 270.0);
}

#[test]
fn default_engine_delivers_through_isolated_workers() {
    let forwarded = Arc::new(ForwardedBackend::new());
    let engine = TiltEngine::with_forwarded(AppConfig::default(), forwarded);
    engine.set_canvas(1000.0, 500.0);
    engine.activate().unwrap();

    assert_eq!(
        engine.forward_reading(&[1.0, 2.0, 9.5], 20),
        Some(IngestOutcome::Delivered { sinks: 2 })
    );
    assert!(wait_until(Duration::from_secs(2), || {
        engine.indicator_snapshot().bubble.x == 540.0
    }));
    assert_eq!(engine.indicator_snapshot().bubble.y, 270.0);
    engine.deactivate().unwrap();
}

#[test]
fn latest_event_survives_without_live_receivers() {
    let (_backend, engine) = TiltEngine::new_test();
    assert!(engine.latest_event().is_none());

    engine.activate().unwrap();
    let latest = engine.latest_event().expect("activation event");
    assert_eq!(
        latest.kind,
        TelemetryEventKind::SourceActivated {
            rate: RateHint::Normal
        }
    );

    engine.deactivate().unwrap();
    assert_eq!(
        engine.latest_event().map(|event| event.kind),
        Some(TelemetryEventKind::SourceDeactivated)
    );
}

#[test]
fn malformed_forwarded_readings_leave_indicator_untouched() {
    let (_backend, engine) = TiltEngine::new_test();
    engine.activate().unwrap();

    assert_eq!(
        engine.forward_reading(&[1.0, f32::NAN, 9.5], 1),
        Some(IngestOutcome::Malformed)
    );
    assert!(engine.indicator_snapshot().sample.is_none());
    assert_eq!(engine.stats().malformed, 1);
}

#[test]
fn accuracy_status_reaches_indicator() {
    let (_backend, engine) = TiltEngine::new_test();
    engine.activate().unwrap();

    assert!(engine.forward_accuracy(3));
    assert_eq!(
        engine.indicator_snapshot().accuracy,
        Some(AccuracyHint::High)
    );
}

#[test]
fn accuracy_changes_reach_async_receivers() {
    let (_backend, engine) = TiltEngine::new_test();
    let mut accuracy = engine.accuracy_receiver().expect("accuracy channel");

    assert!(!engine.forward_accuracy(1));
    engine.activate().unwrap();
    assert!(engine.forward_accuracy(2));

    assert_eq!(accuracy.try_recv().unwrap(), AccuracyHint::Medium);
    assert!(accuracy.try_recv().is_err());
}

#[test]
fn unavailable_sensor_fails_activation_with_warning() {
    let (_backend, engine) = TiltEngine::new_test();
    let mut telemetry = engine.telemetry_receiver();
    engine.set_sensor_available(false);

    assert_eq!(engine.activate(), Err(SubscriptionError::SensorUnavailable));
    assert!(!engine.is_active());
    assert!(!engine.is_host_active());

    let kinds = TiltEngine::drain_telemetry(&mut telemetry);
    assert_eq!(kinds, vec![TelemetryEventKind::Warning]);

    engine.set_sensor_available(true);
    engine.activate().unwrap();
    assert!(engine.is_active());
}

#[test]
fn telemetry_reports_source_transitions_and_sinks() {
    let (_backend, engine) = TiltEngine::new_test();
    let mut telemetry = engine.telemetry_receiver();

    let extra = engine
        .subscribe(Arc::new(FnSink::new("extra", |_: &OrientationSample| {})), RateHint::Game)
        .unwrap();
    engine.activate().unwrap();
    engine.deactivate().unwrap();
    engine.unsubscribe(extra).unwrap();

    let kinds = TiltEngine::drain_telemetry(&mut telemetry);
    assert_eq!(
        kinds,
        vec![
            TelemetryEventKind::SinkSubscribed {
                subscription_id: extra.id()
            },
            TelemetryEventKind::SourceActivated {
                rate: RateHint::Game
            },
            TelemetryEventKind::SinkUnsubscribed {
                subscription_id: extra.id()
            },
            TelemetryEventKind::SourceDeactivated,
        ]
    );
}

#[test]
fn unsubscribe_with_unknown_handle_is_rejected() {
    let (_backend, engine) = TiltEngine::new_test();
    let handle = engine
        .subscribe(Arc::new(FnSink::new("once", |_: &OrientationSample| {})), RateHint::Ui)
        .unwrap();

    engine.unsubscribe(handle).unwrap();
    assert_eq!(
        engine.unsubscribe(handle),
        Err(SubscriptionError::UnknownHandle {
            subscription_id: handle.id()
        })
    );
}

#[test]
fn sample_subscription_receives_forwarded_samples() {
    let (_backend, engine) = TiltEngine::new_test();
    let mut samples = engine.subscribe_samples();
    engine.activate().unwrap();

    engine.forward_reading(&[0.5, -0.5, 9.7], 100);
    engine.forward_reading(&[0.6, -0.4, 9.7], 200);

    let first = samples.blocking_recv().unwrap();
    let second = samples.blocking_recv().unwrap();
    assert_eq!(first.timestamp_nanos, 100);
    assert_eq!(second.x, 0.6);
}

#[test]
fn extra_sinks_keep_receiving_after_host_pauses() {
    let (_backend, engine) = TiltEngine::new_test();
    let count = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&count);
    engine
        .subscribe(
            Arc::new(FnSink::new("counter", move |_: &OrientationSample| {
                seen.fetch_add(1, Ordering::SeqCst);
            })),
            RateHint::Ui,
        )
        .unwrap();

    engine.activate().unwrap();
    engine.deactivate().unwrap();
    engine.forward_reading(&[0.0, 0.0, 9.81], 1);

    assert!(engine.is_active());
    assert_eq!(count.load(Ordering::SeqCst), 1);
    assert!(engine.indicator_snapshot().sample.is_none());
}

#[test]
fn uptime_follows_time_source() {
    let (_backend, engine) = TiltEngine::new_test();
    let engine = engine.with_time_source(Arc::new(StubTimeSource::new()));

    let first = engine.uptime_ms();
    let second = engine.uptime_ms();
    assert!(second > first);
    assert_eq!(second - first, 10);
}

#[test]
fn config_snapshot_reflects_construction() {
    let mut config = AppConfig::default();
    config.sensor.default_rate = RateHint::Game;
    config.indicator.radius = 42.0;
    let engine = TiltEngine::with_forwarded(config, Arc::new(ForwardedBackend::new()));

    let snapshot = engine.config_snapshot();
    assert_eq!(snapshot.sensor.default_rate, RateHint::Game);
    assert_eq!(engine.indicator_snapshot().radius, 42.0);
}

#[cfg(not(target_os = "android"))]
#[test]
fn simulated_engine_streams_samples() {
    let mut config = AppConfig::default();
    config.sensor.default_rate = RateHint::Fastest;
    config.simulation.seed = Some(7);
    let engine = TiltEngine::from_config(config);
    let mut samples = engine.subscribe_samples();

    engine.activate().unwrap();
    let deadline = std::time::Instant::now() + Duration::from_secs(2);
    let mut received = 0;
    while received < 3 && std::time::Instant::now() < deadline {
        if samples.try_recv().is_ok() {
            received += 1;
        } else {
            std::thread::sleep(Duration::from_millis(5));
        }
    }
    assert_eq!(received, 3);
    assert!(wait_until(Duration::from_secs(1), || {
        engine.indicator_snapshot().sample.is_some()
    }));
    engine.deactivate().unwrap();
}
