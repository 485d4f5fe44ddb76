//! Delivery guarantees under concurrent registration changes
//!
//! - Active exactly while at least one sink is registered
//! - Per-sink arrival order under a concurrent producer
//! - Misbehaving sinks neither stop delivery nor the source
//! - Isolated dispatch keeps a slow sink off the delivery path

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, OnceLock};
use std::thread;
use std::time::{Duration, Instant};

use tilt_sensor::config::AppConfig;
use tilt_sensor::engine::ForwardedBackend;
use tilt_sensor::sensor::{
    DispatchMode, FnSink, OrientationSample, OrientationSource, RateHint, SampleSink,
    SourceOptions, SubscriptionHandle,
};

#[derive(Default)]
struct OrderSink {
    timestamps: Mutex<Vec<i64>>,
}

impl SampleSink for OrderSink {
    fn on_sample(&self, sample: &OrientationSample) {
        self.timestamps.lock().unwrap().push(sample.timestamp_nanos);
    }
}

fn wait_until(limit: Duration, mut done: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + limit;
    while Instant::now() < deadline {
        if done() {
            return true;
        }
        thread::sleep(Duration::from_millis(2));
    }
    done()
}

#[test]
fn order_is_preserved_while_sinks_come_and_go() {
    let backend = Arc::new(ForwardedBackend::new());
    let source = OrientationSource::with_options(backend.clone(), SourceOptions::inline());
    let steady = Arc::new(OrderSink::default());
    source.subscribe(steady.clone(), RateHint::Game).unwrap();

    let producer_backend = backend.clone();
    let producer = thread::spawn(move || {
        for ts in 0..500 {
            producer_backend.forward(&[0.0, 0.0, 9.8], ts);
        }
    });

    let churn_source = source.clone();
    let churn = thread::spawn(move || {
        for _ in 0..50 {
            let transient = Arc::new(OrderSink::default());
            let handle = churn_source
                .subscribe(transient.clone(), RateHint::Fastest)
                .unwrap();
            thread::yield_now();
            churn_source.unsubscribe(handle).unwrap();
            let seen = transient.timestamps.lock().unwrap().clone();
            assert!(seen.windows(2).all(|pair| pair[0] < pair[1]));
        }
    });

    producer.join().unwrap();
    churn.join().unwrap();

    let seen = steady.timestamps.lock().unwrap().clone();
    assert_eq!(seen, (0..500).collect::<Vec<_>>());
    assert!(source.is_active());
    assert_eq!(source.effective_rate(), Some(RateHint::Game));
}

#[test]
fn source_stops_when_last_sink_unsubscribes_from_its_own_callback() {
    let backend = Arc::new(ForwardedBackend::new());
    let source = OrientationSource::with_options(backend.clone(), SourceOptions::inline());
    let slot: Arc<OnceLock<SubscriptionHandle>> = Arc::new(OnceLock::new());
    let calls = Arc::new(AtomicUsize::new(0));

    let sink_source = source.clone();
    let sink_slot = Arc::clone(&slot);
    let sink_calls = Arc::clone(&calls);
    let handle = source
        .subscribe(
            Arc::new(FnSink::new("one-shot", move |_: &OrientationSample| {
                sink_calls.fetch_add(1, Ordering::SeqCst);
                if let Some(handle) = sink_slot.get() {
                    let _ = sink_source.unsubscribe(*handle);
                }
            })),
            RateHint::Ui,
        )
        .unwrap();
    slot.set(handle).unwrap();

    backend.forward(&[0.0, 0.0, 9.8], 1);
    assert!(!source.is_active());
    assert_eq!(backend.stop_count(), 1);
    assert_eq!(backend.forward(&[0.0, 0.0, 9.8], 2), None);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn isolated_panicking_sink_is_counted_and_skipped() {
    let backend = Arc::new(ForwardedBackend::new());
    let source = OrientationSource::with_options(
        backend.clone(),
        SourceOptions {
            dispatch: DispatchMode::Isolated,
            queue_capacity: 32,
        },
    );

    let healthy = Arc::new(OrderSink::default());
    source.subscribe(healthy.clone(), RateHint::Ui).unwrap();
    source
        .subscribe(
            Arc::new(FnSink::new("faulty", |sample: &OrientationSample| {
                if sample.timestamp_nanos % 2 == 0 {
                    panic!("faulty sink rejects even timestamps");
                }
            })),
            RateHint::Ui,
        )
        .unwrap();

    for ts in 1..=10 {
        backend.forward(&[0.1, 0.2, 9.8], ts);
    }

    assert!(wait_until(Duration::from_secs(2), || {
        healthy.timestamps.lock().unwrap().len() == 10 && source.stats().sink_faults == 5
    }));
    assert_eq!(
        healthy.timestamps.lock().unwrap().clone(),
        (1..=10).collect::<Vec<_>>()
    );
    assert!(source.is_active());
}

#[test]
fn isolated_queue_overflow_drops_samples_for_slow_sink_only() {
    let backend = Arc::new(ForwardedBackend::new());
    let source = OrientationSource::with_options(
        backend.clone(),
        SourceOptions {
            dispatch: DispatchMode::Isolated,
            queue_capacity: 2,
        },
    );

    let gate = Arc::new(Mutex::new(()));
    let held = gate.lock().unwrap();
    let slow_seen = Arc::new(AtomicUsize::new(0));
    let slow_gate = Arc::clone(&gate);
    let slow_count = Arc::clone(&slow_seen);
    source
        .subscribe(
            Arc::new(FnSink::new("blocked", move |_: &OrientationSample| {
                let _guard = slow_gate.lock().unwrap();
                slow_count.fetch_add(1, Ordering::SeqCst);
            })),
            RateHint::Ui,
        )
        .unwrap();
    let fast = Arc::new(OrderSink::default());
    source.subscribe(fast.clone(), RateHint::Ui).unwrap();

    // Pace the producer on the fast sink so only the blocked queue fills up.
    for ts in 1..=20 {
        backend.forward(&[0.0, 0.0, 9.8], ts);
        assert!(wait_until(Duration::from_secs(1), || {
            fast.timestamps.lock().unwrap().len() == ts as usize
        }));
    }
    drop(held);

    assert!(source.stats().queue_overflows > 0);
    assert!(wait_until(Duration::from_secs(2), || {
        slow_seen.load(Ordering::SeqCst) + source.stats().queue_overflows as usize == 20
    }));
}

#[test]
fn default_config_does_not_stall_fast_sink_behind_sleeping_one() {
    let backend = Arc::new(ForwardedBackend::new());
    let source = OrientationSource::with_options(
        backend.clone(),
        AppConfig::default().sensor.source_options(),
    );

    source
        .subscribe(
            Arc::new(FnSink::new("sleeping", |_: &OrientationSample| {
                thread::sleep(Duration::from_millis(300));
            })),
            RateHint::Ui,
        )
        .unwrap();
    let fast = Arc::new(OrderSink::default());
    source.subscribe(fast.clone(), RateHint::Ui).unwrap();

    let started = Instant::now();
    for ts in 1..=3 {
        backend.forward(&[0.0, 0.0, 9.8], ts);
    }
    assert!(wait_until(Duration::from_secs(2), || {
        fast.timestamps.lock().unwrap().len() == 3
    }));
    let elapsed = started.elapsed();
    assert!(elapsed < Duration::from_millis(300), "fast sink took {elapsed:?}");
    assert_eq!(fast.timestamps.lock().unwrap().clone(), vec![1, 2, 3]);
}
