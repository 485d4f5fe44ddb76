use std::f32::consts::TAU;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::config::SimulationConfig;
use crate::error::SensorError;
use crate::sensor::{RateHint, RawReading, ReadingIngest};

use super::{BackendStartContext, SensorBackend, TimeSource};

/// Standard gravity in m/s^2, the magnitude a resting accelerometer reports.
pub const STANDARD_GRAVITY: f32 = 9.806_65;

/// Desktop backend producing a synthetic, slowly circling tilt.
///
/// Used for CLI tooling and desktop runs where no accelerometer exists.
pub struct SimulatedBackend {
    config: SimulationConfig,
    period_nanos: Arc<AtomicU64>,
    running: Mutex<Option<Arc<AtomicBool>>>,
}

impl SimulatedBackend {
    pub fn new(config: SimulationConfig) -> Self {
        Self {
            config,
            period_nanos: Arc::new(AtomicU64::new(0)),
            running: Mutex::new(None),
        }
    }

    fn period_for(&self, rate: RateHint) -> Duration {
        rate.period_at_least(Duration::from_millis(self.config.min_interval_ms.max(1)))
    }
}

impl Default for SimulatedBackend {
    fn default() -> Self {
        Self::new(SimulationConfig::default())
    }
}

impl SensorBackend for SimulatedBackend {
    fn name(&self) -> &str {
        "simulated"
    }

    fn is_available(&self) -> bool {
        true
    }

    fn start(&self, ctx: BackendStartContext) -> Result<(), SensorError> {
        let mut running = self.running.lock().map_err(|_| SensorError::LockPoisoned {
            component: "simulated backend".to_string(),
        })?;
        if running.is_some() {
            return Err(SensorError::AlreadyRunning);
        }

        self.period_nanos
            .store(self.period_for(ctx.rate).as_nanos() as u64, Ordering::SeqCst);

        let flag = Arc::new(AtomicBool::new(true));
        let worker_flag = Arc::clone(&flag);
        let period_nanos = Arc::clone(&self.period_nanos);
        let config = self.config.clone();
        let ingest = ctx.ingest;

        thread::Builder::new()
            .name("tilt-simulated".to_string())
            .spawn(move || produce(config, ingest, worker_flag, period_nanos))?;

        *running = Some(flag);
        log::info!(
            "[SimulatedBackend] Started at {} rate ({:?} period)",
            ctx.rate,
            self.period_for(ctx.rate)
        );
        Ok(())
    }

    fn stop(&self) -> Result<(), SensorError> {
        let flag = self
            .running
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .ok_or(SensorError::NotRunning)?;
        flag.store(false, Ordering::SeqCst);
        log::info!("[SimulatedBackend] Stopped");
        Ok(())
    }

    fn set_rate(&self, rate: RateHint) -> Result<(), SensorError> {
        if self
            .running
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_none()
        {
            return Err(SensorError::NotRunning);
        }
        self.period_nanos
            .store(self.period_for(rate).as_nanos() as u64, Ordering::SeqCst);
        Ok(())
    }
}

/// Noise-free synthetic reading `elapsed_secs` into a run.
///
/// The gravity vector circles with the configured amplitude; `z` keeps the
/// total magnitude at standard gravity.
pub fn synthetic_reading(config: &SimulationConfig, elapsed_secs: f32) -> [f32; 3] {
    let cycle = config.cycle_secs.max(f32::EPSILON);
    let phase = TAU * elapsed_secs / cycle;
    let amplitude = config.tilt_amplitude.clamp(0.0, STANDARD_GRAVITY);

    let x = amplitude * phase.sin();
    let y = amplitude * phase.cos();
    let z = (STANDARD_GRAVITY * STANDARD_GRAVITY - x * x - y * y)
        .max(0.0)
        .sqrt();
    [x, y, z]
}

fn produce(
    config: SimulationConfig,
    ingest: ReadingIngest,
    running: Arc<AtomicBool>,
    period_nanos: Arc<AtomicU64>,
) {
    let mut rng = match config.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let noise = config.noise.abs();
    let origin = Instant::now();

    while running.load(Ordering::SeqCst) && ingest.is_current() {
        let elapsed = origin.elapsed();
        let [x, y, z] = synthetic_reading(&config, elapsed.as_secs_f32());
        let jitter = |rng: &mut StdRng| rng.gen_range(-noise..=noise);
        let values = [x + jitter(&mut rng), y + jitter(&mut rng), z + jitter(&mut rng)];

        ingest.push(&RawReading::new(values.to_vec(), elapsed.as_nanos() as i64));
        thread::sleep(Duration::from_nanos(period_nanos.load(Ordering::SeqCst)));
    }
}

/// Deterministic time source for desktop runs.
///
/// Each call to `now()` advances by a fixed 10ms to guarantee monotonic
/// timestamps without a real sensor clock.
pub struct StubTimeSource {
    start: Instant,
    offset_ms: AtomicU64,
}

impl StubTimeSource {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
            offset_ms: AtomicU64::new(0),
        }
    }
}

impl Default for StubTimeSource {
    fn default() -> Self {
        Self::new()
    }
}

impl TimeSource for StubTimeSource {
    fn now(&self) -> Instant {
        let ms = self.offset_ms.fetch_add(10, Ordering::SeqCst);
        self.start + Duration::from_millis(ms)
    }
}
