use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use futures::{Stream, StreamExt};
use serde::Serialize;
use tilt_sensor::config::AppConfig;
use tilt_sensor::engine::TiltEngine;
use tilt_sensor::sensor::{DispatchMode, OrientationSample, RateHint, SampleLogger, SourceStats};

#[derive(Parser, Debug)]
#[command(
    name = "tilt_cli",
    about = "Desktop harness for the tilt sensor core (simulated accelerometer)"
)]
struct Cli {
    /// JSON config file (defaults to assets/tilt_config.json)
    #[arg(long)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Stream simulated samples to stdout as JSON lines
    Watch {
        #[arg(long)]
        rate: Option<RateHint>,
        #[arg(long, default_value_t = 20)]
        count: usize,
        /// Fixed RNG seed for the simulated noise
        #[arg(long)]
        seed: Option<u64>,
        /// Deliver on the producer thread instead of per-sink workers
        #[arg(long)]
        inline: bool,
        /// Also log every sample at debug level
        #[arg(long)]
        log_samples: bool,
    },
    /// Print tilt bubble positions for a canvas
    Indicator {
        #[arg(long, default_value_t = 1920.0)]
        width: f32,
        #[arg(long, default_value_t = 1080.0)]
        height: f32,
        #[arg(long, default_value_t = 10)]
        count: usize,
    },
    /// Print the effective configuration
    Config,
    /// Run the debug HTTP server (requires the debug_http feature)
    Serve {
        #[arg(long, default_value_t = 60)]
        secs: u64,
    },
}

fn main() -> ExitCode {
    tilt_sensor::init_logging();
    match run() {
        Ok(code) => code,
        Err(err) => {
            eprintln!("Error: {err:?}");
            ExitCode::from(1)
        }
    }
}

fn run() -> Result<ExitCode> {
    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => AppConfig::load_from_file(path),
        None => AppConfig::load(),
    };

    match cli.command {
        Commands::Watch {
            rate,
            count,
            seed,
            inline,
            log_samples,
        } => run_watch(config, rate, count, seed, inline, log_samples),
        Commands::Indicator {
            width,
            height,
            count,
        } => run_indicator(config, width, height, count),
        Commands::Config => run_config(config),
        Commands::Serve { secs } => run_serve(config, secs),
    }
}

fn run_watch(
    mut config: AppConfig,
    rate: Option<RateHint>,
    count: usize,
    seed: Option<u64>,
    inline: bool,
    log_samples: bool,
) -> Result<ExitCode> {
    if let Some(rate) = rate {
        config.sensor.default_rate = rate;
    }
    if seed.is_some() {
        config.simulation.seed = seed;
    }
    if inline {
        config.sensor.dispatch = DispatchMode::Inline;
    }
    let rate = config.sensor.default_rate;
    let engine = TiltEngine::from_config(config);

    let logger = if log_samples {
        Some(
            engine
                .subscribe(std::sync::Arc::new(SampleLogger::default()), rate)
                .context("subscribing sample logger")?,
        )
    } else {
        None
    };

    let stream = engine.sample_stream();
    engine.activate().context("activating simulated accelerometer")?;
    let samples = collect_samples(stream, count, sample_timeout(rate, count))?;
    engine.deactivate().context("deactivating accelerometer")?;
    if let Some(handle) = logger {
        engine.unsubscribe(handle).context("releasing sample logger")?;
    }

    for sample in &samples {
        println!("{}", serde_json::to_string(sample)?);
    }
    emit_summary(rate, samples.len(), count, engine.stats())?;

    if samples.len() < count {
        return Ok(ExitCode::from(2));
    }
    Ok(ExitCode::from(0))
}

fn run_indicator(config: AppConfig, width: f32, height: f32, count: usize) -> Result<ExitCode> {
    let rate = config.sensor.default_rate;
    let engine = TiltEngine::from_config(config);
    engine.set_canvas(width, height);

    let mut stream = engine.sample_stream();
    engine.activate().context("activating simulated accelerometer")?;

    let runtime = runtime()?;
    let timeout = sample_timeout(rate, 1);
    let mut printed = 0;
    while printed < count {
        let next = runtime.block_on(async { tokio::time::timeout(timeout, stream.next()).await });
        match next {
            Ok(Some(_)) => {
                println!("{}", serde_json::to_string(&engine.indicator_snapshot())?);
                printed += 1;
            }
            Ok(None) | Err(_) => break,
        }
    }
    engine.deactivate().context("deactivating accelerometer")?;

    if printed < count {
        eprintln!("Only {printed} of {count} indicator frames before timeout");
        return Ok(ExitCode::from(2));
    }
    Ok(ExitCode::from(0))
}

fn run_config(config: AppConfig) -> Result<ExitCode> {
    let engine = TiltEngine::from_config(config);
    println!("{}", serde_json::to_string_pretty(&engine.config_snapshot())?);
    Ok(ExitCode::from(0))
}

fn run_serve(config: AppConfig, secs: u64) -> Result<ExitCode> {
    if !cfg!(all(feature = "debug_http", debug_assertions)) {
        eprintln!("Debug HTTP server disabled; rebuild with --features debug_http");
        return Ok(ExitCode::from(2));
    }

    let engine: &'static TiltEngine = Box::leak(Box::new(TiltEngine::from_config(config)));
    engine.activate().context("activating simulated accelerometer")?;
    tilt_sensor::http::spawn_if_enabled(engine);
    std::thread::sleep(Duration::from_secs(secs));
    engine.deactivate().context("deactivating accelerometer")?;
    Ok(ExitCode::from(0))
}

fn runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("building tokio runtime")
}

/// Generous upper bound: ten nominal periods per sample plus one second.
fn sample_timeout(rate: RateHint, count: usize) -> Duration {
    rate.nominal_period().max(Duration::from_millis(5)) * 10 * count.max(1) as u32
        + Duration::from_secs(1)
}

fn collect_samples(
    stream: impl Stream<Item = OrientationSample> + Unpin,
    count: usize,
    timeout: Duration,
) -> Result<Vec<OrientationSample>> {
    let runtime = runtime()?;
    let samples = runtime.block_on(async move {
        let mut samples = Vec::with_capacity(count);
        let mut stream = stream.take(count);
        let deadline = tokio::time::Instant::now() + timeout;
        while let Ok(Some(sample)) = tokio::time::timeout_at(deadline, stream.next()).await {
            samples.push(sample);
        }
        samples
    });
    Ok(samples)
}

fn emit_summary(rate: RateHint, received: usize, requested: usize, stats: SourceStats) -> Result<()> {
    let summary = WatchSummary {
        rate,
        received,
        requested,
        stats,
    };
    eprintln!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

#[derive(Serialize)]
struct WatchSummary {
    rate: RateHint,
    received: usize,
    requested: usize,
    stats: SourceStats,
}
