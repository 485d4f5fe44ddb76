//! Configuration management for the tilt sensor core
//!
//! Runtime configuration is loaded from a JSON file so sampling policy,
//! simulation and indicator geometry can be tuned without recompilation.
//! Missing or invalid files fall back to defaults.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::sensor::{DispatchMode, RateHint, SourceOptions};

/// Complete application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub sensor: SensorConfig,
    pub simulation: SimulationConfig,
    pub indicator: IndicatorConfig,
}

/// Sampling and dispatch policy
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SensorConfig {
    /// Rate hint used by the host session
    pub default_rate: RateHint,
    /// Isolated (per-sink worker) or inline (on the delivery thread)
    pub dispatch: DispatchMode,
    /// Per-sink queue depth for isolated dispatch
    pub queue_capacity: usize,
    /// Buffer of the broadcast channel feeding async sample streams
    pub stream_buffer: usize,
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            default_rate: RateHint::Normal,
            dispatch: DispatchMode::Isolated,
            queue_capacity: 64,
            stream_buffer: 128,
        }
    }
}

impl SensorConfig {
    pub fn source_options(&self) -> SourceOptions {
        SourceOptions {
            dispatch: self.dispatch,
            queue_capacity: self.queue_capacity.max(1),
        }
    }
}

/// Synthetic accelerometer used on desktop
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Peak tilt on x/y in m/s^2 (clamped to gravity)
    pub tilt_amplitude: f32,
    /// Seconds for one full circle of the tilt vector
    pub cycle_secs: f32,
    /// Uniform noise added to every axis
    pub noise: f32,
    /// Shortest period the simulated hardware supports
    pub min_interval_ms: u64,
    /// Fixed RNG seed for reproducible runs
    pub seed: Option<u64>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            tilt_amplitude: 4.0,
            cycle_secs: 6.0,
            noise: 0.05,
            min_interval_ms: 5,
            seed: None,
        }
    }
}

/// Tilt indicator geometry
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IndicatorConfig {
    /// Pixels of bubble offset per m/s^2 of tilt
    pub scale: f32,
    /// Bubble radius in pixels
    pub radius: f32,
    /// Canvas size used until the renderer reports its own
    pub width: f32,
    pub height: f32,
}

impl Default for IndicatorConfig {
    fn default() -> Self {
        Self {
            scale: 20.0,
            radius: 100.0,
            width: 1920.0,
            height: 1080.0,
        }
    }
}

impl AppConfig {
    /// Load configuration from JSON file
    ///
    /// # Arguments
    /// * `path` - Path to JSON config file
    ///
    /// # Returns
    /// The parsed configuration, or defaults if the file is missing or invalid
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Self {
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(config) => {
                    log::info!("[Config] Loaded configuration from {:?}", path.as_ref());
                    config
                }
                Err(err) => {
                    log::warn!(
                        "[Config] Failed to parse JSON from {:?}: {}. Using defaults.",
                        path.as_ref(),
                        err
                    );
                    Self::default()
                }
            },
            Err(err) => {
                log::warn!(
                    "[Config] Failed to read config file {:?}: {}. Using defaults.",
                    path.as_ref(),
                    err
                );
                Self::default()
            }
        }
    }

    /// Android builds ship no config file; the host shell owns tuning.
    #[cfg(target_os = "android")]
    pub fn load_android() -> Self {
        log::info!("[Config] Using default configuration on Android");
        Self::default()
    }

    /// Load the platform configuration: `assets/tilt_config.json` on desktop
    pub fn load() -> Self {
        #[cfg(target_os = "android")]
        {
            Self::load_android()
        }

        #[cfg(not(target_os = "android"))]
        {
            Self::load_from_file("assets/tilt_config.json")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.sensor.default_rate, RateHint::Normal);
        assert_eq!(config.sensor.dispatch, DispatchMode::Isolated);
        assert_eq!(config.sensor.source_options(), SourceOptions::default());
        assert_eq!(config.indicator.scale, 20.0);
        assert_eq!(config.indicator.radius, 100.0);
        assert_eq!(config.simulation.min_interval_ms, 5);
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let json = r#"{ "sensor": { "default_rate": "game", "dispatch": "inline" } }"#;
        let config: AppConfig = serde_json::from_str(json).unwrap();

        assert_eq!(config.sensor.default_rate, RateHint::Game);
        assert_eq!(config.sensor.dispatch, DispatchMode::Inline);
        assert_eq!(config.sensor.queue_capacity, 64);
        assert_eq!(config.indicator.scale, 20.0);
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let config = AppConfig::load_from_file("definitely/not/here.json");
        assert_eq!(config.sensor.stream_buffer, 128);
    }

    #[test]
    fn test_zero_queue_capacity_is_clamped() {
        let sensor = SensorConfig {
            queue_capacity: 0,
            ..SensorConfig::default()
        };
        assert_eq!(sensor.source_options().queue_capacity, 1);
    }
}
