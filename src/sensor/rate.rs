//! Sampling rate hints.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Coarse, non-guaranteed request for sample delivery frequency.
///
/// Variants are ordered fastest first, so `min()` over a set of hints yields
/// the rate the hardware must run at to satisfy every subscriber.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum RateHint {
    /// As often as the hardware allows
    Fastest,
    /// Suitable for games and other interactive use
    Game,
    /// Suitable for updating user interface widgets
    Ui,
    /// Suitable for screen orientation changes
    #[default]
    Normal,
}

impl RateHint {
    pub const ALL: [RateHint; 4] = [
        RateHint::Fastest,
        RateHint::Game,
        RateHint::Ui,
        RateHint::Normal,
    ];

    /// Nominal period between readings. `Fastest` has no nominal period.
    pub fn nominal_period(self) -> Duration {
        match self {
            RateHint::Fastest => Duration::ZERO,
            RateHint::Game => Duration::from_micros(20_000),
            RateHint::Ui => Duration::from_micros(66_667),
            RateHint::Normal => Duration::from_micros(200_000),
        }
    }

    /// Nominal period clamped to a backend's minimum reporting interval.
    pub fn period_at_least(self, min_interval: Duration) -> Duration {
        self.nominal_period().max(min_interval)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RateHint::Fastest => "fastest",
            RateHint::Game => "game",
            RateHint::Ui => "ui",
            RateHint::Normal => "normal",
        }
    }
}

impl fmt::Display for RateHint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RateHint {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fastest" => Ok(RateHint::Fastest),
            "game" | "interactive" => Ok(RateHint::Game),
            "ui" => Ok(RateHint::Ui),
            "normal" => Ok(RateHint::Normal),
            other => Err(format!(
                "unknown rate '{}', expected one of fastest|game|ui|normal",
                other
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fastest_hint_sorts_first() {
        let hints = [RateHint::Normal, RateHint::Ui, RateHint::Game];
        assert_eq!(hints.iter().copied().min(), Some(RateHint::Game));
        assert!(RateHint::Fastest < RateHint::Normal);
    }

    #[test]
    fn periods_are_monotonic() {
        let periods: Vec<Duration> = RateHint::ALL.iter().map(|r| r.nominal_period()).collect();
        assert!(periods.windows(2).all(|pair| pair[0] < pair[1]));
        assert_eq!(RateHint::Normal.nominal_period(), Duration::from_millis(200));
    }

    #[test]
    fn period_clamps_to_minimum_interval() {
        let min = Duration::from_millis(5);
        assert_eq!(RateHint::Fastest.period_at_least(min), min);
        assert_eq!(
            RateHint::Game.period_at_least(min),
            Duration::from_millis(20)
        );
    }

    #[test]
    fn parses_names_and_alias() {
        assert_eq!("normal".parse::<RateHint>(), Ok(RateHint::Normal));
        assert_eq!(" Interactive ".parse::<RateHint>(), Ok(RateHint::Game));
        assert!("warp".parse::<RateHint>().is_err());
        assert_eq!(RateHint::Ui.to_string(), "ui");
    }

    #[test]
    fn default_is_normal() {
        assert_eq!(RateHint::default(), RateHint::Normal);
    }
}
