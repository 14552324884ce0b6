//! Configuration for backoff managers

use lull_clock::Clock;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::retry::{ExponentialBackoffManager, Scheduling};

/// Settings for an [`ExponentialBackoffManager`] and the loop driving it.
///
/// Durations are stored in whole milliseconds so the struct maps directly
/// onto JSON or TOML (`initialMs`, `maxMs`, ...). Missing fields take their
/// defaults.
///
/// # Examples
///
/// ```rust
/// use lull::config::BackoffConfig;
/// use lull::clock::TokioClock;
/// use std::time::Duration;
///
/// # fn main() -> lull::Result<()> {
/// let manager = BackoffConfig::default()
///     .with_initial(Duration::from_millis(200))
///     .with_max(Duration::from_secs(10))
///     .build(TokioClock)?;
///
/// assert_eq!(manager.current_backoff(), Duration::from_millis(200));
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BackoffConfig {
    /// First delay, in milliseconds
    pub initial_ms: u64,

    /// Delay cap in milliseconds; `0` disables the cap
    pub max_ms: u64,

    /// Idle gap after which growth is forgotten, in milliseconds
    pub reset_after_ms: u64,

    /// Growth step budget
    pub steps: u32,

    /// Growth multiplier per step
    pub factor: f64,

    /// Jitter fraction
    pub jitter: f64,

    /// Whether the wait is armed before or after each attempt
    pub scheduling: Scheduling,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            initial_ms: 1_000,
            max_ms: 60_000,
            reset_after_ms: 120_000,
            steps: u32::MAX,
            factor: 2.0,
            jitter: 0.1,
            scheduling: Scheduling::Fixed,
        }
    }
}

impl BackoffConfig {
    /// Set the first delay.
    pub fn with_initial(mut self, initial: Duration) -> Self {
        self.initial_ms = millis(initial);
        self
    }

    /// Set the delay cap. `Duration::ZERO` disables it.
    pub fn with_max(mut self, max: Duration) -> Self {
        self.max_ms = millis(max);
        self
    }

    /// Set the idle reset threshold.
    pub fn with_reset_after(mut self, reset_after: Duration) -> Self {
        self.reset_after_ms = millis(reset_after);
        self
    }

    /// Set the growth step budget.
    pub fn with_steps(mut self, steps: u32) -> Self {
        self.steps = steps;
        self
    }

    /// Set the growth multiplier.
    pub fn with_factor(mut self, factor: f64) -> Self {
        self.factor = factor;
        self
    }

    /// Set the jitter fraction.
    pub fn with_jitter(mut self, jitter: f64) -> Self {
        self.jitter = jitter;
        self
    }

    /// Set the loop scheduling mode.
    pub fn with_scheduling(mut self, scheduling: Scheduling) -> Self {
        self.scheduling = scheduling;
        self
    }

    /// Checks that `factor` and `jitter` are finite and non-negative.
    pub fn validate(&self) -> Result<()> {
        for (field, value) in [("factor", self.factor), ("jitter", self.jitter)] {
            if !value.is_finite() || value < 0.0 {
                return Err(Error::invalid(
                    field,
                    format!("must be finite and non-negative, got {value}"),
                ));
            }
        }
        Ok(())
    }

    /// Load configuration from environment variables, on top of the defaults.
    ///
    /// This will look for:
    /// - `LULL_BACKOFF_INITIAL_MS` for the first delay
    /// - `LULL_BACKOFF_MAX_MS` for the delay cap (`0` for none)
    /// - `LULL_BACKOFF_RESET_MS` for the idle reset threshold
    /// - `LULL_BACKOFF_STEPS` for the step budget
    /// - `LULL_BACKOFF_FACTOR` for the growth multiplier
    /// - `LULL_BACKOFF_JITTER` for the jitter fraction
    /// - `LULL_BACKOFF_SCHEDULING` for the loop mode (`fixed` or `sliding`)
    ///
    /// Unset variables keep their defaults; a set but unparsable one is an
    /// error.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        env_override("LULL_BACKOFF_INITIAL_MS", &mut config.initial_ms)?;
        env_override("LULL_BACKOFF_MAX_MS", &mut config.max_ms)?;
        env_override("LULL_BACKOFF_RESET_MS", &mut config.reset_after_ms)?;
        env_override("LULL_BACKOFF_STEPS", &mut config.steps)?;
        env_override("LULL_BACKOFF_FACTOR", &mut config.factor)?;
        env_override("LULL_BACKOFF_JITTER", &mut config.jitter)?;
        env_override("LULL_BACKOFF_SCHEDULING", &mut config.scheduling)?;

        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration and builds a manager reading time from
    /// `clock`.
    pub fn build<C: Clock>(&self, clock: C) -> Result<ExponentialBackoffManager<C>> {
        self.validate()?;
        Ok(ExponentialBackoffManager::new(
            Duration::from_millis(self.initial_ms),
            Duration::from_millis(self.max_ms),
            Duration::from_millis(self.reset_after_ms),
            self.steps,
            self.factor,
            self.jitter,
            clock,
        ))
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

fn env_override<T: FromStr>(var: &'static str, target: &mut T) -> Result<()> {
    let Ok(value) = std::env::var(var) else {
        return Ok(());
    };
    *target = value.trim().parse().map_err(|_| Error::Env { var, value })?;
    Ok(())
}
