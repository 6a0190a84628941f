use crate::constants::*;
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DurationSeconds};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConfigError {
    #[error("{field} of {value} is out of range {range}")]
    OutOfRange {
        field: &'static str,
        value: String,
        range: &'static str,
    },

    #[error("Cannot find target file {}", .0.display())]
    TargetNotFound(PathBuf),
}

/// Settings for a single load test run.
///
/// Built once with the `with_*` methods, checked with [`RunConfig::validate`] before anything
/// touches the target, and never changed afterwards.
#[serde_as]
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    target: PathBuf,
    failure_threshold: f64,
    start_rate: u32,
    #[serde_as(as = "DurationSeconds")]
    test_duration: Duration,
    step_rate: u32,
    warm_up_rate: u32,
    #[serde_as(as = "DurationSeconds")]
    warm_up_duration: Duration,
    #[serde_as(as = "DurationSeconds")]
    rest: Duration,
}

impl RunConfig {
    pub fn new(target: impl Into<PathBuf>) -> Self {
        Self {
            target: target.into(),
            failure_threshold: DEFAULT_FAILURE_THRESHOLD,
            start_rate: DEFAULT_START_RATE,
            test_duration: DEFAULT_TEST_DURATION,
            step_rate: DEFAULT_STEP_RATE,
            warm_up_rate: DEFAULT_WARM_UP_RATE,
            warm_up_duration: DEFAULT_WARM_UP_DURATION,
            rest: DEFAULT_REST,
        }
    }

    /// Acceptable failure percentage, e.g. `5.0` for 5%.
    pub fn with_failure_threshold(mut self, failure_threshold: f64) -> Self {
        self.failure_threshold = failure_threshold;
        self
    }

    pub fn with_start_rate(mut self, start_rate: u32) -> Self {
        self.start_rate = start_rate;
        self
    }

    /// Zero keeps the default cycle length.
    pub fn with_test_duration(mut self, test_duration: Duration) -> Self {
        self.test_duration = test_duration;
        self
    }

    pub fn with_step_rate(mut self, step_rate: u32) -> Self {
        self.step_rate = step_rate;
        self
    }

    pub fn with_warm_up_rate(mut self, warm_up_rate: u32) -> Self {
        self.warm_up_rate = warm_up_rate;
        self
    }

    /// A zero duration skips the warm-up cycle.
    pub fn with_warm_up_duration(mut self, warm_up_duration: Duration) -> Self {
        self.warm_up_duration = warm_up_duration;
        self
    }

    /// Pause between two cycles. Zero disables it.
    pub fn with_rest(mut self, rest: Duration) -> Self {
        self.rest = rest;
        self
    }

    pub fn target(&self) -> &Path {
        &self.target
    }

    pub fn failure_threshold(&self) -> f64 {
        self.failure_threshold
    }

    pub fn start_rate(&self) -> u32 {
        self.start_rate
    }

    /// Length of one cycle. A zero duration means the default: the tool would otherwise attack
    /// without end.
    pub fn test_duration(&self) -> Duration {
        if self.test_duration.is_zero() {
            DEFAULT_TEST_DURATION
        } else {
            self.test_duration
        }
    }

    pub fn step_rate(&self) -> u32 {
        self.step_rate
    }

    pub fn warm_up_rate(&self) -> u32 {
        self.warm_up_rate
    }

    pub fn warm_up_duration(&self) -> Duration {
        self.warm_up_duration
    }

    pub fn rest(&self) -> Duration {
        self.rest
    }

    pub fn warm_up_enabled(&self) -> bool {
        !self.warm_up_duration.is_zero()
    }

    /// Check every field against its range. The target file must exist.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.target.is_file() {
            return Err(ConfigError::TargetNotFound(self.target.clone()));
        }

        // NOTE: Written so that NaN is rejected as well.
        let threshold = self.failure_threshold;
        if !(threshold > 0. && threshold <= MAX_FAILURE_THRESHOLD) {
            return Err(ConfigError::OutOfRange {
                field: "failure_threshold",
                value: threshold.to_string(),
                range: "(0, 10]",
            });
        }

        check_rate("start_rate", self.start_rate, MAX_RATE, "(0, 5000]")?;
        check_rate("step_rate", self.step_rate, MAX_STEP_RATE, "(0, 500]")?;
        check_rate("warm_up_rate", self.warm_up_rate, MAX_RATE, "(0, 5000]")?;

        check_duration(
            "test_duration",
            self.test_duration,
            MAX_TEST_DURATION_SECS,
            "[0, 3600] seconds",
        )?;
        check_duration(
            "warm_up_duration",
            self.warm_up_duration,
            MAX_WARM_UP_DURATION_SECS,
            "[0, 600] seconds",
        )?;
        check_duration("rest", self.rest, MAX_REST_SECS, "[0, 60] seconds")?;

        Ok(())
    }
}

fn check_rate(field: &'static str, rate: u32, max: u32, range: &'static str) -> Result<(), ConfigError> {
    if rate == 0 || rate > max {
        Err(ConfigError::OutOfRange {
            field,
            value: rate.to_string(),
            range,
        })
    } else {
        Ok(())
    }
}

fn check_duration(
    field: &'static str,
    duration: Duration,
    max_secs: u64,
    range: &'static str,
) -> Result<(), ConfigError> {
    if duration > Duration::from_secs(max_secs) {
        Err(ConfigError::OutOfRange {
            field,
            value: humantime::format_duration(duration).to_string(),
            range,
        })
    } else {
        Ok(())
    }
}
