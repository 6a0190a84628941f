use crate::{Measurement, RunConfig};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Why the rate controller ended a run. Both are normal completions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StopReason {
    /// The failure threshold was breached too many times.
    RateTooHigh,
    /// The next adjustment would have been below the noise floor.
    RateConverged,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopReason::RateTooHigh => write!(f, "repeated threshold breach"),
            StopReason::RateConverged => write!(f, "adjustment below noise floor"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Termination {
    Completed(StopReason),
    Interrupted,
    /// A cycle could not be run; whatever was measured before is kept.
    Failed,
}

impl fmt::Display for Termination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Termination::Completed(reason) => write!(f, "completed ({reason})"),
            Termination::Interrupted => write!(f, "interrupted"),
            Termination::Failed => write!(f, "failed"),
        }
    }
}

/// Ordered measurements of one run together with the settings that produced them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunHistory {
    config: RunConfig,
    measurements: Vec<Measurement>,
    termination: Option<Termination>,
}

impl RunHistory {
    pub fn new(config: RunConfig) -> Self {
        Self {
            config,
            measurements: vec![],
            termination: None,
        }
    }

    pub fn push(&mut self, measurement: Measurement) {
        self.measurements.push(measurement);
    }

    pub fn set_termination(&mut self, termination: Termination) {
        self.termination = Some(termination);
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    pub fn measurements(&self) -> &[Measurement] {
        &self.measurements
    }

    pub fn len(&self) -> usize {
        self.measurements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.measurements.is_empty()
    }

    /// `None` until the run has ended.
    pub fn termination(&self) -> Option<Termination> {
        self.termination
    }

    pub fn statistics(&self) -> RunStatistics {
        let threshold = self.config.failure_threshold();
        let max_sustained_rate = self
            .measurements
            .iter()
            .filter(|m| m.failure_percent() <= threshold)
            .map(Measurement::request_rate)
            .fold(None, |acc: Option<f64>, rate| {
                Some(acc.map_or(rate, |max| max.max(rate)))
            });

        let last = self.measurements.last();
        RunStatistics {
            cycles: self.measurements.len(),
            max_sustained_rate,
            final_request_rate: last.map(Measurement::request_rate),
            final_failure_percent: last.map(Measurement::failure_percent),
            termination: self.termination,
        }
    }
}

/// Condensed view of a [`RunHistory`].
#[derive(Debug, Clone, PartialEq)]
pub struct RunStatistics {
    pub cycles: usize,
    /// Highest request rate whose failure percentage stayed within the threshold.
    pub max_sustained_rate: Option<f64>,
    pub final_request_rate: Option<f64>,
    pub final_failure_percent: Option<f64>,
    pub termination: Option<Termination>,
}

impl fmt::Display for RunStatistics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cycles={}", self.cycles)?;
        if let Some(rate) = self.max_sustained_rate {
            write!(f, ", max sustained rate={rate:.2}/s")?;
        }
        if let Some(failure) = self.final_failure_percent {
            write!(f, ", final failure={failure:.2}%")?;
        }
        if let Some(termination) = self.termination {
            write!(f, ", {termination}")?;
        }
        Ok(())
    }
}
