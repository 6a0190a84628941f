use std::num::NonZeroU32;
use surge_core::{
    Measurement, RunConfig, StopReason, ACCEPTABLE_SLACK, CAUTIOUS_STEP_DIVISOR, MAX_FAIL_COUNT,
    MIN_RATE_ADJUSTMENT,
};
#[allow(unused_imports)]
use tracing::{debug, error, info, instrument, trace, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Continue(NonZeroU32),
    Stop(StopReason),
}

/// Verdict for one measurement plus the fail count to hand to the next call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decision {
    pub action: Action,
    pub fail_count: u32,
}

/// Adjusts the request rate after each attack cycle based on the observed failure rate.
///
/// Stateless: the consecutive fail count is passed in and handed back with every
/// [`Decision`]. The acceptable branch never resets it, so one early soft-fail keeps later
/// ramp-ups cautious for the rest of the run.
#[derive(Debug, Clone, Copy)]
pub struct RateController {
    failure_threshold: f64,
    step_rate: u32,
}

impl RateController {
    /// `failure_threshold` is a percentage, e.g. `5.0`.
    pub fn new(failure_threshold: f64, step_rate: u32) -> Self {
        Self {
            failure_threshold,
            step_rate,
        }
    }

    pub fn from_config(config: &RunConfig) -> Self {
        Self::new(config.failure_threshold(), config.step_rate())
    }

    pub fn decide(
        &self,
        current_rate: NonZeroU32,
        measurement: &Measurement,
        fail_count: u32,
    ) -> Decision {
        let current = i64::from(current_rate.get());
        let step = i64::from(self.step_rate);
        let failure_rate = measurement.failure_percent();
        let slack = failure_rate / self.failure_threshold - 1.;

        debug!(
            "Expected failure rate {}%, actual {:.4}% (slack {:.2})",
            self.failure_threshold, failure_rate, slack
        );

        if slack < ACCEPTABLE_SLACK {
            let step = if fail_count == 0 {
                step
            } else {
                step / i64::from(CAUTIOUS_STEP_DIVISOR)
            };
            return Decision {
                action: next_rate(current + step),
                fail_count,
            };
        }

        let fail_count = fail_count.saturating_add(1);
        if fail_count >= MAX_FAIL_COUNT {
            debug!("Failure rate is too high, tried {fail_count} times.");
            return Decision {
                action: Action::Stop(StopReason::RateTooHigh),
                fail_count,
            };
        }

        let new_rate = if failure_rate < self.failure_threshold {
            current + step
        } else {
            let ratio = 1. - self.failure_threshold / failure_rate;
            current - (step as f64 * ratio).floor() as i64
        };

        if (new_rate - current).abs() < MIN_RATE_ADJUSTMENT {
            debug!("New rate {new_rate} is too close to current rate {current}.");
            return Decision {
                action: Action::Stop(StopReason::RateConverged),
                fail_count,
            };
        }

        Decision {
            action: next_rate(new_rate),
            fail_count,
        }
    }
}

/// A rate that cannot be run (zero, negative or past `u32`) ends the run.
fn next_rate(rate: i64) -> Action {
    match u32::try_from(rate).ok().and_then(NonZeroU32::new) {
        Some(rate) => Action::Continue(rate),
        None => {
            warn!("Rate adjustment produced an unusable rate of {rate}.");
            Action::Stop(StopReason::RateTooHigh)
        }
    }
}
