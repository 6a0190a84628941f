//! Sequencing of a full load test run
use crate::controllers::{Action, RateController};
use crate::error::RunError;
use crate::report::ReportWriter;
use crate::runner::{CommandRunner, RunnerError};
use humantime::format_duration;
use std::future::Future;
use std::num::NonZeroU32;
use surge_core::{Measurement, RunConfig, RunHistory, Termination};
use tokio_util::sync::CancellationToken;
#[allow(unused_imports)]
use tracing::{debug, error, info, instrument, trace, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Init,
    ToolCheck,
    WarmUp,
    LoadLoop,
    Interrupted,
    Summary,
    Done,
}

#[derive(Debug)]
pub struct RunOutcome {
    pub history: RunHistory,
    pub termination: Termination,
}

/// Drives one load test: tool check, warm-up, the adaptive load loop and the final report.
///
/// Cycles run strictly one after another. Cancelling the token handed to [`Orchestrator::run`]
/// stops the current cycle or rest and moves straight to the report with whatever was
/// measured so far.
pub struct Orchestrator<R, W> {
    config: RunConfig,
    runner: R,
    writer: W,
    state: RunState,
}

impl<R, W> Orchestrator<R, W>
where
    R: CommandRunner,
    W: ReportWriter,
{
    pub fn new(config: RunConfig, runner: R, writer: W) -> Self {
        Self {
            config,
            runner,
            writer,
            state: RunState::Init,
        }
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    pub fn writer(&self) -> &W {
        &self.writer
    }

    #[instrument(name = "load_test", skip_all, fields(target = %self.config.target().display()))]
    pub async fn run(&mut self, cancel: CancellationToken) -> Result<RunOutcome, RunError> {
        self.transition(RunState::Init);
        self.config.validate()?;
        info!("Running with config {:?}", self.config);

        self.transition(RunState::ToolCheck);
        self.runner
            .discover()
            .await
            .map_err(RunError::ToolUnavailable)?;

        let mut history = RunHistory::new(self.config.clone());
        let result = self.drive(&mut history, &cancel).await;

        let termination = match &result {
            Ok(termination) => *termination,
            Err(err) => {
                error!("Attack cycle failed: {err}");
                Termination::Failed
            }
        };
        if termination == Termination::Interrupted {
            self.transition(RunState::Interrupted);
        }
        history.set_termination(termination);
        info!("Load test finished: {}", history.statistics());

        self.transition(RunState::Summary);
        let report = self.writer.write(&history);
        self.transition(RunState::Done);

        match (result, report) {
            (Err(source), report) => {
                if let Err(err) = report {
                    error!("Error writing report: {err}");
                }
                Err(RunError::CommandExecution {
                    history: Box::new(history),
                    source,
                })
            }
            // An interrupt keeps its own outcome; a lost report is only logged.
            (Ok(Termination::Interrupted), Err(err)) => {
                error!("Error writing report: {err}");
                Ok(RunOutcome {
                    history,
                    termination: Termination::Interrupted,
                })
            }
            (Ok(_), Err(err)) => Err(err.into()),
            (Ok(termination), Ok(_)) => Ok(RunOutcome {
                history,
                termination,
            }),
        }
    }

    async fn drive(
        &mut self,
        history: &mut RunHistory,
        cancel: &CancellationToken,
    ) -> Result<Termination, RunnerError> {
        self.transition(RunState::WarmUp);
        if !self.warm_up(cancel).await? {
            return Ok(Termination::Interrupted);
        }

        self.transition(RunState::LoadLoop);
        self.load_loop(history, cancel).await
    }

    /// Returns `false` when interrupted.
    async fn warm_up(&self, cancel: &CancellationToken) -> Result<bool, RunnerError> {
        if !self.config.warm_up_enabled() {
            info!("Skipping warm-up of the target service.");
            return Ok(true);
        }

        // NOTE: Rates are non-zero once the config is validated.
        let rate = NonZeroU32::new(self.config.warm_up_rate()).unwrap_or(NonZeroU32::MIN);
        let duration = self.config.warm_up_duration();
        info!(
            "Warming up target service at {rate} requests/s for {}",
            format_duration(duration)
        );

        let attack = self.runner.attack(rate, duration, self.config.target());
        let Some(measurement) = cancellable(cancel, attack).await else {
            return Ok(false);
        };
        let measurement = measurement?;
        debug!("Warm-up result (discarded): {measurement}");

        Ok(self.rest(cancel).await)
    }

    async fn load_loop(
        &self,
        history: &mut RunHistory,
        cancel: &CancellationToken,
    ) -> Result<Termination, RunnerError> {
        let controller = RateController::from_config(&self.config);
        let duration = self.config.test_duration();
        let mut rate = NonZeroU32::new(self.config.start_rate()).unwrap_or(NonZeroU32::MIN);
        let mut fail_count = 0;

        loop {
            info!(
                "Attacking at {rate} requests/s for {}",
                format_duration(duration)
            );
            let attack = self.runner.attack(rate, duration, self.config.target());
            let measurement = match cancellable(cancel, attack).await {
                None => return Ok(Termination::Interrupted),
                Some(measurement) => measurement?,
            };

            info!("Cycle {}: {measurement}", history.len() + 1);
            record_metrics(rate, &measurement);

            let decision = controller.decide(rate, &measurement, fail_count);
            history.push(measurement);
            fail_count = decision.fail_count;

            match decision.action {
                Action::Stop(reason) => {
                    info!("Stopping load test: {reason}.");
                    return Ok(Termination::Completed(reason));
                }
                Action::Continue(next) => {
                    info!("Adjusting rate to {next} requests/s");
                    if !self.rest(cancel).await {
                        return Ok(Termination::Interrupted);
                    }
                    rate = next;
                }
            }
        }
    }

    /// Returns `false` when interrupted.
    async fn rest(&self, cancel: &CancellationToken) -> bool {
        let rest = self.config.rest();
        if rest.is_zero() {
            return true;
        }

        debug!("Rest for {}", format_duration(rest));
        cancellable(cancel, tokio::time::sleep(rest)).await.is_some()
    }

    fn transition(&mut self, state: RunState) {
        trace!("{:?} -> {:?}", self.state, state);
        self.state = state;
    }
}

/// `None` if `cancel` fires first. A cancelled token wins over a ready future.
async fn cancellable<F: Future>(cancel: &CancellationToken, fut: F) -> Option<F::Output> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => None,
        output = fut => Some(output),
    }
}

#[cfg(feature = "metrics")]
fn record_metrics(rate: NonZeroU32, measurement: &Measurement) {
    metrics::gauge!("surge.request_rate").set(f64::from(rate.get()));
    metrics::counter!("surge.cycles").increment(1);
    metrics::counter!("surge.requests").increment(measurement.total_requests());
    metrics::histogram!("surge.failure_percent").record(measurement.failure_percent());
}

#[cfg(not(feature = "metrics"))]
fn record_metrics(_rate: NonZeroU32, _measurement: &Measurement) {}
