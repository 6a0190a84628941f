#![cfg_attr(docsrs, feature(doc_cfg))]
//! Adaptive load testing on top of an external load generator.
//!
//! An [`Orchestrator`] warms up the target, then repeatedly attacks it through a
//! [`CommandRunner`], feeding every [`Measurement`] to the [`RateController`] which raises or
//! lowers the request rate until the failure threshold is found. The collected history is
//! handed to a [`ReportWriter`] at the end, also when the run is interrupted.

pub mod controllers;
pub mod error;
pub mod orchestrator;
pub mod report;
pub mod runner;

pub use controllers::{Action, Decision, RateController};
pub use error::{ExitReason, RunError};
pub use orchestrator::{Orchestrator, RunOutcome, RunState};
pub use report::{FileReportWriter, ReportError, ReportPaths, ReportWriter};
pub use runner::{CommandRunner, RunnerError, VegetaRunner};

pub use surge_core as core;
pub use surge_core::{Measurement, RunConfig, RunHistory, StopReason, Termination};

pub mod prelude {
    pub use crate::orchestrator::Orchestrator;
    pub use crate::report::{FileReportWriter, ReportWriter};
    pub use crate::runner::{CommandRunner, VegetaRunner};
    pub use surge_core::{RunConfig, RunHistory, RunStatistics};
    pub use tokio_util::sync::CancellationToken;
}
