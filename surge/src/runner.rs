//! Adapter boundary to the external load generation tool.
mod vegeta;

pub use vegeta::{normalize_report, parse_report, VegetaRunner};

use std::num::NonZeroU32;
use std::path::{Path, PathBuf};
use std::process::ExitStatus;
use std::time::Duration;
use surge_core::Measurement;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("{0} is not installed")]
    ToolNotInstalled(String),

    #[error("{tool} is not properly installed: {reason}")]
    ToolNotExecutable { tool: String, reason: String },

    #[error("Failed to run `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("`{command}` exited with {status}: {stderr}")]
    CommandFailed {
        command: String,
        status: ExitStatus,
        stderr: String,
    },

    #[error("Report output is empty")]
    EmptyReport,

    #[error("Error parsing report: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Runs attack cycles against the target.
///
/// Implementations block (asynchronously) for the whole attack window. Dropping an in-flight
/// [`attack`](CommandRunner::attack) future must stop the attack.
#[trait_variant::make(CommandRunner: Send)]
pub trait LocalCommandRunner {
    /// Locate the tool and check that it can be executed. Returns where it was found.
    async fn discover(&self) -> Result<PathBuf, RunnerError>;

    /// Attack `target` at `rate` requests/second for `duration` and return the parsed report.
    async fn attack(
        &self,
        rate: NonZeroU32,
        duration: Duration,
        target: &Path,
    ) -> Result<Measurement, RunnerError>;
}
