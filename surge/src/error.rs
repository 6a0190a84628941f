use crate::report::ReportError;
use crate::runner::RunnerError;
use surge_core::{ConfigError, RunHistory, Termination};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RunError {
    #[error("Invalid configuration: {0}")]
    Validation(#[from] ConfigError),

    #[error("Load generation tool unavailable: {0}")]
    ToolUnavailable(#[source] RunnerError),

    /// The report for `history` has already been written when this is returned.
    #[error("Attack cycle failed after {} measurement(s): {source}", history.len())]
    CommandExecution {
        history: Box<RunHistory>,
        #[source]
        source: RunnerError,
    },

    #[error("Error writing report: {0}")]
    Report(#[from] ReportError),
}

impl RunError {
    pub fn exit_reason(&self) -> ExitReason {
        match self {
            RunError::Validation(ConfigError::TargetNotFound(_)) => ExitReason::FileNotExist,
            RunError::Validation(ConfigError::OutOfRange { .. }) => ExitReason::ValueOutOfRange,
            RunError::ToolUnavailable(RunnerError::ToolNotInstalled(_)) => {
                ExitReason::ToolNotInstalled
            }
            RunError::ToolUnavailable(_) => ExitReason::ToolNotProperlyInstalled,
            RunError::CommandExecution { .. } => ExitReason::ExecuteCommand,
            RunError::Report(_) => ExitReason::ReportWrite,
        }
    }
}

/// Process exit codes. Scripts driving `surge` match on these, keep them stable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ExitReason {
    Ok = 0,
    MissingParameters = 100,
    ValueOutOfRange = 105,
    FileNotExist = 107,
    ToolNotInstalled = 122,
    ToolNotProperlyInstalled = 125,
    ExecuteCommand = 130,
    ReportWrite = 135,
    AbnormalExit = 232,
}

impl ExitReason {
    pub fn code(self) -> u8 {
        self as u8
    }
}

impl From<Termination> for ExitReason {
    fn from(termination: Termination) -> Self {
        match termination {
            Termination::Completed(_) => ExitReason::Ok,
            Termination::Interrupted => ExitReason::AbnormalExit,
            Termination::Failed => ExitReason::ExecuteCommand,
        }
    }
}

impl From<ExitReason> for std::process::ExitCode {
    fn from(reason: ExitReason) -> Self {
        std::process::ExitCode::from(reason.code())
    }
}
