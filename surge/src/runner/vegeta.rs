use super::{CommandRunner, RunnerError};
use std::num::NonZeroU32;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use surge_core::{Measurement, DEFAULT_TOOL};
use tokio::process::Command;
#[allow(unused_imports)]
use tracing::{debug, error, info, trace, warn};

#[cfg(windows)]
const LOOKUP_COMMAND: &str = "where";
#[cfg(not(windows))]
const LOOKUP_COMMAND: &str = "which";

/// `vegeta --help` exits with 2 on older builds and 0 on newer ones.
const HELP_EXIT_CODES: [i32; 2] = [0, 2];

/// Drives the `vegeta` binary: `vegeta attack ... | vegeta report -type=json`.
#[derive(Debug, Clone)]
pub struct VegetaRunner {
    tool: String,
}

impl Default for VegetaRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl VegetaRunner {
    pub fn new() -> Self {
        Self::with_tool(DEFAULT_TOOL)
    }

    /// Use a different binary name or path.
    pub fn with_tool(tool: impl Into<String>) -> Self {
        Self { tool: tool.into() }
    }

    pub fn tool(&self) -> &str {
        &self.tool
    }

    fn attack_args(rate: NonZeroU32, duration: Duration, target: &Path) -> Vec<String> {
        vec![
            "attack".to_string(),
            format!("-rate={rate}"),
            format!("-duration={}s", duration.as_secs()),
            format!("-targets={}", target.display()),
        ]
    }

    fn report_args() -> [&'static str; 2] {
        ["report", "-type=json"]
    }
}

impl CommandRunner for VegetaRunner {
    async fn discover(&self) -> Result<PathBuf, RunnerError> {
        let output = Command::new(LOOKUP_COMMAND)
            .arg(&self.tool)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|err| {
                warn!("Unable to run {LOOKUP_COMMAND}: {err}");
                RunnerError::ToolNotInstalled(self.tool.clone())
            })?;

        if !output.status.success() {
            return Err(RunnerError::ToolNotInstalled(self.tool.clone()));
        }

        let location = String::from_utf8_lossy(&output.stdout)
            .lines()
            .map(str::trim)
            .find(|line| !line.is_empty())
            .map(PathBuf::from)
            .ok_or_else(|| RunnerError::ToolNotInstalled(self.tool.clone()))?;
        info!("{} is installed at {}", self.tool, location.display());

        let status = Command::new(&location)
            .arg("--help")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map_err(|err| RunnerError::ToolNotExecutable {
                tool: self.tool.clone(),
                reason: err.to_string(),
            })?;

        match status.code() {
            Some(code) if HELP_EXIT_CODES.contains(&code) => Ok(location),
            _ => Err(RunnerError::ToolNotExecutable {
                tool: self.tool.clone(),
                reason: format!("`{} --help` exited with {status}", self.tool),
            }),
        }
    }

    async fn attack(
        &self,
        rate: NonZeroU32,
        duration: Duration,
        target: &Path,
    ) -> Result<Measurement, RunnerError> {
        let attack_args = Self::attack_args(rate, duration, target);
        let command = format!(
            "{tool} {} | {tool} {}",
            attack_args.join(" "),
            Self::report_args().join(" "),
            tool = self.tool,
        );
        debug!("Executing: {command}");

        let spawn_err = |source| RunnerError::Spawn {
            command: command.clone(),
            source,
        };

        // NOTE: kill_on_drop so that dropping this future (e.g. on cancellation) stops the attack.
        let mut attack = Command::new(&self.tool)
            .args(&attack_args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(spawn_err)?;

        let results: Stdio = attack
            .stdout
            .take()
            .ok_or_else(|| {
                spawn_err(std::io::Error::new(
                    std::io::ErrorKind::BrokenPipe,
                    "attack stdout unavailable",
                ))
            })?
            .try_into()
            .map_err(spawn_err)?;

        let report = Command::new(&self.tool)
            .args(Self::report_args())
            .stdin(results)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(spawn_err)?;

        let (attack_output, report_output) =
            tokio::join!(attack.wait_with_output(), report.wait_with_output());
        let attack_output = attack_output.map_err(spawn_err)?;
        let report_output = report_output.map_err(spawn_err)?;

        for output in [&attack_output, &report_output] {
            if !output.status.success() {
                return Err(RunnerError::CommandFailed {
                    command,
                    status: output.status,
                    stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
                });
            }
        }

        let measurement = parse_report(&String::from_utf8_lossy(&report_output.stdout))?;
        trace!("Report: {measurement}");
        Ok(measurement)
    }
}

/// The tool's report may use single quotes for keys and strings. Rewrite them as double quotes
/// so the report is valid JSON.
pub fn normalize_report(raw: &str) -> String {
    raw.replace('\'', "\"")
}

/// Parse the first non-empty line of the report. Quotes are only rewritten when the line is not
/// valid JSON as is, since error strings inside a valid report may contain apostrophes.
pub fn parse_report(raw: &str) -> Result<Measurement, RunnerError> {
    let line = raw
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .ok_or(RunnerError::EmptyReport)?;

    match serde_json::from_str::<Measurement>(line) {
        Ok(measurement) => Ok(measurement.with_raw(line)),
        Err(err) => {
            trace!("Report is not valid JSON ({err}), normalizing quotes.");
            let normalized = normalize_report(line);
            let measurement: Measurement = serde_json::from_str(&normalized)?;
            Ok(measurement.with_raw(normalized))
        }
    }
}
