//! Default `surge` command line runtime
//!
//! Owns everything the library leaves to the caller: argument parsing, the log subscriber, the
//! interrupt handler and mapping the outcome of a run onto a process exit code.
use clap::{CommandFactory, Parser};
use std::path::PathBuf;
use std::time::Duration;
use surge::core::{
    DEFAULT_FAILURE_THRESHOLD, DEFAULT_REST, DEFAULT_START_RATE, DEFAULT_STEP_RATE,
    DEFAULT_TEST_DURATION, DEFAULT_TOOL, DEFAULT_WARM_UP_DURATION, DEFAULT_WARM_UP_RATE,
};
use surge::report::render_table;
use surge::{ExitReason, FileReportWriter, Orchestrator, RunConfig, RunError, VegetaRunner};
use tokio_util::sync::CancellationToken;
#[allow(unused)]
use tracing::{debug, error, info, instrument, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

const DEFAULT_LOG_FILTER: &str = "surge=info";

/// Install the global `tracing` subscriber. `RUST_LOG` overrides the default filter.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let subscriber = FmtSubscriber::builder().with_env_filter(filter).finish();
    if let Err(err) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Unable to install log subscriber: {err}");
    }
}

/// Find the highest request rate a service sustains within a failure threshold.
#[derive(Parser, Debug, Clone)]
#[command(name = "surge", version, about)]
pub struct SurgeCli {
    /// File with the requests to send, in the load tool's targets format.
    #[arg(short = 'f', long, env = "SURGE_TARGET_FILE")]
    target_file: Option<PathBuf>,

    /// Acceptable failure percentage, in (0, 10].
    #[arg(short = 't', long, env = "SURGE_FAILURE_THRESHOLD", default_value_t = DEFAULT_FAILURE_THRESHOLD)]
    failure_threshold: f64,

    /// Request rate of the first cycle, per second.
    #[arg(short = 's', long, env = "SURGE_START_RATE", default_value_t = DEFAULT_START_RATE)]
    start_rate: u32,

    /// Length of each cycle, in seconds. 0 keeps the default.
    #[arg(short = 'e', long, env = "SURGE_TEST_TIME", default_value_t = DEFAULT_TEST_DURATION.as_secs())]
    test_time: u64,

    /// Base rate adjustment between cycles, per second.
    #[arg(short = 'p', long, env = "SURGE_STEP_RATE", default_value_t = DEFAULT_STEP_RATE)]
    step_rate: u32,

    /// Warm-up request rate, per second. 0 skips the warm-up.
    #[arg(short = 'u', long, env = "SURGE_WARM_UP_RATE", default_value_t = DEFAULT_WARM_UP_RATE)]
    warm_up_rate: u32,

    /// Warm-up length, in seconds. 0 skips the warm-up.
    #[arg(short = 'w', long, env = "SURGE_WARM_UP_TIME", default_value_t = DEFAULT_WARM_UP_DURATION.as_secs())]
    warm_up_time: u64,

    /// Pause between cycles, in seconds.
    #[arg(short = 'r', long, env = "SURGE_REST_TIME", default_value_t = DEFAULT_REST.as_secs())]
    rest_time: u64,

    /// Directory the report files are written to.
    #[arg(short = 'o', long, env = "SURGE_OUTPUT_DIR", default_value = ".")]
    output_dir: PathBuf,

    /// Name or path of the load generation tool.
    #[arg(long, env = "SURGE_TOOL", default_value = DEFAULT_TOOL)]
    tool: String,
}

impl Default for SurgeCli {
    fn default() -> Self {
        Self {
            target_file: None,
            failure_threshold: DEFAULT_FAILURE_THRESHOLD,
            start_rate: DEFAULT_START_RATE,
            test_time: DEFAULT_TEST_DURATION.as_secs(),
            step_rate: DEFAULT_STEP_RATE,
            warm_up_rate: DEFAULT_WARM_UP_RATE,
            warm_up_time: DEFAULT_WARM_UP_DURATION.as_secs(),
            rest_time: DEFAULT_REST.as_secs(),
            output_dir: PathBuf::from("."),
            tool: DEFAULT_TOOL.to_string(),
        }
    }
}

impl SurgeCli {
    /// `None` without a target file. Ranges are checked later by [`RunConfig::validate`].
    pub fn run_config(&self) -> Option<RunConfig> {
        let target = self.target_file.clone()?;

        let mut config = RunConfig::new(target)
            .with_failure_threshold(self.failure_threshold)
            .with_start_rate(self.start_rate)
            .with_test_duration(Duration::from_secs(self.test_time))
            .with_step_rate(self.step_rate)
            .with_rest(Duration::from_secs(self.rest_time));

        // A zero warm-up rate turns the warm-up off instead of failing validation.
        if self.warm_up_rate == 0 {
            config = config.with_warm_up_duration(Duration::ZERO);
        } else {
            config = config
                .with_warm_up_rate(self.warm_up_rate)
                .with_warm_up_duration(Duration::from_secs(self.warm_up_time));
        }

        Some(config)
    }
}

/// Default `surge` runtime.
///
/// # Example
///
/// ```ignore
/// use surge_runtime::SurgeRuntime;
///
/// #[tokio::main]
/// async fn main() -> std::process::ExitCode {
///     SurgeRuntime::new()
///         .with_args()
///         .run()
///         .await
///         .into()
/// }
/// ```
#[derive(Debug, Default)]
pub struct SurgeRuntime {
    cli: SurgeCli,
    cancel: CancellationToken,
}

impl SurgeRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use the `surge` command line arguments (see `surge --help`).
    pub fn with_args(mut self) -> Self {
        self.cli = SurgeCli::parse();
        self
    }

    pub fn with_cli(mut self, cli: SurgeCli) -> Self {
        self.cli = cli;
        self
    }

    pub fn target_file(mut self, target: impl Into<PathBuf>) -> Self {
        self.cli.target_file = Some(target.into());
        self
    }

    pub fn output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cli.output_dir = dir.into();
        self
    }

    pub fn tool(mut self, tool: impl Into<String>) -> Self {
        self.cli.tool = tool.into();
        self
    }

    /// Token cancelled on Ctrl-C. Cancelling it by hand has the same effect.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    #[instrument(name = "surge", skip_all, fields(tool = %self.cli.tool))]
    pub async fn run(self) -> ExitReason {
        let Some(config) = self.cli.run_config() else {
            error!("No target file given.");
            if let Err(err) = SurgeCli::command().print_help() {
                error!("Unable to print usage: {err}");
            }
            return ExitReason::MissingParameters;
        };

        let interrupt = tokio::spawn(interrupt_task(self.cancel.clone()));

        let runner = VegetaRunner::with_tool(self.cli.tool);
        let writer = FileReportWriter::new(self.cli.output_dir);
        let mut orchestrator = Orchestrator::new(config, runner, writer);

        let reason = match orchestrator.run(self.cancel.clone()).await {
            Ok(outcome) => {
                if !outcome.history.is_empty() {
                    println!("{}", render_table(&outcome.history));
                }
                ExitReason::from(outcome.termination)
            }
            Err(err) => {
                if let RunError::CommandExecution { history, .. } = &err {
                    if !history.is_empty() {
                        println!("{}", render_table(history));
                    }
                }
                error!("{err}");
                err.exit_reason()
            }
        };

        interrupt.abort();
        info!("Exiting with code {}", reason.code());
        reason
    }
}

async fn interrupt_task(cancel: CancellationToken) {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            warn!("Interrupted. Stopping the load test.");
            cancel.cancel();
        }
        Err(err) => error!("Unable to listen for Ctrl-C: {err}"),
    }
}
