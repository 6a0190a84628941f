//! Rendering and persisting a finished run.
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};
use surge_core::{Measurement, RunHistory};
use thiserror::Error;
use time::{macros::format_description, OffsetDateTime};
#[allow(unused_imports)]
use tracing::{debug, error, info, warn};

const FILE_PREFIX: &str = "load_test_vegeta";

const CSV_HEADER: &str = "ID,Total_Requests,Request_Rate,Success%,Failure%,Time(s),Latency_Mean(s),Latency_50th(s),Latency_95th(s),Latency_99th(s),Latency_Max(s)";

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("Error writing {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Error serializing measurement: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Error formatting timestamp: {0}")]
    Timestamp(#[from] time::error::Format),
}

/// Persists a run once it is over.
pub trait ReportWriter: Send {
    /// Returns `None` when there was nothing to write.
    fn write(&mut self, history: &RunHistory) -> Result<Option<ReportPaths>, ReportError>;
}

/// Files produced by [`FileReportWriter`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportPaths {
    /// One JSON report per line, verbatim when the tool's report line was kept.
    pub log: PathBuf,
    pub settings: PathBuf,
    pub csv: PathBuf,
}

/// Writes `load_test_vegeta_<user>_<timestamp>{.log,_setting.log,.csv}` into a directory.
#[derive(Debug, Clone)]
pub struct FileReportWriter {
    dir: PathBuf,
    user: String,
}

impl FileReportWriter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        let user = std::env::var("USER")
            .or_else(|_| std::env::var("USERNAME"))
            .unwrap_or_else(|_| "unknown".to_string());
        Self {
            dir: dir.into(),
            user,
        }
    }

    pub fn with_user(mut self, user: impl Into<String>) -> Self {
        self.user = user.into();
        self
    }

    fn base_name(&self) -> Result<String, ReportError> {
        let format = format_description!("[year]_[month]_[day]_[hour]_[minute]_[second]");
        let now = OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc());
        let stamp = now.format(&format)?;
        Ok(format!("{FILE_PREFIX}_{}_{stamp}", self.user))
    }
}

impl ReportWriter for FileReportWriter {
    fn write(&mut self, history: &RunHistory) -> Result<Option<ReportPaths>, ReportError> {
        if history.is_empty() {
            debug!("No measurements; skipping report.");
            return Ok(None);
        }

        let name = self.base_name()?;
        let paths = ReportPaths {
            log: self.dir.join(format!("{name}.log")),
            settings: self.dir.join(format!("{name}_setting.log")),
            csv: self.dir.join(format!("{name}.csv")),
        };

        let mut log = String::new();
        for measurement in history.measurements() {
            match measurement.raw() {
                Some(raw) => log.push_str(raw),
                None => log.push_str(&serde_json::to_string(measurement)?),
            }
            log.push('\n');
        }
        write_file(&paths.log, &log)?;

        let settings = settings_summary(history);
        write_file(&paths.settings, &settings)?;
        write_file(&paths.csv, &render_csv(history))?;

        info!("{settings}");
        info!("Test result is saved to {}", paths.log.display());
        info!("Test settings are saved to {}", paths.settings.display());
        info!("Sorted test result is saved to {}", paths.csv.display());

        Ok(Some(paths))
    }
}

fn write_file(path: &Path, contents: &str) -> Result<(), ReportError> {
    fs::write(path, contents).map_err(|source| ReportError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Scale a raw tool time value: `value / 1_000_000` in `ms`, or seconds once that exceeds 1000.
pub fn scale_time(value: u64) -> (f64, &'static str) {
    let scaled = value as f64 / 1_000_000.;
    if scaled > 1_000. {
        (scaled / 1_000., "s")
    } else {
        (scaled, "ms")
    }
}

/// Every setting of the run plus the number of measured cycles.
pub fn settings_summary(history: &RunHistory) -> String {
    let config = history.config();
    let mut out = String::new();
    let _ = writeln!(out, "\n----- Load Test Summary -----\n");
    let _ = writeln!(
        out,
        "\tTarget Failure Threshold: {}%",
        config.failure_threshold()
    );
    let _ = writeln!(
        out,
        "\tTarget File             : {}",
        config.target().display()
    );
    let _ = writeln!(out, "\tStart Request Rate      : {}/second", config.start_rate());
    let _ = writeln!(out, "\tBump-up Rate            : {}/second", config.step_rate());
    let _ = writeln!(
        out,
        "\tEach Load Test Time     : {} seconds",
        config.test_duration().as_secs()
    );
    let _ = writeln!(
        out,
        "\tBreak between two runs  : {} seconds",
        config.rest().as_secs()
    );
    let _ = writeln!(
        out,
        "\tService Warm-up Rate    : {}/second",
        config.warm_up_rate()
    );
    let _ = writeln!(
        out,
        "\t        Warm-up Time    : {} seconds\n",
        config.warm_up_duration().as_secs()
    );
    let _ = writeln!(out, "\tTotal Runs: {}", history.len());
    if let Some(termination) = history.termination() {
        let _ = writeln!(out, "\tTermination: {termination}");
    }
    out
}

pub fn render_csv(history: &RunHistory) -> String {
    let mut out = String::from(CSV_HEADER);
    out.push('\n');
    for (idx, m) in history.measurements().iter().enumerate() {
        let latencies = m.latencies();
        let _ = writeln!(
            out,
            "{},{},{},{:.4},{:.4},{:.3},{:.3},{:.3},{:.3},{:.3},{:.3}",
            idx + 1,
            m.total_requests(),
            m.request_rate() as u64,
            m.success_percent(),
            m.failure_percent(),
            scale_time(m.duration()).0,
            scale_time(latencies.mean).0,
            scale_time(latencies.p50).0,
            scale_time(latencies.p95).0,
            scale_time(latencies.p99).0,
            scale_time(latencies.max).0,
        );
    }
    out
}

/// Console table with one row per measurement, times carrying their unit.
pub fn render_table(history: &RunHistory) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "Requests                                         Latencies"
    );
    let _ = writeln!(
        out,
        "ID  Total   Rate   Success%  Failure%  Time      Mean      50th      95th      99th      Max"
    );
    let _ = writeln!(
        out,
        "==  ======  =====  ========  ========  ========  ========  ========  ========  ========  ========"
    );
    for (idx, m) in history.measurements().iter().enumerate() {
        let _ = writeln!(out, "{}", table_row(idx + 1, m));
    }
    out
}

fn table_row(id: usize, m: &Measurement) -> String {
    let latencies = m.latencies();
    let mut row = format!(
        "{:2}  {:6}  {:5}  {:<8.4}  {:<8.4}",
        id,
        m.total_requests(),
        m.request_rate() as u64,
        m.success_percent(),
        m.failure_percent(),
    );
    for value in [
        m.duration(),
        latencies.mean,
        latencies.p50,
        latencies.p95,
        latencies.p99,
        latencies.max,
    ] {
        let (value, unit) = scale_time(value);
        let _ = write!(row, "  {value:>6.3}{unit:<2}");
    }
    row
}
