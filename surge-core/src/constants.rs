use std::time::Duration;

/// Name of the load generation binary driven by default.
pub const DEFAULT_TOOL: &str = "vegeta";

/// The default acceptable failure percentage.
pub const DEFAULT_FAILURE_THRESHOLD: f64 = 5.0;
pub const DEFAULT_START_RATE: u32 = 50;
pub const DEFAULT_TEST_DURATION: Duration = Duration::from_secs(10);
pub const DEFAULT_STEP_RATE: u32 = 50;
pub const DEFAULT_WARM_UP_RATE: u32 = 20;
pub const DEFAULT_WARM_UP_DURATION: Duration = Duration::from_secs(10);
pub const DEFAULT_REST: Duration = Duration::from_secs(5);

pub const MAX_FAILURE_THRESHOLD: f64 = 10.0;
/// Upper bound for both the start rate and the warm-up rate (requests/second).
pub const MAX_RATE: u32 = 5_000;
pub const MAX_STEP_RATE: u32 = 500;
pub const MAX_TEST_DURATION_SECS: u64 = 3_600;
pub const MAX_WARM_UP_DURATION_SECS: u64 = 600;
pub const MAX_REST_SECS: u64 = 60;

/// Slack below which a measurement is considered acceptable.
pub const ACCEPTABLE_SLACK: f64 = 0.2;

/// Number of unacceptable measurements after which the run stops.
pub const MAX_FAIL_COUNT: u32 = 5;

/// After a soft-fail the ramp-up step is divided by this.
pub const CAUTIOUS_STEP_DIVISOR: u32 = 5;

/// Rate adjustments smaller than this are treated as noise and end the run.
pub const MIN_RATE_ADJUSTMENT: i64 = 5;
