use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Result of one attack cycle.
///
/// The field names on the wire follow the JSON report of the load generation tool, so a
/// `Measurement` can be deserialized straight from it and serialized back into the raw log.
/// Times (`duration` and every latency) stay in the tool's raw integer unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Measurement {
    #[serde(rename = "requests")]
    total_requests: u64,
    #[serde(rename = "rate")]
    request_rate: f64,
    #[serde(default)]
    throughput: f64,
    #[serde(rename = "success", deserialize_with = "ratio")]
    success_ratio: f64,
    duration: u64,
    latencies: Latencies,
    #[serde(default)]
    status_codes: BTreeMap<String, u64>,
    #[serde(default, deserialize_with = "nullable")]
    errors: Vec<String>,
    /// The report line this was parsed from, kept verbatim for the raw log.
    #[serde(skip)]
    raw: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Latencies {
    pub mean: u64,
    #[serde(rename = "50th")]
    pub p50: u64,
    #[serde(rename = "95th")]
    pub p95: u64,
    #[serde(rename = "99th")]
    pub p99: u64,
    pub max: u64,
}

impl Measurement {
    pub fn new(
        total_requests: u64,
        request_rate: f64,
        success_ratio: f64,
        duration: u64,
        latencies: Latencies,
    ) -> Self {
        Self {
            total_requests,
            request_rate,
            throughput: 0.,
            success_ratio: clamp_ratio(success_ratio),
            duration,
            latencies,
            status_codes: BTreeMap::new(),
            errors: vec![],
            raw: None,
        }
    }

    /// Attach the JSON report line this measurement was parsed from.
    pub fn with_raw(mut self, raw: impl Into<String>) -> Self {
        self.raw = Some(raw.into());
        self
    }

    /// Report line as the tool produced it, with every field the model ignores.
    pub fn raw(&self) -> Option<&str> {
        self.raw.as_deref()
    }

    pub fn total_requests(&self) -> u64 {
        self.total_requests
    }

    /// Requests per second the tool actually ran.
    pub fn request_rate(&self) -> f64 {
        self.request_rate
    }

    pub fn throughput(&self) -> f64 {
        self.throughput
    }

    /// Fraction of successful requests, always within `[0, 1]`.
    pub fn success_ratio(&self) -> f64 {
        self.success_ratio
    }

    pub fn failure_ratio(&self) -> f64 {
        1. - self.success_ratio
    }

    pub fn success_percent(&self) -> f64 {
        self.success_ratio * 100.
    }

    pub fn failure_percent(&self) -> f64 {
        100. * (1. - self.success_ratio)
    }

    pub fn duration(&self) -> u64 {
        self.duration
    }

    pub fn latencies(&self) -> &Latencies {
        &self.latencies
    }

    pub fn status_codes(&self) -> &BTreeMap<String, u64> {
        &self.status_codes
    }

    pub fn errors(&self) -> &[String] {
        &self.errors
    }
}

impl fmt::Display for Measurement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Requests={}, Rate={:.2}, Success={:.2}%, mean={}, p50={}, p95={}, p99={}, max={}",
            self.total_requests,
            self.request_rate,
            self.success_percent(),
            self.latencies.mean,
            self.latencies.p50,
            self.latencies.p95,
            self.latencies.p99,
            self.latencies.max,
        )
    }
}

fn clamp_ratio(ratio: f64) -> f64 {
    if ratio.is_nan() {
        0.
    } else {
        ratio.clamp(0., 1.)
    }
}

fn ratio<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    f64::deserialize(deserializer).map(clamp_ratio)
}

fn nullable<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
