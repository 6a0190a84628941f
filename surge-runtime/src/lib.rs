//! Command line runtime for `surge`.
//!
//! Parses the CLI, installs the log subscriber and the Ctrl-C handler, then drives a
//! [`surge::Orchestrator`] with the `vegeta` runner and the file report writer.
pub mod runtime;

pub use crate::runtime::{init_tracing, SurgeCli, SurgeRuntime};
