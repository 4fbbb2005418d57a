//! MIB Agent library.
//!
//! This crate wires the MIB registry to a running process: configuration,
//! a process-backed metric source, catalog loading, and periodic refresh.

pub mod catalog_file;
pub mod config;
pub mod error;
pub mod source;
pub mod stats;
pub mod task;

pub use catalog_file::load_catalog;
pub use config::{AgentConfig, Args};
pub use error::Error;
pub use source::ProcessMetricSource;
pub use stats::{new_shared_stats, ServerStats, SharedServerStats};
pub use task::RefreshTask;
