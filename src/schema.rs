//! Benchmark result types written to `results/*.json`.
//!
//! `bench-compare` reads two of these files back, so fields are only ever
//! added, never renamed.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Top-level benchmark report written to a JSON file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenchmarkReport {
    /// Schema version for forward compatibility.
    pub schema_version: u32,
    /// Metadata about this run (hardware, git, timestamp).
    pub metadata: RunMetadata,
    /// Individual benchmark results.
    pub results: Vec<BenchmarkResult>,
}

/// Metadata captured at the start of a benchmark run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunMetadata {
    /// ISO 8601 timestamp of the run start.
    pub timestamp: String,
    /// Short git commit hash (empty if not in a git repo).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub git_commit: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub git_branch: Option<String>,
    /// Whether the working tree had uncommitted changes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub git_dirty: Option<bool>,
    /// Client identifier (always "rust" here).
    pub sdk: String,
    /// Crate version that produced the file.
    pub sdk_version: String,
    pub hardware: HardwareInfo,
}

/// Hardware information for reproducibility.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HardwareInfo {
    pub cpu: String,
    /// Number of logical cores.
    pub cores: usize,
    /// Total RAM in GB.
    pub ram_gb: u64,
    pub os: String,
    pub arch: String,
}

/// A single benchmark measurement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenchmarkResult {
    /// Benchmark name (e.g. "rpc/batch write").
    pub benchmark: String,
    /// Category, the suite name.
    pub category: String,
    /// Benchmark-specific parameters.
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    #[serde(default)]
    pub parameters: HashMap<String, serde_json::Value>,
    pub metrics: BenchmarkMetrics,
}

/// Metrics collected from a benchmark measurement.
///
/// All fields are optional; fields that don't apply are omitted from JSON
/// output.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct BenchmarkMetrics {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ops_per_sec: Option<f64>,
    /// Wall-clock time of the timed region.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub elapsed_ns: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iterations: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub threads: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub batch_size: Option<usize>,
}
