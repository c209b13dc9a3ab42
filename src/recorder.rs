//! Result recorder for saving benchmark results to JSON files.
//!
//! Creates JSON files in the `results/` directory following the schema
//! defined in [`crate::schema`].

use crate::runner::RunResult;
use crate::schema::*;

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use tracing::info;

/// Accumulates benchmark results and writes them to a JSON file.
pub struct ResultRecorder {
    category: String,
    metadata: RunMetadata,
    results: Vec<BenchmarkResult>,
}

impl ResultRecorder {
    /// Create a new recorder for the given category.
    ///
    /// Captures metadata (hardware, git, timestamp) at construction time.
    pub fn new(category: &str) -> Self {
        Self {
            category: category.to_string(),
            metadata: RunMetadata {
                timestamp: iso8601_now(),
                git_commit: git_short_commit(),
                git_branch: git_branch(),
                git_dirty: git_is_dirty(),
                sdk: "rust".to_string(),
                sdk_version: env!("CARGO_PKG_VERSION").to_string(),
                hardware: capture_hardware(),
            },
            results: Vec::new(),
        }
    }

    /// Record a raw benchmark result.
    pub fn record(&mut self, result: BenchmarkResult) {
        self.results.push(result);
    }

    /// Record the outcome of one harness case.
    ///
    /// The `batch_size` metric is taken from `parameters`, when present.
    pub fn record_run(&mut self, run: &RunResult, parameters: HashMap<String, serde_json::Value>) {
        let batch_size = parameters
            .get("batch_size")
            .and_then(serde_json::Value::as_u64)
            .map(|n| n as usize);
        self.results.push(BenchmarkResult {
            benchmark: format!("{}/{}", self.category, run.case_name),
            category: self.category.clone(),
            parameters,
            metrics: BenchmarkMetrics {
                ops_per_sec: Some(run.ops_per_sec()),
                elapsed_ns: Some(run.elapsed.as_nanos() as u64),
                iterations: Some(run.iterations),
                threads: Some(run.concurrency),
                batch_size,
            },
        });
    }

    pub fn results(&self) -> &[BenchmarkResult] {
        &self.results
    }

    /// Write all accumulated results to a JSON file in `results/`.
    pub fn save(self) -> io::Result<PathBuf> {
        self.save_to(Path::new("results"))
    }

    /// Write all accumulated results to a JSON file in `dir`.
    ///
    /// File naming: `<category>-<timestamp>-<commit>.json`
    pub fn save_to(self, dir: &Path) -> io::Result<PathBuf> {
        let commit = self
            .metadata
            .git_commit
            .as_deref()
            .unwrap_or("unknown")
            .to_string();
        // Colons are not allowed in file names on every platform
        let ts = self.metadata.timestamp.replace(':', "-");
        let filename = format!("{}-{}-{}.json", self.category, ts, commit);

        let report = BenchmarkReport {
            schema_version: 1,
            metadata: self.metadata,
            results: self.results,
        };

        std::fs::create_dir_all(dir)?;
        let path = dir.join(&filename);

        let json = serde_json::to_string_pretty(&report)?;
        std::fs::write(&path, json)?;

        info!(path = %path.display(), "results saved");
        Ok(path)
    }
}

// ---------------------------------------------------------------------------
// Metadata capture helpers
// ---------------------------------------------------------------------------

fn iso8601_now() -> String {
    let now = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or_default();
    let secs = now.as_secs();

    let days = secs / 86400;
    let time_of_day = secs % 86400;
    let hours = time_of_day / 3600;
    let minutes = (time_of_day % 3600) / 60;
    let seconds = time_of_day % 60;

    let (year, month, day) = days_to_ymd(days);

    format!(
        "{:04}-{:02}-{:02}T{:02}:{:02}:{:02}Z",
        year, month, day, hours, minutes, seconds
    )
}

fn days_to_ymd(mut days: u64) -> (u64, u64, u64) {
    // Algorithm from Howard Hinnant's date library
    days += 719468;
    let era = days / 146097;
    let doe = days - era * 146097;
    let yoe = (doe - doe / 1460 + doe / 36524 - doe / 146096) / 365;
    let y = yoe + era * 400;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let d = doy - (153 * mp + 2) / 5 + 1;
    let m = if mp < 10 { mp + 3 } else { mp - 9 };
    let y = if m <= 2 { y + 1 } else { y };
    (y, m, d)
}

fn git(args: &[&str]) -> Option<std::process::Output> {
    std::process::Command::new("git")
        .args(args)
        .output()
        .ok()
        .filter(|o| o.status.success())
}

fn git_short_commit() -> Option<String> {
    git(&["rev-parse", "--short", "HEAD"])
        .map(|o| String::from_utf8_lossy(&o.stdout).trim().to_string())
}

fn git_branch() -> Option<String> {
    git(&["rev-parse", "--abbrev-ref", "HEAD"])
        .map(|o| String::from_utf8_lossy(&o.stdout).trim().to_string())
}

fn git_is_dirty() -> Option<bool> {
    git(&["status", "--porcelain"]).map(|o| !o.stdout.is_empty())
}

pub fn capture_hardware() -> HardwareInfo {
    HardwareInfo {
        cpu: read_cpu_model(),
        cores: std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(0),
        ram_gb: read_total_ram_gb(),
        os: std::env::consts::OS.to_string(),
        arch: std::env::consts::ARCH.to_string(),
    }
}

/// CPU model from `/proc/cpuinfo`, or "unknown".
fn read_cpu_model() -> String {
    std::fs::read_to_string("/proc/cpuinfo")
        .ok()
        .and_then(|info| {
            info.lines()
                .find(|line| line.starts_with("model name"))
                .and_then(|line| line.split(':').nth(1))
                .map(|model| model.trim().to_string())
        })
        .unwrap_or_else(|| "unknown".to_string())
}

/// Total memory from `/proc/meminfo` in whole GB, or 0.
fn read_total_ram_gb() -> u64 {
    std::fs::read_to_string("/proc/meminfo")
        .ok()
        .and_then(|info| {
            info.lines()
                .find(|line| line.starts_with("MemTotal:"))
                .and_then(|line| line.split_whitespace().nth(1))
                .and_then(|kb| kb.parse::<u64>().ok())
        })
        .map(|kb| kb / (1024 * 1024))
        .unwrap_or(0)
}
