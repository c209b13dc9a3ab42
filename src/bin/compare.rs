//! Benchmark comparison tool.
//!
//! Compares two JSON result files and prints a table of throughput deltas.
//!
//! Usage: `cargo run --bin bench-compare -- <baseline.json> <candidate.json>`

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::Parser;
use strata_rpc_benchmarks::report::fmt_num;
use strata_rpc_benchmarks::schema::{BenchmarkMetrics, BenchmarkReport, BenchmarkResult};

#[derive(Debug, Parser)]
#[command(name = "bench-compare", about = "Compare two benchmark result files")]
struct Cli {
    baseline: PathBuf,
    candidate: PathBuf,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let baseline = load_report(&cli.baseline)?;
    let candidate = load_report(&cli.candidate)?;

    let base_map: HashMap<&str, &BenchmarkResult> = baseline
        .results
        .iter()
        .map(|r| (r.benchmark.as_str(), r))
        .collect();

    eprintln!(
        "Baseline: {} ({})",
        cli.baseline.display(),
        baseline.metadata.timestamp
    );
    eprintln!(
        "Candidate: {} ({})",
        cli.candidate.display(),
        candidate.metadata.timestamp
    );
    eprintln!();

    println!(
        "{:<40} | {:>16} | {:>16} | {:>16}",
        "Benchmark", "Base ops/s", "New ops/s", "Delta"
    );
    println!("{}", "-".repeat(96));

    let mut matched = 0u32;
    let mut only_cand = 0u32;
    for cand in &candidate.results {
        match base_map.get(cand.benchmark.as_str()) {
            Some(base) => {
                matched += 1;
                print_comparison(&cand.benchmark, &base.metrics, &cand.metrics);
            }
            None => only_cand += 1,
        }
    }

    let cand_names: Vec<&str> = candidate
        .results
        .iter()
        .map(|r| r.benchmark.as_str())
        .collect();
    let only_base = baseline
        .results
        .iter()
        .filter(|r| !cand_names.contains(&r.benchmark.as_str()))
        .count();

    println!("{}", "-".repeat(96));
    println!(
        "Compared: {} | Baseline only: {} | Candidate only: {}",
        matched, only_base, only_cand
    );
    Ok(())
}

fn load_report(path: &Path) -> anyhow::Result<BenchmarkReport> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&contents).with_context(|| format!("parsing {}", path.display()))
}

/// Percentage change in throughput from `base` to `cand`.
///
/// `None` when either side lacks ops/sec; 0 when the baseline is 0.
fn throughput_delta(base: &BenchmarkMetrics, cand: &BenchmarkMetrics) -> Option<f64> {
    let (base_ops, cand_ops) = (base.ops_per_sec?, cand.ops_per_sec?);
    if base_ops > 0.0 {
        Some(((cand_ops - base_ops) / base_ops) * 100.0)
    } else {
        Some(0.0)
    }
}

/// Changes within one percent either way count as noise.
fn delta_hint(delta_pct: f64) -> &'static str {
    if delta_pct > 1.0 {
        "faster"
    } else if delta_pct < -1.0 {
        "slower"
    } else {
        "~same"
    }
}

fn print_comparison(name: &str, base: &BenchmarkMetrics, cand: &BenchmarkMetrics) {
    match (base.ops_per_sec, cand.ops_per_sec, throughput_delta(base, cand)) {
        (Some(base_ops), Some(cand_ops), Some(delta_pct)) => println!(
            "{:<40} | {:>16} | {:>16} | {:>+.1}% ({})",
            name,
            fmt_num(base_ops as u64),
            fmt_num(cand_ops as u64),
            delta_pct,
            delta_hint(delta_pct),
        ),
        _ => println!("{:<40} | {:>16} | {:>16} |", name, "n/a", "n/a"),
    }
}
