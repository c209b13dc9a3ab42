//! RPC write benchmark for StrataDB.
//!
//! Starts an embedded server per case, connects a pooled client, and compares
//! single-key writes with batched writes.
//!
//! Run:    `cargo run --release --bin rpc-bench`
//! Quick:  `cargo run --release --bin rpc-bench -- -n 10000 -q`
//! Single: `cargo run --release --bin rpc-bench -- -t "batch write"`
//! CSV:    `cargo run --release --bin rpc-bench -- --csv`

use anyhow::{bail, Context};
use clap::Parser;
use strata_rpc_benchmarks::config::{
    default_concurrency, DEFAULT_BATCH_SIZE, DEFAULT_ITERATIONS, DEFAULT_VALUE_SIZE,
};
use strata_rpc_benchmarks::recorder::{capture_hardware, ResultRecorder};
use strata_rpc_benchmarks::report::{ConsoleReporter, OutputFormat};
use strata_rpc_benchmarks::rpc::{self, RpcContext};
use strata_rpc_benchmarks::{BenchConfig, ErrorPolicy, SuiteAborted};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "rpc-bench", version, about = "Sequential vs batched write throughput over RPC")]
struct Cli {
    /// Writes per case
    #[arg(short = 'n', long, default_value_t = DEFAULT_ITERATIONS)]
    iterations: u64,

    /// Worker threads for the concurrent cases (defaults to the core count)
    #[arg(short, long)]
    concurrency: Option<usize>,

    /// Keys per batch request
    #[arg(short, long, default_value_t = DEFAULT_BATCH_SIZE)]
    batch_size: usize,

    /// Value payload size in bytes
    #[arg(short = 'd', long, default_value_t = DEFAULT_VALUE_SIZE)]
    value_size: usize,

    /// Comma-separated case name prefixes to run
    #[arg(short, long, value_delimiter = ',')]
    tests: Vec<String>,

    /// Keep running the remaining cases after one fails
    #[arg(long)]
    keep_going: bool,

    /// Print CSV rows to stdout
    #[arg(long, conflicts_with = "quiet")]
    csv: bool,

    /// One line per case
    #[arg(short, long)]
    quiet: bool,

    /// Save results as JSON under results/
    #[arg(long)]
    save: bool,
}

impl Cli {
    fn config(&self) -> BenchConfig {
        BenchConfig {
            iterations: self.iterations,
            concurrency: self.concurrency.unwrap_or_else(default_concurrency),
            batch_size: self.batch_size,
            value_size: self.value_size,
            on_error: if self.keep_going {
                ErrorPolicy::Continue
            } else {
                ErrorPolicy::Abort
            },
        }
    }

    fn format(&self) -> OutputFormat {
        if self.csv {
            OutputFormat::Csv
        } else if self.quiet {
            OutputFormat::Quiet
        } else {
            OutputFormat::Verbose
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .try_init();
}

fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let config = cli.config();
    config.validate().context("invalid benchmark configuration")?;

    let format = cli.format();
    if format != OutputFormat::Csv {
        let hw = capture_hardware();
        eprintln!("=== StrataDB RPC Write Benchmark ===");
        eprintln!("Hardware: {} ({} cores, {} GB RAM)", hw.cpu, hw.cores, hw.ram_gb);
        eprintln!(
            "Parameters: {} writes per case, {} workers, batch size {}, {} bytes payload",
            config.iterations, config.concurrency, config.batch_size, config.value_size
        );
        eprintln!();
    }

    let suite = rpc::rpc_suite(&config).retain_prefixed(&cli.tests);
    if suite.is_empty() {
        bail!("no case matches {:?}", cli.tests);
    }

    let mut ctx =
        RpcContext::new(config.concurrency).context("failed to create scratch directory")?;
    let mut reporter = ConsoleReporter::new(format);
    let (report, aborted) = match suite.run(&mut ctx, &mut reporter) {
        Ok(report) => (report, None),
        Err(SuiteAborted { report, error }) => (report, Some(error)),
    };

    // Cases that finished before an abort are still worth keeping
    if cli.save && report.results().next().is_some() {
        let mut recorder = ResultRecorder::new(rpc::SUITE_NAME);
        for result in report.results() {
            recorder.record_run(result, rpc::parameters(result, &config));
        }
        let path = recorder.save().context("failed to save results")?;
        eprintln!("Results saved to {}", path.display());
    }

    if let Some(error) = aborted {
        return Err(error).context("benchmark aborted");
    }

    let failed = report.failures().count();
    if failed > 0 {
        bail!("{} of {} cases failed", failed, report.outcomes.len());
    }
    Ok(())
}
