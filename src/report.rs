//! Console output for suite runs.

use std::time::Duration;

use crate::error::CaseError;
use crate::runner::RunResult;
use crate::suite::Reporter;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Verbose,
    Quiet,
    Csv,
}

/// Prints human-readable reports to stderr, or CSV rows to stdout.
#[derive(Debug, Default)]
pub struct ConsoleReporter {
    format: OutputFormat,
    header_printed: bool,
}

impl ConsoleReporter {
    pub fn new(format: OutputFormat) -> Self {
        Self {
            format,
            header_printed: false,
        }
    }
}

impl Reporter for ConsoleReporter {
    fn suite_started(&mut self, suite: &str) {
        match self.format {
            OutputFormat::Csv => {
                if !self.header_printed {
                    println!("{}", csv_header());
                    self.header_printed = true;
                }
            }
            _ => {
                eprintln!("=== {} ===", suite);
                eprintln!();
            }
        }
    }

    fn topic(&mut self, name: &str) {
        if self.format != OutputFormat::Csv {
            eprintln!("--- {} ---", name);
        }
    }

    fn case_finished(&mut self, result: &RunResult) {
        match self.format {
            OutputFormat::Verbose => {
                for line in verbose_lines(result) {
                    eprintln!("{}", line);
                }
                eprintln!();
            }
            OutputFormat::Quiet => eprintln!("{}", quiet_line(result)),
            OutputFormat::Csv => println!("{}", csv_row(result)),
        }
    }

    fn case_failed(&mut self, error: &CaseError) {
        if self.format != OutputFormat::Csv {
            eprintln!("{}: FAILED ({})", error.case(), error);
        }
    }
}

pub fn verbose_lines(r: &RunResult) -> Vec<String> {
    vec![
        format!("====== {} ======", r.case_name),
        format!(
            "  {} writes completed in {:.2} seconds",
            fmt_num(r.iterations),
            r.elapsed.as_secs_f64()
        ),
        format!("  {} parallel workers", r.concurrency),
        format!(
            "  throughput: {} writes per second",
            fmt_num(r.ops_per_sec() as u64)
        ),
    ]
}

pub fn quiet_line(r: &RunResult) -> String {
    format!(
        "{}: {:.2} writes per second ({} in {:.3} msec)",
        r.case_name,
        r.ops_per_sec(),
        r.iterations,
        duration_ms(r.elapsed),
    )
}

pub fn csv_header() -> &'static str {
    "\"test\",\"iterations\",\"concurrency\",\"elapsed_ms\",\"ops_per_sec\""
}

pub fn csv_row(r: &RunResult) -> String {
    format!(
        "\"{}\",{},{},{:.3},{:.2}",
        r.case_name,
        r.iterations,
        r.concurrency,
        duration_ms(r.elapsed),
        r.ops_per_sec(),
    )
}

pub fn duration_ms(d: Duration) -> f64 {
    d.as_nanos() as f64 / 1_000_000.0
}

/// Format an integer with thousands separators.
pub fn fmt_num(n: u64) -> String {
    let s = n.to_string();
    let mut result = String::new();
    for (i, c) in s.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.push(',');
        }
        result.push(c);
    }
    result.chars().rev().collect()
}
