//! Case execution: setup, partitioned parallel work, teardown.

use std::any::Any;
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::case::{BenchmarkCase, Work};
use crate::error::{BoxError, CaseError};
use crate::partition::{partition, Partition};

/// Timing of one successfully completed case.
#[derive(Debug, Clone, PartialEq)]
pub struct RunResult {
    pub case_name: String,
    /// Wall-clock time from the first worker spawn to the last worker join.
    pub elapsed: Duration,
    pub iterations: u64,
    pub concurrency: usize,
}

impl RunResult {
    pub fn ops_per_sec(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.iterations as f64 / secs
        } else {
            0.0
        }
    }
}

/// Run a single case against `ctx`.
///
/// `before` runs first; if it fails the case is aborted and neither the work
/// nor `after` runs. Otherwise `[0, iterations)` is split with [`partition`],
/// one scoped thread runs the work per partition, and the timed region ends
/// once every thread has been joined. `after` then runs exactly once, whether
/// or not a worker failed. A work failure takes precedence over a teardown
/// failure in the returned error.
pub fn run<C: Sync>(case: BenchmarkCase<C>, ctx: &mut C) -> Result<RunResult, CaseError> {
    let BenchmarkCase {
        name,
        concurrency,
        iterations,
        before,
        after,
        work,
        ..
    } = case;

    if concurrency == 0 {
        return Err(CaseError::InvalidConcurrency { case: name });
    }

    info!(case = %name, concurrency, iterations, "running case");

    if let Some(before) = &before {
        if let Err(source) = before(&mut *ctx) {
            return Err(CaseError::Setup { case: name, source });
        }
    }

    let partitions = partition(iterations, concurrency);
    debug!(case = %name, ?partitions, "partitioned iteration space");

    let (elapsed, failure) = execute(&work, &*ctx, &partitions);

    let teardown = match &after {
        Some(after) => after(&mut *ctx),
        None => Ok(()),
    };

    if let Some((partition, source)) = failure {
        if let Err(err) = teardown {
            warn!(case = %name, error = %err, "teardown failed after work failure");
        }
        return Err(CaseError::Work {
            case: name,
            partition,
            source,
        });
    }
    if let Err(source) = teardown {
        return Err(CaseError::Teardown { case: name, source });
    }

    debug!(case = %name, elapsed_ms = elapsed.as_millis() as u64, "case finished");
    Ok(RunResult {
        case_name: name,
        elapsed,
        iterations,
        concurrency,
    })
}

/// Runs every partition on its own thread and returns the elapsed time with
/// the failure of the lowest failing partition, if any.
fn execute<C: Sync>(
    work: &Work<C>,
    ctx: &C,
    partitions: &[Partition],
) -> (Duration, Option<(Partition, BoxError)>) {
    let start = Instant::now();
    let outcomes: Vec<(Partition, Result<(), BoxError>)> = thread::scope(|s| {
        let handles: Vec<_> = partitions
            .iter()
            .map(|&p| (p, s.spawn(move || work(ctx, p))))
            .collect();
        handles
            .into_iter()
            .map(|(p, handle)| {
                let outcome = handle.join().unwrap_or_else(|payload| Err(panic_error(payload)));
                (p, outcome)
            })
            .collect()
    });
    let elapsed = start.elapsed();

    let mut failures = outcomes
        .into_iter()
        .filter_map(|(p, outcome)| outcome.err().map(|e| (p, e)));
    let first = failures.next();
    let others = failures.count();
    if others > 0 {
        warn!(additional_failures = others, "more than one worker failed");
    }
    (elapsed, first)
}

fn panic_error(payload: Box<dyn Any + Send>) -> BoxError {
    let message = if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    };
    format!("worker panicked: {}", message).into()
}
