//! Runner lifecycle: setup, parallel work, teardown and error precedence.

mod common;

use std::sync::atomic::Ordering;
use std::sync::{Barrier, Mutex};
use std::time::Duration;

use common::HookLog;
use strata_rpc_benchmarks::runner::run;
use strata_rpc_benchmarks::{BenchmarkCase, CaseError, Partition};

fn counting_case(name: &str) -> BenchmarkCase<HookLog> {
    BenchmarkCase::new(name, |hooks: &HookLog, _p: Partition| {
        hooks.work_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    })
    .before(|hooks: &mut HookLog| {
        hooks.log("before");
        Ok(())
    })
    .after(|hooks: &mut HookLog| {
        hooks.log("after");
        Ok(())
    })
}

#[test]
fn builder_defaults_and_setters() {
    let case = BenchmarkCase::new("defaults", |_: &HookLog, _p: Partition| Ok(()));
    assert_eq!(case.name(), "defaults");
    assert_eq!(case.concurrency_level(), 1);
    assert_eq!(case.iteration_count(), 0);
    assert!(!case.creates_topic());

    let case = case.concurrency(8).iterations(42).create_topic(true);
    assert_eq!(case.concurrency_level(), 8);
    assert_eq!(case.iteration_count(), 42);
    assert!(case.creates_topic());
}

#[test]
fn hooks_wrap_work() {
    let mut hooks = HookLog::new();
    let case = counting_case("ok").concurrency(4).iterations(1000);

    let result = run(case, &mut hooks).unwrap();

    assert_eq!(hooks.events, vec!["before", "after"]);
    assert_eq!(hooks.work_calls(), 4);
    assert_eq!(result.case_name, "ok");
    assert_eq!(result.iterations, 1000);
    assert_eq!(result.concurrency, 4);
}

#[test]
fn teardown_runs_once_when_work_fails() {
    let mut hooks = HookLog::new();
    let case = BenchmarkCase::new("failing", |_: &HookLog, p: Partition| {
        if p.start == 250 {
            Err("disk on fire".into())
        } else {
            Ok(())
        }
    })
    .concurrency(4)
    .iterations(1000)
    .after(|hooks: &mut HookLog| {
        hooks.log("after");
        Ok(())
    });

    let err = run(case, &mut hooks).unwrap_err();

    assert_eq!(hooks.count("after"), 1);
    match err {
        CaseError::Work {
            case, partition, ..
        } => {
            assert_eq!(case, "failing");
            assert_eq!(partition, Partition::new(250, 500));
        }
        other => panic!("expected work error, got {:?}", other),
    }
}

#[test]
fn lowest_failing_partition_is_reported() {
    let mut hooks = HookLog::new();
    let case = BenchmarkCase::new("all fail", |_: &HookLog, p: Partition| {
        Err(format!("failed at {}", p.start).into())
    })
    .concurrency(3)
    .iterations(30);

    match run(case, &mut hooks).unwrap_err() {
        CaseError::Work { partition, source, .. } => {
            assert_eq!(partition, Partition::new(0, 10));
            assert_eq!(source.to_string(), "failed at 0");
        }
        other => panic!("expected work error, got {:?}", other),
    }
}

#[test]
fn setup_failure_skips_work_and_teardown() {
    let mut hooks = HookLog::new();
    let case = counting_case("no setup")
        .concurrency(2)
        .iterations(10)
        .before(|_: &mut HookLog| Err("server refused to start".into()));

    let err = run(case, &mut hooks).unwrap_err();

    assert!(matches!(err, CaseError::Setup { .. }), "{:?}", err);
    assert_eq!(hooks.work_calls(), 0);
    assert_eq!(hooks.count("after"), 0);
}

#[test]
fn teardown_failure_is_reported() {
    let mut hooks = HookLog::new();
    let case = counting_case("bad teardown")
        .iterations(5)
        .after(|_: &mut HookLog| Err("directory busy".into()));

    let err = run(case, &mut hooks).unwrap_err();

    assert!(matches!(err, CaseError::Teardown { .. }), "{:?}", err);
    assert_eq!(hooks.work_calls(), 1);
}

#[test]
fn work_failure_wins_over_teardown_failure() {
    let mut hooks = HookLog::new();
    let case = BenchmarkCase::new("both", |_: &HookLog, _p: Partition| Err("write failed".into()))
        .iterations(5)
        .after(|hooks: &mut HookLog| {
            hooks.log("after");
            Err("stop failed".into())
        });

    let err = run(case, &mut hooks).unwrap_err();

    assert!(matches!(err, CaseError::Work { .. }), "{:?}", err);
    assert_eq!(hooks.count("after"), 1);
}

#[test]
fn panicking_worker_is_a_work_error() {
    let mut hooks = HookLog::new();
    let case = BenchmarkCase::new("panics", |_: &HookLog, p: Partition| {
        if p.start > 0 {
            panic!("worker exploded");
        }
        Ok(())
    })
    .concurrency(2)
    .iterations(10)
    .after(|hooks: &mut HookLog| {
        hooks.log("after");
        Ok(())
    });

    let err = run(case, &mut hooks).unwrap_err();

    match &err {
        CaseError::Work { partition, source, .. } => {
            assert_eq!(*partition, Partition::new(5, 10));
            assert!(source.to_string().contains("worker exploded"), "{}", source);
        }
        other => panic!("expected work error, got {:?}", other),
    }
    assert_eq!(hooks.count("after"), 1);
}

#[test]
fn zero_concurrency_is_rejected_before_setup() {
    let mut hooks = HookLog::new();
    let case = counting_case("zero").concurrency(0).iterations(10);

    let err = run(case, &mut hooks).unwrap_err();

    assert!(matches!(err, CaseError::InvalidConcurrency { .. }), "{:?}", err);
    assert!(hooks.events.is_empty());
}

#[test]
fn zero_iterations_still_runs_hooks() {
    let mut hooks = HookLog::new();
    let case = counting_case("empty").concurrency(3).iterations(0);

    let result = run(case, &mut hooks).unwrap();

    assert_eq!(result.iterations, 0);
    assert_eq!(result.ops_per_sec(), 0.0);
    assert_eq!(hooks.events, vec!["before", "after"]);
}

struct Gate {
    barrier: Barrier,
    seen: Mutex<Vec<Partition>>,
}

#[test]
fn partitions_run_in_parallel() {
    // Every worker waits for all others; this only finishes if they overlap.
    let mut gate = Gate {
        barrier: Barrier::new(4),
        seen: Mutex::new(Vec::new()),
    };
    let case = BenchmarkCase::new("parallel", |gate: &Gate, p: Partition| {
        gate.barrier.wait();
        gate.seen.lock().unwrap().push(p);
        Ok(())
    })
    .concurrency(4)
    .iterations(8);

    run(case, &mut gate).unwrap();

    let mut seen = gate.seen.into_inner().unwrap();
    seen.sort_by_key(|p| p.start);
    assert_eq!(
        seen,
        vec![
            Partition::new(0, 2),
            Partition::new(2, 4),
            Partition::new(4, 6),
            Partition::new(6, 8),
        ]
    );
}

#[test]
fn elapsed_covers_the_work() {
    let mut hooks = HookLog::new();
    let case = BenchmarkCase::new("sleepy", |_: &HookLog, _p: Partition| {
        std::thread::sleep(Duration::from_millis(20));
        Ok(())
    })
    .concurrency(2)
    .iterations(2)
    .before(|_: &mut HookLog| {
        std::thread::sleep(Duration::from_millis(500));
        Ok(())
    });

    let result = run(case, &mut hooks).unwrap();

    assert!(result.elapsed >= Duration::from_millis(20));
    // Setup time stays outside the timed region
    assert!(result.elapsed < Duration::from_millis(500), "{:?}", result.elapsed);
}
