//! Concurrent write-throughput benchmarks for StrataDB.
//!
//! The crate is split into a small generic harness ([`case`], [`partition`],
//! [`runner`], [`suite`]) and the RPC suite built on top of it ([`rpc`],
//! [`store`], [`workload`]). Results can be written as JSON ([`recorder`],
//! [`schema`]) and compared across runs with the `bench-compare` binary.

pub mod case;
pub mod config;
pub mod error;
pub mod partition;
pub mod recorder;
pub mod report;
pub mod rpc;
pub mod runner;
pub mod schema;
pub mod store;
pub mod suite;
pub mod workload;

pub use case::BenchmarkCase;
pub use config::BenchConfig;
pub use error::{BoxError, CaseError, ConfigError, StoreError, SuiteAborted};
pub use partition::{partition, Partition};
pub use runner::{run, RunResult};
pub use suite::{CaseOutcome, ErrorPolicy, Reporter, Suite, SuiteReport};
