//! Error types for the harness, the store and configuration.

use std::io;
use std::net::SocketAddr;

use thiserror::Error;

use crate::partition::Partition;
use crate::suite::SuiteReport;

/// Error type returned by case hooks and work units.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Why a benchmark case did not produce a result.
#[derive(Debug, Error)]
pub enum CaseError {
    #[error("case `{case}`: concurrency must be at least 1")]
    InvalidConcurrency { case: String },

    #[error("case `{case}`: setup failed")]
    Setup {
        case: String,
        #[source]
        source: BoxError,
    },

    #[error("case `{case}`: work on partition {partition} failed")]
    Work {
        case: String,
        partition: Partition,
        #[source]
        source: BoxError,
    },

    #[error("case `{case}`: teardown failed")]
    Teardown {
        case: String,
        #[source]
        source: BoxError,
    },
}

impl CaseError {
    /// Name of the case that failed.
    pub fn case(&self) -> &str {
        match self {
            CaseError::InvalidConcurrency { case }
            | CaseError::Setup { case, .. }
            | CaseError::Work { case, .. }
            | CaseError::Teardown { case, .. } => case,
        }
    }
}

/// Failures talking to, starting or stopping the key-value store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("server failed to start: {reason}")]
    Start { reason: String },

    #[error("server failed to stop: {reason}")]
    Stop { reason: String },

    #[error("server is already running")]
    AlreadyRunning,

    #[error("server is not running")]
    NotRunning,

    #[error("failed to connect to {addr}")]
    Connect {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },

    #[error("failed to disconnect")]
    Disconnect(#[source] io::Error),

    #[error("client is not connected")]
    NotConnected,

    #[error("connection closed by server")]
    ConnectionClosed,

    #[error("batch has {keys} keys but {values} values")]
    BatchMismatch { keys: usize, values: usize },

    #[error("write rejected by server: {0}")]
    Write(String),

    #[error("unexpected response from server")]
    UnexpectedResponse,

    #[error("transport error")]
    Io(#[from] io::Error),
}

/// Invalid benchmark configuration.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("concurrency must be at least 1")]
    ZeroConcurrency,

    #[error("batch size must be at least 1")]
    ZeroBatchSize,

    #[error("value size must be at least 1 byte")]
    ZeroValueSize,
}

/// A suite stopped early under [`ErrorPolicy::Abort`](crate::suite::ErrorPolicy::Abort).
///
/// `report` holds the outcomes of the cases that completed before `error`.
#[derive(Debug, Error)]
#[error("suite '{}' aborted: {error}", .report.name)]
pub struct SuiteAborted {
    pub report: SuiteReport,
    #[source]
    pub error: CaseError,
}
