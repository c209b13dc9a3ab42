//! Benchmark parameters.

use crate::error::ConfigError;
use crate::suite::ErrorPolicy;

pub const DEFAULT_ITERATIONS: u64 = 500_000;
pub const DEFAULT_BATCH_SIZE: usize = 100;
pub const DEFAULT_VALUE_SIZE: usize = 100;

/// Byte used to fill value payloads.
pub const VALUE_FILL: u8 = 0x78;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BenchConfig {
    /// Writes issued per case.
    pub iterations: u64,
    /// Worker threads for the concurrent cases. Also the client pool size.
    pub concurrency: usize,
    /// Keys per batched write request.
    pub batch_size: usize,
    /// Size of every written value in bytes.
    pub value_size: usize,
    pub on_error: ErrorPolicy,
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            iterations: DEFAULT_ITERATIONS,
            concurrency: default_concurrency(),
            batch_size: DEFAULT_BATCH_SIZE,
            value_size: DEFAULT_VALUE_SIZE,
            on_error: ErrorPolicy::Abort,
        }
    }
}

impl BenchConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.concurrency == 0 {
            return Err(ConfigError::ZeroConcurrency);
        }
        if self.batch_size == 0 {
            return Err(ConfigError::ZeroBatchSize);
        }
        if self.value_size == 0 {
            return Err(ConfigError::ZeroValueSize);
        }
        Ok(())
    }

    /// The fixed payload written under every key.
    pub fn value(&self) -> Vec<u8> {
        vec![VALUE_FILL; self.value_size]
    }
}

/// Number of logical cores, or 1 if it cannot be determined.
pub fn default_concurrency() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}
