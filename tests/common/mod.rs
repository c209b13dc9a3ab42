//! Shared test utilities: in-memory store clients and hook logs.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use strata_rpc_benchmarks::store::StoreClient;
use strata_rpc_benchmarks::StoreError;

// =============================================================================
// Recording client
// =============================================================================

/// Remembers every key it was asked to write and the size of every batch.
#[derive(Default)]
pub struct RecordingClient {
    keys: Mutex<Vec<Vec<u8>>>,
    batches: Mutex<Vec<usize>>,
    values: Mutex<Vec<Vec<u8>>>,
}

impl RecordingClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Written keys, decoded and sorted numerically.
    pub fn sorted_indices(&self) -> Vec<u64> {
        let mut indices: Vec<u64> = self
            .keys
            .lock()
            .unwrap()
            .iter()
            .map(|k| std::str::from_utf8(k).unwrap().parse().unwrap())
            .collect();
        indices.sort_unstable();
        indices
    }

    pub fn keys(&self) -> Vec<Vec<u8>> {
        self.keys.lock().unwrap().clone()
    }

    pub fn batch_sizes(&self) -> Vec<usize> {
        self.batches.lock().unwrap().clone()
    }

    pub fn values(&self) -> Vec<Vec<u8>> {
        self.values.lock().unwrap().clone()
    }
}

impl StoreClient for RecordingClient {
    fn write(&self, key: &[u8], value: &[u8]) -> Result<(), StoreError> {
        self.keys.lock().unwrap().push(key.to_vec());
        self.values.lock().unwrap().push(value.to_vec());
        Ok(())
    }

    fn write_batch(&self, keys: &[Vec<u8>], values: &[Vec<u8>]) -> Result<(), StoreError> {
        assert_eq!(keys.len(), values.len());
        self.keys.lock().unwrap().extend_from_slice(keys);
        self.values.lock().unwrap().extend_from_slice(values);
        self.batches.lock().unwrap().push(keys.len());
        Ok(())
    }
}

// =============================================================================
// Failing client
// =============================================================================

/// Accepts `succeed` requests, then rejects every request after that.
pub struct FailingClient {
    succeed: usize,
    calls: AtomicUsize,
}

impl FailingClient {
    pub fn after(succeed: usize) -> Self {
        Self {
            succeed,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn check(&self) -> Result<(), StoreError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        if n < self.succeed {
            Ok(())
        } else {
            Err(StoreError::Write("injected failure".into()))
        }
    }
}

impl StoreClient for FailingClient {
    fn write(&self, _key: &[u8], _value: &[u8]) -> Result<(), StoreError> {
        self.check()
    }

    fn write_batch(&self, _keys: &[Vec<u8>], _values: &[Vec<u8>]) -> Result<(), StoreError> {
        self.check()
    }
}

// =============================================================================
// Lifecycle hooks
// =============================================================================

/// Context that logs hook invocations in order.
#[derive(Default)]
pub struct HookLog {
    pub events: Vec<String>,
    pub work_calls: AtomicUsize,
}

impl HookLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn log(&mut self, event: impl Into<String>) {
        self.events.push(event.into());
    }

    pub fn count(&self, event: &str) -> usize {
        self.events.iter().filter(|e| e.as_str() == event).count()
    }

    pub fn work_calls(&self) -> usize {
        self.work_calls.load(Ordering::SeqCst)
    }
}
