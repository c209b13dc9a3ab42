//! Embedded StrataDB server and its client.
//!
//! The server owns a [`stratadb::Strata`] database opened at a data
//! directory and serves writes over loopback TCP using the newline-delimited
//! JSON frames defined in [`protocol`]. [`KvClient`] talks to it through a
//! fixed pool of connections.

pub mod client;
pub mod protocol;
pub mod server;

pub use client::KvClient;
pub use server::{KvServer, ServerOptions};

use crate::error::StoreError;

/// Write access to a key-value store.
///
/// Implementations must tolerate concurrent calls from several threads.
pub trait StoreClient: Send + Sync {
    fn write(&self, key: &[u8], value: &[u8]) -> Result<(), StoreError>;

    /// Write `keys[i] -> values[i]` for every `i` as one request.
    fn write_batch(&self, keys: &[Vec<u8>], values: &[Vec<u8>]) -> Result<(), StoreError>;
}
