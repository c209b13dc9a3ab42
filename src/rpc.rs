//! RPC write suite: sequential versus batched writes against [`KvServer`].
//!
//! Every case starts a fresh server on its own data directory under the
//! suite's temporary root, connects a pooled [`KvClient`], runs its writes
//! and tears everything down again before the next case starts.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tempfile::TempDir;
use tracing::debug;

use crate::case::BenchmarkCase;
use crate::config::BenchConfig;
use crate::error::{BoxError, StoreError};
use crate::partition::Partition;
use crate::runner::RunResult;
use crate::store::{KvClient, KvServer, ServerOptions};
use crate::suite::Suite;
use crate::workload;

pub const SUITE_NAME: &str = "rpc";
pub const SEQUENTIAL_WRITE: &str = "sequential write";
pub const BATCH_WRITE: &str = "batch write";
pub const BATCH_WRITE_NO_CONCURRENCY: &str = "batch write no concurrency";

/// Server and client state shared by the cases of one suite run.
pub struct RpcContext {
    root: TempDir,
    pool_size: usize,
    cases_started: usize,
    data_dir: Option<PathBuf>,
    server: Option<KvServer>,
    client: Option<KvClient>,
}

impl RpcContext {
    /// Create the suite's temporary root. Clients opened by the cases keep
    /// `pool_size` connections.
    pub fn new(pool_size: usize) -> io::Result<Self> {
        let root = tempfile::Builder::new().prefix("strata-rpc-").tempdir()?;
        Ok(Self {
            root,
            pool_size,
            cases_started: 0,
            data_dir: None,
            server: None,
            client: None,
        })
    }

    pub fn root(&self) -> &Path {
        self.root.path()
    }

    /// Data directory of the case currently set up.
    pub fn data_dir(&self) -> Option<&Path> {
        self.data_dir.as_deref()
    }

    pub fn client(&self) -> Result<&KvClient, StoreError> {
        self.client.as_ref().ok_or(StoreError::NotConnected)
    }

    /// Create a data directory, start a server on it and connect.
    ///
    /// On failure everything created so far is released again.
    pub fn setup(&mut self) -> Result<(), BoxError> {
        if self.server.is_some() {
            return Err("previous case was not torn down".into());
        }

        let dir = self.root.path().join(format!("case-{}", self.cases_started));
        self.cases_started += 1;
        fs::create_dir_all(&dir)?;

        let mut server = KvServer::new(ServerOptions::default().with_dir(&dir));
        let addr = match server.start() {
            Ok(addr) => addr,
            Err(err) => {
                let _ = fs::remove_dir_all(&dir);
                return Err(err.into());
            }
        };
        let client = match KvClient::connect(addr, self.pool_size) {
            Ok(client) => client,
            Err(err) => {
                let _ = server.stop();
                let _ = fs::remove_dir_all(&dir);
                return Err(err.into());
            }
        };

        debug!(dir = %dir.display(), %addr, "case environment ready");
        self.data_dir = Some(dir);
        self.server = Some(server);
        self.client = Some(client);
        Ok(())
    }

    /// Disconnect, stop the server and remove the data directory.
    ///
    /// All three steps are attempted; the first failure is returned.
    pub fn teardown(&mut self) -> Result<(), BoxError> {
        let mut first_err: Option<BoxError> = None;

        if let Some(client) = self.client.take() {
            if let Err(err) = client.disconnect() {
                first_err.get_or_insert(err.into());
            }
        }
        if let Some(mut server) = self.server.take() {
            if let Err(err) = server.stop() {
                first_err.get_or_insert(err.into());
            }
        }
        if let Some(dir) = self.data_dir.take() {
            if let Err(err) = fs::remove_dir_all(&dir) {
                first_err.get_or_insert(err.into());
            }
        }

        match first_err {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

/// The three cases of the RPC suite, in order.
pub fn rpc_suite(config: &BenchConfig) -> Suite<RpcContext> {
    let value: Arc<[u8]> = config.value().into();
    Suite::new(SUITE_NAME)
        .error_policy(config.on_error)
        .case(rpc_case(
            SEQUENTIAL_WRITE,
            config.concurrency,
            config.iterations,
            sequential(Arc::clone(&value)),
        ))
        .case(rpc_case(
            BATCH_WRITE,
            config.concurrency,
            config.iterations,
            batched(Arc::clone(&value), config.batch_size),
        ))
        .case(rpc_case(
            BATCH_WRITE_NO_CONCURRENCY,
            1,
            config.iterations,
            batched(value, config.batch_size),
        ))
}

/// A case wired to the context's setup and teardown.
pub fn rpc_case<W>(
    name: &str,
    concurrency: usize,
    iterations: u64,
    work: W,
) -> BenchmarkCase<RpcContext>
where
    W: Fn(&RpcContext, Partition) -> Result<(), BoxError> + Send + Sync + 'static,
{
    BenchmarkCase::new(name, work)
        .create_topic(false)
        .concurrency(concurrency)
        .iterations(iterations)
        .before(RpcContext::setup)
        .after(RpcContext::teardown)
}

pub fn sequential(
    value: Arc<[u8]>,
) -> impl Fn(&RpcContext, Partition) -> Result<(), BoxError> + Send + Sync + 'static {
    move |ctx: &RpcContext, partition: Partition| {
        workload::sequential_write(ctx.client()?, partition, &value)?;
        Ok(())
    }
}

pub fn batched(
    value: Arc<[u8]>,
    batch_size: usize,
) -> impl Fn(&RpcContext, Partition) -> Result<(), BoxError> + Send + Sync + 'static {
    move |ctx: &RpcContext, partition: Partition| {
        workload::batch_write(ctx.client()?, partition, &value, batch_size)?;
        Ok(())
    }
}

/// Parameters recorded alongside a result of this suite.
pub fn parameters(result: &RunResult, config: &BenchConfig) -> HashMap<String, serde_json::Value> {
    let mut params = HashMap::new();
    params.insert("iterations".into(), serde_json::json!(result.iterations));
    params.insert("concurrency".into(), serde_json::json!(result.concurrency));
    params.insert("value_size".into(), serde_json::json!(config.value_size));
    if is_batched(&result.case_name) {
        params.insert("batch_size".into(), serde_json::json!(config.batch_size));
    }
    params
}

fn is_batched(case_name: &str) -> bool {
    case_name.starts_with(BATCH_WRITE)
}
