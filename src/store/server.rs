//! TCP server in front of a StrataDB database.
//!
//! A single storage thread owns the database handle and applies requests in
//! arrival order. Every accepted connection gets its own thread, which
//! decodes frames and forwards them to the storage thread.

use std::io::{self, BufReader, BufWriter, Write};
use std::net::{Ipv4Addr, Shutdown, SocketAddr, TcpListener, TcpStream};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use stratadb::{Command, Strata, Value};
use tracing::{debug, info, warn};

use super::protocol::{self, Request, Response};
use crate::error::StoreError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerOptions {
    /// Directory the database persists to.
    pub dir: PathBuf,
    /// Listen address. Port 0 picks a free port.
    pub address: SocketAddr,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("data"),
            address: SocketAddr::from((Ipv4Addr::LOCALHOST, 0)),
        }
    }
}

impl ServerOptions {
    pub fn with_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.dir = dir.into();
        self
    }

    pub fn with_address(mut self, address: SocketAddr) -> Self {
        self.address = address;
        self
    }
}

/// How long the acceptor sleeps when no connection is pending.
const ACCEPT_POLL: Duration = Duration::from_millis(5);

type Reply = Sender<Result<usize, String>>;

enum StorageCommand {
    Put {
        key: String,
        value: Vec<u8>,
        reply: Reply,
    },
    PutBatch {
        entries: Vec<(String, Vec<u8>)>,
        reply: Reply,
    },
    Shutdown,
}

struct Connection {
    stream: TcpStream,
    handle: JoinHandle<()>,
}

struct Running {
    addr: SocketAddr,
    shutdown: Arc<AtomicBool>,
    storage_tx: Sender<StorageCommand>,
    storage: JoinHandle<()>,
    acceptor: JoinHandle<()>,
    connections: Arc<Mutex<Vec<Connection>>>,
}

pub struct KvServer {
    options: ServerOptions,
    running: Option<Running>,
}

impl KvServer {
    pub fn new(options: ServerOptions) -> Self {
        Self {
            options,
            running: None,
        }
    }

    pub fn options(&self) -> &ServerOptions {
        &self.options
    }

    pub fn is_running(&self) -> bool {
        self.running.is_some()
    }

    /// Address the server is listening on, while running.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.running.as_ref().map(|r| r.addr)
    }

    /// Open the database and start listening.
    ///
    /// Returns once the database is open and the listener is bound, so a
    /// client may connect to the returned address immediately.
    pub fn start(&mut self) -> Result<SocketAddr, StoreError> {
        if self.running.is_some() {
            return Err(StoreError::AlreadyRunning);
        }

        let (storage_tx, storage) = spawn_storage(self.options.dir.clone())?;

        let listener = match bind(self.options.address) {
            Ok(listener) => listener,
            Err(err) => {
                stop_storage(storage_tx, storage);
                return Err(err);
            }
        };
        let addr = match listener.local_addr() {
            Ok(addr) => addr,
            Err(err) => {
                stop_storage(storage_tx, storage);
                return Err(StoreError::Start {
                    reason: format!("listener address: {}", err),
                });
            }
        };

        let shutdown = Arc::new(AtomicBool::new(false));
        let connections = Arc::new(Mutex::new(Vec::new()));
        let acceptor = {
            let shutdown = Arc::clone(&shutdown);
            let connections = Arc::clone(&connections);
            let storage_tx = storage_tx.clone();
            thread::Builder::new()
                .name("kv-acceptor".into())
                .spawn(move || accept_loop(listener, shutdown, storage_tx, connections))
        };
        let acceptor = match acceptor {
            Ok(handle) => handle,
            Err(err) => {
                stop_storage(storage_tx, storage);
                return Err(StoreError::Start {
                    reason: format!("spawn acceptor: {}", err),
                });
            }
        };

        info!(%addr, dir = %self.options.dir.display(), "kv server started");
        self.running = Some(Running {
            addr,
            shutdown,
            storage_tx,
            storage,
            acceptor,
            connections,
        });
        Ok(addr)
    }

    /// Stop accepting, close open connections and close the database.
    pub fn stop(&mut self) -> Result<(), StoreError> {
        let running = self.running.take().ok_or(StoreError::NotRunning)?;
        let mut problems = Vec::new();

        running.shutdown.store(true, Ordering::Release);
        // The listener is closed once the acceptor returns.
        if running.acceptor.join().is_err() {
            problems.push("acceptor thread panicked".to_string());
        }

        let connections = std::mem::take(
            &mut *running
                .connections
                .lock()
                .unwrap_or_else(PoisonError::into_inner),
        );
        for conn in connections {
            let _ = conn.stream.shutdown(Shutdown::Both);
            if conn.handle.join().is_err() {
                problems.push("connection thread panicked".to_string());
            }
        }

        let _ = running.storage_tx.send(StorageCommand::Shutdown);
        if running.storage.join().is_err() {
            problems.push("storage thread panicked".to_string());
        }

        if problems.is_empty() {
            info!(addr = %running.addr, "kv server stopped");
            Ok(())
        } else {
            Err(StoreError::Stop {
                reason: problems.join("; "),
            })
        }
    }
}

impl Drop for KvServer {
    fn drop(&mut self) {
        if self.running.is_some() {
            if let Err(err) = self.stop() {
                warn!(error = %err, "kv server did not stop cleanly");
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Storage thread
// ---------------------------------------------------------------------------

fn bind(address: SocketAddr) -> Result<TcpListener, StoreError> {
    let listener = TcpListener::bind(address).map_err(|err| StoreError::Start {
        reason: format!("bind {}: {}", address, err),
    })?;
    // Non-blocking so the acceptor can notice shutdown without a wake-up connection
    listener
        .set_nonblocking(true)
        .map_err(|err| StoreError::Start {
            reason: format!("listener mode: {}", err),
        })?;
    Ok(listener)
}

/// Spawns the storage thread and waits until it has opened the database.
fn spawn_storage(dir: PathBuf) -> Result<(Sender<StorageCommand>, JoinHandle<()>), StoreError> {
    let (tx, rx) = mpsc::channel();
    let (ready_tx, ready_rx) = mpsc::sync_channel(1);

    let handle = thread::Builder::new()
        .name("kv-storage".into())
        .spawn(move || {
            let db = match Strata::open(&dir) {
                Ok(db) => db,
                Err(err) => {
                    let _ = ready_tx.send(Err(format!("open {}: {:?}", dir.display(), err)));
                    return;
                }
            };
            let _ = ready_tx.send(Ok(()));
            storage_loop(&db, rx);
        })
        .map_err(|err| StoreError::Start {
            reason: format!("spawn storage thread: {}", err),
        })?;

    match ready_rx.recv() {
        Ok(Ok(())) => Ok((tx, handle)),
        Ok(Err(reason)) => {
            let _ = handle.join();
            Err(StoreError::Start { reason })
        }
        Err(_) => {
            let _ = handle.join();
            Err(StoreError::Start {
                reason: "storage thread exited before becoming ready".into(),
            })
        }
    }
}

fn stop_storage(tx: Sender<StorageCommand>, handle: JoinHandle<()>) {
    let _ = tx.send(StorageCommand::Shutdown);
    let _ = handle.join();
}

fn storage_loop(db: &Strata, rx: Receiver<StorageCommand>) {
    while let Ok(command) = rx.recv() {
        match command {
            StorageCommand::Put { key, value, reply } => {
                let _ = reply.send(put(db, key, value));
            }
            StorageCommand::PutBatch { entries, reply } => {
                let _ = reply.send(put_batch(db, entries));
            }
            StorageCommand::Shutdown => break,
        }
    }
    debug!("storage thread exiting");
}

fn put(db: &Strata, key: String, value: Vec<u8>) -> Result<usize, String> {
    db.kv_put(&key, Value::Bytes(value))
        .map(|_| 1)
        .map_err(debug_string)
}

/// Applies the whole batch in one transaction.
fn put_batch(db: &Strata, entries: Vec<(String, Vec<u8>)>) -> Result<usize, String> {
    let written = entries.len();
    if written == 0 {
        return Ok(0);
    }

    let mut session = db.session();
    session
        .execute(Command::TxnBegin {
            branch: None,
            options: None,
        })
        .map_err(debug_string)?;
    for (key, value) in entries {
        session
            .execute(Command::KvPut {
                branch: None,
                key,
                value: Value::Bytes(value),
            })
            .map_err(debug_string)?;
    }
    session.execute(Command::TxnCommit).map_err(debug_string)?;
    Ok(written)
}

fn debug_string<E: std::fmt::Debug>(err: E) -> String {
    format!("{:?}", err)
}

// ---------------------------------------------------------------------------
// Connections
// ---------------------------------------------------------------------------

fn accept_loop(
    listener: TcpListener,
    shutdown: Arc<AtomicBool>,
    storage: Sender<StorageCommand>,
    connections: Arc<Mutex<Vec<Connection>>>,
) {
    while !shutdown.load(Ordering::Acquire) {
        let stream = match listener.accept() {
            Ok((stream, _)) => stream,
            Err(err) if err.kind() == io::ErrorKind::WouldBlock => {
                thread::sleep(ACCEPT_POLL);
                continue;
            }
            Err(err) => {
                warn!(error = %err, "accept failed");
                continue;
            }
        };
        if let Err(err) = stream.set_nonblocking(false) {
            warn!(error = %err, "could not switch connection to blocking mode");
            continue;
        }
        let tracked = match stream.try_clone() {
            Ok(tracked) => tracked,
            Err(err) => {
                warn!(error = %err, "could not track connection");
                continue;
            }
        };
        let peer = stream.peer_addr().ok();
        let storage = storage.clone();
        let spawned = thread::Builder::new()
            .name("kv-conn".into())
            .spawn(move || serve_connection(stream, storage));
        match spawned {
            Ok(handle) => {
                debug!(?peer, "accepted connection");
                connections
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .push(Connection {
                        stream: tracked,
                        handle,
                    });
            }
            Err(err) => warn!(error = %err, "could not spawn connection thread"),
        }
    }
}

fn serve_connection(stream: TcpStream, storage: Sender<StorageCommand>) {
    if let Err(err) = handle_requests(stream, &storage) {
        debug!(error = %err, "connection closed with error");
    }
}

fn handle_requests(stream: TcpStream, storage: &Sender<StorageCommand>) -> io::Result<()> {
    stream.set_nodelay(true)?;
    let mut reader = BufReader::new(stream.try_clone()?);
    let mut writer = BufWriter::new(stream);
    let mut buf = String::new();

    while let Some(request) = protocol::read_frame::<_, Request>(&mut reader, &mut buf)? {
        let response = match dispatch(request, storage) {
            Ok(written) => Response::Ok { written },
            Err(message) => Response::Error { message },
        };
        protocol::write_frame(&mut writer, &response)?;
        writer.flush()?;
    }
    Ok(())
}

fn dispatch(request: Request, storage: &Sender<StorageCommand>) -> Result<usize, String> {
    match request {
        Request::Ping => Ok(0),
        Request::Set { key, value } => {
            let key = utf8_key(key)?;
            call(storage, |reply| StorageCommand::Put { key, value, reply })
        }
        Request::SetBatch { keys, values } => {
            if keys.len() != values.len() {
                return Err(format!(
                    "batch has {} keys but {} values",
                    keys.len(),
                    values.len()
                ));
            }
            let entries = keys
                .into_iter()
                .zip(values)
                .map(|(key, value)| utf8_key(key).map(|key| (key, value)))
                .collect::<Result<Vec<_>, _>>()?;
            call(storage, |reply| StorageCommand::PutBatch { entries, reply })
        }
    }
}

fn call(
    storage: &Sender<StorageCommand>,
    command: impl FnOnce(Reply) -> StorageCommand,
) -> Result<usize, String> {
    let (reply, response) = mpsc::channel();
    storage
        .send(command(reply))
        .map_err(|_| "storage is shut down".to_string())?;
    response
        .recv()
        .map_err(|_| "storage is shut down".to_string())?
}

fn utf8_key(key: Vec<u8>) -> Result<String, String> {
    String::from_utf8(key).map_err(|_| "key is not valid UTF-8".to_string())
}
