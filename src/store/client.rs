//! Pooled client for [`super::KvServer`].

use std::io::{self, BufReader, BufWriter, Write};
use std::net::{Shutdown, SocketAddr, TcpStream};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

use tracing::{debug, info};

use super::protocol::{self, Request, Response};
use super::StoreClient;
use crate::error::StoreError;

struct Connection {
    reader: BufReader<TcpStream>,
    writer: BufWriter<TcpStream>,
    buf: String,
}

impl Connection {
    fn open(addr: SocketAddr) -> Result<Self, StoreError> {
        let connect_err = |source| StoreError::Connect { addr, source };
        let stream = TcpStream::connect(addr).map_err(connect_err)?;
        stream.set_nodelay(true).map_err(connect_err)?;
        let reader = BufReader::new(stream.try_clone().map_err(connect_err)?);

        let mut conn = Self {
            reader,
            writer: BufWriter::new(stream),
            buf: String::new(),
        };
        conn.call(&Request::Ping)?;
        Ok(conn)
    }

    fn call(&mut self, request: &Request) -> Result<usize, StoreError> {
        protocol::write_frame(&mut self.writer, request)?;
        self.writer.flush()?;
        match protocol::read_frame(&mut self.reader, &mut self.buf)? {
            Some(Response::Ok { written }) => Ok(written),
            Some(Response::Error { message }) => Err(StoreError::Write(message)),
            None => Err(StoreError::ConnectionClosed),
        }
    }

    fn shutdown(&self) -> io::Result<()> {
        match self.writer.get_ref().shutdown(Shutdown::Both) {
            Err(err) if err.kind() != io::ErrorKind::NotConnected => Err(err),
            _ => Ok(()),
        }
    }
}

/// A fixed pool of connections shared by every caller.
///
/// Requests are spread over the pool round-robin and each connection carries
/// one request at a time, so a pool at least as large as the number of
/// concurrent callers keeps them from queueing on each other.
pub struct KvClient {
    addr: SocketAddr,
    connections: Vec<Mutex<Connection>>,
    next: AtomicUsize,
}

impl KvClient {
    /// Open `pool_size` connections (at least one) to `addr`, checking each
    /// with a ping.
    pub fn connect(addr: SocketAddr, pool_size: usize) -> Result<Self, StoreError> {
        let pool_size = pool_size.max(1);
        let connections = (0..pool_size)
            .map(|_| Connection::open(addr).map(Mutex::new))
            .collect::<Result<Vec<_>, _>>()?;
        info!(%addr, pool_size, "kv client connected");
        Ok(Self {
            addr,
            connections,
            next: AtomicUsize::new(0),
        })
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn pool_size(&self) -> usize {
        self.connections.len()
    }

    /// Round-trip a ping on the next pooled connection.
    pub fn ping(&self) -> Result<(), StoreError> {
        self.call(&Request::Ping).map(|_| ())
    }

    /// Close every pooled connection. Returns the first failure after
    /// attempting all of them.
    pub fn disconnect(self) -> Result<(), StoreError> {
        let mut first_err = None;
        for conn in self.connections {
            let conn = conn.into_inner().unwrap_or_else(PoisonError::into_inner);
            if let Err(err) = conn.shutdown() {
                first_err.get_or_insert(err);
            }
        }
        debug!(addr = %self.addr, "kv client disconnected");
        match first_err {
            Some(err) => Err(StoreError::Disconnect(err)),
            None => Ok(()),
        }
    }

    fn call(&self, request: &Request) -> Result<usize, StoreError> {
        let slot = self.next.fetch_add(1, Ordering::Relaxed) % self.connections.len();
        let mut conn = self.connections[slot]
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        conn.call(request)
    }
}

impl StoreClient for KvClient {
    fn write(&self, key: &[u8], value: &[u8]) -> Result<(), StoreError> {
        let request = Request::Set {
            key: key.to_vec(),
            value: value.to_vec(),
        };
        match self.call(&request)? {
            1 => Ok(()),
            _ => Err(StoreError::UnexpectedResponse),
        }
    }

    fn write_batch(&self, keys: &[Vec<u8>], values: &[Vec<u8>]) -> Result<(), StoreError> {
        if keys.len() != values.len() {
            return Err(StoreError::BatchMismatch {
                keys: keys.len(),
                values: values.len(),
            });
        }
        let request = Request::SetBatch {
            keys: keys.to_vec(),
            values: values.to_vec(),
        };
        let written = self.call(&request)?;
        if written == keys.len() {
            Ok(())
        } else {
            Err(StoreError::UnexpectedResponse)
        }
    }
}
