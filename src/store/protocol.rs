//! Wire format between [`super::KvClient`] and [`super::KvServer`].
//!
//! Each message is a single JSON object terminated by `\n`.

use std::io::{self, BufRead, Write};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Request {
    Ping,
    Set {
        key: Vec<u8>,
        value: Vec<u8>,
    },
    SetBatch {
        keys: Vec<Vec<u8>>,
        values: Vec<Vec<u8>>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Response {
    /// Request applied; `written` is the number of keys stored.
    Ok { written: usize },
    Error { message: String },
}

pub fn write_frame<W: Write, T: Serialize>(writer: &mut W, message: &T) -> io::Result<()> {
    serde_json::to_writer(&mut *writer, message)?;
    writer.write_all(b"\n")
}

/// Read the next frame. Returns `Ok(None)` once the peer has closed the
/// connection. `buf` is scratch space reused across calls.
pub fn read_frame<R: BufRead, T: DeserializeOwned>(
    reader: &mut R,
    buf: &mut String,
) -> io::Result<Option<T>> {
    buf.clear();
    if reader.read_line(buf)? == 0 {
        return Ok(None);
    }
    let message = serde_json::from_str(buf.trim_end())?;
    Ok(Some(message))
}
