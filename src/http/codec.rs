//! Request framing
//!
//! Reads a request head line by line from an asynchronous byte source and
//! the body on demand, enforcing fixed limits so a hostile or broken client
//! cannot make the server buffer unbounded input.
//!
//! ## Limits
//! - Request line and each header line: `max_line_bytes`, terminator included
//! - Header block: `max_header_lines` lines before the blank line
//! - Body: `max_body_bytes`, and never more than `Content-Length`

use std::future::Future;
use std::io::{Cursor, Read};

use bytes::{Bytes, BytesMut};

use crate::config::Config;
use crate::error::{Result, VaultError};
use crate::runtime::TcpStream;

use super::request::RequestHead;

/// Bytes requested from the source per fill
const READ_CHUNK: usize = 8 * 1024;

/// Something bytes can be read from, suspending until some are available
pub trait ByteSource {
    /// Read up to `buf.len()` bytes; 0 means end of stream
    fn read_some(&mut self, buf: &mut [u8]) -> impl Future<Output = Result<usize>>;
}

impl ByteSource for TcpStream {
    async fn read_some(&mut self, buf: &mut [u8]) -> Result<usize> {
        self.read(buf).await
    }
}

impl<T: AsRef<[u8]>> ByteSource for Cursor<T> {
    async fn read_some(&mut self, buf: &mut [u8]) -> Result<usize> {
        Ok(Read::read(self, buf)?)
    }
}

/// Framing limits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    pub max_line_bytes: usize,
    pub max_header_lines: usize,
    pub max_body_bytes: usize,
}

impl Limits {
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_line_bytes: config.max_line_bytes,
            max_header_lines: config.max_header_lines,
            max_body_bytes: config.max_body_bytes,
        }
    }
}

impl Default for Limits {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

// =============================================================================
// Buffered Reader
// =============================================================================

/// Line and exact-length reads over a [`ByteSource`]
pub struct BufferedReader<S> {
    source: S,
    buffer: BytesMut,
    eof: bool,
}

impl<S: ByteSource> BufferedReader<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            buffer: BytesMut::with_capacity(READ_CHUNK),
            eof: false,
        }
    }

    /// Read one line, terminator included
    ///
    /// Returns an empty buffer at end of stream, and an unterminated line if
    /// the stream ends mid-line. Fails once the line exceeds `limit` bytes,
    /// without reading further than `limit + 1` bytes into it.
    pub async fn read_line(&mut self, limit: usize) -> Result<Bytes> {
        let mut scanned = 0;
        loop {
            if let Some(pos) = self.buffer[scanned..].iter().position(|&b| b == b'\n') {
                let len = scanned + pos + 1;
                if len > limit {
                    return Err(VaultError::LineTooLong { limit });
                }
                return Ok(self.buffer.split_to(len).freeze());
            }
            scanned = self.buffer.len();

            if scanned > limit {
                return Err(VaultError::LineTooLong { limit });
            }
            if self.eof {
                return Ok(self.buffer.split().freeze());
            }
            self.fill().await?;
        }
    }

    /// Read exactly `len` bytes
    pub async fn read_exact(&mut self, len: usize) -> Result<Bytes> {
        while self.buffer.len() < len && !self.eof {
            self.fill().await?;
        }
        if self.buffer.len() < len {
            return Err(VaultError::BodyTruncated {
                expected: len,
                received: self.buffer.len(),
            });
        }
        Ok(self.buffer.split_to(len).freeze())
    }

    /// Bytes received but not yet consumed
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    pub fn get_ref(&self) -> &S {
        &self.source
    }

    pub fn get_mut(&mut self) -> &mut S {
        &mut self.source
    }

    pub fn into_inner(self) -> S {
        self.source
    }

    async fn fill(&mut self) -> Result<usize> {
        let start = self.buffer.len();
        self.buffer.resize(start + READ_CHUNK, 0);

        let read = self.source.read_some(&mut self.buffer[start..]).await;
        let n = match &read {
            Ok(n) => *n,
            Err(_) => 0,
        };
        self.buffer.truncate(start + n);

        read?;
        if n == 0 {
            self.eof = true;
        }
        Ok(n)
    }
}

// =============================================================================
// Request Framing
// =============================================================================

/// Read the request line and header block
///
/// Returns `None` if the peer closed the connection before sending a byte.
pub async fn read_request_head<S: ByteSource>(
    reader: &mut BufferedReader<S>,
    limits: &Limits,
) -> Result<Option<RequestHead>> {
    // Step 1: Request line
    let line = reader.read_line(limits.max_line_bytes).await?;
    if line.is_empty() {
        return Ok(None);
    }
    let mut head = RequestHead::from_request_line(trim_terminator(&decode_latin1(&line)))?;

    // Step 2: Header lines up to the blank line (or end of stream)
    let mut count = 0;
    loop {
        let line = reader.read_line(limits.max_line_bytes).await?;
        if matches!(&line[..], b"\r\n" | b"\n" | b"") {
            break;
        }

        count += 1;
        if count > limits.max_header_lines {
            return Err(VaultError::TooManyHeaders {
                limit: limits.max_header_lines,
            });
        }

        let text = decode_latin1(&line);
        let text = trim_terminator(&text);
        let (name, value) = text
            .split_once(':')
            .filter(|(name, _)| is_token(name))
            .ok_or_else(|| VaultError::MalformedHeader(text.to_string()))?;
        head.headers.append(name, value.trim());
    }

    Ok(Some(head))
}

/// Read a body of `length` bytes
pub async fn read_body<S: ByteSource>(
    reader: &mut BufferedReader<S>,
    length: usize,
    max_body_bytes: usize,
) -> Result<Bytes> {
    if length > max_body_bytes {
        return Err(VaultError::BodyTooLarge {
            length,
            limit: max_body_bytes,
        });
    }
    reader.read_exact(length).await
}

/// Header bytes are ISO-8859-1: every byte maps to the code point of the
/// same value.
fn decode_latin1(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| char::from(b)).collect()
}

fn trim_terminator(line: &str) -> &str {
    line.trim_end_matches(['\r', '\n'])
}

fn is_token(name: &str) -> bool {
    !name.is_empty() && !name.contains(|c: char| c.is_whitespace() || c.is_control())
}
