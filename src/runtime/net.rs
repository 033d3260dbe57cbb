//! Non-blocking TCP wrappers
//!
//! Sockets are registered with the scheduler's multiplexer for both
//! directions once, at construction. Every operation is attempted first and
//! only suspends after the socket reports `WouldBlock`; readiness is
//! edge-triggered, so suspending without draining first could miss the
//! wakeup.

use std::io::{self, Read, Write};
use std::net::SocketAddr;

use mio::Token;

use crate::error::Result;

use super::scheduler::Handle;

/// Listening socket driven by the scheduler
pub struct TcpListener {
    inner: mio::net::TcpListener,
    token: Token,
    handle: Handle,
}

impl TcpListener {
    /// Bind and register with the scheduler
    pub fn bind(handle: &Handle, addr: SocketAddr) -> Result<Self> {
        let mut inner = mio::net::TcpListener::bind(addr)?;
        let token = handle.register(&mut inner)?;
        Ok(Self {
            inner,
            token,
            handle: handle.clone(),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.inner.local_addr()?)
    }

    pub fn token(&self) -> Token {
        self.token
    }

    /// Accept the next connection, suspending until one arrives
    pub async fn accept(&mut self) -> Result<(TcpStream, SocketAddr)> {
        loop {
            match self.inner.accept() {
                Ok((stream, peer)) => {
                    let stream = TcpStream::from_mio(&self.handle, stream)?;
                    return Ok((stream, peer));
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                    self.handle.readable(self.token).await?;
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
    }
}

impl Drop for TcpListener {
    fn drop(&mut self) {
        self.handle.deregister(&mut self.inner);
    }
}

/// Connected socket driven by the scheduler
pub struct TcpStream {
    inner: mio::net::TcpStream,
    token: Token,
    handle: Handle,
}

impl TcpStream {
    /// Adopt a non-blocking stream and register it with the scheduler
    pub fn from_mio(handle: &Handle, mut inner: mio::net::TcpStream) -> Result<Self> {
        let token = handle.register(&mut inner)?;
        Ok(Self {
            inner,
            token,
            handle: handle.clone(),
        })
    }

    /// Open a connection, suspending until it is established
    pub async fn connect(handle: &Handle, addr: SocketAddr) -> Result<Self> {
        let stream = Self::from_mio(handle, mio::net::TcpStream::connect(addr)?)?;

        loop {
            handle.writable(stream.token).await?;

            if let Some(e) = stream.inner.take_error()? {
                return Err(e.into());
            }
            match stream.inner.peer_addr() {
                Ok(_) => return Ok(stream),
                Err(e) if e.kind() == io::ErrorKind::NotConnected => continue,
                Err(e) => return Err(e.into()),
            }
        }
    }

    pub fn peer_addr(&self) -> Result<SocketAddr> {
        Ok(self.inner.peer_addr()?)
    }

    pub fn token(&self) -> Token {
        self.token
    }

    /// Read available bytes into `buf`, suspending until some arrive
    ///
    /// Returns 0 once the peer has closed its side.
    pub async fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        loop {
            match self.inner.read(buf) {
                Ok(n) => return Ok(n),
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                    self.handle.readable(self.token).await?;
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Write all of `buf`, suspending whenever the send buffer is full
    pub async fn write_all(&mut self, mut buf: &[u8]) -> Result<()> {
        while !buf.is_empty() {
            match self.inner.write(buf) {
                Ok(0) => return Err(io::Error::from(io::ErrorKind::WriteZero).into()),
                Ok(n) => buf = &buf[n..],
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                    self.handle.writable(self.token).await?;
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }

    /// Shut down the write half so the peer sees end of stream
    pub fn shutdown_write(&self) -> Result<()> {
        match self.inner.shutdown(std::net::Shutdown::Write) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotConnected => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

impl Drop for TcpStream {
    fn drop(&mut self) {
        self.handle.deregister(&mut self.inner);
    }
}
