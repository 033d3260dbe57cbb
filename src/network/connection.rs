//! Connection Handler
//!
//! Serves exactly one request per accepted socket, then closes it.
//!
//! ## Flow
//! 1. Read the request head (limits enforced)
//! 2. Reject a foreign or missing `Host`
//! 3. Resolve the route; read the body only if the route needs one
//! 4. Dispatch to the [`RequestHandler`] and write the response
//!
//! Protocol violations in steps 1-3 are answered with `400 Bad Request`.

use std::io;
use std::net::SocketAddr;
use std::rc::Rc;

use crate::error::{Result, VaultError};
use crate::http::{read_body, read_request_head, BufferedReader, Limits, Response, StatusCode};
use crate::router::{RequestHandler, Route};
use crate::runtime::TcpStream;

/// Per-server values every connection needs
#[derive(Debug, Clone)]
pub struct ConnectionSettings {
    pub limits: Limits,

    /// Name required in the `Host` header
    pub server_name: String,

    /// Port accepted as the optional `Host` suffix
    pub port: u16,
}

/// Handles a single client connection
pub struct Connection {
    /// Socket, buffered for line-oriented reads
    reader: BufferedReader<TcpStream>,

    handler: RequestHandler,

    settings: Rc<ConnectionSettings>,

    /// Peer address for logging
    peer_addr: String,
}

impl Connection {
    pub fn new(
        stream: TcpStream,
        peer_addr: SocketAddr,
        handler: RequestHandler,
        settings: Rc<ConnectionSettings>,
    ) -> Self {
        Self {
            reader: BufferedReader::new(stream),
            handler,
            settings,
            peer_addr: peer_addr.to_string(),
        }
    }

    /// Serve the request and close the connection
    pub async fn serve(mut self) {
        tracing::debug!("Connection established from {}", self.peer_addr);

        let response = match self.process().await {
            Ok(Some(response)) => response,
            Ok(None) => {
                tracing::debug!("Client {} disconnected without a request", self.peer_addr);
                return;
            }
            Err(e) if e.is_protocol() => {
                tracing::warn!("Bad request from {}: {}", self.peer_addr, e);
                Response::new(StatusCode::BadRequest)
                    .body("text/plain; charset=utf-8", e.to_string().into_bytes())
            }
            Err(e) => {
                tracing::debug!("Error reading from {}: {}", self.peer_addr, e);
                return;
            }
        };

        if let Err(e) = self.send_response(&response).await {
            if is_disconnect(&e) {
                tracing::debug!(
                    "Client {} disconnected before response could be sent: {}",
                    self.peer_addr,
                    e
                );
            } else {
                tracing::warn!("Error writing to {}: {}", self.peer_addr, e);
            }
            return;
        }

        self.linger().await;
        tracing::debug!("Connection to {} closed", self.peer_addr);
    }

    async fn process(&mut self) -> Result<Option<Response>> {
        let settings = Rc::clone(&self.settings);

        let Some(head) = read_request_head(&mut self.reader, &settings.limits).await? else {
            return Ok(None);
        };
        head.validate_host(&settings.server_name, settings.port)?;

        let route = Route::resolve(&head.method, head.path());
        tracing::trace!("{} {} {} -> {:?}", self.peer_addr, head.method, head.target, route);

        let body = match head.content_length()? {
            Some(length) if route.needs_body() => Some(
                read_body(&mut self.reader, length, settings.limits.max_body_bytes).await?,
            ),
            _ => None,
        };

        let response = self.handler.handle(route, body.as_deref()).await;
        tracing::info!(
            "{} {} {} -> {} {}",
            self.peer_addr,
            head.method,
            head.path(),
            response.status.as_u16(),
            response.reason()
        );
        Ok(Some(response))
    }

    async fn send_response(&mut self, response: &Response) -> Result<()> {
        let stream = self.reader.get_mut();
        stream.write_all(&response.to_bytes()).await?;
        stream.shutdown_write()
    }

    /// Discard whatever the client still sends, up to the body limit, so
    /// closing with unread input does not reset the connection before the
    /// client has read the response
    async fn linger(&mut self) {
        let mut remaining = self.settings.limits.max_body_bytes;
        let mut scratch = [0u8; 1024];
        while remaining > 0 {
            match self.reader.get_mut().read(&mut scratch).await {
                Ok(0) | Err(_) => break,
                Ok(n) => remaining = remaining.saturating_sub(n),
            }
        }
    }

    /// Get the peer address string
    pub fn peer_addr(&self) -> &str {
        &self.peer_addr
    }
}

fn is_disconnect(e: &VaultError) -> bool {
    matches!(
        e,
        VaultError::Io(io_err) if matches!(
            io_err.kind(),
            io::ErrorKind::ConnectionAborted
                | io::ErrorKind::ConnectionReset
                | io::ErrorKind::BrokenPipe
        )
    )
}
