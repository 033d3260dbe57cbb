//! TCP Server
//!
//! Owns the scheduler, the listening socket and the shared state. The
//! accept loop runs as a task; every accepted socket becomes a task of its
//! own, so a client that stalls only stalls its own connection.

use std::cell::RefCell;
use std::net::{SocketAddr, ToSocketAddrs};
use std::rc::Rc;

use crate::collector::Collector;
use crate::config::Config;
use crate::error::{Result, VaultError};
use crate::http::Limits;
use crate::router::RequestHandler;
use crate::runtime::{Handle, Scheduler, TcpListener};
use crate::storage::StorageExecutor;

use super::connection::{Connection, ConnectionSettings};

/// HTTP server for PostVault
pub struct Server {
    scheduler: Scheduler,
    listener: TcpListener,
    handler: RequestHandler,
    settings: Rc<ConnectionSettings>,
}

impl Server {
    /// Bind the listening socket and take ownership of the shared state
    ///
    /// Failing to bind is fatal for the caller.
    pub fn bind(
        config: &Config,
        collector: Collector,
        executor: Box<dyn StorageExecutor>,
    ) -> Result<Self> {
        let scheduler = Scheduler::new()?;
        let handle = scheduler.handle();

        let addr = resolve(&config.listen_addr())?;
        let listener = TcpListener::bind(&handle, addr)?;
        let local_addr = listener.local_addr()?;
        tracing::info!("Listening on {} as '{}'", local_addr, config.server_name);

        let handler = RequestHandler::new(
            handle,
            Rc::new(RefCell::new(collector)),
            Rc::new(RefCell::new(executor)),
            config.ingest_delay,
        );

        // The Host check uses the port actually bound, which differs from
        // the configured one when that was 0
        let settings = Rc::new(ConnectionSettings {
            limits: Limits::from_config(config),
            server_name: config.server_name.clone(),
            port: local_addr.port(),
        });

        Ok(Self {
            scheduler,
            listener,
            handler,
            settings,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn handle(&self) -> Handle {
        self.scheduler.handle()
    }

    /// Shared state the connections dispatch into
    pub fn handler(&self) -> &RequestHandler {
        &self.handler
    }

    /// Serve until the accept loop fails (blocking)
    pub fn run(self) -> Result<()> {
        let Self {
            mut scheduler,
            listener,
            handler,
            settings,
        } = self;

        let handle = scheduler.handle();
        scheduler.spawn(accept_loop(handle, listener, handler, settings));
        scheduler.run()
    }
}

async fn accept_loop(
    handle: Handle,
    mut listener: TcpListener,
    handler: RequestHandler,
    settings: Rc<ConnectionSettings>,
) {
    loop {
        match listener.accept().await {
            Ok((stream, peer)) => {
                let connection =
                    Connection::new(stream, peer, handler.clone(), Rc::clone(&settings));
                let task = handle.spawn(connection.serve());
                tracing::debug!("Accepted {} as {}", peer, task);
            }
            Err(VaultError::Io(e)) => {
                tracing::warn!("Accept failed: {}", e);
            }
            Err(e) => {
                tracing::error!("Accept loop stopped: {}", e);
                return;
            }
        }
    }
}

/// First IPv4 address for `addr`, else the first of any family
fn resolve(addr: &str) -> Result<SocketAddr> {
    let candidates: Vec<SocketAddr> = addr.to_socket_addrs()?.collect();
    candidates
        .iter()
        .find(|candidate| candidate.is_ipv4())
        .or_else(|| candidates.first())
        .copied()
        .ok_or_else(|| VaultError::Config(format!("{} resolves to no address", addr)))
}
