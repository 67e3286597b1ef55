//! Relay server accept loop
//!
//! Accepts TCP connections, registers each one's write side, and spawns
//! a handler task for its read side.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info};

use crate::connection::Connection;
use crate::error::AppError;
use crate::handler::handle_connection;
use crate::registry::Registry;
use crate::types::ConnectionIdGenerator;

/// The relay server
///
/// Owns the listener, the registry, and the root shutdown token. Each
/// connection gets a child token, so cancelling the root closes all of
/// them while `Registry::disconnect` closes just one.
pub struct RelayServer {
    listener: TcpListener,
    registry: Arc<Registry>,
    ids: ConnectionIdGenerator,
    shutdown: CancellationToken,
    handlers: TaskTracker,
}

impl RelayServer {
    /// Bind a listener on `addr`
    ///
    /// This is the only server error that is fatal to the process.
    pub async fn bind(addr: &str) -> Result<Self, AppError> {
        info!("Binding to {}", addr);
        let listener = TcpListener::bind(addr).await?;
        Ok(Self::new(listener))
    }

    /// Wrap an already bound listener
    pub fn new(listener: TcpListener) -> Self {
        Self {
            listener,
            registry: Arc::new(Registry::new()),
            ids: ConnectionIdGenerator::new(),
            shutdown: CancellationToken::new(),
            handlers: TaskTracker::new(),
        }
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Shared handle to the connection registry
    pub fn registry(&self) -> Arc<Registry> {
        Arc::clone(&self.registry)
    }

    /// Token that stops the accept loop and every handler when cancelled
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Accept connections until shutdown, then wait for handlers to finish
    pub async fn run(mut self) {
        match self.listener.local_addr() {
            Ok(addr) => info!("Relay server listening on {}", addr),
            Err(e) => debug!("Listening on unknown address: {}", e),
        }

        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => break,
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, addr)) => self.accept(stream, addr).await,
                    Err(e) => error!("Failed to accept connection: {}", e),
                },
            }
        }

        info!("Relay server shutting down");
        self.handlers.close();
        self.handlers.wait().await;
        info!("All connection handlers finished");
    }

    async fn accept(&mut self, stream: TcpStream, addr: SocketAddr) {
        let id = self.ids.next_id();
        info!("Received connection {} from {}", id, addr);

        let (reader, writer) = stream.into_split();
        let token = self.shutdown.child_token();
        self.registry.insert(id, writer, token.clone()).await;

        let registry = Arc::clone(&self.registry);
        self.handlers.spawn(async move {
            let reason = handle_connection(Connection::new(id), reader, registry, token).await;
            debug!("Handler for connection {} returned: {}", id, reason);
        });
    }
}
