//! Agent Test Server
//!
//! Owns the WebSocket listener. Every accepted socket becomes a new
//! [`AgentConnection`] whose receive loop runs on its own task; the
//! connection leaves the registry when that loop ends.

use futures_util::StreamExt;
use parking_lot::Mutex;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::connection::agent::{AgentConnection, ConnectionMode, ConnectionOptions};
use crate::error::ServerError;
use crate::server::registry::ConnectionRegistry;

/// How long `stop` waits for each receive loop to wind down
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Pause after a failed accept before trying again
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

struct Listening {
    local_addr: SocketAddr,
    shutdown: CancellationToken,
    task: JoinHandle<()>,
}

/// WebSocket server that accepts connections from the agent
pub struct AgentTestServer {
    host: String,
    port: u16,
    options: ConnectionOptions,
    registry: ConnectionRegistry,
    listening: Mutex<Option<Listening>>,
}

impl AgentTestServer {
    /// Create a server that will listen on `host:port` once started
    pub fn new(host: impl Into<String>, port: u16, options: ConnectionOptions) -> Self {
        Self {
            host: host.into(),
            port,
            options,
            registry: ConnectionRegistry::new(),
            listening: Mutex::new(None),
        }
    }

    /// Create a server from loaded configuration
    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.server.host.clone(),
            config.server.port,
            config.connection_options(),
        )
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    /// Configured port (may be 0; see [`local_addr`](Self::local_addr))
    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn mode(&self) -> ConnectionMode {
        self.options.mode
    }

    /// Address actually bound, while running
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.listening.lock().as_ref().map(|l| l.local_addr)
    }

    pub fn is_running(&self) -> bool {
        self.listening.lock().is_some()
    }

    /// Bind the listener and start accepting agents
    pub async fn start(&self) -> Result<SocketAddr, ServerError> {
        if let Some(addr) = self.local_addr() {
            return Err(ServerError::AlreadyRunning(addr));
        }

        let address = format!("{}:{}", self.host, self.port);
        let listener = TcpListener::bind(&address)
            .await
            .map_err(|source| ServerError::Bind {
                address: address.clone(),
                source,
            })?;
        let local_addr = listener
            .local_addr()
            .map_err(|source| ServerError::Bind { address, source })?;

        let mut listening = self.listening.lock();
        if let Some(existing) = listening.as_ref() {
            return Err(ServerError::AlreadyRunning(existing.local_addr));
        }

        let shutdown = CancellationToken::new();
        let task = tokio::spawn(accept_loop(
            listener,
            self.registry.clone(),
            self.options.clone(),
            shutdown.clone(),
        ));
        *listening = Some(Listening {
            local_addr,
            shutdown,
            task,
        });

        info!(address = %local_addr, mode = %self.options.mode, "Agent test server listening");
        Ok(local_addr)
    }

    /// Close the listener and every registered connection. No-op when stopped.
    pub async fn stop(&self) {
        let Some(listening) = self.listening.lock().take() else {
            return;
        };

        listening.shutdown.cancel();
        if let Err(e) = listening.task.await {
            warn!(error = %e, "Accept loop ended abnormally");
        }

        let connections = self.registry.drain();
        for connection in &connections {
            connection.close().await;
        }
        for connection in &connections {
            if tokio::time::timeout(SHUTDOWN_GRACE, connection.closed()).await.is_err() {
                warn!(connection_id = %connection.id(), "Receive loop did not stop in time");
            }
        }

        info!(
            address = %listening.local_addr,
            closed = connections.len(),
            "Agent test server stopped"
        );
    }

    /// Wait for an agent to connect.
    ///
    /// Returns the oldest registered connection straight away if there is
    /// one (it may already be closed). Otherwise waits for the next accept;
    /// every concurrent waiter is woken by it.
    pub async fn wait_for_connection(
        &self,
        timeout: Option<Duration>,
    ) -> Result<Arc<AgentConnection>, ServerError> {
        let mut accepted = self.registry.subscribe();
        if let Some(first) = self.registry.first() {
            return Ok(first);
        }

        let wait = async {
            loop {
                if accepted.changed().await.is_err() {
                    // Sender lives as long as the registry
                    std::future::pending::<()>().await;
                }
                // The newcomer may already be gone again; keep waiting then.
                if let Some(newest) = self.registry.newest() {
                    return newest;
                }
            }
        };

        match timeout {
            Some(limit) => tokio::time::timeout(limit, wait)
                .await
                .map_err(|_| ServerError::Timeout(limit)),
            None => Ok(wait.await),
        }
    }

    /// Copy of the currently registered connections, oldest first
    pub fn connections(&self) -> Vec<Arc<AgentConnection>> {
        self.registry.snapshot()
    }

    /// First registered connection that is not closed
    pub fn active_connection(&self) -> Option<Arc<AgentConnection>> {
        self.registry.first_open()
    }

    pub fn registry(&self) -> &ConnectionRegistry {
        &self.registry
    }
}

impl Drop for AgentTestServer {
    fn drop(&mut self) {
        if let Some(listening) = self.listening.get_mut().take() {
            listening.shutdown.cancel();
            for connection in self.registry.drain() {
                connection.cancel();
            }
        }
    }
}

async fn accept_loop(
    listener: TcpListener,
    registry: ConnectionRegistry,
    options: ConnectionOptions,
    shutdown: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                debug!("Accept loop received shutdown signal");
                break;
            }
            result = listener.accept() => {
                match result {
                    Ok((stream, peer)) => {
                        debug!(peer = %peer, "Accepted TCP connection");
                        tokio::spawn(handle_connection(
                            stream,
                            peer,
                            registry.clone(),
                            options.clone(),
                            shutdown.clone(),
                        ));
                    }
                    Err(e) => {
                        error!(error = %e, "Failed to accept connection");
                        tokio::time::sleep(ACCEPT_BACKOFF).await;
                    }
                }
            }
        }
    }
}

async fn handle_connection(
    stream: TcpStream,
    peer: SocketAddr,
    registry: ConnectionRegistry,
    options: ConnectionOptions,
    shutdown: CancellationToken,
) {
    let socket = tokio::select! {
        _ = shutdown.cancelled() => return,
        result = tokio_tungstenite::accept_async(stream) => match result {
            Ok(socket) => socket,
            Err(e) => {
                warn!(peer = %peer, error = %e, "WebSocket handshake failed");
                return;
            }
        },
    };

    let (sink, source) = socket.split();
    let connection = Arc::new(AgentConnection::new(sink, peer, &options));
    registry.insert(connection.clone());

    // stop() cancels before draining, so an insert that raced it is caught here
    if shutdown.is_cancelled() {
        registry.remove(connection.id());
        connection.close().await;
        return;
    }

    info!(
        connection_id = %connection.id(),
        peer = %peer,
        mode = %connection.mode(),
        "Agent connected"
    );

    connection.run(source).await;

    if registry.remove(connection.id()) {
        debug!(connection_id = %connection.id(), "Removed connection from registry");
    }
}
