use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicI32, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::ServerConfig;
use crate::database::Databases;
use crate::server::connection::Connection;
use crate::server::handshake::{Handshake, HandshakeResult};
use crate::server::registry::Registry;

/// Pause after a failed `accept`, so a persistent error (e.g. EMFILE)
/// does not spin the loop.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// TCP server exposing a [`Databases`] namespace over the PostgreSQL wire
/// protocol.
pub struct TcpServer {
    listener: TcpListener,
    next_pid: AtomicI32,
    registry: Arc<Registry>,
    databases: Arc<Databases>,
    shutdown: CancellationToken,
}

impl TcpServer {
    /// Creates a server on an already bound listener.
    pub fn new(
        listener: TcpListener,
        databases: Arc<Databases>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            listener,
            next_pid: AtomicI32::new(1),
            registry: Arc::new(Registry::new(shutdown.clone())),
            databases,
            shutdown,
        }
    }

    /// Binds the configured address and serves in a background task.
    pub async fn start(
        config: &ServerConfig,
        databases: Arc<Databases>,
    ) -> std::io::Result<ServerHandle> {
        let listener = TcpListener::bind(config.bind_addr()).await?;
        let local_addr = listener.local_addr()?;
        let shutdown = CancellationToken::new();

        let server = TcpServer::new(listener, databases, shutdown.clone());
        let task = tokio::spawn(server.serve());
        info!(%local_addr, allow_others = config.allow_others, "database server started");

        Ok(ServerHandle {
            local_addr,
            shutdown,
            task: Mutex::new(Some(task)),
        })
    }

    /// Accepts connections until the shutdown token is cancelled.
    ///
    /// The listening socket is closed when this returns.
    pub async fn serve(self) {
        loop {
            let (socket, peer_addr) = tokio::select! {
                _ = self.shutdown.cancelled() => break,
                res = self.listener.accept() => match res {
                    Ok(accepted) => accepted,
                    Err(e) => {
                        warn!(error = %e, "accept failed");
                        tokio::time::sleep(ACCEPT_BACKOFF).await;
                        continue;
                    }
                },
            };

            let pid = self.next_pid.fetch_add(1, Ordering::SeqCst);
            let registry = self.registry.clone();
            let databases = self.databases.clone();
            let shutdown = self.shutdown.clone();
            debug!(pid, %peer_addr, "accepted connection");

            tokio::spawn(async move {
                let handshake = Handshake::new(socket, pid, databases);
                let result = tokio::select! {
                    res = handshake.run() => res,
                    _ = shutdown.cancelled() => return,
                };

                let (mut connection, secret_key) = match result {
                    Ok(HandshakeResult::Success {
                        framed,
                        database,
                        secret_key,
                    }) => {
                        debug!(pid, database = database.name(), "session ready");
                        (Connection::new(framed, pid, database), secret_key)
                    }
                    Ok(HandshakeResult::CancelRequested {
                        pid: target_pid,
                        secret_key,
                    }) => {
                        let cancelled = registry.cancel(target_pid, secret_key);
                        debug!(pid, target_pid, cancelled, "cancel request");
                        return;
                    }
                    Ok(HandshakeResult::Rejected { database }) => {
                        warn!(pid, %database, "rejected connection to unknown database");
                        return;
                    }
                    Err(e) => {
                        warn!(pid, error = %e, "handshake failed");
                        return;
                    }
                };

                let cancel_token = registry.register(pid, secret_key);
                if let Err(e) = connection.run(cancel_token).await {
                    warn!(pid, error = %e, "session failed");
                }
                registry.unregister(pid);
                debug!(pid, "connection closed");
            });
        }

        info!(local_addr = ?self.listener.local_addr().ok(), "database server stopped");
    }
}

/// Handle to a running [`TcpServer`].
///
/// Dropping the handle requests shutdown without waiting for it.
pub struct ServerHandle {
    local_addr: SocketAddr,
    shutdown: CancellationToken,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl ServerHandle {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// The bound port; differs from the configured one only when that was `0`.
    pub fn port(&self) -> u16 {
        self.local_addr.port()
    }

    pub fn is_running(&self) -> bool {
        !self.shutdown.is_cancelled()
    }

    /// Stops accepting connections and closes every session.
    ///
    /// Returns once the listening socket is closed. Calling it again is a
    /// no-op.
    pub async fn stop(&self) {
        self.shutdown.cancel();
        let task = self.task.lock().take();
        if let Some(task) = task
            && let Err(e) = task.await
        {
            warn!(error = %e, "accept loop ended abnormally");
        }
    }
}

impl Drop for ServerHandle {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}
