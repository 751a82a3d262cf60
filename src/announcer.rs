//! Endpoint announcer.
//!
//! Starts the TCP database server and prints, for every node, the URL under
//! which an external client can reach the node's in-memory database:
//!
//! ```text
//! Database for Notary database: jdbc:h2:tcp://localhost:9092/notary
//! Database for Bank A database: jdbc:h2:tcp://localhost:9092/bankA
//! ```
//!
//! The announcer then stays out of the way: [`Announcer::block`] parks the
//! caller until released so the process stays up while someone inspects the
//! databases, and [`Announcer::stop`] shuts the server down.

use std::fmt;
use std::io::Write;
use std::net::SocketAddr;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::ServerConfig;
use crate::database::Databases;
use crate::endpoint::{Endpoint, ExtractError};
use crate::node::{NodeReference, NodeSet};
use crate::server::{ServerHandle, TcpServer};

/// Errors raised while constructing an [`Announcer`].
#[derive(Debug)]
pub enum AnnounceError {
    /// A node's data source URL does not name an in-memory database.
    Extraction(ExtractError),
    /// The database server could not be started.
    Server(std::io::Error),
    /// Writing an announcement failed.
    Output(std::io::Error),
}

impl fmt::Display for AnnounceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnnounceError::Extraction(e) => write!(f, "{}", e),
            AnnounceError::Server(e) => write!(f, "cannot start database server: {}", e),
            AnnounceError::Output(e) => write!(f, "cannot write announcement: {}", e),
        }
    }
}

impl std::error::Error for AnnounceError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AnnounceError::Extraction(e) => Some(e),
            AnnounceError::Server(e) => Some(e),
            AnnounceError::Output(e) => Some(e),
        }
    }
}

impl From<ExtractError> for AnnounceError {
    fn from(e: ExtractError) -> Self {
        AnnounceError::Extraction(e)
    }
}

/// One printed line: a node and the endpoint of its database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnnouncedEndpoint {
    pub organisation: String,
    pub endpoint: Endpoint,
}

impl AnnouncedEndpoint {
    /// Derives the announcement for a node.
    pub fn for_node<N: NodeReference>(
        node: &N,
        host: &str,
        port: u16,
    ) -> Result<Self, ExtractError> {
        Ok(Self {
            organisation: node.organisation().to_string(),
            endpoint: Endpoint::for_data_source(host, port, node.data_source_url())?,
        })
    }
}

impl fmt::Display for AnnouncedEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Database for {} database: {}",
            self.organisation, self.endpoint
        )
    }
}

/// Releases every current and future [`Announcer::block`] call.
#[derive(Debug, Clone)]
pub struct BlockRelease(CancellationToken);

impl BlockRelease {
    pub fn release(&self) {
        self.0.cancel();
    }

    pub fn is_released(&self) -> bool {
        self.0.is_cancelled()
    }
}

/// Owns the database server and the list of announced endpoints.
pub struct Announcer {
    server: ServerHandle,
    endpoints: Vec<AnnouncedEndpoint>,
    release: CancellationToken,
}

impl Announcer {
    /// Starts the server and prints one line per node to stdout.
    pub async fn start<N: NodeReference>(
        nodes: &NodeSet<N>,
        config: &ServerConfig,
        databases: Arc<Databases>,
    ) -> Result<Self, AnnounceError> {
        Self::start_with_output(nodes, config, databases, &mut std::io::stdout()).await
    }

    /// Starts the server and writes one line per node to `out`.
    ///
    /// Nodes are processed in order. If a node's URL cannot be parsed, the
    /// server is stopped and the error returned; lines already written for
    /// earlier nodes stay written, nothing is written for later ones.
    pub async fn start_with_output<N: NodeReference, W: Write>(
        nodes: &NodeSet<N>,
        config: &ServerConfig,
        databases: Arc<Databases>,
        out: &mut W,
    ) -> Result<Self, AnnounceError> {
        let server = TcpServer::start(config, databases)
            .await
            .map_err(AnnounceError::Server)?;

        match announce_all(nodes, &config.host, server.port(), out) {
            Ok(endpoints) => Ok(Self {
                server,
                endpoints,
                release: CancellationToken::new(),
            }),
            Err(e) => {
                warn!(error = %e, "announcement failed, stopping database server");
                server.stop().await;
                Err(e)
            }
        }
    }

    /// Endpoints in announcement order.
    pub fn endpoints(&self) -> &[AnnouncedEndpoint] {
        &self.endpoints
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.server.local_addr()
    }

    pub fn port(&self) -> u16 {
        self.server.port()
    }

    pub fn is_running(&self) -> bool {
        self.server.is_running()
    }

    /// Handle that makes [`block`](Self::block) return.
    pub fn release_handle(&self) -> BlockRelease {
        BlockRelease(self.release.clone())
    }

    /// Waits until released through a [`BlockRelease`]. There is no timeout.
    ///
    /// Keeps the process alive while a client inspects the databases.
    /// [`stop`](Self::stop) does not release waiters.
    pub async fn block(&self) {
        info!(port = self.port(), "blocking until released");
        self.release.cancelled().await;
    }

    /// Stops the database server. Safe to call more than once.
    pub async fn stop(&self) {
        self.server.stop().await;
    }
}

fn announce_all<N: NodeReference, W: Write>(
    nodes: &NodeSet<N>,
    host: &str,
    port: u16,
    out: &mut W,
) -> Result<Vec<AnnouncedEndpoint>, AnnounceError> {
    let mut endpoints = Vec::with_capacity(nodes.len());
    for node in nodes.iter() {
        let announced = AnnouncedEndpoint::for_node(node, host, port)?;
        writeln!(out, "{}", announced).map_err(AnnounceError::Output)?;
        info!(organisation = %announced.organisation, endpoint = %announced.endpoint, "announced database");
        endpoints.push(announced);
    }
    out.flush().map_err(AnnounceError::Output)?;
    Ok(endpoints)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::NodeInfo;
    use std::time::Duration;
    use tokio::net::TcpStream;

    fn local_config() -> ServerConfig {
        ServerConfig {
            port: 0,
            allow_others: false,
            ..ServerConfig::default()
        }
    }

    fn lines(out: &[u8]) -> Vec<String> {
        String::from_utf8(out.to_vec())
            .unwrap()
            .lines()
            .map(str::to_string)
            .collect()
    }

    #[test]
    fn test_announce_default_port() {
        let nodes = NodeSet::new(
            NodeInfo::new("Notary", "jdbc:h2:mem:notaryDb;DB_CLOSE_ON_EXIT=FALSE"),
            vec![],
        );
        let mut out = Vec::new();
        announce_all(&nodes, "localhost", 9092, &mut out).unwrap();
        assert_eq!(
            lines(&out),
            vec!["Database for Notary database: jdbc:h2:tcp://localhost:9092/notaryDb"]
        );
    }

    #[test]
    fn test_announce_preserves_node_order() {
        let nodes = NodeSet::new(
            NodeInfo::new("Notary", "jdbc:h2:mem:notaryDb"),
            vec![
                NodeInfo::new("Party A", "jdbc:h2:mem:partyA;MODE=X"),
                NodeInfo::new("Party B", "jdbc:h2:mem:partyB"),
            ],
        );
        let mut out = Vec::new();
        let endpoints = announce_all(&nodes, "localhost", 5555, &mut out).unwrap();
        assert_eq!(
            lines(&out),
            vec![
                "Database for Notary database: jdbc:h2:tcp://localhost:5555/notaryDb",
                "Database for Party A database: jdbc:h2:tcp://localhost:5555/partyA",
                "Database for Party B database: jdbc:h2:tcp://localhost:5555/partyB",
            ]
        );
        assert_eq!(endpoints[2].endpoint.database, "partyB");
    }

    #[test]
    fn test_announce_stops_at_first_bad_url() {
        let nodes = NodeSet::new(
            NodeInfo::new("Notary", "jdbc:h2:mem:notaryDb"),
            vec![
                NodeInfo::new("Party A", "jdbc:h2:file:/tmp/partyA"),
                NodeInfo::new("Party B", "jdbc:h2:mem:partyB"),
            ],
        );
        let mut out = Vec::new();
        let err = announce_all(&nodes, "localhost", 9092, &mut out).unwrap_err();

        let AnnounceError::Extraction(e) = err else {
            panic!("expected extraction error, got {err:?}")
        };
        assert_eq!(e.url(), "jdbc:h2:file:/tmp/partyA");
        assert_eq!(lines(&out).len(), 1);
        assert!(lines(&out)[0].starts_with("Database for Notary"));
    }

    #[tokio::test]
    async fn test_start_announces_bound_port() {
        let nodes = NodeSet::new(NodeInfo::new("Notary", "jdbc:h2:mem:notaryDb"), vec![]);
        let mut out = Vec::new();
        let announcer = Announcer::start_with_output(
            &nodes,
            &local_config(),
            Arc::new(Databases::new()),
            &mut out,
        )
        .await
        .unwrap();

        let expected = format!(
            "Database for Notary database: jdbc:h2:tcp://localhost:{}/notaryDb",
            announcer.port()
        );
        assert_eq!(lines(&out), vec![expected]);
        assert_eq!(announcer.endpoints().len(), 1);
        assert!(announcer.is_running());
        announcer.stop().await;
    }

    #[tokio::test]
    async fn test_start_failure_stops_server() {
        // Reserve a port, then free it so the announcer can bind it.
        let probe = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = probe.local_addr().unwrap().port();
        drop(probe);

        let nodes = NodeSet::new(NodeInfo::new("Notary", "jdbc:h2:tcp://x/notary"), vec![]);
        let mut out = Vec::new();
        let config = ServerConfig {
            port,
            ..local_config()
        };
        let result =
            Announcer::start_with_output(&nodes, &config, Arc::new(Databases::new()), &mut out)
                .await;

        assert!(matches!(result, Err(AnnounceError::Extraction(_))));
        assert!(out.is_empty());
        assert!(TcpStream::connect(("127.0.0.1", port)).await.is_err());
    }

    #[tokio::test]
    async fn test_block_waits_for_release() {
        let nodes = NodeSet::new(NodeInfo::new("Notary", "jdbc:h2:mem:notaryDb"), vec![]);
        let announcer = Announcer::start_with_output(
            &nodes,
            &local_config(),
            Arc::new(Databases::new()),
            &mut Vec::<u8>::new(),
        )
        .await
        .unwrap();

        let blocked = tokio::time::timeout(Duration::from_millis(200), announcer.block()).await;
        assert!(blocked.is_err(), "block() returned without release");

        let release = announcer.release_handle();
        assert!(!release.is_released());
        release.release();
        tokio::time::timeout(Duration::from_secs(1), announcer.block())
            .await
            .expect("block() should return once released");
        announcer.stop().await;
    }

    #[tokio::test]
    async fn test_stop_does_not_release_block() {
        let nodes = NodeSet::new(NodeInfo::new("Notary", "jdbc:h2:mem:notaryDb"), vec![]);
        let announcer = Announcer::start_with_output(
            &nodes,
            &local_config(),
            Arc::new(Databases::new()),
            &mut Vec::<u8>::new(),
        )
        .await
        .unwrap();

        announcer.stop().await;
        announcer.stop().await;
        assert!(!announcer.is_running());
        let blocked = tokio::time::timeout(Duration::from_millis(100), announcer.block()).await;
        assert!(blocked.is_err());
    }
}
