use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio_util::codec::Framed;
use tracing::debug;

use crate::database::{DatabaseError, Databases, MemoryDatabase};
use crate::protocol::{
    BackendMessage, PostgresCodec, StartupCodec, StartupMessage, TransactionStatus,
};
use crate::server::connection::ConnectionError;

pub enum HandshakeResult {
    /// Startup completed; the session talks to `database`.
    Success {
        framed: Framed<TcpStream, PostgresCodec>,
        database: Arc<MemoryDatabase>,
        secret_key: i32,
    },
    /// Handshake was a CancelRequest.
    CancelRequested { pid: i32, secret_key: i32 },
    /// Requested database is not registered; a FATAL error was sent.
    Rejected { database: String },
}

/// Startup phase of a single client connection.
///
/// There is no authentication: any user may open any registered database.
pub struct Handshake {
    framed: Framed<TcpStream, StartupCodec>,
    pid: i32,
    databases: Arc<Databases>,
}

impl Handshake {
    pub fn new(socket: TcpStream, pid: i32, databases: Arc<Databases>) -> Self {
        Self {
            framed: Framed::new(socket, StartupCodec::new()),
            pid,
            databases,
        }
    }

    pub async fn run(mut self) -> Result<HandshakeResult, ConnectionError> {
        loop {
            let Some(message) = self.framed.next().await else {
                return Err(ConnectionError::Closed);
            };

            match message? {
                StartupMessage::SslRequest | StartupMessage::GssEncRequest => {
                    // 'N': continue unencrypted
                    self.framed.get_mut().write_all(b"N").await?;
                    self.framed.get_mut().flush().await?;
                }
                StartupMessage::Startup { parameters, .. } => {
                    let name = parameters.database_name().to_string();
                    debug!(pid = self.pid, user = %parameters.user, database = %name, "startup");

                    let Some(database) = self.databases.get(&name) else {
                        let err = DatabaseError::DatabaseNotFound { name: name.clone() };
                        self.framed
                            .send(BackendMessage::fatal(err.sql_state(), err.to_string()))
                            .await?;
                        return Ok(HandshakeResult::Rejected { database: name });
                    };

                    let secret_key = rand::random::<i32>();
                    self.send_startup_info(secret_key).await?;

                    return Ok(HandshakeResult::Success {
                        framed: self.framed.map_codec(StartupCodec::ready),
                        database,
                        secret_key,
                    });
                }
                StartupMessage::CancelRequest {
                    process_id,
                    secret_key,
                } => {
                    return Ok(HandshakeResult::CancelRequested {
                        pid: process_id,
                        secret_key,
                    });
                }
            }
        }
    }

    async fn send_startup_info(&mut self, secret_key: i32) -> Result<(), ConnectionError> {
        self.framed.feed(BackendMessage::AuthenticationOk).await?;
        self.framed
            .feed(BackendMessage::BackendKeyData {
                process_id: self.pid,
                secret_key,
            })
            .await?;

        let params = [
            ("server_version", "16.0"),
            ("server_encoding", "UTF8"),
            ("client_encoding", "UTF8"),
            ("DateStyle", "ISO, MDY"),
            ("TimeZone", "UTC"),
            ("integer_datetimes", "on"),
            ("standard_conforming_strings", "on"),
        ];
        for (name, value) in params {
            self.framed
                .feed(BackendMessage::ParameterStatus {
                    name: name.to_string(),
                    value: value.to_string(),
                })
                .await?;
        }

        self.framed
            .send(BackendMessage::ReadyForQuery {
                status: TransactionStatus::Idle,
            })
            .await?;
        Ok(())
    }
}
