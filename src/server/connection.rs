mod error;

pub use error::ConnectionError;

use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_util::codec::Framed;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::database::MemoryDatabase;
use crate::protocol::{
    BackendMessage, FrontendMessage, PostgresCodec, TransactionStatus, sql_state,
};

/// A client session bound to one in-memory database.
pub struct Connection {
    framed: Framed<TcpStream, PostgresCodec>,
    pid: i32,
    database: Arc<MemoryDatabase>,
}

impl Connection {
    pub fn new(
        framed: Framed<TcpStream, PostgresCodec>,
        pid: i32,
        database: Arc<MemoryDatabase>,
    ) -> Self {
        Self {
            framed,
            pid,
            database,
        }
    }

    /// Serves queries until the client leaves or `cancel_token` fires.
    pub async fn run(&mut self, cancel_token: CancellationToken) -> Result<(), ConnectionError> {
        loop {
            tokio::select! {
                res = self.handle_message() => {
                    if res? {
                        return Ok(());
                    }
                }
                _ = cancel_token.cancelled() => {
                    debug!(pid = self.pid, "session cancelled");
                    return Ok(());
                }
            }
        }
    }

    /// Handle a single message from the client.
    /// Returns true if the connection should terminate.
    async fn handle_message(&mut self) -> Result<bool, ConnectionError> {
        let message = match self.framed.next().await {
            Some(Ok(msg)) => msg,
            Some(Err(e)) => {
                // Best effort; the session ends either way.
                let _ = self
                    .framed
                    .send(BackendMessage::fatal(sql_state::PROTOCOL_VIOLATION, e.to_string()))
                    .await;
                return Err(e.into());
            }
            None => return Ok(true), // EOF
        };

        match message {
            FrontendMessage::Query(query) => {
                self.handle_query(query.trim()).await?;
                Ok(false)
            }
            FrontendMessage::Terminate => Ok(true),
        }
    }

    /// Runs a Simple Query and streams the results back.
    async fn handle_query(&mut self, query: &str) -> Result<(), ConnectionError> {
        debug!(pid = self.pid, database = self.database.name(), query, "query");

        match self.database.execute(query) {
            Ok(outputs) if outputs.is_empty() => {
                self.framed.feed(BackendMessage::EmptyQueryResponse).await?;
            }
            Ok(outputs) => {
                for output in outputs {
                    let tag = output.tag();
                    self.framed
                        .feed(BackendMessage::RowDescription {
                            columns: output.columns,
                        })
                        .await?;
                    for values in output.rows {
                        self.framed.feed(BackendMessage::DataRow { values }).await?;
                    }
                    self.framed
                        .feed(BackendMessage::CommandComplete { tag })
                        .await?;
                }
            }
            Err(err) => {
                self.framed
                    .feed(BackendMessage::error(err.sql_state(), err.to_string()))
                    .await?;
            }
        }

        self.framed
            .send(BackendMessage::ReadyForQuery {
                status: TransactionStatus::Idle,
            })
            .await?;
        Ok(())
    }
}
