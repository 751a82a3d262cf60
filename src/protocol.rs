//! PostgreSQL wire protocol, as far as the database server needs it.
//!
//! Covers the startup handshake and the Simple Query protocol, which is
//! enough for `psql` and most drivers to connect and run inspection queries.
//!
//! ## Architecture
//!
//! ```text
//! +----------+                           +-----------+
//! |  Client  |  --- FrontendMessage -->  | TcpServer |
//! |  (psql)  |  <-- BackendMessage  ---  |           |
//! +----------+                           +-----------+
//!               ^                   ^
//!               | StartupCodec ->   |
//!               |   PostgresCodec   |
//!               +-------------------+
//! ```
//!
//! ## Terminology
//!
//! - **StartupMessage**: handshake-phase messages (SSL, Startup, Cancel)
//! - **FrontendMessage**: query-phase messages from the client (Query, Terminate)
//! - **BackendMessage**: messages from server to client (RowDescription, DataRow, etc.)

pub mod backend;
pub mod codec;
pub mod error;
pub mod frontend;
pub mod types;

pub use backend::{BackendMessage, ErrorField, TransactionStatus};
pub use codec::{PostgresCodec, StartupCodec};
pub use error::ProtocolError;
pub use frontend::{FrontendMessage, StartupMessage, StartupParameters};
pub use types::{ErrorFieldCode, sql_state, type_oid};
