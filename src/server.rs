//! TCP database server for in-memory node databases.
//!
//! ## Architecture
//!
//! ```text
//! +-----------+
//! | TcpServer |  <- Accepts TCP connections until shutdown
//! +-----------+
//!      |
//!      v
//! +-----------+     +-----------+
//! | Handshake | --> | Databases |  <- startup `database` parameter picks one
//! +-----------+     +-----------+
//!      |
//!      v
//! +------------+
//! | Connection |  <- Simple Query loop against one MemoryDatabase
//! +------------+
//!      |
//!      v
//! +----------+
//! | Registry |  <- Session tokens for cancel requests and shutdown
//! +----------+
//! ```
//!
//! ## Terminology
//!
//! - **TcpServer**: listener plus accept loop
//! - **ServerHandle**: owner-side handle used to stop the server
//! - **Connection**: per-client session
//! - **Registry**: live sessions, each with a cancellation token

pub mod connection;
pub mod handshake;
pub mod listener;
pub mod registry;

pub use listener::{ServerHandle, TcpServer};
