//! In-memory databases owned by simulated nodes.
//!
//! ## Architecture
//!
//! ```text
//! +-----------+   name    +----------------+
//! | Databases | --------> | MemoryDatabase |  <- tables of text rows
//! +-----------+           +----------------+
//!       ^                         |
//!       | resolve                 | execute
//!       |                         v
//! +-----------+           +----------------+
//! | TcpServer |           |     query      |  <- SHOW TABLES / SELECT
//! +-----------+           +----------------+
//! ```
//!
//! ## Terminology
//!
//! - **Databases**: the process-local `mem:` namespace
//! - **MemoryDatabase**: one node's database, addressed by name
//! - **QueryOutput**: columns and rows produced by one statement

mod error;
mod memory;
pub mod query;
mod registry;

pub use error::DatabaseError;
pub use memory::{MemoryDatabase, QueryOutput, Table};
pub use registry::Databases;
