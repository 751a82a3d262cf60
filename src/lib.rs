pub mod announcer;
pub mod config;
pub mod database;
pub mod endpoint;
pub mod logging;
pub mod node;
pub mod protocol;
pub mod server;

pub use announcer::{AnnounceError, AnnouncedEndpoint, Announcer, BlockRelease};
pub use config::{Config, ServerConfig};
pub use database::{Databases, MemoryDatabase};
pub use node::{NodeInfo, NodeReference, NodeSet, Role};
