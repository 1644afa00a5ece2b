//! Node orchestration for the Net/ROM network stack.
//!
//! Ties link connectors, routing tables and circuit handlers together behind
//! one event loop, with TOML configuration and routing-table persistence.

pub mod config;
pub mod connector;
pub mod error;
pub mod logging;
pub mod node;
pub mod storage;
pub mod storage_codec;

pub use config::NodeConfig;
pub use connector::AnyConnector;
pub use error::NodeError;
pub use node::{Node, NodeHandle, ShutdownHandle};
pub use storage::Storage;
