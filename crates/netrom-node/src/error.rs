//! Error types for the node service.

use netrom_interfaces::{InterfaceError, InterfaceId};
use netrom_protocol::CircuitError;

/// Errors that can occur during node operation.
#[derive(Debug, thiserror::Error)]
pub enum NodeError {
    #[error("configuration error: {0}")]
    Config(String),
    #[error("interface error: {0}")]
    Interface(#[from] InterfaceError),
    #[error("circuit error: {0}")]
    Circuit(#[from] CircuitError),
    #[error("storage error: {0}")]
    Storage(#[from] crate::storage::StorageError),
    #[error("no route to {0}")]
    NoRoute(String),
    #[error("no interface {0:?}")]
    UnknownInterface(InterfaceId),
    #[error("node already running")]
    AlreadyRunning,
}
