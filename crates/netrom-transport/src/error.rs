//! Routing layer error types.

use netrom_core::BroadcastError;

#[derive(Debug, thiserror::Error)]
pub enum RouteError {
    #[error("corrupt routing broadcast: {0}")]
    CorruptBroadcast(#[from] BroadcastError),
}
