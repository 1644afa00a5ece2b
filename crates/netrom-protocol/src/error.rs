//! Circuit layer error types.

use netrom_core::PacketError;

#[derive(Debug, thiserror::Error)]
pub enum CircuitError {
    #[error("no free circuit identifiers")]
    Exhausted,

    #[error("transport closed")]
    TransportClosed,

    #[error("connection refused by peer")]
    Refused,

    #[error("circuit is not connected")]
    NotConnected,

    #[error("packet error: {0}")]
    PacketError(#[from] PacketError),
}

/// Why a session's dispatch task ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum HandlerExit {
    #[error("transport closed")]
    TransportClosed,

    #[error("stopped")]
    Stopped,
}
