//! Error types for link connectors.

use netrom_core::{Callsign, CallsignError};

/// Errors from KISS or AX.25 frame decoding.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum FramingError {
    #[error("frame too short: need at least {min} bytes, got {actual}")]
    TooShort { min: usize, actual: usize },

    #[error("escape byte at end of frame")]
    IncompleteEscape,

    #[error("invalid escape sequence: FESC {0:#04x}")]
    InvalidEscape(u8),

    #[error("address field is not terminated")]
    UnterminatedAddress,

    #[error("not a UI frame (control byte {0:#04x})")]
    NotUiFrame(u8),

    #[error("invalid address: {0}")]
    Address(#[from] CallsignError),
}

/// Errors that can occur on a link connector.
#[derive(Debug, thiserror::Error)]
pub enum InterfaceError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("framing error: {0}")]
    Framing(#[from] FramingError),

    #[error("connector not connected")]
    NotConnected,

    #[error("connector stopped")]
    Stopped,

    #[error("connected-mode sessions not supported by {0}")]
    SessionsUnsupported(String),

    #[error("no station {0} reachable on this link")]
    UnknownStation(Callsign),

    #[error("configuration error: {0}")]
    Configuration(String),
}
