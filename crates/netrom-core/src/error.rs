//! Error types for the netrom-core crate.

use core::fmt;

/// Errors raised when building or decoding a callsign or mnemonic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallsignError {
    Empty,
    TooLong { max: usize, actual: usize },
    InvalidCharacter(char),
    InvalidSsid(u8),
    FieldLength { expected: usize, actual: usize },
}

impl fmt::Display for CallsignError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CallsignError::Empty => write!(f, "callsign is empty"),
            CallsignError::TooLong { max, actual } => {
                write!(f, "too long: at most {max} characters, got {actual}")
            }
            CallsignError::InvalidCharacter(c) => write!(f, "invalid character: {c:?}"),
            CallsignError::InvalidSsid(v) => write!(f, "invalid SSID: {v}"),
            CallsignError::FieldLength { expected, actual } => {
                write!(f, "field length: expected {expected} bytes, got {actual}")
            }
        }
    }
}

impl std::error::Error for CallsignError {}

/// Errors raised while decoding a circuit control frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PacketError {
    TooShort { min: usize, actual: usize },
    UnknownOpcode(u8),
    InvalidCallsign(CallsignError),
}

impl fmt::Display for PacketError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PacketError::TooShort { min, actual } => {
                write!(
                    f,
                    "packet too short: need at least {min} bytes, got {actual}"
                )
            }
            PacketError::UnknownOpcode(v) => write!(f, "unknown opcode: {v}"),
            PacketError::InvalidCallsign(e) => write!(f, "invalid callsign: {e}"),
        }
    }
}

impl From<CallsignError> for PacketError {
    fn from(e: CallsignError) -> Self {
        PacketError::InvalidCallsign(e)
    }
}

impl std::error::Error for PacketError {}

/// A routing broadcast that could not be trusted.
///
/// Any of these discards every route carried by the packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BroadcastError {
    MissingSignature,
    TruncatedRecord { offset: usize, remaining: usize },
    MissingTerminator { offset: usize },
    OptionOverrun {
        offset: usize,
        length: usize,
        remaining: usize,
    },
    InvalidCallsign(CallsignError),
}

impl fmt::Display for BroadcastError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BroadcastError::MissingSignature => write!(f, "missing 0xFF broadcast signature"),
            BroadcastError::TruncatedRecord { offset, remaining } => {
                write!(
                    f,
                    "truncated record at offset {offset}: {remaining} bytes remaining"
                )
            }
            BroadcastError::MissingTerminator { offset } => {
                write!(f, "missing option terminator after offset {offset}")
            }
            BroadcastError::OptionOverrun {
                offset,
                length,
                remaining,
            } => {
                write!(
                    f,
                    "option at offset {offset} claims {length} bytes, {remaining} remaining"
                )
            }
            BroadcastError::InvalidCallsign(e) => write!(f, "invalid callsign: {e}"),
        }
    }
}

impl From<CallsignError> for BroadcastError {
    fn from(e: CallsignError) -> Self {
        BroadcastError::InvalidCallsign(e)
    }
}

impl std::error::Error for BroadcastError {}
