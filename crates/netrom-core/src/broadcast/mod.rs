//! Routing broadcasts in the two competing dialects.
//!
//! Both dialects open with a `0xFF` signature byte. The final byte tells them
//! apart: INP3 records always end in a `0x00` option terminator, classic
//! records end in a quality byte.

pub mod classic;
pub mod inp3;

pub use classic::{ClassicBroadcast, ClassicEntry};
pub use inp3::{Inp3Broadcast, Inp3Entry, Inp3Option, Inp3OptionType};

use crate::constants::{BROADCAST_SIGNATURE, INP3_TERMINATOR};
use crate::error::BroadcastError;

/// Wire dialect of a routing broadcast.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dialect {
    Classic,
    Inp3,
}

/// A decoded routing broadcast.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoutingBroadcast {
    Classic(ClassicBroadcast),
    Inp3(Inp3Broadcast),
}

impl RoutingBroadcast {
    pub fn dialect(&self) -> Dialect {
        match self {
            RoutingBroadcast::Classic(_) => Dialect::Classic,
            RoutingBroadcast::Inp3(_) => Dialect::Inp3,
        }
    }

    /// Decode a UI payload.
    ///
    /// `Ok(None)` means the payload is not a routing broadcast at all. An
    /// error means it claimed to be one but could not be trusted.
    pub fn decode(raw: &[u8]) -> Result<Option<Self>, BroadcastError> {
        match classify(raw) {
            None => Ok(None),
            Some(Dialect::Classic) => ClassicBroadcast::parse(raw).map(|b| Some(Self::Classic(b))),
            Some(Dialect::Inp3) => Inp3Broadcast::parse(raw).map(|b| Some(Self::Inp3(b))),
        }
    }

    pub fn serialize(&self) -> Vec<u8> {
        match self {
            RoutingBroadcast::Classic(b) => b.serialize(),
            RoutingBroadcast::Inp3(b) => b.serialize(),
        }
    }
}

/// Classify a UI payload by its signature and trailing byte.
pub fn classify(raw: &[u8]) -> Option<Dialect> {
    match (raw.first(), raw.last()) {
        (Some(&BROADCAST_SIGNATURE), Some(&INP3_TERMINATOR)) => Some(Dialect::Inp3),
        (Some(&BROADCAST_SIGNATURE), Some(_)) => Some(Dialect::Classic),
        _ => None,
    }
}
