//! Classic NODES broadcast.
//!
//! ```text
//! 0xFF | sender mnemonic (6) | { dest (7, shifted) | mnemonic (6) | neighbour (7, shifted) | quality (1) }*
//! ```

use crate::callsign::{Callsign, Mnemonic};
use crate::constants::{
    BROADCAST_SIGNATURE, CALLSIGN_FIELD_LEN, CLASSIC_PREAMBLE_LEN, CLASSIC_RECORD_LEN,
    MNEMONIC_LEN,
};
use crate::error::BroadcastError;

/// One advertised destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassicEntry {
    pub destination: Callsign,
    pub mnemonic: Mnemonic,
    /// Best neighbour the sender knows for this destination.
    pub neighbour: Callsign,
    pub quality: u8,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassicBroadcast {
    pub sender_mnemonic: Mnemonic,
    pub entries: Vec<ClassicEntry>,
}

impl ClassicBroadcast {
    /// Parse a complete broadcast. A trailing partial record rejects the
    /// whole packet.
    pub fn parse(raw: &[u8]) -> Result<Self, BroadcastError> {
        if raw.first() != Some(&BROADCAST_SIGNATURE) {
            return Err(BroadcastError::MissingSignature);
        }
        if raw.len() < CLASSIC_PREAMBLE_LEN {
            return Err(BroadcastError::TruncatedRecord {
                offset: 1,
                remaining: raw.len() - 1,
            });
        }
        let sender_mnemonic = Mnemonic::from_field(&raw[1..CLASSIC_PREAMBLE_LEN])?;

        let body = &raw[CLASSIC_PREAMBLE_LEN..];
        let records = body.chunks_exact(CLASSIC_RECORD_LEN);
        if !records.remainder().is_empty() {
            let remaining = records.remainder().len();
            return Err(BroadcastError::TruncatedRecord {
                offset: raw.len() - remaining,
                remaining,
            });
        }

        let mut entries = Vec::with_capacity(body.len() / CLASSIC_RECORD_LEN);
        for record in records {
            let (dest, rest) = record.split_at(CALLSIGN_FIELD_LEN);
            let (mnemonic, rest) = rest.split_at(MNEMONIC_LEN);
            let (neighbour, quality) = rest.split_at(CALLSIGN_FIELD_LEN);
            entries.push(ClassicEntry {
                destination: Callsign::from_shifted(dest)?,
                mnemonic: Mnemonic::from_field(mnemonic)?,
                neighbour: Callsign::from_shifted(neighbour)?,
                quality: quality[0],
            });
        }

        Ok(Self {
            sender_mnemonic,
            entries,
        })
    }

    pub fn serialize(&self) -> Vec<u8> {
        let mut out =
            Vec::with_capacity(CLASSIC_PREAMBLE_LEN + self.entries.len() * CLASSIC_RECORD_LEN);
        out.push(BROADCAST_SIGNATURE);
        out.extend_from_slice(&self.sender_mnemonic.to_field());
        for entry in &self.entries {
            out.extend_from_slice(&entry.destination.to_shifted());
            out.extend_from_slice(&entry.mnemonic.to_field());
            out.extend_from_slice(&entry.neighbour.to_shifted());
            out.push(entry.quality);
        }
        out
    }
}
