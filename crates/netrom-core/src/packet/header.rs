//! The 6-byte control-frame header.
//!
//! ```text
//! +-----+---------------+------------+--------+--------+-----------------+
//! | ttl | circuit index | circuit id | tx seq | rx seq | flags | opcode  |
//! +-----+---------------+------------+--------+--------+-----------------+
//!                                               bit 7 choke, 6 nak,
//!                                               5 more-follows, 0-3 opcode
//! ```

use crate::constants::{FLAG_CHOKE, FLAG_MORE_FOLLOWS, FLAG_NAK, HEADER_SIZE, OPCODE_MASK};
use crate::error::PacketError;

/// The closed set of circuit opcodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Opcode {
    ConnectRequest = 1,
    ConnectAck = 2,
    DisconnectRequest = 3,
    DisconnectAck = 4,
    Information = 5,
    InformationAck = 6,
    Reset = 7,
}

impl Opcode {
    /// Convert from the masked 4-bit opcode field.
    pub fn from_nibble(v: u8) -> Option<Self> {
        match v {
            1 => Some(Opcode::ConnectRequest),
            2 => Some(Opcode::ConnectAck),
            3 => Some(Opcode::DisconnectRequest),
            4 => Some(Opcode::DisconnectAck),
            5 => Some(Opcode::Information),
            6 => Some(Opcode::InformationAck),
            7 => Some(Opcode::Reset),
            _ => None,
        }
    }

    pub fn to_u8(self) -> u8 {
        self as u8
    }
}

/// Flow-control flags carried in the opcode byte.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameFlags {
    pub choke: bool,
    pub nak: bool,
    pub more_follows: bool,
}

impl FrameFlags {
    pub fn from_byte(b: u8) -> Self {
        Self {
            choke: b & FLAG_CHOKE != 0,
            nak: b & FLAG_NAK != 0,
            more_follows: b & FLAG_MORE_FOLLOWS != 0,
        }
    }

    pub fn to_bits(self) -> u8 {
        let mut bits = 0;
        if self.choke {
            bits |= FLAG_CHOKE;
        }
        if self.nak {
            bits |= FLAG_NAK;
        }
        if self.more_follows {
            bits |= FLAG_MORE_FOLLOWS;
        }
        bits
    }
}

/// A decoded control-frame header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacketHeader {
    pub ttl: u8,
    pub circuit_index: u8,
    pub circuit_id: u8,
    pub tx_seq: u8,
    pub rx_seq: u8,
    /// Raw opcode byte, flags included.
    pub opcode_byte: u8,
}

impl PacketHeader {
    /// Decode the first [`HEADER_SIZE`] bytes of `raw`.
    pub fn parse(raw: &[u8]) -> Result<Self, PacketError> {
        if raw.len() < HEADER_SIZE {
            return Err(PacketError::TooShort {
                min: HEADER_SIZE,
                actual: raw.len(),
            });
        }
        Ok(Self {
            ttl: raw[0],
            circuit_index: raw[1],
            circuit_id: raw[2],
            tx_seq: raw[3],
            rx_seq: raw[4],
            opcode_byte: raw[5],
        })
    }

    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        [
            self.ttl,
            self.circuit_index,
            self.circuit_id,
            self.tx_seq,
            self.rx_seq,
            self.opcode_byte,
        ]
    }

    /// The opcode in the low nibble.
    pub fn opcode(&self) -> Result<Opcode, PacketError> {
        let nibble = self.opcode_byte & OPCODE_MASK;
        Opcode::from_nibble(nibble).ok_or(PacketError::UnknownOpcode(nibble))
    }

    pub fn flags(&self) -> FrameFlags {
        FrameFlags::from_byte(self.opcode_byte)
    }

    /// Refusal indicator on CONNECT_ACK: the raw opcode byte exceeds 127.
    pub fn is_refused(&self) -> bool {
        self.opcode_byte > 127
    }
}
