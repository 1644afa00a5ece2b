//! Typed circuit control frames.
//!
//! Index/id placement differs per opcode. CONNECT_REQUEST carries the sender's
//! own circuit in the header; CONNECT_ACK carries the recipient's circuit in
//! the header and the sender's in the tx/rx sequence slots; every other opcode
//! addresses the recipient's circuit.

use crate::callsign::Callsign;
use crate::constants::{
    CALLSIGN_FIELD_LEN, CONNECT_NODE_OFFSET, CONNECT_REQUEST_BODY_LEN, CONNECT_USER_OFFSET,
    FLAG_CHOKE, HEADER_SIZE,
};
use crate::error::PacketError;
use crate::packet::header::{FrameFlags, Opcode, PacketHeader};

/// Body of a CONNECT_REQUEST.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectRequest {
    /// Sender's own circuit index.
    pub circuit_index: u8,
    /// Sender's own circuit id.
    pub circuit_id: u8,
    /// Proposed window size.
    pub window: u8,
    /// Originating user.
    pub user: Callsign,
    /// Originating node.
    pub node: Callsign,
}

/// A decoded circuit control frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlFrame {
    ConnectRequest(ConnectRequest),
    ConnectAck {
        your_index: u8,
        your_id: u8,
        my_index: u8,
        my_id: u8,
        /// Granted window; 0 when the body omitted it.
        window: u8,
        refused: bool,
    },
    DisconnectRequest {
        your_index: u8,
        your_id: u8,
    },
    DisconnectAck {
        your_index: u8,
        your_id: u8,
    },
    Information {
        your_index: u8,
        your_id: u8,
        tx_seq: u8,
        /// Piggy-backed acknowledgement: next sequence the sender expects.
        rx_seq: u8,
        flags: FrameFlags,
        payload: Vec<u8>,
    },
    InformationAck {
        your_index: u8,
        your_id: u8,
        rx_seq: u8,
        flags: FrameFlags,
    },
    Reset {
        your_index: u8,
        your_id: u8,
    },
}

impl ControlFrame {
    pub fn opcode(&self) -> Opcode {
        match self {
            ControlFrame::ConnectRequest(_) => Opcode::ConnectRequest,
            ControlFrame::ConnectAck { .. } => Opcode::ConnectAck,
            ControlFrame::DisconnectRequest { .. } => Opcode::DisconnectRequest,
            ControlFrame::DisconnectAck { .. } => Opcode::DisconnectAck,
            ControlFrame::Information { .. } => Opcode::Information,
            ControlFrame::InformationAck { .. } => Opcode::InformationAck,
            ControlFrame::Reset { .. } => Opcode::Reset,
        }
    }

    /// The circuit the header addresses, as `(index, id)`.
    pub fn addressed_circuit(&self) -> (u8, u8) {
        match self {
            ControlFrame::ConnectRequest(req) => (req.circuit_index, req.circuit_id),
            ControlFrame::ConnectAck {
                your_index, your_id, ..
            }
            | ControlFrame::DisconnectRequest { your_index, your_id }
            | ControlFrame::DisconnectAck { your_index, your_id }
            | ControlFrame::Information {
                your_index, your_id, ..
            }
            | ControlFrame::InformationAck {
                your_index, your_id, ..
            }
            | ControlFrame::Reset { your_index, your_id } => (*your_index, *your_id),
        }
    }
}

/// A control frame plus its network time-to-live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    pub ttl: u8,
    pub frame: ControlFrame,
}

impl Packet {
    pub fn new(ttl: u8, frame: ControlFrame) -> Self {
        Self { ttl, frame }
    }

    /// Decode a complete control frame.
    pub fn parse(raw: &[u8]) -> Result<Self, PacketError> {
        let header = PacketHeader::parse(raw)?;
        let body = &raw[HEADER_SIZE..];
        let your_index = header.circuit_index;
        let your_id = header.circuit_id;

        let frame = match header.opcode()? {
            Opcode::ConnectRequest => {
                if body.len() < CONNECT_REQUEST_BODY_LEN {
                    return Err(PacketError::TooShort {
                        min: HEADER_SIZE + CONNECT_REQUEST_BODY_LEN,
                        actual: raw.len(),
                    });
                }
                let user = Callsign::from_shifted(
                    &body[CONNECT_USER_OFFSET..CONNECT_USER_OFFSET + CALLSIGN_FIELD_LEN],
                )?;
                let node = Callsign::from_shifted(
                    &body[CONNECT_NODE_OFFSET..CONNECT_NODE_OFFSET + CALLSIGN_FIELD_LEN],
                )?;
                ControlFrame::ConnectRequest(ConnectRequest {
                    circuit_index: your_index,
                    circuit_id: your_id,
                    window: body[0],
                    user,
                    node,
                })
            }
            Opcode::ConnectAck => ControlFrame::ConnectAck {
                your_index,
                your_id,
                my_index: header.tx_seq,
                my_id: header.rx_seq,
                window: body.first().copied().unwrap_or(0),
                refused: header.is_refused(),
            },
            Opcode::DisconnectRequest => ControlFrame::DisconnectRequest { your_index, your_id },
            Opcode::DisconnectAck => ControlFrame::DisconnectAck { your_index, your_id },
            Opcode::Information => ControlFrame::Information {
                your_index,
                your_id,
                tx_seq: header.tx_seq,
                rx_seq: header.rx_seq,
                flags: header.flags(),
                payload: body.to_vec(),
            },
            Opcode::InformationAck => ControlFrame::InformationAck {
                your_index,
                your_id,
                rx_seq: header.rx_seq,
                flags: header.flags(),
            },
            Opcode::Reset => ControlFrame::Reset { your_index, your_id },
        };

        Ok(Self {
            ttl: header.ttl,
            frame,
        })
    }

    /// Encode to wire bytes.
    pub fn serialize(&self) -> Vec<u8> {
        let (index, id) = self.frame.addressed_circuit();
        let opcode = self.frame.opcode().to_u8();
        let mut header = PacketHeader {
            ttl: self.ttl,
            circuit_index: index,
            circuit_id: id,
            tx_seq: 0,
            rx_seq: 0,
            opcode_byte: opcode,
        };
        let mut body = Vec::new();

        match &self.frame {
            ControlFrame::ConnectRequest(req) => {
                body.resize(CONNECT_REQUEST_BODY_LEN, 0);
                body[0] = req.window;
                body[CONNECT_USER_OFFSET..CONNECT_USER_OFFSET + CALLSIGN_FIELD_LEN]
                    .copy_from_slice(&req.user.to_shifted());
                body[CONNECT_NODE_OFFSET..CONNECT_NODE_OFFSET + CALLSIGN_FIELD_LEN]
                    .copy_from_slice(&req.node.to_shifted());
            }
            ControlFrame::ConnectAck {
                my_index,
                my_id,
                window,
                refused,
                ..
            } => {
                header.tx_seq = *my_index;
                header.rx_seq = *my_id;
                if *refused {
                    header.opcode_byte |= FLAG_CHOKE;
                }
                body.push(*window);
            }
            ControlFrame::Information {
                tx_seq,
                rx_seq,
                flags,
                payload,
                ..
            } => {
                header.tx_seq = *tx_seq;
                header.rx_seq = *rx_seq;
                header.opcode_byte |= flags.to_bits();
                body.extend_from_slice(payload);
            }
            ControlFrame::InformationAck { rx_seq, flags, .. } => {
                header.rx_seq = *rx_seq;
                header.opcode_byte |= flags.to_bits();
            }
            ControlFrame::DisconnectRequest { .. }
            | ControlFrame::DisconnectAck { .. }
            | ControlFrame::Reset { .. } => {}
        }

        let mut out = Vec::with_capacity(HEADER_SIZE + body.len());
        out.extend_from_slice(&header.to_bytes());
        out.extend_from_slice(&body);
        out
    }
}
