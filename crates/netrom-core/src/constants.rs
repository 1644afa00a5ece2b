//! Protocol constants shared across the Net/ROM stack.

/// Size of the control-frame header in bytes.
pub const HEADER_SIZE: usize = 6;

/// Length of an AX.25 shifted callsign field (6 characters + SSID byte).
pub const CALLSIGN_FIELD_LEN: usize = 7;

/// Maximum number of characters in a base callsign.
pub const CALLSIGN_MAX_CHARS: usize = 6;

/// Highest SSID an AX.25 address can carry.
pub const SSID_MAX: u8 = 15;

/// Length of a node mnemonic (alias) field.
pub const MNEMONIC_LEN: usize = 6;

/// First byte of every routing broadcast, in both dialects.
pub const BROADCAST_SIGNATURE: u8 = 0xFF;

/// Trailing byte that marks an INP3 broadcast and ends each of its option lists.
pub const INP3_TERMINATOR: u8 = 0x00;

/// Classic NODES record: destination(7) + mnemonic(6) + neighbour(7) + quality(1).
pub const CLASSIC_RECORD_LEN: usize = CALLSIGN_FIELD_LEN + MNEMONIC_LEN + CALLSIGN_FIELD_LEN + 1;

/// Classic NODES preamble: signature(1) + sending node mnemonic(6).
pub const CLASSIC_PREAMBLE_LEN: usize = 1 + MNEMONIC_LEN;

/// INP3 fixed part of a route: destination(7) + hops(1) + trip time(2).
pub const INP3_FIXED_LEN: usize = CALLSIGN_FIELD_LEN + 1 + 2;

/// INP3 option type carrying the destination alias.
pub const INP3_OPTION_ALIAS: u8 = 0x00;

/// INP3 option type carrying an IP address.
pub const INP3_OPTION_IP: u8 = 0x01;

/// Best possible classic route quality.
pub const MAX_QUALITY: u8 = 255;

/// AX.25 destination used for routing broadcasts.
pub const NODES_DESTINATION: &str = "NODES";

/// AX.25 protocol identifier for Net/ROM.
pub const PID_NETROM: u8 = 0xCF;

/// Default initial network time-to-live.
pub const DEFAULT_TTL: u8 = 16;

/// Default window size proposed and granted on connect.
pub const DEFAULT_WINDOW: u8 = 4;

/// Sequence numbers are 7-bit.
pub const SEQ_MODULUS: u8 = 128;

/// Largest payload carried by a single INFORMATION frame.
pub const MAX_INFO_PAYLOAD: usize = 236;

// ---- Opcode byte layout ----

/// Choke flag: the sender asks its peer to stop sending.
pub const FLAG_CHOKE: u8 = 0x80;

/// NAK flag: the sender asks for a selective retransmission.
pub const FLAG_NAK: u8 = 0x40;

/// More-follows flag: the payload continues in the next frame.
pub const FLAG_MORE_FOLLOWS: u8 = 0x20;

/// Mask for the 4-bit opcode field.
pub const OPCODE_MASK: u8 = 0x0F;

// ---- CONNECT_REQUEST body ----

/// Offset of the originating user callsign in a CONNECT_REQUEST body.
pub const CONNECT_USER_OFFSET: usize = 7;

/// Offset of the originating node callsign in a CONNECT_REQUEST body.
pub const CONNECT_NODE_OFFSET: usize = 14;

/// Minimum CONNECT_REQUEST body length.
pub const CONNECT_REQUEST_BODY_LEN: usize = CONNECT_NODE_OFFSET + CALLSIGN_FIELD_LEN;
