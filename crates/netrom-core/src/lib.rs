//! Core types and wire formats for the Net/ROM network stack.
//!
//! This crate defines callsigns and node mnemonics, the control-frame header
//! and typed control frames exchanged between circuit endpoints, and the two
//! routing-broadcast dialects (classic NODES and INP3) that nodes use to
//! advertise reachability.

pub mod broadcast;
pub mod callsign;
pub mod constants;
pub mod error;
pub mod packet;

pub use broadcast::{
    ClassicBroadcast, ClassicEntry, Dialect, Inp3Broadcast, Inp3Entry, Inp3Option,
    Inp3OptionType, RoutingBroadcast,
};
pub use callsign::{Callsign, Mnemonic};
pub use error::{BroadcastError, CallsignError, PacketError};
pub use packet::frame::{ConnectRequest, ControlFrame, Packet};
pub use packet::header::{FrameFlags, Opcode, PacketHeader};
