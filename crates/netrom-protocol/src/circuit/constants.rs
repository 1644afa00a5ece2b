//! Circuit constants.

pub use netrom_core::constants::{DEFAULT_TTL, DEFAULT_WINDOW, MAX_INFO_PAYLOAD, SEQ_MODULUS};

/// Lowest packed circuit key handed out (id 1, index 1).
pub const FIRST_CIRCUIT_KEY: u16 = 257;

/// Exclusive upper bound of the packed key space.
pub const CIRCUIT_KEY_LIMIT: u16 = 65535;

/// Number of circuits a node can hold at once.
pub const MAX_CIRCUITS: usize = (CIRCUIT_KEY_LIMIT - FIRST_CIRCUIT_KEY) as usize; // 65278

/// Largest logical message reassembled from more-follows fragments.
pub const MAX_REASSEMBLY: usize = 32 * MAX_INFO_PAYLOAD;
