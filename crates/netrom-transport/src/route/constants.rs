//! Route table constants.

/// Route lifetime after it was last heard (2 hours in seconds).
pub const ROUTE_TTL: u64 = 60 * 60 * 2; // 7200
