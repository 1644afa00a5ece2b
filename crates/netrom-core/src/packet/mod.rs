//! Circuit control frames: the fixed header and the typed frame bodies.

pub mod frame;
pub mod header;
