//! Circuit state, sequencing and the node-wide circuit registry.

pub mod constants;
pub mod registry;
pub mod sequence;
pub mod types;
pub mod window;

pub use constants::*;
pub use registry::{CircuitInfo, CircuitRegistry};
pub use sequence::SeqNo;
pub use types::{Circuit, CircuitEndpoints, CircuitKey, CircuitRole, CircuitState, PeerLink};
pub use window::{Fragment, SendWindow};
