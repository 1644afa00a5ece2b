//! Virtual circuits for the Net/ROM network stack.
//!
//! This crate implements circuit allocation and sequencing, the windowed
//! send path with choke and NAK handling, and the per-session protocol
//! handler that drives circuits through connect, data transfer and
//! disconnect.

pub mod circuit;
pub mod error;
pub mod handler;

pub use circuit::{
    Circuit, CircuitInfo, CircuitKey, CircuitRegistry, CircuitRole, CircuitState, PeerLink,
    SendWindow, SeqNo,
};
pub use error::{CircuitError, HandlerExit};
pub use handler::{
    AcceptAll, AdmissionPolicy, CircuitEvent, CircuitHandler, CircuitStream, HandlerConfig,
    RejectAll, open_circuit,
};
