//! Link-layer collaborators for the Net/ROM stack.
//!
//! A [`LinkConnector`] delivers AX.25 UI frames (routing broadcasts) and
//! connected-mode [`Session`]s to the node, and accepts frames and session
//! requests going the other way. Two connectors ship here: an in-memory
//! [`LoopbackConnector`] and a [`KissTcpConnector`] for KISS TNCs reachable
//! over TCP.

pub mod error;
pub mod kiss;
pub mod loopback;
pub mod session;
pub mod shutdown;
pub mod traits;

pub use error::{FramingError, InterfaceError};
pub use kiss::{KissTcpConfig, KissTcpConnector};
pub use loopback::{LoopbackConnector, LoopbackHub};
pub use session::Session;
pub use shutdown::ShutdownToken;
pub use traits::{LinkConnector, LinkEvent, LinkFrame};

pub use netrom_transport::InterfaceId;
