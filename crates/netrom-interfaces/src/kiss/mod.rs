//! KISS TNC support: byte stuffing, AX.25 UI frames and a TCP connector.

pub mod ax25;
pub mod framing;
pub mod tcp;

pub use tcp::{KissTcpConfig, KissTcpConnector};

use std::time::Duration;

/// Wait between reconnect attempts to the TNC.
pub const RECONNECT_WAIT: Duration = Duration::from_secs(5);

/// Timeout for a single connect attempt.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Socket read buffer size.
pub const TCP_RECV_BUFFER: usize = 4096;

/// Depth of the decoded-frame queue between the read task and `receive`.
pub const FRAME_QUEUE: usize = 256;
