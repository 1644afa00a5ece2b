//! The link-layer collaborator seen by the node.

use std::future::Future;

use netrom_core::Callsign;
use netrom_core::constants::PID_NETROM;
use netrom_transport::InterfaceId;

use crate::error::InterfaceError;
use crate::session::Session;

/// An unconnected (UI) AX.25 frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkFrame {
    pub source: Callsign,
    pub destination: Callsign,
    pub pid: u8,
    pub payload: Vec<u8>,
}

impl LinkFrame {
    /// A Net/ROM frame from `source` to `destination`.
    pub fn netrom(source: Callsign, destination: Callsign, payload: Vec<u8>) -> Self {
        Self {
            source,
            destination,
            pid: PID_NETROM,
            payload,
        }
    }

    pub fn is_netrom(&self) -> bool {
        self.pid == PID_NETROM
    }
}

/// What a connector hands to the node.
#[derive(Debug)]
pub enum LinkEvent {
    /// A UI frame arrived.
    Frame(LinkFrame),
    /// A remote station opened a connected-mode session to us.
    SessionAccepted(Session),
}

/// A link-layer connector: one radio port, TNC or in-memory link.
///
/// Connectors own their background tasks. `start` spawns them and `stop`
/// signals and joins them; both are idempotent.
pub trait LinkConnector: Send + Sync {
    /// Human-readable name from configuration.
    fn name(&self) -> &str;

    fn id(&self) -> InterfaceId;

    /// The station callsign this connector transmits as.
    fn local_callsign(&self) -> &Callsign;

    fn is_connected(&self) -> bool;

    fn start(&self) -> impl Future<Output = Result<(), InterfaceError>> + Send;

    fn stop(&self) -> impl Future<Output = Result<(), InterfaceError>> + Send;

    /// Transmit one UI frame as-is.
    fn send_frame(&self, frame: LinkFrame)
    -> impl Future<Output = Result<(), InterfaceError>> + Send;

    /// Transmit `payload` as a Net/ROM UI frame from our own callsign.
    fn send_ui(
        &self,
        destination: &Callsign,
        payload: &[u8],
    ) -> impl Future<Output = Result<(), InterfaceError>> + Send {
        let frame = LinkFrame::netrom(
            self.local_callsign().clone(),
            destination.clone(),
            payload.to_vec(),
        );
        self.send_frame(frame)
    }

    /// Open a connected-mode session to `neighbour`.
    fn open_session(
        &self,
        neighbour: &Callsign,
    ) -> impl Future<Output = Result<Session, InterfaceError>> + Send;

    /// Wait for the next inbound event. `Stopped` once the connector is down.
    fn receive(&self) -> impl Future<Output = Result<LinkEvent, InterfaceError>> + Send;
}
