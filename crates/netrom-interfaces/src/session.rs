//! Connected-mode sessions between two stations.

use std::sync::atomic::{AtomicU64, Ordering};

use netrom_core::Callsign;
use netrom_transport::InterfaceId;
use tokio::sync::mpsc;

static NEXT_SESSION_ID: AtomicU64 = AtomicU64::new(1);

/// One AX.25 connected-mode session, already framed.
///
/// Inbound frames arrive on a bounded channel; outbound frames go on an
/// unbounded one so that senders holding a lock never wait. The session ends
/// when the inbound channel closes.
pub struct Session {
    id: u64,
    interface: InterfaceId,
    base: Callsign,
    source: Callsign,
    destination: Callsign,
    inbound: mpsc::Receiver<Vec<u8>>,
    outbound: mpsc::UnboundedSender<Vec<u8>>,
}

impl Session {
    /// `base` is our own station; `source` opened the session to
    /// `destination`.
    pub fn new(
        interface: InterfaceId,
        base: Callsign,
        source: Callsign,
        destination: Callsign,
        inbound: mpsc::Receiver<Vec<u8>>,
        outbound: mpsc::UnboundedSender<Vec<u8>>,
    ) -> Self {
        Self {
            id: NEXT_SESSION_ID.fetch_add(1, Ordering::Relaxed),
            interface,
            base,
            source,
            destination,
            inbound,
            outbound,
        }
    }

    /// Process-unique session id.
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn interface(&self) -> InterfaceId {
        self.interface
    }

    pub fn base(&self) -> &Callsign {
        &self.base
    }

    pub fn source(&self) -> &Callsign {
        &self.source
    }

    pub fn destination(&self) -> &Callsign {
        &self.destination
    }

    /// The station at the other end.
    pub fn peer(&self) -> &Callsign {
        if self.source == self.base {
            &self.destination
        } else {
            &self.source
        }
    }

    /// A sender for frames toward the peer.
    pub fn outbound(&self) -> mpsc::UnboundedSender<Vec<u8>> {
        self.outbound.clone()
    }

    /// Split into the inbound receiver and outbound sender.
    pub fn into_parts(self) -> (mpsc::Receiver<Vec<u8>>, mpsc::UnboundedSender<Vec<u8>>) {
        (self.inbound, self.outbound)
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("interface", &self.interface)
            .field("source", &self.source)
            .field("destination", &self.destination)
            .finish_non_exhaustive()
    }
}
