//! Static dispatch over the connector types a node can run.

use netrom_core::Callsign;
use netrom_interfaces::{
    InterfaceError, InterfaceId, KissTcpConnector, LinkConnector, LinkEvent, LoopbackConnector,
    Session,
};

/// Every concrete connector, dispatched by `match`.
pub enum AnyConnector {
    Loopback(LoopbackConnector),
    KissTcp(KissTcpConnector),
}

macro_rules! delegate {
    ($self:ident, $method:ident $(, $arg:expr)*) => {
        match $self {
            Self::Loopback(c) => c.$method($($arg),*),
            Self::KissTcp(c) => c.$method($($arg),*),
        }
    };
}

impl AnyConnector {
    pub fn name(&self) -> &str {
        delegate!(self, name)
    }

    pub fn id(&self) -> InterfaceId {
        delegate!(self, id)
    }

    pub fn local_callsign(&self) -> &Callsign {
        delegate!(self, local_callsign)
    }

    pub fn is_connected(&self) -> bool {
        delegate!(self, is_connected)
    }

    pub async fn start(&self) -> Result<(), InterfaceError> {
        match self {
            Self::Loopback(c) => c.start().await,
            Self::KissTcp(c) => c.start().await,
        }
    }

    pub async fn stop(&self) -> Result<(), InterfaceError> {
        match self {
            Self::Loopback(c) => c.stop().await,
            Self::KissTcp(c) => c.stop().await,
        }
    }

    pub async fn send_ui(&self, destination: &Callsign, payload: &[u8]) -> Result<(), InterfaceError> {
        match self {
            Self::Loopback(c) => c.send_ui(destination, payload).await,
            Self::KissTcp(c) => c.send_ui(destination, payload).await,
        }
    }

    pub async fn open_session(&self, neighbour: &Callsign) -> Result<Session, InterfaceError> {
        match self {
            Self::Loopback(c) => c.open_session(neighbour).await,
            Self::KissTcp(c) => c.open_session(neighbour).await,
        }
    }

    pub async fn receive(&self) -> Result<LinkEvent, InterfaceError> {
        match self {
            Self::Loopback(c) => c.receive().await,
            Self::KissTcp(c) => c.receive().await,
        }
    }
}

impl From<LoopbackConnector> for AnyConnector {
    fn from(c: LoopbackConnector) -> Self {
        Self::Loopback(c)
    }
}

impl From<KissTcpConnector> for AnyConnector {
    fn from(c: KissTcpConnector) -> Self {
        Self::KissTcp(c)
    }
}
