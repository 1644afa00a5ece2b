//! Admission policies for inbound CONNECT_REQUESTs.

use netrom_core::Callsign;

/// Decides whether an inbound circuit may be accepted.
pub trait AdmissionPolicy: Send + Sync {
    fn admit(&self, user: &Callsign, node: &Callsign) -> bool;
}

/// Accept every request.
#[derive(Debug, Clone, Copy, Default)]
pub struct AcceptAll;

impl AdmissionPolicy for AcceptAll {
    fn admit(&self, _user: &Callsign, _node: &Callsign) -> bool {
        true
    }
}

/// Refuse every request.
#[derive(Debug, Clone, Copy, Default)]
pub struct RejectAll;

impl AdmissionPolicy for RejectAll {
    fn admit(&self, _user: &Callsign, _node: &Callsign) -> bool {
        false
    }
}
