//! Route table entry types.

use netrom_core::{Callsign, Inp3Option, Inp3OptionType, Mnemonic};

use super::constants::ROUTE_TTL;

/// Lightweight interface identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InterfaceId(pub u64);

/// Behaviour shared by the entries of both dialects.
pub trait RouteEntry: Clone {
    /// At most one live entry per key.
    type Key: PartialEq;

    fn identity(&self) -> Self::Key;

    fn last_heard(&self) -> u64;

    /// Whether the destination callsign or alias names `query`.
    fn matches(&self, query: &str) -> bool;

    /// Strict preference used by best-route selection.
    fn is_better_than(&self, other: &Self) -> bool;

    fn is_expired(&self, now: u64) -> bool {
        now.saturating_sub(self.last_heard()) > ROUTE_TTL
    }
}

/// A route learned from a classic NODES broadcast.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassicRoute {
    /// Node that sent the broadcast.
    pub source: Callsign,
    pub destination: Callsign,
    pub mnemonic: Mnemonic,
    pub neighbour: Callsign,
    pub quality: u8,
    pub interface: InterfaceId,
    pub last_heard: u64,
}

impl RouteEntry for ClassicRoute {
    type Key = (Callsign, Mnemonic, Callsign);

    fn identity(&self) -> Self::Key {
        (
            self.destination.clone(),
            self.mnemonic.clone(),
            self.neighbour.clone(),
        )
    }

    fn last_heard(&self) -> u64 {
        self.last_heard
    }

    fn matches(&self, query: &str) -> bool {
        self.destination.matches(query) || self.mnemonic.matches(query)
    }

    fn is_better_than(&self, other: &Self) -> bool {
        self.quality > other.quality
    }
}

/// A route learned from an INP3 broadcast.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Inp3Route {
    /// Node that sent the broadcast.
    pub source: Callsign,
    pub destination: Callsign,
    pub hops: u8,
    pub trip_time_ms: u16,
    pub options: Vec<Inp3Option>,
    pub interface: InterfaceId,
    pub last_heard: u64,
}

impl Inp3Route {
    /// Payload of the first ALIAS option.
    #[must_use]
    pub fn alias(&self) -> Option<&str> {
        self.options
            .iter()
            .find(|o| o.kind == Inp3OptionType::Alias)
            .and_then(|o| std::str::from_utf8(&o.payload).ok())
    }
}

impl RouteEntry for Inp3Route {
    type Key = (Callsign, Callsign);

    fn identity(&self) -> Self::Key {
        (self.destination.clone(), self.source.clone())
    }

    fn last_heard(&self) -> u64 {
        self.last_heard
    }

    fn matches(&self, query: &str) -> bool {
        let query = query.trim();
        self.destination.matches(query)
            || self
                .alias()
                .is_some_and(|a| !a.is_empty() && a.trim().eq_ignore_ascii_case(query))
    }

    fn is_better_than(&self, other: &Self) -> bool {
        (self.trip_time_ms, self.hops) < (other.trip_time_ms, other.hops)
    }
}
