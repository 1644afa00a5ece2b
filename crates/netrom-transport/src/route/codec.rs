//! Conversion between routing broadcasts and route entries.

use netrom_core::{Callsign, ClassicBroadcast, ClassicEntry, RoutingBroadcast};

use super::types::{ClassicRoute, Inp3Route, InterfaceId};
use crate::error::RouteError;

/// Routes carried by one broadcast.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodedRoutes {
    Classic(Vec<ClassicRoute>),
    Inp3(Vec<Inp3Route>),
}

impl DecodedRoutes {
    pub fn len(&self) -> usize {
        match self {
            DecodedRoutes::Classic(r) => r.len(),
            DecodedRoutes::Inp3(r) => r.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Decode a UI payload heard from `source` on `interface`.
///
/// `Ok(None)` when the payload is not a routing broadcast.
pub fn decode_routing_broadcast(
    raw: &[u8],
    source: &Callsign,
    interface: InterfaceId,
    now: u64,
) -> Result<Option<DecodedRoutes>, RouteError> {
    let routes = match RoutingBroadcast::decode(raw)? {
        None => return Ok(None),
        Some(RoutingBroadcast::Classic(broadcast)) => DecodedRoutes::Classic(
            broadcast
                .entries
                .into_iter()
                .map(|e| ClassicRoute {
                    source: source.clone(),
                    destination: e.destination,
                    mnemonic: e.mnemonic,
                    neighbour: e.neighbour,
                    quality: e.quality,
                    interface,
                    last_heard: now,
                })
                .collect(),
        ),
        Some(RoutingBroadcast::Inp3(broadcast)) => DecodedRoutes::Inp3(
            broadcast
                .entries
                .into_iter()
                .map(|e| Inp3Route {
                    source: source.clone(),
                    destination: e.destination,
                    hops: e.hops,
                    trip_time_ms: e.trip_time_ms,
                    options: e.options,
                    interface,
                    last_heard: now,
                })
                .collect(),
        ),
    };
    Ok(Some(routes))
}

/// Encode a node's self-announcement. The route's mnemonic doubles as the
/// sender mnemonic.
#[must_use]
pub fn encode_routing_broadcast(route: &ClassicRoute) -> Vec<u8> {
    ClassicBroadcast {
        sender_mnemonic: route.mnemonic.clone(),
        entries: vec![ClassicEntry {
            destination: route.destination.clone(),
            mnemonic: route.mnemonic.clone(),
            neighbour: route.neighbour.clone(),
            quality: route.quality,
        }],
    }
    .serialize()
}
