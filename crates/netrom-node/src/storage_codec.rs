//! Pure serialization of routing tables for [`crate::storage`].
//!
//! Routes are converted to plain storable records (callsigns as text) and
//! encoded with postcard. Table order, most recently heard first, is kept.

use serde::{Deserialize, Serialize};

use netrom_core::{Callsign, Inp3Option, Inp3OptionType, Mnemonic};
use netrom_transport::{ClassicRoute, Inp3Route, InterfaceId, RouteTable, RoutingTables};

/// Errors from pure codec operations (no I/O variants).
#[derive(Debug, thiserror::Error)]
pub enum StorageCodecError {
    #[error("serialization error: {0}")]
    Serialize(String),

    #[error("deserialization error: {0}")]
    Deserialize(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorableClassicRoute {
    pub source: String,
    pub destination: String,
    pub mnemonic: String,
    pub neighbour: String,
    pub quality: u8,
    pub interface: u64,
    pub last_heard: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorableInp3Route {
    pub source: String,
    pub destination: String,
    pub hops: u8,
    pub trip_time_ms: u16,
    /// `(type, payload)` pairs in broadcast order.
    pub options: Vec<(u8, Vec<u8>)>,
    pub interface: u64,
    pub last_heard: u64,
}

/// Both tables as written to disk.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct StorableRoutingTables {
    pub classic: Vec<StorableClassicRoute>,
    pub inp3: Vec<StorableInp3Route>,
}

fn parse_call(s: &str) -> Result<Callsign, StorageCodecError> {
    s.parse()
        .map_err(|e| StorageCodecError::Deserialize(format!("callsign {s:?}: {e}")))
}

#[must_use]
pub fn classic_to_storable(route: &ClassicRoute) -> StorableClassicRoute {
    StorableClassicRoute {
        source: route.source.to_string(),
        destination: route.destination.to_string(),
        mnemonic: route.mnemonic.to_string(),
        neighbour: route.neighbour.to_string(),
        quality: route.quality,
        interface: route.interface.0,
        last_heard: route.last_heard,
    }
}

pub fn storable_to_classic(s: StorableClassicRoute) -> Result<ClassicRoute, StorageCodecError> {
    Ok(ClassicRoute {
        source: parse_call(&s.source)?,
        destination: parse_call(&s.destination)?,
        mnemonic: Mnemonic::new(&s.mnemonic)
            .map_err(|e| StorageCodecError::Deserialize(format!("mnemonic {:?}: {e}", s.mnemonic)))?,
        neighbour: parse_call(&s.neighbour)?,
        quality: s.quality,
        interface: InterfaceId(s.interface),
        last_heard: s.last_heard,
    })
}

#[must_use]
pub fn inp3_to_storable(route: &Inp3Route) -> StorableInp3Route {
    StorableInp3Route {
        source: route.source.to_string(),
        destination: route.destination.to_string(),
        hops: route.hops,
        trip_time_ms: route.trip_time_ms,
        options: route
            .options
            .iter()
            .map(|o| (o.kind.to_u8(), o.payload.clone()))
            .collect(),
        interface: route.interface.0,
        last_heard: route.last_heard,
    }
}

pub fn storable_to_inp3(s: StorableInp3Route) -> Result<Inp3Route, StorageCodecError> {
    Ok(Inp3Route {
        source: parse_call(&s.source)?,
        destination: parse_call(&s.destination)?,
        hops: s.hops,
        trip_time_ms: s.trip_time_ms,
        options: s
            .options
            .into_iter()
            .map(|(kind, payload)| Inp3Option {
                kind: Inp3OptionType::from_u8(kind),
                payload,
            })
            .collect(),
        interface: InterfaceId(s.interface),
        last_heard: s.last_heard,
    })
}

/// Snapshot both tables, taking each lock in turn.
pub fn serialize_routing_tables(tables: &RoutingTables) -> Result<Vec<u8>, StorageCodecError> {
    let classic = tables.classic().routes();
    let inp3 = tables.inp3().routes();
    let storable = StorableRoutingTables {
        classic: classic.iter().map(classic_to_storable).collect(),
        inp3: inp3.iter().map(inp3_to_storable).collect(),
    };
    postcard::to_allocvec(&storable).map_err(|e| StorageCodecError::Serialize(e.to_string()))
}

/// Decode tables written by [`serialize_routing_tables`].
pub fn deserialize_routing_tables(
    bytes: &[u8],
) -> Result<(RouteTable<ClassicRoute>, RouteTable<Inp3Route>), StorageCodecError> {
    let storable: StorableRoutingTables =
        postcard::from_bytes(bytes).map_err(|e| StorageCodecError::Deserialize(e.to_string()))?;
    let classic = storable
        .classic
        .into_iter()
        .map(storable_to_classic)
        .collect::<Result<Vec<_>, _>>()?;
    let inp3 = storable
        .inp3
        .into_iter()
        .map(storable_to_inp3)
        .collect::<Result<Vec<_>, _>>()?;
    Ok((RouteTable::from_routes(classic), RouteTable::from_routes(inp3)))
}
