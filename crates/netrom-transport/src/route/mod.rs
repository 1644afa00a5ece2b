//! Route tables for both broadcast dialects.
//!
//! Routes are learned from NODES broadcasts, kept most-recently-heard first,
//! and expire two hours after they were last heard.

pub mod codec;
pub mod constants;
pub mod listener;
pub mod table;
pub mod types;

pub use codec::{DecodedRoutes, decode_routing_broadcast, encode_routing_broadcast};
pub use constants::*;
pub use listener::RoutingListener;
pub use table::{NextHop, RouteTable, RoutingTables};
pub use types::{ClassicRoute, Inp3Route, InterfaceId, RouteEntry};
