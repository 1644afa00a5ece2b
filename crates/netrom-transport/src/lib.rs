//! Routing layer for the Net/ROM network stack.
//!
//! Keeps one route table per broadcast dialect and turns inbound routing
//! broadcasts into table updates.

pub mod error;
pub mod route;

pub use error::RouteError;
pub use route::{
    ClassicRoute, DecodedRoutes, Inp3Route, InterfaceId, NextHop, RouteEntry, RouteTable,
    RoutingListener, RoutingTables,
};
