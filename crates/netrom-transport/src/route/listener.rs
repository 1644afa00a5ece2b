//! Feeds inbound routing broadcasts into the route tables.

use std::sync::Arc;

use netrom_core::Callsign;
use tracing::{debug, trace};

use super::codec::{DecodedRoutes, decode_routing_broadcast};
use super::table::RoutingTables;
use super::types::InterfaceId;

/// Classifies UI payloads and updates the matching dialect table.
#[derive(Clone)]
pub struct RoutingListener {
    tables: Arc<RoutingTables>,
}

impl RoutingListener {
    pub fn new(tables: Arc<RoutingTables>) -> Self {
        Self { tables }
    }

    pub fn tables(&self) -> &Arc<RoutingTables> {
        &self.tables
    }

    /// Handle one UI payload. Returns the number of routes learned.
    ///
    /// Corrupt broadcasts are dropped whole.
    pub fn on_broadcast(
        &self,
        source: &Callsign,
        interface: InterfaceId,
        payload: &[u8],
        now: u64,
    ) -> usize {
        match decode_routing_broadcast(payload, source, interface, now) {
            Ok(None) => {
                trace!(%source, len = payload.len(), "ignoring non-broadcast UI frame");
                0
            }
            Ok(Some(DecodedRoutes::Classic(routes))) => {
                let count = routes.len();
                debug!(%source, count, "classic routing broadcast");
                self.tables.classic().add_routes(routes);
                count
            }
            Ok(Some(DecodedRoutes::Inp3(routes))) => {
                let count = routes.len();
                debug!(%source, count, "INP3 routing broadcast");
                self.tables.inp3().add_routes(routes);
                count
            }
            Err(e) => {
                debug!(%source, error = %e, "dropping corrupt routing broadcast");
                0
            }
        }
    }
}
