//! Per-dialect route tables.

use std::collections::VecDeque;

use netrom_core::{Callsign, Dialect};
use parking_lot::{Mutex, MutexGuard};

use super::types::{ClassicRoute, Inp3Route, InterfaceId, RouteEntry};

/// Routes of one dialect, most recently heard first.
#[must_use]
pub struct RouteTable<R: RouteEntry> {
    routes: VecDeque<R>,
}

impl<R: RouteEntry> RouteTable<R> {
    pub fn new() -> Self {
        Self {
            routes: VecDeque::new(),
        }
    }

    /// Insert at the head, replacing any entry with the same identity key.
    pub fn add_route(&mut self, route: R) {
        let key = route.identity();
        self.routes.retain(|r| r.identity() != key);
        self.routes.push_front(route);
    }

    /// Add routes in broadcast order.
    pub fn add_routes(&mut self, routes: impl IntoIterator<Item = R>) {
        for route in routes {
            self.add_route(route);
        }
    }

    /// Best live route whose destination callsign or alias names `query`.
    ///
    /// Ties go to the most recently heard entry.
    #[must_use]
    pub fn best_route_to(&self, query: &str, now: u64) -> Option<R> {
        let mut best: Option<&R> = None;
        for route in self
            .routes
            .iter()
            .filter(|r| !r.is_expired(now) && r.matches(query))
        {
            match best {
                Some(current) if !route.is_better_than(current) => {}
                _ => best = Some(route),
            }
        }
        best.cloned()
    }

    /// Remove the entry sharing `route`'s identity key. Returns true if one existed.
    pub fn remove_route(&mut self, route: &R) -> bool {
        let key = route.identity();
        let before = self.routes.len();
        self.routes.retain(|r| r.identity() != key);
        before != self.routes.len()
    }

    pub fn clear(&mut self) {
        self.routes.clear();
    }

    /// Drop expired entries. Returns the number removed.
    pub fn cull(&mut self, now: u64) -> usize {
        let before = self.routes.len();
        self.routes.retain(|r| !r.is_expired(now));
        before - self.routes.len()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Snapshot, most recently heard first.
    #[must_use]
    pub fn routes(&self) -> Vec<R> {
        self.routes.iter().cloned().collect()
    }

    /// Rebuild from a snapshot taken with [`routes`](Self::routes).
    pub fn from_routes(routes: impl IntoIterator<Item = R>) -> Self {
        Self {
            routes: routes.into_iter().collect(),
        }
    }
}

impl<R: RouteEntry> Default for RouteTable<R> {
    fn default() -> Self {
        Self::new()
    }
}

/// The neighbour to hand a circuit to for some destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NextHop {
    pub neighbour: Callsign,
    pub interface: InterfaceId,
    pub dialect: Dialect,
}

/// Both dialect tables, each behind its own lock.
#[derive(Default)]
pub struct RoutingTables {
    classic: Mutex<RouteTable<ClassicRoute>>,
    inp3: Mutex<RouteTable<Inp3Route>>,
}

impl RoutingTables {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_tables(classic: RouteTable<ClassicRoute>, inp3: RouteTable<Inp3Route>) -> Self {
        Self {
            classic: Mutex::new(classic),
            inp3: Mutex::new(inp3),
        }
    }

    pub fn classic(&self) -> MutexGuard<'_, RouteTable<ClassicRoute>> {
        self.classic.lock()
    }

    pub fn inp3(&self) -> MutexGuard<'_, RouteTable<Inp3Route>> {
        self.inp3.lock()
    }

    /// Resolve a destination, preferring the classic table.
    ///
    /// A classic route names its neighbour directly; an INP3 route is reached
    /// through the node that broadcast it.
    #[must_use]
    pub fn next_hop(&self, query: &str, now: u64) -> Option<NextHop> {
        let classic = self.classic().best_route_to(query, now);
        if let Some(route) = classic {
            return Some(NextHop {
                neighbour: route.neighbour,
                interface: route.interface,
                dialect: Dialect::Classic,
            });
        }
        self.inp3().best_route_to(query, now).map(|route| NextHop {
            neighbour: route.source,
            interface: route.interface,
            dialect: Dialect::Inp3,
        })
    }

    /// Cull both tables. Returns `(classic, inp3)` removal counts.
    pub fn cull(&self, now: u64) -> (usize, usize) {
        let classic = self.classic().cull(now);
        let inp3 = self.inp3().cull(now);
        (classic, inp3)
    }
}
