//! Node-wide circuit registry.
//!
//! One lock guards every operation. Callers never hold it across an
//! `.await` and never take a route table lock while holding it.

use std::collections::HashMap;

use netrom_core::Callsign;
use parking_lot::Mutex;

use super::constants::{CIRCUIT_KEY_LIMIT, FIRST_CIRCUIT_KEY};
use super::types::{Circuit, CircuitKey, CircuitRole, CircuitState};

/// Read-only view of a registered circuit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CircuitInfo {
    pub key: CircuitKey,
    pub remote_index: u8,
    pub remote_id: u8,
    pub state: CircuitState,
    pub role: CircuitRole,
    pub user: Callsign,
    pub node: Callsign,
    pub window: u8,
    pub terminates_locally: bool,
    pub paired: Option<CircuitKey>,
    pub link: u64,
}

impl CircuitInfo {
    fn of(circuit: &Circuit) -> Self {
        Self {
            key: circuit.key(),
            remote_index: circuit.remote_index,
            remote_id: circuit.remote_id,
            state: circuit.state(),
            role: circuit.role,
            user: circuit.user.clone(),
            node: circuit.node.clone(),
            window: circuit.window.size(),
            terminates_locally: circuit.terminates_locally,
            paired: circuit.paired,
            link: circuit.link.id,
        }
    }
}

struct Inner {
    circuits: HashMap<CircuitKey, Circuit>,
    /// Every key below this is in use.
    free_hint: u16,
}

#[must_use]
pub struct CircuitRegistry {
    inner: Mutex<Inner>,
}

impl CircuitRegistry {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                circuits: HashMap::new(),
                free_hint: FIRST_CIRCUIT_KEY,
            }),
        }
    }

    /// Register `circuit` under the lowest free key.
    ///
    /// On exhaustion the circuit comes back marked [`CircuitState::Invalid`]
    /// and nothing is registered.
    pub fn allocate(&self, mut circuit: Circuit) -> Result<CircuitKey, Circuit> {
        let mut inner = self.inner.lock();
        let start = inner.free_hint.max(FIRST_CIRCUIT_KEY);
        let free = (start..CIRCUIT_KEY_LIMIT)
            .map(CircuitKey)
            .find(|key| !inner.circuits.contains_key(key));

        match free {
            Some(key) => {
                circuit.set_local(key);
                inner.circuits.insert(key, circuit);
                inner.free_hint = key.0 + 1;
                tracing::trace!(circuit = %key, live = inner.circuits.len(), "registry: allocated");
                Ok(key)
            }
            None => {
                inner.free_hint = CIRCUIT_KEY_LIMIT;
                drop(inner);
                tracing::warn!("registry: circuit identifiers exhausted");
                circuit.set_state(CircuitState::Invalid);
                Err(circuit)
            }
        }
    }

    /// Snapshot of the circuit at `(local_index, local_id)`.
    #[must_use]
    pub fn lookup(&self, local_index: u8, local_id: u8) -> Option<CircuitInfo> {
        self.info(CircuitKey::new(local_index, local_id))
    }

    #[must_use]
    pub fn info(&self, key: CircuitKey) -> Option<CircuitInfo> {
        self.inner.lock().circuits.get(&key).map(CircuitInfo::of)
    }

    /// Run `f` on the circuit at `key` while holding the lock.
    pub fn with_circuit<T>(&self, key: CircuitKey, f: impl FnOnce(&mut Circuit) -> T) -> Option<T> {
        self.inner.lock().circuits.get_mut(&key).map(f)
    }

    /// Remove the circuit at `(local_index, local_id)`. False if absent.
    pub fn release(&self, local_index: u8, local_id: u8) -> bool {
        self.remove(CircuitKey::new(local_index, local_id)).is_some()
    }

    /// Remove and return the circuit at `key`.
    pub fn remove(&self, key: CircuitKey) -> Option<Circuit> {
        let mut inner = self.inner.lock();
        let circuit = inner.circuits.remove(&key)?;
        inner.free_hint = inner.free_hint.min(key.0);
        Some(circuit)
    }

    /// Connected responder circuit on `link` already bound to the peer's
    /// `(remote_index, remote_id)`.
    #[must_use]
    pub fn find_remote(&self, link: u64, remote_index: u8, remote_id: u8) -> Option<CircuitKey> {
        self.inner
            .lock()
            .circuits
            .values()
            .find(|c| {
                c.link.id == link
                    && c.role == CircuitRole::Responder
                    && c.remote_index == remote_index
                    && c.remote_id == remote_id
                    && c.state() == CircuitState::Connected
            })
            .map(Circuit::key)
    }

    /// Remove every circuit riding `link`.
    pub fn drain_link(&self, link: u64) -> Vec<Circuit> {
        let mut inner = self.inner.lock();
        let keys: Vec<CircuitKey> = inner
            .circuits
            .iter()
            .filter(|(_, c)| c.link.id == link)
            .map(|(k, _)| *k)
            .collect();
        let mut drained = Vec::with_capacity(keys.len());
        for key in keys {
            if let Some(circuit) = inner.circuits.remove(&key) {
                inner.free_hint = inner.free_hint.min(key.0);
                drained.push(circuit);
            }
        }
        drained
    }

    /// Pair two circuits for transit relaying.
    ///
    /// Both stop terminating locally. False unless both exist.
    pub fn pair(&self, a: CircuitKey, b: CircuitKey) -> bool {
        let mut inner = self.inner.lock();
        if a == b || !inner.circuits.contains_key(&a) || !inner.circuits.contains_key(&b) {
            return false;
        }
        for (this, other) in [(a, b), (b, a)] {
            if let Some(circuit) = inner.circuits.get_mut(&this) {
                circuit.paired = Some(other);
                circuit.terminates_locally = false;
            }
        }
        true
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().circuits.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.lock().circuits.is_empty()
    }

    /// Snapshot of every live circuit, ordered by key.
    #[must_use]
    pub fn circuits(&self) -> Vec<CircuitInfo> {
        let inner = self.inner.lock();
        let mut all: Vec<CircuitInfo> = inner.circuits.values().map(CircuitInfo::of).collect();
        all.sort_by_key(|c| c.key);
        all
    }
}

impl Default for CircuitRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::circuit::types::PeerLink;
    use tokio::sync::mpsc;

    fn circuit(link: u64) -> Circuit {
        let (tx, _rx) = mpsc::unbounded_channel();
        Circuit::new(
            CircuitRole::Responder,
            PeerLink::new(link, tx),
            "G1ABC".parse().unwrap(),
            "G1BCD".parse().unwrap(),
            4,
            16,
        )
        .0
    }

    #[test]
    fn first_key_is_257() {
        let registry = CircuitRegistry::new();
        let key = registry.allocate(circuit(1)).unwrap();
        assert_eq!(key, CircuitKey(257));
        let info = registry.lookup(1, 1).unwrap();
        assert_eq!(info.key, key);
    }

    #[test]
    fn released_key_is_reused() {
        let registry = CircuitRegistry::new();
        let a = registry.allocate(circuit(1)).unwrap();
        let b = registry.allocate(circuit(1)).unwrap();
        assert_ne!(a, b);
        assert!(registry.release(a.index(), a.id()));
        assert!(!registry.release(a.index(), a.id()));
        let c = registry.allocate(circuit(1)).unwrap();
        assert_eq!(c, a);
    }

    #[test]
    fn drain_link_only_touches_that_link() {
        let registry = CircuitRegistry::new();
        registry.allocate(circuit(1)).unwrap();
        registry.allocate(circuit(2)).unwrap();
        registry.allocate(circuit(1)).unwrap();
        let drained = registry.drain_link(1);
        assert_eq!(drained.len(), 2);
        assert_eq!(registry.len(), 1);
        assert!(registry.drain_link(1).is_empty());
    }

    #[test]
    fn find_remote_matches_link_and_ids() {
        let registry = CircuitRegistry::new();
        let mut c = circuit(7);
        c.remote_index = 3;
        c.remote_id = 9;
        c.set_state(CircuitState::Connected);
        let key = registry.allocate(c).unwrap();
        assert_eq!(registry.find_remote(7, 3, 9), Some(key));
        assert_eq!(registry.find_remote(8, 3, 9), None);
        assert_eq!(registry.find_remote(7, 3, 8), None);

        // a circuit waiting for its disconnect ack is not a duplicate
        registry.with_circuit(key, |c| c.set_state(CircuitState::Disconnected));
        assert_eq!(registry.find_remote(7, 3, 9), None);
    }

    #[test]
    fn pairing_is_symmetric() {
        let registry = CircuitRegistry::new();
        let a = registry.allocate(circuit(1)).unwrap();
        let b = registry.allocate(circuit(2)).unwrap();
        assert!(registry.pair(a, b));
        assert_eq!(registry.info(a).unwrap().paired, Some(b));
        assert_eq!(registry.info(b).unwrap().paired, Some(a));
        assert!(!registry.info(a).unwrap().terminates_locally);
        assert!(!registry.pair(a, CircuitKey(999)));
        assert!(!registry.pair(a, a));
    }
}
