//! Local endpoint of a circuit.

use std::sync::Arc;

use tokio::sync::{mpsc, watch};

use crate::circuit::{CircuitEndpoints, CircuitInfo, CircuitKey, CircuitRegistry, CircuitState};
use crate::error::CircuitError;

/// Reads and writes the logical messages of one circuit.
///
/// Dropping a stream disconnects a circuit that still terminates locally.
/// Use [`detach`](Self::detach) to give the circuit up without closing it.
pub struct CircuitStream {
    key: CircuitKey,
    registry: Arc<CircuitRegistry>,
    inbound: mpsc::UnboundedReceiver<Vec<u8>>,
    state: watch::Receiver<CircuitState>,
    detached: bool,
}

impl CircuitStream {
    pub(crate) fn new(
        key: CircuitKey,
        registry: Arc<CircuitRegistry>,
        endpoints: CircuitEndpoints,
    ) -> Self {
        Self {
            key,
            registry,
            inbound: endpoints.inbound,
            state: endpoints.state,
            detached: false,
        }
    }

    pub fn key(&self) -> CircuitKey {
        self.key
    }

    /// Latest published state.
    pub fn state(&self) -> CircuitState {
        *self.state.borrow()
    }

    pub fn info(&self) -> Option<CircuitInfo> {
        self.registry.info(self.key)
    }

    /// Next complete message from the peer. `None` once the circuit is gone.
    pub async fn recv(&mut self) -> Option<Vec<u8>> {
        self.inbound.recv().await
    }

    /// A message if one is already waiting.
    pub fn try_recv(&mut self) -> Option<Vec<u8>> {
        self.inbound.try_recv().ok()
    }

    /// Queue `data` for the peer, fragmenting as needed.
    ///
    /// Data written while the circuit is still connecting, or while the peer
    /// chokes us, is held until it can be sent.
    pub fn send(&self, data: &[u8]) -> Result<(), CircuitError> {
        self.registry
            .with_circuit(self.key, |circuit| match circuit.state() {
                CircuitState::Connected | CircuitState::Connecting => {
                    circuit.enqueue(data);
                    circuit.pump();
                    Ok(())
                }
                CircuitState::Disconnected | CircuitState::Invalid => {
                    Err(CircuitError::NotConnected)
                }
            })
            .unwrap_or(Err(CircuitError::NotConnected))
    }

    /// Wait until the circuit leaves the connecting state.
    pub async fn connected(&mut self) -> Result<(), CircuitError> {
        loop {
            match *self.state.borrow_and_update() {
                CircuitState::Connected => return Ok(()),
                CircuitState::Connecting => {}
                CircuitState::Disconnected => return Err(CircuitError::Refused),
                CircuitState::Invalid => return Err(CircuitError::Exhausted),
            }
            if self.state.changed().await.is_err() {
                return Err(CircuitError::TransportClosed);
            }
        }
    }

    /// Send DISCONNECT_REQUEST and mark the circuit disconnected.
    ///
    /// The circuit stays registered until the peer acknowledges or the
    /// session closes. A circuit that never connected is released at once.
    pub fn disconnect(&self) {
        self.close(false);
        tracing::info!(circuit = %self.key, "circuit: local disconnect");
    }

    /// Give up the stream, leaving the circuit as it is.
    ///
    /// Used once a circuit is paired for relaying and no longer terminates
    /// locally.
    pub fn detach(mut self) -> CircuitKey {
        self.detached = true;
        self.key
    }

    /// Returns true if a disconnect was started.
    fn close(&self, only_local: bool) -> bool {
        let outcome = self.registry.with_circuit(self.key, |circuit| {
            if only_local && !circuit.terminates_locally() {
                return None;
            }
            match circuit.state() {
                CircuitState::Connected => {
                    circuit.send_disconnect_request();
                    circuit.set_state(CircuitState::Disconnected);
                    Some(false)
                }
                CircuitState::Connecting => {
                    circuit.set_state(CircuitState::Disconnected);
                    Some(true)
                }
                CircuitState::Disconnected | CircuitState::Invalid => None,
            }
        });
        match outcome.flatten() {
            Some(release) => {
                if release {
                    self.registry.remove(self.key);
                }
                true
            }
            None => false,
        }
    }
}

impl Drop for CircuitStream {
    fn drop(&mut self) {
        if !self.detached && self.close(true) {
            tracing::debug!(circuit = %self.key, "circuit: stream dropped, disconnecting");
        }
    }
}

impl std::fmt::Debug for CircuitStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CircuitStream")
            .field("key", &self.key)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}
