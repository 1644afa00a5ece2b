//! Circuit protocol handler.
//!
//! One [`CircuitHandler`] runs per link session. It decodes every inbound
//! control frame, drives the addressed circuit through
//! `DISCONNECTED -> CONNECTING -> CONNECTED -> DISCONNECTED`, relays transit
//! traffic to paired circuits and hands locally terminated circuits to the
//! owner as [`CircuitStream`]s.

pub mod policy;
pub mod stream;

pub use policy::{AcceptAll, AdmissionPolicy, RejectAll};
pub use stream::CircuitStream;

use std::sync::Arc;

use netrom_core::constants::{DEFAULT_TTL, DEFAULT_WINDOW};
use netrom_core::{Callsign, ConnectRequest, ControlFrame, FrameFlags, Packet};
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, trace, warn};

use crate::circuit::{
    Circuit, CircuitKey, CircuitRegistry, CircuitRole, CircuitState, PeerLink, SeqNo,
};
use crate::error::{CircuitError, HandlerExit};

/// Settings shared by every handler on a node.
#[derive(Clone)]
pub struct HandlerConfig {
    /// This node's callsign, sent as the originating node of new circuits.
    pub node: Callsign,
    pub ttl: u8,
    /// Largest window granted to or proposed by this node.
    pub max_window: u8,
    pub policy: Arc<dyn AdmissionPolicy>,
}

impl HandlerConfig {
    pub fn new(node: Callsign) -> Self {
        Self {
            node,
            ttl: DEFAULT_TTL,
            max_window: DEFAULT_WINDOW,
            policy: Arc::new(AcceptAll),
        }
    }
}

/// Circuit lifecycle notifications.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CircuitEvent {
    Connected {
        key: CircuitKey,
        role: CircuitRole,
        user: Callsign,
        node: Callsign,
    },
    Refused {
        key: CircuitKey,
    },
    Disconnected {
        key: CircuitKey,
    },
    /// The session carrying the circuit went away.
    Lost {
        key: CircuitKey,
    },
}

/// Open an initiator circuit over `link` and send CONNECT_REQUEST.
///
/// The returned stream reports the outcome through
/// [`CircuitStream::connected`].
pub fn open_circuit(
    registry: &Arc<CircuitRegistry>,
    link: PeerLink,
    config: &HandlerConfig,
    user: Callsign,
) -> Result<CircuitStream, CircuitError> {
    let (circuit, endpoints) = Circuit::new(
        CircuitRole::Initiator,
        link,
        user,
        config.node.clone(),
        config.max_window,
        config.ttl,
    );
    let key = registry
        .allocate(circuit)
        .map_err(|_| CircuitError::Exhausted)?;
    registry.with_circuit(key, |c| {
        c.set_state(CircuitState::Connecting);
        c.send_connect_request();
    });
    info!(circuit = %key, "circuit: connect requested");
    Ok(CircuitStream::new(key, Arc::clone(registry), endpoints))
}

/// Dispatches the control frames of one session.
pub struct CircuitHandler {
    config: HandlerConfig,
    registry: Arc<CircuitRegistry>,
    link: PeerLink,
    events: mpsc::UnboundedSender<CircuitEvent>,
    acceptor: mpsc::UnboundedSender<CircuitStream>,
}

impl CircuitHandler {
    pub fn new(
        config: HandlerConfig,
        registry: Arc<CircuitRegistry>,
        link: PeerLink,
        events: mpsc::UnboundedSender<CircuitEvent>,
        acceptor: mpsc::UnboundedSender<CircuitStream>,
    ) -> Self {
        Self {
            config,
            registry,
            link,
            events,
            acceptor,
        }
    }

    pub fn link(&self) -> &PeerLink {
        &self.link
    }

    /// Dispatch frames until the session closes or `stop` fires.
    pub async fn run(
        self,
        mut inbound: mpsc::Receiver<Vec<u8>>,
        mut stop: watch::Receiver<bool>,
    ) -> HandlerExit {
        debug!(link = self.link.id, "handler: started");
        if *stop.borrow() {
            self.shutdown();
            return HandlerExit::Stopped;
        }
        loop {
            tokio::select! {
                biased;
                changed = stop.changed() => {
                    if changed.is_err() || *stop.borrow() {
                        self.shutdown();
                        return HandlerExit::Stopped;
                    }
                }
                frame = inbound.recv() => match frame {
                    Some(raw) => self.handle_frame(&raw),
                    None => {
                        self.transport_closed();
                        return HandlerExit::TransportClosed;
                    }
                },
            }
        }
    }

    /// Decode and dispatch one frame. Undecodable frames are dropped.
    pub fn handle_frame(&self, raw: &[u8]) {
        let packet = match Packet::parse(raw) {
            Ok(packet) => packet,
            Err(e) => {
                debug!(link = self.link.id, error = %e, "handler: dropping undecodable frame");
                return;
            }
        };
        trace!(link = self.link.id, frame = ?packet.frame, "handler: rx");

        match packet.frame {
            ControlFrame::ConnectRequest(request) => self.on_connect_request(request),
            ControlFrame::ConnectAck {
                your_index,
                your_id,
                my_index,
                my_id,
                window,
                refused,
            } => self.on_connect_ack(
                CircuitKey::new(your_index, your_id),
                (my_index, my_id),
                window,
                refused,
            ),
            ControlFrame::DisconnectRequest { your_index, your_id } => {
                self.on_disconnect_request(CircuitKey::new(your_index, your_id))
            }
            ControlFrame::DisconnectAck { your_index, your_id } => {
                self.on_disconnect_ack(CircuitKey::new(your_index, your_id))
            }
            ControlFrame::Information {
                your_index,
                your_id,
                tx_seq,
                rx_seq,
                flags,
                payload,
            } => self.on_information(
                CircuitKey::new(your_index, your_id),
                SeqNo::new(tx_seq),
                SeqNo::new(rx_seq),
                flags,
                payload,
            ),
            ControlFrame::InformationAck {
                your_index,
                your_id,
                rx_seq,
                flags,
            } => self.on_information_ack(
                CircuitKey::new(your_index, your_id),
                SeqNo::new(rx_seq),
                flags,
            ),
            ControlFrame::Reset { your_index, your_id } => {
                self.on_reset(CircuitKey::new(your_index, your_id))
            }
        }
    }

    /// Run `f` on `key` if that circuit rides this session.
    fn on_circuit<T>(&self, key: CircuitKey, f: impl FnOnce(&mut Circuit) -> T) -> Option<T> {
        let link = self.link.id;
        let result = self
            .registry
            .with_circuit(key, |c| (c.link_id() == link).then(|| f(c)))
            .flatten();
        if result.is_none() {
            debug!(link, circuit = %key, "handler: frame for unknown circuit");
        }
        result
    }

    fn emit(&self, event: CircuitEvent) {
        let _ = self.events.send(event);
    }

    // ------------------------------------------------------------------ //
    // Connection setup
    // ------------------------------------------------------------------ //

    fn refuse(&self, request: &ConnectRequest) {
        self.link.send(&Packet::new(
            self.config.ttl,
            ControlFrame::ConnectAck {
                your_index: request.circuit_index,
                your_id: request.circuit_id,
                my_index: 0,
                my_id: 0,
                window: 0,
                refused: true,
            },
        ));
    }

    fn on_connect_request(&self, request: ConnectRequest) {
        if let Some(key) =
            self.registry
                .find_remote(self.link.id, request.circuit_index, request.circuit_id)
        {
            debug!(circuit = %key, "handler: duplicate connect request, re-acknowledging");
            self.registry.with_circuit(key, |c| c.send_connect_ack());
            return;
        }

        if !self.config.policy.admit(&request.user, &request.node) {
            info!(user = %request.user, node = %request.node, "handler: connect refused by policy");
            self.refuse(&request);
            return;
        }

        let window = request.window.clamp(1, self.config.max_window.max(1));
        let (mut circuit, endpoints) = Circuit::new(
            CircuitRole::Responder,
            self.link.clone(),
            request.user.clone(),
            request.node.clone(),
            window,
            self.config.ttl,
        );
        circuit.remote_index = request.circuit_index;
        circuit.remote_id = request.circuit_id;

        let key = match self.registry.allocate(circuit) {
            Ok(key) => key,
            Err(_) => {
                warn!(user = %request.user, "handler: {}", CircuitError::Exhausted);
                self.refuse(&request);
                return;
            }
        };

        self.registry.with_circuit(key, |c| {
            c.set_state(CircuitState::Connected);
            c.send_connect_ack();
        });
        info!(
            circuit = %key,
            user = %request.user,
            node = %request.node,
            window,
            "handler: circuit accepted"
        );

        let stream = CircuitStream::new(key, Arc::clone(&self.registry), endpoints);
        if self.acceptor.send(stream).is_err() {
            debug!(circuit = %key, "handler: no acceptor for inbound circuit");
        }
        self.emit(CircuitEvent::Connected {
            key,
            role: CircuitRole::Responder,
            user: request.user,
            node: request.node,
        });
    }

    fn on_connect_ack(&self, key: CircuitKey, remote: (u8, u8), window: u8, refused: bool) {
        enum Outcome {
            Ignored,
            Refused(Option<CircuitKey>),
            Accepted(Callsign, Callsign),
        }

        let outcome = self.on_circuit(key, |c| {
            if c.state() != CircuitState::Connecting {
                return Outcome::Ignored;
            }
            if refused {
                c.set_state(CircuitState::Disconnected);
                return Outcome::Refused(c.paired.take());
            }
            c.remote_index = remote.0;
            c.remote_id = remote.1;
            // Never more in flight than we proposed.
            let granted = window.clamp(1, c.window.size());
            c.window.set_size(granted);
            c.set_state(CircuitState::Connected);
            c.pump();
            Outcome::Accepted(c.user.clone(), c.node.clone())
        });

        match outcome {
            None | Some(Outcome::Ignored) => {
                debug!(circuit = %key, "handler: unexpected connect ack");
            }
            Some(Outcome::Refused(paired)) => {
                self.registry.remove(key);
                info!(circuit = %key, "handler: connect refused");
                if let Some(paired) = paired {
                    disconnect_paired(&self.registry, paired);
                }
                self.emit(CircuitEvent::Refused { key });
            }
            Some(Outcome::Accepted(user, node)) => {
                info!(circuit = %key, "handler: circuit connected");
                self.emit(CircuitEvent::Connected {
                    key,
                    role: CircuitRole::Initiator,
                    user,
                    node,
                });
            }
        }
    }

    // ------------------------------------------------------------------ //
    // Data transfer
    // ------------------------------------------------------------------ //

    /// Apply the acknowledgement and flow-control bits every data-path frame carries.
    fn apply_acknowledgement(c: &mut Circuit, rx_seq: SeqNo, flags: FrameFlags) {
        c.window.acknowledge(rx_seq);
        c.window.set_choke(flags.choke);
        if flags.nak {
            c.retransmit(rx_seq);
        }
    }

    fn on_information(
        &self,
        key: CircuitKey,
        tx_seq: SeqNo,
        rx_seq: SeqNo,
        flags: FrameFlags,
        payload: Vec<u8>,
    ) {
        let relay = self.on_circuit(key, |c| {
            if c.state() != CircuitState::Connected {
                debug!(circuit = %key, state = c.state().as_str(), "handler: information on idle circuit");
                return None;
            }
            Self::apply_acknowledgement(c, rx_seq, flags);

            if tx_seq != c.rx_seq {
                debug!(circuit = %key, expected = %c.rx_seq, got = %tx_seq, "handler: out of sequence, NAK");
                c.send_info_ack(true);
                c.pump();
                return None;
            }
            c.rx_seq = c.rx_seq.next();

            let relay = if c.terminates_locally {
                if let Some(message) = c.reassemble(&payload, flags.more_follows) {
                    c.deliver(message);
                }
                None
            } else {
                c.paired
            };
            c.send_info_ack(false);
            c.pump();
            relay
        });

        if let Some(Some(paired)) = relay {
            let fragment = crate::circuit::Fragment {
                payload,
                more_follows: flags.more_follows,
            };
            let relayed = self.registry.with_circuit(paired, |p| {
                p.window.enqueue(fragment);
                p.pump();
            });
            if relayed.is_none() {
                debug!(circuit = %key, paired = %paired, "handler: paired circuit gone");
            }
        }
    }

    fn on_information_ack(&self, key: CircuitKey, rx_seq: SeqNo, flags: FrameFlags) {
        self.on_circuit(key, |c| {
            if c.state() != CircuitState::Connected {
                return;
            }
            Self::apply_acknowledgement(c, rx_seq, flags);
            c.pump();
        });
    }

    fn on_reset(&self, key: CircuitKey) {
        self.on_circuit(key, |c| {
            info!(circuit = %key, "handler: reset");
            c.reset();
            c.pump();
        });
    }

    // ------------------------------------------------------------------ //
    // Teardown
    // ------------------------------------------------------------------ //

    fn on_disconnect_request(&self, key: CircuitKey) {
        let paired = self.on_circuit(key, |c| {
            c.send_disconnect_ack();
            c.set_state(CircuitState::Disconnected);
            c.paired.take()
        });
        let Some(paired) = paired else {
            return;
        };
        self.registry.remove(key);
        info!(circuit = %key, "handler: disconnected by peer");
        if let Some(paired) = paired {
            disconnect_paired(&self.registry, paired);
        }
        self.emit(CircuitEvent::Disconnected { key });
    }

    fn on_disconnect_ack(&self, key: CircuitKey) {
        let paired = self.on_circuit(key, |c| {
            c.set_state(CircuitState::Disconnected);
            c.paired.take()
        });
        let Some(paired) = paired else {
            return;
        };
        self.registry.remove(key);
        info!(circuit = %key, "handler: disconnect acknowledged");
        if let Some(paired) = paired {
            disconnect_paired(&self.registry, paired);
        }
        self.emit(CircuitEvent::Disconnected { key });
    }

    /// Session ended underneath us: drop every circuit riding it.
    fn transport_closed(&self) {
        let drained = self.registry.drain_link(self.link.id);
        warn!(link = self.link.id, circuits = drained.len(), "handler: {}", HandlerExit::TransportClosed);
        for mut circuit in drained {
            let key = circuit.key();
            circuit.set_state(CircuitState::Disconnected);
            if let Some(paired) = circuit.paired.take() {
                disconnect_paired(&self.registry, paired);
            }
            self.emit(CircuitEvent::Lost { key });
        }
    }

    /// Local stop: tell peers, then drop every circuit riding this session.
    fn shutdown(&self) {
        let drained = self.registry.drain_link(self.link.id);
        debug!(link = self.link.id, circuits = drained.len(), "handler: stopping");
        for mut circuit in drained {
            let key = circuit.key();
            if circuit.state() == CircuitState::Connected {
                circuit.send_disconnect_request();
            }
            circuit.set_state(CircuitState::Disconnected);
            if let Some(paired) = circuit.paired.take() {
                disconnect_paired(&self.registry, paired);
            }
            self.emit(CircuitEvent::Disconnected { key });
        }
    }
}

/// Tear down the far half of a transit pair.
fn disconnect_paired(registry: &CircuitRegistry, key: CircuitKey) {
    let release = registry.with_circuit(key, |p| {
        p.paired = None;
        match p.state() {
            CircuitState::Connected => {
                p.send_disconnect_request();
                p.set_state(CircuitState::Disconnected);
                false
            }
            CircuitState::Connecting => {
                p.set_state(CircuitState::Disconnected);
                true
            }
            CircuitState::Disconnected | CircuitState::Invalid => false,
        }
    });
    if release == Some(true) {
        registry.remove(key);
    }
    debug!(circuit = %key, "handler: paired circuit disconnected");
}
