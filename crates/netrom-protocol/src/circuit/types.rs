//! Circuit types.

use core::fmt;

use netrom_core::{Callsign, ControlFrame, FrameFlags, Packet};
use tokio::sync::{mpsc, watch};

use super::constants::MAX_REASSEMBLY;
use super::sequence::SeqNo;
use super::window::{Fragment, SendWindow};

/// Packed registry key: `(local_id << 8) | local_index`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CircuitKey(pub u16);

impl CircuitKey {
    pub fn new(index: u8, id: u8) -> Self {
        Self((u16::from(id) << 8) | u16::from(index))
    }

    pub fn index(self) -> u8 {
        (self.0 & 0xFF) as u8
    }

    pub fn id(self) -> u8 {
        (self.0 >> 8) as u8
    }
}

impl fmt::Display for CircuitKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.index(), self.id())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Disconnected,
    Connecting,
    Connected,
    /// Allocation failed; the circuit never transitions out of this state.
    Invalid,
}

impl CircuitState {
    pub fn as_str(self) -> &'static str {
        match self {
            CircuitState::Disconnected => "disconnected",
            CircuitState::Connecting => "connecting",
            CircuitState::Connected => "connected",
            CircuitState::Invalid => "invalid",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitRole {
    Initiator,
    Responder,
}

/// Outbound half of the session a circuit rides on.
#[derive(Debug, Clone)]
pub struct PeerLink {
    pub id: u64,
    outbound: mpsc::UnboundedSender<Vec<u8>>,
}

impl PeerLink {
    pub fn new(id: u64, outbound: mpsc::UnboundedSender<Vec<u8>>) -> Self {
        Self { id, outbound }
    }

    /// Serialize and queue a packet. Never blocks.
    pub fn send(&self, packet: &Packet) {
        let raw = packet.serialize();
        tracing::trace!(link = self.id, opcode = ?packet.frame.opcode(), len = raw.len(), "circuit: tx");
        if self.outbound.send(raw).is_err() {
            tracing::debug!(link = self.id, "circuit: outbound link closed, frame dropped");
        }
    }

    pub fn is_closed(&self) -> bool {
        self.outbound.is_closed()
    }
}

/// Receiving ends handed to the owner of a local circuit.
pub struct CircuitEndpoints {
    pub inbound: mpsc::UnboundedReceiver<Vec<u8>>,
    pub state: watch::Receiver<CircuitState>,
}

/// One virtual circuit.
pub struct Circuit {
    pub(crate) local_index: u8,
    pub(crate) local_id: u8,
    pub(crate) remote_index: u8,
    pub(crate) remote_id: u8,
    state: CircuitState,
    pub(crate) role: CircuitRole,
    pub(crate) window: SendWindow,
    pub(crate) rx_seq: SeqNo,
    pub(crate) user: Callsign,
    pub(crate) node: Callsign,
    pub(crate) terminates_locally: bool,
    pub(crate) paired: Option<CircuitKey>,
    pub(crate) link: PeerLink,
    pub(crate) ttl: u8,
    reassembly: Vec<u8>,
    /// Set after an oversized message, until its final fragment.
    discarding: bool,
    deliver: mpsc::UnboundedSender<Vec<u8>>,
    state_tx: watch::Sender<CircuitState>,
}

impl Circuit {
    /// A circuit that has not yet been allocated an identifier.
    pub fn new(
        role: CircuitRole,
        link: PeerLink,
        user: Callsign,
        node: Callsign,
        window: u8,
        ttl: u8,
    ) -> (Self, CircuitEndpoints) {
        let (deliver, inbound) = mpsc::unbounded_channel();
        let (state_tx, state) = watch::channel(CircuitState::Disconnected);
        let circuit = Self {
            local_index: 0,
            local_id: 0,
            remote_index: 0,
            remote_id: 0,
            state: CircuitState::Disconnected,
            role,
            window: SendWindow::new(window),
            rx_seq: SeqNo::ZERO,
            user,
            node,
            terminates_locally: true,
            paired: None,
            link,
            ttl,
            reassembly: Vec::new(),
            discarding: false,
            deliver,
            state_tx,
        };
        (circuit, CircuitEndpoints { inbound, state })
    }

    pub fn key(&self) -> CircuitKey {
        CircuitKey::new(self.local_index, self.local_id)
    }

    pub fn state(&self) -> CircuitState {
        self.state
    }

    pub fn is_valid(&self) -> bool {
        self.state != CircuitState::Invalid
    }

    pub fn role(&self) -> CircuitRole {
        self.role
    }

    pub fn remote(&self) -> (u8, u8) {
        (self.remote_index, self.remote_id)
    }

    pub fn user(&self) -> &Callsign {
        &self.user
    }

    pub fn node(&self) -> &Callsign {
        &self.node
    }

    pub fn window(&self) -> &SendWindow {
        &self.window
    }

    pub fn rx_seq(&self) -> SeqNo {
        self.rx_seq
    }

    pub fn paired(&self) -> Option<CircuitKey> {
        self.paired
    }

    pub fn terminates_locally(&self) -> bool {
        self.terminates_locally
    }

    pub fn link_id(&self) -> u64 {
        self.link.id
    }

    /// Move to `state` and publish it to the local owner.
    pub fn set_state(&mut self, state: CircuitState) {
        if self.state == CircuitState::Invalid {
            return;
        }
        self.state = state;
        self.state_tx.send_replace(state);
    }

    pub(crate) fn set_local(&mut self, key: CircuitKey) {
        self.local_index = key.index();
        self.local_id = key.id();
    }

    /// Record an accepted INFORMATION payload. Returns the complete message
    /// once the final fragment arrives.
    ///
    /// A message growing past [`MAX_REASSEMBLY`] is dropped whole.
    pub(crate) fn reassemble(&mut self, payload: &[u8], more_follows: bool) -> Option<Vec<u8>> {
        if !self.discarding && self.reassembly.len() + payload.len() > MAX_REASSEMBLY {
            tracing::warn!(
                circuit = %self.key(),
                limit = MAX_REASSEMBLY,
                "circuit: oversized message dropped"
            );
            self.reassembly = Vec::new();
            self.discarding = true;
        }
        if self.discarding {
            self.discarding = more_follows;
            return None;
        }
        self.reassembly.extend_from_slice(payload);
        if more_follows {
            None
        } else {
            Some(std::mem::take(&mut self.reassembly))
        }
    }

    /// Hand a complete message to the local stream.
    pub(crate) fn deliver(&self, message: Vec<u8>) {
        if self.deliver.send(message).is_err() {
            tracing::debug!(circuit = %self.key(), "circuit: local stream gone, message dropped");
        }
    }

    /// Queue outbound data, fragmenting it.
    pub(crate) fn enqueue(&mut self, data: &[u8]) {
        for fragment in Fragment::split(data) {
            self.window.enqueue(fragment);
        }
    }

    /// Zero sequence state and drop both buffers. Pending data survives.
    pub(crate) fn reset(&mut self) {
        self.window.reset();
        self.rx_seq = SeqNo::ZERO;
        self.reassembly.clear();
        self.discarding = false;
    }

    fn control(&self, frame: ControlFrame) -> Packet {
        Packet::new(self.ttl, frame)
    }

    /// Transmit queued fragments while the window and the peer allow.
    /// Returns the number of frames sent.
    pub(crate) fn pump(&mut self) -> usize {
        if self.state != CircuitState::Connected {
            return 0;
        }
        let mut sent = 0;
        while let Some((seq, fragment)) = self.window.next_transmittable() {
            self.send_information(seq, fragment);
            sent += 1;
        }
        sent
    }

    fn send_information(&self, seq: SeqNo, fragment: Fragment) {
        let packet = self.control(ControlFrame::Information {
            your_index: self.remote_index,
            your_id: self.remote_id,
            tx_seq: seq.value(),
            rx_seq: self.rx_seq.value(),
            flags: FrameFlags {
                more_follows: fragment.more_follows,
                ..FrameFlags::default()
            },
            payload: fragment.payload,
        });
        self.link.send(&packet);
    }

    /// Resend the buffered frame carrying `seq`.
    pub(crate) fn retransmit(&self, seq: SeqNo) -> bool {
        match self.window.retransmit(seq).cloned() {
            Some(fragment) => {
                tracing::debug!(circuit = %self.key(), %seq, "circuit: retransmitting after NAK");
                self.send_information(seq, fragment);
                true
            }
            None => false,
        }
    }

    pub(crate) fn send_connect_request(&self) {
        let packet = self.control(ControlFrame::ConnectRequest(netrom_core::ConnectRequest {
            circuit_index: self.local_index,
            circuit_id: self.local_id,
            window: self.window.size(),
            user: self.user.clone(),
            node: self.node.clone(),
        }));
        self.link.send(&packet);
    }

    pub(crate) fn send_connect_ack(&self) {
        let packet = self.control(ControlFrame::ConnectAck {
            your_index: self.remote_index,
            your_id: self.remote_id,
            my_index: self.local_index,
            my_id: self.local_id,
            window: self.window.size(),
            refused: false,
        });
        self.link.send(&packet);
    }

    pub(crate) fn send_info_ack(&self, nak: bool) {
        let packet = self.control(ControlFrame::InformationAck {
            your_index: self.remote_index,
            your_id: self.remote_id,
            rx_seq: self.rx_seq.value(),
            flags: FrameFlags {
                nak,
                ..FrameFlags::default()
            },
        });
        self.link.send(&packet);
    }

    pub(crate) fn send_disconnect_request(&self) {
        let packet = self.control(ControlFrame::DisconnectRequest {
            your_index: self.remote_index,
            your_id: self.remote_id,
        });
        self.link.send(&packet);
    }

    pub(crate) fn send_disconnect_ack(&self) {
        let packet = self.control(ControlFrame::DisconnectAck {
            your_index: self.remote_index,
            your_id: self.remote_id,
        });
        self.link.send(&packet);
    }
}

impl fmt::Debug for Circuit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Circuit")
            .field("key", &self.key())
            .field("remote", &(self.remote_index, self.remote_id))
            .field("state", &self.state)
            .field("role", &self.role)
            .field("user", &self.user)
            .field("node", &self.node)
            .field("paired", &self.paired)
            .finish_non_exhaustive()
    }
}
