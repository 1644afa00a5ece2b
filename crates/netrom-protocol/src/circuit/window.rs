//! Send window: retransmission buffer, pending queue and peer choke.
//!
//! Frames move from `pending` to `unacked` when transmitted and leave
//! `unacked` when the peer acknowledges them. At all times
//! `ack_seq + unacked.len() == tx_seq` modulo 128.

use std::collections::VecDeque;

use super::constants::{MAX_INFO_PAYLOAD, SEQ_MODULUS};

/// Largest window 7-bit sequence numbers can disambiguate.
const MAX_WINDOW: u8 = SEQ_MODULUS - 1;
use super::sequence::SeqNo;

/// One INFORMATION payload and its more-follows bit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fragment {
    pub payload: Vec<u8>,
    pub more_follows: bool,
}

impl Fragment {
    /// Split a logical message into fragments no larger than
    /// [`MAX_INFO_PAYLOAD`], more-follows set on all but the last.
    pub fn split(data: &[u8]) -> Vec<Fragment> {
        let chunks: Vec<&[u8]> = data.chunks(MAX_INFO_PAYLOAD).collect();
        let last = chunks.len().saturating_sub(1);
        chunks
            .into_iter()
            .enumerate()
            .map(|(i, chunk)| Fragment {
                payload: chunk.to_vec(),
                more_follows: i < last,
            })
            .collect()
    }
}

#[derive(Debug, Clone)]
pub struct SendWindow {
    /// Next sequence number to assign.
    tx_seq: SeqNo,
    /// Oldest unacknowledged sequence number.
    ack_seq: SeqNo,
    /// Frames allowed in flight.
    size: u8,
    peer_choked: bool,
    unacked: VecDeque<(SeqNo, Fragment)>,
    pending: VecDeque<Fragment>,
}

impl SendWindow {
    pub fn new(size: u8) -> Self {
        Self {
            tx_seq: SeqNo::ZERO,
            ack_seq: SeqNo::ZERO,
            size: size.clamp(1, MAX_WINDOW),
            peer_choked: false,
            unacked: VecDeque::new(),
            pending: VecDeque::new(),
        }
    }

    pub fn size(&self) -> u8 {
        self.size
    }

    pub fn set_size(&mut self, size: u8) {
        self.size = size.clamp(1, MAX_WINDOW);
    }

    pub fn tx_seq(&self) -> SeqNo {
        self.tx_seq
    }

    pub fn ack_seq(&self) -> SeqNo {
        self.ack_seq
    }

    pub fn outstanding(&self) -> usize {
        self.unacked.len()
    }

    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    pub fn is_peer_choked(&self) -> bool {
        self.peer_choked
    }

    /// Queue a fragment for transmission.
    pub fn enqueue(&mut self, fragment: Fragment) {
        self.pending.push_back(fragment);
    }

    /// Whether a pending fragment may go out now.
    pub fn can_send(&self) -> bool {
        !self.peer_choked && self.unacked.len() < usize::from(self.size) && !self.pending.is_empty()
    }

    /// Take the next pending fragment, assign it a sequence number and move
    /// it to the retransmission buffer.
    pub fn next_transmittable(&mut self) -> Option<(SeqNo, Fragment)> {
        if !self.can_send() {
            return None;
        }
        let fragment = self.pending.pop_front()?;
        let seq = self.tx_seq;
        self.tx_seq = seq.next();
        self.unacked.push_back((seq, fragment.clone()));
        Some((seq, fragment))
    }

    /// Release every frame before `rx_seq`, the peer's next expected
    /// sequence. Acknowledgements outside the outstanding range are ignored.
    ///
    /// Returns the number of frames released.
    pub fn acknowledge(&mut self, rx_seq: SeqNo) -> usize {
        let released = usize::from(self.ack_seq.distance_to(rx_seq));
        if released > self.unacked.len() {
            tracing::trace!(
                %rx_seq,
                ack_seq = %self.ack_seq,
                outstanding = self.unacked.len(),
                "window: ignoring acknowledgement outside window"
            );
            return 0;
        }
        self.unacked.drain(..released);
        self.ack_seq = rx_seq;
        released
    }

    pub fn set_choke(&mut self, choked: bool) {
        if choked != self.peer_choked {
            tracing::debug!(choked, "window: peer choke changed");
        }
        self.peer_choked = choked;
    }

    /// The buffered frame carrying `seq`, for retransmission after a NAK.
    pub fn retransmit(&self, seq: SeqNo) -> Option<&Fragment> {
        self.unacked
            .iter()
            .find(|(s, _)| *s == seq)
            .map(|(_, fragment)| fragment)
    }

    /// Zero the sequence state and drop the retransmission buffer.
    /// Pending fragments survive.
    pub fn reset(&mut self) {
        self.tx_seq = SeqNo::ZERO;
        self.ack_seq = SeqNo::ZERO;
        self.peer_choked = false;
        self.unacked.clear();
    }
}
