//! Tests for circuit allocation: key uniqueness, reuse and exhaustion.

use std::collections::HashSet;
use std::sync::Arc;

use netrom_core::{ConnectRequest, ControlFrame, Packet};
use netrom_protocol::circuit::{FIRST_CIRCUIT_KEY, MAX_CIRCUITS};
use netrom_protocol::{
    Circuit, CircuitHandler, CircuitKey, CircuitRegistry, CircuitRole, CircuitState,
    HandlerConfig, PeerLink,
};
use tokio::sync::mpsc;

fn circuit(link: &PeerLink) -> Circuit {
    Circuit::new(
        CircuitRole::Initiator,
        link.clone(),
        "G1ABC".parse().unwrap(),
        "G1ABC-1".parse().unwrap(),
        4,
        16,
    )
    .0
}

#[test]
fn keys_are_unique_and_decompose() {
    let (tx, _rx) = mpsc::unbounded_channel();
    let link = PeerLink::new(1, tx);
    let registry = CircuitRegistry::new();

    let mut seen = HashSet::new();
    for _ in 0..600 {
        let key = registry.allocate(circuit(&link)).unwrap();
        assert!(key.0 >= FIRST_CIRCUIT_KEY);
        assert!(seen.insert(key));
        let info = registry.lookup(key.index(), key.id()).unwrap();
        assert_eq!(info.key, key);
        assert_eq!(key.0, (u16::from(key.id()) << 8) | u16::from(key.index()));
    }
    assert_eq!(registry.len(), 600);
}

#[test]
fn lowest_free_key_is_reused() {
    let (tx, _rx) = mpsc::unbounded_channel();
    let link = PeerLink::new(1, tx);
    let registry = CircuitRegistry::new();

    let keys: Vec<CircuitKey> = (0..10)
        .map(|_| registry.allocate(circuit(&link)).unwrap())
        .collect();
    assert!(registry.release(keys[7].index(), keys[7].id()));
    assert!(registry.release(keys[3].index(), keys[3].id()));
    assert_eq!(registry.allocate(circuit(&link)).unwrap(), keys[3]);
    assert_eq!(registry.allocate(circuit(&link)).unwrap(), keys[7]);
    assert_eq!(registry.allocate(circuit(&link)).unwrap(), CircuitKey(267));
}

#[test]
fn release_of_absent_circuit_is_false() {
    let registry = CircuitRegistry::new();
    assert!(!registry.release(1, 1));
    assert!(registry.lookup(1, 1).is_none());
}

#[test]
fn exhaustion_marks_circuit_invalid_and_refuses() {
    let (tx, _rx) = mpsc::unbounded_channel();
    let link = PeerLink::new(1, tx);
    let registry = Arc::new(CircuitRegistry::new());

    for _ in 0..MAX_CIRCUITS {
        registry.allocate(circuit(&link)).unwrap();
    }
    assert_eq!(registry.len(), 65278);

    let rejected = registry.allocate(circuit(&link)).unwrap_err();
    assert_eq!(rejected.state(), CircuitState::Invalid);
    assert!(!rejected.is_valid());
    assert_eq!(registry.len(), MAX_CIRCUITS);

    // an inbound connect request is refused rather than registered
    let (wire_tx, mut wire) = mpsc::unbounded_channel();
    let (event_tx, _events) = mpsc::unbounded_channel();
    let (accept_tx, mut accepted) = mpsc::unbounded_channel();
    let handler = CircuitHandler::new(
        HandlerConfig::new("G1ABC-1".parse().unwrap()),
        Arc::clone(&registry),
        PeerLink::new(2, wire_tx),
        event_tx,
        accept_tx,
    );
    let request = Packet::new(
        16,
        ControlFrame::ConnectRequest(ConnectRequest {
            circuit_index: 5,
            circuit_id: 6,
            window: 4,
            user: "G1USR".parse().unwrap(),
            node: "G1NOD".parse().unwrap(),
        }),
    );
    handler.handle_frame(&request.serialize());

    let reply = Packet::parse(&wire.try_recv().unwrap()).unwrap();
    assert!(matches!(
        reply.frame,
        ControlFrame::ConnectAck {
            your_index: 5,
            your_id: 6,
            refused: true,
            ..
        }
    ));
    assert!(accepted.try_recv().is_err());
    assert_eq!(registry.len(), MAX_CIRCUITS);

    // freeing one slot makes allocation succeed again
    assert!(registry.release(1, 1));
    assert_eq!(registry.allocate(circuit(&link)).unwrap(), CircuitKey(257));
}
