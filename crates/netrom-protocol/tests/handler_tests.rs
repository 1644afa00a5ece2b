//! Tests for the circuit protocol handler: setup, data transfer, flow
//! control, teardown and transit relaying.

use std::sync::Arc;

use netrom_core::{Callsign, ConnectRequest, ControlFrame, FrameFlags, Packet};
use netrom_protocol::{
    CircuitError, CircuitEvent, CircuitHandler, CircuitKey, CircuitRegistry, CircuitRole,
    CircuitState, CircuitStream, HandlerConfig, HandlerExit, PeerLink, RejectAll, open_circuit,
};
use tokio::sync::{mpsc, watch};

fn call(s: &str) -> Callsign {
    s.parse().unwrap()
}

fn config() -> HandlerConfig {
    HandlerConfig::new(call("G1ABC-1"))
}

struct Harness {
    registry: Arc<CircuitRegistry>,
    handler: CircuitHandler,
    wire: mpsc::UnboundedReceiver<Vec<u8>>,
    events: mpsc::UnboundedReceiver<CircuitEvent>,
    accepted: mpsc::UnboundedReceiver<CircuitStream>,
}

impl Harness {
    fn new(link: u64) -> Self {
        Self::with(Arc::new(CircuitRegistry::new()), link, config())
    }

    fn with(registry: Arc<CircuitRegistry>, link: u64, config: HandlerConfig) -> Self {
        let (out_tx, wire) = mpsc::unbounded_channel();
        let (event_tx, events) = mpsc::unbounded_channel();
        let (accept_tx, accepted) = mpsc::unbounded_channel();
        let handler = CircuitHandler::new(
            config,
            Arc::clone(&registry),
            PeerLink::new(link, out_tx),
            event_tx,
            accept_tx,
        );
        Self {
            registry,
            handler,
            wire,
            events,
            accepted,
        }
    }

    fn feed(&self, frame: ControlFrame) {
        self.handler.handle_frame(&Packet::new(16, frame).serialize());
    }

    /// Every frame the handler has written so far.
    fn sent(&mut self) -> Vec<ControlFrame> {
        let mut frames = Vec::new();
        while let Ok(raw) = self.wire.try_recv() {
            frames.push(Packet::parse(&raw).unwrap().frame);
        }
        frames
    }

    /// Accept an inbound circuit from remote 5/6 and clear the wire.
    fn accept(&mut self) -> CircuitStream {
        self.feed(connect_request(5, 6, 4));
        self.sent();
        self.events.try_recv().unwrap();
        self.accepted.try_recv().unwrap()
    }
}

fn connect_request(index: u8, id: u8, window: u8) -> ControlFrame {
    ControlFrame::ConnectRequest(ConnectRequest {
        circuit_index: index,
        circuit_id: id,
        window,
        user: call("G1USR"),
        node: call("G1NOD"),
    })
}

fn info(key: CircuitKey, tx_seq: u8, rx_seq: u8, more_follows: bool, payload: &[u8]) -> ControlFrame {
    ControlFrame::Information {
        your_index: key.index(),
        your_id: key.id(),
        tx_seq,
        rx_seq,
        flags: FrameFlags {
            more_follows,
            ..FrameFlags::default()
        },
        payload: payload.to_vec(),
    }
}

fn info_ack(key: CircuitKey, rx_seq: u8, choke: bool, nak: bool) -> ControlFrame {
    ControlFrame::InformationAck {
        your_index: key.index(),
        your_id: key.id(),
        rx_seq,
        flags: FrameFlags {
            choke,
            nak,
            more_follows: false,
        },
    }
}

fn ack_rx(frame: &ControlFrame) -> (u8, bool) {
    match frame {
        ControlFrame::InformationAck { rx_seq, flags, .. } => (*rx_seq, flags.nak),
        other => panic!("expected information ack, got {other:?}"),
    }
}

// ---------------------------------------------------------------------------
// Connection setup
// ---------------------------------------------------------------------------

#[test]
fn inbound_connect_is_accepted() {
    let mut h = Harness::new(1);
    h.feed(connect_request(5, 6, 7));

    let sent = h.sent();
    assert_eq!(
        sent,
        vec![ControlFrame::ConnectAck {
            your_index: 5,
            your_id: 6,
            my_index: 1,
            my_id: 1,
            window: 4,
            refused: false,
        }]
    );

    let info = h.registry.lookup(1, 1).unwrap();
    assert_eq!(info.state, CircuitState::Connected);
    assert_eq!(info.role, CircuitRole::Responder);
    assert_eq!((info.remote_index, info.remote_id), (5, 6));
    assert_eq!(info.user, call("G1USR"));
    assert_eq!(info.node, call("G1NOD"));
    assert!(info.terminates_locally);

    let stream = h.accepted.try_recv().unwrap();
    assert_eq!(stream.key(), CircuitKey(257));
    assert_eq!(stream.state(), CircuitState::Connected);
    assert_eq!(
        h.events.try_recv().unwrap(),
        CircuitEvent::Connected {
            key: CircuitKey(257),
            role: CircuitRole::Responder,
            user: call("G1USR"),
            node: call("G1NOD"),
        }
    );
}

#[test]
fn granted_window_never_exceeds_proposal() {
    let mut h = Harness::new(1);
    h.feed(connect_request(5, 6, 2));
    match &h.sent()[0] {
        ControlFrame::ConnectAck { window, .. } => assert_eq!(*window, 2),
        other => panic!("unexpected frame {other:?}"),
    }
}

#[test]
fn duplicate_connect_request_is_reacknowledged() {
    let mut h = Harness::new(1);
    h.feed(connect_request(5, 6, 4));
    let first = h.sent();
    h.feed(connect_request(5, 6, 4));
    let second = h.sent();
    assert_eq!(first, second);
    assert_eq!(h.registry.len(), 1);
    assert!(h.accepted.try_recv().is_ok());
    assert!(h.accepted.try_recv().is_err());
}

#[test]
fn connect_request_after_local_disconnect_opens_new_circuit() {
    let mut h = Harness::new(1);
    let stale = h.accept();
    stale.disconnect();
    h.sent();

    h.feed(connect_request(5, 6, 4));
    let fresh = h.accepted.try_recv().unwrap();
    assert_ne!(fresh.key(), stale.key());
    assert_eq!(fresh.state(), CircuitState::Connected);
    assert_eq!(h.registry.len(), 2);
    match &h.sent()[0] {
        ControlFrame::ConnectAck {
            my_index,
            my_id,
            refused,
            ..
        } => {
            assert!(!refused);
            assert_eq!(CircuitKey::new(*my_index, *my_id), fresh.key());
        }
        other => panic!("unexpected frame {other:?}"),
    }
}

#[test]
fn policy_refusal_sets_high_bit() {
    let mut cfg = config();
    cfg.policy = Arc::new(RejectAll);
    let mut h = Harness::with(Arc::new(CircuitRegistry::new()), 1, cfg);
    h.feed(connect_request(5, 6, 4));

    let raw = h.wire.try_recv().unwrap();
    assert!(raw[5] > 127);
    assert_eq!((raw[1], raw[2]), (5, 6));
    assert!(h.registry.is_empty());
    assert!(h.accepted.try_recv().is_err());
}

#[tokio::test]
async fn initiator_connects_and_flushes_queued_data() {
    let mut h = Harness::new(1);
    let mut stream =
        open_circuit(&h.registry, h.handler.link().clone(), &config(), call("G1USR")).unwrap();
    assert_eq!(stream.state(), CircuitState::Connecting);

    assert_eq!(
        h.sent(),
        vec![connect_request_from(1, 1, 4, "G1USR", "G1ABC-1")]
    );

    stream.send(b"early").unwrap();
    assert!(h.sent().is_empty());

    h.feed(ControlFrame::ConnectAck {
        your_index: 1,
        your_id: 1,
        my_index: 9,
        my_id: 10,
        window: 2,
        refused: false,
    });
    stream.connected().await.unwrap();

    assert_eq!(h.sent(), vec![addressed_info(9, 10, 0, 0, false, b"early")]);
    let info = h.registry.info(stream.key()).unwrap();
    assert_eq!(info.window, 2);
    assert!(matches!(
        h.events.try_recv().unwrap(),
        CircuitEvent::Connected {
            role: CircuitRole::Initiator,
            ..
        }
    ));
}

fn connect_request_from(index: u8, id: u8, window: u8, user: &str, node: &str) -> ControlFrame {
    ControlFrame::ConnectRequest(ConnectRequest {
        circuit_index: index,
        circuit_id: id,
        window,
        user: call(user),
        node: call(node),
    })
}

fn addressed_info(
    index: u8,
    id: u8,
    tx_seq: u8,
    rx_seq: u8,
    more_follows: bool,
    payload: &[u8],
) -> ControlFrame {
    info(CircuitKey::new(index, id), tx_seq, rx_seq, more_follows, payload)
}

#[tokio::test]
async fn refused_ack_releases_initiator() {
    let mut h = Harness::new(1);
    let mut stream =
        open_circuit(&h.registry, h.handler.link().clone(), &config(), call("G1USR")).unwrap();
    h.sent();

    // CONNECT_ACK with the refusal bit set
    h.handler.handle_frame(&[16, 1, 1, 0, 0, 0x82]);

    assert!(matches!(stream.connected().await, Err(CircuitError::Refused)));
    assert!(h.registry.is_empty());
    assert_eq!(
        h.events.try_recv().unwrap(),
        CircuitEvent::Refused {
            key: CircuitKey(257)
        }
    );
}

#[tokio::test]
async fn oversized_grant_is_clamped_to_proposal() {
    let mut h = Harness::new(1);
    let mut stream =
        open_circuit(&h.registry, h.handler.link().clone(), &config(), call("G1USR")).unwrap();
    h.sent();

    h.feed(ControlFrame::ConnectAck {
        your_index: 1,
        your_id: 1,
        my_index: 9,
        my_id: 10,
        window: 200,
        refused: false,
    });
    stream.connected().await.unwrap();
    assert_eq!(h.registry.info(stream.key()).unwrap().window, 4);

    for i in 0..130u32 {
        stream.send(&[i as u8]).unwrap();
    }
    assert_eq!(h.sent().len(), 4);

    // acknowledging all four makes room for four more
    h.feed(info_ack(stream.key(), 4, false, false));
    let sent = h.sent();
    assert_eq!(sent.len(), 4);
    assert!(matches!(sent[0], ControlFrame::Information { tx_seq: 4, .. }));
    assert_eq!(
        h.registry
            .with_circuit(stream.key(), |c| c.window().outstanding())
            .unwrap(),
        4
    );
}

#[test]
fn ack_with_high_bit_clear_is_accepted() {
    let mut h = Harness::new(1);
    let stream =
        open_circuit(&h.registry, h.handler.link().clone(), &config(), call("G1USR")).unwrap();
    h.sent();

    // 50 = 0x32: opcode 2, bit 7 clear, no window byte
    h.handler.handle_frame(&[16, 1, 1, 3, 4, 50]);

    let info = h.registry.info(stream.key()).unwrap();
    assert_eq!(info.state, CircuitState::Connected);
    assert_eq!((info.remote_index, info.remote_id), (3, 4));
    assert_eq!(info.window, 1);
}

#[test]
fn unexpected_ack_is_ignored() {
    let mut h = Harness::new(1);
    let _stream = h.accept();
    h.feed(ControlFrame::ConnectAck {
        your_index: 1,
        your_id: 1,
        my_index: 9,
        my_id: 9,
        window: 4,
        refused: true,
    });
    assert_eq!(h.registry.info(CircuitKey(257)).unwrap().state, CircuitState::Connected);
}

// ---------------------------------------------------------------------------
// Data transfer
// ---------------------------------------------------------------------------

#[test]
fn in_sequence_information_is_delivered_and_acked() {
    let mut h = Harness::new(1);
    let mut stream = h.accept();
    let key = stream.key();

    h.feed(info(key, 0, 0, false, b"hello"));
    assert_eq!(stream.try_recv().unwrap(), b"hello");
    let sent = h.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(ack_rx(&sent[0]), (1, false));
    match &sent[0] {
        ControlFrame::InformationAck {
            your_index, your_id, ..
        } => assert_eq!((*your_index, *your_id), (5, 6)),
        other => panic!("unexpected frame {other:?}"),
    }
}

#[test]
fn more_follows_fragments_are_reassembled() {
    let mut h = Harness::new(1);
    let mut stream = h.accept();
    let key = stream.key();

    h.feed(info(key, 0, 0, true, b"abc"));
    assert!(stream.try_recv().is_none());
    h.feed(info(key, 1, 0, true, b"def"));
    assert!(stream.try_recv().is_none());
    h.feed(info(key, 2, 0, false, b"g"));
    assert_eq!(stream.try_recv().unwrap(), b"abcdefg");
    assert_eq!(h.sent().len(), 3);
}

#[test]
fn out_of_sequence_information_is_nakked() {
    let mut h = Harness::new(1);
    let mut stream = h.accept();
    let key = stream.key();

    h.feed(info(key, 3, 0, false, b"early"));
    assert!(stream.try_recv().is_none());
    let sent = h.sent();
    assert_eq!(ack_rx(&sent[0]), (0, true));
    assert_eq!(h.registry.info(key).unwrap().state, CircuitState::Connected);
}

#[test]
fn receive_sequence_wraps_at_127() {
    let mut h = Harness::new(1);
    let mut stream = h.accept();
    let key = stream.key();

    for i in 0..130u32 {
        let seq = (i % 128) as u8;
        h.feed(info(key, seq, 0, false, &[seq]));
        let sent = h.sent();
        assert_eq!(ack_rx(&sent[0]), (((i + 1) % 128) as u8, false), "frame {i}");
        assert_eq!(stream.try_recv().unwrap(), vec![seq]);
    }
}

#[test]
fn outbound_fragments_large_writes() {
    let mut h = Harness::new(1);
    let stream = h.accept();
    let data = vec![0x55u8; 300];
    stream.send(&data).unwrap();

    let sent = h.sent();
    assert_eq!(sent.len(), 2);
    match (&sent[0], &sent[1]) {
        (
            ControlFrame::Information {
                tx_seq: 0,
                flags: first,
                payload: p0,
                ..
            },
            ControlFrame::Information {
                tx_seq: 1,
                flags: second,
                payload: p1,
                ..
            },
        ) => {
            assert!(first.more_follows);
            assert!(!second.more_follows);
            assert_eq!(p0.len(), 236);
            assert_eq!(p1.len(), 64);
        }
        other => panic!("unexpected frames {other:?}"),
    }
}

#[test]
fn window_limits_frames_in_flight() {
    let mut h = Harness::new(1);
    h.feed(connect_request(5, 6, 2));
    h.sent();
    let stream = h.accepted.try_recv().unwrap();
    let key = stream.key();

    for msg in [b"one", b"two", b"six"] {
        stream.send(msg).unwrap();
    }
    assert_eq!(h.sent().len(), 2);

    h.feed(info_ack(key, 2, false, false));
    let sent = h.sent();
    assert_eq!(sent, vec![addressed_info(5, 6, 2, 0, false, b"six")]);
}

#[test]
fn piggy_backed_ack_opens_window() {
    let mut h = Harness::new(1);
    h.feed(connect_request(5, 6, 1));
    h.sent();
    let mut stream = h.accepted.try_recv().unwrap();
    let key = stream.key();

    stream.send(b"a").unwrap();
    stream.send(b"b").unwrap();
    assert_eq!(h.sent().len(), 1);

    // peer's data frame acknowledges our frame 0
    h.feed(info(key, 0, 1, false, b"reply"));
    assert_eq!(stream.try_recv().unwrap(), b"reply");
    let sent = h.sent();
    assert_eq!(sent.len(), 2);
    assert_eq!(ack_rx(&sent[0]), (1, false));
    assert_eq!(sent[1], addressed_info(5, 6, 1, 1, false, b"b"));
}

#[test]
fn choke_suspends_and_resumes_sending() {
    let mut h = Harness::new(1);
    let stream = h.accept();
    let key = stream.key();

    h.feed(info_ack(key, 0, true, false));
    stream.send(b"held").unwrap();
    assert!(h.sent().is_empty());
    let info = h.registry.info(key).unwrap();
    assert_eq!(info.state, CircuitState::Connected);

    h.feed(info_ack(key, 0, false, false));
    assert_eq!(h.sent(), vec![addressed_info(5, 6, 0, 0, false, b"held")]);
}

#[test]
fn choked_information_suspends_sending() {
    let mut h = Harness::new(1);
    let mut stream = h.accept();
    let key = stream.key();

    h.feed(ControlFrame::Information {
        your_index: key.index(),
        your_id: key.id(),
        tx_seq: 0,
        rx_seq: 0,
        flags: FrameFlags {
            choke: true,
            nak: false,
            more_follows: false,
        },
        payload: b"busy".to_vec(),
    });
    assert_eq!(stream.try_recv().unwrap(), b"busy");
    let sent = h.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(ack_rx(&sent[0]), (1, false));

    stream.send(b"held").unwrap();
    assert!(h.sent().is_empty());
    assert!(h.registry.with_circuit(key, |c| c.window().is_peer_choked()).unwrap());

    h.feed(info_ack(key, 0, false, false));
    assert_eq!(h.sent(), vec![addressed_info(5, 6, 0, 1, false, b"held")]);
}

#[test]
fn nak_retransmits_requested_frame() {
    let mut h = Harness::new(1);
    let stream = h.accept();
    let key = stream.key();

    stream.send(b"first").unwrap();
    stream.send(b"second").unwrap();
    assert_eq!(h.sent().len(), 2);

    h.feed(info_ack(key, 1, false, true));
    assert_eq!(h.sent(), vec![addressed_info(5, 6, 1, 0, false, b"second")]);
}

#[test]
fn reset_zeroes_sequence_numbers() {
    let mut h = Harness::new(1);
    let mut stream = h.accept();
    let key = stream.key();

    h.feed(info(key, 0, 0, false, b"a"));
    h.feed(info(key, 1, 0, true, b"partial"));
    h.sent();
    assert_eq!(stream.try_recv().unwrap(), b"a");

    h.feed(ControlFrame::Reset {
        your_index: key.index(),
        your_id: key.id(),
    });
    h.feed(info(key, 0, 0, false, b"b"));
    // the partial message was dropped with the reassembly buffer
    assert_eq!(stream.try_recv().unwrap(), b"b");
    assert_eq!(ack_rx(&h.sent()[0]), (1, false));
}

#[test]
fn frames_from_another_session_are_ignored() {
    let registry = Arc::new(CircuitRegistry::new());
    let mut first = Harness::with(Arc::clone(&registry), 1, config());
    let mut second = Harness::with(Arc::clone(&registry), 2, config());
    let mut stream = first.accept();

    second.feed(info(stream.key(), 0, 0, false, b"spoof"));
    assert!(second.sent().is_empty());
    assert!(stream.try_recv().is_none());
}

// ---------------------------------------------------------------------------
// Teardown
// ---------------------------------------------------------------------------

#[tokio::test]
async fn disconnect_request_is_acknowledged_and_released() {
    let mut h = Harness::new(1);
    let mut stream = h.accept();
    let key = stream.key();

    h.feed(ControlFrame::DisconnectRequest {
        your_index: key.index(),
        your_id: key.id(),
    });

    assert_eq!(
        h.sent(),
        vec![ControlFrame::DisconnectAck {
            your_index: 5,
            your_id: 6
        }]
    );
    assert!(h.registry.is_empty());
    assert!(stream.recv().await.is_none());
    assert_eq!(h.events.try_recv().unwrap(), CircuitEvent::Disconnected { key });
}

#[test]
fn local_disconnect_waits_for_ack() {
    let mut h = Harness::new(1);
    let stream = h.accept();
    let key = stream.key();

    stream.disconnect();
    assert_eq!(
        h.sent(),
        vec![ControlFrame::DisconnectRequest {
            your_index: 5,
            your_id: 6
        }]
    );
    assert_eq!(stream.state(), CircuitState::Disconnected);
    assert_eq!(h.registry.len(), 1);
    assert!(matches!(stream.send(b"late"), Err(CircuitError::NotConnected)));

    h.feed(ControlFrame::DisconnectAck {
        your_index: key.index(),
        your_id: key.id(),
    });
    assert!(h.registry.is_empty());
    assert_eq!(h.events.try_recv().unwrap(), CircuitEvent::Disconnected { key });
}

#[test]
fn dropping_stream_disconnects_circuit() {
    let mut h = Harness::new(1);
    let stream = h.accept();
    let key = stream.key();

    drop(stream);
    assert_eq!(
        h.sent(),
        vec![ControlFrame::DisconnectRequest {
            your_index: 5,
            your_id: 6
        }]
    );
    assert_eq!(h.registry.info(key).unwrap().state, CircuitState::Disconnected);
}

#[test]
fn dropping_connecting_stream_releases_circuit() {
    let mut h = Harness::new(1);
    let stream =
        open_circuit(&h.registry, h.handler.link().clone(), &config(), call("G1USR")).unwrap();
    h.sent();

    drop(stream);
    assert!(h.registry.is_empty());
    assert!(h.sent().is_empty());
}

#[test]
fn detached_stream_leaves_circuit_open() {
    let mut h = Harness::new(1);
    let key = h.accept().detach();
    assert!(h.sent().is_empty());
    assert_eq!(h.registry.info(key).unwrap().state, CircuitState::Connected);
}

#[tokio::test]
async fn transport_close_drains_session() {
    let Harness {
        registry,
        handler,
        mut events,
        mut accepted,
        ..
    } = Harness::new(1);
    let (in_tx, in_rx) = mpsc::channel(8);
    let (_stop_tx, stop_rx) = watch::channel(false);

    in_tx
        .send(Packet::new(16, connect_request(5, 6, 4)).serialize())
        .await
        .unwrap();
    in_tx.send(vec![1, 2, 3]).await.unwrap();
    drop(in_tx);

    assert_eq!(handler.run(in_rx, stop_rx).await, HandlerExit::TransportClosed);
    assert!(registry.is_empty());
    assert!(matches!(events.try_recv().unwrap(), CircuitEvent::Connected { .. }));
    assert_eq!(
        events.try_recv().unwrap(),
        CircuitEvent::Lost {
            key: CircuitKey(257)
        }
    );
    let mut stream = accepted.try_recv().unwrap();
    assert!(stream.recv().await.is_none());
}

#[tokio::test]
async fn stop_signal_disconnects_circuits() {
    let Harness {
        registry,
        handler,
        mut wire,
        mut accepted,
        ..
    } = Harness::new(1);
    let (in_tx, in_rx) = mpsc::channel(8);
    let (stop_tx, stop_rx) = watch::channel(false);

    let task = tokio::spawn(handler.run(in_rx, stop_rx));
    in_tx
        .send(Packet::new(16, connect_request(5, 6, 4)).serialize())
        .await
        .unwrap();
    let _stream = accepted.recv().await.unwrap();
    stop_tx.send(true).unwrap();

    assert_eq!(task.await.unwrap(), HandlerExit::Stopped);
    assert!(registry.is_empty());
    let frames: Vec<ControlFrame> = std::iter::from_fn(|| wire.try_recv().ok())
        .map(|raw| Packet::parse(&raw).unwrap().frame)
        .collect();
    assert_eq!(
        frames.last(),
        Some(&ControlFrame::DisconnectRequest {
            your_index: 5,
            your_id: 6
        })
    );
}

// ---------------------------------------------------------------------------
// Transit relaying
// ---------------------------------------------------------------------------

#[test]
fn paired_circuits_relay_fragments_and_teardown() {
    let registry = Arc::new(CircuitRegistry::new());
    let mut inbound = Harness::with(Arc::clone(&registry), 1, config());
    let mut onward = Harness::with(Arc::clone(&registry), 2, config());

    let a = inbound.accept();
    let b = open_circuit(&registry, onward.handler.link().clone(), &config(), call("G1USR")).unwrap();
    onward.sent();
    onward.feed(ControlFrame::ConnectAck {
        your_index: b.key().index(),
        your_id: b.key().id(),
        my_index: 20,
        my_id: 21,
        window: 4,
        refused: false,
    });
    assert!(registry.pair(a.key(), b.key()));

    inbound.feed(info(a.key(), 0, 0, true, b"part1"));
    assert_eq!(ack_rx(&inbound.sent()[0]), (1, false));
    assert_eq!(
        onward.sent(),
        vec![addressed_info(20, 21, 0, 0, true, b"part1")]
    );

    // and back the other way
    onward.feed(info(b.key(), 0, 1, false, b"reply"));
    assert_eq!(ack_rx(&onward.sent()[0]), (1, false));
    assert_eq!(
        inbound.sent(),
        vec![addressed_info(5, 6, 0, 1, false, b"reply")]
    );

    inbound.feed(ControlFrame::DisconnectRequest {
        your_index: a.key().index(),
        your_id: a.key().id(),
    });
    assert_eq!(
        inbound.sent(),
        vec![ControlFrame::DisconnectAck {
            your_index: 5,
            your_id: 6
        }]
    );
    assert_eq!(
        onward.sent(),
        vec![ControlFrame::DisconnectRequest {
            your_index: 20,
            your_id: 21
        }]
    );
    assert!(registry.info(a.key()).is_none());
    assert_eq!(registry.info(b.key()).unwrap().state, CircuitState::Disconnected);

    onward.feed(ControlFrame::DisconnectAck {
        your_index: b.key().index(),
        your_id: b.key().id(),
    });
    assert!(registry.is_empty());
}

#[test]
fn refused_onward_circuit_disconnects_inbound() {
    let registry = Arc::new(CircuitRegistry::new());
    let mut inbound = Harness::with(Arc::clone(&registry), 1, config());
    let mut onward = Harness::with(Arc::clone(&registry), 2, config());

    let a = inbound.accept();
    let b = open_circuit(&registry, onward.handler.link().clone(), &config(), call("G1USR")).unwrap();
    assert!(registry.pair(a.key(), b.key()));

    onward.feed(ControlFrame::ConnectAck {
        your_index: b.key().index(),
        your_id: b.key().id(),
        my_index: 0,
        my_id: 0,
        window: 0,
        refused: true,
    });
    assert!(registry.info(b.key()).is_none());
    assert_eq!(
        inbound.sent(),
        vec![ControlFrame::DisconnectRequest {
            your_index: 5,
            your_id: 6
        }]
    );
}
