//! The node service and its event loop.
//!
//! A [`Node`] owns the receiving ends of its event channels and runs the
//! loop; a cloneable [`NodeHandle`] carries the operations (beaconing,
//! connecting, forwarding) so they can be driven from other tasks while the
//! loop runs.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use parking_lot::Mutex;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use netrom_core::constants::{MAX_QUALITY, NODES_DESTINATION};
use netrom_core::{Callsign, Mnemonic};
use netrom_interfaces::{InterfaceId, KissTcpConfig, KissTcpConnector, LinkEvent, LinkFrame, Session};
use netrom_protocol::{
    AcceptAll, AdmissionPolicy, CircuitError, CircuitEvent, CircuitHandler, CircuitKey,
    CircuitRegistry, CircuitStream, HandlerConfig, HandlerExit, PeerLink, RejectAll, open_circuit,
};
use netrom_transport::route::encode_routing_broadcast;
use netrom_transport::{ClassicRoute, RoutingListener, RoutingTables};

use crate::config::NodeConfig;
use crate::connector::AnyConnector;
use crate::error::NodeError;
use crate::storage::Storage;

/// How often expired routes are swept out.
const CULL_INTERVAL: Duration = Duration::from_secs(60);

/// Depth of the link event queue feeding the loop.
const EVENT_QUEUE: usize = 1024;

/// Seconds since the Unix epoch, the clock routes are stamped with.
pub fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

#[derive(Debug)]
enum NodeEvent {
    Link {
        interface: InterfaceId,
        event: LinkEvent,
    },
    ConnectorDown {
        interface: InterfaceId,
    },
    SessionClosed {
        session: u64,
        exit: HandlerExit,
    },
}

/// A session with a handler task bound to it.
struct ActiveSession {
    interface: InterfaceId,
    peer: Callsign,
    link: PeerLink,
    task: JoinHandle<()>,
}

/// State shared between the loop and every handle.
struct Shared {
    callsign: Callsign,
    alias: Mnemonic,
    nodes: Callsign,
    tables: Arc<RoutingTables>,
    listener: RoutingListener,
    registry: Arc<CircuitRegistry>,
    handler_config: HandlerConfig,
    connectors: Mutex<HashMap<InterfaceId, Arc<AnyConnector>>>,
    sessions: Mutex<HashMap<u64, ActiveSession>>,
    event_tx: mpsc::Sender<NodeEvent>,
    circuit_tx: mpsc::UnboundedSender<CircuitEvent>,
    accepted_tx: mpsc::UnboundedSender<CircuitStream>,
    shutdown_rx: watch::Receiver<bool>,
}

/// Signals a running node to stop.
#[derive(Clone)]
pub struct ShutdownHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl ShutdownHandle {
    pub fn shutdown(&self) {
        self.tx.send_replace(true);
    }
}

/// A Net/ROM node: connectors, routing tables, circuits and the event loop.
pub struct Node {
    config: NodeConfig,
    shared: Arc<Shared>,
    storage: Option<Storage>,
    event_rx: mpsc::Receiver<NodeEvent>,
    circuit_rx: mpsc::UnboundedReceiver<CircuitEvent>,
    accepted_rx: Option<mpsc::UnboundedReceiver<CircuitStream>>,
    shutdown_tx: Arc<watch::Sender<bool>>,
    shutdown_rx: watch::Receiver<bool>,
    bridge_handles: Vec<JoinHandle<()>>,
    next_id: u64,
    started: bool,
}

impl Node {
    /// Build a node from configuration. Connectors are created by
    /// [`start`](Self::start).
    pub fn new(config: NodeConfig) -> Result<Self, NodeError> {
        config.validate()?;
        let callsign = config.callsign()?;
        let alias = config.alias()?;
        let nodes = Callsign::new(NODES_DESTINATION, 0)
            .map_err(|e| NodeError::Config(format!("broadcast address: {e}")))?;

        let policy: Arc<dyn AdmissionPolicy> = if config.node.accept_connections {
            Arc::new(AcceptAll)
        } else {
            Arc::new(RejectAll)
        };
        let handler_config = HandlerConfig {
            node: callsign.clone(),
            ttl: config.node.ttl,
            max_window: config.node.window,
            policy,
        };

        // Storage problems never stop the node.
        let storage = match config.storage_path() {
            Some(path) => match Storage::new(path) {
                Ok(storage) => Some(storage),
                Err(e) => {
                    tracing::warn!("failed to initialize storage: {e}");
                    None
                }
            },
            None => None,
        };

        let tables = Arc::new(RoutingTables::new());
        let (event_tx, event_rx) = mpsc::channel(EVENT_QUEUE);
        let (circuit_tx, circuit_rx) = mpsc::unbounded_channel();
        let (accepted_tx, accepted_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let shared = Arc::new(Shared {
            callsign,
            alias,
            nodes,
            listener: RoutingListener::new(Arc::clone(&tables)),
            tables,
            registry: Arc::new(CircuitRegistry::new()),
            handler_config,
            connectors: Mutex::new(HashMap::new()),
            sessions: Mutex::new(HashMap::new()),
            event_tx,
            circuit_tx,
            accepted_tx,
            shutdown_rx: shutdown_rx.clone(),
        });

        Ok(Self {
            config,
            shared,
            storage,
            event_rx,
            circuit_rx,
            accepted_rx: Some(accepted_rx),
            shutdown_tx: Arc::new(shutdown_tx),
            shutdown_rx,
            bridge_handles: Vec::new(),
            next_id: 1,
            started: false,
        })
    }

    pub fn handle(&self) -> NodeHandle {
        NodeHandle {
            shared: Arc::clone(&self.shared),
        }
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            tx: Arc::clone(&self.shutdown_tx),
        }
    }

    /// Take the stream of locally terminated inbound circuits.
    ///
    /// Without a taker, inbound circuits are disconnected as they arrive.
    pub fn incoming(&mut self) -> Option<mpsc::UnboundedReceiver<CircuitStream>> {
        self.accepted_rx.take()
    }

    /// A fresh interface id for a connector built outside the config.
    pub fn allocate_interface_id(&mut self) -> InterfaceId {
        let id = InterfaceId(self.next_id);
        self.next_id += 1;
        id
    }

    /// Register a connector. It is started with the node.
    pub fn add_connector(&mut self, connector: impl Into<AnyConnector>) -> Result<(), NodeError> {
        if self.started {
            return Err(NodeError::AlreadyRunning);
        }
        let connector = connector.into();
        let id = connector.id();
        self.next_id = self.next_id.max(id.0 + 1);
        let mut connectors = self.shared.connectors.lock();
        if connectors.contains_key(&id) {
            return Err(NodeError::Config(format!(
                "duplicate interface id {}",
                id.0
            )));
        }
        connectors.insert(id, Arc::new(connector));
        Ok(())
    }

    /// Load saved routes, build and start connectors, begin receiving.
    pub async fn start(&mut self) -> Result<(), NodeError> {
        if self.started {
            return Err(NodeError::AlreadyRunning);
        }

        if let Some(ref storage) = self.storage {
            match storage.load_routing_table().await {
                Ok((classic, inp3)) => {
                    let count = classic.len() + inp3.len();
                    if count > 0 {
                        tracing::info!("loaded {count} saved route(s)");
                    }
                    *self.shared.tables.classic() = classic;
                    *self.shared.tables.inp3() = inp3;
                }
                Err(e) => tracing::warn!("failed to load routing table: {e}"),
            }
        }

        self.create_connectors()?;
        self.started = true;

        let connectors: Vec<Arc<AnyConnector>> =
            self.shared.connectors.lock().values().cloned().collect();
        for connector in &connectors {
            connector.start().await?;
        }
        self.spawn_receive_bridges(connectors);

        tracing::info!(
            callsign = %self.shared.callsign,
            alias = %self.shared.alias,
            "node started with {} interface(s)",
            self.shared.connectors.lock().len()
        );
        Ok(())
    }

    fn create_connectors(&mut self) -> Result<(), NodeError> {
        let mut built = Vec::new();
        for entry in &self.config.interfaces.kiss_tcp {
            let id = InterfaceId(self.next_id);
            self.next_id += 1;
            let mut config =
                KissTcpConfig::new(&entry.name, &entry.target, self.shared.callsign.clone());
            config.port = entry.port;
            config.max_reconnect_tries = entry.max_reconnect_tries;
            built.push(AnyConnector::KissTcp(KissTcpConnector::new(config, id)?));
        }
        let mut connectors = self.shared.connectors.lock();
        for connector in built {
            connectors.insert(connector.id(), Arc::new(connector));
        }
        Ok(())
    }

    fn spawn_receive_bridges(&mut self, connectors: Vec<Arc<AnyConnector>>) {
        for connector in connectors {
            let interface = connector.id();
            let event_tx = self.shared.event_tx.clone();
            let mut shutdown_rx = self.shutdown_rx.clone();

            let handle = tokio::spawn(async move {
                loop {
                    tokio::select! {
                        biased;
                        _ = shutdown_rx.changed() => break,
                        result = connector.receive() => match result {
                            Ok(event) => {
                                if event_tx.send(NodeEvent::Link { interface, event }).await.is_err() {
                                    break;
                                }
                            }
                            Err(e) => {
                                tracing::warn!(id = interface.0, "receive error: {e}");
                                let _ = event_tx.send(NodeEvent::ConnectorDown { interface }).await;
                                break;
                            }
                        },
                    }
                }
            });
            self.bridge_handles.push(handle);
        }
    }

    /// Run until [`ShutdownHandle::shutdown`] is called.
    pub async fn run(&mut self) {
        let beacon_every = self.config.node.beacon_interval();
        let mut beacon = tokio::time::interval(beacon_every.unwrap_or(Duration::from_secs(3600)));
        let mut cull = tokio::time::interval(CULL_INTERVAL);
        let persist_secs = self.config.storage.persist_interval;
        let persist_enabled = persist_secs > 0 && self.storage.is_some();
        let mut persist = tokio::time::interval(Duration::from_secs(persist_secs.max(1)));

        // The first beacon goes out at once; the others wait a full period.
        cull.tick().await;
        persist.tick().await;

        let handle = self.handle();
        tracing::info!("entering event loop");

        loop {
            if *self.shutdown_rx.borrow() {
                break;
            }
            tokio::select! {
                biased;

                _ = self.shutdown_rx.changed() => {
                    tracing::info!("shutdown signal received");
                    break;
                }

                event = self.event_rx.recv() => match event {
                    Some(event) => self.handle_event(event),
                    None => break,
                },

                Some(event) = self.circuit_rx.recv() => log_circuit_event(&event),

                Some(stream) = next_accepted(&mut self.accepted_rx) => {
                    tracing::info!(circuit = %stream.key(), "no application bound, disconnecting");
                    stream.disconnect();
                }

                _ = beacon.tick(), if beacon_every.is_some() => {
                    handle.send_node_broadcast().await;
                }

                _ = cull.tick() => {
                    let (classic, inp3) = self.shared.tables.cull(now_secs());
                    if classic + inp3 > 0 {
                        tracing::debug!(classic, inp3, "culled expired routes");
                    }
                }

                _ = persist.tick(), if persist_enabled => {
                    self.persist_state().await;
                }
            }
        }
    }

    fn handle_event(&mut self, event: NodeEvent) {
        match event {
            NodeEvent::Link {
                interface,
                event: LinkEvent::Frame(frame),
            } => self.on_frame(interface, &frame),
            NodeEvent::Link {
                event: LinkEvent::SessionAccepted(session),
                ..
            } => {
                self.handle().accepted_connection(session);
            }
            NodeEvent::ConnectorDown { interface } => {
                tracing::warn!(id = interface.0, "interface down");
            }
            NodeEvent::SessionClosed { session, exit } => {
                if let Some(active) = self.shared.sessions.lock().remove(&session) {
                    tracing::info!(session, peer = %active.peer, "session closed: {exit}");
                }
            }
        }
    }

    fn on_frame(&self, interface: InterfaceId, frame: &LinkFrame) {
        if !frame.is_netrom() || frame.source == self.shared.callsign {
            return;
        }
        let learned =
            self.shared
                .listener
                .on_broadcast(&frame.source, interface, &frame.payload, now_secs());
        if learned > 0 {
            tracing::debug!(source = %frame.source, learned, "routes updated");
        }
    }

    async fn persist_state(&self) {
        if let Some(ref storage) = self.storage {
            match storage.save_routing_table(&self.shared.tables).await {
                Ok(()) => tracing::debug!("persisted routing table"),
                Err(e) => tracing::warn!("failed to persist routing table: {e}"),
            }
        }
    }

    /// Stop handlers and connectors, then save routes.
    pub async fn shutdown(mut self) {
        tracing::info!("shutting down node");
        self.shutdown_tx.send_replace(true);

        for handle in self.bridge_handles.drain(..) {
            let _ = handle.await;
        }

        let sessions: Vec<ActiveSession> =
            self.shared.sessions.lock().drain().map(|(_, s)| s).collect();
        for session in sessions {
            let _ = session.task.await;
        }

        let connectors: Vec<Arc<AnyConnector>> =
            self.shared.connectors.lock().values().cloned().collect();
        for connector in connectors {
            if let Err(e) = connector.stop().await {
                tracing::warn!(id = connector.id().0, "error stopping interface: {e}");
            }
        }

        self.persist_state().await;
        tracing::info!("node shutdown complete");
    }
}

async fn next_accepted(
    rx: &mut Option<mpsc::UnboundedReceiver<CircuitStream>>,
) -> Option<CircuitStream> {
    match rx {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

fn log_circuit_event(event: &CircuitEvent) {
    match event {
        CircuitEvent::Connected {
            key,
            role,
            user,
            node,
        } => tracing::info!(circuit = %key, ?role, %user, %node, "circuit connected"),
        CircuitEvent::Refused { key } => tracing::info!(circuit = %key, "circuit refused"),
        CircuitEvent::Disconnected { key } => {
            tracing::info!(circuit = %key, "circuit disconnected")
        }
        CircuitEvent::Lost { key } => tracing::info!(circuit = %key, "circuit lost"),
    }
}

/// Cloneable access to a node's operations.
#[derive(Clone)]
pub struct NodeHandle {
    shared: Arc<Shared>,
}

impl NodeHandle {
    pub fn callsign(&self) -> &Callsign {
        &self.shared.callsign
    }

    pub fn alias(&self) -> &Mnemonic {
        &self.shared.alias
    }

    pub fn tables(&self) -> &Arc<RoutingTables> {
        &self.shared.tables
    }

    pub fn registry(&self) -> &Arc<CircuitRegistry> {
        &self.shared.registry
    }

    pub fn session_count(&self) -> usize {
        self.shared.sessions.lock().len()
    }

    /// Announce ourselves on every interface. Returns how many accepted it.
    pub async fn send_node_broadcast(&self) -> usize {
        let connectors: Vec<Arc<AnyConnector>> =
            self.shared.connectors.lock().values().cloned().collect();
        let mut sent = 0;
        for connector in connectors {
            let route = ClassicRoute {
                source: self.shared.callsign.clone(),
                destination: self.shared.callsign.clone(),
                mnemonic: self.shared.alias.clone(),
                neighbour: self.shared.callsign.clone(),
                quality: MAX_QUALITY,
                interface: connector.id(),
                last_heard: now_secs(),
            };
            let payload = encode_routing_broadcast(&route);
            match connector.send_ui(&self.shared.nodes, &payload).await {
                Ok(()) => sent += 1,
                Err(e) => tracing::debug!(id = connector.id().0, "beacon not sent: {e}"),
            }
        }
        tracing::debug!(interfaces = sent, "sent NODES broadcast");
        sent
    }

    /// Bind a circuit handler to an inbound session.
    pub fn accepted_connection(&self, session: Session) {
        let peer = session.peer().clone();
        self.attach(session);
        tracing::info!(%peer, "accepted session");
    }

    /// Spawn the handler task for `session` and record it as active.
    fn attach(&self, session: Session) -> PeerLink {
        let id = session.id();
        let interface = session.interface();
        let peer = session.peer().clone();
        let (inbound, outbound) = session.into_parts();
        let link = PeerLink::new(id, outbound);

        let handler = CircuitHandler::new(
            self.shared.handler_config.clone(),
            Arc::clone(&self.shared.registry),
            link.clone(),
            self.shared.circuit_tx.clone(),
            self.shared.accepted_tx.clone(),
        );
        let stop = self.shared.shutdown_rx.clone();
        let events = self.shared.event_tx.clone();
        let task = tokio::spawn(async move {
            let exit = handler.run(inbound, stop).await;
            let _ = events.send(NodeEvent::SessionClosed { session: id, exit }).await;
        });

        self.shared.sessions.lock().insert(
            id,
            ActiveSession {
                interface,
                peer,
                link: link.clone(),
                task,
            },
        );
        link
    }

    /// An open session to `neighbour` on `interface`, if one exists.
    fn session_to(&self, neighbour: &Callsign, interface: InterfaceId) -> Option<PeerLink> {
        self.shared
            .sessions
            .lock()
            .values()
            .find(|s| s.interface == interface && &s.peer == neighbour && !s.link.is_closed())
            .map(|s| s.link.clone())
    }

    /// Open a circuit to `destination` (callsign or alias) on behalf of `user`.
    ///
    /// The neighbour comes from the best classic route, else the best INP3
    /// route. An existing session to it is reused.
    pub async fn connect(
        &self,
        destination: &str,
        user: Callsign,
    ) -> Result<CircuitStream, NodeError> {
        let hop = self
            .shared
            .tables
            .next_hop(destination, now_secs())
            .ok_or_else(|| NodeError::NoRoute(destination.to_string()))?;

        let link = match self.session_to(&hop.neighbour, hop.interface) {
            Some(link) => link,
            None => {
                let connector = self
                    .shared
                    .connectors
                    .lock()
                    .get(&hop.interface)
                    .cloned()
                    .ok_or(NodeError::UnknownInterface(hop.interface))?;
                let session = connector.open_session(&hop.neighbour).await?;
                self.attach(session)
            }
        };

        tracing::info!(
            %destination,
            neighbour = %hop.neighbour,
            dialect = ?hop.dialect,
            "opening circuit"
        );
        Ok(open_circuit(
            &self.shared.registry,
            link,
            &self.shared.handler_config,
            user,
        )?)
    }

    /// Relay `inbound` to `destination` through an onward circuit.
    ///
    /// The inbound circuit stops terminating locally and both streams are
    /// detached. Returns the onward circuit's key. On failure the inbound
    /// circuit is disconnected.
    pub async fn forward(
        &self,
        inbound: CircuitStream,
        destination: &str,
    ) -> Result<CircuitKey, NodeError> {
        let info = inbound
            .info()
            .ok_or(NodeError::Circuit(CircuitError::NotConnected))?;
        let onward = match self.connect(destination, info.user).await {
            Ok(onward) => onward,
            Err(e) => {
                inbound.disconnect();
                return Err(e);
            }
        };
        if !self.shared.registry.pair(inbound.key(), onward.key()) {
            onward.disconnect();
            inbound.disconnect();
            return Err(NodeError::Circuit(CircuitError::NotConnected));
        }
        let inbound = inbound.detach();
        let onward = onward.detach();
        tracing::info!(%inbound, %onward, %destination, "circuit forwarded");
        Ok(onward)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use netrom_interfaces::{LinkConnector, LoopbackConnector, LoopbackHub};

    fn config(callsign: &str) -> NodeConfig {
        let mut config = NodeConfig::new(callsign);
        config.storage.enabled = false;
        config
    }

    #[test]
    fn alias_is_derived_when_unset() {
        let node = Node::new(config("G8BCD")).unwrap();
        assert_eq!(node.handle().alias().as_str(), "BCDNOD");
    }

    #[test]
    fn rejects_duplicate_interface_ids() {
        let hub = LoopbackHub::new();
        let mut node = Node::new(config("G1ABC")).unwrap();
        let call = node.handle().callsign().clone();
        let id = node.allocate_interface_id();
        node.add_connector(LoopbackConnector::new("a", id, call.clone(), Arc::clone(&hub)))
            .unwrap();
        let err = node
            .add_connector(LoopbackConnector::new("b", id, call, hub))
            .unwrap_err();
        assert!(matches!(err, NodeError::Config(_)));
        assert_eq!(node.allocate_interface_id(), InterfaceId(id.0 + 1));
    }

    #[tokio::test]
    async fn beacon_carries_self_route() {
        let hub = LoopbackHub::new();
        let mut node = Node::new(config("G1ABC")).unwrap();
        let id = node.allocate_interface_id();
        node.add_connector(LoopbackConnector::new(
            "loop",
            id,
            "G1ABC".parse().unwrap(),
            Arc::clone(&hub),
        ))
        .unwrap();
        let station = LoopbackConnector::new("rx", InterfaceId(99), "G8BCD".parse().unwrap(), hub);
        station.start().await.unwrap();
        node.start().await.unwrap();

        assert_eq!(node.handle().send_node_broadcast().await, 1);
        let LinkEvent::Frame(frame) = station.receive().await.unwrap() else {
            panic!("expected a UI frame");
        };
        assert_eq!(frame.destination.to_string(), "NODES");
        assert_eq!(frame.source.to_string(), "G1ABC");
        assert_eq!(&frame.payload[..7], b"\xFFABCNOD");
        assert_eq!(frame.payload.len(), 7 + 21);
        assert_eq!(*frame.payload.last().unwrap(), 255);

        node.shutdown().await;
    }

    #[tokio::test]
    async fn own_broadcasts_are_ignored() {
        let node = Node::new(config("G1ABC")).unwrap();
        let route = ClassicRoute {
            source: "G1ABC".parse().unwrap(),
            destination: "G1ABC".parse().unwrap(),
            mnemonic: Mnemonic::new("ABCNOD").unwrap(),
            neighbour: "G1ABC".parse().unwrap(),
            quality: 255,
            interface: InterfaceId(1),
            last_heard: 0,
        };
        let frame = LinkFrame::netrom(
            "G1ABC".parse().unwrap(),
            "NODES".parse().unwrap(),
            encode_routing_broadcast(&route),
        );
        node.on_frame(InterfaceId(1), &frame);
        assert!(node.handle().tables().classic().is_empty());

        let mut heard = frame.clone();
        heard.source = "G8BCD".parse().unwrap();
        node.on_frame(InterfaceId(1), &heard);
        assert_eq!(node.handle().tables().classic().len(), 1);

        let mut other_pid = heard;
        other_pid.pid = 0xF0;
        node.handle().tables().classic().clear();
        node.on_frame(InterfaceId(1), &other_pid);
        assert!(node.handle().tables().classic().is_empty());
    }

    #[tokio::test]
    async fn connect_without_route_fails() {
        let node = Node::new(config("G1ABC")).unwrap();
        let err = node
            .handle()
            .connect("NOWHERE", "G1ABC".parse().unwrap())
            .await
            .unwrap_err();
        assert!(matches!(err, NodeError::NoRoute(d) if d == "NOWHERE"));
    }

    #[tokio::test]
    async fn add_connector_after_start_fails() {
        let mut node = Node::new(config("G1ABC")).unwrap();
        node.start().await.unwrap();
        let hub = LoopbackHub::new();
        let err = node
            .add_connector(LoopbackConnector::new(
                "late",
                InterfaceId(9),
                "G1ABC".parse().unwrap(),
                hub,
            ))
            .unwrap_err();
        assert!(matches!(err, NodeError::AlreadyRunning));
        assert!(matches!(node.start().await, Err(NodeError::AlreadyRunning)));
        node.shutdown().await;
    }
}
