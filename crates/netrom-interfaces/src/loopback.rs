//! In-memory connector for tests and embedding.
//!
//! Every [`LoopbackConnector`] attached to the same [`LoopbackHub`] can hear
//! the others: UI frames to `NODES` reach every other station, frames to a
//! callsign reach that station only, and sessions are a pair of channels
//! bridged by two small tasks.

use std::collections::HashMap;
use std::sync::Arc;

use netrom_core::Callsign;
use netrom_core::constants::NODES_DESTINATION;
use netrom_transport::InterfaceId;
use parking_lot::Mutex;
use tokio::sync::{Mutex as AsyncMutex, mpsc, watch};
use tracing::{debug, trace};

use crate::error::InterfaceError;
use crate::session::Session;
use crate::shutdown::ShutdownToken;
use crate::traits::{LinkConnector, LinkEvent, LinkFrame};

/// Depth of each station's event queue and of session inbound queues.
const LOOPBACK_QUEUE: usize = 256;

#[derive(Clone)]
struct Station {
    interface: InterfaceId,
    events: mpsc::Sender<LinkEvent>,
}

/// The shared medium joining loopback connectors.
#[derive(Default)]
pub struct LoopbackHub {
    stations: Mutex<HashMap<Callsign, Station>>,
}

impl LoopbackHub {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Callsigns currently attached.
    pub fn stations(&self) -> Vec<Callsign> {
        let mut calls: Vec<Callsign> = self.stations.lock().keys().cloned().collect();
        calls.sort();
        calls
    }

    fn attach(&self, callsign: Callsign, station: Station) {
        self.stations.lock().insert(callsign, station);
    }

    fn detach(&self, callsign: &Callsign) {
        self.stations.lock().remove(callsign);
    }

    fn station(&self, callsign: &Callsign) -> Option<Station> {
        self.stations.lock().get(callsign).cloned()
    }

    fn everyone_but(&self, callsign: &Callsign) -> Vec<Station> {
        self.stations
            .lock()
            .iter()
            .filter(|(call, _)| *call != callsign)
            .map(|(_, station)| station.clone())
            .collect()
    }
}

/// A connector whose "radio" is a [`LoopbackHub`].
pub struct LoopbackConnector {
    name: String,
    id: InterfaceId,
    callsign: Callsign,
    hub: Arc<LoopbackHub>,
    events_tx: mpsc::Sender<LinkEvent>,
    events_rx: AsyncMutex<mpsc::Receiver<LinkEvent>>,
    shutdown: ShutdownToken,
}

impl LoopbackConnector {
    pub fn new(
        name: impl Into<String>,
        id: InterfaceId,
        callsign: Callsign,
        hub: Arc<LoopbackHub>,
    ) -> Self {
        let (events_tx, events_rx) = mpsc::channel(LOOPBACK_QUEUE);
        Self {
            name: name.into(),
            id,
            callsign,
            hub,
            events_tx,
            events_rx: AsyncMutex::new(events_rx),
            shutdown: ShutdownToken::new(),
        }
    }

    fn ensure_online(&self) -> Result<(), InterfaceError> {
        if self.shutdown.is_online() {
            Ok(())
        } else {
            Err(InterfaceError::NotConnected)
        }
    }

    /// Copy frames from one session half to the other until either closes.
    fn bridge(
        &self,
        mut from: mpsc::UnboundedReceiver<Vec<u8>>,
        to: mpsc::Sender<Vec<u8>>,
    ) {
        let mut stop = self.shutdown.subscribe();
        self.shutdown.track(tokio::spawn(async move {
            loop {
                tokio::select! {
                    frame = from.recv() => match frame {
                        Some(frame) => {
                            if to.send(frame).await.is_err() {
                                break;
                            }
                        }
                        None => break,
                    },
                    _ = stop.changed() => break,
                }
            }
        }));
    }
}

impl LinkConnector for LoopbackConnector {
    fn name(&self) -> &str {
        &self.name
    }

    fn id(&self) -> InterfaceId {
        self.id
    }

    fn local_callsign(&self) -> &Callsign {
        &self.callsign
    }

    fn is_connected(&self) -> bool {
        self.shutdown.is_online()
    }

    async fn start(&self) -> Result<(), InterfaceError> {
        self.shutdown.rearm();
        self.hub.attach(
            self.callsign.clone(),
            Station {
                interface: self.id,
                events: self.events_tx.clone(),
            },
        );
        self.shutdown.set_online(true);
        debug!("{}: attached as {}", self.name, self.callsign);
        Ok(())
    }

    async fn stop(&self) -> Result<(), InterfaceError> {
        self.hub.detach(&self.callsign);
        self.shutdown.stop().await;
        debug!("{}: detached", self.name);
        Ok(())
    }

    async fn send_frame(&self, frame: LinkFrame) -> Result<(), InterfaceError> {
        self.ensure_online()?;
        let targets = if frame.destination.base() == NODES_DESTINATION {
            self.hub.everyone_but(&self.callsign)
        } else {
            let station = self
                .hub
                .station(&frame.destination)
                .ok_or_else(|| InterfaceError::UnknownStation(frame.destination.clone()))?;
            vec![station]
        };
        trace!(
            "{}: {} -> {} ({} bytes, {} station(s))",
            self.name,
            frame.source,
            frame.destination,
            frame.payload.len(),
            targets.len()
        );
        for station in targets {
            // A station that detached mid-send just misses the frame.
            let _ = station.events.send(LinkEvent::Frame(frame.clone())).await;
        }
        Ok(())
    }

    async fn open_session(&self, neighbour: &Callsign) -> Result<Session, InterfaceError> {
        self.ensure_online()?;
        let remote = self
            .hub
            .station(neighbour)
            .ok_or_else(|| InterfaceError::UnknownStation(neighbour.clone()))?;

        let (local_in_tx, local_in_rx) = mpsc::channel(LOOPBACK_QUEUE);
        let (local_out_tx, local_out_rx) = mpsc::unbounded_channel();
        let (remote_in_tx, remote_in_rx) = mpsc::channel(LOOPBACK_QUEUE);
        let (remote_out_tx, remote_out_rx) = mpsc::unbounded_channel();

        let theirs = Session::new(
            remote.interface,
            neighbour.clone(),
            self.callsign.clone(),
            neighbour.clone(),
            remote_in_rx,
            remote_out_tx,
        );
        if remote
            .events
            .send(LinkEvent::SessionAccepted(theirs))
            .await
            .is_err()
        {
            return Err(InterfaceError::UnknownStation(neighbour.clone()));
        }

        self.bridge(local_out_rx, remote_in_tx);
        self.bridge(remote_out_rx, local_in_tx);

        let ours = Session::new(
            self.id,
            self.callsign.clone(),
            self.callsign.clone(),
            neighbour.clone(),
            local_in_rx,
            local_out_tx,
        );
        debug!("{}: session {} to {}", self.name, ours.id(), neighbour);
        Ok(ours)
    }

    async fn receive(&self) -> Result<LinkEvent, InterfaceError> {
        let mut stop: watch::Receiver<bool> = self.shutdown.subscribe();
        if *stop.borrow_and_update() {
            return Err(InterfaceError::Stopped);
        }
        let mut events = self.events_rx.lock().await;
        tokio::select! {
            event = events.recv() => event.ok_or(InterfaceError::Stopped),
            _ = stop.changed() => Err(InterfaceError::Stopped),
        }
    }
}
