//! KISS over TCP, as offered by software TNCs such as Dire Wolf.
//!
//! Only UI frames are carried. Connected-mode AX.25 would need a link-layer
//! state machine this connector does not have, so `open_session` refuses.

use std::sync::Arc;
use std::time::Duration;

use netrom_core::Callsign;
use netrom_transport::InterfaceId;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::{Mutex, mpsc, watch};
use tracing::{debug, info, trace, warn};

use super::ax25::{decode_ui, encode_ui};
use super::framing::{KissFrameAccumulator, encode_data_frame};
use super::{CONNECT_TIMEOUT, FRAME_QUEUE, RECONNECT_WAIT, TCP_RECV_BUFFER};
use crate::error::InterfaceError;
use crate::session::Session;
use crate::shutdown::ShutdownToken;
use crate::traits::{LinkConnector, LinkEvent, LinkFrame};

/// Settings for one KISS TCP connector.
#[derive(Debug, Clone)]
pub struct KissTcpConfig {
    pub name: String,
    /// `host:port` of the TNC.
    pub target: String,
    /// Station callsign used as the source of transmitted frames.
    pub callsign: Callsign,
    /// TNC port (0..=15).
    pub port: u8,
    pub connect_timeout: Duration,
    /// Give up after this many consecutive failures. `None` retries forever.
    pub max_reconnect_tries: Option<u32>,
}

impl KissTcpConfig {
    pub fn new(name: impl Into<String>, target: impl Into<String>, callsign: Callsign) -> Self {
        Self {
            name: name.into(),
            target: target.into(),
            callsign,
            port: 0,
            connect_timeout: CONNECT_TIMEOUT,
            max_reconnect_tries: None,
        }
    }
}

struct Inner {
    name: String,
    port: u8,
    writer: Mutex<Option<OwnedWriteHalf>>,
    frames_tx: mpsc::Sender<LinkFrame>,
    shutdown: ShutdownToken,
}

/// A UI-only connector talking KISS to a TNC over TCP.
pub struct KissTcpConnector {
    config: KissTcpConfig,
    id: InterfaceId,
    inner: Arc<Inner>,
    frames_rx: Mutex<mpsc::Receiver<LinkFrame>>,
}

impl KissTcpConnector {
    pub fn new(config: KissTcpConfig, id: InterfaceId) -> Result<Self, InterfaceError> {
        if config.target.trim().is_empty() {
            return Err(InterfaceError::Configuration(format!(
                "{}: target must not be empty",
                config.name
            )));
        }
        if config.port > 0x0F {
            return Err(InterfaceError::Configuration(format!(
                "{}: KISS port {} out of range",
                config.name, config.port
            )));
        }
        let (frames_tx, frames_rx) = mpsc::channel(FRAME_QUEUE);
        let inner = Arc::new(Inner {
            name: config.name.clone(),
            port: config.port,
            writer: Mutex::new(None),
            frames_tx,
            shutdown: ShutdownToken::new(),
        });
        Ok(Self {
            config,
            id,
            inner,
            frames_rx: Mutex::new(frames_rx),
        })
    }

    /// Wait out the reconnect delay. Returns `false` if stopped meanwhile.
    async fn backoff(stop_rx: &mut watch::Receiver<bool>) -> bool {
        tokio::select! {
            _ = tokio::time::sleep(RECONNECT_WAIT) => true,
            _ = stop_rx.changed() => false,
        }
    }

    async fn connect_and_run(
        inner: Arc<Inner>,
        target: String,
        connect_timeout: Duration,
        max_reconnect_tries: Option<u32>,
        mut stop_rx: watch::Receiver<bool>,
    ) {
        let mut failures: u32 = 0;

        loop {
            if *stop_rx.borrow() {
                break;
            }

            let attempt = tokio::time::timeout(connect_timeout, TcpStream::connect(&*target)).await;
            let stream = match attempt {
                Ok(Ok(stream)) => {
                    let _ = stream.set_nodelay(true);
                    info!("{}: connected to {}", inner.name, target);
                    failures = 0;
                    stream
                }
                Ok(Err(e)) => {
                    debug!("{}: connect to {} failed: {}", inner.name, target, e);
                    failures += 1;
                    if max_reconnect_tries.is_some_and(|max| failures > max) {
                        warn!("{}: giving up after {} attempts", inner.name, failures);
                        break;
                    }
                    if !Self::backoff(&mut stop_rx).await {
                        break;
                    }
                    continue;
                }
                Err(_) => {
                    debug!("{}: connect to {} timed out", inner.name, target);
                    failures += 1;
                    if max_reconnect_tries.is_some_and(|max| failures > max) {
                        warn!("{}: giving up after {} attempts", inner.name, failures);
                        break;
                    }
                    if !Self::backoff(&mut stop_rx).await {
                        break;
                    }
                    continue;
                }
            };

            let (reader, writer) = stream.into_split();
            *inner.writer.lock().await = Some(writer);
            inner.shutdown.set_online(true);

            Self::read_loop(&inner, reader, stop_rx.clone()).await;

            *inner.writer.lock().await = None;
            inner.shutdown.set_online(false);

            if *stop_rx.borrow() {
                break;
            }
            info!(
                "{}: TNC link lost, reconnecting in {:?}",
                inner.name, RECONNECT_WAIT
            );
            if !Self::backoff(&mut stop_rx).await {
                break;
            }
        }
    }

    async fn read_loop(inner: &Inner, mut reader: OwnedReadHalf, mut stop_rx: watch::Receiver<bool>) {
        let mut acc = KissFrameAccumulator::new();
        let mut buf = vec![0u8; TCP_RECV_BUFFER];

        loop {
            let n = tokio::select! {
                result = reader.read(&mut buf) => match result {
                    Ok(0) => {
                        debug!("{}: TNC closed the connection", inner.name);
                        return;
                    }
                    Ok(n) => n,
                    Err(e) => {
                        debug!("{}: read error: {}", inner.name, e);
                        return;
                    }
                },
                _ = stop_rx.changed() => return,
            };

            for kiss in acc.feed(&buf[..n]) {
                if kiss.port != inner.port {
                    continue;
                }
                let frame = match decode_ui(&kiss.data) {
                    Ok(frame) => frame,
                    Err(e) => {
                        trace!("{}: ignoring frame: {}", inner.name, e);
                        continue;
                    }
                };
                if inner.frames_tx.send(frame).await.is_err() {
                    return;
                }
            }
        }
    }
}

impl LinkConnector for KissTcpConnector {
    fn name(&self) -> &str {
        &self.config.name
    }

    fn id(&self) -> InterfaceId {
        self.id
    }

    fn local_callsign(&self) -> &Callsign {
        &self.config.callsign
    }

    fn is_connected(&self) -> bool {
        self.inner.shutdown.is_online()
    }

    async fn start(&self) -> Result<(), InterfaceError> {
        if self.inner.shutdown.task_count() > 0 {
            return Ok(());
        }
        self.inner.shutdown.rearm();
        let task = Self::connect_and_run(
            Arc::clone(&self.inner),
            self.config.target.clone(),
            self.config.connect_timeout,
            self.config.max_reconnect_tries,
            self.inner.shutdown.subscribe(),
        );
        self.inner.shutdown.track(tokio::spawn(task));
        Ok(())
    }

    async fn stop(&self) -> Result<(), InterfaceError> {
        self.inner.shutdown.signal_stop();
        if let Some(mut writer) = self.inner.writer.lock().await.take() {
            let _ = writer.shutdown().await;
        }
        self.inner.shutdown.stop().await;
        Ok(())
    }

    async fn send_frame(&self, frame: LinkFrame) -> Result<(), InterfaceError> {
        if !self.is_connected() {
            return Err(InterfaceError::NotConnected);
        }
        let framed = encode_data_frame(self.config.port, &encode_ui(&frame));
        let mut guard = self.inner.writer.lock().await;
        let writer = guard.as_mut().ok_or(InterfaceError::NotConnected)?;
        writer.write_all(&framed).await?;
        trace!(
            "{}: tx {} -> {} ({} bytes)",
            self.config.name,
            frame.source,
            frame.destination,
            frame.payload.len()
        );
        Ok(())
    }

    async fn open_session(&self, _neighbour: &Callsign) -> Result<Session, InterfaceError> {
        Err(InterfaceError::SessionsUnsupported(self.config.name.clone()))
    }

    async fn receive(&self) -> Result<LinkEvent, InterfaceError> {
        let mut stop_rx = self.inner.shutdown.subscribe();
        if *stop_rx.borrow_and_update() {
            return Err(InterfaceError::Stopped);
        }
        let mut frames = self.frames_rx.lock().await;
        tokio::select! {
            frame = frames.recv() => frame.map(LinkEvent::Frame).ok_or(InterfaceError::Stopped),
            _ = stop_rx.changed() => Err(InterfaceError::Stopped),
        }
    }
}
