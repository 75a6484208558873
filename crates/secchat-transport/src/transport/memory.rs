//! In-process transport.
//!
//! [`MemoryConnector::new`] returns the connector plus a [`MemoryServer`]
//! that yields one [`MemoryPeer`] per accepted `open`. The peer plays the
//! server: it reads what the client wrote and pushes frames, closes or
//! failures back. Attempts can be scripted to refuse or to hang forever.

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use secchat_core::Frame;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::{Channel, Connector, Inbound};
use crate::errors::TransportError;

const QUEUE_DEPTH: usize = 256;

#[derive(Debug, Clone)]
enum Behavior {
    Refuse(String),
    Hang,
}

#[derive(Default)]
struct Script {
    upcoming: VecDeque<Behavior>,
    urls: Vec<String>,
}

/// Connector whose "server" lives in the same process.
#[derive(Clone)]
pub struct MemoryConnector {
    script: Arc<Mutex<Script>>,
    peers: mpsc::UnboundedSender<MemoryPeer>,
}

/// Accept side of a [`MemoryConnector`].
pub struct MemoryServer {
    peers: mpsc::UnboundedReceiver<MemoryPeer>,
}

impl MemoryConnector {
    /// Create a connector and its accept side.
    pub fn new() -> (Self, MemoryServer) {
        let (tx, rx) = mpsc::unbounded_channel();
        let connector = Self {
            script: Arc::default(),
            peers: tx,
        };
        (connector, MemoryServer { peers: rx })
    }

    /// Fail the next unscripted attempt with a handshake error.
    pub fn refuse_next(&self, reason: impl Into<String>) {
        self.script.lock().upcoming.push_back(Behavior::Refuse(reason.into()));
    }

    /// Make the next unscripted attempt never complete.
    pub fn hang_next(&self) {
        self.script.lock().upcoming.push_back(Behavior::Hang);
    }

    /// Every URL passed to `open`, in order.
    pub fn urls(&self) -> Vec<String> {
        self.script.lock().urls.clone()
    }

    /// Number of `open` calls so far.
    pub fn attempts(&self) -> usize {
        self.script.lock().urls.len()
    }
}

#[async_trait]
impl Connector for MemoryConnector {
    async fn open(&self, url: &str) -> Result<Channel, TransportError> {
        let behavior = {
            let mut script = self.script.lock();
            script.urls.push(url.to_owned());
            script.upcoming.pop_front()
        };
        match behavior {
            Some(Behavior::Refuse(reason)) => {
                debug!(url, %reason, "memory connector refusing");
                return Err(TransportError::Handshake(reason));
            }
            Some(Behavior::Hang) => {
                debug!(url, "memory connector hanging");
                return std::future::pending().await;
            }
            None => {}
        }

        let (out_tx, out_rx) = mpsc::channel(QUEUE_DEPTH);
        let (in_tx, in_rx) = mpsc::channel(QUEUE_DEPTH);
        let cancel = CancellationToken::new();
        let peer = MemoryPeer {
            url: url.to_owned(),
            from_client: out_rx,
            to_client: in_tx,
            cancel: cancel.clone(),
        };
        self.peers
            .send(peer)
            .map_err(|_| TransportError::Handshake("memory server dropped".into()))?;
        Ok(Channel::new(out_tx, in_rx, cancel))
    }
}

impl MemoryServer {
    /// Next accepted connection, `None` once every connector is gone.
    pub async fn accept(&mut self) -> Option<MemoryPeer> {
        self.peers.recv().await
    }
}

/// Server side of one in-memory channel.
pub struct MemoryPeer {
    url: String,
    from_client: mpsc::Receiver<String>,
    to_client: mpsc::Sender<Inbound>,
    cancel: CancellationToken,
}

impl MemoryPeer {
    /// URL the client asked for.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Next raw text the client wrote; `None` once the client side is gone.
    pub async fn recv(&mut self) -> Option<String> {
        self.from_client.recv().await
    }

    /// Next decodable frame the client wrote, skipping anything else.
    pub async fn recv_frame(&mut self) -> Option<Frame> {
        loop {
            let text = self.recv().await?;
            if let Ok(frame) = Frame::decode(&text) {
                return Some(frame);
            }
        }
    }

    /// Next client frame that is not a heartbeat ping.
    pub async fn recv_non_ping(&mut self) -> Option<Frame> {
        loop {
            let frame = self.recv_frame().await?;
            if frame.kind != secchat_core::FrameKind::Ping {
                return Some(frame);
            }
        }
    }

    /// Push a frame to the client.
    pub async fn send(&self, frame: &Frame) -> bool {
        match frame.encode() {
            Ok(text) => self.send_text(text).await,
            Err(_) => false,
        }
    }

    /// Push raw text to the client.
    pub async fn send_text(&self, text: impl Into<String>) -> bool {
        self.to_client.send(Inbound::Text(text.into())).await.is_ok()
    }

    /// Close the channel from the server side.
    pub async fn close(&self, code: u16, reason: impl Into<String>) {
        let _ = self
            .to_client
            .send(Inbound::Closed {
                code: Some(code),
                reason: reason.into(),
            })
            .await;
    }

    /// Fail the channel.
    pub async fn fail(&self, message: impl Into<String>) {
        let _ = self.to_client.send(Inbound::Error(message.into())).await;
    }

    /// Whether the client closed or dropped its channel.
    pub fn is_client_closed(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Wait until the client closes or drops its channel.
    pub async fn client_closed(&self) {
        self.cancel.cancelled().await;
    }
}
