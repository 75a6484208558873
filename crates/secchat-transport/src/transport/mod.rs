//! The seam between the session and a concrete channel implementation.
//!
//! A [`Connector`] opens a [`Channel`]; the session owns that channel
//! exclusively and never learns which implementation produced it.

pub mod memory;
pub mod websocket;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::errors::TransportError;

/// Something that happened on the channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    /// A text frame.
    Text(String),
    /// The peer closed the channel.
    Closed {
        /// Close code, if the peer sent one.
        code: Option<u16>,
        /// Close reason (may be empty).
        reason: String,
    },
    /// The channel failed.
    Error(String),
}

/// Opens channels to a server address.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Open a channel to `url`. Resolves once the channel is ready for frames.
    async fn open(&self, url: &str) -> Result<Channel, TransportError>;
}

/// An open, exclusively-owned channel.
///
/// Dropping the channel (or calling [`close`](Self::close)) cancels its token,
/// which tears down whatever tasks back it.
#[derive(Debug)]
pub struct Channel {
    outbound: mpsc::Sender<String>,
    inbound: mpsc::Receiver<Inbound>,
    cancel: CancellationToken,
}

impl Channel {
    /// Assemble a channel from its queues and teardown token.
    pub fn new(
        outbound: mpsc::Sender<String>,
        inbound: mpsc::Receiver<Inbound>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            outbound,
            inbound,
            cancel,
        }
    }

    /// Queue a text frame. Returns `false` if the queue is full or closed.
    pub fn send(&self, text: String) -> bool {
        self.outbound.try_send(text).is_ok()
    }

    /// Next inbound event. A vanished backing task reads as a close.
    pub async fn recv(&mut self) -> Inbound {
        self.inbound.recv().await.unwrap_or_else(|| Inbound::Closed {
            code: None,
            reason: "transport ended".into(),
        })
    }

    /// Close the channel.
    pub fn close(self) {
        self.cancel.cancel();
    }

    /// Whether the channel was closed from this side.
    pub fn is_closed(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

impl Drop for Channel {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
