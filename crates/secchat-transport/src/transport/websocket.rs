//! WebSocket transport over `tokio-tungstenite`.
//!
//! Plain `ws://` only: the crate is built without a TLS backend, so a
//! `wss://` address fails the attempt with [`TransportError::InvalidUrl`].
//! The upgrade request carries `User-Agent: secchat/<version>`.
//!
//! Each channel is backed by two tasks sharing the channel's cancellation
//! token:
//! - writer: outbound queue to socket; sends a close frame on teardown
//! - reader: socket to inbound queue; UTF-8 binary frames count as text,
//!   protocol ping/pong is answered by tungstenite itself

use async_trait::async_trait;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use secchat_core::constants::CLIENT_TAG;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::http::header::USER_AGENT;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{Channel, Connector, Inbound};
use crate::errors::TransportError;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Default depth of the per-channel queues.
pub const DEFAULT_BUFFER: usize = 256;

/// Connector for `ws://` servers.
#[derive(Debug, Clone)]
pub struct WebSocketConnector {
    buffer: usize,
}

impl Default for WebSocketConnector {
    fn default() -> Self {
        Self {
            buffer: DEFAULT_BUFFER,
        }
    }
}

impl WebSocketConnector {
    /// Connector with the default queue depth.
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the per-channel queue depth.
    #[must_use]
    pub fn with_buffer(mut self, buffer: usize) -> Self {
        self.buffer = buffer.max(1);
        self
    }
}

#[async_trait]
impl Connector for WebSocketConnector {
    async fn open(&self, url: &str) -> Result<Channel, TransportError> {
        let mut request = url.into_client_request()?;
        let _ = request
            .headers_mut()
            .insert(USER_AGENT, HeaderValue::from_static(CLIENT_TAG));
        let (ws, _response) = connect_async(request).await?;
        info!(url, "websocket open");

        let (sink, stream) = ws.split();
        let (out_tx, out_rx) = mpsc::channel(self.buffer);
        let (in_tx, in_rx) = mpsc::channel(self.buffer);
        let cancel = CancellationToken::new();

        drop(tokio::spawn(write_pump(sink, out_rx, cancel.clone())));
        drop(tokio::spawn(read_pump(stream, in_tx, cancel.clone())));

        Ok(Channel::new(out_tx, in_rx, cancel))
    }
}

async fn write_pump(
    mut sink: SplitSink<WsStream, Message>,
    mut outbound: mpsc::Receiver<String>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            msg = outbound.recv() => {
                let Some(text) = msg else { break };
                if let Err(e) = sink.send(Message::Text(text.into())).await {
                    warn!(error = %e, "websocket write failed");
                    cancel.cancel();
                    return;
                }
            }
        }
    }
    let _ = sink.send(Message::Close(None)).await;
    let _ = sink.close().await;
    debug!("websocket writer stopped");
}

async fn read_pump(
    mut stream: SplitStream<WsStream>,
    inbound: mpsc::Sender<Inbound>,
    cancel: CancellationToken,
) {
    loop {
        let msg = tokio::select! {
            () = cancel.cancelled() => break,
            msg = stream.next() => msg,
        };
        let event = match msg {
            Some(Ok(Message::Text(text))) => Inbound::Text(text.to_string()),
            Some(Ok(Message::Binary(data))) => match std::str::from_utf8(&data) {
                Ok(text) => Inbound::Text(text.to_owned()),
                Err(_) => {
                    debug!(len = data.len(), "ignoring non-UTF8 binary frame");
                    continue;
                }
            },
            Some(Ok(Message::Close(frame))) => {
                let (code, reason) = match frame {
                    Some(frame) => (Some(u16::from(frame.code)), frame.reason.to_string()),
                    None => (None, String::new()),
                };
                info!(?code, %reason, "server closed websocket");
                let _ = inbound.send(Inbound::Closed { code, reason }).await;
                break;
            }
            Some(Ok(_)) => continue,
            Some(Err(e)) => {
                warn!(error = %e, "websocket read failed");
                let _ = inbound.send(Inbound::Error(e.to_string())).await;
                break;
            }
            None => {
                let _ = inbound
                    .send(Inbound::Closed {
                        code: None,
                        reason: "stream ended".into(),
                    })
                    .await;
                break;
            }
        };
        if inbound.send(event).await.is_err() {
            break;
        }
    }
    debug!("websocket reader stopped");
}
