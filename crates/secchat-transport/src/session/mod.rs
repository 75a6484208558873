//! Client session.
//!
//! [`Session::spawn`] starts one task that owns every piece of mutable
//! connection state: the channel, the lifecycle state, the stored
//! credentials, the server build tag, the heartbeat, the reconnect scheduler
//! and the delivery tracker. [`Session`] is a cheap handle that talks to that
//! task over a command queue, so state is only ever touched from one place
//! no matter how many handles exist or which threads they run on.
//!
//! Listener registration goes straight to the shared [`EventDispatcher`];
//! listeners run on the session task, in emission order.

mod actor;

use std::sync::Arc;

use secchat_core::{
    AuthCredentials, ConnectionState, Frame, FrameKind, MessageId, SendOptions, SessionError,
};
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{Instrument, info_span};

use crate::config::SessionConfig;
use crate::dispatcher::{EventDispatcher, ListenerId, Subscription};
use crate::events::SessionEvent;
use crate::transport::Connector;

use actor::SessionActor;

/// Observable snapshot of the session.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SessionStatus {
    /// Lifecycle state.
    pub state: ConnectionState,
    /// Consecutive failed reconnect attempts.
    pub reconnect_attempts: u32,
    /// Baseline server build tag, once seen.
    pub server_version: Option<String>,
}

/// A tracked send that the server echoed back.
#[derive(Clone, Debug, PartialEq)]
pub struct DeliveryReceipt {
    /// Correlation ID of the message.
    pub id: MessageId,
    /// The echoed frame.
    pub frame: Frame,
}

pub(crate) enum Command {
    Connect {
        url: String,
        reply: oneshot::Sender<Result<(), SessionError>>,
    },
    Send {
        frame: Frame,
        reply: oneshot::Sender<bool>,
    },
    SendTracked {
        id: MessageId,
        frame: Frame,
        reply: oneshot::Sender<Result<DeliveryReceipt, SessionError>>,
    },
    Authenticate {
        credentials: AuthCredentials,
        reply: oneshot::Sender<bool>,
    },
    Disconnect {
        reply: oneshot::Sender<()>,
    },
}

/// Handle to a running session. Clones share the same session; the task
/// stops once every handle is dropped.
#[derive(Clone)]
pub struct Session {
    commands: mpsc::Sender<Command>,
    dispatcher: EventDispatcher,
    status: watch::Receiver<SessionStatus>,
}

impl Session {
    /// Start a session task on the current tokio runtime.
    pub fn spawn(config: SessionConfig, connector: impl Connector + 'static) -> Self {
        Self::spawn_with(config, Arc::new(connector), EventDispatcher::new())
    }

    /// Start a session with a shared connector and an existing dispatcher.
    pub fn spawn_with(
        config: SessionConfig,
        connector: Arc<dyn Connector>,
        dispatcher: EventDispatcher,
    ) -> Self {
        let (commands_tx, commands_rx) = mpsc::channel(config.command_buffer.max(1));
        let (status_tx, status_rx) = watch::channel(SessionStatus::default());
        let actor = SessionActor::new(
            config,
            connector,
            dispatcher.clone(),
            status_tx,
            commands_rx,
        );
        drop(tokio::spawn(actor.run().instrument(info_span!("session"))));
        Self {
            commands: commands_tx,
            dispatcher,
            status: status_rx,
        }
    }

    async fn request<T>(&self, build: impl FnOnce(oneshot::Sender<T>) -> Command) -> Option<T> {
        let (tx, rx) = oneshot::channel();
        self.commands.send(build(tx)).await.ok()?;
        rx.await.ok()
    }

    // ── Lifecycle ───────────────────────────────────────────────────────

    /// Open a channel to `url`.
    ///
    /// Resolves once the channel is open, or with `ConnectTimeout` /
    /// `ConnectError` if this attempt fails (the reconnect scheduler keeps
    /// trying in the background), or `Cancelled` if `disconnect()` or a
    /// connect to another URL supersedes it. Connecting to the URL that is
    /// already open resolves immediately.
    pub async fn connect(&self, url: impl Into<String>) -> Result<(), SessionError> {
        let url = url.into();
        self.request(|reply| Command::Connect { url, reply })
            .await
            .unwrap_or(Err(SessionError::SessionClosed))
    }

    /// Close the channel, forget credentials and stop reconnecting.
    pub async fn disconnect(&self) {
        let _ = self.request(|reply| Command::Disconnect { reply }).await;
    }

    // ── Sending ─────────────────────────────────────────────────────────

    /// Write a frame if the channel is open. `true` means the write was
    /// attempted, not that the server received it.
    pub async fn send(&self, frame: Frame) -> bool {
        self.request(|reply| Command::Send { frame, reply })
            .await
            .unwrap_or(false)
    }

    /// Send user content and wait for the server to echo it back.
    pub async fn send_tracked(
        &self,
        kind: FrameKind,
        content: impl Into<String>,
        options: SendOptions,
    ) -> Result<DeliveryReceipt, SessionError> {
        let id = options.id.clone().unwrap_or_default();
        let frame = Frame::chat(kind, &id, content, &options);
        self.request(|reply| Command::SendTracked { id, frame, reply })
            .await
            .unwrap_or(Err(SessionError::SessionClosed))
    }

    /// Send user content without waiting for the echo.
    ///
    /// Returns the correlation ID if the write was attempted.
    pub async fn send_message_untracked(
        &self,
        kind: FrameKind,
        content: impl Into<String>,
        options: SendOptions,
    ) -> Option<MessageId> {
        let id = options.id.clone().unwrap_or_default();
        let frame = Frame::chat(kind, &id, content, &options);
        self.send(frame).await.then_some(id)
    }

    /// Tell the room we are typing.
    pub async fn send_typing(&self) -> bool {
        self.send(Frame::typing()).await
    }

    /// Ask the server to recall one of our messages.
    pub async fn send_recall(&self, id: &str) -> bool {
        self.send(Frame::recall(id)).await
    }

    /// Acknowledge that a message was read.
    pub async fn send_read(&self, id: &str) -> bool {
        self.send(Frame::read(id)).await
    }

    /// Store `credentials` for replay after every reconnect and send them now.
    ///
    /// Success shows up later as an `auth_success` event. Returns whether the
    /// `auth` frame was written; the credentials are stored either way.
    pub async fn authenticate(&self, credentials: AuthCredentials) -> bool {
        self.request(|reply| Command::Authenticate { credentials, reply })
            .await
            .unwrap_or(false)
    }

    // ── Events ──────────────────────────────────────────────────────────

    /// Register a listener for `event`.
    pub fn on<F>(&self, event: impl Into<String>, listener: F) -> ListenerId
    where
        F: Fn(&SessionEvent) + Send + Sync + 'static,
    {
        self.dispatcher.on(event, listener)
    }

    /// Remove a listener. Unknown IDs are a no-op.
    pub fn off(&self, event: &str, id: ListenerId) -> bool {
        self.dispatcher.off(event, id)
    }

    /// Register a listener that is removed when the returned handle drops.
    pub fn subscribe<F>(&self, event: impl Into<String>, listener: F) -> Subscription
    where
        F: Fn(&SessionEvent) + Send + Sync + 'static,
    {
        self.dispatcher.subscribe(event, listener)
    }

    /// The shared dispatcher.
    pub fn dispatcher(&self) -> &EventDispatcher {
        &self.dispatcher
    }

    // ── Status ──────────────────────────────────────────────────────────

    /// Current lifecycle state.
    pub fn state(&self) -> ConnectionState {
        self.status.borrow().state
    }

    /// Current status snapshot.
    pub fn status(&self) -> SessionStatus {
        self.status.borrow().clone()
    }

    /// `true` only once the server accepted our credentials.
    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Authenticated
    }

    /// A receiver that observes every status change.
    pub fn watch_status(&self) -> watch::Receiver<SessionStatus> {
        self.status.clone()
    }

    /// Wait until the state satisfies `predicate` and return it.
    pub async fn wait_for_state(
        &self,
        predicate: impl Fn(ConnectionState) -> bool,
    ) -> Result<ConnectionState, SessionError> {
        let mut status = self.status.clone();
        let state = status
            .wait_for(|s| predicate(s.state))
            .await
            .map(|s| s.state)
            .map_err(|_| SessionError::SessionClosed)?;
        Ok(state)
    }
}
