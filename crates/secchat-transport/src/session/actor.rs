//! The session task.

use std::sync::Arc;

use secchat_core::{AuthCredentials, ConnectionState, Frame, FrameKind, SessionError};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{Instrument, debug, info, info_span, instrument, warn};

use super::{Command, DeliveryReceipt, SessionStatus};
use crate::config::SessionConfig;
use crate::dispatcher::EventDispatcher;
use crate::events::SessionEvent;
use crate::heartbeat::{HeartbeatMonitor, HeartbeatTick};
use crate::reconnect::{ReconnectScheduler, Schedule};
use crate::tracker::DeliveryTracker;
use crate::transport::{Channel, Connector, Inbound};

/// Result of one spawned connection attempt.
struct AttemptOutcome {
    generation: u64,
    url: String,
    result: Result<Channel, SessionError>,
}

struct InFlight {
    generation: u64,
    task: JoinHandle<()>,
}

pub(super) struct SessionActor {
    config: SessionConfig,
    connector: Arc<dyn Connector>,
    dispatcher: EventDispatcher,
    status: watch::Sender<SessionStatus>,
    commands: mpsc::Receiver<Command>,
    outcomes_tx: mpsc::UnboundedSender<AttemptOutcome>,
    outcomes_rx: mpsc::UnboundedReceiver<AttemptOutcome>,

    state: ConnectionState,
    url: Option<String>,
    channel: Option<Channel>,
    credentials: Option<AuthCredentials>,
    server_version: Option<String>,

    generation: u64,
    in_flight: Option<InFlight>,
    waiters: Vec<oneshot::Sender<Result<(), SessionError>>>,

    heartbeat: HeartbeatMonitor,
    reconnect: ReconnectScheduler,
    tracker: DeliveryTracker,
}

impl SessionActor {
    pub(super) fn new(
        config: SessionConfig,
        connector: Arc<dyn Connector>,
        dispatcher: EventDispatcher,
        status: watch::Sender<SessionStatus>,
        commands: mpsc::Receiver<Command>,
    ) -> Self {
        let (outcomes_tx, outcomes_rx) = mpsc::unbounded_channel();
        Self {
            heartbeat: HeartbeatMonitor::new(config.heartbeat),
            reconnect: ReconnectScheduler::new(config.reconnect),
            tracker: DeliveryTracker::new(config.delivery_timeout),
            config,
            connector,
            dispatcher,
            status,
            commands,
            outcomes_tx,
            outcomes_rx,
            state: ConnectionState::Disconnected,
            url: None,
            channel: None,
            credentials: None,
            server_version: None,
            generation: 0,
            in_flight: None,
            waiters: Vec::new(),
        }
    }

    pub(super) async fn run(mut self) {
        loop {
            tokio::select! {
                cmd = self.commands.recv() => match cmd {
                    Some(cmd) => self.handle_command(cmd),
                    None => break,
                },
                Some(outcome) = self.outcomes_rx.recv() => self.on_attempt_finished(outcome),
                inbound = next_inbound(&mut self.channel) => self.on_inbound(inbound),
                tick = self.heartbeat.tick() => self.on_heartbeat(tick),
                attempt = self.reconnect.fired() => self.on_retry_due(attempt),
                id = self.tracker.expire_next() => debug!(id = %id, "pending delivery expired"),
            }
        }
        debug!("all session handles dropped, shutting down");
        self.abandon_attempt();
        self.heartbeat.stop();
        self.reconnect.suppress();
        drop(self.channel.take());
    }

    // ── Commands ────────────────────────────────────────────────────────

    fn handle_command(&mut self, cmd: Command) {
        match cmd {
            Command::Connect { url, reply } => self.connect(url, reply),
            Command::Send { frame, reply } => {
                let _ = reply.send(self.write(&frame));
            }
            Command::SendTracked { id, frame, reply } => {
                if self.write(&frame) {
                    let receipt_id = id.clone();
                    self.tracker.register(
                        id.into_inner(),
                        Box::new(move |result| {
                            let _ = reply.send(result.map(|frame| DeliveryReceipt {
                                id: receipt_id,
                                frame,
                            }));
                        }),
                    );
                } else {
                    let _ = reply.send(Err(SessionError::NotConnected));
                }
            }
            Command::Authenticate { credentials, reply } => {
                let frame = Frame::auth(&credentials);
                self.credentials = Some(credentials);
                let _ = reply.send(self.write(&frame));
            }
            Command::Disconnect { reply } => {
                self.disconnect();
                let _ = reply.send(());
            }
        }
    }

    fn connect(&mut self, url: String, reply: oneshot::Sender<Result<(), SessionError>>) {
        self.reconnect.resume();
        let same_url = self.url.as_deref() == Some(url.as_str());

        if same_url && self.state.is_open() {
            self.publish_status();
            let _ = reply.send(Ok(()));
            return;
        }
        if same_url && self.in_flight.is_some() {
            self.waiters.push(reply);
            self.publish_status();
            return;
        }

        self.abandon_attempt();
        if self.channel.is_some() {
            info!(from = ?self.url, to = %url, "switching server");
            self.heartbeat.stop();
            drop(self.channel.take());
        }
        self.url = Some(url.clone());
        self.waiters.push(reply);
        self.start_attempt(url);
    }

    fn disconnect(&mut self) {
        self.heartbeat.stop();
        self.reconnect.suppress();
        self.credentials = None;
        self.abandon_attempt();
        if let Some(channel) = self.channel.take() {
            channel.close();
        }
        info!(pending_deliveries = self.tracker.len(), "disconnected by request");
        self.set_state(ConnectionState::ManuallyClosed);
    }

    // ── Connection attempts ─────────────────────────────────────────────

    fn start_attempt(&mut self, url: String) {
        self.generation += 1;
        let generation = self.generation;
        let attempt = self.reconnect.attempts();
        let connector = Arc::clone(&self.connector);
        let outcomes = self.outcomes_tx.clone();
        let timeout = self.config.connect_timeout;

        let span = info_span!("connect_attempt", %url, generation, attempt);
        let task = tokio::spawn(
            async move {
                let result = match tokio::time::timeout(timeout, connector.open(&url)).await {
                    Ok(Ok(channel)) => Ok(channel),
                    Ok(Err(e)) => Err(SessionError::ConnectError {
                        url: url.clone(),
                        message: e.to_string(),
                    }),
                    Err(_) => Err(SessionError::ConnectTimeout {
                        url: url.clone(),
                        after: timeout,
                    }),
                };
                let _ = outcomes.send(AttemptOutcome {
                    generation,
                    url,
                    result,
                });
            }
            .instrument(span),
        );

        self.in_flight = Some(InFlight { generation, task });
        self.set_state(ConnectionState::Connecting);
    }

    /// Abort the running attempt, if any, and fail everyone waiting on it.
    fn abandon_attempt(&mut self) {
        if let Some(in_flight) = self.in_flight.take() {
            debug!(generation = in_flight.generation, "abandoning connect attempt");
            in_flight.task.abort();
        }
        for waiter in self.waiters.drain(..) {
            let _ = waiter.send(Err(SessionError::Cancelled));
        }
    }

    fn on_attempt_finished(&mut self, outcome: AttemptOutcome) {
        let current = self
            .in_flight
            .as_ref()
            .is_some_and(|f| f.generation == outcome.generation);
        if !current {
            debug!(generation = outcome.generation, "discarding stale connect outcome");
            return;
        }
        self.in_flight = None;
        match outcome.result {
            Ok(channel) => self.on_open(&outcome.url, channel),
            Err(err) => self.on_attempt_failed(&err),
        }
    }

    #[instrument(skip(self, channel))]
    fn on_open(&mut self, url: &str, channel: Channel) {
        self.channel = Some(channel);
        self.set_state(ConnectionState::Connected);
        self.reconnect.reset();
        self.heartbeat.start();
        info!("connected");

        if let Some(credentials) = &self.credentials {
            debug!(user_id = %credentials.user_id, "replaying credentials");
            let frame = Frame::auth(credentials);
            let _ = self.write(&frame);
        }

        self.publish_status();
        self.emit(&SessionEvent::Connected);
        for waiter in self.waiters.drain(..) {
            let _ = waiter.send(Ok(()));
        }
    }

    fn on_attempt_failed(&mut self, err: &SessionError) {
        warn!(error = %err, code = err.code(), "connect attempt failed");
        for waiter in self.waiters.drain(..) {
            let _ = waiter.send(Err(err.clone()));
        }
        self.emit(&SessionEvent::from(err));
        self.schedule_reconnect();
    }

    fn on_retry_due(&mut self, attempt: u32) {
        let Some(url) = self.url.clone() else {
            return;
        };
        info!(attempt, url = %url, "reconnecting");
        self.start_attempt(url);
    }

    fn schedule_reconnect(&mut self) {
        match self.reconnect.schedule() {
            Schedule::Scheduled { attempt, delay } => {
                info!(attempt, ?delay, "reconnect scheduled");
                self.set_state(ConnectionState::Reconnecting);
                self.emit(&SessionEvent::Reconnecting { attempt, delay });
            }
            Schedule::AlreadyPending { attempt } => {
                debug!(attempt, "reconnect already pending");
            }
            Schedule::Exhausted { attempts } => {
                warn!(attempts, "giving up on reconnecting");
                self.set_state(ConnectionState::Disconnected);
                self.emit(&SessionEvent::ReconnectFailed { attempts });
            }
            Schedule::Suppressed => {
                debug!("reconnect suppressed");
            }
        }
    }

    // ── Channel ─────────────────────────────────────────────────────────

    fn write(&self, frame: &Frame) -> bool {
        let Some(channel) = self.channel.as_ref().filter(|_| self.state.is_open()) else {
            warn!(kind = %frame.kind, state = %self.state, "not connected, cannot send");
            return false;
        };
        let text = match frame.encode() {
            Ok(text) => text,
            Err(e) => {
                warn!(kind = %frame.kind, error = %e, "failed to encode frame");
                return false;
            }
        };
        let sent = channel.send(text);
        if !sent {
            warn!(kind = %frame.kind, "outbound queue full or closed, frame dropped");
        }
        sent
    }

    fn on_inbound(&mut self, inbound: Inbound) {
        match inbound {
            Inbound::Text(text) => {
                self.heartbeat.record_activity();
                self.on_text(&text);
            }
            Inbound::Closed { code, reason } => {
                info!(?code, %reason, "channel closed");
                let reason = match code {
                    Some(code) if reason.is_empty() => format!("closed with code {code}"),
                    Some(code) => format!("closed with code {code}: {reason}"),
                    None if reason.is_empty() => "closed".to_owned(),
                    None => reason,
                };
                self.on_channel_lost(reason);
            }
            Inbound::Error(message) => {
                warn!(%message, "channel error");
                self.on_channel_lost(message);
            }
        }
    }

    fn on_heartbeat(&mut self, tick: HeartbeatTick) {
        match tick {
            HeartbeatTick::Ping => {
                let _ = self.write(&Frame::ping());
            }
            HeartbeatTick::Expired => {
                let err = SessionError::HeartbeatTimeout {
                    after: self.heartbeat.config().timeout,
                };
                warn!(error = %err, "connection presumed dead");
                self.on_channel_lost(err.to_string());
            }
        }
    }

    /// Unexpected loss: heartbeat first, then the channel, then the retry.
    fn on_channel_lost(&mut self, reason: String) {
        self.heartbeat.stop();
        drop(self.channel.take());
        self.set_state(ConnectionState::Disconnected);
        self.emit(&SessionEvent::Disconnected { reason });
        self.schedule_reconnect();
    }

    fn on_text(&mut self, text: &str) {
        let frame = match Frame::decode(text) {
            Ok(frame) => frame,
            Err(e) => {
                warn!(error = %e, "dropping malformed frame");
                return;
            }
        };

        match frame.kind {
            FrameKind::Pong => self.observe_version(&frame),
            FrameKind::AuthSuccess => {
                self.set_state(ConnectionState::Authenticated);
                self.emit(&SessionEvent::Frame(frame));
            }
            FrameKind::Text | FrameKind::Image => {
                if let Some(id) = frame.id() {
                    let _ = self.tracker.resolve(id, frame.clone());
                }
                self.emit(&SessionEvent::Message(frame));
            }
            _ => self.emit(&SessionEvent::Frame(frame)),
        }
    }

    fn observe_version(&mut self, pong: &Frame) {
        let Some(current) = pong.version() else {
            return;
        };
        match self.server_version.as_deref() {
            None => {
                info!(version = current, "server version");
                self.server_version = Some(current.to_owned());
                self.publish_status();
            }
            Some(previous) if previous != current => {
                let previous = previous.to_owned();
                info!(%previous, current, "server version changed");
                self.server_version = Some(current.to_owned());
                self.publish_status();
                self.emit(&SessionEvent::VersionChanged {
                    previous,
                    current: current.to_owned(),
                });
            }
            Some(_) => {}
        }
    }

    // ── State ───────────────────────────────────────────────────────────

    fn set_state(&mut self, state: ConnectionState) {
        if self.state != state {
            debug!(from = %self.state, to = %state, "state change");
            self.state = state;
        }
        self.publish_status();
    }

    fn publish_status(&self) {
        let next = SessionStatus {
            state: self.state,
            reconnect_attempts: self.reconnect.attempts(),
            server_version: self.server_version.clone(),
        };
        let _ = self.status.send_if_modified(|status| {
            if *status == next {
                false
            } else {
                *status = next;
                true
            }
        });
    }

    fn emit(&self, event: &SessionEvent) {
        let _ = self.dispatcher.emit(event);
    }
}

async fn next_inbound(channel: &mut Option<Channel>) -> Inbound {
    match channel {
        Some(channel) => channel.recv().await,
        None => std::future::pending().await,
    }
}
