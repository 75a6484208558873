//! # secchat-transport
//!
//! Client-side session layer for SecChat.
//!
//! - [`Session`]: actor owning the channel, connection state, stored
//!   credentials and every timer; cheap `Clone` handle
//! - [`HeartbeatMonitor`]: ping cadence plus a dead-man's switch on inbound traffic
//! - [`ReconnectScheduler`]: linear capped backoff with a suppression flag
//! - [`DeliveryTracker`]: correlation IDs to completion callbacks with timeouts
//! - [`EventDispatcher`]: named-event fan-out with panic isolation
//! - [`transport`]: the [`Connector`] seam with WebSocket and in-memory implementations

#![deny(unsafe_code)]

pub mod config;
pub mod dispatcher;
pub mod errors;
pub mod events;
pub mod heartbeat;
pub mod reconnect;
pub mod session;
pub mod tracker;
pub mod transport;

pub use config::{HeartbeatConfig, SessionConfig};
pub use dispatcher::{EventDispatcher, ListenerId, Subscription};
pub use errors::TransportError;
pub use events::SessionEvent;
pub use heartbeat::{HeartbeatMonitor, HeartbeatTick};
pub use reconnect::{ReconnectScheduler, Schedule};
pub use session::{DeliveryReceipt, Session, SessionStatus};
pub use tracker::DeliveryTracker;
pub use transport::memory::{MemoryConnector, MemoryPeer, MemoryServer};
pub use transport::websocket::WebSocketConnector;
pub use transport::{Channel, Connector, Inbound};
