//! # secchat-core
//!
//! Shared vocabulary for the SecChat client transport layer:
//!
//! - **Frames**: [`Frame`] and [`FrameKind`], the JSON records exchanged over the channel
//! - **Credentials**: [`AuthCredentials`] replayed after every reconnect
//! - **Branded IDs**: [`MessageId`] correlation identifiers
//! - **State**: [`ConnectionState`] lifecycle enum
//! - **Errors**: [`SessionError`] and [`DecodeError`] via `thiserror`
//! - **Backoff**: linear capped reconnect delay math

#![deny(unsafe_code)]

pub mod backoff;
pub mod constants;
pub mod errors;
pub mod frame;
pub mod ids;
pub mod state;

pub use errors::{DecodeError, SessionError};
pub use frame::{AuthCredentials, Frame, FrameKind, SendOptions};
pub use ids::MessageId;
pub use state::ConnectionState;
