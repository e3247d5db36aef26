//! Client
//!
//! Action-based client state machine for the chatwire protocol. Owns one
//! session: its connection lifecycle, the credential handshake, the active
//! destination, and the conversation log.
//!
//! # Architecture
//!
//! The client follows the same Sans-IO and Action-Based patterns as
//! [`chatwire_core`]. It receives events ([`ClientEvent`]), processes them
//! through pure state machine logic, and returns actions ([`ClientAction`]) for
//! the caller to execute.
//!
//! # Components
//!
//! - [`Client`]: Session aggregate over the core state machines
//! - [`ClientEvent`]: Events fed into the client
//! - [`ClientAction`]: Actions produced by the client
//!
//! # Transport (optional)
//!
//! With the `transport` feature enabled, this crate also provides:
//! - [`transport::ConnectedClient`]: WebSocket connection handle
//! - [`transport::connect`]: Connect to a server
//! - [`SystemEnv`]: Environment backed by the system clocks

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod client;
mod error;
mod event;
#[cfg(feature = "transport")]
mod system_env;

#[cfg(feature = "transport")]
pub mod transport;

pub use chatwire_core::{
    ConnectionState, Conversation, CredentialMode, Credentials, DeliveryStatus, Entry, EntryId,
    Environment, HandshakeFailure, HandshakeState, LogCursor, SessionConfig,
};
pub use chatwire_proto::{Destination, Envelope, Timestamp, UserId};
pub use client::Client;
pub use error::ClientError;
pub use event::{ClientAction, ClientEvent};
#[cfg(feature = "transport")]
pub use system_env::SystemEnv;
