//! Core
//!
//! Pure state machines for a chat session: connection lifecycle,
//! authentication handshake, destination routing, and the per-conversation
//! message log.
//!
//! # Architecture
//!
//! Nothing in this crate performs I/O or reads a clock. Every operation takes
//! the current time as a parameter and returns actions or outcomes for a
//! driver to execute, so the same logic runs against real sockets and against
//! the deterministic simulation harness.
//!
//! # Components
//!
//! - [`Session`]: connection lifecycle and send gating
//! - [`Handshake`]: credential exchange, one request in flight at a time
//! - [`ChannelRouter`]: active destination and inbound filtering
//! - [`Conversation`]: append-only log with optimistic echo suppression

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod context;
pub mod conversation;
pub mod env;
pub mod error;
pub mod handshake;
pub mod router;
pub mod session;

pub use context::UserContext;
pub use conversation::{
    AppendOutcome, Conversation, DeliveryStatus, Entry, EntryId, LogCursor, Origin,
};
pub use env::Environment;
pub use error::{HandshakeError, HandshakeFailure, RouterError, SessionError};
pub use handshake::{
    CredentialMode, Credentials, Handshake, HandshakeAction, HandshakeEvent, HandshakeState,
};
pub use router::{ChannelRouter, Routed, Subscription, matches_destination};
pub use session::{ConnectionState, Session, SessionConfig};
