//! Chatwire protocol
//!
//! Typed envelopes exchanged between a chat client and its relay, and the
//! textual JSON codec that carries them over the wire.
//!
//! # Components
//!
//! - [`Envelope`]: immutable protocol unit (login, signup, results, join,
//!   message)
//! - [`Destination`]: normalized addressing, either a direct peer or a room
//! - [`encode`] / [`decode`]: wire codec with legacy-shape normalization
//!
//! The codec is deliberately tolerant on input: frames from older protocol
//! revisions (no timestamp, bare login without password, peer addressing)
//! decode into the same normalized model as current frames. Unknown envelope
//! types decode to [`EnvelopeKind::Unknown`] instead of failing.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod codec;
mod envelope;
pub mod errors;
mod ids;

pub use codec::{decode, decode_bytes, encode};
pub use envelope::{Envelope, EnvelopeKind, Status, Timestamp};
pub use errors::ProtocolError;
pub use ids::{Destination, RoomId, UserId};
