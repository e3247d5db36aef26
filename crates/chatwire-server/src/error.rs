//! Server error types.

use std::{io, net::SocketAddr};

use thiserror::Error;
use tokio_tungstenite::tungstenite;

/// Errors from the relay's network shell.
///
/// Only startup errors stop the server. Errors on a single connection end
/// that connection and are logged by the accept loop.
#[derive(Debug, Error)]
pub enum ServerError {
    /// `--bind` is not a socket address.
    #[error("invalid bind address '{address}': {reason}")]
    InvalidAddress {
        /// Address as given
        address: String,
        /// Parser message
        reason: String,
    },

    /// Listener could not be bound.
    #[error("failed to bind {address}: {source}")]
    Bind {
        /// Address we tried
        address: SocketAddr,
        /// Underlying error
        #[source]
        source: io::Error,
    },

    /// Socket I/O failed.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// WebSocket upgrade failed on an accepted socket.
    #[error("websocket handshake failed: {0}")]
    Handshake(#[from] tungstenite::Error),

    /// A connection's writer task panicked or was cancelled.
    #[error("writer task failed: {0}")]
    Writer(#[from] tokio::task::JoinError),
}
