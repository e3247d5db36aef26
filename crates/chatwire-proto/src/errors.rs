//! Protocol error types.

use thiserror::Error;

/// Result alias for codec operations.
pub type Result<T> = std::result::Result<T, ProtocolError>;

/// Errors produced while decoding a wire frame.
///
/// Encoding is total, so every variant describes an inbound frame that could
/// not be turned into an [`crate::Envelope`]. Callers drop such frames; a
/// malformed frame never ends a session.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// Frame is not valid UTF-8 / JSON, or its shape violates an envelope
    /// invariant.
    #[error("malformed frame: {reason}")]
    Malformed {
        /// What was wrong with the frame
        reason: String,
    },

    /// Frame exceeds [`crate::Envelope::MAX_FRAME_SIZE`].
    #[error("frame too large: {size} bytes (max {max})")]
    FrameTooLarge {
        /// Size of the rejected frame
        size: usize,
        /// Configured maximum
        max: usize,
    },
}

impl ProtocolError {
    pub(crate) fn malformed(reason: impl Into<String>) -> Self {
        Self::Malformed { reason: reason.into() }
    }
}

impl From<serde_json::Error> for ProtocolError {
    fn from(err: serde_json::Error) -> Self {
        Self::malformed(err.to_string())
    }
}
