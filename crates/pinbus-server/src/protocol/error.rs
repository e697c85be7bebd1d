//! Protocol error types for the framing layer.
//!
//! Framing errors are connection-fatal: a peer that sends unparsable bytes
//! is closed. Everything above framing (unknown commands, bad payload
//! bodies, quota failures) is answered per-request with a status response
//! and never tears the connection down.

use std::io;

use thiserror::Error;

/// Maximum frame size in bytes for authenticated connections.
///
/// Frames are capped to prevent memory exhaustion; the length prefix is
/// validated BEFORE any allocation.
pub const MAX_FRAME_SIZE: usize = 64 * 1024;

/// Maximum frame size in bytes before login.
///
/// An unauthenticated peer may only send login frames, which carry a
/// single token. The stricter limit keeps a malicious client from
/// consuming memory before authenticating; the codec is upgraded to
/// [`MAX_FRAME_SIZE`] after a successful login.
pub const MAX_LOGIN_FRAME_SIZE: usize = 1024;

/// Errors for the framing layer.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Frame exceeds the currently allowed size.
    ///
    /// Detected from the length prefix before allocating the payload.
    #[error("frame too large: {size} bytes exceeds maximum {max} bytes")]
    FrameTooLarge {
        /// Size announced by the length prefix.
        size: usize,
        /// Limit in force when the frame arrived.
        max: usize,
    },

    /// Frame payload is not a well-formed protocol message.
    #[error("invalid frame: {reason}")]
    InvalidFrame {
        /// Description of the framing error.
        reason: String,
    },

    /// The peer closed the connection.
    #[error("connection closed")]
    ConnectionClosed,

    /// Underlying transport error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl ProtocolError {
    /// Create an invalid-frame error.
    pub fn invalid_frame(reason: impl Into<String>) -> Self {
        Self::InvalidFrame {
            reason: reason.into(),
        }
    }
}

/// Result type for protocol operations.
pub type ProtocolResult<T> = Result<T, ProtocolError>;
