//! Error types for tailing.

use crate::types::MessageId;
use thiserror::Error;

/// Main error type for channel, requestor and tail operations.
#[derive(Debug, Error)]
pub enum TailError {
    #[error("Transport not supported: {0}")]
    TransportUnsupported(String),

    #[error("Request failed")]
    RequestFailed,

    #[error("{status} {status_text}")]
    Status { status: u16, status_text: String },

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Codec error: {0}")]
    Codec(String),

    #[error("Channel closed")]
    ChannelClosed,

    #[error("Cursor not found: {0}")]
    CursorNotFound(MessageId),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl TailError {
    /// Status text for HTTP-style failures, if this error carries one.
    pub fn status_text(&self) -> Option<&str> {
        match self {
            TailError::Status { status_text, .. } => Some(status_text),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for TailError {
    fn from(e: serde_json::Error) -> Self {
        TailError::Decode(e.to_string())
    }
}

impl From<rmp_serde::encode::Error> for TailError {
    fn from(e: rmp_serde::encode::Error) -> Self {
        TailError::Codec(e.to_string())
    }
}

impl From<rmp_serde::decode::Error> for TailError {
    fn from(e: rmp_serde::decode::Error) -> Self {
        TailError::Codec(e.to_string())
    }
}

/// Result type for tailing operations.
pub type Result<T> = std::result::Result<T, TailError>;
