//! Error types for the bubbles client.
//!
//! Uses `thiserror` for typed errors that surface through the session and
//! its background tasks: stream transport, status polling, frame decoding.

/// Errors that can occur while running a client session.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Configuration is invalid or missing.
    #[error("config error: {0}")]
    Config(String),

    /// The stream connection could not be opened or was lost.
    #[error("transport error: {0}")]
    Transport(String),

    /// The status endpoint was unreachable or answered with an error.
    #[error("status request error: {0}")]
    Status(String),

    /// A stream frame could not be interpreted.
    #[error("frame error: {0}")]
    Frame(String),

    /// The session task is gone and no longer accepts commands.
    #[error("session closed")]
    SessionClosed,

    /// Serialization or deserialization failure.
    #[error("serde error: {0}")]
    Serde(#[from] serde_json::Error),
}

impl From<bubbles_types::MessageError> for ClientError {
    fn from(err: bubbles_types::MessageError) -> Self {
        Self::Frame(err.to_string())
    }
}
