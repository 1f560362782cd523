//! Error types for the terminal viewer.

use bubbles_client::{ClientError, ConfigError};

/// Errors that end the viewer.
#[derive(Debug, thiserror::Error)]
pub enum ViewerError {
    /// The configuration could not be loaded or is invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The client could not be set up or the session went away.
    #[error("client error: {0}")]
    Client(#[from] ClientError),

    /// Reading commands or writing the grid failed.
    #[error("terminal I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The session task panicked or was cancelled.
    #[error("session task failed: {0}")]
    Task(String),
}
