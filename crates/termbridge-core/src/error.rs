//! Error types for termbridge.
//!
//! The variants follow the lifecycle of a terminal connection: a workload
//! that never started reports [`Error::Spawn`], a live connection that breaks
//! reports [`Error::Transport`] or [`Error::Io`], and a pump asked to stop
//! unwinds with [`Error::Cancelled`]. Malformed escape sequences never become
//! errors; the parser drops them.

use thiserror::Error;

/// Main error type for termbridge operations.
#[derive(Debug, Error)]
pub enum Error {
    /// The child process could not be created
    #[error("Failed to spawn '{command}': {reason}")]
    Spawn {
        /// Program that was being started
        command: String,
        /// Underlying failure
        reason: String,
    },

    /// Read/write failure on a live connection
    #[error("Transport error: {0}")]
    Transport(String),

    /// The OS refused a window-size change
    #[error("Resize failed: {0}")]
    Resize(String),

    /// A pump or adapter operation was cancelled
    #[error("Operation cancelled")]
    Cancelled,

    /// Timeout waiting for condition
    #[error("Timeout waiting for condition after {0}ms")]
    WaitTimeout(u64),

    /// Invalid key string
    #[error("Invalid key: {0}")]
    InvalidKey(String),

    /// Invalid terminal dimensions
    #[error("Invalid dimensions: {rows}x{cols}")]
    InvalidDimensions {
        /// Number of rows
        rows: u16,
        /// Number of columns
        cols: u16,
    },

    /// An operation needs an adapter that is not attached
    #[error("No {0} attached")]
    NotAttached(&'static str),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Invalid input or parameters (generic)
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl Error {
    /// Build a spawn error from any displayable failure.
    pub fn spawn(command: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Error::Spawn {
            command: command.into(),
            reason: reason.to_string(),
        }
    }

    /// Whether this error means the connection itself is gone.
    ///
    /// Transport and I/O failures are treated like a disconnect by the pumps.
    pub fn is_transport(&self) -> bool {
        matches!(self, Error::Transport(_) | Error::Io(_))
    }
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;
