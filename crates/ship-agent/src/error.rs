//! Error types for ship-agent

use thiserror::Error;

/// Result type alias using ship-agent Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during an onboarding run
#[derive(Error, Debug)]
pub enum Error {
    /// An error from the completion client
    #[error(transparent)]
    Ai(#[from] ship_ai::Error),

    /// An error from the storage collaborator
    #[error(transparent)]
    Storage(#[from] ship_storage::Error),

    /// A tool handler failed
    #[error("Tool '{name}' failed: {message}")]
    Tool { name: String, message: String },

    /// Quota store lookup failed
    #[error("Quota lookup failed: {0}")]
    Quota(String),

    /// The model violated the tool-use protocol
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// The run was cancelled by the client
    #[error("Creation aborted")]
    Aborted,
}

impl Error {
    /// Create a tool error
    pub fn tool(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Tool {
            name: name.into(),
            message: message.into(),
        }
    }

    /// Cancellation is reported as `creationAborted`, never as `error`.
    pub fn is_aborted(&self) -> bool {
        matches!(self, Error::Aborted)
    }
}
