//! Error types for ship-storage

use thiserror::Error;

/// Result type alias using ship-storage Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during storage operations
#[derive(Error, Debug)]
pub enum Error {
    /// Filesystem operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Zip archive creation failed
    #[error("Zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// Path escapes the storage root or contains invalid components
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    /// Directory does not exist
    #[error("Directory not found: {0}")]
    DirectoryNotFound(String),
}
