//! ship-storage: file storage for generated website artifacts
//!
//! The conversation loop's tool handlers treat this purely as a side-effecting
//! collaborator. No caching or consistency beyond the underlying filesystem.

pub mod error;
pub mod local;

pub use error::{Error, Result};
pub use local::LocalStorage;

use async_trait::async_trait;

/// A stored file plus the metadata the gateway needs to serve it.
#[derive(Debug, Clone)]
pub struct FileStream {
    pub data: Vec<u8>,
    pub content_type: String,
    pub exists: bool,
}

impl FileStream {
    /// A response for a path that does not exist.
    pub fn missing() -> Self {
        Self {
            data: Vec::new(),
            content_type: "application/octet-stream".to_string(),
            exists: false,
        }
    }
}

/// Storage collaborator invoked from inside tool handlers and the gateway.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Write a file, creating parent directories as needed.
    async fn save_file(&self, path: &str, content: &[u8]) -> Result<()>;

    /// Read a file's full contents.
    async fn get_file(&self, path: &str) -> Result<Vec<u8>>;

    /// List immediate subdirectory names under a prefix.
    async fn list_folders(&self, prefix: &str) -> Result<Vec<String>>;

    /// Zip up a directory tree and return the archive bytes.
    async fn create_zip_from_directory(&self, path: &str) -> Result<Vec<u8>>;

    /// Fetch a file with its content type; missing files are not an error.
    async fn get_file_stream(&self, path: &str) -> Result<FileStream>;
}

/// Guess a content type from the file extension.
///
/// Covers the artifact types the CTO tool produces plus common assets.
pub fn content_type_for(path: &str) -> &'static str {
    let ext = path.rsplit('.').next().unwrap_or_default();
    match ext.to_ascii_lowercase().as_str() {
        "html" | "htm" => "text/html",
        "css" => "text/css",
        "js" | "mjs" => "application/javascript",
        "json" => "application/json",
        "svg" => "image/svg+xml",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "ico" => "image/x-icon",
        "txt" => "text/plain",
        "zip" => "application/zip",
        "woff" => "font/woff",
        "woff2" => "font/woff2",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_type_for_common_artifacts() {
        assert_eq!(content_type_for("sites/demo/index.html"), "text/html");
        assert_eq!(content_type_for("styles.CSS"), "text/css");
        assert_eq!(content_type_for("app.js"), "application/javascript");
        assert_eq!(content_type_for("logo.svg"), "image/svg+xml");
    }

    #[test]
    fn test_content_type_for_unknown() {
        assert_eq!(content_type_for("archive.bin"), "application/octet-stream");
        assert_eq!(content_type_for("no_extension"), "application/octet-stream");
    }
}
