//! Local filesystem storage implementation

use async_trait::async_trait;
use std::io::Write;
use std::path::{Component, Path, PathBuf};
use tokio::fs;

use crate::{
    FileStream, Storage, content_type_for,
    error::{Error, Result},
};

/// Storage rooted at a directory on the local filesystem.
///
/// All paths are interpreted relative to the root; traversal outside it is
/// rejected.
#[derive(Clone)]
pub struct LocalStorage {
    root: PathBuf,
}

impl LocalStorage {
    /// Create storage rooted at the given directory.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Resolve a relative path against the root, rejecting escapes.
    fn resolve(&self, path: &str) -> Result<PathBuf> {
        let relative = Path::new(path);
        if relative.is_absolute() {
            return Err(Error::InvalidPath(path.to_string()));
        }
        for component in relative.components() {
            match component {
                Component::Normal(_) | Component::CurDir => {}
                _ => return Err(Error::InvalidPath(path.to_string())),
            }
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl Storage for LocalStorage {
    async fn save_file(&self, path: &str, content: &[u8]) -> Result<()> {
        let full = self.resolve(path)?;
        if let Some(parent) = full.parent() {
            if !parent.exists() {
                fs::create_dir_all(parent).await?;
            }
        }
        fs::write(&full, content).await?;
        tracing::debug!(path, bytes = content.len(), "saved file");
        Ok(())
    }

    async fn get_file(&self, path: &str) -> Result<Vec<u8>> {
        let full = self.resolve(path)?;
        Ok(fs::read(&full).await?)
    }

    async fn list_folders(&self, prefix: &str) -> Result<Vec<String>> {
        let full = self.resolve(prefix)?;
        if !full.is_dir() {
            return Ok(Vec::new());
        }

        let mut names = Vec::new();
        let mut entries = fs::read_dir(&full).await?;
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_dir() {
                names.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        names.sort();
        Ok(names)
    }

    async fn create_zip_from_directory(&self, path: &str) -> Result<Vec<u8>> {
        let full = self.resolve(path)?;
        if !full.is_dir() {
            return Err(Error::DirectoryNotFound(path.to_string()));
        }

        // The zip writer is synchronous; run the whole walk off the runtime.
        tokio::task::spawn_blocking(move || zip_directory(&full))
            .await
            .map_err(|e| Error::Io(std::io::Error::other(e)))?
    }

    async fn get_file_stream(&self, path: &str) -> Result<FileStream> {
        let full = self.resolve(path)?;
        if !full.is_file() {
            return Ok(FileStream::missing());
        }
        let data = fs::read(&full).await?;
        Ok(FileStream {
            data,
            content_type: content_type_for(path).to_string(),
            exists: true,
        })
    }
}

/// Recursively zip a directory, storing entries relative to its root.
fn zip_directory(dir: &Path) -> Result<Vec<u8>> {
    let mut buffer = std::io::Cursor::new(Vec::new());
    {
        let mut writer = zip::ZipWriter::new(&mut buffer);
        let options = zip::write::SimpleFileOptions::default()
            .compression_method(zip::CompressionMethod::Deflated);
        add_dir_entries(&mut writer, dir, dir, options)?;
        writer.finish()?;
    }
    Ok(buffer.into_inner())
}

fn add_dir_entries<W: Write + std::io::Seek>(
    writer: &mut zip::ZipWriter<W>,
    root: &Path,
    dir: &Path,
    options: zip::write::SimpleFileOptions,
) -> Result<()> {
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        let name = path
            .strip_prefix(root)
            .map_err(|_| Error::InvalidPath(path.display().to_string()))?
            .to_string_lossy()
            .replace('\\', "/");

        if path.is_dir() {
            writer.add_directory(format!("{}/", name), options)?;
            add_dir_entries(writer, root, &path, options)?;
        } else {
            writer.start_file(name, options)?;
            let data = std::fs::read(&path)?;
            writer.write_all(&data)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_storage() -> LocalStorage {
        let dir = std::env::temp_dir().join(format!("ship-storage-test-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        LocalStorage::new(dir)
    }

    #[tokio::test]
    async fn test_save_and_get_round_trip() {
        let storage = temp_storage();
        storage
            .save_file("sites/demo/index.html", b"<html></html>")
            .await
            .unwrap();

        let content = storage.get_file("sites/demo/index.html").await.unwrap();
        assert_eq!(content, b"<html></html>");
    }

    #[tokio::test]
    async fn test_save_creates_parent_directories() {
        let storage = temp_storage();
        storage
            .save_file("sites/deep/nested/style.css", b"body {}")
            .await
            .unwrap();
        let content = storage.get_file("sites/deep/nested/style.css").await.unwrap();
        assert_eq!(content, b"body {}");
    }

    #[tokio::test]
    async fn test_rejects_path_traversal() {
        let storage = temp_storage();
        assert!(matches!(
            storage.save_file("../escape.txt", b"x").await,
            Err(Error::InvalidPath(_))
        ));
        assert!(matches!(
            storage.get_file("/etc/passwd").await,
            Err(Error::InvalidPath(_))
        ));
    }

    #[tokio::test]
    async fn test_list_folders() {
        let storage = temp_storage();
        storage.save_file("sites/beta/index.html", b"b").await.unwrap();
        storage.save_file("sites/alpha/index.html", b"a").await.unwrap();
        storage.save_file("sites/readme.txt", b"not a folder").await.unwrap();

        let folders = storage.list_folders("sites").await.unwrap();
        assert_eq!(folders, vec!["alpha".to_string(), "beta".to_string()]);
    }

    #[tokio::test]
    async fn test_list_folders_missing_prefix_is_empty() {
        let storage = temp_storage();
        let folders = storage.list_folders("nowhere").await.unwrap();
        assert!(folders.is_empty());
    }

    #[tokio::test]
    async fn test_zip_contains_all_entries() {
        let storage = temp_storage();
        storage.save_file("sites/demo/index.html", b"<html></html>").await.unwrap();
        storage.save_file("sites/demo/assets/app.js", b"console.log(1)").await.unwrap();

        let bytes = storage.create_zip_from_directory("sites/demo").await.unwrap();
        let mut archive = zip::ZipArchive::new(std::io::Cursor::new(bytes)).unwrap();

        let names: Vec<String> = (0..archive.len())
            .map(|i| archive.by_index(i).unwrap().name().to_string())
            .collect();
        assert!(names.contains(&"index.html".to_string()));
        assert!(names.contains(&"assets/app.js".to_string()));
    }

    #[tokio::test]
    async fn test_zip_missing_directory() {
        let storage = temp_storage();
        assert!(matches!(
            storage.create_zip_from_directory("sites/ghost").await,
            Err(Error::DirectoryNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_get_file_stream_existing() {
        let storage = temp_storage();
        storage.save_file("sites/demo/index.html", b"<html></html>").await.unwrap();

        let stream = storage.get_file_stream("sites/demo/index.html").await.unwrap();
        assert!(stream.exists);
        assert_eq!(stream.content_type, "text/html");
        assert_eq!(stream.data, b"<html></html>");
    }

    #[tokio::test]
    async fn test_get_file_stream_missing_is_not_an_error() {
        let storage = temp_storage();
        let stream = storage.get_file_stream("sites/ghost/index.html").await.unwrap();
        assert!(!stream.exists);
        assert!(stream.data.is_empty());
    }
}
