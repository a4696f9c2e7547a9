//! Key-addressed blob storage for avatar images.
//!
//! The service only needs put/get/delete/exists by object key, so the store
//! is a trait; the default implementation keeps objects on the local
//! filesystem under a configured root. An S3/MinIO-backed implementation can
//! replace it without touching callers.

use crate::errors::{Result, WorkshopError};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn put(&self, key: &str, bytes: &[u8]) -> Result<()>;
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;
    async fn delete(&self, key: &str) -> Result<()>;
    async fn exists(&self, key: &str) -> Result<bool>;
}

pub struct FsBlobStore {
    root: PathBuf,
}

impl FsBlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        FsBlobStore { root: root.into() }
    }

    /// Keys are generated internally, but reject anything that could
    /// escape the root.
    fn resolve(&self, key: &str) -> Result<PathBuf> {
        if key.is_empty() || key.starts_with('/') || key.split('/').any(|part| part == "..") {
            return Err(WorkshopError::Storage(format!("Invalid object key: {}", key)));
        }

        Ok(self.root.join(key))
    }
}

#[async_trait]
impl BlobStore for FsBlobStore {
    async fn put(&self, key: &str, bytes: &[u8]) -> Result<()> {
        let path = self.resolve(key)?;

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, bytes).await?;

        info!("Stored blob {} ({} bytes)", key, bytes.len());
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let path = self.resolve(key)?;

        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                warn!("Blob not found: {}", key);
                Ok(None)
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let path = self.resolve(key)?;

        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                info!("Deleted blob {}", key);
                Ok(())
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        let path = self.resolve(key)?;
        Ok(tokio::fs::try_exists(&path).await?)
    }
}

/// Stable object key for a user's avatar.
pub fn avatar_object_key(username: &str, user_id: i64, timestamp: i64, extension: &str) -> String {
    format!("avatars/{}_{}_{}.{}", username, user_id, timestamp, extension)
}

/// Content type served for a stored avatar, derived from the key's extension.
pub fn content_type_for_key(key: &str) -> &'static str {
    match Path::new(key)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
        .as_deref()
    {
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("svg") => "image/svg+xml",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_avatar_key_pattern() {
        assert_eq!(
            avatar_object_key("mapmaker", 7, 1700000000, "png"),
            "avatars/mapmaker_7_1700000000.png"
        );
    }

    #[test]
    fn test_content_type_mapping() {
        assert_eq!(content_type_for_key("avatars/a_1_2.jpg"), "image/jpeg");
        assert_eq!(content_type_for_key("avatars/a_1_2.svg"), "image/svg+xml");
        assert_eq!(content_type_for_key("avatars/a_1_2.bin"), "application/octet-stream");
    }

    #[tokio::test]
    async fn test_fs_store_round_trip() {
        let dir = std::env::temp_dir().join(format!("workshop-blob-test-{}", std::process::id()));
        let store = FsBlobStore::new(&dir);

        let key = "avatars/tester_1_123.png";
        assert!(!store.exists(key).await.unwrap());
        assert!(store.get(key).await.unwrap().is_none());

        store.put(key, b"png-bytes").await.unwrap();
        assert!(store.exists(key).await.unwrap());
        assert_eq!(store.get(key).await.unwrap().unwrap(), b"png-bytes");

        store.delete(key).await.unwrap();
        assert!(!store.exists(key).await.unwrap());
        // Deleting a missing object is not an error.
        store.delete(key).await.unwrap();

        let _ = tokio::fs::remove_dir_all(&dir).await;
    }

    #[tokio::test]
    async fn test_traversal_keys_rejected() {
        let store = FsBlobStore::new("/tmp/workshop-blobs");

        assert!(store.get("../etc/passwd").await.is_err());
        assert!(store.get("/etc/passwd").await.is_err());
        assert!(store.get("avatars/../../secret").await.is_err());
    }
}
