//! Blob Store Implementation using Tokio

use async_trait::async_trait;
use bridge_traits::{
    error::{BridgeError, Result},
    storage::{BlobMetadata, BlobStore, StoredBlob},
};
use bytes::Bytes;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

/// File-backed blob store
///
/// Each cached item is kept as two files under the cache directory:
/// - `<key>.media` with the raw bytes
/// - `<key>.json` with the [`BlobMetadata`] sidecar
///
/// Item ids are URLs, so the file key is the hex SHA-256 of the id.
pub struct FileBlobStore {
    root: PathBuf,
}

impl FileBlobStore {
    /// Create a store under the platform cache directory
    pub fn new() -> Self {
        let root = dirs::cache_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join("playlist-core")
            .join("media");

        Self { root }
    }

    /// Create a store rooted at a custom directory
    pub fn with_directory(root: PathBuf) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn file_key(id: &str) -> String {
        hex::encode(Sha256::digest(id.as_bytes()))
    }

    fn data_path(&self, id: &str) -> PathBuf {
        self.root.join(format!("{}.media", Self::file_key(id)))
    }

    fn metadata_path(&self, id: &str) -> PathBuf {
        self.root.join(format!("{}.json", Self::file_key(id)))
    }

    async fn ensure_root(&self) -> Result<()> {
        if !fs::try_exists(&self.root).await? {
            fs::create_dir_all(&self.root).await?;
            debug!(path = ?self.root, "Created blob directory");
        }
        Ok(())
    }

    /// Write through a temporary file so readers never see a torn blob
    async fn write_atomic(path: &Path, data: &[u8]) -> Result<()> {
        let tmp = path.with_extension("tmp");
        fs::write(&tmp, data).await?;
        fs::rename(&tmp, path).await?;
        Ok(())
    }

    async fn remove_if_present(path: &Path) -> Result<()> {
        match fs::remove_file(path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(BridgeError::Io(e)),
        }
    }
}

impl Default for FileBlobStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BlobStore for FileBlobStore {
    async fn read(&self, id: &str) -> Result<Option<StoredBlob>> {
        let data_path = self.data_path(id);
        let metadata_path = self.metadata_path(id);

        let data = match fs::read(&data_path).await {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(BridgeError::Io(e)),
        };

        let raw_metadata = match fs::read(&metadata_path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(BridgeError::Io(e)),
        };

        let metadata: BlobMetadata = serde_json::from_slice(&raw_metadata)
            .map_err(|e| BridgeError::Serialization(e.to_string()))?;

        debug!(id, size = data.len(), "Read cached blob");
        Ok(Some(StoredBlob::new(metadata, Bytes::from(data))))
    }

    async fn write(&self, id: &str, blob: StoredBlob) -> Result<()> {
        self.ensure_root().await?;

        let metadata = serde_json::to_vec(&blob.metadata)
            .map_err(|e| BridgeError::Serialization(e.to_string()))?;

        // Data first: a sidecar without data reads as "not cached"
        Self::write_atomic(&self.data_path(id), &blob.data).await?;
        Self::write_atomic(&self.metadata_path(id), &metadata).await?;

        debug!(id, size = blob.data.len(), "Wrote cached blob");
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<()> {
        Self::remove_if_present(&self.metadata_path(id)).await?;
        Self::remove_if_present(&self.data_path(id)).await?;
        debug!(id, "Deleted cached blob");
        Ok(())
    }

    async fn exists(&self, id: &str) -> Result<bool> {
        Ok(fs::try_exists(self.data_path(id)).await?
            && fs::try_exists(self.metadata_path(id)).await?)
    }
}
