//! Persisted Media Cache Abstraction
//!
//! Provides the key-value blob store that holds fully downloaded playlist
//! media. The core treats the store as opaque: it only reads, writes, deletes
//! and checks for blobs keyed by item identity.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Metadata persisted alongside a cached blob
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlobMetadata {
    /// MIME type reported by the origin, if any
    pub content_type: Option<String>,
    /// Length of the blob in bytes
    pub length: u64,
    /// Hex-encoded SHA-256 digest of the blob contents
    pub sha256: String,
    /// URL the blob was downloaded from
    pub source_url: String,
    /// When the download completed
    pub cached_at: DateTime<Utc>,
}

/// A fully materialized cached resource
#[derive(Debug, Clone)]
pub struct StoredBlob {
    pub metadata: BlobMetadata,
    pub data: Bytes,
}

impl StoredBlob {
    pub fn new(metadata: BlobMetadata, data: Bytes) -> Self {
        Self { metadata, data }
    }

    pub fn len(&self) -> u64 {
        self.data.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Blob store trait
///
/// Abstracts the persisted cache store so hosts can keep media on disk,
/// in a sandboxed container, or in memory:
/// - Desktop: one file per item under the app cache directory
/// - Mobile: app group container / internal storage
///
/// # Example
///
/// ```ignore
/// use bridge_traits::storage::BlobStore;
///
/// async fn cached_len(store: &dyn BlobStore, id: &str) -> Result<Option<u64>> {
///     Ok(store.read(id).await?.map(|blob| blob.len()))
/// }
/// ```
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Read the blob stored for `id`, or `None` if nothing is stored.
    async fn read(&self, id: &str) -> Result<Option<StoredBlob>>;

    /// Store (or replace) the blob for `id`.
    async fn write(&self, id: &str, blob: StoredBlob) -> Result<()>;

    /// Remove the blob for `id`. Removing a missing blob is not an error.
    async fn delete(&self, id: &str) -> Result<()>;

    /// Check whether a blob is stored for `id`.
    async fn exists(&self, id: &str) -> Result<bool>;
}
