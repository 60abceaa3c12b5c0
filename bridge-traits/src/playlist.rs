//! Playlist item model and metadata store.
//!
//! Items are created by the host's ingestion path (a page is added to the
//! playlist) and persisted by a host-provided [`PlaylistStore`]. The core only
//! ever rewrites an item's source media URL.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::Result;

/// Stable identity of a playlist entry, typically the page source URL.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(String);

impl ItemId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ItemId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for ItemId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// A single playlist entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaylistItem {
    /// Stable identity
    pub id: ItemId,
    /// Display name
    pub name: String,
    /// Direct media URL; empty when the page never exposed one
    pub source_url: String,
    /// URL of the page the media was found on
    pub page_url: String,
    /// Duration in seconds
    pub duration_secs: f64,
}

impl PlaylistItem {
    /// Create an item identified by its page URL.
    pub fn new(
        name: impl Into<String>,
        source_url: impl Into<String>,
        page_url: impl Into<String>,
        duration_secs: f64,
    ) -> Self {
        let page_url = page_url.into();
        Self {
            id: ItemId::new(page_url.clone()),
            name: name.into(),
            source_url: source_url.into(),
            page_url,
            duration_secs,
        }
    }

    /// Whether the item carries a direct media URL.
    pub fn has_source(&self) -> bool {
        !self.source_url.trim().is_empty()
    }
}

/// Per-item cache state.
///
/// Legal transitions: `NotCached -> Downloading -> Cached`,
/// `Downloading -> NotCached` (cancel or failure), `Cached -> NotCached`
/// (delete).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheState {
    NotCached,
    Downloading,
    Cached,
}

impl CacheState {
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheState::NotCached => "not_cached",
            CacheState::Downloading => "downloading",
            CacheState::Cached => "cached",
        }
    }
}

impl fmt::Display for CacheState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Playlist metadata store trait
///
/// Hosts persist playlist entries however they like (Core Data, SQLite, a
/// JSON file). Ordering of [`load_all`](PlaylistStore::load_all) is the
/// playlist order.
#[async_trait]
pub trait PlaylistStore: Send + Sync {
    /// All items in playlist order.
    async fn load_all(&self) -> Result<Vec<PlaylistItem>>;

    /// Look up a single item.
    async fn get(&self, id: &ItemId) -> Result<Option<PlaylistItem>>;

    /// Insert a new item at the end, or replace an existing one in place.
    async fn upsert(&self, item: PlaylistItem) -> Result<()>;

    /// Rewrite the source media URL of an existing item.
    ///
    /// Returns [`BridgeError::NotFound`](crate::BridgeError::NotFound) if the
    /// item does not exist.
    async fn update_source_url(&self, id: &ItemId, source_url: &str) -> Result<()>;

    /// Remove an item, returning whether it existed.
    async fn remove(&self, id: &ItemId) -> Result<bool>;

    /// Move the item at `from` so that it ends up at index `to`.
    async fn reorder(&self, from: usize, to: usize) -> Result<()>;
}
