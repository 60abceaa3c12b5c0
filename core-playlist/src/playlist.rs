//! Playlist navigation and removal over the persisted store.

use crate::cache::DownloadCacheManager;
use crate::error::{PlaylistError, Result};
use crate::models::{CacheState, ItemId, PlaylistItem};
use bridge_traits::playlist::PlaylistStore;
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// Ordered view of the playlist.
///
/// Navigation is bounded: there is no item after the last or before the
/// first.
#[derive(Clone)]
pub struct Playlist {
    store: Arc<dyn PlaylistStore>,
    cache: DownloadCacheManager,
}

impl Playlist {
    pub fn new(store: Arc<dyn PlaylistStore>, cache: DownloadCacheManager) -> Self {
        Self { store, cache }
    }

    pub async fn items(&self) -> Result<Vec<PlaylistItem>> {
        Ok(self.store.load_all().await?)
    }

    pub async fn len(&self) -> Result<usize> {
        Ok(self.items().await?.len())
    }

    pub async fn is_empty(&self) -> Result<bool> {
        Ok(self.len().await? == 0)
    }

    pub async fn item_at(&self, index: usize) -> Result<Option<PlaylistItem>> {
        Ok(self.items().await?.into_iter().nth(index))
    }

    pub async fn get(&self, id: &ItemId) -> Result<PlaylistItem> {
        self.store
            .get(id)
            .await?
            .ok_or_else(|| PlaylistError::ItemNotFound(id.to_string()))
    }

    pub async fn index_of(&self, id: &ItemId) -> Result<Option<usize>> {
        Ok(self.items().await?.iter().position(|item| &item.id == id))
    }

    /// Move the item at `from` to `to`.
    #[instrument(skip(self))]
    pub async fn reorder(&self, from: usize, to: usize) -> Result<()> {
        let len = self.len().await?;
        for index in [from, to] {
            if index >= len {
                return Err(PlaylistError::IndexOutOfBounds { index, len });
            }
        }
        if from == to {
            return Ok(());
        }

        self.store.reorder(from, to).await?;
        Ok(())
    }

    pub async fn next_index(&self, current: usize) -> Result<Option<usize>> {
        let len = self.len().await?;
        Ok(next_index(current, len))
    }

    pub async fn previous_index(&self, current: usize) -> Result<Option<usize>> {
        let len = self.len().await?;
        Ok(previous_index(current, len))
    }

    /// Remove an item: stop its download, drop its cached media, then
    /// delete it from the store. Returns `false` if it was not in the store.
    #[instrument(skip(self))]
    pub async fn remove(&self, id: &ItemId) -> Result<bool> {
        self.cache.cancel_download(id).await;

        if self.cache.state(id).await == CacheState::Cached {
            match self.cache.delete_cache(id).await {
                Ok(()) | Err(PlaylistError::NotCached(_)) => {}
                Err(e) => warn!("Failed to delete cached media for {}: {}", id, e),
            }
        }

        let removed = self.store.remove(id).await?;
        if removed {
            info!("Removed {} from playlist", id);
        }
        Ok(removed)
    }
}

fn next_index(current: usize, len: usize) -> Option<usize> {
    let next = current.checked_add(1)?;
    (next < len).then_some(next)
}

fn previous_index(current: usize, len: usize) -> Option<usize> {
    if current == 0 || current >= len {
        return None;
    }
    Some(current - 1)
}
