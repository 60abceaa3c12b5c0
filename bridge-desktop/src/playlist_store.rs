//! JSON-file playlist store

use async_trait::async_trait;
use bridge_traits::{
    error::{BridgeError, Result},
    playlist::{ItemId, PlaylistItem, PlaylistStore},
};
use std::path::PathBuf;
use tokio::fs;
use tokio::sync::Mutex;
use tracing::debug;

/// Playlist store persisted as a single JSON array
///
/// The file is read lazily on first access and rewritten after every
/// mutation. All access goes through one async mutex, so concurrent writers
/// are serialized.
pub struct JsonPlaylistStore {
    path: PathBuf,
    items: Mutex<Option<Vec<PlaylistItem>>>,
}

impl JsonPlaylistStore {
    /// Store at `playlist.json` under the platform data directory
    pub fn new() -> Self {
        let path = dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("playlist-core")
            .join("playlist.json");

        Self::with_path(path)
    }

    pub fn with_path(path: PathBuf) -> Self {
        Self {
            path,
            items: Mutex::new(None),
        }
    }

    async fn load_from_disk(&self) -> Result<Vec<PlaylistItem>> {
        match fs::read(&self.path).await {
            Ok(raw) => serde_json::from_slice(&raw)
                .map_err(|e| BridgeError::Serialization(e.to_string())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(BridgeError::Io(e)),
        }
    }

    async fn persist(&self, items: &[PlaylistItem]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let raw = serde_json::to_vec_pretty(items)
            .map_err(|e| BridgeError::Serialization(e.to_string()))?;

        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, raw).await?;
        fs::rename(&tmp, &self.path).await?;

        debug!(path = ?self.path, count = items.len(), "Persisted playlist");
        Ok(())
    }

    /// Run `f` against the loaded item list and persist when it reports a change.
    async fn mutate<T>(
        &self,
        f: impl FnOnce(&mut Vec<PlaylistItem>) -> Result<(T, bool)>,
    ) -> Result<T> {
        let mut guard = self.items.lock().await;
        if guard.is_none() {
            *guard = Some(self.load_from_disk().await?);
        }
        let items = guard.get_or_insert_with(Vec::new);

        let (value, changed) = f(items)?;
        if changed {
            self.persist(items).await?;
        }
        Ok(value)
    }
}

impl Default for JsonPlaylistStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PlaylistStore for JsonPlaylistStore {
    async fn load_all(&self) -> Result<Vec<PlaylistItem>> {
        self.mutate(|items| Ok((items.clone(), false))).await
    }

    async fn get(&self, id: &ItemId) -> Result<Option<PlaylistItem>> {
        self.mutate(|items| Ok((items.iter().find(|item| &item.id == id).cloned(), false)))
            .await
    }

    async fn upsert(&self, item: PlaylistItem) -> Result<()> {
        self.mutate(|items| {
            match items.iter_mut().find(|existing| existing.id == item.id) {
                Some(existing) => *existing = item,
                None => items.push(item),
            }
            Ok(((), true))
        })
        .await
    }

    async fn update_source_url(&self, id: &ItemId, source_url: &str) -> Result<()> {
        self.mutate(|items| {
            let item = items
                .iter_mut()
                .find(|item| &item.id == id)
                .ok_or_else(|| BridgeError::NotFound(id.to_string()))?;
            item.source_url = source_url.to_string();
            Ok(((), true))
        })
        .await
    }

    async fn remove(&self, id: &ItemId) -> Result<bool> {
        self.mutate(|items| {
            let before = items.len();
            items.retain(|item| &item.id != id);
            let removed = items.len() != before;
            Ok((removed, removed))
        })
        .await
    }

    async fn reorder(&self, from: usize, to: usize) -> Result<()> {
        self.mutate(|items| {
            if from >= items.len() || to >= items.len() {
                return Err(BridgeError::OperationFailed(format!(
                    "reorder {} -> {} out of bounds for {} items",
                    from,
                    to,
                    items.len()
                )));
            }
            let item = items.remove(from);
            items.insert(to, item);
            Ok(((), from != to))
        })
        .await
    }
}
