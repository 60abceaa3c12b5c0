//! Core service façade.
//!
//! [`PlaylistService`] wires a [`CoreConfig`] into the acquisition subsystem:
//! one event bus, one download cache, one orchestrator and the playlist view
//! over the host store. Hosts construct it explicitly and call
//! [`PlaylistService::shutdown`] when done; there is no process-wide
//! instance. Desktop builds enable the `desktop-shims` feature so that
//! `CoreConfig` can fall back to the `bridge-desktop` adapters.

pub mod error;

pub use error::{CoreError, Result};

use core_playlist::{
    AcquisitionConfig, CacheConfig, CacheState, DownloadCacheManager, DownloadTicket,
    ItemCacheStatus, ItemId, LoadOutcome, LoaderSession, MediaAcquisitionOrchestrator,
    NowPlayingTracker, PlaybackStatus, Playlist, PlaylistItem, RateSubscription, ResourceLoader,
};
use core_runtime::config::CoreConfig;
use core_runtime::events::{CoreEvent, EventBus, Receiver};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info, instrument};

/// Primary façade exposed to host applications.
///
/// Cloning is cheap; clones share the same cache, sessions and event bus.
#[derive(Clone)]
pub struct PlaylistService {
    inner: Arc<ServiceInner>,
}

struct ServiceInner {
    event_bus: EventBus,
    cache: DownloadCacheManager,
    orchestrator: MediaAcquisitionOrchestrator,
    playlist: Playlist,
    now_playing: Option<NowPlayingTracker>,
    /// Loader session currently bound to each loaded item
    sessions: Mutex<HashMap<ItemId, LoaderSession>>,
}

impl PlaylistService {
    /// Build the service from `config` and hydrate cache state from the
    /// blob store.
    pub async fn new(config: CoreConfig) -> Result<Self> {
        config.validate()?;

        let event_bus = EventBus::new(config.event_buffer_size);
        let cache = DownloadCacheManager::new(
            CacheConfig::from(&config.media),
            config.http_client.clone(),
            config.blob_store.clone(),
            config.playlist_store.clone(),
        )
        .with_event_bus(event_bus.clone());

        cache
            .initialize()
            .await
            .map_err(|e| CoreError::InitializationFailed(e.to_string()))?;

        let orchestrator = MediaAcquisitionOrchestrator::new(
            AcquisitionConfig::from(&config.media),
            cache.clone(),
            config.http_client.clone(),
            config.page_extractor.clone(),
        )?
        .with_event_bus(event_bus.clone());

        let playlist = Playlist::new(config.playlist_store.clone(), cache.clone());
        let now_playing = config.now_playing_sink.clone().map(NowPlayingTracker::new);

        info!(
            cache_dir = %config.cache_dir.display(),
            now_playing = now_playing.is_some(),
            "Playlist service ready"
        );

        Ok(Self {
            inner: Arc::new(ServiceInner {
                event_bus,
                cache,
                orchestrator,
                playlist,
                now_playing,
                sessions: Mutex::new(HashMap::new()),
            }),
        })
    }

    /// Subscribe to cache and media events. Past events are not replayed.
    pub fn subscribe(&self) -> Receiver<CoreEvent> {
        self.inner.event_bus.subscribe()
    }

    pub fn playlist(&self) -> &Playlist {
        &self.inner.playlist
    }

    pub fn cache(&self) -> &DownloadCacheManager {
        &self.inner.cache
    }

    /// Every playlist item with its cache state, in playlist order.
    pub async fn items(&self) -> Result<Vec<ItemCacheStatus>> {
        Ok(self.inner.cache.items().await?)
    }

    pub async fn cache_state(&self, id: &ItemId) -> CacheState {
        self.inner.cache.state(id).await
    }

    /// Acquire media for the item `id`.
    ///
    /// A ready outcome replaces (and closes) any session previously bound to
    /// the item. Fails only when the item is not in the playlist; every
    /// acquisition problem is reported through the outcome.
    #[instrument(skip(self))]
    pub async fn load(&self, id: &ItemId) -> Result<LoadOutcome> {
        let item = self.inner.playlist.get(id).await?;
        let outcome = self.inner.orchestrator.load(&item).await;

        if let LoadOutcome::Ready(media) = &outcome {
            let previous = self
                .inner
                .sessions
                .lock()
                .insert(id.clone(), media.session.clone());
            if let Some(previous) = previous {
                debug!("Closing previous session for {}", id);
                previous.close();
            }
        }

        Ok(outcome)
    }

    /// Close the session bound to `id`, if any.
    pub fn release(&self, id: &ItemId) -> bool {
        let session = self.inner.sessions.lock().remove(id);
        match session {
            Some(session) => {
                session.close();
                true
            }
            None => false,
        }
    }

    /// Number of items with a live loader session.
    pub fn live_sessions(&self) -> usize {
        self.inner.sessions.lock().len()
    }

    /// Start a background download of `id`.
    pub async fn start_download(&self, id: &ItemId) -> Result<DownloadTicket> {
        let item = self.inner.playlist.get(id).await?;
        Ok(self.inner.cache.start_download(&item).await?)
    }

    pub async fn cancel_download(&self, id: &ItemId) -> bool {
        self.inner.cache.cancel_download(id).await
    }

    pub async fn delete_cache(&self, id: &ItemId) -> Result<()> {
        Ok(self.inner.cache.delete_cache(id).await?)
    }

    /// Remove `id` from the playlist, closing its session and dropping any
    /// download or cached media.
    pub async fn remove(&self, id: &ItemId) -> Result<bool> {
        self.release(id);
        Ok(self.inner.playlist.remove(id).await?)
    }

    pub async fn reorder(&self, from: usize, to: usize) -> Result<()> {
        Ok(self.inner.playlist.reorder(from, to).await?)
    }

    /// Publish now-playing info for `item` and keep it current on rate
    /// changes. `None` when the host injected no now-playing sink.
    pub fn watch_now_playing(
        &self,
        item: PlaylistItem,
        status: watch::Receiver<PlaybackStatus>,
    ) -> Option<RateSubscription> {
        self.inner
            .now_playing
            .as_ref()
            .map(|tracker| tracker.watch_rate(item, status))
    }

    /// Cancel every download, close every live session and clear the
    /// now-playing display.
    pub async fn shutdown(&self) {
        self.inner.cache.shutdown();

        let sessions: Vec<LoaderSession> = self
            .inner
            .sessions
            .lock()
            .drain()
            .map(|(_, session)| session)
            .collect();
        let closed = sessions.len();
        for session in sessions {
            session.close();
        }

        if let Some(tracker) = &self.inner.now_playing {
            tracker.clear().await;
        }

        info!(closed_sessions = closed, "Playlist service shut down");
    }
}
