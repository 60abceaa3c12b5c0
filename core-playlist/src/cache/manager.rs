//! # Download Cache Manager
//!
//! Owns the per-item cache state machine and the background downloads that
//! drive it.
//!
//! ```text
//!              start_download            download completes
//!  NotCached ─────────────────▶ Downloading ──────────────────▶ Cached
//!      ▲                            │                            │
//!      └──── cancelled or failed ───┘                            │
//!      └─────────────────────── delete_cache ────────────────────┘
//! ```
//!
//! Every transition happens under one lock, so readers never see a
//! half-finished move. Downloads run on spawned tasks, throttled by a
//! semaphore, each attempt bounded by a timeout and retried with
//! exponential backoff. Partial bytes are never persisted.

use crate::cache::config::CacheConfig;
use crate::cache::progress::{DownloadProgress, ProgressThrottle};
use crate::error::{PlaylistError, Result};
use crate::models::{CacheState, ItemCacheStatus, ItemId, PlaylistItem};
use bridge_traits::http::{HttpClient, HttpRequest};
use bridge_traits::playlist::PlaylistStore;
use bridge_traits::storage::{BlobMetadata, BlobStore, StoredBlob};
use bridge_traits::BridgeError;
use bytes::{Bytes, BytesMut};
use chrono::Utc;
use core_runtime::events::{CacheEvent, CoreEvent, EventBus};
use core_runtime::logging::redact_url;
use futures::StreamExt;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{oneshot, Mutex, Semaphore};
use tokio::time::{sleep, timeout};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

const RETRY_BASE_DELAY_MS: u64 = 100;
const MAX_RETRY_DELAY: Duration = Duration::from_secs(30);

/// How a download ended, when it did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadOutcome {
    /// The media is cached.
    Completed { bytes: u64 },
    /// The download was cancelled and the item is not cached.
    Cancelled,
}

/// Handle to a running download.
#[derive(Debug)]
pub struct DownloadTicket {
    item_id: ItemId,
    receiver: oneshot::Receiver<Result<DownloadOutcome>>,
    token: CancellationToken,
}

impl DownloadTicket {
    pub fn item_id(&self) -> &ItemId {
        &self.item_id
    }

    /// Request cancellation. The download unwinds to not cached.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Wait for the download to end.
    pub async fn wait(self) -> Result<DownloadOutcome> {
        match self.receiver.await {
            Ok(result) => result,
            Err(_) => Err(PlaylistError::Internal(format!(
                "download task for {} ended without a result",
                self.item_id
            ))),
        }
    }
}

/// In-flight state of one downloading item.
struct DownloadTask {
    generation: u64,
    token: CancellationToken,
    progress: Arc<parking_lot::Mutex<DownloadProgress>>,
}

enum Entry {
    Downloading(DownloadTask),
    Cached,
}

impl Entry {
    fn state(&self) -> CacheState {
        match self {
            Entry::Downloading(_) => CacheState::Downloading,
            Entry::Cached => CacheState::Cached,
        }
    }
}

struct DownloadedMedia {
    data: Bytes,
    content_type: Option<String>,
}

/// Download cache manager.
///
/// Clones share state, so a clone can be handed to every component that
/// needs cache access.
#[derive(Clone)]
pub struct DownloadCacheManager {
    config: CacheConfig,
    http_client: Arc<dyn HttpClient>,
    blobs: Arc<dyn BlobStore>,
    playlist_store: Arc<dyn PlaylistStore>,
    event_bus: Option<EventBus>,
    download_semaphore: Arc<Semaphore>,
    entries: Arc<Mutex<HashMap<ItemId, Entry>>>,
    /// Held while a finished download is persisted, so a stale task can
    /// never overwrite the blob of a newer one
    persist_lock: Arc<Mutex<()>>,
    shutdown_token: CancellationToken,
    next_generation: Arc<AtomicU64>,
}

impl DownloadCacheManager {
    /// Create a new download cache manager.
    ///
    /// # Arguments
    ///
    /// * `config` - Cache configuration
    /// * `http_client` - HTTP client for streamed downloads
    /// * `blobs` - Persisted store for downloaded media
    /// * `playlist_store` - Store holding item metadata and source URLs
    pub fn new(
        config: CacheConfig,
        http_client: Arc<dyn HttpClient>,
        blobs: Arc<dyn BlobStore>,
        playlist_store: Arc<dyn PlaylistStore>,
    ) -> Self {
        let download_semaphore = Arc::new(Semaphore::new(config.max_concurrent_downloads.max(1)));

        Self {
            config,
            http_client,
            blobs,
            playlist_store,
            event_bus: None,
            download_semaphore,
            entries: Arc::new(Mutex::new(HashMap::new())),
            persist_lock: Arc::new(Mutex::new(())),
            shutdown_token: CancellationToken::new(),
            next_generation: Arc::new(AtomicU64::new(1)),
        }
    }

    /// Set event bus for state and progress events.
    pub fn with_event_bus(mut self, event_bus: EventBus) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Validate configuration and mark items whose media is already
    /// persisted as cached.
    #[instrument(skip(self))]
    pub async fn initialize(&self) -> Result<()> {
        info!("Initializing download cache manager");

        self.config.validate().map_err(|e| {
            PlaylistError::InvalidConfig(format!("Invalid cache configuration: {}", e))
        })?;

        let items = self
            .playlist_store
            .load_all()
            .await
            .map_err(|e| PlaylistError::Storage(format!("Failed to load playlist: {}", e)))?;

        let mut entries = self.entries.lock().await;
        let mut cached = 0usize;
        for item in items {
            if entries.contains_key(&item.id) {
                continue;
            }
            if self.blob_state(&item.id).await == CacheState::Cached {
                entries.insert(item.id, Entry::Cached);
                cached += 1;
            }
        }

        info!("Cache manager initialized with {} cached items", cached);
        Ok(())
    }

    /// Current cache state of `id`.
    pub async fn state(&self, id: &ItemId) -> CacheState {
        if let Some(entry) = self.entries.lock().await.get(id) {
            return entry.state();
        }
        self.blob_state(id).await
    }

    async fn blob_state(&self, id: &ItemId) -> CacheState {
        match self.blobs.exists(id.as_str()).await {
            Ok(true) => CacheState::Cached,
            Ok(false) => CacheState::NotCached,
            Err(e) => {
                warn!("Failed to check cached media for {}: {}", id, e);
                CacheState::NotCached
            }
        }
    }

    /// Start downloading `item` in the background.
    ///
    /// Fails with [`PlaylistError::AlreadyInProgress`] unless the item is
    /// not cached, and with [`PlaylistError::MissingSource`] when it has no
    /// source URL. A running download is never replaced.
    #[instrument(skip(self, item), fields(item_id = %item.id))]
    pub async fn start_download(&self, item: &PlaylistItem) -> Result<DownloadTicket> {
        if !item.has_source() {
            return Err(PlaylistError::MissingSource(item.id.to_string()));
        }

        let mut entries = self.entries.lock().await;
        let current = match entries.get(&item.id) {
            Some(entry) => entry.state(),
            None => self.blob_state(&item.id).await,
        };
        if current != CacheState::NotCached {
            debug!("Refusing download, item is {}", current);
            return Err(PlaylistError::AlreadyInProgress(item.id.to_string()));
        }

        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        let token = self.shutdown_token.child_token();
        let progress = Arc::new(parking_lot::Mutex::new(DownloadProgress::new(
            item.id.as_str(),
        )));
        entries.insert(
            item.id.clone(),
            Entry::Downloading(DownloadTask {
                generation,
                token: token.clone(),
                progress: progress.clone(),
            }),
        );
        drop(entries);

        info!(
            "Starting download for {} from {}",
            item.id,
            redact_url(&item.source_url)
        );
        self.emit_state(&item.id, CacheState::Downloading);

        let item_id = item.id.clone();
        let (sender, receiver) = oneshot::channel();
        let manager = self.clone();
        let item = item.clone();
        let task_token = token.clone();
        tokio::spawn(async move {
            let result = manager
                .download_with_retry(&item, &task_token, &progress)
                .await;
            let outcome = manager.finish(&item, generation, result).await;
            let _ = sender.send(outcome);
        });

        Ok(DownloadTicket {
            item_id,
            receiver,
            token,
        })
    }

    /// Download with semaphore throttling and automatic retry.
    async fn download_with_retry(
        &self,
        item: &PlaylistItem,
        token: &CancellationToken,
        progress: &Arc<parking_lot::Mutex<DownloadProgress>>,
    ) -> Result<DownloadedMedia> {
        let _permit = tokio::select! {
            _ = token.cancelled() => return Err(PlaylistError::Cancelled),
            permit = self.download_semaphore.clone().acquire_owned() => permit
                .map_err(|_| PlaylistError::Internal("Download semaphore closed".to_string()))?,
        };

        let mut last_error = None;
        for attempt in 1..=self.config.max_retry_attempts {
            debug!(
                "Download attempt {}/{} for {}",
                attempt, self.config.max_retry_attempts, item.id
            );

            match timeout(
                self.config.download_timeout,
                self.fetch_resource(item, token, progress),
            )
            .await
            {
                Ok(Ok(media)) => return Ok(media),
                Ok(Err(PlaylistError::Cancelled)) => return Err(PlaylistError::Cancelled),
                Ok(Err(e)) => {
                    warn!("Download attempt {} failed: {}", attempt, e);
                    let transient = e.is_transient();
                    last_error = Some(e);
                    if !transient {
                        break;
                    }
                }
                Err(_) => {
                    warn!("Download attempt {} timed out", attempt);
                    last_error = Some(PlaylistError::InvalidResponse(
                        "Download timeout".to_string(),
                    ));
                }
            }

            if token.is_cancelled() {
                return Err(PlaylistError::Cancelled);
            }

            // Wait before retry (exponential backoff)
            if attempt < self.config.max_retry_attempts {
                let delay = retry_delay(attempt);
                tokio::select! {
                    _ = token.cancelled() => return Err(PlaylistError::Cancelled),
                    _ = sleep(delay) => {}
                }
            }
        }

        Err(last_error.unwrap_or_else(|| {
            PlaylistError::Internal("Download failed after all retries".to_string())
        }))
    }

    /// One streamed download attempt. Cancellation is checked per chunk.
    async fn fetch_resource(
        &self,
        item: &PlaylistItem,
        token: &CancellationToken,
        progress: &Arc<parking_lot::Mutex<DownloadProgress>>,
    ) -> Result<DownloadedMedia> {
        let request = HttpRequest::get(&item.source_url).timeout(self.config.download_timeout);
        let response = tokio::select! {
            _ = token.cancelled() => return Err(PlaylistError::Cancelled),
            response = self.http_client.stream(request) => response
                .map_err(|e| PlaylistError::InvalidResponse(e.to_string()))?,
        };

        if !response.is_success() {
            return Err(PlaylistError::InvalidResponse(format!(
                "HTTP {}",
                response.status
            )));
        }

        let total = response.content_length();
        let content_type = response.header("content-type").map(str::to_string);
        progress.lock().reset(total);

        let mut throttle = ProgressThrottle::new(self.config.progress_step_percent);
        self.report_progress(&item.id, progress, &mut throttle);

        let mut body = response.body;
        let mut data = BytesMut::new();
        loop {
            let chunk = tokio::select! {
                _ = token.cancelled() => return Err(PlaylistError::Cancelled),
                chunk = body.next() => chunk,
            };

            match chunk {
                Some(Ok(bytes)) => {
                    data.extend_from_slice(&bytes);
                    progress.lock().update(data.len() as u64);
                    self.report_progress(&item.id, progress, &mut throttle);
                }
                Some(Err(e)) => return Err(PlaylistError::InvalidResponse(e.to_string())),
                None => break,
            }
        }

        if let Some(expected) = total {
            if data.len() as u64 != expected {
                return Err(PlaylistError::InvalidResponse(format!(
                    "Truncated download: expected {} bytes, got {}",
                    expected,
                    data.len()
                )));
            }
        }

        Ok(DownloadedMedia {
            data: data.freeze(),
            content_type,
        })
    }

    /// Apply the result of a download task, unless the task was cancelled
    /// or superseded while it ran.
    ///
    /// The blob is written without holding the entry lock. A cancel that
    /// lands during the write removes the freshly written blob again.
    async fn finish(
        &self,
        item: &PlaylistItem,
        generation: u64,
        result: Result<DownloadedMedia>,
    ) -> Result<DownloadOutcome> {
        let media = match result {
            Ok(media) => media,
            Err(error) => {
                let mut entries = self.entries.lock().await;
                if !is_current(&entries, &item.id, generation) {
                    debug!("Discarding result of stale download for {}", item.id);
                    return Ok(DownloadOutcome::Cancelled);
                }
                entries.remove(&item.id);
                drop(entries);
                return self.roll_back(&item.id, error);
            }
        };

        let _persist = self.persist_lock.lock().await;
        let current = is_current(&*self.entries.lock().await, &item.id, generation);
        if !current {
            debug!("Discarding result of stale download for {}", item.id);
            return Ok(DownloadOutcome::Cancelled);
        }

        let bytes = media.data.len() as u64;
        let blob = StoredBlob::new(
            BlobMetadata {
                content_type: media.content_type,
                length: bytes,
                sha256: calculate_hash(&media.data),
                source_url: item.source_url.clone(),
                cached_at: Utc::now(),
            },
            media.data,
        );
        let written = self.blobs.write(item.id.as_str(), blob).await;

        let mut entries = self.entries.lock().await;
        if !is_current(&entries, &item.id, generation) {
            drop(entries);
            if written.is_ok() {
                if let Err(e) = self.blobs.delete(item.id.as_str()).await {
                    warn!(
                        "Failed to remove media of cancelled download {}: {}",
                        item.id, e
                    );
                }
            }
            debug!("Download of {} was cancelled while persisting", item.id);
            return Ok(DownloadOutcome::Cancelled);
        }

        match written {
            Ok(()) => {
                entries.insert(item.id.clone(), Entry::Cached);
                drop(entries);
                info!("Cached {} ({} bytes)", item.id, bytes);
                self.emit_state(&item.id, CacheState::Cached);
                Ok(DownloadOutcome::Completed { bytes })
            }
            Err(e) => {
                entries.remove(&item.id);
                drop(entries);
                self.roll_back(
                    &item.id,
                    PlaylistError::Storage(format!("Failed to persist media: {}", e)),
                )
            }
        }
    }

    /// Report a download that ended without caching anything. The entry
    /// must already be gone.
    fn roll_back(&self, id: &ItemId, error: PlaylistError) -> Result<DownloadOutcome> {
        if matches!(error, PlaylistError::Cancelled) {
            info!("Download cancelled for {}", id);
            self.emit_state(id, CacheState::NotCached);
            return Ok(DownloadOutcome::Cancelled);
        }

        error!("Failed to download {}: {}", id, error);
        self.emit(CacheEvent::DownloadFailed {
            item_id: id.to_string(),
            message: error.to_string(),
        });
        self.emit_state(id, CacheState::NotCached);
        Err(error)
    }

    /// Cancel the download of `id`. Returns `false` when it is not
    /// downloading.
    ///
    /// The item is not cached when this returns `true`, even if the
    /// cancelled task has not noticed yet.
    #[instrument(skip(self))]
    pub async fn cancel_download(&self, id: &ItemId) -> bool {
        let mut entries = self.entries.lock().await;
        match entries.get(id) {
            Some(Entry::Downloading(task)) => {
                task.token.cancel();
                entries.remove(id);
                drop(entries);
                info!("Cancelled download for {}", id);
                self.emit_state(id, CacheState::NotCached);
                true
            }
            _ => false,
        }
    }

    /// Remove the cached media of `id`. Only valid when it is cached.
    #[instrument(skip(self))]
    pub async fn delete_cache(&self, id: &ItemId) -> Result<()> {
        let mut entries = self.entries.lock().await;
        let current = match entries.get(id) {
            Some(entry) => entry.state(),
            None => self.blob_state(id).await,
        };
        if current != CacheState::Cached {
            return Err(PlaylistError::NotCached(id.to_string()));
        }

        self.blobs.delete(id.as_str()).await?;
        entries.remove(id);
        drop(entries);

        info!("Deleted cached media for {}", id);
        self.emit_state(id, CacheState::NotCached);
        Ok(())
    }

    /// Rewrite the stored source URL of `id`. Independent of cache state.
    #[instrument(skip(self, source_url))]
    pub async fn update_source_url(&self, id: &ItemId, source_url: &str) -> Result<()> {
        self.playlist_store
            .update_source_url(id, source_url)
            .await
            .map_err(|e| match e {
                BridgeError::NotFound(_) => PlaylistError::ItemNotFound(id.to_string()),
                other => PlaylistError::Bridge(other),
            })?;

        debug!("Updated source URL of {} to {}", id, redact_url(source_url));
        Ok(())
    }

    /// Read the cached media of `id`.
    ///
    /// With integrity checks on, a digest mismatch deletes the blob, rolls
    /// the item back to not cached and fails with
    /// [`PlaylistError::IntegrityCheckFailed`].
    #[instrument(skip(self))]
    pub async fn read_cached(&self, id: &ItemId) -> Result<StoredBlob> {
        let blob = self
            .blobs
            .read(id.as_str())
            .await?
            .ok_or_else(|| PlaylistError::NotCached(id.to_string()))?;

        if self.config.verify_integrity && !blob.metadata.sha256.is_empty() {
            let actual = calculate_hash(&blob.data);
            if !actual.eq_ignore_ascii_case(&blob.metadata.sha256) {
                warn!("Cache integrity check failed for {}", id);

                if let Err(e) = self.blobs.delete(id.as_str()).await {
                    warn!("Failed to delete corrupt media for {}: {}", id, e);
                }
                self.entries.lock().await.remove(id);
                self.emit_state(id, CacheState::NotCached);

                return Err(PlaylistError::IntegrityCheckFailed {
                    item_id: id.to_string(),
                    expected: blob.metadata.sha256,
                    actual,
                });
            }
        }

        Ok(blob)
    }

    /// Get download progress for an item (if currently downloading).
    pub async fn progress(&self, id: &ItemId) -> Option<DownloadProgress> {
        match self.entries.lock().await.get(id) {
            Some(Entry::Downloading(task)) => Some(task.progress.lock().clone()),
            _ => None,
        }
    }

    /// Get all items currently being downloaded.
    pub async fn active_downloads(&self) -> Vec<DownloadProgress> {
        self.entries
            .lock()
            .await
            .values()
            .filter_map(|entry| match entry {
                Entry::Downloading(task) => Some(task.progress.lock().clone()),
                Entry::Cached => None,
            })
            .collect()
    }

    /// Every playlist item with its cache state, in playlist order.
    pub async fn items(&self) -> Result<Vec<ItemCacheStatus>> {
        let items = self.playlist_store.load_all().await?;
        let mut statuses = Vec::with_capacity(items.len());
        for item in items {
            let state = self.state(&item.id).await;
            statuses.push(ItemCacheStatus { item, state });
        }
        Ok(statuses)
    }

    /// Cancel every running download.
    pub fn shutdown(&self) {
        info!("Shutting down download cache manager");
        self.shutdown_token.cancel();
    }

    fn report_progress(
        &self,
        id: &ItemId,
        progress: &parking_lot::Mutex<DownloadProgress>,
        throttle: &mut ProgressThrottle,
    ) {
        let percent = progress.lock().percent();
        if throttle.should_emit(percent) {
            self.emit(CacheEvent::Progress {
                item_id: id.to_string(),
                percent,
            });
        }
    }

    fn emit_state(&self, id: &ItemId, state: CacheState) {
        self.emit(CacheEvent::StateChanged {
            item_id: id.to_string(),
            state,
        });
    }

    fn emit(&self, event: CacheEvent) {
        if let Some(bus) = &self.event_bus {
            // No subscribers is fine
            let _ = bus.emit(CoreEvent::Cache(event));
        }
    }
}

/// Backoff before the retry that follows `attempt`: 100 ms doubling per
/// attempt, capped at [`MAX_RETRY_DELAY`].
fn retry_delay(attempt: u32) -> Duration {
    let factor = 2u64.checked_pow(attempt.saturating_sub(1)).unwrap_or(u64::MAX);
    Duration::from_millis(RETRY_BASE_DELAY_MS.saturating_mul(factor)).min(MAX_RETRY_DELAY)
}

/// Whether `generation` still owns the download slot of `id`.
fn is_current(entries: &HashMap<ItemId, Entry>, id: &ItemId, generation: u64) -> bool {
    matches!(
        entries.get(id),
        Some(Entry::Downloading(task)) if task.generation == generation
    )
}

/// SHA-256 hex digest.
fn calculate_hash(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}
