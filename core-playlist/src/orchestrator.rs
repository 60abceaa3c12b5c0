//! # Media Acquisition Orchestrator
//!
//! Decides how a playlist item reaches the decoder. The order is fixed:
//!
//! 1. **Cache** - a cached item is served from its blob, no network.
//! 2. **Stream** - a stored source URL that passes the streamability probe
//!    is served by a remote loader session.
//! 3. **Extract** - otherwise the page is handed to the extractor, and a
//!    resolved URL is persisted and streamed.
//!
//! Lower-layer errors never escape: every load ends in a [`LoadOutcome`].

use crate::cache::DownloadCacheManager;
use crate::config::AcquisitionConfig;
use crate::error::{PlaylistError, Result};
use crate::fetcher::RangeFetcher;
use crate::loader::{CacheLoadBridge, LoaderSession, ResourceLoadBridge};
use crate::models::{CacheState, PlaylistItem};
use crate::probe::StreamabilityProbe;
use crate::shim::{local_media_url, shim};
use bridge_traits::extraction::PageMediaExtractor;
use bridge_traits::http::HttpClient;
use chrono::Utc;
use core_runtime::events::{CoreEvent, EventBus, MediaEvent, MediaRoute};
use core_runtime::logging::redact_url;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Reason reported when no path produced playable media.
pub const CANNOT_LOAD_MEDIA: &str = "cannot load media";

/// Media bound to a loader session, ready for the decoder.
#[derive(Debug, Clone)]
pub struct ReadyMedia {
    /// URL the decoder should open
    pub url: String,
    pub route: MediaRoute,
    pub session: LoaderSession,
}

/// Result of one load attempt.
#[derive(Debug, Clone)]
pub enum LoadOutcome {
    Ready(ReadyMedia),
    /// The stored source URL stopped working and extraction found nothing.
    Expired,
    Failed(String),
}

impl LoadOutcome {
    pub fn is_ready(&self) -> bool {
        matches!(self, LoadOutcome::Ready(_))
    }
}

impl fmt::Display for LoadOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadOutcome::Ready(media) => write!(f, "ready ({:?})", media.route),
            LoadOutcome::Expired => f.write_str("expired"),
            LoadOutcome::Failed(reason) => write!(f, "failed: {}", reason),
        }
    }
}

/// Runs the cache, stream, extract fallback chain for playlist items.
#[derive(Clone)]
pub struct MediaAcquisitionOrchestrator {
    config: AcquisitionConfig,
    cache: DownloadCacheManager,
    probe: StreamabilityProbe,
    fetcher: RangeFetcher,
    extractor: Arc<dyn PageMediaExtractor>,
    event_bus: Option<EventBus>,
}

impl MediaAcquisitionOrchestrator {
    /// Fails with [`PlaylistError::InvalidConfig`] when `config` has a zero
    /// timeout.
    pub fn new(
        config: AcquisitionConfig,
        cache: DownloadCacheManager,
        http_client: Arc<dyn HttpClient>,
        extractor: Arc<dyn PageMediaExtractor>,
    ) -> Result<Self> {
        config.validate().map_err(|e| {
            PlaylistError::InvalidConfig(format!("Invalid acquisition configuration: {}", e))
        })?;

        let probe = StreamabilityProbe::new(http_client.clone(), &config);
        let fetcher = RangeFetcher::new(http_client, config.fetch_timeout);

        Ok(Self {
            config,
            cache,
            probe,
            fetcher,
            extractor,
            event_bus: None,
        })
    }

    /// Set event bus for load outcome events.
    pub fn with_event_bus(mut self, event_bus: EventBus) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    /// Acquire media for `item`.
    #[instrument(skip(self, item), fields(item_id = %item.id))]
    pub async fn load(&self, item: &PlaylistItem) -> LoadOutcome {
        let outcome = self.acquire(item).await;

        match &outcome {
            LoadOutcome::Ready(media) => {
                info!("Media ready for {} via {:?}", item.id, media.route);
                self.emit(MediaEvent::Loaded {
                    item_id: item.id.to_string(),
                    route: media.route,
                });
            }
            LoadOutcome::Expired => {
                warn!("Media source expired for {}", item.id);
                self.emit(MediaEvent::Expired {
                    item_id: item.id.to_string(),
                });
            }
            LoadOutcome::Failed(reason) => {
                warn!("Failed to load media for {}: {}", item.id, reason);
                self.emit(MediaEvent::Failed {
                    item_id: item.id.to_string(),
                    reason: reason.clone(),
                });
            }
        }

        outcome
    }

    async fn acquire(&self, item: &PlaylistItem) -> LoadOutcome {
        if self.cache.state(&item.id).await == CacheState::Cached {
            match self.cached_session(item).await {
                Ok(media) => return LoadOutcome::Ready(media),
                Err(e) => warn!("Cached media unusable for {}, trying network: {}", item.id, e),
            }
        }

        if item.has_source() {
            if self.probe.probe(&item.source_url).await {
                return LoadOutcome::Ready(self.remote_session(&item.source_url, MediaRoute::Stream));
            }
            debug!(
                "Source {} is not streamable, falling back to extraction",
                redact_url(&item.source_url)
            );
        }

        match self.extract(item).await {
            Ok(media_url) => {
                if let Err(e) = self.cache.update_source_url(&item.id, &media_url).await {
                    warn!("Failed to persist resolved source for {}: {}", item.id, e);
                }
                self.emit(MediaEvent::SourceUpdated {
                    item_id: item.id.to_string(),
                });
                LoadOutcome::Ready(self.remote_session(&media_url, MediaRoute::Extracted))
            }
            Err(e) => {
                debug!("Extraction failed for {}: {}", item.id, e);
                if item.has_source() {
                    LoadOutcome::Expired
                } else {
                    LoadOutcome::Failed(CANNOT_LOAD_MEDIA.to_string())
                }
            }
        }
    }

    async fn cached_session(&self, item: &PlaylistItem) -> Result<ReadyMedia> {
        let blob = self.cache.read_cached(&item.id).await?;
        let url = local_media_url(Utc::now());
        let session = LoaderSession::Cache(CacheLoadBridge::new(url.clone(), blob));

        Ok(ReadyMedia {
            url,
            route: MediaRoute::Cache,
            session,
        })
    }

    fn remote_session(&self, media_url: &str, route: MediaRoute) -> ReadyMedia {
        let url = shim(media_url);
        let session = LoaderSession::Remote(ResourceLoadBridge::new(url.clone(), self.fetcher.clone()));

        ReadyMedia {
            url,
            route,
            session,
        }
    }

    /// Resolve a media URL from the item's page within the extraction
    /// timeout.
    async fn extract(&self, item: &PlaylistItem) -> Result<String> {
        let extraction = tokio::time::timeout(
            self.config.extraction_timeout,
            self.extractor.extract(&item.page_url),
        )
        .await
        .map_err(|_| PlaylistError::ExtractionFailed("extraction timed out".to_string()))?;

        match extraction {
            Ok(Some(media)) if !media.media_url.trim().is_empty() => Ok(media.media_url),
            Ok(_) => Err(PlaylistError::ExtractionFailed(
                "no playable media on page".to_string(),
            )),
            Err(e) => Err(PlaylistError::ExtractionFailed(e.to_string())),
        }
    }

    fn emit(&self, event: MediaEvent) {
        if let Some(bus) = &self.event_bus {
            let _ = bus.emit(CoreEvent::Media(event));
        }
    }
}
