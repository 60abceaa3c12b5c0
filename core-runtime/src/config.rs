//! # Core Configuration Module
//!
//! Provides configuration management for the playlist core.
//!
//! ## Overview
//!
//! The configuration system uses a builder pattern to construct a `CoreConfig`
//! instance that holds all bridges and tuning knobs for media acquisition.
//! It enforces fail-fast validation so a missing capability is reported at
//! startup instead of on the first playlist load.
//!
//! ## Required Dependencies
//!
//! - `PageMediaExtractor` - Resolves media from a page when direct streaming fails
//!
//! ## Dependencies with desktop defaults
//!
//! - `HttpClient` - Ranged fetches, probes and downloads (desktop default: reqwest)
//! - `BlobStore` - Downloaded media cache (desktop default: files under `cache_dir`)
//! - `PlaylistStore` - Playlist metadata (desktop default: JSON file under `data_dir`)
//!
//! ## Optional Dependencies
//!
//! - `NowPlayingSink` - Host now-playing display
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::config::CoreConfig;
//! use std::sync::Arc;
//!
//! let config = CoreConfig::builder()
//!     .cache_dir("/path/to/cache")
//!     .page_extractor(Arc::new(MyWebViewExtractor::new()))
//!     .max_concurrent_downloads(3)
//!     .build()
//!     .expect("Failed to build config");
//! ```

use crate::error::{Error, Result};
use bridge_traits::{BlobStore, HttpClient, NowPlayingSink, PageMediaExtractor, PlaylistStore};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::events::DEFAULT_EVENT_BUFFER_SIZE;

/// Tuning knobs for probing, extraction, fetching and downloading.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaSettings {
    /// Hard timeout for the streamability probe
    pub probe_timeout: Duration,
    /// Upper bound on one page-extraction attempt
    pub extraction_timeout: Duration,
    /// Timeout for a single ranged fetch
    pub fetch_timeout: Duration,
    /// Downloads allowed to run at once
    pub max_concurrent_downloads: usize,
    /// Timeout for one full download attempt
    pub download_timeout: Duration,
    /// Attempts per download, including the first
    pub max_retry_attempts: u32,
    /// Verify the SHA-256 digest when reading cached media
    pub verify_integrity: bool,
    /// Minimum percent change between two progress events
    pub progress_step_percent: u8,
}

impl Default for MediaSettings {
    fn default() -> Self {
        Self {
            probe_timeout: Duration::from_secs(10),
            extraction_timeout: Duration::from_secs(30),
            fetch_timeout: Duration::from_secs(30),
            max_concurrent_downloads: 2,
            download_timeout: Duration::from_secs(300),
            max_retry_attempts: 3,
            verify_integrity: true,
            progress_step_percent: 1,
        }
    }
}

impl MediaSettings {
    pub fn validate(&self) -> Result<()> {
        let timeouts = [
            ("probe_timeout", self.probe_timeout),
            ("extraction_timeout", self.extraction_timeout),
            ("fetch_timeout", self.fetch_timeout),
            ("download_timeout", self.download_timeout),
        ];
        for (name, value) in timeouts {
            if value.is_zero() {
                return Err(Error::Config(format!("{} must be greater than zero", name)));
            }
        }

        if self.max_concurrent_downloads == 0 {
            return Err(Error::Config(
                "max_concurrent_downloads must be at least 1".to_string(),
            ));
        }

        if self.max_retry_attempts == 0 {
            return Err(Error::Config(
                "max_retry_attempts must be at least 1".to_string(),
            ));
        }

        if self.progress_step_percent == 0 || self.progress_step_percent > 100 {
            return Err(Error::Config(
                "progress_step_percent must be between 1 and 100".to_string(),
            ));
        }

        Ok(())
    }
}

/// Core configuration for the playlist core.
///
/// Use [`CoreConfigBuilder`] to construct instances.
#[derive(Clone)]
pub struct CoreConfig {
    /// Directory holding downloaded media
    pub cache_dir: PathBuf,

    /// Directory holding playlist metadata
    pub data_dir: PathBuf,

    /// HTTP client for ranged fetches, probes and downloads
    pub http_client: Arc<dyn HttpClient>,

    /// Persisted download cache
    pub blob_store: Arc<dyn BlobStore>,

    /// Playlist metadata store
    pub playlist_store: Arc<dyn PlaylistStore>,

    /// Page extraction collaborator (required)
    pub page_extractor: Arc<dyn PageMediaExtractor>,

    /// Now-playing display (optional)
    pub now_playing_sink: Option<Arc<dyn NowPlayingSink>>,

    /// Probe, fetch and download tuning
    pub media: MediaSettings,

    /// Capacity of the event bus channel
    pub event_buffer_size: usize,
}

impl std::fmt::Debug for CoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoreConfig")
            .field("cache_dir", &self.cache_dir)
            .field("data_dir", &self.data_dir)
            .field("http_client", &"HttpClient { ... }")
            .field("blob_store", &"BlobStore { ... }")
            .field("playlist_store", &"PlaylistStore { ... }")
            .field("page_extractor", &"PageMediaExtractor { ... }")
            .field(
                "now_playing_sink",
                &self
                    .now_playing_sink
                    .as_ref()
                    .map(|_| "NowPlayingSink { ... }"),
            )
            .field("media", &self.media)
            .field("event_buffer_size", &self.event_buffer_size)
            .finish()
    }
}

impl CoreConfig {
    /// Creates a new builder for constructing a `CoreConfig`.
    pub fn builder() -> CoreConfigBuilder {
        CoreConfigBuilder::default()
    }

    /// Validates the configuration and returns an error if invalid.
    pub fn validate(&self) -> Result<()> {
        if self.cache_dir.as_os_str().is_empty() {
            return Err(Error::Config("Cache directory cannot be empty".to_string()));
        }

        if self.data_dir.as_os_str().is_empty() {
            return Err(Error::Config("Data directory cannot be empty".to_string()));
        }

        if self.event_buffer_size == 0 {
            return Err(Error::Config(
                "Event buffer size must be greater than 0".to_string(),
            ));
        }

        self.media.validate()
    }
}

fn page_extractor_missing_error() -> Error {
    Error::CapabilityMissing {
        capability: "PageMediaExtractor".to_string(),
        message: "PageMediaExtractor implementation is required to recover media from pages \
                 whose direct source cannot be streamed. \
                 Desktop: inject a headless-browser based extractor. \
                 Mobile: inject an off-screen web view loader."
            .to_string(),
    }
}

#[cfg(feature = "desktop-shims")]
fn provide_default_http_client() -> Result<Arc<dyn HttpClient>> {
    use bridge_desktop::ReqwestHttpClient;

    let client: Arc<dyn HttpClient> = Arc::new(ReqwestHttpClient::new());
    Ok(client)
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_http_client() -> Result<Arc<dyn HttpClient>> {
    Err(Error::CapabilityMissing {
        capability: "HttpClient".to_string(),
        message: "HttpClient implementation is required for streaming and downloads. \
                 Desktop: enable the 'desktop-shims' feature to use the reqwest client. \
                 Mobile: inject the platform URL session."
            .to_string(),
    })
}

#[cfg(feature = "desktop-shims")]
fn provide_default_blob_store(cache_dir: &std::path::Path) -> Result<Arc<dyn BlobStore>> {
    use bridge_desktop::FileBlobStore;

    let store: Arc<dyn BlobStore> = Arc::new(FileBlobStore::with_directory(cache_dir.join("media")));
    Ok(store)
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_blob_store(_cache_dir: &std::path::Path) -> Result<Arc<dyn BlobStore>> {
    Err(Error::CapabilityMissing {
        capability: "BlobStore".to_string(),
        message: "BlobStore implementation is required for the download cache. \
                 Desktop: enable the 'desktop-shims' feature to use the file blob store. \
                 Mobile: inject app-container storage."
            .to_string(),
    })
}

#[cfg(feature = "desktop-shims")]
fn provide_default_playlist_store(data_dir: &std::path::Path) -> Result<Arc<dyn PlaylistStore>> {
    use bridge_desktop::JsonPlaylistStore;

    let store: Arc<dyn PlaylistStore> =
        Arc::new(JsonPlaylistStore::with_path(data_dir.join("playlist.json")));
    Ok(store)
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_playlist_store(_data_dir: &std::path::Path) -> Result<Arc<dyn PlaylistStore>> {
    Err(Error::CapabilityMissing {
        capability: "PlaylistStore".to_string(),
        message: "PlaylistStore implementation is required for playlist metadata. \
                 Desktop: enable the 'desktop-shims' feature to use the JSON playlist store. \
                 Mobile: inject the host database."
            .to_string(),
    })
}

fn default_base_dir(platform_dir: Option<PathBuf>) -> PathBuf {
    platform_dir
        .unwrap_or_else(std::env::temp_dir)
        .join("playlist-core")
}

/// Builder for constructing [`CoreConfig`] instances.
#[derive(Default)]
pub struct CoreConfigBuilder {
    cache_dir: Option<PathBuf>,
    data_dir: Option<PathBuf>,
    http_client: Option<Arc<dyn HttpClient>>,
    blob_store: Option<Arc<dyn BlobStore>>,
    playlist_store: Option<Arc<dyn PlaylistStore>>,
    page_extractor: Option<Arc<dyn PageMediaExtractor>>,
    now_playing_sink: Option<Arc<dyn NowPlayingSink>>,
    media: MediaSettings,
    event_buffer_size: Option<usize>,
}

impl CoreConfigBuilder {
    /// Directory for downloaded media (default: platform cache dir)
    pub fn cache_dir<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.cache_dir = Some(path.into());
        self
    }

    /// Directory for playlist metadata (default: platform data dir)
    pub fn data_dir<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.data_dir = Some(path.into());
        self
    }

    pub fn http_client(mut self, client: Arc<dyn HttpClient>) -> Self {
        self.http_client = Some(client);
        self
    }

    pub fn blob_store(mut self, store: Arc<dyn BlobStore>) -> Self {
        self.blob_store = Some(store);
        self
    }

    pub fn playlist_store(mut self, store: Arc<dyn PlaylistStore>) -> Self {
        self.playlist_store = Some(store);
        self
    }

    pub fn page_extractor(mut self, extractor: Arc<dyn PageMediaExtractor>) -> Self {
        self.page_extractor = Some(extractor);
        self
    }

    pub fn now_playing_sink(mut self, sink: Arc<dyn NowPlayingSink>) -> Self {
        self.now_playing_sink = Some(sink);
        self
    }

    /// Replace all media settings at once
    pub fn media_settings(mut self, settings: MediaSettings) -> Self {
        self.media = settings;
        self
    }

    pub fn probe_timeout(mut self, timeout: Duration) -> Self {
        self.media.probe_timeout = timeout;
        self
    }

    pub fn extraction_timeout(mut self, timeout: Duration) -> Self {
        self.media.extraction_timeout = timeout;
        self
    }

    pub fn max_concurrent_downloads(mut self, limit: usize) -> Self {
        self.media.max_concurrent_downloads = limit;
        self
    }

    pub fn event_buffer_size(mut self, size: usize) -> Self {
        self.event_buffer_size = Some(size);
        self
    }

    /// Builds the final `CoreConfig` instance.
    ///
    /// # Errors
    ///
    /// - [`Error::CapabilityMissing`] when the page extractor is absent, or when
    ///   a storage/network bridge is absent without the `desktop-shims` feature
    /// - [`Error::Config`] when a setting is out of range
    pub fn build(self) -> Result<CoreConfig> {
        let page_extractor = self
            .page_extractor
            .ok_or_else(page_extractor_missing_error)?;

        let cache_dir = self
            .cache_dir
            .unwrap_or_else(|| default_base_dir(dirs::cache_dir()));
        let data_dir = self
            .data_dir
            .unwrap_or_else(|| default_base_dir(dirs::data_dir()));

        let http_client = match self.http_client {
            Some(client) => client,
            None => provide_default_http_client()?,
        };

        let blob_store = match self.blob_store {
            Some(store) => store,
            None => provide_default_blob_store(&cache_dir)?,
        };

        let playlist_store = match self.playlist_store {
            Some(store) => store,
            None => provide_default_playlist_store(&data_dir)?,
        };

        let config = CoreConfig {
            cache_dir,
            data_dir,
            http_client,
            blob_store,
            playlist_store,
            page_extractor,
            now_playing_sink: self.now_playing_sink,
            media: self.media,
            event_buffer_size: self.event_buffer_size.unwrap_or(DEFAULT_EVENT_BUFFER_SIZE),
        };

        config.validate()?;

        Ok(config)
    }
}
