//! # Playlist Media Acquisition
//!
//! Gets playlist media to a decoder that does not speak HTTP.
//!
//! ## Overview
//!
//! This crate handles:
//! - Single-shot ranged fetches and streamability probing
//! - Loader sessions that answer decoder byte requests from the network or
//!   from a cached blob, in any completion order
//! - The download cache state machine with progress and cancellation
//! - The cache, stream, page-extraction fallback chain
//! - Playlist navigation and now-playing metadata

pub mod cache;
pub mod config;
pub mod error;
pub mod fetcher;
pub mod loader;
pub mod models;
pub mod now_playing;
pub mod orchestrator;
pub mod playlist;
pub mod probe;
pub mod shim;

pub use cache::{CacheConfig, DownloadCacheManager, DownloadOutcome, DownloadTicket};
pub use config::AcquisitionConfig;
pub use error::{PlaylistError, Result};
pub use fetcher::{FetchedRange, RangeFetcher};
pub use loader::{
    CacheLoadBridge, ContentInfoRequest, DataEvent, DataRequest, LoaderSession, RequestId,
    ResourceLoadBridge, ResourceLoader,
};
pub use models::{CacheState, ContentInfo, ItemCacheStatus, ItemId, PlaylistItem};
pub use now_playing::{now_playing_info, NowPlayingTracker, PlaybackStatus, RateSubscription};
pub use orchestrator::{LoadOutcome, MediaAcquisitionOrchestrator, ReadyMedia};
pub use playlist::Playlist;
pub use probe::StreamabilityProbe;
pub use shim::{is_shimmed, shim, unshim};
