//! # Host Bridge Traits
//!
//! Platform abstraction traits that must be implemented by each host platform.
//!
//! ## Overview
//!
//! This crate defines the contract between the playlist core and the
//! platform-specific collaborators it depends on but does not own. Each trait
//! represents a capability that the core requires but that must be implemented
//! differently per platform (desktop, iOS, Android).
//!
//! ## Traits
//!
//! ### Networking
//! - [`HttpClient`](http::HttpClient) - Ranged fetches, probes and streamed downloads
//!
//! ### Storage
//! - [`BlobStore`](storage::BlobStore) - Persisted cache of fully downloaded media
//! - [`PlaylistStore`](playlist::PlaylistStore) - Playlist metadata persistence
//!
//! ### Collaborators
//! - [`PageMediaExtractor`](extraction::PageMediaExtractor) - Resolves playable media from a page
//! - [`NowPlayingSink`](playback::NowPlayingSink) - Host now-playing display
//! - [`LoggerSink`](time::LoggerSink) - Forward structured logs to host logging
//!
//! ## Error Handling
//!
//! All bridge traits use the [`BridgeError`](error::BridgeError) type. Platform
//! implementations should convert platform-specific errors to `BridgeError`
//! and include context (URLs, item ids) in the message.
//!
//! ## Thread Safety
//!
//! All bridge traits require `Send + Sync` bounds so implementations can be
//! shared across the download and fetch tasks.

pub mod error;
pub mod extraction;
pub mod http;
pub mod playback;
pub mod playlist;
pub mod storage;
pub mod time;

pub use error::BridgeError;

// Re-export commonly used types
pub use extraction::{ExtractedMedia, PageMediaExtractor};
pub use http::{ByteStream, HttpClient, HttpMethod, HttpRequest, HttpResponse, HttpStream};
pub use playback::{NowPlayingInfo, NowPlayingSink};
pub use playlist::{CacheState, ItemId, PlaylistItem, PlaylistStore};
pub use storage::{BlobMetadata, BlobStore, StoredBlob};
pub use time::{LogEntry, LogLevel, LoggerSink};
