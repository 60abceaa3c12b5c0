//! # Download Cache Module
//!
//! Background download of playlist media into a persisted blob store, with
//! a per-item state machine, progress events and cancellation.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────────────────────────────┐
//! │     DownloadCacheManager               │
//! │  - start_download() / cancel_download()│
//! │  - delete_cache() / read_cached()      │
//! │  - state() / items()                   │
//! └────────┬───────────────────────────────┘
//!          │
//!          ├──> HttpClient (streamed GET)
//!          ├──> BlobStore (persisted media)
//!          ├──> PlaylistStore (source URLs)
//!          └──> EventBus (state + progress)
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use core_playlist::cache::{CacheConfig, DownloadCacheManager, DownloadOutcome};
//!
//! let manager = DownloadCacheManager::new(CacheConfig::default(), http, blobs, store)
//!     .with_event_bus(event_bus);
//! manager.initialize().await?;
//!
//! let ticket = manager.start_download(&item).await?;
//! if let DownloadOutcome::Completed { bytes } = ticket.wait().await? {
//!     println!("Cached {} bytes", bytes);
//! }
//! ```

pub mod config;
pub mod manager;
pub mod progress;

// Re-export commonly used types
pub use config::CacheConfig;
pub use manager::{DownloadCacheManager, DownloadOutcome, DownloadTicket};
pub use progress::{DownloadProgress, ProgressThrottle};
