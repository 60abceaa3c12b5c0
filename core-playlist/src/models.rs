//! Domain models shared across the acquisition subsystem.

use serde::{Deserialize, Serialize};

pub use bridge_traits::playlist::{CacheState, ItemId, PlaylistItem};

/// Content metadata reported to the decoder.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentInfo {
    /// MIME type reported by the origin
    pub content_type: Option<String>,
    /// Total resource length in bytes, when known
    pub total_length: Option<u64>,
    /// Whether the origin confirmed byte-range support
    pub supports_byte_ranges: bool,
}

/// A playlist item paired with its current cache state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemCacheStatus {
    pub item: PlaylistItem,
    pub state: CacheState,
}
