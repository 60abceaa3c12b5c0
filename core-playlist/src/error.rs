//! # Playlist Acquisition Error Types
//!
//! Error types for ranged fetches, cache state transitions and media loading.

use bridge_traits::BridgeError;
use thiserror::Error;

/// Errors that can occur while acquiring or caching playlist media.
#[derive(Error, Debug)]
pub enum PlaylistError {
    // ========================================================================
    // Network Errors
    // ========================================================================
    /// Non-2xx status, transport failure or malformed response.
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    // ========================================================================
    // Cache State Errors
    // ========================================================================
    /// A download is already running, or the item is already cached.
    #[error("Download already in progress or completed: {0}")]
    AlreadyInProgress(String),

    /// The item has no cached media.
    #[error("Item not cached: {0}")]
    NotCached(String),

    /// Cached bytes no longer match the digest recorded at download time.
    #[error("Integrity check failed for {item_id}: expected {expected}, got {actual}")]
    IntegrityCheckFailed {
        item_id: String,
        expected: String,
        actual: String,
    },

    /// The item has no source media URL to download from.
    #[error("Item has no source media URL: {0}")]
    MissingSource(String),

    // ========================================================================
    // Acquisition Errors
    // ========================================================================
    /// A previously resolved URL is no longer reachable.
    #[error("Media source expired: {0}")]
    Expired(String),

    /// The page extractor could not resolve playable media.
    #[error("Page extraction failed: {0}")]
    ExtractionFailed(String),

    // ========================================================================
    // Session Errors
    // ========================================================================
    /// The operation was aborted by the caller or by shutdown.
    #[error("Operation cancelled")]
    Cancelled,

    /// The loader session was closed before the request completed.
    #[error("Loader session closed")]
    SessionClosed,

    /// The URL does not belong to this loader session.
    #[error("URL is not served by this session: {0}")]
    UnroutableUrl(String),

    /// The requested byte window extends past the addressable range.
    #[error("Byte range at {offset} with length {length} overflows")]
    InvalidRange { offset: u64, length: u64 },

    // ========================================================================
    // Generic Errors
    // ========================================================================
    /// Playlist item lookup failed.
    #[error("Playlist item not found: {0}")]
    ItemNotFound(String),

    /// Index outside the playlist.
    #[error("Playlist index {index} out of bounds for {len} items")]
    IndexOutOfBounds { index: usize, len: usize },

    /// Invalid configuration value.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Persisted store failure.
    #[error("Storage error: {0}")]
    Storage(String),

    /// Error surfaced by a host bridge.
    #[error("Bridge error: {0}")]
    Bridge(#[from] BridgeError),

    /// Internal error (should not occur in normal operation).
    #[error("Internal error: {0}")]
    Internal(String),
}

impl PlaylistError {
    /// Returns `true` if this error is transient and the operation can be retried.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            PlaylistError::InvalidResponse(_)
                | PlaylistError::Bridge(BridgeError::OperationFailed(_))
        )
    }

    /// Returns `true` if this error is due to network issues.
    pub fn is_network_error(&self) -> bool {
        matches!(self, PlaylistError::InvalidResponse(_))
    }
}

/// Result type for playlist acquisition operations.
pub type Result<T> = std::result::Result<T, PlaylistError>;
