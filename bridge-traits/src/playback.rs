//! Now-playing bridge.
//!
//! Host media centers (lock screen, system media controls) display metadata
//! for the current item. The core derives that metadata and pushes it through
//! a [`NowPlayingSink`]; wiring remote commands stays on the host side.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Metadata describing the item currently loaded in the player.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NowPlayingInfo {
    /// Item display name
    pub title: String,
    /// Shown in the artist slot; the page's host name
    pub artist: String,
    /// Total duration in seconds
    pub duration_secs: f64,
    /// Current playback rate (0.0 = paused)
    pub rate: f32,
    /// Elapsed playback time in seconds
    pub elapsed_secs: f64,
}

/// Receiver of now-playing updates.
#[async_trait]
pub trait NowPlayingSink: Send + Sync {
    /// Publish new metadata, replacing whatever was shown before.
    async fn publish(&self, info: NowPlayingInfo) -> Result<()>;

    /// Clear the now-playing display.
    async fn clear(&self) -> Result<()>;
}
