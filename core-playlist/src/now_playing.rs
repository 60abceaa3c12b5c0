//! Now-playing metadata for the host display.

use crate::models::PlaylistItem;
use bridge_traits::playback::{NowPlayingInfo, NowPlayingSink};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use url::Url;

/// Playback position reported by the player.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PlaybackStatus {
    pub rate: f32,
    pub elapsed_secs: f64,
}

/// Display metadata for `item`. The artist is the page host without a
/// leading `www.`, or the raw page URL when it has no host.
pub fn now_playing_info(item: &PlaylistItem, rate: f32, elapsed_secs: f64) -> NowPlayingInfo {
    NowPlayingInfo {
        title: item.name.clone(),
        artist: page_artist(&item.page_url),
        duration_secs: item.duration_secs,
        rate,
        elapsed_secs,
    }
}

fn page_artist(page_url: &str) -> String {
    Url::parse(page_url)
        .ok()
        .and_then(|url| url.host_str().map(str::to_string))
        .map(|host| match host.strip_prefix("www.") {
            Some(stripped) => stripped.to_string(),
            None => host,
        })
        .unwrap_or_else(|| page_url.to_string())
}

/// Publishes now-playing metadata to the host sink.
#[derive(Clone)]
pub struct NowPlayingTracker {
    sink: Arc<dyn NowPlayingSink>,
}

impl NowPlayingTracker {
    pub fn new(sink: Arc<dyn NowPlayingSink>) -> Self {
        Self { sink }
    }

    pub async fn publish(&self, item: &PlaylistItem, status: PlaybackStatus) {
        let info = now_playing_info(item, status.rate, status.elapsed_secs);
        if let Err(e) = self.sink.publish(info).await {
            warn!("Failed to publish now-playing info: {}", e);
        }
    }

    pub async fn clear(&self) {
        if let Err(e) = self.sink.clear().await {
            warn!("Failed to clear now-playing info: {}", e);
        }
    }

    /// Republish `item` on every rate change until the returned guard is
    /// dropped or the sender goes away.
    pub fn watch_rate(
        &self,
        item: PlaylistItem,
        mut status: watch::Receiver<PlaybackStatus>,
    ) -> RateSubscription {
        let tracker = self.clone();
        let handle = tokio::spawn(async move {
            let initial = *status.borrow_and_update();
            let mut last_rate = initial.rate;
            tracker.publish(&item, initial).await;

            while status.changed().await.is_ok() {
                let current = *status.borrow_and_update();
                if current.rate != last_rate {
                    debug!(rate = current.rate, "Playback rate changed");
                    last_rate = current.rate;
                    tracker.publish(&item, current).await;
                }
            }
        });

        RateSubscription { handle }
    }
}

/// Keeps a rate watcher alive. Dropping it stops the watcher.
#[derive(Debug)]
pub struct RateSubscription {
    handle: JoinHandle<()>,
}

impl RateSubscription {
    pub fn is_active(&self) -> bool {
        !self.handle.is_finished()
    }
}

impl Drop for RateSubscription {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
