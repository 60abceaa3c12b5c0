//! Playlist service demonstration
//!
//! Loads one media URL through the service, reads its first kilobyte through
//! the loader session, then downloads it into the cache while printing
//! progress events.
//!
//! Run with:
//! ```bash
//! cargo run --example playlist_demo --package core-service -- https://example.com/audio.mp3
//! ```

use anyhow::{bail, Context};
use async_trait::async_trait;
use bridge_desktop::JsonPlaylistStore;
use bridge_traits::error::Result as BridgeResult;
use bridge_traits::{ExtractedMedia, PageMediaExtractor, PlaylistItem, PlaylistStore};
use core_playlist::{DownloadOutcome, ItemId, LoadOutcome, ResourceLoader};
use core_runtime::config::CoreConfig;
use core_runtime::events::{CacheEvent, CoreEvent};
use core_runtime::logging::{init_logging, LoggingConfig};
use core_service::PlaylistService;
use std::env;
use std::sync::Arc;
use tracing::info;

/// The demo has no page loader; every page comes back empty.
struct NoPageLoader;

#[async_trait]
impl PageMediaExtractor for NoPageLoader {
    async fn extract(&self, _page_url: &str) -> BridgeResult<Option<ExtractedMedia>> {
        Ok(None)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging(LoggingConfig::default().with_filter("core_playlist=debug,core_service=info"))
        .context("failed to initialize logging")?;

    let Some(media_url) = env::args().nth(1) else {
        bail!("usage: playlist_demo <media-url>");
    };

    let workdir = tempfile::tempdir().context("failed to create work directory")?;
    let store = Arc::new(JsonPlaylistStore::with_path(
        workdir.path().join("playlist.json"),
    ));
    let item = PlaylistItem::new("Demo", media_url.as_str(), media_url.as_str(), 0.0);
    let id: ItemId = item.id.clone();
    store.upsert(item).await?;

    let config = CoreConfig::builder()
        .cache_dir(workdir.path().join("cache"))
        .data_dir(workdir.path())
        .playlist_store(store)
        .page_extractor(Arc::new(NoPageLoader))
        .build()?;
    let service = PlaylistService::new(config).await?;

    match service.load(&id).await? {
        LoadOutcome::Ready(media) => {
            info!(route = ?media.route, "Loaded {}", media.url);
            let head = media.session.request_data(&media.url, 0, 1024)?.collect().await?;
            info!("Read {} bytes through the loader session", head.len());
        }
        other => bail!("could not load media: {other}"),
    }

    let mut events = service.subscribe();
    let ticket = service.start_download(&id).await?;
    let progress = tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            match event {
                CoreEvent::Cache(CacheEvent::Progress { percent, .. }) => {
                    info!(?percent, "Downloading");
                }
                CoreEvent::Cache(CacheEvent::StateChanged { state, .. }) => {
                    info!(%state, "Cache state changed");
                }
                _ => {}
            }
        }
    });

    match ticket.wait().await? {
        DownloadOutcome::Completed { bytes } => info!("Cached {} bytes", bytes),
        DownloadOutcome::Cancelled => info!("Download cancelled"),
    }

    service.shutdown().await;
    progress.abort();
    Ok(())
}
