mod common;

use common::{
    drain_events, eventually, item, resource, sha256_hex, MemoryBlobStore, MemoryPlaylistStore,
    Route, ScriptedHttpClient,
};
use core_playlist::{
    CacheConfig, CacheState, DownloadCacheManager, DownloadOutcome, ItemId, PlaylistError,
    PlaylistItem,
};
use core_runtime::events::{CacheEvent, CoreEvent, EventBus};
use std::sync::Arc;
use std::time::Duration;

const SOURCE: &str = "https://cdn.example.com/episode.mp3";

struct Fixture {
    client: Arc<ScriptedHttpClient>,
    blobs: Arc<MemoryBlobStore>,
    store: Arc<MemoryPlaylistStore>,
    bus: EventBus,
    manager: DownloadCacheManager,
    item: PlaylistItem,
}

fn fixture(config: CacheConfig) -> Fixture {
    let client = ScriptedHttpClient::new();
    let blobs = MemoryBlobStore::new();
    let item = item(1, SOURCE);
    let store = MemoryPlaylistStore::with_items(vec![item.clone()]);
    let bus = EventBus::new(256);
    let manager =
        DownloadCacheManager::new(config, client.clone(), blobs.clone(), store.clone())
            .with_event_bus(bus.clone());

    Fixture {
        client,
        blobs,
        store,
        bus,
        manager,
        item,
    }
}

#[tokio::test]
async fn test_download_completes_and_persists_blob() {
    let f = fixture(CacheConfig::default().with_progress_step_percent(25));
    let data = resource(10_000);
    f.client.route(SOURCE, Route::resource(data.clone()));
    let mut events = f.bus.subscribe();

    assert_eq!(f.manager.state(&f.item.id).await, CacheState::NotCached);
    let ticket = f.manager.start_download(&f.item).await.unwrap();
    assert_eq!(ticket.item_id(), &f.item.id);

    let outcome = ticket.wait().await.unwrap();
    assert_eq!(outcome, DownloadOutcome::Completed { bytes: 10_000 });
    assert_eq!(f.manager.state(&f.item.id).await, CacheState::Cached);

    let blob = f.blobs.get(f.item.id.as_str()).unwrap();
    assert_eq!(blob.data.as_ref(), &data[..]);
    assert_eq!(blob.metadata.length, 10_000);
    assert_eq!(blob.metadata.sha256, sha256_hex(&data));
    assert_eq!(blob.metadata.source_url, SOURCE);
    assert_eq!(blob.metadata.content_type.as_deref(), Some("video/mp4"));

    let events = drain_events(&mut events);
    let states: Vec<CacheState> = events
        .iter()
        .filter_map(|e| match e {
            CoreEvent::Cache(CacheEvent::StateChanged { state, .. }) => Some(*state),
            _ => None,
        })
        .collect();
    assert_eq!(states, vec![CacheState::Downloading, CacheState::Cached]);

    let percents: Vec<u8> = events
        .iter()
        .filter_map(|e| match e {
            CoreEvent::Cache(CacheEvent::Progress { percent, .. }) => *percent,
            _ => None,
        })
        .collect();
    assert_eq!(percents.first(), Some(&0));
    assert_eq!(percents.last(), Some(&100));
    assert!(percents.windows(2).all(|w| w[0] < w[1]));
    assert!(percents.len() <= 6);
}

#[tokio::test]
async fn test_second_start_fails_and_first_is_unaffected() {
    let f = fixture(CacheConfig::default());
    f.client.route(SOURCE, Route::resource(resource(4096)));
    f.client.stall_streams(true);

    let first = f.manager.start_download(&f.item).await.unwrap();
    let second = f.manager.start_download(&f.item).await;
    assert!(matches!(second, Err(PlaylistError::AlreadyInProgress(_))));
    assert_eq!(f.manager.state(&f.item.id).await, CacheState::Downloading);

    // The first download keeps making progress
    let (manager, id) = (&f.manager, &f.item.id);
    eventually(|| async move {
        manager.progress(id).await.map(|p| p.downloaded_bytes) == Some(1024)
    })
    .await;
    assert_eq!(f.manager.active_downloads().await.len(), 1);

    f.client.stall_streams(false);
    first.cancel();
    assert_eq!(first.wait().await.unwrap(), DownloadOutcome::Cancelled);
}

#[tokio::test]
async fn test_start_on_cached_item_fails() {
    let f = fixture(CacheConfig::default());
    f.blobs.put(f.item.id.as_str(), b"cached");

    assert!(matches!(
        f.manager.start_download(&f.item).await,
        Err(PlaylistError::AlreadyInProgress(_))
    ));
    assert_eq!(f.manager.state(&f.item.id).await, CacheState::Cached);
}

#[tokio::test]
async fn test_cancel_mid_flight_leaves_nothing_cached() {
    let f = fixture(CacheConfig::default());
    f.client.route(SOURCE, Route::resource(resource(8192)));
    f.client.stall_streams(true);
    let mut events = f.bus.subscribe();

    let ticket = f.manager.start_download(&f.item).await.unwrap();
    let (manager, id) = (&f.manager, &f.item.id);
    eventually(|| async move {
        manager
            .progress(id)
            .await
            .map(|p| p.downloaded_bytes > 0)
            .unwrap_or(false)
    })
    .await;

    assert!(f.manager.cancel_download(&f.item.id).await);
    assert_eq!(f.manager.state(&f.item.id).await, CacheState::NotCached);
    assert_eq!(ticket.wait().await.unwrap(), DownloadOutcome::Cancelled);

    assert_eq!(f.blobs.len(), 0);
    assert_eq!(f.manager.state(&f.item.id).await, CacheState::NotCached);
    assert!(f.manager.progress(&f.item.id).await.is_none());

    let last_state = drain_events(&mut events)
        .into_iter()
        .filter_map(|e| match e {
            CoreEvent::Cache(CacheEvent::StateChanged { state, .. }) => Some(state),
            _ => None,
        })
        .last();
    assert_eq!(last_state, Some(CacheState::NotCached));

    // Not downloading any more
    assert!(!f.manager.cancel_download(&f.item.id).await);
}

#[tokio::test]
async fn test_slow_blob_write_does_not_block_state_or_cancel() {
    let f = fixture(CacheConfig::default());
    f.client.route(SOURCE, Route::resource(resource(4096)));
    f.blobs.gate_writes();

    let ticket = f.manager.start_download(&f.item).await.unwrap();
    let blobs = &f.blobs;
    eventually(|| async move { blobs.writes_started() == 1 }).await;

    let quick = Duration::from_millis(200);
    let state = tokio::time::timeout(quick, f.manager.state(&f.item.id))
        .await
        .expect("state() waited on the blob write");
    assert_eq!(state, CacheState::Downloading);
    let cancelled = tokio::time::timeout(quick, f.manager.cancel_download(&f.item.id))
        .await
        .expect("cancel_download() waited on the blob write");
    assert!(cancelled);

    f.blobs.release_writes();
    assert_eq!(ticket.wait().await.unwrap(), DownloadOutcome::Cancelled);

    // The blob written by the cancelled task is removed again
    assert_eq!(f.blobs.len(), 0);
    assert_eq!(f.manager.state(&f.item.id).await, CacheState::NotCached);
}

#[tokio::test]
async fn test_slow_blob_write_still_caches_when_not_cancelled() {
    let f = fixture(CacheConfig::default());
    f.client.route(SOURCE, Route::resource(resource(4096)));
    f.blobs.gate_writes();

    let ticket = f.manager.start_download(&f.item).await.unwrap();
    let blobs = &f.blobs;
    eventually(|| async move { blobs.writes_started() == 1 }).await;
    assert_eq!(f.manager.state(&f.item.id).await, CacheState::Downloading);

    f.blobs.release_writes();
    assert_eq!(
        ticket.wait().await.unwrap(),
        DownloadOutcome::Completed { bytes: 4096 }
    );
    assert_eq!(f.manager.state(&f.item.id).await, CacheState::Cached);
    assert_eq!(f.blobs.len(), 1);
}

#[tokio::test]
async fn test_restart_after_cancel_is_not_disturbed_by_stale_task() {
    let f = fixture(CacheConfig::default());
    f.client.route(SOURCE, Route::resource(resource(2048)));
    f.client.stall_streams(true);

    let stale = f.manager.start_download(&f.item).await.unwrap();
    assert!(f.manager.cancel_download(&f.item.id).await);

    f.client.stall_streams(false);
    let fresh = f.manager.start_download(&f.item).await.unwrap();

    assert_eq!(stale.wait().await.unwrap(), DownloadOutcome::Cancelled);
    assert_eq!(
        fresh.wait().await.unwrap(),
        DownloadOutcome::Completed { bytes: 2048 }
    );
    assert_eq!(f.manager.state(&f.item.id).await, CacheState::Cached);
}

#[tokio::test]
async fn test_failed_download_rolls_back() {
    let f = fixture(CacheConfig::default().with_max_retry_attempts(2));
    f.client.route(SOURCE, Route::Status(404));
    let mut events = f.bus.subscribe();

    let ticket = f.manager.start_download(&f.item).await.unwrap();
    let result = ticket.wait().await;

    assert!(matches!(result, Err(PlaylistError::InvalidResponse(_))));
    assert_eq!(f.manager.state(&f.item.id).await, CacheState::NotCached);
    assert_eq!(f.client.requests_for(SOURCE), 2);
    assert_eq!(f.blobs.len(), 0);

    let events = drain_events(&mut events);
    assert!(events.iter().any(|e| matches!(
        e,
        CoreEvent::Cache(CacheEvent::DownloadFailed { .. })
    )));
}

#[tokio::test]
async fn test_download_timeout_is_a_failure() {
    let f = fixture(
        CacheConfig::default()
            .with_max_retry_attempts(1)
            .with_download_timeout(Duration::from_millis(50)),
    );
    f.client.route(SOURCE, Route::Hang);

    let result = f.manager.start_download(&f.item).await.unwrap().wait().await;
    assert!(matches!(result, Err(PlaylistError::InvalidResponse(_))));
    assert_eq!(f.manager.state(&f.item.id).await, CacheState::NotCached);
}

#[tokio::test]
async fn test_missing_source_is_rejected() {
    let f = fixture(CacheConfig::default());
    let no_source = item(2, "");

    assert!(matches!(
        f.manager.start_download(&no_source).await,
        Err(PlaylistError::MissingSource(_))
    ));
    assert_eq!(f.manager.state(&no_source.id).await, CacheState::NotCached);
}

#[tokio::test]
async fn test_delete_cache_only_from_cached() {
    let f = fixture(CacheConfig::default());

    let result = f.manager.delete_cache(&f.item.id).await;
    assert!(matches!(result, Err(PlaylistError::NotCached(_))));
    assert_eq!(f.manager.state(&f.item.id).await, CacheState::NotCached);

    f.client.route(SOURCE, Route::resource(resource(512)));
    f.client.stall_streams(true);
    let ticket = f.manager.start_download(&f.item).await.unwrap();
    assert!(matches!(
        f.manager.delete_cache(&f.item.id).await,
        Err(PlaylistError::NotCached(_))
    ));
    assert_eq!(f.manager.state(&f.item.id).await, CacheState::Downloading);
    ticket.cancel();
    ticket.wait().await.unwrap();

    f.blobs.put(f.item.id.as_str(), b"cached bytes");
    f.manager.delete_cache(&f.item.id).await.unwrap();
    assert_eq!(f.manager.state(&f.item.id).await, CacheState::NotCached);
    assert_eq!(f.blobs.len(), 0);
}

#[tokio::test]
async fn test_read_cached_detects_corruption() {
    let f = fixture(CacheConfig::default());
    f.blobs.put(f.item.id.as_str(), b"original media bytes");
    f.manager.initialize().await.unwrap();

    let blob = f.manager.read_cached(&f.item.id).await.unwrap();
    assert_eq!(blob.data.as_ref(), b"original media bytes");

    f.blobs.corrupt(f.item.id.as_str());
    let result = f.manager.read_cached(&f.item.id).await;
    assert!(matches!(
        result,
        Err(PlaylistError::IntegrityCheckFailed { .. })
    ));
    assert_eq!(f.manager.state(&f.item.id).await, CacheState::NotCached);
    assert_eq!(f.blobs.len(), 0);
}

#[tokio::test]
async fn test_read_cached_without_verification() {
    let f = fixture(CacheConfig::default().with_verify_integrity(false));
    f.blobs.put(f.item.id.as_str(), b"media");
    f.blobs.corrupt(f.item.id.as_str());

    assert!(f.manager.read_cached(&f.item.id).await.is_ok());
    assert!(matches!(
        f.manager.read_cached(&ItemId::new("https://example.com/none")).await,
        Err(PlaylistError::NotCached(_))
    ));
}

#[tokio::test]
async fn test_initialize_and_items() {
    let f = fixture(CacheConfig::default());
    f.blobs.put(f.item.id.as_str(), b"bytes");
    f.manager.initialize().await.unwrap();

    let items = f.manager.items().await.unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].item, f.item);
    assert_eq!(items[0].state, CacheState::Cached);
}

#[tokio::test]
async fn test_initialize_rejects_invalid_config() {
    let f = fixture(CacheConfig::default().with_max_retry_attempts(0));
    assert!(matches!(
        f.manager.initialize().await,
        Err(PlaylistError::InvalidConfig(_))
    ));
}

#[tokio::test]
async fn test_update_source_url() {
    let f = fixture(CacheConfig::default());

    f.manager
        .update_source_url(&f.item.id, "https://cdn.example.com/fresh.mp3")
        .await
        .unwrap();
    assert_eq!(
        f.store.item(&f.item.id).unwrap().source_url,
        "https://cdn.example.com/fresh.mp3"
    );

    let missing = f
        .manager
        .update_source_url(&ItemId::new("https://example.com/none"), "x")
        .await;
    assert!(matches!(missing, Err(PlaylistError::ItemNotFound(_))));
}

#[tokio::test]
async fn test_shutdown_cancels_downloads() {
    let f = fixture(CacheConfig::default());
    f.client.route(SOURCE, Route::resource(resource(4096)));
    f.client.stall_streams(true);

    let ticket = f.manager.start_download(&f.item).await.unwrap();
    f.manager.shutdown();

    assert_eq!(ticket.wait().await.unwrap(), DownloadOutcome::Cancelled);
    assert_eq!(f.manager.state(&f.item.id).await, CacheState::NotCached);
}
