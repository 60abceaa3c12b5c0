mod common;

use bridge_traits::extraction::{ExtractedMedia, PageMediaExtractor};
use common::{
    drain_events, item, resource, HangingExtractor, MemoryBlobStore, MemoryPlaylistStore,
    MockExtractor, Route, ScriptedHttpClient,
};
use core_playlist::orchestrator::CANNOT_LOAD_MEDIA;
use core_playlist::shim::LOCAL_MEDIA_SCHEME;
use core_playlist::{
    shim, AcquisitionConfig, CacheConfig, CacheState, DownloadCacheManager, LoadOutcome,
    MediaAcquisitionOrchestrator, PlaylistError, PlaylistItem, ReadyMedia, ResourceLoader,
};
use core_runtime::events::{CoreEvent, EventBus, MediaEvent, MediaRoute};
use mockall::predicate::eq;
use std::sync::Arc;
use std::time::Duration;

const SOURCE: &str = "https://cdn.example.com/expiring.mp4?token=1";
const RESOLVED: &str = "https://cdn.example.com/resolved.mp4?token=2";

struct Fixture {
    client: Arc<ScriptedHttpClient>,
    blobs: Arc<MemoryBlobStore>,
    store: Arc<MemoryPlaylistStore>,
    bus: EventBus,
    cache: DownloadCacheManager,
    orchestrator: MediaAcquisitionOrchestrator,
}

fn fixture(items: Vec<PlaylistItem>, extractor: Arc<dyn PageMediaExtractor>) -> Fixture {
    let client = ScriptedHttpClient::new();
    let blobs = MemoryBlobStore::new();
    let store = MemoryPlaylistStore::with_items(items);
    let bus = EventBus::new(64);
    let cache = DownloadCacheManager::new(
        CacheConfig::default(),
        client.clone(),
        blobs.clone(),
        store.clone(),
    )
    .with_event_bus(bus.clone());
    let config = AcquisitionConfig::default().with_extraction_timeout(Duration::from_millis(100));
    let orchestrator =
        MediaAcquisitionOrchestrator::new(config, cache.clone(), client.clone(), extractor)
            .unwrap()
            .with_event_bus(bus.clone());

    Fixture {
        client,
        blobs,
        store,
        bus,
        cache,
        orchestrator,
    }
}

fn ready(outcome: LoadOutcome) -> ReadyMedia {
    match outcome {
        LoadOutcome::Ready(media) => media,
        other => panic!("expected ready, got {other}"),
    }
}

fn never_called() -> Arc<MockExtractor> {
    let mut extractor = MockExtractor::new();
    extractor.expect_extract().times(0);
    Arc::new(extractor)
}

fn resolves_to(page_url: &str, media_url: &'static str) -> Arc<MockExtractor> {
    let mut extractor = MockExtractor::new();
    extractor
        .expect_extract()
        .with(eq(page_url.to_string()))
        .times(1)
        .returning(move |_| Ok(Some(ExtractedMedia::new(media_url))));
    Arc::new(extractor)
}

fn finds_nothing() -> Arc<MockExtractor> {
    let mut extractor = MockExtractor::new();
    extractor.expect_extract().times(1).returning(|_| Ok(None));
    Arc::new(extractor)
}

#[tokio::test]
async fn test_cached_item_is_served_locally_without_network() {
    let entry = item(1, SOURCE);
    let f = fixture(vec![entry.clone()], never_called());
    f.blobs.put(entry.id.as_str(), b"cached media");

    let media = ready(f.orchestrator.load(&entry).await);

    assert_eq!(media.route, MediaRoute::Cache);
    assert!(media.url.starts_with(&format!("{LOCAL_MEDIA_SCHEME}://")));
    assert!(media.session.is_cache());
    assert_eq!(f.client.request_count(), 0);

    let bytes = media
        .session
        .request_data(&media.url, 0, 6)
        .unwrap()
        .collect()
        .await
        .unwrap();
    assert_eq!(bytes.as_ref(), b"cached");
}

#[tokio::test]
async fn test_streamable_source_is_served_remotely() {
    let entry = item(1, SOURCE);
    let f = fixture(vec![entry.clone()], never_called());
    let data = resource(64);
    f.client.route(SOURCE, Route::resource(data.clone()));
    let mut events = f.bus.subscribe();

    let media = ready(f.orchestrator.load(&entry).await);

    assert_eq!(media.route, MediaRoute::Stream);
    assert_eq!(media.url, shim(SOURCE));
    assert!(!media.session.is_cache());

    let bytes = media
        .session
        .request_data(&media.url, 10, 20)
        .unwrap()
        .collect()
        .await
        .unwrap();
    assert_eq!(bytes.as_ref(), &data[10..30]);

    assert!(drain_events(&mut events).contains(&CoreEvent::Media(MediaEvent::Loaded {
        item_id: entry.id.to_string(),
        route: MediaRoute::Stream,
    })));
}

#[tokio::test]
async fn test_empty_source_extracts_once_and_persists_url() {
    let entry = item(1, "");
    let f = fixture(vec![entry.clone()], resolves_to(&entry.page_url, RESOLVED));
    let mut events = f.bus.subscribe();

    let media = ready(f.orchestrator.load(&entry).await);

    assert_eq!(media.route, MediaRoute::Extracted);
    assert_eq!(media.url, shim(RESOLVED));
    assert_eq!(f.store.item(&entry.id).unwrap().source_url, RESOLVED);
    assert_eq!(f.cache.state(&entry.id).await, CacheState::NotCached);
    // No probe for an item without a source
    assert_eq!(f.client.request_count(), 0);

    let events = drain_events(&mut events);
    assert!(events.contains(&CoreEvent::Media(MediaEvent::SourceUpdated {
        item_id: entry.id.to_string(),
    })));
}

#[tokio::test]
async fn test_unstreamable_source_falls_back_to_extraction() {
    let entry = item(1, SOURCE);
    let f = fixture(vec![entry.clone()], resolves_to(&entry.page_url, RESOLVED));
    f.client.route(SOURCE, Route::Status(403));

    let media = ready(f.orchestrator.load(&entry).await);

    assert_eq!(media.route, MediaRoute::Extracted);
    assert_eq!(f.client.requests_for(SOURCE), 1);
    assert_eq!(f.store.item(&entry.id).unwrap().source_url, RESOLVED);
}

#[tokio::test]
async fn test_dead_source_with_failed_extraction_is_expired() {
    let entry = item(1, SOURCE);
    let f = fixture(vec![entry.clone()], finds_nothing());
    f.client.route(SOURCE, Route::Status(404));
    let mut events = f.bus.subscribe();

    let outcome = f.orchestrator.load(&entry).await;
    assert!(matches!(outcome, LoadOutcome::Expired));
    assert_eq!(f.store.item(&entry.id).unwrap().source_url, SOURCE);

    assert!(drain_events(&mut events).contains(&CoreEvent::Media(MediaEvent::Expired {
        item_id: entry.id.to_string(),
    })));
}

#[tokio::test]
async fn test_no_source_with_failed_extraction_fails() {
    let entry = item(1, "");
    let f = fixture(vec![entry.clone()], finds_nothing());

    let outcome = f.orchestrator.load(&entry).await;
    match outcome {
        LoadOutcome::Failed(reason) => assert_eq!(reason, CANNOT_LOAD_MEDIA),
        other => panic!("expected failure, got {other}"),
    }
}

#[tokio::test]
async fn test_extractor_error_is_not_surfaced() {
    let entry = item(1, "");
    let mut extractor = MockExtractor::new();
    extractor.expect_extract().times(1).returning(|_| {
        Err(bridge_traits::BridgeError::OperationFailed(
            "web view crashed".to_string(),
        ))
    });
    let f = fixture(vec![entry.clone()], Arc::new(extractor));

    assert!(matches!(
        f.orchestrator.load(&entry).await,
        LoadOutcome::Failed(_)
    ));
}

#[tokio::test]
async fn test_extraction_timeout_fails() {
    let entry = item(1, "");
    let f = fixture(vec![entry.clone()], Arc::new(HangingExtractor));

    assert!(matches!(
        f.orchestrator.load(&entry).await,
        LoadOutcome::Failed(_)
    ));
}

#[tokio::test]
async fn test_corrupt_cache_falls_through_to_stream() {
    let entry = item(1, SOURCE);
    let f = fixture(vec![entry.clone()], never_called());
    f.blobs.put(entry.id.as_str(), b"cached media");
    f.blobs.corrupt(entry.id.as_str());
    f.client.route(SOURCE, Route::resource(resource(16)));

    let media = ready(f.orchestrator.load(&entry).await);

    assert_eq!(media.route, MediaRoute::Stream);
    assert_eq!(f.cache.state(&entry.id).await, CacheState::NotCached);
}

#[tokio::test]
async fn test_blank_extraction_result_counts_as_nothing_found() {
    let entry = item(1, SOURCE);
    let mut extractor = MockExtractor::new();
    extractor
        .expect_extract()
        .times(1)
        .returning(|_| Ok(Some(ExtractedMedia::new("  "))));
    let f = fixture(vec![entry.clone()], Arc::new(extractor));
    f.client.route(SOURCE, Route::Status(410));

    assert!(matches!(
        f.orchestrator.load(&entry).await,
        LoadOutcome::Expired
    ));
}

#[tokio::test]
async fn test_zero_timeout_is_rejected_at_construction() {
    let client = ScriptedHttpClient::new();
    let store = MemoryPlaylistStore::with_items(Vec::new());
    let cache = DownloadCacheManager::new(
        CacheConfig::default(),
        client.clone(),
        MemoryBlobStore::new(),
        store,
    );

    for config in [
        AcquisitionConfig::default().with_probe_timeout(Duration::ZERO),
        AcquisitionConfig::default().with_extraction_timeout(Duration::ZERO),
        AcquisitionConfig::default().with_fetch_timeout(Duration::ZERO),
    ] {
        let result =
            MediaAcquisitionOrchestrator::new(config, cache.clone(), client.clone(), never_called());
        assert!(matches!(result, Err(PlaylistError::InvalidConfig(_))));
    }
}
