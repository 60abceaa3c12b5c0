//! Test doubles shared by the integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use bridge_traits::error::{BridgeError, Result as BridgeResult};
use bridge_traits::extraction::{ExtractedMedia, PageMediaExtractor};
use bridge_traits::http::{HttpClient, HttpRequest, HttpResponse, HttpStream};
use bridge_traits::playback::{NowPlayingInfo, NowPlayingSink};
use bridge_traits::playlist::{ItemId, PlaylistItem, PlaylistStore};
use bridge_traits::storage::{BlobMetadata, BlobStore, StoredBlob};
use bytes::Bytes;
use chrono::Utc;
use core_runtime::events::{CoreEvent, Receiver};
use futures::stream::{self, StreamExt};
use mockall::mock;
use parking_lot::Mutex;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;

// ============================================================================
// HTTP
// ============================================================================

/// How the scripted client answers a URL.
#[derive(Clone)]
pub enum Route {
    /// Serve `data`, honouring `Range` headers. Partial responses carry at
    /// most `max_response` bytes when set.
    Resource {
        data: Bytes,
        content_type: String,
        max_response: Option<usize>,
    },
    /// Empty response with this status.
    Status(u16),
    /// Transport error.
    Fail,
    /// Never answers.
    Hang,
}

impl Route {
    pub fn resource(data: impl Into<Bytes>) -> Self {
        Route::Resource {
            data: data.into(),
            content_type: "video/mp4".to_string(),
            max_response: None,
        }
    }
}

/// `HttpClient` fake with per-URL routes and per-range completion gates.
pub struct ScriptedHttpClient {
    routes: Mutex<HashMap<String, Route>>,
    gates: Mutex<HashMap<String, Arc<Semaphore>>>,
    requests: Mutex<Vec<HttpRequest>>,
    stream_chunk: usize,
    stall_streams: Mutex<bool>,
}

impl ScriptedHttpClient {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            routes: Mutex::new(HashMap::new()),
            gates: Mutex::new(HashMap::new()),
            requests: Mutex::new(Vec::new()),
            stream_chunk: 1024,
            stall_streams: Mutex::new(false),
        })
    }

    pub fn route(&self, url: &str, route: Route) {
        self.routes.lock().insert(url.to_string(), route);
    }

    /// Hold responses for requests with this `Range` value until released.
    pub fn gate(&self, range: &str) {
        self.gates
            .lock()
            .insert(range.to_string(), Arc::new(Semaphore::new(0)));
    }

    pub fn release(&self, range: &str) {
        if let Some(gate) = self.gates.lock().get(range) {
            gate.add_permits(1);
        }
    }

    /// Streamed downloads deliver one chunk and then stall forever.
    pub fn stall_streams(&self, stall: bool) {
        *self.stall_streams.lock() = stall;
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().len()
    }

    pub fn requests_for(&self, url: &str) -> usize {
        self.requests.lock().iter().filter(|r| r.url == url).count()
    }

    fn record(&self, request: &HttpRequest) -> Option<Route> {
        self.requests.lock().push(request.clone());
        self.routes.lock().get(&request.url).cloned()
    }

    async fn wait_gate(&self, request: &HttpRequest) {
        let gate = request
            .header_value("Range")
            .and_then(|range| self.gates.lock().get(range).cloned());
        if let Some(gate) = gate {
            if let Ok(permit) = gate.acquire().await {
                permit.forget();
            }
        }
    }
}

fn parse_range(value: &str) -> Option<(u64, u64)> {
    let (start, end) = value.strip_prefix("bytes=")?.split_once('-')?;
    Some((start.parse().ok()?, end.parse().ok()?))
}

fn headers(pairs: &[(&str, String)]) -> HashMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

#[async_trait]
impl HttpClient for ScriptedHttpClient {
    async fn execute(&self, request: HttpRequest) -> BridgeResult<HttpResponse> {
        let route = self.record(&request);
        self.wait_gate(&request).await;

        match route {
            Some(Route::Resource {
                data,
                content_type,
                max_response,
            }) => {
                let total = data.len() as u64;
                match request.header_value("Range").and_then(parse_range) {
                    Some((start, end)) if start < total => {
                        let mut end = end.min(total - 1);
                        if let Some(max) = max_response {
                            end = end.min(start + max as u64 - 1);
                        }
                        let body = data.slice(start as usize..=end as usize);
                        Ok(HttpResponse {
                            status: 206,
                            headers: headers(&[
                                ("Content-Range", format!("bytes {}-{}/{}", start, end, total)),
                                ("Content-Length", body.len().to_string()),
                                ("Accept-Ranges", "bytes".to_string()),
                                ("Content-Type", content_type),
                            ]),
                            body,
                        })
                    }
                    Some(_) => Ok(HttpResponse {
                        status: 416,
                        headers: HashMap::new(),
                        body: Bytes::new(),
                    }),
                    None => Ok(HttpResponse {
                        status: 200,
                        headers: headers(&[
                            ("Content-Length", total.to_string()),
                            ("Content-Type", content_type),
                        ]),
                        body: data,
                    }),
                }
            }
            Some(Route::Status(status)) => Ok(HttpResponse {
                status,
                headers: HashMap::new(),
                body: Bytes::new(),
            }),
            Some(Route::Fail) => Err(BridgeError::OperationFailed("connection reset".to_string())),
            Some(Route::Hang) => {
                futures::future::pending::<()>().await;
                unreachable!()
            }
            None => Ok(HttpResponse {
                status: 404,
                headers: HashMap::new(),
                body: Bytes::new(),
            }),
        }
    }

    async fn stream(&self, request: HttpRequest) -> BridgeResult<HttpStream> {
        let route = self.record(&request);

        match route {
            Some(Route::Resource {
                data, content_type, ..
            }) => {
                let chunks: Vec<BridgeResult<Bytes>> = data
                    .chunks(self.stream_chunk)
                    .map(|chunk| Ok(Bytes::copy_from_slice(chunk)))
                    .collect();
                let body = if *self.stall_streams.lock() {
                    stream::iter(chunks.into_iter().take(1))
                        .chain(stream::pending())
                        .boxed()
                } else {
                    stream::iter(chunks).boxed()
                };

                Ok(HttpStream {
                    status: 200,
                    headers: headers(&[
                        ("Content-Length", data.len().to_string()),
                        ("Content-Type", content_type),
                    ]),
                    body,
                })
            }
            Some(Route::Status(status)) => Ok(HttpStream {
                status,
                headers: HashMap::new(),
                body: stream::empty().boxed(),
            }),
            Some(Route::Fail) => Err(BridgeError::OperationFailed("connection reset".to_string())),
            Some(Route::Hang) => {
                futures::future::pending::<()>().await;
                unreachable!()
            }
            None => Ok(HttpStream {
                status: 404,
                headers: HashMap::new(),
                body: stream::empty().boxed(),
            }),
        }
    }
}

// ============================================================================
// Stores
// ============================================================================

#[derive(Default)]
pub struct MemoryBlobStore {
    blobs: Mutex<HashMap<String, StoredBlob>>,
    write_gate: Mutex<Option<Arc<Semaphore>>>,
    writes_started: AtomicUsize,
}

impl MemoryBlobStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Store `data` for `id` with a correct digest.
    pub fn put(&self, id: &str, data: &'static [u8]) {
        let metadata = BlobMetadata {
            content_type: Some("audio/mpeg".to_string()),
            length: data.len() as u64,
            sha256: sha256_hex(data),
            source_url: "https://cdn.example.com/cached.mp3".to_string(),
            cached_at: Utc::now(),
        };
        self.blobs
            .lock()
            .insert(id.to_string(), StoredBlob::new(metadata, Bytes::from_static(data)));
    }

    pub fn get(&self, id: &str) -> Option<StoredBlob> {
        self.blobs.lock().get(id).cloned()
    }

    /// Flip the stored bytes without touching the recorded digest.
    pub fn corrupt(&self, id: &str) {
        if let Some(blob) = self.blobs.lock().get_mut(id) {
            let mut data = blob.data.to_vec();
            if let Some(first) = data.first_mut() {
                *first ^= 0xff;
            }
            blob.data = Bytes::from(data);
        }
    }

    pub fn len(&self) -> usize {
        self.blobs.lock().len()
    }

    /// Hold every write until [`release_writes`](Self::release_writes).
    pub fn gate_writes(&self) {
        *self.write_gate.lock() = Some(Arc::new(Semaphore::new(0)));
    }

    /// Let held and future writes through.
    pub fn release_writes(&self) {
        if let Some(gate) = self.write_gate.lock().take() {
            gate.close();
        }
    }

    pub fn writes_started(&self) -> usize {
        self.writes_started.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn read(&self, id: &str) -> BridgeResult<Option<StoredBlob>> {
        Ok(self.blobs.lock().get(id).cloned())
    }

    async fn write(&self, id: &str, blob: StoredBlob) -> BridgeResult<()> {
        self.writes_started.fetch_add(1, Ordering::SeqCst);
        let gate = self.write_gate.lock().clone();
        if let Some(gate) = gate {
            let _ = gate.acquire().await;
        }
        self.blobs.lock().insert(id.to_string(), blob);
        Ok(())
    }

    async fn delete(&self, id: &str) -> BridgeResult<()> {
        self.blobs.lock().remove(id);
        Ok(())
    }

    async fn exists(&self, id: &str) -> BridgeResult<bool> {
        Ok(self.blobs.lock().contains_key(id))
    }
}

#[derive(Default)]
pub struct MemoryPlaylistStore {
    items: Mutex<Vec<PlaylistItem>>,
}

impl MemoryPlaylistStore {
    pub fn with_items(items: Vec<PlaylistItem>) -> Arc<Self> {
        Arc::new(Self {
            items: Mutex::new(items),
        })
    }

    pub fn item(&self, id: &ItemId) -> Option<PlaylistItem> {
        self.items.lock().iter().find(|item| &item.id == id).cloned()
    }
}

#[async_trait]
impl PlaylistStore for MemoryPlaylistStore {
    async fn load_all(&self) -> BridgeResult<Vec<PlaylistItem>> {
        Ok(self.items.lock().clone())
    }

    async fn get(&self, id: &ItemId) -> BridgeResult<Option<PlaylistItem>> {
        Ok(self.item(id))
    }

    async fn upsert(&self, item: PlaylistItem) -> BridgeResult<()> {
        let mut items = self.items.lock();
        match items.iter_mut().find(|existing| existing.id == item.id) {
            Some(existing) => *existing = item,
            None => items.push(item),
        }
        Ok(())
    }

    async fn update_source_url(&self, id: &ItemId, source_url: &str) -> BridgeResult<()> {
        let mut items = self.items.lock();
        let item = items
            .iter_mut()
            .find(|item| &item.id == id)
            .ok_or_else(|| BridgeError::NotFound(id.to_string()))?;
        item.source_url = source_url.to_string();
        Ok(())
    }

    async fn remove(&self, id: &ItemId) -> BridgeResult<bool> {
        let mut items = self.items.lock();
        let before = items.len();
        items.retain(|item| &item.id != id);
        Ok(items.len() != before)
    }

    async fn reorder(&self, from: usize, to: usize) -> BridgeResult<()> {
        let mut items = self.items.lock();
        if from >= items.len() || to >= items.len() {
            return Err(BridgeError::OperationFailed("out of bounds".to_string()));
        }
        let item = items.remove(from);
        items.insert(to, item);
        Ok(())
    }
}

// ============================================================================
// Collaborators
// ============================================================================

mock! {
    pub Extractor {}

    #[async_trait]
    impl PageMediaExtractor for Extractor {
        async fn extract(&self, page_url: &str) -> BridgeResult<Option<ExtractedMedia>>;
    }
}

/// Extractor that never finishes.
pub struct HangingExtractor;

#[async_trait]
impl PageMediaExtractor for HangingExtractor {
    async fn extract(&self, _page_url: &str) -> BridgeResult<Option<ExtractedMedia>> {
        futures::future::pending::<()>().await;
        unreachable!()
    }
}

#[derive(Default)]
pub struct RecordingSink {
    pub published: Mutex<Vec<NowPlayingInfo>>,
    pub clears: Mutex<usize>,
}

#[async_trait]
impl NowPlayingSink for RecordingSink {
    async fn publish(&self, info: NowPlayingInfo) -> BridgeResult<()> {
        self.published.lock().push(info);
        Ok(())
    }

    async fn clear(&self) -> BridgeResult<()> {
        *self.clears.lock() += 1;
        Ok(())
    }
}

// ============================================================================
// Helpers
// ============================================================================

pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// Deterministic resource bytes.
pub fn resource(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}

pub fn item(n: u32, source_url: &str) -> PlaylistItem {
    PlaylistItem::new(
        format!("Item {n}"),
        source_url,
        format!("https://www.example.com/page/{n}"),
        120.0,
    )
}

/// Every event currently buffered on `receiver`.
pub fn drain_events(receiver: &mut Receiver<CoreEvent>) -> Vec<CoreEvent> {
    let mut events = Vec::new();
    while let Ok(event) = receiver.try_recv() {
        events.push(event);
    }
    events
}

/// Poll `condition` until it holds, panicking after two seconds.
pub async fn eventually<F, Fut>(mut condition: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while !condition().await {
        assert!(
            tokio::time::Instant::now() < deadline,
            "condition not reached in time"
        );
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

/// Let spawned tasks run.
pub async fn settle() {
    for _ in 0..20 {
        tokio::task::yield_now().await;
    }
}
