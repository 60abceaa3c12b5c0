//! Network-backed loader session.

use super::buffer::AccumulatedBuffer;
use super::{ContentInfoRequest, DataEvent, DataRequest, RequestId, ResourceLoader};
use crate::error::{PlaylistError, Result};
use crate::fetcher::{FetchedRange, RangeFetcher};
use crate::models::ContentInfo;
use crate::shim::unshim;
use core_runtime::logging::redact_url;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Bytes requested to learn content metadata.
const CONTENT_INFO_PROBE_LENGTH: u64 = 2;

/// Serves one shimmed URL by translating decoder requests into ranged
/// fetches against the original URL.
///
/// Fetches may complete in any order. After every completion all pending
/// requests are rescanned, so a request is satisfied as soon as its window
/// is covered no matter which fetch brought the bytes. Each request gets
/// its window delivered as an ordered series of chunks, exactly once.
///
/// Clones share the session.
#[derive(Clone)]
pub struct ResourceLoadBridge {
    inner: Arc<SessionInner>,
}

struct SessionInner {
    url: String,
    original_url: String,
    fetcher: RangeFetcher,
    state: Mutex<SessionState>,
    token: CancellationToken,
    next_id: AtomicU64,
}

#[derive(Default)]
struct SessionState {
    buffer: AccumulatedBuffer,
    pending: Vec<PendingByteRequest>,
    content_info: Option<ContentInfo>,
    content_waiters: Vec<(RequestId, oneshot::Sender<Result<ContentInfo>>)>,
    content_fetch: Option<CancellationToken>,
    closed: bool,
}

struct PendingByteRequest {
    id: RequestId,
    offset: u64,
    length: u64,
    /// Next byte to deliver
    current_offset: u64,
    sender: mpsc::UnboundedSender<DataEvent>,
    token: CancellationToken,
}

impl PendingByteRequest {
    fn end(&self) -> u64 {
        self.offset.saturating_add(self.length)
    }
}

impl ResourceLoadBridge {
    /// Open a session for `url`, normally a shimmed URL.
    pub fn new(url: impl Into<String>, fetcher: RangeFetcher) -> Self {
        let url = url.into();
        let original_url = unshim(&url);
        debug!(url = %redact_url(&original_url), "Opening loader session");

        Self {
            inner: Arc::new(SessionInner {
                url,
                original_url,
                fetcher,
                state: Mutex::new(SessionState::default()),
                token: CancellationToken::new(),
                next_id: AtomicU64::new(1),
            }),
        }
    }

    /// URL the fetches go to.
    pub fn original_url(&self) -> &str {
        &self.inner.original_url
    }

    /// Content metadata, or "unknown length, no range support" when no
    /// content-info request has completed.
    pub fn content_info(&self) -> ContentInfo {
        self.inner
            .state
            .lock()
            .content_info
            .clone()
            .unwrap_or_default()
    }

    /// Number of data requests not yet satisfied.
    pub fn pending_requests(&self) -> usize {
        self.inner.state.lock().pending.len()
    }

    /// Length of the contiguous prefix fetched so far.
    pub fn buffered_len(&self) -> u64 {
        self.inner.state.lock().buffer.len()
    }

    pub fn is_closed(&self) -> bool {
        self.inner.state.lock().closed
    }
}

impl ResourceLoader for ResourceLoadBridge {
    fn url(&self) -> &str {
        &self.inner.url
    }

    fn request_content_info(&self, url: &str) -> Result<ContentInfoRequest> {
        self.inner.check_route(url)?;
        let id = self.inner.next_request_id();
        let (request, sender) = ContentInfoRequest::channel(id);

        let mut state = self.inner.state.lock();
        if state.closed {
            return Err(PlaylistError::SessionClosed);
        }

        if let Some(info) = &state.content_info {
            let _ = sender.send(Ok(info.clone()));
            return Ok(request);
        }

        state.content_waiters.push((id, sender));
        if state.content_fetch.is_none() {
            let token = self.inner.token.child_token();
            state.content_fetch = Some(token.clone());
            self.inner.spawn_content_fetch(token);
        }

        Ok(request)
    }

    fn request_data(&self, url: &str, offset: u64, length: u64) -> Result<DataRequest> {
        self.inner.check_route(url)?;
        if offset.checked_add(length).is_none() {
            return Err(PlaylistError::InvalidRange { offset, length });
        }
        let id = self.inner.next_request_id();
        let (request, sender) = DataRequest::channel(id, offset, length);

        let mut state = self.inner.state.lock();
        if state.closed {
            return Err(PlaylistError::SessionClosed);
        }

        if length == 0 {
            let _ = sender.send(DataEvent::Finished);
            return Ok(request);
        }

        let token = self.inner.token.child_token();
        state.pending.push(PendingByteRequest {
            id,
            offset,
            length,
            current_offset: offset,
            sender,
            token: token.clone(),
        });
        deliver_ready(&mut state);

        // Already served from bytes fetched for earlier requests
        if state.pending.iter().any(|p| p.id == id) {
            debug!(%id, offset, length, "Fetching window");
            self.inner.spawn_data_fetch(id, offset, length, token);
        }

        Ok(request)
    }

    fn cancel(&self, id: RequestId) {
        let mut state = self.inner.state.lock();

        if let Some(index) = state.pending.iter().position(|p| p.id == id) {
            let request = state.pending.remove(index);
            request.token.cancel();
            debug!(%id, "Data request cancelled");
            return;
        }

        let before = state.content_waiters.len();
        state.content_waiters.retain(|(waiter, _)| *waiter != id);
        if state.content_waiters.len() != before {
            debug!(%id, "Content info request cancelled");
            if state.content_waiters.is_empty() {
                if let Some(token) = state.content_fetch.take() {
                    token.cancel();
                }
            }
        }
    }

    fn close(&self) {
        let mut state = self.inner.state.lock();
        if state.closed {
            return;
        }
        terminate(&mut state, || PlaylistError::SessionClosed);
        self.inner.token.cancel();
        debug!(url = %redact_url(&self.inner.original_url), "Loader session closed");
    }
}

impl SessionInner {
    fn next_request_id(&self) -> RequestId {
        RequestId(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    /// Accepts the session URL or the URL it stands for.
    fn check_route(&self, url: &str) -> Result<()> {
        if url == self.url || url == self.original_url {
            Ok(())
        } else {
            Err(PlaylistError::UnroutableUrl(redact_url(url)))
        }
    }

    fn spawn_data_fetch(
        self: &Arc<Self>,
        id: RequestId,
        offset: u64,
        length: u64,
        token: CancellationToken,
    ) {
        let session = Arc::downgrade(self);
        let fetcher = self.fetcher.clone();
        let url = self.original_url.clone();

        tokio::spawn(async move {
            let result = tokio::select! {
                _ = token.cancelled() => return,
                result = fetcher.fetch(&url, offset, length) => result,
            };
            if let Some(inner) = live_session(&session, &token) {
                inner.complete_data_fetch(id, result);
            }
        });
    }

    fn spawn_content_fetch(self: &Arc<Self>, token: CancellationToken) {
        let session = Arc::downgrade(self);
        let fetcher = self.fetcher.clone();
        let url = self.original_url.clone();

        tokio::spawn(async move {
            let result = tokio::select! {
                _ = token.cancelled() => return,
                result = fetcher.fetch(&url, 0, CONTENT_INFO_PROBE_LENGTH) => result,
            };
            if let Some(inner) = live_session(&session, &token) {
                inner.complete_content_fetch(result);
            }
        });
    }

    fn complete_data_fetch(self: &Arc<Self>, id: RequestId, result: Result<FetchedRange>) {
        let mut state = self.state.lock();
        if state.closed {
            return;
        }

        match result {
            Ok(range) => {
                let before = state
                    .pending
                    .iter()
                    .find(|p| p.id == id)
                    .map(|p| p.current_offset);

                state.buffer.insert(range.offset, &range.bytes);
                deliver_ready(&mut state);

                // Short or misplaced response: continue while it makes progress
                let Some(before) = before else { return };
                let Some(index) = state.pending.iter().position(|p| p.id == id) else {
                    return;
                };
                let request = &state.pending[index];
                if request.current_offset > before {
                    let (offset, length, token) = (
                        request.current_offset,
                        request.end() - request.current_offset,
                        request.token.clone(),
                    );
                    debug!(%id, offset, length, "Fetching remainder of window");
                    self.spawn_data_fetch(id, offset, length, token);
                } else {
                    let request = state.pending.remove(index);
                    warn!(%id, "Response did not cover the requested window");
                    let _ = request.sender.send(DataEvent::Failed(
                        PlaylistError::InvalidResponse(
                            "response did not cover the requested range".to_string(),
                        ),
                    ));
                }
            }
            Err(e) => {
                if let Some(index) = state.pending.iter().position(|p| p.id == id) {
                    let request = state.pending.remove(index);
                    warn!(%id, error = %e, "Data fetch failed");
                    let _ = request.sender.send(DataEvent::Failed(e));
                }
            }
        }
    }

    fn complete_content_fetch(&self, result: Result<FetchedRange>) {
        let mut state = self.state.lock();
        if state.closed {
            return;
        }
        state.content_fetch = None;

        match result {
            Ok(range) => {
                let info = ContentInfo {
                    content_type: range.content_type.clone(),
                    total_length: range.total_length,
                    supports_byte_ranges: range.supports_ranges,
                };
                debug!(
                    content_type = ?info.content_type,
                    total_length = ?info.total_length,
                    supports_byte_ranges = info.supports_byte_ranges,
                    "Content info resolved"
                );

                state.buffer.insert(range.offset, &range.bytes);
                state.content_info = Some(info.clone());
                for (_, sender) in state.content_waiters.drain(..) {
                    let _ = sender.send(Ok(info.clone()));
                }
                deliver_ready(&mut state);
            }
            Err(e) => {
                warn!(
                    url = %redact_url(&self.original_url),
                    error = %e,
                    "Content info fetch failed, terminating session"
                );
                let message = e.to_string();
                terminate(&mut state, || PlaylistError::InvalidResponse(message.clone()));
                self.token.cancel();
            }
        }
    }
}

impl Drop for SessionInner {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

/// The session behind `weak`, unless it is gone or `token` was cancelled
/// while the fetch was in flight.
fn live_session(weak: &Weak<SessionInner>, token: &CancellationToken) -> Option<Arc<SessionInner>> {
    if token.is_cancelled() {
        debug!("Discarding result of cancelled fetch");
        return None;
    }
    weak.upgrade()
}

/// Deliver newly available bytes to every pending request and retire the
/// ones that are complete or abandoned.
fn deliver_ready(state: &mut SessionState) {
    let SessionState {
        buffer, pending, ..
    } = state;

    pending.retain_mut(|request| {
        let end = request.end();
        let available = buffer.contiguous_end(request.current_offset).min(end);

        if available > request.current_offset {
            let chunk = match buffer.read(request.current_offset, available - request.current_offset)
            {
                Some(chunk) => chunk,
                None => return true,
            };
            if request.sender.send(DataEvent::Chunk(chunk)).is_err() {
                // Receiver dropped
                request.token.cancel();
                return false;
            }
            request.current_offset = available;
        }

        if request.current_offset >= end {
            let _ = request.sender.send(DataEvent::Finished);
            request.token.cancel();
            return false;
        }

        true
    });
}

/// Fail everything outstanding and mark the session closed.
fn terminate(state: &mut SessionState, error: impl Fn() -> PlaylistError) {
    state.closed = true;

    for request in state.pending.drain(..) {
        let _ = request.sender.send(DataEvent::Failed(error()));
        request.token.cancel();
    }
    for (_, sender) in state.content_waiters.drain(..) {
        let _ = sender.send(Err(error()));
    }
    if let Some(token) = state.content_fetch.take() {
        token.cancel();
    }
}
