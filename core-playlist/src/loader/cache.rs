//! Blob-backed loader session.

use super::{ContentInfoRequest, DataEvent, DataRequest, RequestId, ResourceLoader};
use crate::error::{PlaylistError, Result};
use crate::models::ContentInfo;
use bridge_traits::storage::StoredBlob;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

/// Serves a fully downloaded blob. Every request is answered on the spot.
#[derive(Clone)]
pub struct CacheLoadBridge {
    inner: Arc<CacheInner>,
}

struct CacheInner {
    url: String,
    blob: StoredBlob,
    next_id: AtomicU64,
    closed: AtomicBool,
}

impl CacheLoadBridge {
    pub fn new(url: impl Into<String>, blob: StoredBlob) -> Self {
        Self {
            inner: Arc::new(CacheInner {
                url: url.into(),
                blob,
                next_id: AtomicU64::new(1),
                closed: AtomicBool::new(false),
            }),
        }
    }

    pub fn content_info(&self) -> ContentInfo {
        ContentInfo {
            content_type: self.inner.blob.metadata.content_type.clone(),
            total_length: Some(self.inner.blob.len()),
            supports_byte_ranges: true,
        }
    }

    pub fn blob(&self) -> &StoredBlob {
        &self.inner.blob
    }

    fn open_request(&self, url: &str) -> Result<RequestId> {
        if url != self.inner.url {
            return Err(PlaylistError::UnroutableUrl(url.to_string()));
        }
        if self.inner.closed.load(Ordering::Acquire) {
            return Err(PlaylistError::SessionClosed);
        }
        Ok(RequestId(self.inner.next_id.fetch_add(1, Ordering::Relaxed)))
    }
}

impl ResourceLoader for CacheLoadBridge {
    fn url(&self) -> &str {
        &self.inner.url
    }

    fn request_content_info(&self, url: &str) -> Result<ContentInfoRequest> {
        let id = self.open_request(url)?;
        let (request, sender) = ContentInfoRequest::channel(id);
        let _ = sender.send(Ok(self.content_info()));
        Ok(request)
    }

    /// Windows reaching past the end of the blob are clamped to it.
    fn request_data(&self, url: &str, offset: u64, length: u64) -> Result<DataRequest> {
        let id = self.open_request(url)?;
        let (request, sender) = DataRequest::channel(id, offset, length);

        let total = self.inner.blob.len();
        let start = offset.min(total);
        let end = offset.saturating_add(length).min(total);
        if end > start {
            let chunk = self.inner.blob.data.slice(start as usize..end as usize);
            let _ = sender.send(DataEvent::Chunk(chunk));
        }
        let _ = sender.send(DataEvent::Finished);

        Ok(request)
    }

    /// Requests complete immediately, so there is never anything to cancel.
    fn cancel(&self, _id: RequestId) {}

    fn close(&self) {
        self.inner.closed.store(true, Ordering::Release);
    }
}
