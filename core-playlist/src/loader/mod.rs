//! # Resource Loading
//!
//! The decoder does not speak HTTP. It asks a loader session for content
//! metadata and for byte windows of one URL, and the session answers from
//! the network ([`ResourceLoadBridge`]) or from a fully cached blob
//! ([`CacheLoadBridge`]). The variant is chosen once, when the session is
//! created, and wrapped in a [`LoaderSession`].
//!
//! ## Request handles
//!
//! Every request returns a handle immediately; data arrives on it later.
//!
//! ```rust,ignore
//! let info = session.request_content_info(session.url())?.wait().await?;
//! let mut request = session.request_data(session.url(), 0, 4096)?;
//! while let Some(event) = request.next().await {
//!     match event {
//!         DataEvent::Chunk(bytes) => decoder.feed(bytes),
//!         DataEvent::Finished => break,
//!         DataEvent::Failed(e) => return Err(e),
//!     }
//! }
//! ```
//!
//! Dropping a handle or calling [`ResourceLoader::cancel`] abandons the
//! request. Results that arrive afterwards are discarded.

mod buffer;
mod cache;
mod remote;

pub use buffer::AccumulatedBuffer;
pub use cache::CacheLoadBridge;
pub use remote::ResourceLoadBridge;

use crate::error::{PlaylistError, Result};
use crate::models::ContentInfo;
use bytes::{Bytes, BytesMut};
use std::fmt;
use tokio::sync::{mpsc, oneshot};

/// Identifies one request within a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestId(pub u64);

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "req-{}", self.0)
    }
}

/// Progress of a data request.
#[derive(Debug)]
pub enum DataEvent {
    /// The next bytes of the window, in order.
    Chunk(Bytes),
    /// The whole window has been delivered.
    Finished,
    /// The request failed. No further events follow.
    Failed(PlaylistError),
}

/// Handle for a pending byte-window request.
#[derive(Debug)]
pub struct DataRequest {
    id: RequestId,
    offset: u64,
    length: u64,
    receiver: mpsc::UnboundedReceiver<DataEvent>,
}

impl DataRequest {
    pub(crate) fn channel(
        id: RequestId,
        offset: u64,
        length: u64,
    ) -> (Self, mpsc::UnboundedSender<DataEvent>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (
            Self {
                id,
                offset,
                length,
                receiver,
            },
            sender,
        )
    }

    pub fn id(&self) -> RequestId {
        self.id
    }

    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn length(&self) -> u64 {
        self.length
    }

    /// Next event, or `None` once the session dropped the request.
    pub async fn next(&mut self) -> Option<DataEvent> {
        self.receiver.recv().await
    }

    /// Gather the complete window.
    ///
    /// A request abandoned without a final event yields
    /// [`PlaylistError::Cancelled`].
    pub async fn collect(mut self) -> Result<Bytes> {
        let mut collected = BytesMut::new();
        loop {
            match self.receiver.recv().await {
                Some(DataEvent::Chunk(bytes)) => collected.extend_from_slice(&bytes),
                Some(DataEvent::Finished) => return Ok(collected.freeze()),
                Some(DataEvent::Failed(e)) => return Err(e),
                None => return Err(PlaylistError::Cancelled),
            }
        }
    }
}

/// Handle for a pending content-info request.
#[derive(Debug)]
pub struct ContentInfoRequest {
    id: RequestId,
    receiver: oneshot::Receiver<Result<ContentInfo>>,
}

impl ContentInfoRequest {
    pub(crate) fn channel(id: RequestId) -> (Self, oneshot::Sender<Result<ContentInfo>>) {
        let (sender, receiver) = oneshot::channel();
        (Self { id, receiver }, sender)
    }

    pub fn id(&self) -> RequestId {
        self.id
    }

    pub async fn wait(self) -> Result<ContentInfo> {
        match self.receiver.await {
            Ok(result) => result,
            Err(_) => Err(PlaylistError::Cancelled),
        }
    }
}

/// Decoder-facing resource-loading contract.
///
/// Calls never block. Each request is answered at most once and is either
/// satisfied, failed, or cancelled.
pub trait ResourceLoader: Send + Sync {
    /// URL this session serves.
    fn url(&self) -> &str;

    fn request_content_info(&self, url: &str) -> Result<ContentInfoRequest>;

    /// Ask for `[offset, offset + length)`.
    fn request_data(&self, url: &str, offset: u64, length: u64) -> Result<DataRequest>;

    /// Abandon a request. Unknown or already finished ids are ignored.
    fn cancel(&self, id: RequestId);

    /// End the session. Outstanding requests fail with
    /// [`PlaylistError::SessionClosed`].
    fn close(&self);
}

/// A loader session of either variant.
#[derive(Clone)]
pub enum LoaderSession {
    Remote(ResourceLoadBridge),
    Cache(CacheLoadBridge),
}

impl LoaderSession {
    pub fn is_cache(&self) -> bool {
        matches!(self, LoaderSession::Cache(_))
    }

    /// Content metadata known so far without issuing a request.
    pub fn content_info(&self) -> ContentInfo {
        match self {
            LoaderSession::Remote(bridge) => bridge.content_info(),
            LoaderSession::Cache(bridge) => bridge.content_info(),
        }
    }
}

impl fmt::Debug for LoaderSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoaderSession::Remote(bridge) => f.debug_tuple("Remote").field(&bridge.url()).finish(),
            LoaderSession::Cache(bridge) => f.debug_tuple("Cache").field(&bridge.url()).finish(),
        }
    }
}

impl ResourceLoader for LoaderSession {
    fn url(&self) -> &str {
        match self {
            LoaderSession::Remote(bridge) => bridge.url(),
            LoaderSession::Cache(bridge) => bridge.url(),
        }
    }

    fn request_content_info(&self, url: &str) -> Result<ContentInfoRequest> {
        match self {
            LoaderSession::Remote(bridge) => bridge.request_content_info(url),
            LoaderSession::Cache(bridge) => bridge.request_content_info(url),
        }
    }

    fn request_data(&self, url: &str, offset: u64, length: u64) -> Result<DataRequest> {
        match self {
            LoaderSession::Remote(bridge) => bridge.request_data(url, offset, length),
            LoaderSession::Cache(bridge) => bridge.request_data(url, offset, length),
        }
    }

    fn cancel(&self, id: RequestId) {
        match self {
            LoaderSession::Remote(bridge) => bridge.cancel(id),
            LoaderSession::Cache(bridge) => bridge.cancel(id),
        }
    }

    fn close(&self) {
        match self {
            LoaderSession::Remote(bridge) => bridge.close(),
            LoaderSession::Cache(bridge) => bridge.close(),
        }
    }
}
