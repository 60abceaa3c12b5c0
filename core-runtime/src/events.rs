//! # Event Bus System
//!
//! Provides an event-driven architecture for the playlist core using `tokio::sync::broadcast`.
//! This module is how cache state changes, download progress and media load
//! outcomes reach UI collaborators without the core holding references to them.
//!
//! ## Overview
//!
//! The event bus system consists of:
//! - **Event Types**: Strongly-typed enum hierarchies for the cache and media domains
//! - **EventBus**: Central broadcast channel for publishing events
//! - **EventStream**: Wrapper for consuming events with filtering
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────┐    emit     ┌───────────┐
//! │ Cache Manager ├────────────>│           │     subscribe    ┌────────────┐
//! └───────────────┘             │ EventBus  ├─────────────────>│ Subscriber │
//! ┌───────────────┐    emit     │ (broadcast│                  └────────────┘
//! │ Orchestrator  ├────────────>│  channel) │
//! └───────────────┘             └───────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use core_runtime::events::{CacheEvent, CoreEvent, EventBus};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let event_bus = EventBus::new(100);
//! let mut stream = event_bus.subscribe();
//!
//! event_bus
//!     .emit(CoreEvent::Cache(CacheEvent::Progress {
//!         item_id: "https://example.com/watch?v=1".to_string(),
//!         percent: Some(42),
//!     }))
//!     .ok();
//!
//! let event = stream.recv().await.unwrap();
//! assert!(matches!(event, CoreEvent::Cache(_)));
//! # }
//! ```
//!
//! ## Error Handling
//!
//! - **`RecvError::Lagged(n)`**: Subscriber was too slow and missed `n` events.
//!   Progress events are the usual culprit; the subscriber can keep reading.
//! - **`RecvError::Closed`**: All senders have been dropped. This indicates shutdown.

use bridge_traits::playlist::CacheState;
use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::broadcast;

// Re-export commonly used types
pub use tokio::sync::broadcast::error::{RecvError, SendError};
pub use tokio::sync::broadcast::Receiver;

/// Default buffer size for the event bus channel.
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 100;

// ============================================================================
// Core Event Types
// ============================================================================

/// Top-level event enum encompassing all event categories.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "payload")]
pub enum CoreEvent {
    /// Download cache events
    Cache(CacheEvent),
    /// Media acquisition events
    Media(MediaEvent),
}

impl CoreEvent {
    /// Returns a human-readable description of the event.
    pub fn description(&self) -> &str {
        match self {
            CoreEvent::Cache(e) => e.description(),
            CoreEvent::Media(e) => e.description(),
        }
    }

    /// Returns the severity level of the event.
    pub fn severity(&self) -> EventSeverity {
        match self {
            CoreEvent::Cache(CacheEvent::DownloadFailed { .. }) => EventSeverity::Error,
            CoreEvent::Media(MediaEvent::Failed { .. }) => EventSeverity::Error,
            CoreEvent::Media(MediaEvent::Expired { .. }) => EventSeverity::Warning,
            CoreEvent::Cache(CacheEvent::StateChanged { .. }) => EventSeverity::Info,
            CoreEvent::Media(MediaEvent::Loaded { .. }) => EventSeverity::Info,
            _ => EventSeverity::Debug,
        }
    }

    /// Identity of the playlist item the event is about.
    pub fn item_id(&self) -> &str {
        match self {
            CoreEvent::Cache(CacheEvent::StateChanged { item_id, .. })
            | CoreEvent::Cache(CacheEvent::Progress { item_id, .. })
            | CoreEvent::Cache(CacheEvent::DownloadFailed { item_id, .. })
            | CoreEvent::Media(MediaEvent::Loaded { item_id, .. })
            | CoreEvent::Media(MediaEvent::Expired { item_id })
            | CoreEvent::Media(MediaEvent::Failed { item_id, .. })
            | CoreEvent::Media(MediaEvent::SourceUpdated { item_id }) => item_id,
        }
    }
}

/// Event severity levels for filtering and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventSeverity {
    /// Debug-level events (verbose)
    Debug,
    /// Informational events
    Info,
    /// Warning events
    Warning,
    /// Error events
    Error,
}

// ============================================================================
// Cache Events
// ============================================================================

/// Events emitted by the download cache.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum CacheEvent {
    /// An item moved along the cache state machine.
    StateChanged {
        item_id: String,
        state: CacheState,
    },
    /// Download progress.
    Progress {
        item_id: String,
        /// `None` while the total length is unknown.
        percent: Option<u8>,
    },
    /// A download failed and the item rolled back to not cached.
    DownloadFailed { item_id: String, message: String },
}

impl CacheEvent {
    fn description(&self) -> &str {
        match self {
            CacheEvent::StateChanged { .. } => "Cache state changed",
            CacheEvent::Progress { .. } => "Download progress",
            CacheEvent::DownloadFailed { .. } => "Download failed",
        }
    }
}

// ============================================================================
// Media Events
// ============================================================================

/// How a ready item is being served.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaRoute {
    /// From the local download cache
    Cache,
    /// Streamed from the item's stored source URL
    Stream,
    /// Streamed from a URL freshly resolved by page extraction
    Extracted,
}

/// Outcomes of media acquisition.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum MediaEvent {
    /// Media is ready to hand to the decoder.
    Loaded { item_id: String, route: MediaRoute },
    /// The stored source URL no longer works and extraction found nothing.
    Expired { item_id: String },
    /// Media could not be loaded.
    Failed { item_id: String, reason: String },
    /// Page extraction produced a new source URL for the item.
    SourceUpdated { item_id: String },
}

impl MediaEvent {
    fn description(&self) -> &str {
        match self {
            MediaEvent::Loaded { .. } => "Media ready",
            MediaEvent::Expired { .. } => "Media source expired",
            MediaEvent::Failed { .. } => "Media failed to load",
            MediaEvent::SourceUpdated { .. } => "Media source updated",
        }
    }
}

// ============================================================================
// Event Bus
// ============================================================================

/// Central event bus for publishing and subscribing to core events.
///
/// Cloning is cheap; clones share the same channel.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<CoreEvent>,
}

impl EventBus {
    /// Creates a new event bus with the specified buffer size.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publishes an event to all subscribers.
    ///
    /// Returns the number of subscribers that received the event, or an error
    /// if there are no active subscribers.
    pub fn emit(&self, event: CoreEvent) -> Result<usize, SendError<CoreEvent>> {
        self.sender.send(event)
    }

    /// Creates a new subscriber. Past events are not replayed.
    pub fn subscribe(&self) -> Receiver<CoreEvent> {
        self.sender.subscribe()
    }

    /// Returns the number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUFFER_SIZE)
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

// ============================================================================
// Event Stream Wrapper
// ============================================================================

/// Type alias for event filter functions.
type EventFilter = Box<dyn Fn(&CoreEvent) -> bool + Send + Sync>;

/// A wrapper around `broadcast::Receiver` with optional filtering.
///
/// ```rust
/// use core_runtime::events::{CoreEvent, EventBus, EventStream};
///
/// let event_bus = EventBus::new(100);
/// let item = "https://example.com/watch?v=1".to_string();
/// let stream = EventStream::new(event_bus.subscribe())
///     .filter(move |event| event.item_id() == item);
/// ```
pub struct EventStream {
    receiver: Receiver<CoreEvent>,
    filter: Option<EventFilter>,
}

impl EventStream {
    /// Creates a new event stream from a receiver.
    pub fn new(receiver: Receiver<CoreEvent>) -> Self {
        Self {
            receiver,
            filter: None,
        }
    }

    /// Adds a filter function to this stream.
    pub fn filter<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&CoreEvent) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Box::new(predicate));
        self
    }

    fn matches(&self, event: &CoreEvent) -> bool {
        self.filter.as_ref().map_or(true, |filter| filter(event))
    }

    /// Receives the next event that passes the filter (if any).
    ///
    /// # Errors
    ///
    /// Returns `RecvError::Lagged(n)` if the subscriber fell behind by `n` events.
    /// Returns `RecvError::Closed` if all senders have been dropped.
    pub async fn recv(&mut self) -> Result<CoreEvent, RecvError> {
        loop {
            let event = self.receiver.recv().await?;
            if self.matches(&event) {
                return Ok(event);
            }
        }
    }

    /// Attempts to receive an event without blocking.
    ///
    /// Returns `None` if no events are currently available.
    pub fn try_recv(&mut self) -> Option<Result<CoreEvent, RecvError>> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => {
                    if self.matches(&event) {
                        return Some(Ok(event));
                    }
                }
                Err(broadcast::error::TryRecvError::Empty) => return None,
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    return Some(Err(RecvError::Lagged(n)))
                }
                Err(broadcast::error::TryRecvError::Closed) => return Some(Err(RecvError::Closed)),
            }
        }
    }
}

impl fmt::Debug for EventStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventStream")
            .field("has_filter", &self.filter.is_some())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn progress(item: &str, percent: Option<u8>) -> CoreEvent {
        CoreEvent::Cache(CacheEvent::Progress {
            item_id: item.to_string(),
            percent,
        })
    }

    #[tokio::test]
    async fn test_event_bus_creation() {
        let bus = EventBus::new(10);
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_event_emission_no_subscribers() {
        let bus = EventBus::new(10);
        assert!(bus.emit(progress("a", Some(1))).is_err());
    }

    #[tokio::test]
    async fn test_multiple_subscribers_receive_same_event() {
        let bus = EventBus::new(10);
        let mut sub1 = bus.subscribe();
        let mut sub2 = bus.subscribe();

        let event = CoreEvent::Cache(CacheEvent::StateChanged {
            item_id: "item-1".to_string(),
            state: CacheState::Downloading,
        });

        assert_eq!(bus.emit(event.clone()).unwrap(), 2);
        assert_eq!(sub1.recv().await.unwrap(), event);
        assert_eq!(sub2.recv().await.unwrap(), event);
    }

    #[tokio::test]
    async fn test_event_stream_with_filter() {
        let bus = EventBus::new(10);
        let mut stream = EventStream::new(bus.subscribe())
            .filter(|event| matches!(event, CoreEvent::Media(_)));

        bus.emit(progress("item-1", Some(10))).ok();

        let loaded = CoreEvent::Media(MediaEvent::Loaded {
            item_id: "item-1".to_string(),
            route: MediaRoute::Stream,
        });
        bus.emit(loaded.clone()).ok();

        assert_eq!(stream.recv().await.unwrap(), loaded);
    }

    #[tokio::test]
    async fn test_lagged_subscriber() {
        let bus = EventBus::new(2);
        let mut sub = bus.subscribe();

        for i in 0..5u8 {
            bus.emit(progress("item-1", Some(i))).ok();
        }

        let result = sub.recv().await;
        assert!(matches!(result, Err(RecvError::Lagged(_))));
    }

    #[test]
    fn test_event_severity() {
        let failed = CoreEvent::Cache(CacheEvent::DownloadFailed {
            item_id: "a".to_string(),
            message: "boom".to_string(),
        });
        assert_eq!(failed.severity(), EventSeverity::Error);

        let expired = CoreEvent::Media(MediaEvent::Expired {
            item_id: "a".to_string(),
        });
        assert_eq!(expired.severity(), EventSeverity::Warning);

        assert_eq!(progress("a", None).severity(), EventSeverity::Debug);
    }

    #[test]
    fn test_event_description_and_item_id() {
        let event = CoreEvent::Media(MediaEvent::SourceUpdated {
            item_id: "page-1".to_string(),
        });
        assert_eq!(event.description(), "Media source updated");
        assert_eq!(event.item_id(), "page-1");
    }

    #[tokio::test]
    async fn test_concurrent_publishers() {
        let bus = EventBus::new(100);
        let mut sub = bus.subscribe();

        let bus1 = bus.clone();
        let bus2 = bus.clone();

        let handle1 = tokio::spawn(async move {
            for i in 0..10u8 {
                bus1.emit(progress("item-1", Some(i * 10))).ok();
            }
        });
        let handle2 = tokio::spawn(async move {
            for _ in 0..10 {
                bus2.emit(progress("item-2", None)).ok();
            }
        });

        handle1.await.ok();
        handle2.await.ok();

        let mut count = 0;
        while sub.try_recv().is_ok() {
            count += 1;
        }
        assert_eq!(count, 20);
    }

    #[test]
    fn test_event_serialization() {
        let event = CoreEvent::Cache(CacheEvent::StateChanged {
            item_id: "https://example.com/p".to_string(),
            state: CacheState::Cached,
        });

        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"type\":\"Cache\""));
        assert!(json.contains("\"state\":\"cached\""));

        let deserialized: CoreEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(deserialized, event);
    }

    #[tokio::test]
    async fn test_try_recv_empty() {
        let bus = EventBus::new(10);
        let mut stream = EventStream::new(bus.subscribe());
        assert!(stream.try_recv().is_none());
    }

    #[tokio::test]
    async fn test_try_recv_skips_filtered_events() {
        let bus = EventBus::new(10);
        let mut stream =
            EventStream::new(bus.subscribe()).filter(|event| event.item_id() == "wanted");

        bus.emit(progress("other", Some(5))).ok();
        bus.emit(progress("wanted", Some(6))).ok();

        let received = stream.try_recv().unwrap().unwrap();
        assert_eq!(received, progress("wanted", Some(6)));
        assert!(stream.try_recv().is_none());
    }
}
