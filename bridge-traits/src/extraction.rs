//! Page media extraction.
//!
//! The host owns a loader (typically an off-screen web view) that opens a page
//! and waits for it to expose a playable media element. The core treats it as
//! a black box: give it a page URL, get back a media URL or nothing.

use async_trait::async_trait;

use crate::error::Result;

/// Media resolved from a page.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedMedia {
    /// Fresh, directly playable media URL
    pub media_url: String,
    /// Page title, if the loader picked one up
    pub title: Option<String>,
    /// Duration in seconds, if known
    pub duration_secs: Option<f64>,
}

impl ExtractedMedia {
    pub fn new(media_url: impl Into<String>) -> Self {
        Self {
            media_url: media_url.into(),
            title: None,
            duration_secs: None,
        }
    }
}

/// Page extraction collaborator
///
/// Implementations return `Ok(None)` when the page loaded but exposed no
/// playable media, and `Err` when the page could not be loaded at all.
#[async_trait]
pub trait PageMediaExtractor: Send + Sync {
    async fn extract(&self, page_url: &str) -> Result<Option<ExtractedMedia>>;
}
