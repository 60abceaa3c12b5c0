//! # Range Fetcher
//!
//! Single-shot HTTP byte-range requests. Retry policy belongs to callers.

use crate::error::{PlaylistError, Result};
use bridge_traits::http::{HttpClient, HttpRequest, HttpResponse};
use bytes::Bytes;
use core_runtime::logging::redact_url;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument};

/// Bytes returned by one ranged fetch plus what the response said about the
/// resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedRange {
    /// Absolute offset of `bytes` within the resource
    pub offset: u64,
    pub bytes: Bytes,
    pub content_type: Option<String>,
    /// Total resource length, when the response revealed it
    pub total_length: Option<u64>,
    /// Whether `Accept-Ranges` listed `bytes`
    pub supports_ranges: bool,
}

/// Issues one ranged `GET` per call.
#[derive(Clone)]
pub struct RangeFetcher {
    http_client: Arc<dyn HttpClient>,
    timeout: Duration,
}

impl RangeFetcher {
    pub fn new(http_client: Arc<dyn HttpClient>, timeout: Duration) -> Self {
        Self {
            http_client,
            timeout,
        }
    }

    /// Fetch `[start, start + max(1, length))` of `url`.
    ///
    /// Any 2xx status is a success. Anything else, a transport error or a
    /// malformed `Content-Range` yields [`PlaylistError::InvalidResponse`].
    #[instrument(skip(self, url), fields(url = %redact_url(url)))]
    pub async fn fetch(&self, url: &str, start: u64, length: u64) -> Result<FetchedRange> {
        let request = HttpRequest::get(url)
            .header("Range", range_header(start, length))
            .timeout(self.timeout);

        let response = self
            .http_client
            .execute(request)
            .await
            .map_err(|e| PlaylistError::InvalidResponse(e.to_string()))?;

        let fetched = parse_response(response)?;
        debug!(
            offset = fetched.offset,
            len = fetched.bytes.len(),
            total = ?fetched.total_length,
            "Fetched range"
        );
        Ok(fetched)
    }
}

/// `Range` header value for a window. Zero-length windows fetch one byte.
pub fn range_header(start: u64, length: u64) -> String {
    let end = start.saturating_add(length.max(1) - 1);
    format!("bytes={}-{}", start, end)
}

fn parse_response(response: HttpResponse) -> Result<FetchedRange> {
    if !response.is_success() {
        return Err(PlaylistError::InvalidResponse(format!(
            "HTTP {}",
            response.status
        )));
    }

    let content_range = match response.header("content-range") {
        Some(value) => Some(parse_content_range(value).ok_or_else(|| {
            PlaylistError::InvalidResponse(format!("malformed Content-Range: {}", value))
        })?),
        None => None,
    };

    // A partial response must say where its bytes belong
    if response.status == 206 && content_range.is_none() {
        return Err(PlaylistError::InvalidResponse(
            "206 response without Content-Range".to_string(),
        ));
    }

    let content_length = response
        .header("content-length")
        .and_then(|value| value.trim().parse::<u64>().ok());

    // Content-Length of a partial response is the window size, not the total
    let (offset, total_length) = match content_range {
        Some(range) => (range.start, range.total),
        None => (0, content_length),
    };

    let supports_ranges = response
        .header("accept-ranges")
        .map(accepts_byte_ranges)
        .unwrap_or(false);

    Ok(FetchedRange {
        offset,
        content_type: response.header("content-type").map(str::to_string),
        total_length,
        supports_ranges,
        bytes: response.body,
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ContentRange {
    start: u64,
    total: Option<u64>,
}

/// Parse `bytes <start>-<end>/<total|*>`.
fn parse_content_range(value: &str) -> Option<ContentRange> {
    let value = value.trim();
    let (unit, spec) = value.split_once(char::is_whitespace)?;
    if !unit.eq_ignore_ascii_case("bytes") {
        return None;
    }

    let (range, total) = spec.trim().split_once('/')?;
    let (start, end) = range.trim().split_once('-')?;
    let start = start.trim().parse::<u64>().ok()?;
    let end = end.trim().parse::<u64>().ok()?;
    if end < start {
        return None;
    }

    let total = match total.trim() {
        "*" => None,
        digits => Some(digits.parse::<u64>().ok()?),
    };

    Some(ContentRange { start, total })
}

/// `Accept-Ranges` token match for `bytes`.
fn accepts_byte_ranges(value: &str) -> bool {
    value
        .split(',')
        .any(|token| token.trim().eq_ignore_ascii_case("bytes"))
}
