//! # Streamability Probe
//!
//! A cheap heuristic gate in front of the streaming path: one 2-byte ranged
//! `GET` decides whether a media URL can be handed to the decoder directly.
//! False negatives are fine, the orchestrator falls back to page extraction.

use crate::config::AcquisitionConfig;
use bridge_traits::http::{HttpClient, HttpRequest};
use core_runtime::logging::redact_url;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument};
use uuid::Uuid;

/// Header carrying a fresh correlation id per probe.
pub const SESSION_ID_HEADER: &str = "X-Playback-Session-Id";

/// Probe status rule: any 2xx, or a `302 Found`.
pub fn is_streamable_status(status: u16) -> bool {
    status == 302 || (200..=299).contains(&status)
}

/// Issues minimal ranged requests to test streamability.
#[derive(Clone)]
pub struct StreamabilityProbe {
    http_client: Arc<dyn HttpClient>,
    user_agent: String,
    timeout: Duration,
}

impl StreamabilityProbe {
    pub fn new(http_client: Arc<dyn HttpClient>, config: &AcquisitionConfig) -> Self {
        Self {
            http_client,
            user_agent: config.probe_user_agent.clone(),
            timeout: config.probe_timeout,
        }
    }

    /// Probe with the configured timeout.
    pub async fn probe(&self, url: &str) -> bool {
        self.probe_with_timeout(url, self.timeout).await
    }

    /// Probe `url`, treating transport errors and timeouts as not streamable.
    #[instrument(skip(self, url), fields(url = %redact_url(url)))]
    pub async fn probe_with_timeout(&self, url: &str, timeout: Duration) -> bool {
        let request = HttpRequest::get(url)
            .header("Range", "bytes=0-1")
            .header(SESSION_ID_HEADER, Uuid::new_v4().to_string())
            .header("User-Agent", self.user_agent.clone())
            .timeout(timeout);

        match tokio::time::timeout(timeout, self.http_client.execute(request)).await {
            Ok(Ok(response)) => {
                let streamable = is_streamable_status(response.status);
                debug!(status = response.status, streamable, "Probe completed");
                streamable
            }
            Ok(Err(e)) => {
                debug!(error = %e, "Probe request failed");
                false
            }
            Err(_) => {
                debug!(?timeout, "Probe timed out");
                false
            }
        }
    }
}
