//! Acquisition configuration

use core_runtime::config::MediaSettings;
use std::time::Duration;

/// Default User-Agent sent with streamability probes.
pub const DEFAULT_PROBE_USER_AGENT: &str =
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko)";

/// Configuration for probing, ranged fetching and page extraction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcquisitionConfig {
    /// Hard timeout for a streamability probe (default: 10s)
    pub probe_timeout: Duration,

    /// Upper bound on one page-extraction attempt (default: 30s)
    pub extraction_timeout: Duration,

    /// Timeout for a single ranged fetch (default: 30s)
    pub fetch_timeout: Duration,

    /// User-Agent header sent with probes
    pub probe_user_agent: String,
}

impl Default for AcquisitionConfig {
    fn default() -> Self {
        Self {
            probe_timeout: Duration::from_secs(10),
            extraction_timeout: Duration::from_secs(30),
            fetch_timeout: Duration::from_secs(30),
            probe_user_agent: DEFAULT_PROBE_USER_AGENT.to_string(),
        }
    }
}

impl AcquisitionConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = timeout;
        self
    }

    pub fn with_extraction_timeout(mut self, timeout: Duration) -> Self {
        self.extraction_timeout = timeout;
        self
    }

    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    pub fn with_probe_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.probe_user_agent = user_agent.into();
        self
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.probe_timeout.is_zero() {
            return Err("probe_timeout must be greater than zero".to_string());
        }

        if self.extraction_timeout.is_zero() {
            return Err("extraction_timeout must be greater than zero".to_string());
        }

        if self.fetch_timeout.is_zero() {
            return Err("fetch_timeout must be greater than zero".to_string());
        }

        Ok(())
    }
}

impl From<&MediaSettings> for AcquisitionConfig {
    fn from(settings: &MediaSettings) -> Self {
        Self {
            probe_timeout: settings.probe_timeout,
            extraction_timeout: settings.extraction_timeout,
            fetch_timeout: settings.fetch_timeout,
            ..Self::default()
        }
    }
}
