//! Download cache configuration

use core_runtime::config::MediaSettings;
use std::time::Duration;

/// Configuration for the download cache manager.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    /// Number of concurrent downloads allowed (default: 2)
    pub max_concurrent_downloads: usize,

    /// Timeout for one download attempt (default: 300s)
    pub download_timeout: Duration,

    /// Attempts per download, including the first (default: 3)
    pub max_retry_attempts: u32,

    /// Verify the SHA-256 digest when reading cached media (default: true)
    pub verify_integrity: bool,

    /// Minimum percent change between two progress events (default: 1)
    pub progress_step_percent: u8,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_concurrent_downloads: 2,
            download_timeout: Duration::from_secs(300),
            max_retry_attempts: 3,
            verify_integrity: true,
            progress_step_percent: 1,
        }
    }
}

impl CacheConfig {
    /// Create a new cache configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set maximum concurrent downloads.
    pub fn with_max_concurrent_downloads(mut self, count: usize) -> Self {
        self.max_concurrent_downloads = count;
        self
    }

    /// Set download timeout.
    pub fn with_download_timeout(mut self, timeout: Duration) -> Self {
        self.download_timeout = timeout;
        self
    }

    /// Set attempts per download.
    pub fn with_max_retry_attempts(mut self, attempts: u32) -> Self {
        self.max_retry_attempts = attempts;
        self
    }

    /// Enable or disable read-time integrity checks.
    pub fn with_verify_integrity(mut self, enabled: bool) -> Self {
        self.verify_integrity = enabled;
        self
    }

    pub fn with_progress_step_percent(mut self, step: u8) -> Self {
        self.progress_step_percent = step;
        self
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.max_concurrent_downloads == 0 {
            return Err("max_concurrent_downloads must be at least 1".to_string());
        }

        if self.download_timeout.is_zero() {
            return Err("download_timeout must be greater than zero".to_string());
        }

        if self.max_retry_attempts == 0 {
            return Err("max_retry_attempts must be at least 1".to_string());
        }

        if self.progress_step_percent == 0 || self.progress_step_percent > 100 {
            return Err("progress_step_percent must be between 1 and 100".to_string());
        }

        Ok(())
    }
}

impl From<&MediaSettings> for CacheConfig {
    fn from(settings: &MediaSettings) -> Self {
        Self {
            max_concurrent_downloads: settings.max_concurrent_downloads,
            download_timeout: settings.download_timeout,
            max_retry_attempts: settings.max_retry_attempts,
            verify_integrity: settings.verify_integrity,
            progress_step_percent: settings.progress_step_percent,
        }
    }
}
