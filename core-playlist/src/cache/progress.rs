//! Download progress tracking

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Progress of one download.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadProgress {
    /// Item identifier
    pub item_id: String,

    /// Expected size in bytes, when the server reported it
    pub total_bytes: Option<u64>,

    /// Bytes received so far in the current attempt
    pub downloaded_bytes: u64,

    pub started_at: DateTime<Utc>,
}

impl DownloadProgress {
    pub fn new(item_id: impl Into<String>) -> Self {
        Self {
            item_id: item_id.into(),
            total_bytes: None,
            downloaded_bytes: 0,
            started_at: Utc::now(),
        }
    }

    /// `min(100, 100 * received / total)`, or `None` while the total is
    /// unknown.
    pub fn percent(&self) -> Option<u8> {
        match self.total_bytes {
            Some(total) if total > 0 => {
                let percent = self.downloaded_bytes.saturating_mul(100) / total;
                Some(percent.min(100) as u8)
            }
            _ => None,
        }
    }

    pub fn update(&mut self, downloaded_bytes: u64) {
        self.downloaded_bytes = downloaded_bytes;
    }

    /// Start over for a new attempt.
    pub fn reset(&mut self, total_bytes: Option<u64>) {
        self.total_bytes = total_bytes;
        self.downloaded_bytes = 0;
    }

    pub fn is_complete(&self) -> bool {
        matches!(self.total_bytes, Some(total) if self.downloaded_bytes >= total)
    }
}

/// Decides which progress values are worth an event.
///
/// Percentages are reported once per `step`, plus the final 100. An
/// indeterminate value is reported once per attempt.
#[derive(Debug, Clone)]
pub struct ProgressThrottle {
    step: u8,
    last: Option<Option<u8>>,
}

impl ProgressThrottle {
    pub fn new(step: u8) -> Self {
        Self {
            step: step.max(1),
            last: None,
        }
    }

    /// Whether `percent` should be emitted. Records it if so.
    pub fn should_emit(&mut self, percent: Option<u8>) -> bool {
        let emit = match (self.last, percent) {
            (None, _) => true,
            (Some(None), None) => false,
            (Some(None), Some(_)) => true,
            (Some(Some(_)), None) => false,
            (Some(Some(last)), Some(current)) => {
                current >= last.saturating_add(self.step) || (current == 100 && last < 100)
            }
        };
        if emit {
            self.last = Some(percent);
        }
        emit
    }

    pub fn reset(&mut self) {
        self.last = None;
    }
}
