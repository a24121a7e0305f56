use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::models::certificate::DEFAULT_MAX_RETRIES;
use crate::models::enums::ProcessingStatus;

/// Upper bound chrono can represent as a second count.
const MAX_DELAY_SECS: i64 = i64::MAX / 1_000;

/// Runtime settings for the extraction job manager.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// Kill switch: when false nothing is scheduled or resumed, but
    /// persisted job state is left untouched.
    pub enabled: bool,
    pub max_retries: u32,
    pub base_delay_secs: u64,
    pub max_delay_secs: u64,
    /// A `processing` certificate whose last attempt is older than this is
    /// considered abandoned by a crashed worker.
    pub stale_processing_secs: u64,
    pub poll_interval_secs: u64,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_retries: DEFAULT_MAX_RETRIES,
            base_delay_secs: 30,
            max_delay_secs: 3600,
            stale_processing_secs: 900,
            poll_interval_secs: 5,
        }
    }
}

impl ExtractionConfig {
    /// Delay before the next attempt after a failure at `retry_count`:
    /// `2^(retry_count + 1) * base_delay_secs`, capped at `max_delay_secs`.
    pub fn retry_delay(&self, retry_count: u32) -> Duration {
        let factor = 2u64.checked_pow(retry_count.saturating_add(1)).unwrap_or(u64::MAX);
        let secs = factor
            .saturating_mul(self.base_delay_secs)
            .min(self.max_delay_secs);
        Duration::seconds(i64::try_from(secs).unwrap_or(MAX_DELAY_SECS).min(MAX_DELAY_SECS))
    }
}

/// Result of one `process` call.
#[derive(Debug, Clone, PartialEq)]
pub enum JobOutcome {
    Completed,
    Retrying {
        retry_count: u32,
        next_retry_at: DateTime<Utc>,
    },
    Failed {
        retry_count: u32,
    },
    /// Nothing to do: deleted, not in a startable state, or another
    /// worker won the transition.
    Skipped,
}

/// Status-change notification, emitted after the change is persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobEvent {
    pub certificate_id: String,
    pub status: ProcessingStatus,
    pub retry_count: u32,
    pub next_retry_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
}

/// What a resumption scan did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResumeReport {
    /// Queued to run now.
    pub started: usize,
    /// Retrying with a future `nextRetryAt`, queued for that instant.
    pub rearmed: usize,
    /// Abandoned `processing` records returned to `pending`.
    pub recovered: usize,
}

impl ResumeReport {
    pub fn total(&self) -> usize {
        self.started + self.rearmed + self.recovered
    }
}
