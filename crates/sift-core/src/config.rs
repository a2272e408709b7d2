//! Session timing configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::FilterError;
use crate::watcher::RetryPolicy;

/// Delay between container lookups before back-off kicks in.
pub const DEFAULT_RETRY_DELAY_MS: u64 = 500;

/// Wait after a save click before re-reading the toggle. The host pages
/// update the toggle asynchronously; shorter waits read the old state.
pub const DEFAULT_SETTLE_DELAY_MS: u64 = 600;

/// Timing knobs for a filter session. Every field has a default, so `{}` is
/// a valid config.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub retry: RetryPolicy,
    pub settle_delay_ms: u64,
    /// Trailing-edge coalescing window for mutation-triggered passes.
    pub debounce_ms: Option<u64>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            settle_delay_ms: DEFAULT_SETTLE_DELAY_MS,
            debounce_ms: None,
        }
    }
}

impl SessionConfig {
    pub fn from_json(text: &str) -> Result<Self, FilterError> {
        Ok(serde_json::from_str(text)?)
    }

    #[inline]
    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn debounce(&self) -> Option<Duration> {
        self.debounce_ms.filter(|ms| *ms > 0).map(Duration::from_millis)
    }
}
