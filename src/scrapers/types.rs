use crate::models::KeyStrategy;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Tuning knobs for the incremental row collector
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CollectorConfig {
    /// Consecutive reads without a new row before the table counts as fully read
    pub stall_threshold: u32,
    /// Wait before re-reading a row that looked partially loaded (0 disables)
    pub settle_delay_ms: u64,
    /// Wait after each scroll so the virtual list can render the next window
    pub scroll_settle_ms: u64,
    /// Retries of one read/scroll step on transient access errors
    pub max_retries: u32,
    /// Pause between retries
    pub retry_delay_ms: u64,
    /// Hard ceiling on loop iterations
    pub max_iterations: u32,
    /// Content key used for rows without a DOM identifier
    pub key_strategy: KeyStrategy,
    /// Click through to the next page once scrolling stops revealing rows
    pub follow_pagination: bool,
    /// Upper bound on pages visited, the first one included
    pub max_pages: u32,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            stall_threshold: 5,
            settle_delay_ms: 250,
            scroll_settle_ms: 200,
            max_retries: 3,
            retry_delay_ms: 500,
            max_iterations: 20_000,
            key_strategy: KeyStrategy::RowContent,
            follow_pagination: false,
            max_pages: 100,
        }
    }
}

impl CollectorConfig {
    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn scroll_settle(&self) -> Duration {
        Duration::from_millis(self.scroll_settle_ms)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

/// Why a collector run ended without an error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// Scrolling stopped revealing rows for `stall_threshold` reads and there
    /// was no further page to follow
    Exhausted,
    /// The caller asked to stop
    Cancelled,
    /// `max_iterations` reached
    IterationLimit,
}

/// Counters describing one run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CollectStats {
    pub iterations: u32,
    pub scrolls: u32,
    pub rows: usize,
    pub retries: u32,
    /// Pages advanced past the first
    pub pages: u32,
}
