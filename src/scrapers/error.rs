use crate::models::RowKey;
use thiserror::Error;

/// Failure reported by a page accessor or row extractor
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AccessError {
    /// Stale element, destroyed execution context, timeout. Worth retrying.
    #[error("transient page access error: {0}")]
    Transient(String),

    /// The page does not have the shape we scrape (no table, extra cells)
    #[error("table structure mismatch: {0}")]
    Structural(String),
}

/// Why a collector run aborted. Both variants carry enough context to resume
/// investigating where the run stopped.
#[derive(Debug, Error)]
pub enum CollectError {
    #[error(
        "page access failed {attempts} times in a row after {rows_collected} rows (last key: {}): {source}",
        display_key(.last_key)
    )]
    RetriesExhausted {
        attempts: u32,
        rows_collected: usize,
        last_key: Option<RowKey>,
        #[source]
        source: AccessError,
    },

    #[error(
        "table structure mismatch after {rows_collected} rows (last key: {}): {detail}",
        display_key(.last_key)
    )]
    Structural {
        detail: String,
        rows_collected: usize,
        last_key: Option<RowKey>,
    },
}

impl CollectError {
    pub fn rows_collected(&self) -> usize {
        match self {
            CollectError::RetriesExhausted { rows_collected, .. }
            | CollectError::Structural { rows_collected, .. } => *rows_collected,
        }
    }
}

fn display_key(key: &Option<RowKey>) -> &str {
    key.as_ref().map(RowKey::as_str).unwrap_or("<none>")
}
