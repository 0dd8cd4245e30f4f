use crate::models::{RenderedRow, RowKey, RowRecord};
use crate::scrapers::error::AccessError;
use anyhow::Result;
use async_trait::async_trait;

/// Read and scroll access to a lazily rendered table
/// This keeps the collector independent of the browser driver behind it
#[async_trait]
pub trait PageAccessor: Send {
    /// Column names declared by the table header, possibly empty
    async fn column_headers(&mut self) -> Result<Vec<String>, AccessError>;

    /// Rows currently rendered in the viewport, top to bottom
    async fn list_visible_rows(&mut self) -> Result<Vec<RenderedRow>, AccessError>;

    /// Scroll the table viewport one increment; `false` when nothing moved
    async fn scroll_forward(&mut self) -> Result<bool, AccessError>;

    /// Move to the next page of a paginated table; `false` when there is none
    async fn next_page(&mut self) -> Result<bool, AccessError> {
        Ok(false)
    }

    /// Read the row at `position` of the last listing again, `None` if the
    /// window shrank meanwhile. The caller checks it is still the same row.
    async fn reread_row(&mut self, position: usize) -> Result<Option<RenderedRow>, AccessError> {
        let rows = self.list_visible_rows().await?;
        Ok(rows.into_iter().nth(position))
    }
}

/// Turns a rendered row into a record. Called at most once per row key.
pub trait RowExtractor: Send + Sync {
    fn extract(
        &self,
        row: &RenderedRow,
        key: &RowKey,
        headers: &[String],
    ) -> Result<RowRecord, AccessError>;
}

/// Destination for the collected rows
#[async_trait]
pub trait RowSink: Send {
    async fn accept(&mut self, rows: &[RowRecord]) -> Result<()>;

    /// Get the name of the sink, for logging
    fn sink_name(&self) -> &'static str;
}
