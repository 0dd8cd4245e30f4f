use crate::models::{RenderedRow, RowKey, RowRecord};
use crate::scrapers::error::{AccessError, CollectError};
use crate::scrapers::traits::{PageAccessor, RowExtractor};
use crate::scrapers::types::{CollectStats, CollectorConfig, StopReason};
use std::collections::HashSet;
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Scrolls a virtualized table and collects every row once, in discovery order.
///
/// All progress (visited keys and collected rows) lives in the collector, so it
/// survives retries, cancellation and a dropped run future. Hand the rows over
/// with [`RowCollector::into_rows`] once the run ends, however it ended.
pub struct RowCollector<E> {
    config: CollectorConfig,
    extractor: E,
    headers: Option<Vec<String>>,
    visited: HashSet<RowKey>,
    rows: Vec<RowRecord>,
    last_key: Option<RowKey>,
    stats: CollectStats,
}

impl<E: RowExtractor> RowCollector<E> {
    pub fn new(config: CollectorConfig, extractor: E) -> Self {
        Self {
            config,
            extractor,
            headers: None,
            visited: HashSet::new(),
            rows: Vec::new(),
            last_key: None,
            stats: CollectStats::default(),
        }
    }

    /// Rows collected so far, in discovery order
    pub fn rows(&self) -> &[RowRecord] {
        &self.rows
    }

    pub fn stats(&self) -> CollectStats {
        CollectStats {
            rows: self.rows.len(),
            ..self.stats
        }
    }

    pub fn into_rows(self) -> Vec<RowRecord> {
        self.rows
    }

    /// Collect until the table stops revealing rows
    pub async fn run<A: PageAccessor>(
        &mut self,
        accessor: &mut A,
    ) -> Result<StopReason, CollectError> {
        self.run_inner(accessor, None).await
    }

    /// Like [`run`](Self::run), but stops at the next iteration boundary once
    /// `cancel` holds `true`
    pub async fn run_until_cancelled<A: PageAccessor>(
        &mut self,
        accessor: &mut A,
        cancel: &watch::Receiver<bool>,
    ) -> Result<StopReason, CollectError> {
        self.run_inner(accessor, Some(cancel)).await
    }

    async fn run_inner<A: PageAccessor>(
        &mut self,
        accessor: &mut A,
        cancel: Option<&watch::Receiver<bool>>,
    ) -> Result<StopReason, CollectError> {
        self.load_headers(accessor).await?;

        let stall_threshold = self.config.stall_threshold.max(1);
        let mut stalls = 0;

        loop {
            if cancel.is_some_and(|rx| *rx.borrow()) {
                info!("Collection cancelled after {} rows", self.rows.len());
                return Ok(StopReason::Cancelled);
            }
            if self.stats.iterations >= self.config.max_iterations {
                warn!(
                    "Hit iteration ceiling ({}) with {} rows collected",
                    self.config.max_iterations,
                    self.rows.len()
                );
                return Ok(StopReason::IterationLimit);
            }
            self.stats.iterations += 1;

            let added = self.harvest_with_retry(accessor).await?;
            if added > 0 {
                stalls = 0;
                debug!("+{} rows ({} total)", added, self.rows.len());
            } else {
                stalls += 1;
                debug!("No new rows ({}/{} stalls)", stalls, stall_threshold);
                if stalls >= stall_threshold {
                    if self.advance_page(accessor).await? {
                        stalls = 0;
                        self.pause_after_move().await;
                        continue;
                    }
                    info!(
                        "No new rows after {} reads, table exhausted with {} rows",
                        stalls,
                        self.rows.len()
                    );
                    return Ok(StopReason::Exhausted);
                }
            }

            let moved = self.scroll_with_retry(accessor).await?;
            self.stats.scrolls += 1;
            if !moved {
                debug!("Viewport did not move, probably at the bottom");
            }

            self.pause_after_move().await;
        }
    }

    /// Let the virtual list render after the viewport or page changed
    async fn pause_after_move(&self) {
        let settle = self.config.scroll_settle();
        if !settle.is_zero() {
            tokio::time::sleep(settle).await;
        }
    }

    /// Follow the pager once scrolling is exhausted, if enabled
    async fn advance_page<A: PageAccessor>(
        &mut self,
        accessor: &mut A,
    ) -> Result<bool, CollectError> {
        if !self.config.follow_pagination || self.stats.pages + 1 >= self.config.max_pages {
            return Ok(false);
        }

        let mut failures = 0;
        let moved = loop {
            match accessor.next_page().await {
                Ok(moved) => break moved,
                Err(err) => self.on_access_error(err, &mut failures, "paging").await?,
            }
        };
        if moved {
            self.stats.pages += 1;
            info!(
                "Moved to page {} with {} rows so far",
                self.stats.pages + 1,
                self.rows.len()
            );
        }
        Ok(moved)
    }

    async fn load_headers<A: PageAccessor>(&mut self, accessor: &mut A) -> Result<(), CollectError> {
        if self.headers.is_some() {
            return Ok(());
        }

        let mut failures = 0;
        let headers = loop {
            match accessor.column_headers().await {
                Ok(headers) => break headers,
                Err(err) => self.on_access_error(err, &mut failures, "reading headers").await?,
            }
        };

        if headers.is_empty() {
            info!("Table declares no headers, using generic column names");
        } else {
            info!("Table columns: {}", headers.join(", "));
        }
        self.headers = Some(headers);
        Ok(())
    }

    async fn harvest_with_retry<A: PageAccessor>(
        &mut self,
        accessor: &mut A,
    ) -> Result<usize, CollectError> {
        let mut failures = 0;
        loop {
            match self.harvest(accessor).await {
                Ok(added) => return Ok(added),
                Err(err) => self.on_access_error(err, &mut failures, "reading rows").await?,
            }
        }
    }

    async fn scroll_with_retry<A: PageAccessor>(
        &mut self,
        accessor: &mut A,
    ) -> Result<bool, CollectError> {
        let mut failures = 0;
        loop {
            match accessor.scroll_forward().await {
                Ok(moved) => return Ok(moved),
                Err(err) => self.on_access_error(err, &mut failures, "scrolling").await?,
            }
        }
    }

    /// One read of the rendered window. Rows appended before an error stay
    /// collected, so a retry only picks up what is still missing.
    async fn harvest<A: PageAccessor>(&mut self, accessor: &mut A) -> Result<usize, AccessError> {
        let rendered = accessor.list_visible_rows().await?;
        let mut added = 0;

        for (position, row) in rendered.into_iter().enumerate() {
            if row.is_empty() {
                continue;
            }
            let key = row.key(self.config.key_strategy);
            if self.visited.contains(&key) {
                continue;
            }

            let (row, settled_key) = self.settle(accessor, row, &key, position).await?;
            if self.visited.contains(&settled_key) {
                continue;
            }
            // settle only changes the key for the same row with cells filled in,
            // so the half-loaded rendering is an alias of the row extracted here
            let alias = (settled_key != key).then_some(key);
            let key = settled_key;

            let headers = self.headers.as_deref().unwrap_or_default();
            let record = self.extractor.extract(&row, &key, headers)?;
            if let Some(alias) = alias {
                self.visited.insert(alias);
            }
            self.visited.insert(key.clone());
            self.rows.push(record);
            self.last_key = Some(key);
            added += 1;
        }

        Ok(added)
    }

    /// Give a half-rendered row one more chance to fill in
    async fn settle<A: PageAccessor>(
        &self,
        accessor: &mut A,
        row: RenderedRow,
        key: &RowKey,
        position: usize,
    ) -> Result<(RenderedRow, RowKey), AccessError> {
        let delay = self.config.settle_delay();
        let columns = self.headers.as_ref().map_or(0, Vec::len);
        if delay.is_zero() || !row.is_partial(columns) {
            return Ok((row, key.clone()));
        }

        debug!("Row {} looks partially loaded, re-reading", key);
        tokio::time::sleep(delay).await;

        match accessor.reread_row(position).await? {
            Some(fresh) if row.is_same_row(&fresh) => {
                let fresh_key = fresh.key(self.config.key_strategy);
                Ok((fresh, fresh_key))
            }
            _ => {
                debug!("Window moved before {} settled, keeping the first read", key);
                Ok((row, key.clone()))
            }
        }
    }

    async fn on_access_error(
        &mut self,
        err: AccessError,
        failures: &mut u32,
        what: &str,
    ) -> Result<(), CollectError> {
        if let AccessError::Structural(detail) = err {
            return Err(CollectError::Structural {
                detail,
                rows_collected: self.rows.len(),
                last_key: self.last_key.clone(),
            });
        }

        *failures += 1;
        if *failures > self.config.max_retries {
            return Err(CollectError::RetriesExhausted {
                attempts: *failures,
                rows_collected: self.rows.len(),
                last_key: self.last_key.clone(),
                source: err,
            });
        }

        warn!(
            "{} failed ({}), retry {}/{}",
            what, err, failures, self.config.max_retries
        );
        self.stats.retries += 1;
        let delay = self.config.retry_delay();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::KeyStrategy;
    use crate::scrapers::extract::HeaderExtractor;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    /// Replays a fixed list of viewport frames; scrolling advances one frame
    /// and sticks on the last one
    #[derive(Default)]
    struct ScriptedTable {
        headers: Vec<String>,
        frames: Vec<Vec<RenderedRow>>,
        position: usize,
        scrolls: usize,
        lists: usize,
        /// Errors returned by upcoming `list_visible_rows` calls, before any frame
        list_errors: VecDeque<AccessError>,
        /// Errors returned by upcoming `scroll_forward` calls
        scroll_errors: VecDeque<AccessError>,
        /// Errors returned by upcoming `reread_row` calls
        reread_errors: VecDeque<AccessError>,
        /// Replacement rows served by `reread_row`
        settled: Vec<RenderedRow>,
        /// Frames of the pages behind the "next" button
        next_pages: VecDeque<Vec<Vec<RenderedRow>>>,
    }

    impl ScriptedTable {
        fn new(frames: Vec<Vec<RenderedRow>>) -> Self {
            Self {
                frames,
                ..Default::default()
            }
        }
    }

    #[async_trait]
    impl PageAccessor for ScriptedTable {
        async fn column_headers(&mut self) -> Result<Vec<String>, AccessError> {
            Ok(self.headers.clone())
        }

        async fn list_visible_rows(&mut self) -> Result<Vec<RenderedRow>, AccessError> {
            self.lists += 1;
            if let Some(err) = self.list_errors.pop_front() {
                return Err(err);
            }
            Ok(self.frames.get(self.position).cloned().unwrap_or_default())
        }

        async fn scroll_forward(&mut self) -> Result<bool, AccessError> {
            self.scrolls += 1;
            if let Some(err) = self.scroll_errors.pop_front() {
                return Err(err);
            }
            if self.position + 1 < self.frames.len() {
                self.position += 1;
                Ok(true)
            } else {
                Ok(false)
            }
        }

        async fn reread_row(&mut self, position: usize) -> Result<Option<RenderedRow>, AccessError> {
            if let Some(err) = self.reread_errors.pop_front() {
                return Err(err);
            }
            if self.settled.is_empty() {
                let rows = self.list_visible_rows().await?;
                return Ok(rows.into_iter().nth(position));
            }
            Ok(Some(self.settled.remove(0)))
        }

        async fn next_page(&mut self) -> Result<bool, AccessError> {
            match self.next_pages.pop_front() {
                Some(frames) => {
                    self.frames = frames;
                    self.position = 0;
                    Ok(true)
                }
                None => Ok(false),
            }
        }
    }

    /// Counts extractor invocations per run
    #[derive(Clone, Default)]
    struct CountingExtractor {
        calls: Arc<AtomicUsize>,
    }

    impl RowExtractor for CountingExtractor {
        fn extract(
            &self,
            row: &RenderedRow,
            key: &RowKey,
            headers: &[String],
        ) -> Result<RowRecord, AccessError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            HeaderExtractor.extract(row, key, headers)
        }
    }

    fn row(id: &str) -> RenderedRow {
        RenderedRow::new(None, vec![id.to_string(), format!("item {id}")])
    }

    fn rows(ids: &[&str]) -> Vec<RenderedRow> {
        ids.iter().map(|id| row(id)).collect()
    }

    fn fast_config(stall_threshold: u32) -> CollectorConfig {
        CollectorConfig {
            stall_threshold,
            settle_delay_ms: 0,
            scroll_settle_ms: 0,
            retry_delay_ms: 0,
            key_strategy: KeyStrategy::FirstCell,
            ..CollectorConfig::default()
        }
    }

    fn ids(records: &[RowRecord]) -> Vec<String> {
        records.iter().map(|r| r.key.to_string()).collect()
    }

    #[tokio::test]
    async fn five_rows_two_at_a_time_with_rerenders() {
        let mut table = ScriptedTable::new(vec![
            rows(&["1", "2"]),
            rows(&["3", "4"]),
            rows(&["3", "4"]),
            rows(&["3", "4", "5"]),
        ]);
        let extractor = CountingExtractor::default();
        let calls = extractor.calls.clone();
        let mut collector = RowCollector::new(fast_config(2), extractor);

        let reason = collector.run(&mut table).await.unwrap();

        assert_eq!(reason, StopReason::Exhausted);
        assert_eq!(ids(collector.rows()), vec!["1", "2", "3", "4", "5"]);
        assert_eq!(calls.load(Ordering::SeqCst), 5);
        // frames 1..=4 plus two stalled reads at the bottom
        assert_eq!(table.lists, 6);
        assert_eq!(table.scrolls, 5);
        assert_eq!(collector.stats().rows, 5);
    }

    #[tokio::test]
    async fn overlapping_windows_keep_first_discovery_order() {
        let mut table = ScriptedTable::new(vec![
            rows(&["a", "b", "c"]),
            rows(&["b", "c", "d"]),
            rows(&["a", "d", "e"]),
            rows(&["e", "c", "f"]),
        ]);
        let extractor = CountingExtractor::default();
        let calls = extractor.calls.clone();
        let mut collector = RowCollector::new(fast_config(3), extractor);

        collector.run(&mut table).await.unwrap();

        assert_eq!(ids(collector.rows()), vec!["a", "b", "c", "d", "e", "f"]);
        assert_eq!(calls.load(Ordering::SeqCst), 6);
    }

    #[tokio::test]
    async fn duplicates_within_one_window_are_collapsed() {
        let mut table = ScriptedTable::new(vec![rows(&["x", "x", "y"])]);
        let mut collector = RowCollector::new(fast_config(1), CountingExtractor::default());

        collector.run(&mut table).await.unwrap();

        assert_eq!(ids(collector.rows()), vec!["x", "y"]);
    }

    #[tokio::test]
    async fn empty_table_terminates_after_threshold() {
        let mut table = ScriptedTable::new(vec![]);
        let mut collector = RowCollector::new(fast_config(3), CountingExtractor::default());

        let reason = collector.run(&mut table).await.unwrap();

        assert_eq!(reason, StopReason::Exhausted);
        assert!(collector.rows().is_empty());
        assert_eq!(table.lists, 3);
        assert_eq!(table.scrolls, 2);
    }

    #[tokio::test]
    async fn spacer_rows_are_ignored() {
        let mut table = ScriptedTable::new(vec![vec![RenderedRow::default(), row("1")]]);
        let mut collector = RowCollector::new(fast_config(1), CountingExtractor::default());

        collector.run(&mut table).await.unwrap();

        assert_eq!(ids(collector.rows()), vec!["1"]);
    }

    #[tokio::test]
    async fn dom_ids_distinguish_identical_rows() {
        let twin = |id: &str| RenderedRow::new(Some(id.into()), vec!["same".into()]);
        let mut table = ScriptedTable::new(vec![vec![twin("1"), twin("2")], vec![twin("2"), twin("3")]]);
        let mut collector = RowCollector::new(fast_config(1), CountingExtractor::default());

        collector.run(&mut table).await.unwrap();

        assert_eq!(ids(collector.rows()), vec!["id:1", "id:2", "id:3"]);
    }

    #[tokio::test]
    async fn iteration_ceiling_stops_endless_tables() {
        let frames = (0..50).map(|i| rows(&[i.to_string().as_str()])).collect();
        let mut table = ScriptedTable::new(frames);
        let config = CollectorConfig {
            max_iterations: 10,
            ..fast_config(2)
        };
        let mut collector = RowCollector::new(config, CountingExtractor::default());

        let reason = collector.run(&mut table).await.unwrap();

        assert_eq!(reason, StopReason::IterationLimit);
        assert_eq!(collector.rows().len(), 10);
    }

    #[tokio::test]
    async fn transient_errors_are_retried_without_losing_progress() {
        let mut table = ScriptedTable::new(vec![rows(&["1", "2"]), rows(&["3"])]);
        table.list_errors = VecDeque::from(vec![
            AccessError::Transient("stale element".into()),
            AccessError::Transient("stale element".into()),
        ]);
        let extractor = CountingExtractor::default();
        let calls = extractor.calls.clone();
        let mut collector = RowCollector::new(fast_config(1), extractor);

        collector.run(&mut table).await.unwrap();

        assert_eq!(ids(collector.rows()), vec!["1", "2", "3"]);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(collector.stats().retries, 2);
    }

    #[tokio::test]
    async fn exhausted_retries_report_progress() {
        let mut table = ScriptedTable::new(vec![rows(&["1", "2"]), rows(&["3"])]);
        let mut collector = RowCollector::new(fast_config(3), CountingExtractor::default());

        // First frame reads fine, then every read fails
        collector.harvest_with_retry(&mut table).await.unwrap();
        table.scroll_forward().await.unwrap();
        table.list_errors = (0..10)
            .map(|_| AccessError::Transient("execution context was destroyed".into()))
            .collect();

        let err = collector.run(&mut table).await.unwrap_err();

        match err {
            CollectError::RetriesExhausted {
                attempts,
                rows_collected,
                ref last_key,
                ..
            } => {
                assert_eq!(attempts, 4);
                assert_eq!(rows_collected, 2);
                assert_eq!(last_key.as_ref().map(RowKey::as_str), Some("2"));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(ids(&collector.into_rows()), vec!["1", "2"]);
    }

    #[tokio::test]
    async fn structural_mismatch_is_not_retried() {
        let mut table = ScriptedTable::new(vec![rows(&["1"])]);
        table.list_errors = VecDeque::from(vec![AccessError::Structural("no table".into())]);
        let mut collector = RowCollector::new(fast_config(3), CountingExtractor::default());

        let err = collector.run(&mut table).await.unwrap_err();

        assert!(matches!(err, CollectError::Structural { rows_collected: 0, .. }));
        assert_eq!(table.lists, 1);
    }

    #[tokio::test]
    async fn rows_wider_than_headers_abort_the_run() {
        let mut table = ScriptedTable::new(vec![rows(&["1"])]);
        table.headers = vec!["Id".into()];
        let mut collector = RowCollector::new(fast_config(3), CountingExtractor::default());

        let err = collector.run(&mut table).await.unwrap_err();

        assert!(matches!(err, CollectError::Structural { .. }));
    }

    #[tokio::test]
    async fn partial_rows_are_reread_once() {
        let mut table = ScriptedTable::new(vec![vec![
            RenderedRow::new(None, vec!["1".into(), String::new()]),
            row("2"),
        ]]);
        table.headers = vec!["Id".into(), "Name".into()];
        table.settled = vec![row("1")];
        let config = CollectorConfig {
            settle_delay_ms: 1,
            key_strategy: KeyStrategy::RowContent,
            ..fast_config(1)
        };
        let extractor = CountingExtractor::default();
        let calls = extractor.calls.clone();
        let mut collector = RowCollector::new(config, extractor);

        collector.run(&mut table).await.unwrap();

        let rows = collector.rows();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].get("Name"), Some("item 1"));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn shifted_window_does_not_swallow_partial_row() {
        let partial_a = RenderedRow::new(None, vec!["A".into(), String::new()]);
        let frame = vec![row("B"), partial_a];
        let mut table = ScriptedTable::new(vec![frame.clone(), frame]);
        table.headers = vec!["Id".into(), "Name".into()];
        // by the time A is re-read, B sits at its position
        table.settled = vec![row("B")];
        let config = CollectorConfig {
            settle_delay_ms: 1,
            key_strategy: KeyStrategy::RowContent,
            ..fast_config(2)
        };
        let extractor = CountingExtractor::default();
        let calls = extractor.calls.clone();
        let mut collector = RowCollector::new(config, extractor);

        collector.run(&mut table).await.unwrap();

        assert_eq!(ids(collector.rows()), vec!["B|item B", "A|"]);
        assert_eq!(collector.rows()[1].get("Name"), Some(""));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn transient_scroll_errors_are_retried() {
        let mut table = ScriptedTable::new(vec![rows(&["1", "2"]), rows(&["3"])]);
        table.scroll_errors = VecDeque::from(vec![
            AccessError::Transient("node detached".into()),
            AccessError::Transient("node detached".into()),
        ]);
        let mut collector = RowCollector::new(fast_config(1), CountingExtractor::default());

        let reason = collector.run(&mut table).await.unwrap();

        assert_eq!(reason, StopReason::Exhausted);
        assert_eq!(ids(collector.rows()), vec!["1", "2", "3"]);
        assert_eq!(collector.stats().retries, 2);
        assert_eq!(collector.stats().scrolls, 2);
    }

    #[tokio::test]
    async fn transient_reread_error_retries_the_read() {
        let mut table = ScriptedTable::new(vec![vec![
            row("0"),
            RenderedRow::new(None, vec!["A".into(), String::new()]),
        ]]);
        table.headers = vec!["Id".into(), "Name".into()];
        table.reread_errors = VecDeque::from(vec![AccessError::Transient("stale".into())]);
        table.settled = vec![row("A")];
        let config = CollectorConfig {
            settle_delay_ms: 1,
            ..fast_config(1)
        };
        let extractor = CountingExtractor::default();
        let calls = extractor.calls.clone();
        let mut collector = RowCollector::new(config, extractor);

        collector.run(&mut table).await.unwrap();

        assert_eq!(ids(collector.rows()), vec!["0", "A"]);
        assert_eq!(collector.rows()[1].get("Name"), Some("item A"));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(collector.stats().retries, 1);
    }

    #[tokio::test]
    async fn pagination_continues_after_the_last_scroll() {
        let mut table = ScriptedTable::new(vec![rows(&["1", "2"]), rows(&["3"])]);
        table.next_pages = VecDeque::from(vec![
            vec![rows(&["4"]), rows(&["4", "5"])],
            vec![rows(&["5", "6"])],
        ]);
        let config = CollectorConfig {
            follow_pagination: true,
            ..fast_config(2)
        };
        let mut collector = RowCollector::new(config, CountingExtractor::default());

        let reason = collector.run(&mut table).await.unwrap();

        assert_eq!(reason, StopReason::Exhausted);
        assert_eq!(ids(collector.rows()), vec!["1", "2", "3", "4", "5", "6"]);
        assert_eq!(collector.stats().pages, 2);
    }

    #[tokio::test]
    async fn pagination_respects_page_limit_and_default_off() {
        let next_pages = || VecDeque::from(vec![vec![rows(&["2"])], vec![rows(&["3"])]]);

        let mut table = ScriptedTable::new(vec![rows(&["1"])]);
        table.next_pages = next_pages();
        let mut collector = RowCollector::new(fast_config(1), CountingExtractor::default());
        collector.run(&mut table).await.unwrap();
        assert_eq!(ids(collector.rows()), vec!["1"]);

        let mut table = ScriptedTable::new(vec![rows(&["1"])]);
        table.next_pages = next_pages();
        let config = CollectorConfig {
            follow_pagination: true,
            max_pages: 2,
            ..fast_config(1)
        };
        let mut collector = RowCollector::new(config, CountingExtractor::default());
        collector.run(&mut table).await.unwrap();
        assert_eq!(ids(collector.rows()), vec!["1", "2"]);
        assert_eq!(collector.stats().pages, 1);
    }

    #[tokio::test]
    async fn cancellation_keeps_a_prefix_of_the_full_run() {
        let frames: Vec<_> = (0..20).map(|i| rows(&[i.to_string().as_str()])).collect();

        let mut full_table = ScriptedTable::new(frames.clone());
        let mut full = RowCollector::new(fast_config(2), CountingExtractor::default());
        full.run(&mut full_table).await.unwrap();
        let full = ids(full.rows());

        let (tx, rx) = watch::channel(true);
        let mut table = ScriptedTable::new(frames);
        let mut collector = RowCollector::new(fast_config(2), CountingExtractor::default());
        // Pre-cancelled: nothing is read at all
        assert_eq!(
            collector.run_until_cancelled(&mut table, &rx).await.unwrap(),
            StopReason::Cancelled
        );
        assert!(collector.rows().is_empty());

        tx.send(false).unwrap();
        for _ in 0..7 {
            collector.harvest_with_retry(&mut table).await.unwrap();
            table.scroll_forward().await.unwrap();
        }
        tx.send(true).unwrap();
        assert_eq!(
            collector.run_until_cancelled(&mut table, &rx).await.unwrap(),
            StopReason::Cancelled
        );

        let partial = ids(collector.rows());
        assert_eq!(partial.len(), 7);
        assert_eq!(partial[..], full[..partial.len()]);
    }

    #[tokio::test]
    async fn dropped_run_future_leaves_valid_rows() {
        let frames: Vec<_> = (0..100).map(|i| rows(&[i.to_string().as_str()])).collect();
        let mut table = ScriptedTable::new(frames);
        let config = CollectorConfig {
            scroll_settle_ms: 5,
            ..fast_config(2)
        };
        let mut collector = RowCollector::new(config, CountingExtractor::default());

        let outcome =
            tokio::time::timeout(Duration::from_millis(30), collector.run(&mut table)).await;

        assert!(outcome.is_err());
        let got = ids(collector.rows());
        assert!(got.len() < 100);
        let expected: Vec<String> = (0..got.len()).map(|i| i.to_string()).collect();
        assert_eq!(got, expected);
    }
}
