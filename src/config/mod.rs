use crate::scrapers::browser::GridSelectors;
use crate::scrapers::types::CollectorConfig;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable naming an optional JSON config file
pub const CONFIG_ENV: &str = "TABLE_SCOUT_CONFIG";

/// Application settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    /// Page showing the table; also used to pick an already open tab
    pub table_url: Option<String>,
    /// DevTools websocket of a running (logged in) Chrome
    pub chrome_ws_url: Option<String>,
    pub headless: bool,
    /// Where the grid, its rows, cells and pager live
    pub selectors: GridSelectors,
    pub output_file: PathBuf,
    /// Where screenshots go when a run fails
    pub debug_dir: Option<PathBuf>,
    pub collector: CollectorConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            table_url: None,
            chrome_ws_url: None,
            headless: true,
            selectors: GridSelectors::default(),
            output_file: PathBuf::from("product_table.json"),
            debug_dir: Some(PathBuf::from("debug")),
            collector: CollectorConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load from `TABLE_SCOUT_CONFIG` (if set), then apply environment overrides
    pub fn load() -> Result<Self> {
        let mut config = match std::env::var(CONFIG_ENV) {
            Ok(path) if !path.is_empty() => Self::from_file(&path)?,
            _ => Self::default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        serde_json::from_str(&contents)
            .with_context(|| format!("Invalid config {}", path.display()))
    }

    /// Apply overrides from a variable lookup; empty values are ignored
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(url) = get("TABLE_URL") {
            self.table_url = Some(url);
        }
        if let Some(url) = get("CHROME_WS_URL") {
            self.chrome_ws_url = Some(url);
        }
        if let Some(flag) = get("HEADLESS") {
            self.headless = matches!(flag.to_lowercase().as_str(), "1" | "true" | "yes");
        }
        if let Some(selector) = get("TABLE_SELECTOR") {
            self.selectors.containers = vec![selector];
        }
        if let Some(selector) = get("ROW_SELECTOR") {
            self.selectors.rows = vec![selector];
        }
        if let Some(selector) = get("CELL_SELECTOR") {
            self.selectors.cells = vec![selector];
        }
        if let Some(selector) = get("NEXT_PAGE_SELECTOR") {
            self.selectors.next_page = Some(selector);
        }
        if let Some(flag) = get("FOLLOW_PAGINATION") {
            self.collector.follow_pagination =
                matches!(flag.to_lowercase().as_str(), "1" | "true" | "yes");
        }
        if let Some(path) = get("OUTPUT_FILE") {
            self.output_file = PathBuf::from(path);
        }
        if let Some(dir) = get("DEBUG_DIR") {
            self.debug_dir = Some(PathBuf::from(dir));
        }
        if let Some(n) = get("STALL_THRESHOLD") {
            self.collector.stall_threshold = n
                .parse()
                .with_context(|| format!("STALL_THRESHOLD must be a number, got {n:?}"))?;
        }
        if let Some(n) = get("MAX_RETRIES") {
            self.collector.max_retries = n
                .parse()
                .with_context(|| format!("MAX_RETRIES must be a number, got {n:?}"))?;
        }
        Ok(())
    }
}
