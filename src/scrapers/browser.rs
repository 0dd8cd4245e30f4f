use crate::models::RenderedRow;
use crate::scrapers::error::AccessError;
use crate::scrapers::markup::CellSelectors;
use crate::scrapers::traits::PageAccessor;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Local;
use headless_chrome::protocol::cdp::Page::CaptureScreenshotFormatOption;
use headless_chrome::{Browser, LaunchOptions, Tab};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Where the grid lives in the page. Each list is tried in order and the
/// first selector matching anything is used.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GridSelectors {
    /// Element wrapping the grid: a `<table>`, an ARIA grid, an ag-grid root
    pub containers: Vec<String>,
    /// Data rows, relative to the container
    pub rows: Vec<String>,
    /// Cells, relative to a row
    pub cells: Vec<String>,
    /// Header rows, relative to the container
    pub header_rows: Vec<String>,
    /// Header cells, relative to a header row
    pub header_cells: Vec<String>,
    /// "Next page" control. Unset means buttons labelled next, › or » are tried.
    pub next_page: Option<String>,
}

impl Default for GridSelectors {
    fn default() -> Self {
        let list = |items: &[&str]| items.iter().map(|s| s.to_string()).collect();
        Self {
            containers: list(&["table", "[role=grid]", "[role=table]", ".ag-root-wrapper"]),
            rows: list(&["tbody tr", ".ag-center-cols-container .ag-row", "[role=row]"]),
            cells: list(&["td", "[role=gridcell]", "[role=cell]", ".ag-cell"]),
            header_rows: list(&["thead tr", ".ag-header-row", "[role=row]"]),
            header_cells: list(&["th", "[role=columnheader]", ".ag-header-cell"]),
            next_page: None,
        }
    }
}

/// Chrome instance holding the page with the table
pub struct ChromeSession {
    browser: Arc<Browser>,
}

impl ChromeSession {
    /// Launch a fresh Chrome
    pub async fn launch(headless: bool) -> Result<Self> {
        info!("Launching Chrome (headless: {})...", headless);

        let browser = tokio::task::spawn_blocking(move || {
            let options = LaunchOptions::default_builder()
                .headless(headless)
                .idle_browser_timeout(Duration::from_secs(600))
                .build()
                .context("Failed to build launch options")?;

            Browser::new(options).context("Failed to launch Chrome browser")
        })
        .await??;

        Ok(Self {
            browser: Arc::new(browser),
        })
    }

    /// Attach to a running Chrome, e.g. one where someone already logged in
    pub async fn connect(ws_url: &str) -> Result<Self> {
        info!("Connecting to running Chrome at {}...", ws_url);

        let url = ws_url.to_string();
        let browser = tokio::task::spawn_blocking(move || Browser::connect(url))
            .await?
            .with_context(|| format!("Failed to connect to Chrome at {ws_url}"))?;

        Ok(Self {
            browser: Arc::new(browser),
        })
    }

    /// Reuse an open tab whose URL starts with `url`, or open `url` in a new tab.
    /// Without a URL, the first open tab is used.
    pub async fn table_tab(&self, url: Option<&str>) -> Result<Arc<Tab>> {
        let browser = Arc::clone(&self.browser);
        let url = url.map(str::to_string);
        tokio::task::spawn_blocking(move || find_or_open_tab(&browser, url.as_deref())).await?
    }
}

fn find_or_open_tab(browser: &Browser, url: Option<&str>) -> Result<Arc<Tab>> {
    let existing = {
        let tabs = browser
            .get_tabs()
            .lock()
            .map_err(|_| anyhow::anyhow!("Chrome tab list lock poisoned"))?;
        match url {
            Some(url) => tabs.iter().find(|t| t.get_url().starts_with(url)).cloned(),
            None => tabs.first().cloned(),
        }
    };

    if let Some(tab) = existing {
        info!("Using open tab at {}", tab.get_url());
        return Ok(tab);
    }

    let url = url.context("No open tab and no table URL configured")?;
    info!("Opening {}...", url);
    let tab = browser.new_tab()?;
    tab.navigate_to(url)?;
    tab.wait_until_navigated()?;
    Ok(tab)
}

/// `PageAccessor` over a table or grid rendered in a Chrome tab
pub struct ChromeTableAccessor {
    tab: Arc<Tab>,
    selectors: GridSelectors,
    markup: CellSelectors,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
enum ScriptResult<T> {
    Ok { value: T },
    NoTable,
}

#[derive(Debug, Deserialize)]
struct ScrollPosition {
    prev: f64,
    now: f64,
    max: f64,
}

/// Finds the container and defines `firstMatch(list)` over its descendants
const CONTAINER_PRELUDE: &str = r#"
    const container = cfg.containers.map(s => document.querySelector(s)).find(Boolean);
    if (!container) return JSON.stringify({ status: 'no_table' });
    const firstMatch = list => {
        for (const s of list) {
            const found = Array.from(container.querySelectorAll(s));
            if (found.length) return found;
        }
        return [];
    };
"#;

const HEADERS_SCRIPT: &str = r#"
    const value = firstMatch(cfg.header_rows).map(r => r.outerHTML);
    return JSON.stringify({ status: 'ok', value });
"#;

const ROWS_SCRIPT: &str = r#"
    const value = firstMatch(cfg.rows)
        .filter(r => r.offsetParent !== null)
        .map(r => r.outerHTML);
    return JSON.stringify({ status: 'ok', value });
"#;

const SCROLL_SCRIPT: &str = r#"
    const scrollable = el => {
        const oy = getComputedStyle(el).overflowY;
        return (oy === 'auto' || oy === 'scroll') && el.scrollHeight > el.clientHeight + 1;
    };
    let scroller = null;
    for (let node = container; node && node !== document.body; node = node.parentElement) {
        if (scrollable(node)) { scroller = node; break; }
    }
    if (!scroller) {
        scroller = Array.from(container.querySelectorAll('div')).find(scrollable) || null;
    }
    if (!scroller) {
        scroller = document.scrollingElement || document.documentElement;
    }

    const prev = scroller.scrollTop;
    const max = scroller.scrollHeight - scroller.clientHeight;
    scroller.scrollTop = Math.min(prev + scroller.clientHeight, max);
    return JSON.stringify({ status: 'ok', value: { prev, now: scroller.scrollTop, max } });
"#;

const NEXT_PAGE_SCRIPT: &str = r#"
    const disabled = el => el.disabled
        || el.getAttribute('aria-disabled') === 'true'
        || /\bdisabled\b/.test(String(el.className || ''));
    let button = null;
    if (cfg.next_page) {
        button = document.querySelector(cfg.next_page);
    } else {
        button = Array.from(document.querySelectorAll('button, a, [role=button]')).find(el =>
            /^(next( page)?|›|»|>)$/i.test((el.innerText || '').trim())
            || /\bnext\b/i.test(el.getAttribute('aria-label') || ''));
    }
    if (!button || disabled(button)) return JSON.stringify({ status: 'ok', value: false });
    button.click();
    return JSON.stringify({ status: 'ok', value: true });
"#;

impl ChromeTableAccessor {
    pub fn new(tab: Arc<Tab>, selectors: GridSelectors) -> Result<Self> {
        let markup = CellSelectors::new(&selectors.cells, &selectors.header_cells)?;
        Ok(Self {
            tab,
            selectors,
            markup,
        })
    }

    /// Block until one of the containers is in the DOM
    pub async fn wait_for_table(&self) -> Result<()> {
        let tab = Arc::clone(&self.tab);
        let selector = self.selectors.containers.join(", ");
        tokio::task::spawn_blocking(move || {
            let found = tab.wait_for_element(&selector).map(|_| ());
            found.with_context(|| format!("None of {selector} ever appeared"))
        })
        .await?
    }

    /// Save a timestamped PNG of the page, for post-mortems
    pub async fn capture_debug_screenshot(&self, dir: &Path, label: &str) -> Result<PathBuf> {
        tokio::fs::create_dir_all(dir).await?;
        let path = dir.join(format!("{}_{}.png", label, Local::now().format("%H%M%S")));

        let tab = Arc::clone(&self.tab);
        let png = tokio::task::spawn_blocking(move || {
            tab.capture_screenshot(CaptureScreenshotFormatOption::Png, None, None, true)
        })
        .await?
        .context("Failed to capture screenshot")?;

        tokio::fs::write(&path, png).await?;
        info!("Saved screenshot to {}", path.display());
        Ok(path)
    }

    /// Wrap a script body in a function that sees the selectors as `cfg`
    fn script(&self, body: &str, in_container: bool) -> Result<String, AccessError> {
        let cfg = serde_json::to_string(&self.selectors)
            .map_err(|e| AccessError::Structural(format!("selectors not serializable: {e}")))?;
        let prelude = if in_container { CONTAINER_PRELUDE } else { "" };
        Ok(format!("(() => {{\nconst cfg = {cfg};\n{prelude}\n{body}\n}})()"))
    }

    /// Evaluate `script` (which must return a JSON string) off the async threads
    async fn eval<T: DeserializeOwned>(&self, script: String) -> Result<T, AccessError> {
        let tab = Arc::clone(&self.tab);
        let raw = tokio::task::spawn_blocking(move || tab.evaluate(&script, false))
            .await
            .map_err(|e| AccessError::Transient(format!("browser task failed: {e}")))?
            .map_err(|e| AccessError::Transient(e.to_string()))?;

        let json = raw
            .value
            .as_ref()
            .and_then(|v| v.as_str())
            .ok_or_else(|| AccessError::Transient("script returned no value".to_string()))?;

        let result: ScriptResult<T> = serde_json::from_str(json)
            .map_err(|e| AccessError::Structural(format!("unexpected script result: {e}")))?;

        match result {
            ScriptResult::Ok { value } => Ok(value),
            ScriptResult::NoTable => Err(AccessError::Structural(format!(
                "no element matches any of {}",
                self.selectors.containers.join(", ")
            ))),
        }
    }
}

#[async_trait]
impl PageAccessor for ChromeTableAccessor {
    async fn column_headers(&mut self) -> Result<Vec<String>, AccessError> {
        let fragments: Vec<String> = self.eval(self.script(HEADERS_SCRIPT, true)?).await?;
        Ok(self.markup.parse_headers(&fragments))
    }

    async fn list_visible_rows(&mut self) -> Result<Vec<RenderedRow>, AccessError> {
        let fragments: Vec<String> = self.eval(self.script(ROWS_SCRIPT, true)?).await?;
        let rows = self.markup.parse_rows(&fragments);
        debug!("{} rows rendered", rows.len());
        Ok(rows)
    }

    async fn scroll_forward(&mut self) -> Result<bool, AccessError> {
        let pos: ScrollPosition = self.eval(self.script(SCROLL_SCRIPT, true)?).await?;
        debug!("Scrolled {} -> {} (max {})", pos.prev, pos.now, pos.max);
        Ok(pos.now != pos.prev)
    }

    async fn next_page(&mut self) -> Result<bool, AccessError> {
        let clicked: bool = self.eval(self.script(NEXT_PAGE_SCRIPT, false)?).await?;
        if clicked {
            info!("Clicked through to the next page");
        }
        Ok(clicked)
    }
}
