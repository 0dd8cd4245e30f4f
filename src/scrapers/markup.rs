use crate::models::RenderedRow;
use anyhow::{anyhow, Result};
use scraper::{ElementRef, Html, Selector};

/// Attributes checked, in order, for a page-assigned row identifier
const ROW_ID_ATTRIBUTES: [&str; 5] = ["data-row-id", "row-id", "data-id", "aria-rowindex", "id"];

/// Cell and header-cell selectors, tried in order per row; the first one
/// matching anything in that row wins
pub struct CellSelectors {
    cells: Vec<Selector>,
    header_cells: Vec<Selector>,
}

impl CellSelectors {
    pub fn new(cells: &[String], header_cells: &[String]) -> Result<Self> {
        Ok(Self {
            cells: parse_selectors(cells)?,
            header_cells: parse_selectors(header_cells)?,
        })
    }

    /// Parse `outerHTML` of rendered rows (`<tr>`, `div[role=row]`, `.ag-row`, ...)
    pub fn parse_rows(&self, fragments: &[String]) -> Vec<RenderedRow> {
        fragments
            .iter()
            .filter_map(|html| {
                with_fragment(html, |row| {
                    let cells = first_matching(row, &self.cells)
                        .into_iter()
                        .map(|cell| normalize_text(&cell.text().collect::<String>()))
                        .collect();
                    RenderedRow::new(row_id(row), cells)
                })
            })
            .collect()
    }

    /// Column names from the `outerHTML` of header rows, top to bottom.
    /// Rows without header cells (data rows of an ARIA grid) are skipped.
    pub fn parse_headers(&self, fragments: &[String]) -> Vec<String> {
        let rows: Vec<Vec<HeaderCell>> = fragments
            .iter()
            .filter_map(|html| {
                with_fragment(html, |row| {
                    first_matching(row, &self.header_cells)
                        .into_iter()
                        .map(HeaderCell::from_element)
                        .collect::<Vec<_>>()
                })
            })
            .filter(|cells| !cells.is_empty())
            .collect();

        header_columns(&rows)
    }
}

fn parse_selectors(sources: &[String]) -> Result<Vec<Selector>> {
    sources
        .iter()
        .map(|s| Selector::parse(s).map_err(|e| anyhow!("invalid selector {s:?}: {e:?}")))
        .collect()
}

/// Run `f` on the single element serialized in `html`
fn with_fragment<T>(html: &str, f: impl FnOnce(ElementRef<'_>) -> T) -> Option<T> {
    let trimmed = html.trim_start();
    // table parts only survive parsing inside a table
    let table_part = ["<tr", "<TR"].iter().any(|p| trimmed.starts_with(p));
    if table_part {
        let document = Html::parse_document(&format!("<table><tbody>{html}</tbody></table>"));
        let selector = Selector::parse("tbody > tr").ok()?;
        let row = document.select(&selector).next()?;
        Some(f(row))
    } else {
        let fragment = Html::parse_fragment(html);
        let row = fragment
            .root_element()
            .children()
            .filter_map(ElementRef::wrap)
            .next()?;
        Some(f(row))
    }
}

fn first_matching<'a>(row: ElementRef<'a>, selectors: &[Selector]) -> Vec<ElementRef<'a>> {
    selectors
        .iter()
        .map(|selector| row.select(selector).collect::<Vec<_>>())
        .find(|found| !found.is_empty())
        .unwrap_or_default()
}

fn row_id(row: ElementRef<'_>) -> Option<String> {
    ROW_ID_ATTRIBUTES
        .iter()
        .filter_map(|attr| row.value().attr(attr))
        .map(str::trim)
        .find(|id| !id.is_empty())
        .map(str::to_string)
}

/// One header cell with its spans
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderCell {
    pub text: String,
    pub colspan: usize,
    pub rowspan: usize,
}

impl HeaderCell {
    pub fn new(text: impl Into<String>, colspan: usize, rowspan: usize) -> Self {
        Self {
            text: text.into(),
            colspan: colspan.max(1),
            rowspan: rowspan.max(1),
        }
    }

    fn from_element(cell: ElementRef<'_>) -> Self {
        let span = |attrs: [&str; 2]| {
            attrs
                .iter()
                .filter_map(|a| cell.value().attr(a))
                .find_map(|v| v.trim().parse::<usize>().ok())
                .unwrap_or(1)
        };
        Self::new(
            normalize_text(&cell.text().collect::<String>()),
            span(["colspan", "aria-colspan"]),
            span(["rowspan", "aria-rowspan"]),
        )
    }
}

/// Leaf column names of a possibly multi-row header.
///
/// Lays the rows out on a grid honoring `rowspan` and `colspan` and returns the
/// bottom grid row. A cell spanning several leaf columns repeats its name with
/// a ` (2)`, ` (3)`, ... suffix so every column stays addressable.
pub fn header_columns(rows: &[Vec<HeaderCell>]) -> Vec<String> {
    // per column: name and how many more rows it still covers
    let mut carried: Vec<Option<(String, usize)>> = Vec::new();
    let mut last = Vec::new();

    for cells in rows {
        let mut line = Vec::new();
        let mut col = 0;
        let mut cells = cells.iter();

        loop {
            if let Some(slot) = carried.get_mut(col) {
                if let Some((name, remaining)) = slot.take() {
                    line.push(name.clone());
                    if remaining > 1 {
                        *slot = Some((name, remaining - 1));
                    }
                    col += 1;
                    continue;
                }
            }

            let Some(cell) = cells.next() else {
                // rowspans reaching past the last cell of this row
                if col < carried.len() {
                    col += 1;
                    continue;
                }
                break;
            };

            for part in 0..cell.colspan {
                let name = if part == 0 {
                    cell.text.clone()
                } else {
                    format!("{} ({})", cell.text, part + 1)
                };
                if carried.len() <= col {
                    carried.resize(col + 1, None);
                }
                if cell.rowspan > 1 {
                    carried[col] = Some((name.clone(), cell.rowspan - 1));
                }
                line.push(name);
                col += 1;
            }
        }

        last = line;
    }

    last
}

/// Collapse runs of whitespace (including `&nbsp;`) into single spaces
pub fn normalize_text(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
