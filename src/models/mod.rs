use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;

/// Identity of a table row, used to detect rows already collected
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RowKey(String);

impl RowKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RowKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// How a content-derived key is built when the row carries no DOM identifier
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyStrategy {
    /// All cells joined with `|`
    #[default]
    RowContent,
    /// First cell when non-empty, whole row otherwise
    FirstCell,
}

/// A table or grid row as currently rendered by the page
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RenderedRow {
    /// Identifier the page assigns to the row (`data-row-id`, `row-id`, ...)
    pub dom_id: Option<String>,
    /// Cell texts, left to right, whitespace-normalized
    pub cells: Vec<String>,
}

impl RenderedRow {
    pub fn new(dom_id: Option<String>, cells: Vec<String>) -> Self {
        Self { dom_id, cells }
    }

    /// Identity key of this row. A DOM identifier always wins over content.
    pub fn key(&self, strategy: KeyStrategy) -> RowKey {
        if let Some(id) = self.dom_id.as_deref().filter(|id| !id.is_empty()) {
            return RowKey::new(format!("id:{id}"));
        }

        let joined = self.cells.join("|");
        match strategy {
            KeyStrategy::RowContent => RowKey::new(joined),
            KeyStrategy::FirstCell => match self.cells.first() {
                Some(first) if !first.is_empty() => RowKey::new(first.clone()),
                _ => RowKey::new(joined),
            },
        }
    }

    /// Spacer rows in virtual lists render without cells
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Whether `fresh` is a later rendering of this row: the same DOM id, or
    /// without ids, the same cells with only empty ones filled in
    pub fn is_same_row(&self, fresh: &RenderedRow) -> bool {
        let id = |row: &RenderedRow| row.dom_id.clone().filter(|id| !id.is_empty());
        match (id(self), id(fresh)) {
            (Some(old), Some(new)) => old == new,
            (None, None) => {
                !fresh.is_empty()
                    && fresh.cells.len() >= self.cells.len()
                    && self
                        .cells
                        .iter()
                        .zip(&fresh.cells)
                        .all(|(old, new)| old.is_empty() || old == new)
            }
            _ => false,
        }
    }

    /// Looks like async content is still filling in
    pub fn is_partial(&self, expected_columns: usize) -> bool {
        self.cells.len() < expected_columns || self.cells.iter().any(|c| c.is_empty())
    }
}

/// One extracted table row: column name to cell value, in column order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowRecord {
    pub key: RowKey,
    pub cells: Vec<(String, String)>,
}

impl RowRecord {
    pub fn new(key: RowKey, cells: Vec<(String, String)>) -> Self {
        Self { key, cells }
    }

    pub fn get(&self, column: &str) -> Option<&str> {
        self.cells
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value.as_str())
    }
}

impl Serialize for RowRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.cells.len()))?;
        for (column, value) in &self.cells {
            map.serialize_entry(column, value)?;
        }
        map.end()
    }
}
