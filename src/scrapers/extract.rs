use crate::models::{RenderedRow, RowKey, RowRecord};
use crate::scrapers::error::AccessError;
use crate::scrapers::traits::RowExtractor;

/// Zips table headers with cell texts
#[derive(Debug, Clone, Default)]
pub struct HeaderExtractor;

/// Header used when the table declares none
pub fn fallback_column(index: usize) -> String {
    format!("col_{}", index + 1)
}

impl RowExtractor for HeaderExtractor {
    fn extract(
        &self,
        row: &RenderedRow,
        key: &RowKey,
        headers: &[String],
    ) -> Result<RowRecord, AccessError> {
        if headers.is_empty() {
            let cells = row
                .cells
                .iter()
                .enumerate()
                .map(|(i, value)| (fallback_column(i), value.clone()))
                .collect();
            return Ok(RowRecord::new(key.clone(), cells));
        }

        if row.cells.len() > headers.len() {
            return Err(AccessError::Structural(format!(
                "row {} has {} cells but the table declares {} columns",
                key,
                row.cells.len(),
                headers.len()
            )));
        }

        let cells = headers
            .iter()
            .enumerate()
            .map(|(i, header)| {
                let name = if header.is_empty() {
                    fallback_column(i)
                } else {
                    header.clone()
                };
                (name, row.cells.get(i).cloned().unwrap_or_default())
            })
            .collect();

        Ok(RowRecord::new(key.clone(), cells))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    fn row(cells: &[&str]) -> RenderedRow {
        RenderedRow::new(None, cells.iter().map(|c| c.to_string()).collect())
    }

    #[test]
    fn zips_headers_and_pads_missing_cells() {
        let record = HeaderExtractor
            .extract(&row(&["A-1"]), &RowKey::new("A-1"), &headers(&["Id", "Name"]))
            .unwrap();
        assert_eq!(
            record.cells,
            vec![
                ("Id".to_string(), "A-1".to_string()),
                ("Name".to_string(), String::new())
            ]
        );
    }

    #[test]
    fn falls_back_to_generic_columns() {
        let record = HeaderExtractor
            .extract(&row(&["A-1", "Widget"]), &RowKey::new("k"), &[])
            .unwrap();
        assert_eq!(record.get("col_1"), Some("A-1"));
        assert_eq!(record.get("col_2"), Some("Widget"));

        let record = HeaderExtractor
            .extract(&row(&["A-1", "Widget"]), &RowKey::new("k"), &headers(&["Id", ""]))
            .unwrap();
        assert_eq!(record.get("col_2"), Some("Widget"));
    }

    #[test]
    fn extra_cells_are_a_structural_mismatch() {
        let err = HeaderExtractor
            .extract(&row(&["a", "b", "c"]), &RowKey::new("k"), &headers(&["Id", "Name"]))
            .unwrap_err();
        assert!(matches!(err, AccessError::Structural(_)));
    }
}
