//! Header-name to column resolution.
//!
//! Columns are looked up by name rather than position, so reordering columns
//! in a sheet does not break readers.

use crate::cell::{CellValue, Row};
use crate::error::{CoreError, Result};
use indexmap::IndexMap;

/// Lowercases a header and drops every non-alphanumeric character.
pub fn normalize_header(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

/// Normalized header name to 1-based column index, built once per sheet read.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HeaderMap {
    sheet: String,
    columns: IndexMap<String, usize>,
}

impl HeaderMap {
    /// Builds the map from a header row. The first occurrence of a duplicated
    /// header wins.
    pub fn from_header_row(sheet: impl Into<String>, header: &[CellValue]) -> Self {
        let mut columns = IndexMap::new();
        for (idx, cell) in header.iter().enumerate() {
            let key = normalize_header(&cell.as_text());
            if !key.is_empty() {
                columns.entry(key).or_insert(idx + 1);
            }
        }
        Self {
            sheet: sheet.into(),
            columns,
        }
    }

    pub fn sheet(&self) -> &str {
        &self.sheet
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// 1-based column for `name`, if present.
    pub fn col(&self, name: &str) -> Option<usize> {
        self.columns.get(&normalize_header(name)).copied()
    }

    pub fn has(&self, name: &str) -> bool {
        self.col(name).is_some()
    }

    /// Like [`HeaderMap::col`] but fails when the column is missing.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::MissingColumn`.
    pub fn require(&self, name: &str) -> Result<usize> {
        self.col(name)
            .ok_or_else(|| CoreError::missing_column(&self.sheet, name))
    }

    /// Columns whose normalized header starts with `prefix`, in sheet order.
    pub fn columns_with_prefix(&self, prefix: &str) -> Vec<usize> {
        let prefix = normalize_header(prefix);
        self.columns
            .iter()
            .filter(|(name, _)| name.starts_with(&prefix))
            .map(|(_, col)| *col)
            .collect()
    }

    /// Cell under `name` in `row`; missing columns and short rows read as empty.
    pub fn cell<'a>(&self, row: &'a [CellValue], name: &str) -> Option<&'a CellValue> {
        self.col(name).and_then(|col| row.get(col - 1))
    }

    /// Trimmed text under `name`, empty when absent.
    pub fn text(&self, row: &[CellValue], name: &str) -> String {
        self.cell(row, name).map(CellValue::trimmed).unwrap_or_default()
    }

    /// Writes `value` under `name`, padding the row as needed.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::MissingColumn` when the header is absent.
    pub fn set(&self, row: &mut Row, name: &str, value: impl Into<CellValue>) -> Result<()> {
        let col = self.require(name)?;
        if row.len() < col {
            row.resize(col, CellValue::Empty);
        }
        row[col - 1] = value.into();
        Ok(())
    }

    /// An empty row as wide as the header.
    pub fn blank_row(&self) -> Row {
        let width = self.columns.values().copied().max().unwrap_or(0);
        vec![CellValue::Empty; width]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header(names: &[&str]) -> Vec<CellValue> {
        names.iter().map(|n| CellValue::text(*n)).collect()
    }

    #[test]
    fn test_normalize_header() {
        assert_eq!(normalize_header("Folder ID"), "folderid");
        assert_eq!(normalize_header("folder_id"), "folderid");
        assert_eq!(normalize_header("FolderID"), "folderid");
        assert_eq!(normalize_header("Approver_1"), "approver1");
    }

    #[test]
    fn test_lookup_survives_reordering() {
        let a = HeaderMap::from_header_row("S", &header(&["Email", "Disabled"]));
        let b = HeaderMap::from_header_row("S", &header(&["Disabled", "E-mail ", "Email"]));
        assert_eq!(a.col("email"), Some(1));
        assert_eq!(b.col("Email"), Some(2));
        assert_eq!(b.col("Disabled"), Some(1));
    }

    #[test]
    fn test_require_missing_column() {
        let map = HeaderMap::from_header_row("ManagedFolders", &header(&["FolderName"]));
        let err = map.require("Role").unwrap_err();
        assert!(matches!(err, CoreError::MissingColumn { .. }));
    }

    #[test]
    fn test_columns_with_prefix() {
        let map = HeaderMap::from_header_row(
            "ChangeRequests",
            &header(&["RequestId", "Approver_1", "Status", "Approver 2", "Approver3"]),
        );
        assert_eq!(map.columns_with_prefix("Approver"), vec![2, 4, 5]);
    }

    #[test]
    fn test_cell_and_set() {
        let map = HeaderMap::from_header_row("S", &header(&["Email", "Disabled", "Status"]));
        let mut row = vec![CellValue::text(" a@x.com ")];
        assert_eq!(map.text(&row, "Email"), "a@x.com");
        assert_eq!(map.text(&row, "Status"), "");
        map.set(&mut row, "Status", "OK").unwrap();
        assert_eq!(row.len(), 3);
        assert_eq!(map.text(&row, "Status"), "OK");
        assert_eq!(map.blank_row().len(), 3);
    }
}
