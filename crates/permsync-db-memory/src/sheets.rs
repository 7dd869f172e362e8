use async_trait::async_trait;
use indexmap::IndexMap;
use permsync_core::{CellValue, Grid, Row, Timestamp};
use permsync_storage::{DynClock, SheetStore, StorageError};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CellNote {
    pub row: usize,
    pub col: usize,
    pub text: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SheetData {
    #[serde(default)]
    pub rows: Grid,
    #[serde(default)]
    pub notes: Vec<CellNote>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpreadsheetState {
    pub name: String,
    #[serde(default)]
    pub owner: Option<String>,
    #[serde(default)]
    pub editors: Vec<String>,
    #[serde(default)]
    pub sheets: IndexMap<String, SheetData>,
    pub last_updated: Timestamp,
}

/// In-memory spreadsheet. Every mutation bumps `last_updated`.
pub struct InMemorySpreadsheet {
    state: RwLock<SpreadsheetState>,
    clock: DynClock,
}

impl std::fmt::Debug for InMemorySpreadsheet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemorySpreadsheet").finish_non_exhaustive()
    }
}

fn sheet_missing(sheet: &str) -> StorageError {
    StorageError::not_found("sheet", sheet)
}

fn check_row(row: usize) -> Result<usize, StorageError> {
    if row == 0 {
        return Err(StorageError::invalid("rows are 1-based"));
    }
    Ok(row - 1)
}

impl InMemorySpreadsheet {
    pub fn new(name: impl Into<String>, owner: Option<String>, clock: DynClock) -> Self {
        let now = clock.now();
        let owner = owner.map(|o| o.to_lowercase());
        let state = SpreadsheetState {
            name: name.into(),
            editors: owner.iter().cloned().collect(),
            owner,
            sheets: IndexMap::new(),
            last_updated: now,
        };
        Self::from_state(state, clock)
    }

    pub fn from_state(state: SpreadsheetState, clock: DynClock) -> Self {
        Self {
            state: RwLock::new(state),
            clock,
        }
    }

    pub async fn export(&self) -> SpreadsheetState {
        self.state.read().await.clone()
    }

    /// Replaces a sheet's contents wholesale.
    pub async fn put_sheet(&self, sheet: &str, rows: Grid) {
        let now = self.clock.now();
        let mut state = self.state.write().await;
        state.sheets.insert(
            sheet.to_string(),
            SheetData {
                rows,
                notes: Vec::new(),
            },
        );
        state.last_updated = now;
    }

    /// Note attached to a cell, if any.
    pub async fn note(&self, sheet: &str, row: usize, col: usize) -> Option<String> {
        self.state.read().await.sheets.get(sheet).and_then(|s| {
            s.notes
                .iter()
                .find(|n| n.row == row && n.col == col)
                .map(|n| n.text.clone())
        })
    }

    pub async fn has_sheet(&self, sheet: &str) -> bool {
        self.state.read().await.sheets.contains_key(sheet)
    }

    async fn mutate<T>(
        &self,
        sheet: &str,
        f: impl FnOnce(&mut SheetData) -> Result<T, StorageError> + Send,
    ) -> Result<T, StorageError> {
        let now = self.clock.now();
        let mut state = self.state.write().await;
        let data = state
            .sheets
            .get_mut(sheet)
            .ok_or_else(|| sheet_missing(sheet))?;
        let out = f(data)?;
        state.last_updated = now;
        Ok(out)
    }
}

#[async_trait]
impl SheetStore for InMemorySpreadsheet {
    async fn spreadsheet_name(&self) -> Result<String, StorageError> {
        Ok(self.state.read().await.name.clone())
    }

    async fn sheet_names(&self) -> Result<Vec<String>, StorageError> {
        Ok(self.state.read().await.sheets.keys().cloned().collect())
    }

    async fn read_sheet(&self, sheet: &str) -> Result<Option<Grid>, StorageError> {
        Ok(self
            .state
            .read()
            .await
            .sheets
            .get(sheet)
            .map(|s| s.rows.clone()))
    }

    async fn create_sheet(&self, sheet: &str, header: &[CellValue]) -> Result<(), StorageError> {
        let now = self.clock.now();
        let mut state = self.state.write().await;
        if state.sheets.contains_key(sheet) {
            return Err(StorageError::already_exists("sheet", sheet));
        }
        let rows = if header.is_empty() {
            Vec::new()
        } else {
            vec![header.to_vec()]
        };
        state.sheets.insert(
            sheet.to_string(),
            SheetData {
                rows,
                notes: Vec::new(),
            },
        );
        state.last_updated = now;
        Ok(())
    }

    async fn rename_sheet(&self, from: &str, to: &str) -> Result<(), StorageError> {
        let now = self.clock.now();
        let mut state = self.state.write().await;
        if state.sheets.contains_key(to) {
            return Err(StorageError::already_exists("sheet", to));
        }
        let idx = state
            .sheets
            .get_index_of(from)
            .ok_or_else(|| sheet_missing(from))?;
        let data = state
            .sheets
            .shift_remove(from)
            .ok_or_else(|| sheet_missing(from))?;
        state.sheets.shift_insert(idx, to.to_string(), data);
        state.last_updated = now;
        Ok(())
    }

    async fn delete_sheet(&self, sheet: &str) -> Result<(), StorageError> {
        let now = self.clock.now();
        let mut state = self.state.write().await;
        state
            .sheets
            .shift_remove(sheet)
            .ok_or_else(|| sheet_missing(sheet))?;
        state.last_updated = now;
        Ok(())
    }

    async fn write_cell(
        &self,
        sheet: &str,
        row: usize,
        col: usize,
        value: CellValue,
    ) -> Result<(), StorageError> {
        let r = check_row(row)?;
        let c = check_row(col)?;
        self.mutate(sheet, move |data| {
            if data.rows.len() <= r {
                data.rows.resize(r + 1, Vec::new());
            }
            let cells = &mut data.rows[r];
            if cells.len() <= c {
                cells.resize(c + 1, CellValue::Empty);
            }
            cells[c] = value;
            Ok(())
        })
        .await
    }

    async fn write_row(&self, sheet: &str, row: usize, values: &Row) -> Result<(), StorageError> {
        let r = check_row(row)?;
        let values = values.clone();
        self.mutate(sheet, move |data| {
            if data.rows.len() <= r {
                data.rows.resize(r + 1, Vec::new());
            }
            let cells = &mut data.rows[r];
            if cells.len() < values.len() {
                cells.resize(values.len(), CellValue::Empty);
            }
            for (idx, value) in values.into_iter().enumerate() {
                cells[idx] = value;
            }
            Ok(())
        })
        .await
    }

    async fn append_row(&self, sheet: &str, values: &Row) -> Result<usize, StorageError> {
        let values = values.clone();
        self.mutate(sheet, move |data| {
            data.rows.push(values);
            Ok(data.rows.len())
        })
        .await
    }

    async fn delete_row(&self, sheet: &str, row: usize) -> Result<(), StorageError> {
        let r = check_row(row)?;
        self.mutate(sheet, move |data| {
            if r >= data.rows.len() {
                return Err(StorageError::not_found("row", row.to_string()));
            }
            data.rows.remove(r);
            data.notes.retain(|n| n.row != row);
            for note in data.notes.iter_mut().filter(|n| n.row > row) {
                note.row -= 1;
            }
            Ok(())
        })
        .await
    }

    async fn set_note(
        &self,
        sheet: &str,
        row: usize,
        col: usize,
        note: &str,
    ) -> Result<(), StorageError> {
        let text = note.to_string();
        self.mutate(sheet, move |data| {
            data.notes.retain(|n| !(n.row == row && n.col == col));
            if !text.is_empty() {
                data.notes.push(CellNote { row, col, text });
            }
            Ok(())
        })
        .await
    }

    async fn last_updated(&self) -> Result<Timestamp, StorageError> {
        Ok(self.state.read().await.last_updated)
    }

    async fn editors(&self) -> Result<Vec<String>, StorageError> {
        Ok(self.state.read().await.editors.clone())
    }

    async fn owner(&self) -> Result<Option<String>, StorageError> {
        Ok(self.state.read().await.owner.clone())
    }

    async fn add_editors(&self, emails: &[String]) -> Result<(), StorageError> {
        let mut state = self.state.write().await;
        for email in emails {
            let email = email.to_lowercase();
            if !state.editors.contains(&email) {
                state.editors.push(email);
            }
        }
        Ok(())
    }

    async fn remove_editor(&self, email: &str) -> Result<(), StorageError> {
        let email = email.to_lowercase();
        let mut state = self.state.write().await;
        if state.owner.as_deref() == Some(email.as_str()) {
            return Err(StorageError::invalid("the owner cannot be removed"));
        }
        let before = state.editors.len();
        state.editors.retain(|e| *e != email);
        if state.editors.len() == before {
            return Err(StorageError::not_found("editor", email));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use std::sync::Arc;
    use time::Duration;

    fn text_row(values: &[&str]) -> Row {
        values.iter().map(|v| CellValue::text(*v)).collect()
    }

    #[tokio::test]
    async fn test_sheet_round_trip() {
        let clock = Arc::new(ManualClock::default());
        let book = InMemorySpreadsheet::new("Control", Some("owner@example.com".into()), clock.clone());
        book.create_sheet("Team_Editor", &text_row(&["Email", "Disabled"]))
            .await
            .unwrap();
        let row = book
            .append_row("Team_Editor", &text_row(&["a@example.com"]))
            .await
            .unwrap();
        assert_eq!(row, 2);

        let before = book.last_updated().await.unwrap();
        clock.advance(Duration::minutes(5));
        book.write_cell("Team_Editor", 2, 2, CellValue::Bool(true))
            .await
            .unwrap();
        assert!(book.last_updated().await.unwrap() > before);

        let grid = book.read_sheet("Team_Editor").await.unwrap().unwrap();
        assert_eq!(grid[1], vec![CellValue::text("a@example.com"), CellValue::Bool(true)]);
    }

    #[tokio::test]
    async fn test_rename_keeps_position() {
        let book = InMemorySpreadsheet::new("Control", None, Arc::new(ManualClock::default()));
        book.create_sheet("A", &[]).await.unwrap();
        book.create_sheet("B", &[]).await.unwrap();
        book.rename_sheet("A", "C").await.unwrap();
        assert_eq!(book.sheet_names().await.unwrap(), vec!["C", "B"]);
    }

    #[tokio::test]
    async fn test_delete_row_shifts_notes() {
        let book = InMemorySpreadsheet::new("Control", None, Arc::new(ManualClock::default()));
        book.put_sheet(
            "S",
            vec![text_row(&["h"]), text_row(&["1"]), text_row(&["2"])],
        )
        .await;
        book.set_note("S", 3, 1, "warn").await.unwrap();
        book.delete_row("S", 2).await.unwrap();
        assert_eq!(book.note("S", 2, 1).await.as_deref(), Some("warn"));
    }

    #[tokio::test]
    async fn test_owner_is_protected() {
        let book = InMemorySpreadsheet::new(
            "Control",
            Some("owner@example.com".into()),
            Arc::new(ManualClock::default()),
        );
        book.add_editors(&["e@example.com".into()]).await.unwrap();
        assert!(book.remove_editor("owner@example.com").await.is_err());
        book.remove_editor("e@example.com").await.unwrap();
        assert_eq!(book.editors().await.unwrap(), vec!["owner@example.com"]);
    }
}
