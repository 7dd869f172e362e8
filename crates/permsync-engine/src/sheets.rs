//! Control-sheet layout and typed access to sheet contents.

use permsync_core::{CellValue, HeaderMap, Row};
use permsync_storage::{SheetStore, StorageError};

use crate::error::Result;

pub const MANAGED_FOLDERS: &str = "ManagedFolders";
pub const USER_GROUPS: &str = "UserGroups";
pub const SHEET_EDITORS: &str = "SheetEditors";
pub const CHANGE_REQUESTS: &str = "ChangeRequests";

pub const MANAGED_FOLDERS_HEADERS: &[&str] = &[
    "FolderName",
    "FolderID",
    "Role",
    "UserSheetName",
    "GroupEmail",
    "URL",
    "LastSynced",
    "Status",
    "Delete",
];

pub const USER_GROUPS_HEADERS: &[&str] = &[
    "GroupName",
    "GroupEmail",
    "UserSheetName",
    "LastSynced",
    "Status",
    "Delete",
];

pub const SHEET_EDITORS_HEADERS: &[&str] = &["Email", "Name", "Disabled"];

pub const USER_SHEET_HEADERS: &[&str] = &["Email", "Disabled"];

pub const CHANGE_REQUESTS_HEADERS: &[&str] = &[
    "RequestId",
    "RequestedBy",
    "RequestedAt",
    "TargetSheet",
    "TargetRowKey",
    "Action",
    "ProposedRowSnapshot",
    "Status",
    "ApprovalsNeeded",
    "Approver_1",
    "Approver_2",
    "Approver_3",
    "RejectedBy",
    "DenyReason",
    "AppliedAt",
];

/// Control sheets with their headers, in creation order.
pub const CONTROL_SHEETS: &[(&str, &[&str])] = &[
    (MANAGED_FOLDERS, MANAGED_FOLDERS_HEADERS),
    (USER_GROUPS, USER_GROUPS_HEADERS),
    (SHEET_EDITORS, SHEET_EDITORS_HEADERS),
    (CHANGE_REQUESTS, CHANGE_REQUESTS_HEADERS),
];

pub fn header_row(names: &[&str]) -> Row {
    names.iter().map(|n| CellValue::text(*n)).collect()
}

/// Creates every missing control sheet. Returns the names created.
pub async fn setup_control_sheets(sheets: &dyn SheetStore) -> Result<Vec<String>> {
    let existing = sheets.sheet_names().await?;
    let mut created = Vec::new();
    for (name, headers) in CONTROL_SHEETS {
        if existing.iter().any(|s| s == name) {
            continue;
        }
        match sheets.create_sheet(name, &header_row(headers)).await {
            Ok(()) => created.push((*name).to_string()),
            Err(StorageError::AlreadyExists { .. }) => {}
            Err(e) => return Err(e.into()),
        }
    }
    if !created.is_empty() {
        tracing::info!(sheets = ?created, "control sheets created");
    }
    Ok(created)
}

/// A sheet read once: header map plus data rows.
#[derive(Debug, Clone)]
pub struct SheetTable {
    pub name: String,
    pub headers: HeaderMap,
    rows: Vec<Row>,
}

impl SheetTable {
    /// Reads a sheet; `None` when it does not exist.
    pub async fn read(sheets: &dyn SheetStore, name: &str) -> Result<Option<Self>> {
        let Some(grid) = sheets.read_sheet(name).await? else {
            return Ok(None);
        };
        Ok(Some(Self::from_grid(name, grid)))
    }

    pub fn from_grid(name: &str, mut grid: Vec<Row>) -> Self {
        let header = if grid.is_empty() {
            Vec::new()
        } else {
            grid.remove(0)
        };
        Self {
            name: name.to_string(),
            headers: HeaderMap::from_header_row(name, &header),
            rows: grid,
        }
    }

    /// Data rows with their 1-based sheet row numbers, blank rows skipped.
    pub fn rows(&self) -> impl Iterator<Item = (usize, &Row)> {
        self.rows
            .iter()
            .enumerate()
            .map(|(idx, row)| (idx + 2, row))
            .filter(|(_, row)| !is_blank_row(row))
    }

    pub fn row(&self, row: usize) -> Option<&Row> {
        row.checked_sub(2).and_then(|idx| self.rows.get(idx))
    }

    pub fn text(&self, row: &[CellValue], column: &str) -> String {
        self.headers.text(row, column)
    }

    /// Rows whose `column` text equals `key`, trimmed on both sides.
    pub fn find_rows(&self, column: &str, key: &str) -> Vec<usize> {
        let key = key.trim();
        self.rows()
            .filter(|(_, row)| self.text(row, column) == key)
            .map(|(idx, _)| idx)
            .collect()
    }

    /// Writes one cell by header name. Missing columns are skipped.
    pub async fn write(
        &self,
        sheets: &dyn SheetStore,
        row: usize,
        column: &str,
        value: impl Into<CellValue>,
    ) -> Result<()> {
        if let Some(col) = self.headers.col(column) {
            sheets.write_cell(&self.name, row, col, value.into()).await?;
        }
        Ok(())
    }
}

pub fn is_blank_row(row: &[CellValue]) -> bool {
    row.iter().all(CellValue::is_blank)
}
