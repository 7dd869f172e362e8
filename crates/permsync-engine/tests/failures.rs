//! Fatal failures part-way through a run.

mod common;

use std::result::Result;
use std::sync::Arc;

use async_trait::async_trait;
use common::{Harness, OWNER};
use permsync_core::{CellValue, Grid, Row, Timestamp};
use permsync_db_memory::InMemorySpreadsheet;
use permsync_engine::prelude::*;
use permsync_notifications::Severity;
use permsync_storage::{SheetStore, StorageError};

/// Delegates to the in-memory spreadsheet but cannot read one sheet.
struct BrokenSheet {
    inner: Arc<InMemorySpreadsheet>,
    broken: &'static str,
}

#[async_trait]
impl SheetStore for BrokenSheet {
    async fn spreadsheet_name(&self) -> Result<String, StorageError> {
        self.inner.spreadsheet_name().await
    }

    async fn sheet_names(&self) -> Result<Vec<String>, StorageError> {
        self.inner.sheet_names().await
    }

    async fn read_sheet(&self, sheet: &str) -> Result<Option<Grid>, StorageError> {
        if sheet == self.broken {
            return Err(StorageError::connection("spreadsheet backend went away"));
        }
        self.inner.read_sheet(sheet).await
    }

    async fn create_sheet(&self, sheet: &str, header: &[CellValue]) -> Result<(), StorageError> {
        self.inner.create_sheet(sheet, header).await
    }

    async fn rename_sheet(&self, from: &str, to: &str) -> Result<(), StorageError> {
        self.inner.rename_sheet(from, to).await
    }

    async fn delete_sheet(&self, sheet: &str) -> Result<(), StorageError> {
        self.inner.delete_sheet(sheet).await
    }

    async fn write_cell(
        &self,
        sheet: &str,
        row: usize,
        col: usize,
        value: CellValue,
    ) -> Result<(), StorageError> {
        self.inner.write_cell(sheet, row, col, value).await
    }

    async fn write_row(&self, sheet: &str, row: usize, values: &Row) -> Result<(), StorageError> {
        self.inner.write_row(sheet, row, values).await
    }

    async fn append_row(&self, sheet: &str, values: &Row) -> Result<usize, StorageError> {
        self.inner.append_row(sheet, values).await
    }

    async fn delete_row(&self, sheet: &str, row: usize) -> Result<(), StorageError> {
        self.inner.delete_row(sheet, row).await
    }

    async fn set_note(
        &self,
        sheet: &str,
        row: usize,
        col: usize,
        note: &str,
    ) -> Result<(), StorageError> {
        self.inner.set_note(sheet, row, col, note).await
    }

    async fn last_updated(&self) -> Result<Timestamp, StorageError> {
        self.inner.last_updated().await
    }

    async fn editors(&self) -> Result<Vec<String>, StorageError> {
        self.inner.editors().await
    }

    async fn owner(&self) -> Result<Option<String>, StorageError> {
        self.inner.owner().await
    }

    async fn add_editors(&self, emails: &[String]) -> Result<(), StorageError> {
        self.inner.add_editors(emails).await
    }

    async fn remove_editor(&self, email: &str) -> Result<(), StorageError> {
        self.inner.remove_editor(email).await
    }
}

fn broken_reconciler(h: &Harness, broken: &'static str) -> Reconciler {
    let mut collaborators = h.collaborators();
    collaborators.sheets = Arc::new(BrokenSheet {
        inner: h.ws.sheets.clone(),
        broken,
    });
    Reconciler::new(
        collaborators,
        h.config.clone(),
        h.lock.clone(),
        h.notifier.clone(),
    )
}

#[tokio::test]
async fn test_failure_after_changes_reports_partial_application() {
    let h = Harness::new().await;
    h.put("ManagedFolders", &[&["FolderName", "FolderID", "Role"], &["Reports", "", "Editor"]])
        .await;
    h.put("Reports_Editor", &[&["Email", "Disabled"], &["alice@example.com", ""]])
        .await;

    let err = broken_reconciler(&h, "UserGroups")
        .sync_all(SyncOptions::default())
        .await
        .expect_err("user groups cannot be read");

    assert!(err.to_string().contains("spreadsheet backend went away"));
    // The folder pass finished before the failure.
    assert_eq!(h.members("reportseditor@example.com").await, vec!["alice@example.com"]);

    let sent = h.notifier.sent().await;
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].severity, Severity::Error);
    assert!(sent[0].subject.contains("Full sync failed"));
    assert!(sent[0].body.contains("Some changes were applied"));

    let status = h
        .reconciler()
        .last_status()
        .await
        .expect("status")
        .expect("recorded");
    assert_eq!(status.state, SyncState::Failed);
}

#[tokio::test]
async fn test_failure_before_changes_reports_nothing_changed() {
    let h = Harness::new().await;
    h.editors(&[OWNER]).await;

    let err = broken_reconciler(&h, "ManagedFolders")
        .sync_all(SyncOptions::default())
        .await
        .expect_err("managed folders cannot be read");

    assert!(!err.is_validation());
    let sent = h.notifier.sent().await;
    assert_eq!(sent.len(), 1);
    assert!(sent[0].body.contains("Nothing was changed."));
    assert_eq!(h.ws.directory.mutation_calls(), 0);
}
