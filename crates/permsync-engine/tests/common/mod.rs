//! Shared fixtures for the engine scenario tests.

#![allow(dead_code)]

use std::sync::Arc;

use permsync_config::AppConfig;
use permsync_core::{CellValue, Grid, MemberRole, Row};
use permsync_db_memory::{ManualClock, MemoryLock, MemoryWorkspace};
use permsync_engine::{Collaborators, Reconciler, SyncContext, SyncOptions};
use permsync_notifications::RecordingNotifier;
use permsync_storage::{DynClock, SheetStore};

pub const OWNER: &str = "owner@example.com";

/// Configuration with no delays and a known domain.
pub fn test_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.workspace.domain = Some("example.com".into());
    config.sync.retry_base_delay_ms = 0;
    config.sync.inter_call_delay_ms = 0;
    config.lock.wait_ms = 50;
    config
}

pub fn row(cells: &[&str]) -> Row {
    cells.iter().map(|c| CellValue::text(*c)).collect()
}

pub fn grid(rows: &[&[&str]]) -> Grid {
    rows.iter().map(|r| row(r)).collect()
}

pub struct Harness {
    pub ws: MemoryWorkspace,
    pub clock: Arc<ManualClock>,
    pub lock: Arc<MemoryLock>,
    pub notifier: Arc<RecordingNotifier>,
    pub config: Arc<AppConfig>,
}

impl Harness {
    pub async fn new() -> Self {
        Self::with_config(test_config()).await
    }

    pub async fn with_config(config: AppConfig) -> Self {
        let clock = Arc::new(ManualClock::default());
        let dyn_clock: DynClock = clock.clone();
        let harness = Self {
            ws: MemoryWorkspace::new("Control", Some(OWNER), dyn_clock),
            clock,
            lock: Arc::new(MemoryLock::new()),
            notifier: Arc::new(RecordingNotifier::new()),
            config: Arc::new(config),
        };
        harness
            .reconciler()
            .setup()
            .await
            .expect("control sheets should be created");
        harness
    }

    pub fn collaborators(&self) -> Collaborators {
        Collaborators {
            directory: self.ws.directory.clone(),
            folders: self.ws.drive.clone(),
            sheets: self.ws.sheets.clone(),
            properties: self.ws.properties.clone(),
            clock: self.clock.clone(),
        }
    }

    pub fn reconciler(&self) -> Reconciler {
        Reconciler::new(
            self.collaborators(),
            self.config.clone(),
            self.lock.clone(),
            self.notifier.clone(),
        )
    }

    pub fn context(&self, options: SyncOptions) -> SyncContext {
        SyncContext::new(self.collaborators(), self.config.clone(), options)
    }

    pub async fn put(&self, sheet: &str, rows: &[&[&str]]) {
        self.ws.sheets.put_sheet(sheet, grid(rows)).await;
    }

    pub async fn sheet(&self, sheet: &str) -> Grid {
        self.ws
            .sheets
            .read_sheet(sheet)
            .await
            .expect("read should succeed")
            .unwrap_or_default()
    }

    /// Text of a cell by 1-based row and header name.
    pub async fn cell(&self, sheet: &str, row: usize, header: &str) -> String {
        let grid = self.sheet(sheet).await;
        let col = grid[0]
            .iter()
            .position(|c| c.as_text() == header)
            .unwrap_or_else(|| panic!("no column {header} in {sheet}"));
        grid.get(row - 1)
            .and_then(|r| r.get(col))
            .map(CellValue::as_text)
            .unwrap_or_default()
    }

    pub async fn members(&self, group: &str) -> Vec<String> {
        self.ws
            .directory
            .members_of(group)
            .await
            .unwrap_or_default()
            .into_iter()
            .map(|(email, _)| email)
            .collect()
    }

    pub async fn seed_group(&self, group: &str, members: &[&str]) {
        let members: Vec<(&str, MemberRole)> =
            members.iter().map(|m| (*m, MemberRole::Member)).collect();
        self.ws.directory.seed_group(group, group, &members).await;
    }

    pub async fn editors(&self, emails: &[&str]) {
        let mut rows: Vec<Vec<&str>> = vec![vec!["Email", "Name", "Disabled"]];
        rows.extend(emails.iter().map(|e| vec![*e, "", ""]));
        let refs: Vec<&[&str]> = rows.iter().map(Vec::as_slice).collect();
        self.put("SheetEditors", &refs).await;
    }
}
