//! Per-run state threaded through every engine call.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use permsync_config::AppConfig;
use permsync_core::{MembershipEntry, Timestamp};
use permsync_storage::{
    DynClock, DynFolderStore, DynGroupDirectory, DynKeyValueStore, DynSheetStore,
};
use serde::{Deserialize, Serialize};

use crate::runlog::{LogLevel, RunLog};

/// Who started a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncSource {
    #[default]
    Manual,
    Scheduled,
    AutoSync,
}

impl std::fmt::Display for SyncSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Manual => write!(f, "manual"),
            Self::Scheduled => write!(f, "scheduled"),
            Self::AutoSync => write!(f, "auto_sync"),
        }
    }
}

/// Mode flags and row filters for one run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncOptions {
    /// Never remove anything, skip deletion rows.
    pub add_only: bool,
    /// Only remove members; creates nothing.
    pub remove_only: bool,
    /// Compute plans without touching any collaborator.
    pub plan_only: bool,
    /// Only rows whose folder or group name starts with this prefix.
    pub name_prefix: Option<String>,
    /// Only these 1-based sheet rows. Empty means all rows.
    pub rows: Vec<usize>,
    pub source: SyncSource,
}

impl SyncOptions {
    pub fn add_only() -> Self {
        Self {
            add_only: true,
            ..Self::default()
        }
    }

    pub fn remove_only() -> Self {
        Self {
            remove_only: true,
            ..Self::default()
        }
    }

    pub fn with_source(mut self, source: SyncSource) -> Self {
        self.source = source;
        self
    }

    pub fn planning(mut self) -> Self {
        self.plan_only = true;
        self
    }

    pub fn allows_adds(&self) -> bool {
        !self.remove_only
    }

    pub fn allows_removals(&self) -> bool {
        !self.add_only
    }

    /// Neither add-only nor remove-only.
    pub fn is_full(&self) -> bool {
        !self.add_only && !self.remove_only
    }

    /// Whether structure (folders, groups, sheets, row cells) may be touched.
    pub fn touches_structure(&self) -> bool {
        !self.plan_only && !self.remove_only
    }

    /// Row filter from name prefix and explicit rows.
    pub fn selects(&self, row: usize, name: &str) -> bool {
        if !self.rows.is_empty() && !self.rows.contains(&row) {
            return false;
        }
        match &self.name_prefix {
            Some(prefix) if !prefix.is_empty() => name.starts_with(prefix.as_str()),
            _ => true,
        }
    }
}

/// Remote collaborators of a run.
#[derive(Clone)]
pub struct Collaborators {
    pub directory: DynGroupDirectory,
    pub folders: DynFolderStore,
    pub sheets: DynSheetStore,
    pub properties: DynKeyValueStore,
    pub clock: DynClock,
}

/// Explicit replacement for process-wide script state: configuration, mode
/// flags, collaborator handles and the request-scoped membership cache.
pub struct SyncContext {
    pub remote: Collaborators,
    pub config: Arc<AppConfig>,
    pub options: SyncOptions,
    pub log: RunLog,
    members: papaya::HashMap<String, Arc<Vec<MembershipEntry>>>,
    changes: AtomicUsize,
}

impl SyncContext {
    pub fn new(remote: Collaborators, config: Arc<AppConfig>, options: SyncOptions) -> Self {
        Self {
            remote,
            config,
            options,
            log: RunLog::new(),
            members: papaya::HashMap::new(),
            changes: AtomicUsize::new(0),
        }
    }

    pub fn now(&self) -> Timestamp {
        self.remote.clock.now()
    }

    pub fn info(&self, message: impl Into<String>) {
        self.log.push(self.now(), LogLevel::Info, message);
    }

    pub fn warn(&self, message: impl Into<String>) {
        self.log.push(self.now(), LogLevel::Warn, message);
    }

    pub fn error(&self, message: impl Into<String>) {
        self.log.push(self.now(), LogLevel::Error, message);
    }

    /// Counts a remote side effect, so a failure can say whether anything landed.
    pub fn record_change(&self) {
        self.changes.fetch_add(1, Ordering::SeqCst);
    }

    pub fn changes(&self) -> usize {
        self.changes.load(Ordering::SeqCst)
    }

    pub fn cached_members(&self, group_email: &str) -> Option<Arc<Vec<MembershipEntry>>> {
        self.members.pin().get(group_email).cloned()
    }

    pub fn cache_members(
        &self,
        group_email: &str,
        members: Vec<MembershipEntry>,
    ) -> Arc<Vec<MembershipEntry>> {
        let members = Arc::new(members);
        self.members
            .pin()
            .insert(group_email.to_string(), members.clone());
        members
    }

    pub fn invalidate_members(&self, group_email: &str) {
        self.members.pin().remove(group_email);
    }

    /// Sleeps between remote calls; zero delays return immediately.
    pub async fn pause(&self, delay: Duration) {
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }
}
