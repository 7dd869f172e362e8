use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub workspace: WorkspaceConfig,
    #[serde(default)]
    pub sync: SyncConfig,
    #[serde(default)]
    pub lock: LockConfig,
    /// Change-request quorum settings
    #[serde(default)]
    pub approvals: ApprovalsConfig,
    #[serde(default)]
    pub auto_sync: AutoSyncConfig,
    /// Fatal-error and summary reports
    #[serde(default)]
    pub notifications: NotificationsConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AppConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.sync.membership_batch_size == 0 {
            return Err("sync.membership_batch_size must be > 0".into());
        }
        if !(1..=3).contains(&self.approvals.required_approvals) {
            return Err("approvals.required_approvals must be between 1 and 3".into());
        }
        if self.lock.name.trim().is_empty() {
            return Err("lock.name must not be empty".into());
        }
        if self.auto_sync.snapshot_key.trim().is_empty() {
            return Err("auto_sync.snapshot_key must not be empty".into());
        }
        let lvl = self.logging.level.to_ascii_lowercase();
        let valid_levels = ["trace", "debug", "info", "warn", "error", "off"];
        if !valid_levels.contains(&lvl.as_str()) {
            return Err(format!("logging.level must be one of {valid_levels:?}"));
        }
        if self.notifications.enabled {
            if self.notifications.to.is_empty() {
                return Err("notifications.enabled=true requires notifications.to".into());
            }
            if self.notifications.smtp_host.as_deref().unwrap_or("").is_empty() {
                return Err("notifications.enabled=true requires notifications.smtp_host".into());
            }
        }
        Ok(())
    }

    /// Natural-key header for a protected sheet.
    pub fn key_column(&self, sheet: &str) -> Option<&str> {
        self.approvals.key_columns.get(sheet).map(String::as_str)
    }

    pub fn lock_wait(&self) -> Duration {
        Duration::from_millis(self.lock.wait_ms)
    }

    pub fn retry_base_delay(&self) -> Duration {
        Duration::from_millis(self.sync.retry_base_delay_ms)
    }

    pub fn inter_call_delay(&self) -> Duration {
        Duration::from_millis(self.sync.inter_call_delay_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct WorkspaceConfig {
    /// Domain appended to generated group addresses.
    #[serde(default)]
    pub domain: Option<String>,
    /// Explicit address of the sheet-editors group; derived from the
    /// spreadsheet name when unset.
    #[serde(default)]
    pub sheet_editors_group_email: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    #[serde(default = "default_batch_size")]
    pub membership_batch_size: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,
    #[serde(default = "default_inter_call_delay_ms")]
    pub inter_call_delay_ms: u64,
    /// Remove group members whose sheet row is disabled.
    #[serde(default)]
    pub remove_disabled_members: bool,
    #[serde(default = "default_true")]
    pub rename_folders_on_mismatch: bool,
    #[serde(default = "default_true")]
    pub process_deletions: bool,
}

fn default_batch_size() -> usize {
    50
}
fn default_max_retries() -> u32 {
    3
}
fn default_retry_base_delay_ms() -> u64 {
    500
}
fn default_inter_call_delay_ms() -> u64 {
    100
}
fn default_true() -> bool {
    true
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            membership_batch_size: default_batch_size(),
            max_retries: default_max_retries(),
            retry_base_delay_ms: default_retry_base_delay_ms(),
            inter_call_delay_ms: default_inter_call_delay_ms(),
            remove_disabled_members: false,
            rename_folders_on_mismatch: true,
            process_deletions: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockConfig {
    #[serde(default = "default_lock_name")]
    pub name: String,
    #[serde(default = "default_lock_wait_ms")]
    pub wait_ms: u64,
}

fn default_lock_name() -> String {
    "permsync-sync".into()
}
fn default_lock_wait_ms() -> u64 {
    30_000
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            name: default_lock_name(),
            wait_ms: default_lock_wait_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovalsConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_required_approvals")]
    pub required_approvals: u32,
    /// 0 disables expiry.
    #[serde(default)]
    pub expiry_hours: u64,
    #[serde(default = "default_protected_sheets")]
    pub protected_sheets: Vec<String>,
    #[serde(default = "default_key_columns")]
    pub key_columns: BTreeMap<String, String>,
}

fn default_required_approvals() -> u32 {
    1
}

fn default_protected_sheets() -> Vec<String> {
    vec![
        "ManagedFolders".into(),
        "UserGroups".into(),
        "SheetEditors".into(),
    ]
}

fn default_key_columns() -> BTreeMap<String, String> {
    BTreeMap::from([
        ("ManagedFolders".to_string(), "FolderID".to_string()),
        ("UserGroups".to_string(), "GroupName".to_string()),
        ("SheetEditors".to_string(), "Email".to_string()),
    ])
}

impl Default for ApprovalsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            required_approvals: default_required_approvals(),
            expiry_hours: 0,
            protected_sheets: default_protected_sheets(),
            key_columns: default_key_columns(),
        }
    }
}

impl ApprovalsConfig {
    pub fn is_protected(&self, sheet: &str) -> bool {
        self.protected_sheets.iter().any(|s| s == sheet)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutoSyncConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_snapshot_key")]
    pub snapshot_key: String,
}

fn default_snapshot_key() -> String {
    "AUTO_SYNC_CHANGE_SIGNATURE".into()
}

impl Default for AutoSyncConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            snapshot_key: default_snapshot_key(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationsConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub smtp_host: Option<String>,
    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,
    #[serde(default)]
    pub smtp_username: Option<String>,
    #[serde(default)]
    pub smtp_password: Option<String>,
    #[serde(default = "default_from")]
    pub from: String,
    #[serde(default)]
    pub to: Vec<String>,
}

fn default_smtp_port() -> u16 {
    587
}
fn default_from() -> String {
    "permsync@localhost".into()
}

impl Default for NotificationsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            smtp_host: None,
            smtp_port: default_smtp_port(),
            smtp_username: None,
            smtp_password: None,
            from: default_from(),
            to: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}
fn default_log_level() -> String {
    "info".into()
}
impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}
