//! Outcome of the last run, kept in the key-value store.

use permsync_core::Timestamp;
use permsync_storage::KeyValueStore;
use serde::{Deserialize, Serialize};

use crate::context::SyncSource;
use crate::error::Result;

pub const LAST_SYNC_STATUS_KEY: &str = "LAST_SYNC_STATUS";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncState {
    Success,
    Failed,
    Skipped,
}

impl std::fmt::Display for SyncState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Success => write!(f, "success"),
            Self::Failed => write!(f, "failed"),
            Self::Skipped => write!(f, "skipped"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncStatus {
    pub state: SyncState,
    pub operation: String,
    pub summary: String,
    pub source: SyncSource,
    pub at: Timestamp,
}

pub async fn record_status(store: &dyn KeyValueStore, status: &SyncStatus) -> Result<()> {
    let raw = serde_json::to_string(status)?;
    store.set(LAST_SYNC_STATUS_KEY, &raw).await?;
    tracing::debug!(state = %status.state, operation = %status.operation, "sync status recorded");
    Ok(())
}

/// Last recorded status; an unreadable value reads as none.
pub async fn load_status(store: &dyn KeyValueStore) -> Result<Option<SyncStatus>> {
    Ok(store
        .get(LAST_SYNC_STATUS_KEY)
        .await?
        .and_then(|raw| serde_json::from_str(&raw).ok()))
}
