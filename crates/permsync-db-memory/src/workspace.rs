use crate::directory::{DirectoryState, InMemoryDirectory};
use crate::drive::{DriveState, InMemoryDrive};
use crate::kv::InMemoryKeyValueStore;
use crate::sheets::{InMemorySpreadsheet, SpreadsheetState};
use permsync_core::Timestamp;
use permsync_storage::{DynClock, StorageError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

/// Serializable snapshot of a whole workspace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkspaceState {
    pub spreadsheet: SpreadsheetState,
    #[serde(default)]
    pub directory: DirectoryState,
    #[serde(default)]
    pub drive: DriveState,
    #[serde(default)]
    pub properties: BTreeMap<String, String>,
}

impl WorkspaceState {
    /// An empty workspace around a spreadsheet.
    pub fn empty(spreadsheet_name: &str, owner: Option<&str>, now: Timestamp) -> Self {
        let owner = owner.map(str::to_lowercase);
        Self {
            spreadsheet: SpreadsheetState {
                name: spreadsheet_name.to_string(),
                editors: owner.iter().cloned().collect(),
                owner,
                sheets: Default::default(),
                last_updated: now,
            },
            directory: DirectoryState::default(),
            drive: DriveState::default(),
            properties: BTreeMap::new(),
        }
    }
}

/// Every in-memory collaborator, sharing one clock.
#[derive(Debug, Clone)]
pub struct MemoryWorkspace {
    pub directory: Arc<InMemoryDirectory>,
    pub drive: Arc<InMemoryDrive>,
    pub sheets: Arc<InMemorySpreadsheet>,
    pub properties: Arc<InMemoryKeyValueStore>,
}

impl MemoryWorkspace {
    pub fn new(spreadsheet_name: &str, owner: Option<&str>, clock: DynClock) -> Self {
        let state = WorkspaceState::empty(spreadsheet_name, owner, clock.now());
        Self::from_state(state, clock)
    }

    pub fn from_state(state: WorkspaceState, clock: DynClock) -> Self {
        Self {
            directory: Arc::new(InMemoryDirectory::from_state(state.directory)),
            drive: Arc::new(InMemoryDrive::from_state(state.drive, clock.clone())),
            sheets: Arc::new(InMemorySpreadsheet::from_state(state.spreadsheet, clock)),
            properties: Arc::new(InMemoryKeyValueStore::from_entries(state.properties)),
        }
    }

    pub async fn export(&self) -> WorkspaceState {
        WorkspaceState {
            spreadsheet: self.sheets.export().await,
            directory: self.directory.export().await,
            drive: self.drive.export().await,
            properties: self.properties.export(),
        }
    }

    /// Loads a workspace from a JSON state file.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the file is missing and
    /// `StorageError::Invalid` if it does not parse.
    pub async fn load(path: &Path, clock: DynClock) -> Result<Self, StorageError> {
        let raw = match tokio::fs::read_to_string(path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StorageError::not_found(
                    "state file",
                    path.display().to_string(),
                ));
            }
            Err(e) => {
                return Err(StorageError::internal(format!(
                    "reading {}: {e}",
                    path.display()
                )));
            }
        };
        let state: WorkspaceState = serde_json::from_str(&raw)
            .map_err(|e| StorageError::invalid(format!("parsing {}: {e}", path.display())))?;
        Ok(Self::from_state(state, clock))
    }

    /// Writes the workspace to `path`, replacing it atomically.
    pub async fn save(&self, path: &Path) -> Result<(), StorageError> {
        let state = self.export().await;
        let json = serde_json::to_string_pretty(&state)
            .map_err(|e| StorageError::internal(format!("serializing state: {e}")))?;
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json)
            .await
            .map_err(|e| StorageError::internal(format!("writing {}: {e}", tmp.display())))?;
        tokio::fs::rename(&tmp, path)
            .await
            .map_err(|e| StorageError::internal(format!("replacing {}: {e}", path.display())))?;
        tracing::debug!(path = %path.display(), "workspace saved");
        Ok(())
    }
}
