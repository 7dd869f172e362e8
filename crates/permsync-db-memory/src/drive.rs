use async_trait::async_trait;
use permsync_core::{FolderRole, Timestamp};
use permsync_storage::{DynClock, FolderInfo, FolderStore, StorageError};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tokio::sync::RwLock;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FolderRecord {
    pub name: String,
    pub last_updated: Timestamp,
    /// Principal email to role.
    #[serde(default)]
    pub access: BTreeMap<String, FolderRole>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DriveState {
    #[serde(default)]
    pub folders: BTreeMap<String, FolderRecord>,
    #[serde(default)]
    pub next_id: u64,
}

pub fn folder_url(id: &str) -> String {
    format!("https://drive.google.com/drive/folders/{id}")
}

/// In-memory folder store.
pub struct InMemoryDrive {
    state: RwLock<DriveState>,
    /// Folders whose timestamp lookups fail.
    unreadable: RwLock<BTreeSet<String>>,
    clock: DynClock,
}

impl std::fmt::Debug for InMemoryDrive {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryDrive").finish_non_exhaustive()
    }
}

impl InMemoryDrive {
    pub fn new(clock: DynClock) -> Self {
        Self::from_state(DriveState::default(), clock)
    }

    pub fn from_state(state: DriveState, clock: DynClock) -> Self {
        Self {
            state: RwLock::new(state),
            unreadable: RwLock::new(BTreeSet::new()),
            clock,
        }
    }

    pub async fn export(&self) -> DriveState {
        self.state.read().await.clone()
    }

    /// Adds a folder with a fixed id.
    pub async fn seed_folder(&self, id: &str, name: &str) {
        let now = self.clock.now();
        self.state.write().await.folders.insert(
            id.to_string(),
            FolderRecord {
                name: name.to_string(),
                last_updated: now,
                access: BTreeMap::new(),
            },
        );
    }

    /// Marks a folder as modified now.
    pub async fn touch(&self, id: &str) {
        let now = self.clock.now();
        if let Some(folder) = self.state.write().await.folders.get_mut(id) {
            folder.last_updated = now;
        }
    }

    /// Makes `last_updated` fail for this folder.
    pub async fn make_unreadable(&self, id: &str) {
        self.unreadable.write().await.insert(id.to_string());
    }

    pub async fn access_list(&self, id: &str) -> BTreeMap<String, FolderRole> {
        self.state
            .read()
            .await
            .folders
            .get(id)
            .map(|f| f.access.clone())
            .unwrap_or_default()
    }

    pub async fn folder_count(&self) -> usize {
        self.state.read().await.folders.len()
    }

    fn info(id: &str, record: &FolderRecord) -> FolderInfo {
        FolderInfo {
            id: id.to_string(),
            name: record.name.clone(),
            url: folder_url(id),
            last_updated: record.last_updated,
        }
    }
}

#[async_trait]
impl FolderStore for InMemoryDrive {
    async fn get_folder_by_id(&self, id: &str) -> Result<Option<FolderInfo>, StorageError> {
        Ok(self
            .state
            .read()
            .await
            .folders
            .get(id)
            .map(|r| Self::info(id, r)))
    }

    async fn find_folders_by_name(&self, name: &str) -> Result<Vec<FolderInfo>, StorageError> {
        Ok(self
            .state
            .read()
            .await
            .folders
            .iter()
            .filter(|(_, r)| r.name == name)
            .map(|(id, r)| Self::info(id, r))
            .collect())
    }

    async fn create_folder(&self, name: &str) -> Result<FolderInfo, StorageError> {
        let now = self.clock.now();
        let mut state = self.state.write().await;
        state.next_id += 1;
        let id = format!("folder-{}", state.next_id);
        let record = FolderRecord {
            name: name.to_string(),
            last_updated: now,
            access: BTreeMap::new(),
        };
        let info = Self::info(&id, &record);
        state.folders.insert(id, record);
        Ok(info)
    }

    async fn rename_folder(&self, id: &str, name: &str) -> Result<FolderInfo, StorageError> {
        let now = self.clock.now();
        let mut state = self.state.write().await;
        let record = state
            .folders
            .get_mut(id)
            .ok_or_else(|| StorageError::not_found("folder", id))?;
        record.name = name.to_string();
        record.last_updated = now;
        Ok(Self::info(id, record))
    }

    async fn grant(
        &self,
        folder_id: &str,
        principal: &str,
        role: FolderRole,
    ) -> Result<(), StorageError> {
        let now = self.clock.now();
        let mut state = self.state.write().await;
        let record = state
            .folders
            .get_mut(folder_id)
            .ok_or_else(|| StorageError::not_found("folder", folder_id))?;
        record.access.insert(principal.to_lowercase(), role);
        record.last_updated = now;
        Ok(())
    }

    async fn get_access(
        &self,
        folder_id: &str,
        principal: &str,
    ) -> Result<Option<FolderRole>, StorageError> {
        let state = self.state.read().await;
        let record = state
            .folders
            .get(folder_id)
            .ok_or_else(|| StorageError::not_found("folder", folder_id))?;
        Ok(record.access.get(&principal.to_lowercase()).copied())
    }

    async fn revoke_access(&self, folder_id: &str, principal: &str) -> Result<(), StorageError> {
        let now = self.clock.now();
        let mut state = self.state.write().await;
        let record = state
            .folders
            .get_mut(folder_id)
            .ok_or_else(|| StorageError::not_found("folder", folder_id))?;
        if record.access.remove(&principal.to_lowercase()).is_some() {
            record.last_updated = now;
        }
        Ok(())
    }

    async fn last_updated(&self, folder_id: &str) -> Result<Timestamp, StorageError> {
        if self.unreadable.read().await.contains(folder_id) {
            return Err(StorageError::timeout(format!(
                "reading metadata of folder {folder_id}"
            )));
        }
        self.state
            .read()
            .await
            .folders
            .get(folder_id)
            .map(|r| r.last_updated)
            .ok_or_else(|| StorageError::not_found("folder", folder_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use std::sync::Arc;

    fn drive() -> InMemoryDrive {
        InMemoryDrive::new(Arc::new(ManualClock::default()))
    }

    #[tokio::test]
    async fn test_create_and_find() {
        let drive = drive();
        let created = drive.create_folder("Reports").await.unwrap();
        assert_eq!(created.url, folder_url(&created.id));
        let found = drive.find_folders_by_name("Reports").await.unwrap();
        assert_eq!(found.len(), 1);
        assert!(drive.get_folder_by_id("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_grant_replaces_role() {
        let drive = drive();
        drive.seed_folder("f1", "Reports").await;
        drive
            .grant("f1", "Team@example.com", FolderRole::Viewer)
            .await
            .unwrap();
        drive
            .grant("f1", "team@example.com", FolderRole::Editor)
            .await
            .unwrap();
        assert_eq!(
            drive.get_access("f1", "team@example.com").await.unwrap(),
            Some(FolderRole::Editor)
        );
        drive.revoke_access("f1", "team@example.com").await.unwrap();
        assert!(drive.access_list("f1").await.is_empty());
    }

    #[tokio::test]
    async fn test_unreadable_timestamp() {
        let drive = drive();
        drive.seed_folder("f1", "Reports").await;
        drive.make_unreadable("f1").await;
        assert!(drive.last_updated("f1").await.unwrap_err().is_transient());
    }
}
