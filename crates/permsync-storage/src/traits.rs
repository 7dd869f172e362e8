//! Collaborator contracts the reconciler is written against.
//!
//! Implementations must be thread-safe (`Send + Sync`). Absence is reported
//! through `Option` on lookups and through `StorageError::NotFound` on
//! mutations of missing objects.

use std::time::Duration;

use async_trait::async_trait;
use permsync_core::{CellValue, FolderRole, Grid, Row, Timestamp};

use crate::error::StorageError;
use crate::types::{DirectoryMember, FolderInfo, GroupInfo, MemberPage, NewGroup};

/// Group membership directory.
#[async_trait]
pub trait GroupDirectory: Send + Sync {
    /// Lists one page of members of a group.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the group does not exist.
    async fn list_members(
        &self,
        group_email: &str,
        page_token: Option<&str>,
    ) -> Result<MemberPage, StorageError>;

    /// Adds a member to a group.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::AlreadyExists` if the address is already a member.
    async fn insert_member(
        &self,
        group_email: &str,
        member: &DirectoryMember,
    ) -> Result<(), StorageError>;

    /// Removes a member from a group.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the address is not a member.
    async fn remove_member(&self, group_email: &str, email: &str) -> Result<(), StorageError>;

    /// Looks up a group. Returns `None` if it does not exist.
    async fn get_group(&self, group_email: &str) -> Result<Option<GroupInfo>, StorageError>;

    /// Creates a group.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::AlreadyExists` if the address is taken.
    async fn insert_group(&self, group: &NewGroup) -> Result<GroupInfo, StorageError>;

    /// Deletes a group.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the group does not exist.
    async fn delete_group(&self, group_email: &str) -> Result<(), StorageError>;
}

/// Folder storage with per-principal sharing.
#[async_trait]
pub trait FolderStore: Send + Sync {
    /// Returns `None` if no folder has this id.
    async fn get_folder_by_id(&self, id: &str) -> Result<Option<FolderInfo>, StorageError>;

    /// All folders carrying exactly this name.
    async fn find_folders_by_name(&self, name: &str) -> Result<Vec<FolderInfo>, StorageError>;

    async fn create_folder(&self, name: &str) -> Result<FolderInfo, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the folder does not exist.
    async fn rename_folder(&self, id: &str, name: &str) -> Result<FolderInfo, StorageError>;

    /// Shares the folder with `principal` at `role`, replacing any previous role.
    async fn grant(
        &self,
        folder_id: &str,
        principal: &str,
        role: FolderRole,
    ) -> Result<(), StorageError>;

    /// Current role of `principal` on the folder, if any.
    async fn get_access(
        &self,
        folder_id: &str,
        principal: &str,
    ) -> Result<Option<FolderRole>, StorageError>;

    async fn revoke_access(&self, folder_id: &str, principal: &str) -> Result<(), StorageError>;

    /// Last modification time of the folder.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the folder does not exist.
    async fn last_updated(&self, folder_id: &str) -> Result<Timestamp, StorageError>;
}

/// The spreadsheet acting as control plane.
///
/// Rows and columns are 1-based; row 1 is the header row.
#[async_trait]
pub trait SheetStore: Send + Sync {
    async fn spreadsheet_name(&self) -> Result<String, StorageError>;

    async fn sheet_names(&self) -> Result<Vec<String>, StorageError>;

    /// Full contents of a sheet, header row included. `None` if the sheet is missing.
    async fn read_sheet(&self, sheet: &str) -> Result<Option<Grid>, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError::AlreadyExists` if the sheet exists.
    async fn create_sheet(&self, sheet: &str, header: &[CellValue]) -> Result<(), StorageError>;

    async fn rename_sheet(&self, from: &str, to: &str) -> Result<(), StorageError>;

    async fn delete_sheet(&self, sheet: &str) -> Result<(), StorageError>;

    async fn write_cell(
        &self,
        sheet: &str,
        row: usize,
        col: usize,
        value: CellValue,
    ) -> Result<(), StorageError>;

    /// Overwrites a row starting at column 1.
    async fn write_row(&self, sheet: &str, row: usize, values: &Row) -> Result<(), StorageError>;

    /// Appends a row and returns its 1-based index.
    async fn append_row(&self, sheet: &str, values: &Row) -> Result<usize, StorageError>;

    async fn delete_row(&self, sheet: &str, row: usize) -> Result<(), StorageError>;

    /// Attaches a visible note to a cell.
    async fn set_note(
        &self,
        sheet: &str,
        row: usize,
        col: usize,
        note: &str,
    ) -> Result<(), StorageError>;

    /// Last modification time of the whole spreadsheet.
    async fn last_updated(&self) -> Result<Timestamp, StorageError>;

    /// Addresses with edit access to the spreadsheet.
    async fn editors(&self) -> Result<Vec<String>, StorageError>;

    async fn owner(&self) -> Result<Option<String>, StorageError>;

    async fn add_editors(&self, emails: &[String]) -> Result<(), StorageError>;

    async fn remove_editor(&self, email: &str) -> Result<(), StorageError>;
}

/// Small persisted key/value map for single-slot state.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

    async fn delete(&self, key: &str) -> Result<(), StorageError>;
}

/// Proof of holding a named lock; the lock is released when dropped.
pub trait LockLease: Send + Sync {
    fn name(&self) -> &str;
}

/// Named lock with a bounded wait.
#[async_trait]
pub trait MutualExclusionLock: Send + Sync {
    /// Acquires `name`, waiting at most `wait`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::LockUnavailable` if the lock is still held when
    /// the wait runs out.
    async fn acquire(&self, name: &str, wait: Duration)
    -> Result<Box<dyn LockLease>, StorageError>;
}

/// Source of the current time.
pub trait Clock: Send + Sync {
    fn now(&self) -> Timestamp;
}

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        permsync_core::now_utc()
    }
}
