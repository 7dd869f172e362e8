//! In-memory collaborator backends for permsync.
//!
//! Every trait from `permsync-storage` has an implementation here. They back
//! the test suites and the local CLI, which persists a [`MemoryWorkspace`] to
//! a JSON state file between runs.
//!
//! # Example
//!
//! ```ignore
//! use permsync_db_memory::{ManualClock, MemoryWorkspace};
//! use std::sync::Arc;
//!
//! let ws = MemoryWorkspace::new("Control", Some("owner@example.com"), Arc::new(ManualClock::default()));
//! ws.drive.seed_folder("folder-1", "Reports").await;
//! ```

pub mod clock;
pub mod directory;
pub mod drive;
pub mod kv;
pub mod lock;
pub mod sheets;
pub mod workspace;

pub use clock::ManualClock;
pub use directory::{DirectoryState, FaultKind, GroupRecord, InMemoryDirectory};
pub use drive::{DriveState, FolderRecord, InMemoryDrive, folder_url};
pub use kv::InMemoryKeyValueStore;
pub use lock::{FileLock, MemoryLock};
pub use sheets::{CellNote, InMemorySpreadsheet, SheetData, SpreadsheetState};
pub use workspace::{MemoryWorkspace, WorkspaceState};

// Re-export the storage contracts for convenience
pub use permsync_storage::{StorageError, StorageResult};
