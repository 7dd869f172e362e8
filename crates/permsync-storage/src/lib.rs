//! # permsync-storage
//!
//! Contracts between the reconciler and the outside world.
//!
//! This crate defines the traits and types every collaborator must implement.
//! It does not contain any implementations; those live in separate crates.
//!
//! ## Overview
//!
//! - [`GroupDirectory`]: paginated group membership and group lifecycle
//! - [`FolderStore`]: folder lookup, creation and sharing
//! - [`SheetStore`]: the spreadsheet used as the control plane
//! - [`KeyValueStore`]: single-slot persisted state such as snapshots
//! - [`MutualExclusionLock`]: a named lock with a bounded wait
//!
//! ## Example
//!
//! ```ignore
//! use permsync_storage::{GroupDirectory, StorageError};
//!
//! async fn first_page(dir: &dyn GroupDirectory) -> Result<usize, StorageError> {
//!     let page = dir.list_members("team@example.com", None).await?;
//!     Ok(page.members.len())
//! }
//! ```

mod error;
mod traits;
mod types;

pub use error::{ErrorCategory, StorageError};
pub use traits::{
    Clock, FolderStore, GroupDirectory, KeyValueStore, LockLease, MutualExclusionLock,
    SheetStore, SystemClock,
};
pub use types::{DirectoryMember, FolderInfo, GroupInfo, MemberPage, NewGroup};

/// Type alias for a storage result.
pub type StorageResult<T> = Result<T, StorageError>;

pub type DynGroupDirectory = std::sync::Arc<dyn GroupDirectory>;
pub type DynFolderStore = std::sync::Arc<dyn FolderStore>;
pub type DynSheetStore = std::sync::Arc<dyn SheetStore>;
pub type DynKeyValueStore = std::sync::Arc<dyn KeyValueStore>;
pub type DynLock = std::sync::Arc<dyn MutualExclusionLock>;
pub type DynClock = std::sync::Arc<dyn Clock>;

/// Prelude module for convenient imports.
///
/// ```ignore
/// use permsync_storage::prelude::*;
/// ```
pub mod prelude {
    pub use crate::error::{ErrorCategory, StorageError};
    pub use crate::traits::{
        Clock, FolderStore, GroupDirectory, KeyValueStore, LockLease, MutualExclusionLock,
        SheetStore, SystemClock,
    };
    pub use crate::types::{DirectoryMember, FolderInfo, GroupInfo, MemberPage, NewGroup};
    pub use crate::{
        DynClock, DynFolderStore, DynGroupDirectory, DynKeyValueStore, DynLock, DynSheetStore,
        StorageResult,
    };
}
