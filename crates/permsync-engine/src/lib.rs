//! # permsync-engine
//!
//! Reconciles Drive folder sharing and group membership with the control
//! sheets of a spreadsheet.
//!
//! ## Overview
//!
//! - [`reader`]: desired state from the control and user sheets
//! - [`fetcher`]: observed group membership, paginated and cached per run
//! - [`diff`]: membership plans
//! - [`executor`]: batched, retried application of a plan
//! - [`approval`]: quorum-approved change requests
//! - [`snapshot`]: change detection for scheduled runs
//! - [`orchestrator`]: the lock-guarded entry points tying it together
//!
//! ## Example
//!
//! ```ignore
//! use permsync_engine::prelude::*;
//!
//! async fn run(reconciler: &Reconciler) -> Result<()> {
//!     let summary = reconciler.sync_all(SyncOptions::default()).await?;
//!     println!("{}", summary.text());
//!     Ok(())
//! }
//! ```

pub mod approval;
pub mod context;
pub mod diff;
pub mod editors;
pub mod error;
pub mod executor;
pub mod fetcher;
pub mod folders;
pub mod groups;
pub mod membership;
pub mod merge;
pub mod orchestrator;
pub mod processing;
pub mod reader;
pub mod runlog;
pub mod sheets;
pub mod snapshot;
pub mod status;
pub mod summary;

pub use context::{Collaborators, SyncContext, SyncOptions, SyncSource};
pub use diff::{SyncPlan, diff};
pub use error::{EngineError, Result};
pub use executor::{ApplySummary, MemberAction, MemberFailure, apply_plan};
pub use merge::MergeReport;
pub use orchestrator::{AutoSyncOutcome, DeletionOutcome, Reconciler};
pub use runlog::{LogLevel, LogLine, RunLog};
pub use snapshot::{AutoSyncSnapshot, ChangeDetection};
pub use status::{SyncState, SyncStatus};
pub use summary::RunSummary;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::approval::{
        ChangeAction, ChangeProposal, ChangeRequest, RequestStatus, RequestsReport, SubmitOutcome,
    };
    pub use crate::{
        ApplySummary, AutoSyncOutcome, ChangeDetection, Collaborators, DeletionOutcome,
        EngineError, Reconciler, Result, RunSummary, SyncOptions, SyncPlan, SyncSource,
        SyncState, SyncStatus,
    };
}
