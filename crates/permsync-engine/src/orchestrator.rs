//! Lock-guarded sync entry points.
//!
//! Every entry point records a [`SyncStatus`] in the key-value store. Fatal
//! errors are also reported through the notifier, saying whether anything
//! was applied before the failure.

use std::sync::Arc;

use permsync_config::AppConfig;
use permsync_notifications::{DynNotifier, Notification};
use permsync_storage::{DynLock, LockLease};

use crate::approval::{
    ChangeProposal, ChangeRequest, RequestsReport, SubmitOutcome, approve, list_change_requests,
    process_change_requests, reject, submit_change_request,
};
use crate::context::{Collaborators, SyncContext, SyncOptions, SyncSource};
use crate::diff::SyncPlan;
use crate::editors::sync_sheet_editors;
use crate::error::{EngineError, Result};
use crate::merge::{MergeReport, merge_sync};
use crate::processing::{process_managed_folders, process_user_groups};
use crate::sheets::setup_control_sheets;
use crate::snapshot::{ChangeDetection, capture_snapshot, detect_changes, save_snapshot};
use crate::status::{SyncState, SyncStatus, load_status, record_status};
use crate::summary::RunSummary;

/// What `sync_deletes` ended up doing.
#[derive(Debug, Clone, PartialEq)]
pub enum DeletionOutcome {
    NothingPending,
    /// The confirmation callback declined; carries the plans it was shown.
    Cancelled(Vec<SyncPlan>),
    Applied(RunSummary),
}

#[derive(Debug, Clone, PartialEq)]
pub enum AutoSyncOutcome {
    Disabled,
    Unchanged(ChangeDetection),
    Ran {
        detection: ChangeDetection,
        summary: RunSummary,
    },
}

fn operation_name(options: &SyncOptions) -> &'static str {
    match options {
        o if o.source == SyncSource::AutoSync => "AutoSync",
        o if o.plan_only => "Sync plan",
        o if o.add_only => "Add-only sync",
        o if o.remove_only => "Remove-only sync",
        _ => "Full sync",
    }
}

/// Runs the passes of one sync in order.
async fn run_passes(ctx: &SyncContext, operation: &str) -> Result<RunSummary> {
    let mut summary = RunSummary::new(operation, ctx.options.source, ctx.now());
    summary.plan_only = ctx.options.plan_only;
    ctx.info(format!("{operation} started ({} run).", ctx.options.source));

    // 1. Approved structural edits land before the bindings are read
    if ctx.options.touches_structure() {
        summary.requests = process_change_requests(ctx).await?;
    }

    // 2. Bindings
    summary.folders = process_managed_folders(ctx).await?;
    summary.groups = process_user_groups(ctx).await?;

    // 3. Sheet editors, only on unfiltered runs
    if ctx.options.rows.is_empty() && ctx.options.name_prefix.is_none() {
        summary.editors = sync_sheet_editors(ctx).await?;
    }

    summary.finished_at = ctx.now();
    ctx.info(summary.text());
    summary.log = ctx.log.lines();
    Ok(summary)
}

/// The reconciler with its collaborators, configuration, lock and notifier.
#[derive(Clone)]
pub struct Reconciler {
    remote: Collaborators,
    config: Arc<AppConfig>,
    lock: DynLock,
    notifier: DynNotifier,
}

impl Reconciler {
    pub fn new(
        remote: Collaborators,
        config: Arc<AppConfig>,
        lock: DynLock,
        notifier: DynNotifier,
    ) -> Self {
        Self {
            remote,
            config,
            lock,
            notifier,
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// A fresh context for one run.
    pub fn context(&self, options: SyncOptions) -> SyncContext {
        SyncContext::new(self.remote.clone(), self.config.clone(), options)
    }

    async fn acquire(&self) -> Result<Box<dyn LockLease>> {
        let lease = self
            .lock
            .acquire(&self.config.lock.name, self.config.lock_wait())
            .await?;
        tracing::debug!(lock = lease.name(), "sync lock acquired");
        Ok(lease)
    }

    async fn locked_passes(&self, ctx: &SyncContext, operation: &str) -> Result<RunSummary> {
        let _lease = self.acquire().await?;
        run_passes(ctx, operation).await
    }

    async fn record(&self, ctx: &SyncContext, state: SyncState, operation: &str, summary: String) {
        let status = SyncStatus {
            state,
            operation: operation.to_string(),
            summary,
            source: ctx.options.source,
            at: ctx.now(),
        };
        if let Err(e) = record_status(self.remote.properties.as_ref(), &status).await {
            tracing::warn!(error = %e, operation, "failed to record sync status");
        }
    }

    async fn notify(&self, notification: Notification) {
        if let Err(e) = self.notifier.notify(&notification).await {
            tracing::warn!(
                notifier = self.notifier.name(),
                error = %e,
                "failed to send notification"
            );
        }
    }

    /// Records a fatal failure and reports it.
    async fn fail(&self, ctx: &SyncContext, operation: &str, error: &EngineError) {
        let partially_applied = ctx.changes() > 0;
        ctx.error(format!("{operation} failed: {error}"));
        tracing::error!(
            operation,
            category = error.category(),
            changes = ctx.changes(),
            error = %error,
            "run aborted"
        );
        self.record(ctx, SyncState::Failed, operation, error.to_string())
            .await;
        self.notify(Notification::fatal(
            operation,
            &error.to_string(),
            partially_applied,
        ))
        .await;
    }

    async fn settle(
        &self,
        ctx: &SyncContext,
        operation: &str,
        outcome: Result<RunSummary>,
    ) -> Result<RunSummary> {
        match outcome {
            Ok(summary) => {
                let text = summary.text();
                self.record(ctx, SyncState::Success, operation, text.clone())
                    .await;
                if summary.totals().failed > 0 || !summary.row_errors().is_empty() {
                    self.notify(Notification::summary(operation, &text)).await;
                }
                Ok(summary)
            }
            Err(e) => {
                self.fail(ctx, operation, &e).await;
                Err(e)
            }
        }
    }

    /// Creates any missing control sheet. Returns the names created.
    pub async fn setup(&self) -> Result<Vec<String>> {
        let created = setup_control_sheets(self.remote.sheets.as_ref()).await?;
        if !created.is_empty() {
            tracing::info!(sheets = ?created, "control sheets created");
        }
        Ok(created)
    }

    /// Change requests, managed folders, user groups and sheet editors.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::LockUnavailable` when another sync holds the lock
    /// past the configured wait, and any other run-aborting error. Row-level
    /// failures are reported in the summary instead.
    pub async fn sync_all(&self, options: SyncOptions) -> Result<RunSummary> {
        let operation = operation_name(&options);
        let ctx = self.context(options);
        let outcome = self.locked_passes(&ctx, operation).await;
        self.settle(&ctx, operation, outcome).await
    }

    /// Add-only pass: nothing is removed and deletion rows are left alone.
    pub async fn sync_adds(&self) -> Result<RunSummary> {
        self.sync_all(SyncOptions::add_only()).await
    }

    /// Plans removals, asks `confirm`, then re-plans and removes.
    ///
    /// The lock is released while `confirm` runs, so the removals applied are
    /// recomputed from the state after confirmation.
    pub async fn sync_deletes<F>(&self, confirm: F) -> Result<DeletionOutcome>
    where
        F: FnOnce(&[SyncPlan]) -> bool,
    {
        let planning = self.context(SyncOptions::remove_only().planning());
        let plans: Vec<SyncPlan> = match self.locked_passes(&planning, "Deletion plan").await {
            Ok(summary) => summary
                .plans()
                .into_iter()
                .filter(|p| !p.to_remove.is_empty())
                .cloned()
                .collect(),
            Err(e) => {
                self.fail(&planning, "Deletion plan", &e).await;
                return Err(e);
            }
        };

        if plans.is_empty() {
            planning.info("No user removals are pending.");
            self.record(
                &planning,
                SyncState::Skipped,
                "Remove-only sync",
                "No user removals are pending.".to_string(),
            )
            .await;
            return Ok(DeletionOutcome::NothingPending);
        }

        if !confirm(&plans) {
            self.record(
                &planning,
                SyncState::Skipped,
                "Remove-only sync",
                "Deletion sync cancelled.".to_string(),
            )
            .await;
            return Ok(DeletionOutcome::Cancelled(plans));
        }

        let ctx = self.context(SyncOptions::remove_only());
        let outcome = self.locked_passes(&ctx, "Remove-only sync").await;
        self.settle(&ctx, "Remove-only sync", outcome)
            .await
            .map(DeletionOutcome::Applied)
    }

    /// Scheduled entry point: add-only sync when something changed.
    ///
    /// The snapshot is saved only after a successful run, so a failed run is
    /// retried on the next trigger.
    pub async fn auto_sync(&self) -> Result<AutoSyncOutcome> {
        let ctx = self.context(SyncOptions::add_only().with_source(SyncSource::AutoSync));
        if !self.config.auto_sync.enabled {
            tracing::info!("auto sync is disabled");
            return Ok(AutoSyncOutcome::Disabled);
        }

        let detection = match detect_changes(&ctx).await {
            Ok(detection) => detection,
            Err(e) => {
                self.fail(&ctx, "AutoSync", &e).await;
                return Err(e);
            }
        };
        if !detection.should_run {
            self.record(
                &ctx,
                SyncState::Skipped,
                "AutoSync",
                "No changes detected since the last snapshot.".to_string(),
            )
            .await;
            return Ok(AutoSyncOutcome::Unchanged(detection));
        }
        for reason in &detection.reasons {
            ctx.info(format!("AutoSync triggered: {reason}"));
        }

        let outcome = self.locked_auto_sync(&ctx).await;
        let summary = self.settle(&ctx, "AutoSync", outcome).await?;
        Ok(AutoSyncOutcome::Ran { detection, summary })
    }

    async fn locked_auto_sync(&self, ctx: &SyncContext) -> Result<RunSummary> {
        let _lease = self.acquire().await?;
        let summary = run_passes(ctx, "AutoSync").await?;
        // The run itself may have changed sheets; capture after it.
        let (snapshot, failures) = capture_snapshot(ctx).await?;
        if failures.is_empty() {
            save_snapshot(ctx, &snapshot).await?;
        } else {
            for failure in failures {
                ctx.warn(failure);
            }
        }
        Ok(summary)
    }

    /// Change detection without syncing.
    pub async fn detect_changes(&self) -> Result<ChangeDetection> {
        let ctx = self.context(SyncOptions::default().with_source(SyncSource::AutoSync));
        detect_changes(&ctx).await
    }

    /// Appends manually added group members to a user sheet.
    pub async fn merge_sync(&self, sheet: &str, group_email: &str) -> Result<MergeReport> {
        let ctx = self.context(SyncOptions::add_only());
        let _lease = self.acquire().await?;
        merge_sync(&ctx, sheet, group_email).await
    }

    /// Evaluates pending change requests without a binding sync.
    pub async fn process_change_requests(&self) -> Result<RequestsReport> {
        let ctx = self.context(SyncOptions::default());
        let _lease = self.acquire().await?;
        process_change_requests(&ctx).await
    }

    pub async fn submit(&self, proposal: ChangeProposal) -> Result<SubmitOutcome> {
        let ctx = self.context(SyncOptions::default());
        let _lease = self.acquire().await?;
        submit_change_request(&ctx, proposal).await
    }

    pub async fn approve(&self, request_id: &str, approver: &str) -> Result<ChangeRequest> {
        let ctx = self.context(SyncOptions::default());
        let _lease = self.acquire().await?;
        approve(&ctx, request_id, approver).await
    }

    pub async fn reject(
        &self,
        request_id: &str,
        approver: &str,
        reason: Option<&str>,
    ) -> Result<ChangeRequest> {
        let ctx = self.context(SyncOptions::default());
        let _lease = self.acquire().await?;
        reject(&ctx, request_id, approver, reason).await
    }

    pub async fn list_requests(&self) -> Result<Vec<ChangeRequest>> {
        list_change_requests(&self.context(SyncOptions::default())).await
    }

    pub async fn last_status(&self) -> Result<Option<SyncStatus>> {
        load_status(self.remote.properties.as_ref()).await
    }
}
