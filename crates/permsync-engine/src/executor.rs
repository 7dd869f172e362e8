//! Apply executor: batched member mutations with chunk-level retry.

use std::time::Duration;

use permsync_core::MembershipEntry;
use permsync_storage::{DirectoryMember, StorageError};
use serde::{Deserialize, Serialize};

use crate::context::SyncContext;
use crate::diff::SyncPlan;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemberAction {
    Add,
    Remove,
}

impl std::fmt::Display for MemberAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Add => write!(f, "add"),
            Self::Remove => write!(f, "remove"),
        }
    }
}

/// A member that could not be changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberFailure {
    pub group_email: String,
    pub email: String,
    pub action: MemberAction,
    pub error: String,
}

/// Counts of what an apply did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplySummary {
    pub added: usize,
    pub removed: usize,
    pub failed: usize,
    /// Already in the requested state on the remote side.
    pub unchanged: usize,
    pub failures: Vec<MemberFailure>,
}

impl ApplySummary {
    pub fn merge(&mut self, other: ApplySummary) {
        self.added += other.added;
        self.removed += other.removed;
        self.failed += other.failed;
        self.unchanged += other.unchanged;
        self.failures.extend(other.failures);
    }

    pub fn changed(&self) -> usize {
        self.added + self.removed
    }
}

impl std::fmt::Display for ApplySummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Added {}, removed {}, failed {}.",
            self.added, self.removed, self.failed
        )
    }
}

enum Outcome {
    Done,
    Unchanged,
    Retry(String),
    Failed(String),
}

/// Applies a plan. Individual failures are recorded, never raised.
///
/// Members are processed in chunks of `sync.membership_batch_size`. Within a
/// chunk, members whose call failed with a transient error are retried
/// together, up to `sync.max_retries` times with exponential backoff.
pub async fn apply_plan(ctx: &SyncContext, plan: &SyncPlan) -> ApplySummary {
    let mut summary = ApplySummary::default();
    if ctx.options.plan_only {
        return summary;
    }
    run_action(ctx, plan, MemberAction::Add, &plan.to_add, &mut summary).await;
    run_action(ctx, plan, MemberAction::Remove, &plan.to_remove, &mut summary).await;

    if summary.changed() > 0 || summary.failed > 0 {
        ctx.invalidate_members(&plan.group_email);
    }
    tracing::info!(
        group = %plan.group_email,
        added = summary.added,
        removed = summary.removed,
        failed = summary.failed,
        "membership applied"
    );
    summary
}

async fn run_action(
    ctx: &SyncContext,
    plan: &SyncPlan,
    action: MemberAction,
    entries: &[MembershipEntry],
    summary: &mut ApplySummary,
) {
    let sync = &ctx.config.sync;
    let batch_size = sync.membership_batch_size.max(1);

    for chunk in entries.chunks(batch_size) {
        let mut pending: Vec<&MembershipEntry> = chunk.iter().collect();
        let mut attempt: u32 = 0;
        loop {
            let mut retry = Vec::new();
            for entry in pending {
                match call(ctx, &plan.group_email, action, entry).await {
                    Outcome::Done => {
                        ctx.record_change();
                        match action {
                            MemberAction::Add => summary.added += 1,
                            MemberAction::Remove => summary.removed += 1,
                        }
                    }
                    Outcome::Unchanged => summary.unchanged += 1,
                    Outcome::Retry(error) => retry.push((entry, error)),
                    Outcome::Failed(error) => fail(ctx, plan, action, entry, error, summary),
                }
                ctx.pause(ctx.config.inter_call_delay()).await;
            }

            if retry.is_empty() {
                break;
            }
            if attempt >= sync.max_retries {
                for (entry, error) in retry {
                    fail(ctx, plan, action, entry, error, summary);
                }
                break;
            }
            let delay = backoff(ctx.config.retry_base_delay(), attempt);
            tracing::warn!(
                group = %plan.group_email,
                attempt = attempt + 1,
                members = retry.len(),
                delay_ms = delay.as_millis() as u64,
                "retrying chunk after transient failure"
            );
            ctx.pause(delay).await;
            attempt += 1;
            pending = retry.into_iter().map(|(entry, _)| entry).collect();
        }
    }
}

async fn call(
    ctx: &SyncContext,
    group_email: &str,
    action: MemberAction,
    entry: &MembershipEntry,
) -> Outcome {
    let result = match action {
        MemberAction::Add => {
            let member = DirectoryMember::new(entry.email.clone(), entry.role);
            ctx.remote.directory.insert_member(group_email, &member).await
        }
        MemberAction::Remove => {
            ctx.remote
                .directory
                .remove_member(group_email, &entry.email)
                .await
        }
    };
    match result {
        Ok(()) => Outcome::Done,
        Err(StorageError::AlreadyExists { .. }) if action == MemberAction::Add => {
            Outcome::Unchanged
        }
        Err(StorageError::NotFound { ref kind, .. })
            if action == MemberAction::Remove && kind == "member" =>
        {
            Outcome::Unchanged
        }
        Err(e) if e.is_transient() => Outcome::Retry(e.to_string()),
        Err(e) => Outcome::Failed(e.to_string()),
    }
}

fn fail(
    ctx: &SyncContext,
    plan: &SyncPlan,
    action: MemberAction,
    entry: &MembershipEntry,
    error: String,
    summary: &mut ApplySummary,
) {
    ctx.error(format!(
        "Failed to {action} {} in group {}: {error}",
        entry.email, plan.group_email
    ));
    summary.failed += 1;
    summary.failures.push(MemberFailure {
        group_email: plan.group_email.clone(),
        email: entry.email.clone(),
        action,
        error,
    });
}

/// `base * 2^attempt`, saturating.
pub fn backoff(base: Duration, attempt: u32) -> Duration {
    base.saturating_mul(2u32.saturating_pow(attempt))
}
