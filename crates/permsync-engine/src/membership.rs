//! Sheet-to-group membership sync for one binding.

use crate::context::SyncContext;
use crate::diff::{SyncPlan, diff};
use crate::error::Result;
use crate::executor::{ApplySummary, apply_plan};
use crate::fetcher::fetch_members;
use crate::reader::read_members;

/// Plan and outcome of one membership sync.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MembershipOutcome {
    pub plan: SyncPlan,
    pub summary: ApplySummary,
}

/// Plans the changes that would bring `group_email` in line with `sheet_name`,
/// restricted to what the run's mode allows. `None` if the sheet is missing.
pub async fn plan_membership(
    ctx: &SyncContext,
    sheet_name: &str,
    group_email: &str,
) -> Result<Option<SyncPlan>> {
    let Some(desired) = read_members(ctx, sheet_name).await? else {
        ctx.warn(format!("User sheet \"{sheet_name}\" not found."));
        return Ok(None);
    };
    let observed = fetch_members(ctx, group_email).await?;
    let plan = diff(
        group_email,
        sheet_name,
        &desired,
        &observed,
        ctx.config.sync.remove_disabled_members,
    )
    .restrict(ctx.options.allows_adds(), ctx.options.allows_removals());
    Ok(Some(plan))
}

/// Plans and, unless the run is plan-only, applies.
pub async fn sync_membership(
    ctx: &SyncContext,
    sheet_name: &str,
    group_email: &str,
) -> Result<MembershipOutcome> {
    let Some(plan) = plan_membership(ctx, sheet_name, group_email).await? else {
        return Ok(MembershipOutcome::default());
    };
    if plan.is_empty() {
        return Ok(MembershipOutcome {
            plan,
            summary: ApplySummary::default(),
        });
    }

    ctx.info(format!(
        "Group {group_email}: {} to add, {} to remove.",
        plan.to_add.len(),
        plan.to_remove.len()
    ));
    let summary = apply_plan(ctx, &plan).await;
    Ok(MembershipOutcome { plan, summary })
}
