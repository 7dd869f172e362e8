//! SheetEditors sync: the editors group and the spreadsheet's own editor list.

use permsync_core::{generate_group_email, normalize_email};
use serde::{Deserialize, Serialize};

use crate::context::SyncContext;
use crate::diff::{SyncPlan, diff};
use crate::error::Result;
use crate::executor::{ApplySummary, apply_plan};
use crate::fetcher::fetch_members;
use crate::groups::get_or_create_group;
use crate::reader::{DesiredMembers, members_from_table};
use crate::sheets::{SHEET_EDITORS, SheetTable};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EditorsReport {
    pub group_email: String,
    /// Pending editors-group changes, kept when not empty.
    pub plan: Option<SyncPlan>,
    pub group: ApplySummary,
    pub editors_added: Vec<String>,
    pub editors_removed: Vec<String>,
    pub skipped: bool,
}

/// Address of the sheet-editors group.
pub async fn editors_group_email(ctx: &SyncContext) -> Result<String> {
    if let Some(email) = ctx
        .config
        .workspace
        .sheet_editors_group_email
        .as_deref()
        .filter(|e| !e.trim().is_empty())
    {
        return Ok(normalize_email(email));
    }
    let name = ctx.remote.sheets.spreadsheet_name().await?;
    Ok(generate_group_email(
        &format!("{name} editors"),
        ctx.config.workspace.domain.as_deref(),
    )?)
}

async fn read_editors(ctx: &SyncContext) -> Result<Option<DesiredMembers>> {
    let Some(table) = SheetTable::read(ctx.remote.sheets.as_ref(), SHEET_EDITORS).await? else {
        return Ok(None);
    };
    Ok(Some(members_from_table(ctx, &table)))
}

/// Active (non-disabled) sheet editors. Falls back to the spreadsheet's
/// editor list when there is no SheetEditors sheet.
pub async fn active_editors(ctx: &SyncContext) -> Result<Vec<String>> {
    match read_editors(ctx).await? {
        Some(desired) => Ok(desired.active.into_iter().map(|m| m.email).collect()),
        None => Ok(ctx.remote.sheets.editors().await?),
    }
}

/// Syncs SheetEditors into the editors group and the spreadsheet editors.
///
/// Unlike user sheets, disabled rows are removed in full mode. The
/// spreadsheet owner is never removed.
pub async fn sync_sheet_editors(ctx: &SyncContext) -> Result<EditorsReport> {
    let Some(desired) = read_editors(ctx).await? else {
        ctx.warn(format!("Sheet \"{SHEET_EDITORS}\" not found. Skipping editor sync."));
        return Ok(EditorsReport {
            skipped: true,
            ..EditorsReport::default()
        });
    };
    ctx.info(format!(
        "Found {} active emails in sheet \"{SHEET_EDITORS}\" (skipped {} disabled entries).",
        desired.active.len(),
        desired.disabled.len()
    ));

    let group_email = editors_group_email(ctx).await?;
    let owner = ctx.remote.sheets.owner().await?.map(|o| normalize_email(&o));
    let mut report = EditorsReport {
        group_email: group_email.clone(),
        ..EditorsReport::default()
    };

    // 1. Editors group
    if ctx.options.touches_structure() {
        get_or_create_group(ctx, &group_email, &format!("{SHEET_EDITORS} group")).await?;
    }
    let observed = fetch_members(ctx, &group_email).await?;
    let mut plan = diff(&group_email, SHEET_EDITORS, &desired, &observed, true)
        .restrict(ctx.options.allows_adds(), ctx.options.allows_removals());
    plan.to_remove
        .retain(|m| owner.as_deref() != Some(m.email.as_str()));
    if !plan.is_empty() {
        report.group = apply_plan(ctx, &plan).await;
        report.plan = Some(plan);
    }

    if ctx.options.plan_only {
        return Ok(report);
    }

    // 2. Spreadsheet editors
    let current: Vec<String> = ctx
        .remote
        .sheets
        .editors()
        .await?
        .iter()
        .map(|e| normalize_email(e))
        .collect();

    if ctx.options.allows_adds() {
        let missing: Vec<String> = desired
            .active
            .iter()
            .map(|m| m.email.clone())
            .filter(|e| !current.contains(e))
            .collect();
        if !missing.is_empty() {
            ctx.remote.sheets.add_editors(&missing).await?;
            ctx.record_change();
            ctx.info(format!("Added {} spreadsheet editor(s).", missing.len()));
            report.editors_added = missing;
        }
    }

    if ctx.options.allows_removals() {
        for email in &current {
            if desired.contains_active(email) || owner.as_deref() == Some(email.as_str()) {
                continue;
            }
            match ctx.remote.sheets.remove_editor(email).await {
                Ok(()) => {
                    ctx.record_change();
                    report.editors_removed.push(email.clone());
                }
                Err(e) => ctx.error(format!("Failed to remove spreadsheet editor {email}: {e}")),
            }
        }
        if !report.editors_removed.is_empty() {
            ctx.info(format!(
                "Removed {} spreadsheet editor(s).",
                report.editors_removed.len()
            ));
        }
    }

    Ok(report)
}
