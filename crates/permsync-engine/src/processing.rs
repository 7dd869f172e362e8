//! ManagedFolders and UserGroups row processing.
//!
//! Each row is handled on its own: a failing row gets `Error: <message>` in
//! its Status cell and the pass moves on. Only fatal errors stop the pass.

use std::collections::HashSet;

use permsync_core::{FolderBinding, FolderRole, GroupBinding, generate_group_email};
use permsync_storage::StorageError;
use serde::{Deserialize, Serialize};

use crate::context::SyncContext;
use crate::diff::SyncPlan;
use crate::error::{EngineError, Result};
use crate::executor::ApplySummary;
use crate::folders::{ensure_folder_access, resolve_folder};
use crate::groups::{delete_group, get_or_create_group};
use crate::membership::{plan_membership, sync_membership};
use crate::reader::{error_status, read_folder_bindings, read_group_bindings};
use crate::sheets::{MANAGED_FOLDERS, SheetTable, USER_GROUPS, USER_SHEET_HEADERS, header_row};

/// Outcome of one control-sheet pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SectionReport {
    pub processed: usize,
    pub errors: Vec<RowError>,
    pub deleted: usize,
    pub plans: Vec<SyncPlan>,
    pub summary: ApplySummary,
}

impl SectionReport {
    fn absorb(&mut self, plan: SyncPlan, summary: ApplySummary) {
        if !plan.is_empty() {
            self.plans.push(plan);
        }
        self.summary.merge(summary);
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowError {
    pub sheet: String,
    pub row: usize,
    pub message: String,
}

/// Group address for a binding: the row's own value, else derived from the
/// user-sheet name.
pub fn group_email_for(
    ctx: &SyncContext,
    existing: Option<&str>,
    sheet_name: &str,
) -> Result<String> {
    match existing.map(str::trim).filter(|e| !e.is_empty()) {
        Some(email) => Ok(email.to_lowercase()),
        None => Ok(generate_group_email(
            sheet_name,
            ctx.config.workspace.domain.as_deref(),
        )?),
    }
}

pub async fn process_managed_folders(ctx: &SyncContext) -> Result<SectionReport> {
    let bindings = read_folder_bindings(ctx).await?;
    let mut report = SectionReport::default();
    let mut deletions = Vec::new();
    let mut seen = HashSet::new();

    for binding in bindings {
        if binding.delete_requested {
            deletions.push(binding);
            continue;
        }
        let (folder, role) = binding_key(&binding);
        let result = if !seen.insert((folder.clone(), role)) {
            Err(EngineError::validation(format!(
                "Duplicate binding for folder \"{folder}\" role {role}"
            )))
        } else if ctx.options.touches_structure() {
            process_folder_row(ctx, &binding).await
        } else {
            membership_only(
                ctx,
                binding.user_sheet_name.as_deref(),
                &binding.expected_sheet_name(),
                binding.group_email.as_deref(),
            )
            .await
        };
        settle(ctx, MANAGED_FOLDERS, binding.row, result, &mut report).await?;
    }

    if deletions_allowed(ctx, MANAGED_FOLDERS, deletions.len()) {
        deletions.sort_by_key(|b| std::cmp::Reverse(b.row));
        for binding in &deletions {
            let result = delete_folder_row(ctx, binding).await;
            settle_deletion(ctx, MANAGED_FOLDERS, binding.row, result, &mut report).await?;
        }
    }

    tracing::info!(
        processed = report.processed,
        errors = report.errors.len(),
        added = report.summary.added,
        removed = report.summary.removed,
        "managed folders processed"
    );
    Ok(report)
}

/// A folder grants each role through one binding: keyed by folder id, else
/// by the folder name.
fn binding_key(binding: &FolderBinding) -> (String, FolderRole) {
    let folder = binding
        .folder_id
        .as_deref()
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map_or_else(|| binding.folder_name.trim().to_lowercase(), str::to_string);
    (folder, binding.role)
}

pub async fn process_user_groups(ctx: &SyncContext) -> Result<SectionReport> {
    let bindings = read_group_bindings(ctx).await?;
    let mut report = SectionReport::default();
    let mut deletions = Vec::new();

    for binding in bindings {
        if binding.delete_requested {
            deletions.push(binding);
            continue;
        }
        let result = if ctx.options.touches_structure() {
            process_group_row(ctx, &binding).await
        } else {
            membership_only(
                ctx,
                binding.source_sheet_name.as_deref(),
                &binding.expected_sheet_name(),
                binding.group_email.as_deref(),
            )
            .await
        };
        settle(ctx, USER_GROUPS, binding.row, result, &mut report).await?;
    }

    if deletions_allowed(ctx, USER_GROUPS, deletions.len()) {
        deletions.sort_by_key(|b| std::cmp::Reverse(b.row));
        for binding in &deletions {
            let result = delete_group_row(ctx, binding).await;
            settle_deletion(ctx, USER_GROUPS, binding.row, result, &mut report).await?;
        }
    }

    tracing::info!(
        processed = report.processed,
        errors = report.errors.len(),
        "user groups processed"
    );
    Ok(report)
}

type RowOutcome = Result<(SyncPlan, ApplySummary)>;

/// Records a row result; row-level errors go to the Status cell.
async fn settle(
    ctx: &SyncContext,
    sheet: &str,
    row: usize,
    result: RowOutcome,
    report: &mut SectionReport,
) -> Result<()> {
    match result {
        Ok((plan, summary)) => {
            report.processed += 1;
            report.absorb(plan, summary);
            Ok(())
        }
        Err(e) if e.is_fatal() => Err(e),
        Err(e) => {
            let message = e.to_string();
            ctx.error(format!("Row {row} in sheet \"{sheet}\" failed: {message}"));
            if !ctx.options.plan_only {
                write_status(ctx, sheet, row, &error_status(&message)).await?;
            }
            report.errors.push(RowError {
                sheet: sheet.to_string(),
                row,
                message,
            });
            Ok(())
        }
    }
}

async fn write_status(ctx: &SyncContext, sheet: &str, row: usize, status: &str) -> Result<()> {
    if let Some(table) = SheetTable::read(ctx.remote.sheets.as_ref(), sheet).await? {
        table
            .write(ctx.remote.sheets.as_ref(), row, "Status", status)
            .await?;
    }
    Ok(())
}

/// Plan (and for remove-only runs, apply) without touching structure.
async fn membership_only(
    ctx: &SyncContext,
    current_sheet: Option<&str>,
    expected_sheet: &str,
    group_email: Option<&str>,
) -> RowOutcome {
    let sheet_name = current_sheet.unwrap_or(expected_sheet);
    let group_email = group_email_for(ctx, group_email, sheet_name)?;
    if ctx.options.plan_only {
        let plan = plan_membership(ctx, sheet_name, &group_email)
            .await?
            .unwrap_or_default();
        return Ok((plan, ApplySummary::default()));
    }
    let outcome = sync_membership(ctx, sheet_name, &group_email).await?;
    Ok((outcome.plan, outcome.summary))
}

/// Renames a stale user sheet and creates a missing one. Returns the final name.
async fn ensure_user_sheet(
    ctx: &SyncContext,
    current: Option<&str>,
    expected: &str,
) -> Result<String> {
    let sheets = ctx.remote.sheets.as_ref();
    let names = sheets.sheet_names().await?;
    let exists = |name: &str| names.iter().any(|n| n == name);

    let stale = current.filter(|c| *c != expected && exists(c));
    if let Some(current) = stale {
        if exists(expected) {
            return Err(EngineError::validation(format!(
                "Cannot rename user sheet \"{current}\" to \"{expected}\": a sheet with that name already exists."
            )));
        }
        sheets.rename_sheet(current, expected).await?;
        ctx.record_change();
        ctx.info(format!("Renamed user sheet \"{current}\" to \"{expected}\"."));
        return Ok(expected.to_string());
    }

    if !exists(expected) {
        match sheets
            .create_sheet(expected, &header_row(USER_SHEET_HEADERS))
            .await
        {
            Ok(()) | Err(StorageError::AlreadyExists { .. }) => {}
            Err(e) => return Err(e.into()),
        }
        ctx.record_change();
        ctx.info(format!("Created user sheet \"{expected}\"."));
    }
    Ok(expected.to_string())
}

async fn process_folder_row(ctx: &SyncContext, binding: &FolderBinding) -> RowOutcome {
    // 1. Folder
    let resolved = resolve_folder(ctx, &binding.folder_name, binding.folder_id.as_deref()).await?;
    let folder = resolved.folder;
    let folder_name = if binding.folder_name.is_empty() {
        folder.name.clone()
    } else {
        binding.folder_name.clone()
    };

    // 2. User sheet
    let expected = permsync_core::user_sheet_name_for(&folder_name, binding.role);
    let sheet_name =
        ensure_user_sheet(ctx, binding.user_sheet_name.as_deref(), &expected).await?;

    // 3. Group and folder access
    let group_email = group_email_for(ctx, binding.group_email.as_deref(), &sheet_name)?;
    get_or_create_group(ctx, &group_email, &sheet_name).await?;
    ensure_folder_access(ctx, &folder.id, &group_email, binding.role).await?;

    // 4. Membership
    let outcome = sync_membership(ctx, &sheet_name, &group_email).await?;

    // 5. Row bookkeeping
    let sheets = ctx.remote.sheets.as_ref();
    if let Some(table) = SheetTable::read(sheets, MANAGED_FOLDERS).await? {
        let row = binding.row;
        if binding.folder_name.is_empty() {
            table.write(sheets, row, "FolderName", folder_name.as_str()).await?;
        }
        table.write(sheets, row, "FolderID", folder.id.as_str()).await?;
        table.write(sheets, row, "URL", folder.url.as_str()).await?;
        table.write(sheets, row, "UserSheetName", sheet_name.as_str()).await?;
        table.write(sheets, row, "GroupEmail", group_email.as_str()).await?;
        table
            .write(sheets, row, "LastSynced", ctx.now().to_string())
            .await?;
        table.write(sheets, row, "Status", "OK").await?;
    }

    Ok((outcome.plan, outcome.summary))
}

async fn process_group_row(ctx: &SyncContext, binding: &GroupBinding) -> RowOutcome {
    let expected = binding.expected_sheet_name();
    let sheet_name =
        ensure_user_sheet(ctx, binding.source_sheet_name.as_deref(), &expected).await?;

    let group_email = group_email_for(ctx, binding.group_email.as_deref(), &sheet_name)?;
    get_or_create_group(ctx, &group_email, &binding.group_name).await?;

    let outcome = sync_membership(ctx, &sheet_name, &group_email).await?;

    let sheets = ctx.remote.sheets.as_ref();
    if let Some(table) = SheetTable::read(sheets, USER_GROUPS).await? {
        let row = binding.row;
        table.write(sheets, row, "GroupEmail", group_email.as_str()).await?;
        table.write(sheets, row, "UserSheetName", sheet_name.as_str()).await?;
        table
            .write(sheets, row, "LastSynced", ctx.now().to_string())
            .await?;
        table.write(sheets, row, "Status", "OK").await?;
    }

    Ok((outcome.plan, outcome.summary))
}

/// Deletion rows only run in full mode, and run last and bottom-up so earlier
/// row numbers stay valid.
fn deletions_allowed(ctx: &SyncContext, sheet: &str, count: usize) -> bool {
    if count == 0 {
        return false;
    }
    if !ctx.options.is_full() || ctx.options.plan_only || !ctx.config.sync.process_deletions {
        ctx.info(format!(
            "Skipping {count} deletion row(s) in sheet \"{sheet}\" for this run mode."
        ));
        return false;
    }
    true
}

async fn settle_deletion(
    ctx: &SyncContext,
    sheet: &str,
    row: usize,
    result: Result<()>,
    report: &mut SectionReport,
) -> Result<()> {
    match result {
        Ok(()) => {
            report.deleted += 1;
            Ok(())
        }
        Err(e) => settle(ctx, sheet, row, Err(e), report).await,
    }
}

async fn delete_folder_row(ctx: &SyncContext, binding: &FolderBinding) -> Result<()> {
    let sheet_name = binding
        .user_sheet_name
        .clone()
        .unwrap_or_else(|| binding.expected_sheet_name());
    let group_email = group_email_for(ctx, binding.group_email.as_deref(), &sheet_name)?;

    if let Some(id) = binding.folder_id.as_deref() {
        match ctx.remote.folders.revoke_access(id, &group_email).await {
            Ok(()) => ctx.record_change(),
            Err(StorageError::NotFound { .. }) => {}
            Err(e) => return Err(e.into()),
        }
    }
    if !group_still_referenced(ctx, MANAGED_FOLDERS, binding.row, &group_email).await? {
        delete_group(ctx, &group_email).await?;
    }
    delete_sheet_if_present(ctx, &sheet_name).await?;
    ctx.remote.sheets.delete_row(MANAGED_FOLDERS, binding.row).await?;
    ctx.record_change();
    ctx.info(format!(
        "Deleted folder binding \"{}\" ({}) from row {}.",
        binding.folder_name, binding.role, binding.row
    ));
    Ok(())
}

async fn delete_group_row(ctx: &SyncContext, binding: &GroupBinding) -> Result<()> {
    let sheet_name = binding
        .source_sheet_name
        .clone()
        .unwrap_or_else(|| binding.expected_sheet_name());
    let group_email = group_email_for(ctx, binding.group_email.as_deref(), &sheet_name)?;

    if !group_still_referenced(ctx, USER_GROUPS, binding.row, &group_email).await? {
        delete_group(ctx, &group_email).await?;
    }
    delete_sheet_if_present(ctx, &sheet_name).await?;
    ctx.remote.sheets.delete_row(USER_GROUPS, binding.row).await?;
    ctx.record_change();
    ctx.info(format!(
        "Deleted user group \"{}\" from row {}.",
        binding.group_name, binding.row
    ));
    Ok(())
}

/// Whether any other binding row still uses the group.
async fn group_still_referenced(
    ctx: &SyncContext,
    sheet: &str,
    row: usize,
    group_email: &str,
) -> Result<bool> {
    for name in [MANAGED_FOLDERS, USER_GROUPS] {
        let Some(table) = SheetTable::read(ctx.remote.sheets.as_ref(), name).await? else {
            continue;
        };
        let shared = table.rows().any(|(idx, cells)| {
            !(name == sheet && idx == row)
                && table.text(cells, "GroupEmail").eq_ignore_ascii_case(group_email)
        });
        if shared {
            return Ok(true);
        }
    }
    Ok(false)
}

async fn delete_sheet_if_present(ctx: &SyncContext, sheet_name: &str) -> Result<()> {
    match ctx.remote.sheets.delete_sheet(sheet_name).await {
        Ok(()) => {
            ctx.record_change();
            Ok(())
        }
        Err(StorageError::NotFound { .. }) => Ok(()),
        Err(e) => Err(e.into()),
    }
}
