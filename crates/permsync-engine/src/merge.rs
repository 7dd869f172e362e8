//! Merge sync: pull manually added group members back into the sheet.

use permsync_core::{CellValue, normalize_email};
use serde::{Deserialize, Serialize};

use crate::context::SyncContext;
use crate::error::Result;
use crate::fetcher::fetch_members;
use crate::reader::members_from_table;
use crate::sheets::SheetTable;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MergeReport {
    pub sheet: String,
    pub group_email: String,
    /// Addresses appended to the sheet, in group order.
    pub appended: Vec<String>,
    pub skipped: bool,
}

/// Appends every group member missing from the sheet. Never removes.
///
/// Disabled sheet entries count as present, so a soft-disabled address is
/// not appended a second time.
pub async fn merge_sync(ctx: &SyncContext, sheet_name: &str, group_email: &str) -> Result<MergeReport> {
    let group_email = normalize_email(group_email);
    let mut report = MergeReport {
        sheet: sheet_name.to_string(),
        group_email: group_email.clone(),
        ..MergeReport::default()
    };

    let sheets = ctx.remote.sheets.as_ref();
    let Some(table) = SheetTable::read(sheets, sheet_name).await? else {
        ctx.warn(format!(
            "User sheet \"{sheet_name}\" not found. Skipping reconciliation."
        ));
        report.skipped = true;
        return Ok(report);
    };

    let on_sheet = members_from_table(ctx, &table).all_emails;
    let observed = fetch_members(ctx, &group_email).await?;
    let manually_added: Vec<String> = observed
        .iter()
        .map(|m| m.email.clone())
        .filter(|e| !on_sheet.contains(e))
        .collect();

    if manually_added.is_empty() {
        ctx.info(format!(
            "Sheet \"{sheet_name}\" already lists every member of {group_email}."
        ));
        return Ok(report);
    }
    if ctx.options.plan_only {
        report.appended = manually_added;
        return Ok(report);
    }

    let email_col = table.headers.col("Email").unwrap_or(1);
    for email in &manually_added {
        let mut row = table.headers.blank_row();
        if row.len() < email_col {
            row.resize(email_col, CellValue::Empty);
        }
        row[email_col - 1] = CellValue::text(email.as_str());
        sheets.append_row(sheet_name, &row).await?;
        ctx.record_change();
    }
    ctx.info(format!(
        "Merged {} manually added member(s) of {group_email} into sheet \"{sheet_name}\".",
        manually_added.len()
    ));
    report.appended = manually_added;
    Ok(report)
}
