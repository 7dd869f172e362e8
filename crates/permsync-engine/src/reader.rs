//! Desired-state reader: control-sheet rows to typed bindings and member lists.
//!
//! Malformed rows never raise. Binding rows get `Error: <message>` in their
//! Status cell, member rows are logged and left out of the desired set.

use permsync_core::{
    CellValue, CoreError, FolderBinding, FolderRole, GroupBinding, MembershipEntry,
    is_disabled_value, parse_single_email,
};

use crate::context::SyncContext;
use crate::error::Result;
use crate::sheets::{MANAGED_FOLDERS, SheetTable, USER_GROUPS};

/// Marker written into Status for rows that failed.
pub fn error_status(message: &str) -> String {
    format!("Error: {message}")
}

/// Reads the selected ManagedFolders rows.
pub async fn read_folder_bindings(ctx: &SyncContext) -> Result<Vec<FolderBinding>> {
    let Some(table) = SheetTable::read(ctx.remote.sheets.as_ref(), MANAGED_FOLDERS).await? else {
        ctx.warn(format!("Sheet \"{MANAGED_FOLDERS}\" not found."));
        return Ok(Vec::new());
    };

    let mut bindings = Vec::new();
    for (idx, row) in table.rows() {
        let folder_name = table.text(row, "FolderName");
        if !ctx.options.selects(idx, &folder_name) {
            continue;
        }
        match parse_folder_row(&table, idx, row) {
            Ok(binding) => bindings.push(binding),
            Err(e) => flag_row(ctx, &table, idx, &e.to_string()).await?,
        }
    }
    Ok(bindings)
}

/// Reads the selected UserGroups rows.
pub async fn read_group_bindings(ctx: &SyncContext) -> Result<Vec<GroupBinding>> {
    let Some(table) = SheetTable::read(ctx.remote.sheets.as_ref(), USER_GROUPS).await? else {
        return Ok(Vec::new());
    };

    let mut bindings = Vec::new();
    for (idx, row) in table.rows() {
        let group_name = table.text(row, "GroupName");
        if !ctx.options.selects(idx, &group_name) {
            continue;
        }
        if group_name.is_empty() {
            flag_row(ctx, &table, idx, "Group name is required.").await?;
            continue;
        }
        bindings.push(GroupBinding {
            row: idx,
            group_name,
            group_email: non_empty(table.text(row, "GroupEmail")).map(|e| e.to_lowercase()),
            source_sheet_name: non_empty(table.text(row, "UserSheetName")),
            delete_requested: table
                .headers
                .cell(row, "Delete")
                .is_some_and(is_disabled_value),
        });
    }
    Ok(bindings)
}

fn parse_folder_row(
    table: &SheetTable,
    idx: usize,
    row: &[CellValue],
) -> permsync_core::Result<FolderBinding> {
    let folder_name = table.text(row, "FolderName");
    let folder_id = non_empty(table.text(row, "FolderID"));
    if folder_name.is_empty() && folder_id.is_none() {
        return Err(CoreError::validation("Folder name or folder ID is required."));
    }
    let role_text = table.text(row, "Role");
    if role_text.is_empty() {
        return Err(CoreError::validation("Role is required."));
    }
    let role: FolderRole = role_text.parse()?;

    Ok(FolderBinding {
        row: idx,
        folder_name,
        folder_id,
        role,
        group_email: non_empty(table.text(row, "GroupEmail")).map(|e| e.to_lowercase()),
        user_sheet_name: non_empty(table.text(row, "UserSheetName")),
        delete_requested: table
            .headers
            .cell(row, "Delete")
            .is_some_and(is_disabled_value),
    })
}

async fn flag_row(ctx: &SyncContext, table: &SheetTable, idx: usize, message: &str) -> Result<()> {
    ctx.error(format!(
        "Row {idx} in sheet \"{}\" is invalid: {message}",
        table.name
    ));
    if !ctx.options.plan_only {
        table
            .write(ctx.remote.sheets.as_ref(), idx, "Status", error_status(message))
            .await?;
    }
    Ok(())
}

fn non_empty(value: String) -> Option<String> {
    (!value.is_empty()).then_some(value)
}

/// Desired membership of one user sheet.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DesiredMembers {
    /// Active entries, one per address, in sheet order.
    pub active: Vec<MembershipEntry>,
    /// Disabled entries kept for audit; never part of the desired set.
    pub disabled: Vec<MembershipEntry>,
    /// Rows rejected by validation, with their message.
    pub invalid: Vec<(usize, String)>,
    /// Every address that appears on the sheet, disabled ones included.
    pub all_emails: Vec<String>,
}

impl DesiredMembers {
    pub fn contains_active(&self, email: &str) -> bool {
        self.active.iter().any(|m| m.email == email)
    }

    pub fn is_disabled(&self, email: &str) -> bool {
        !self.contains_active(email) && self.disabled.iter().any(|m| m.email == email)
    }
}

/// Reads a member list (user sheet or SheetEditors). `None` if the sheet is missing.
///
/// The address comes from the `Email` column, or column 1 when the sheet has
/// no such header.
pub async fn read_members(ctx: &SyncContext, sheet_name: &str) -> Result<Option<DesiredMembers>> {
    let Some(table) = SheetTable::read(ctx.remote.sheets.as_ref(), sheet_name).await? else {
        return Ok(None);
    };
    let desired = members_from_table(ctx, &table);
    ctx.info(format!(
        "Found {} active emails in sheet \"{}\" (skipped {} disabled entries).",
        desired.active.len(),
        sheet_name,
        desired.disabled.len()
    ));
    Ok(Some(desired))
}

pub fn members_from_table(ctx: &SyncContext, table: &SheetTable) -> DesiredMembers {
    let email_col = table.headers.col("Email").unwrap_or(1);
    let disabled_col = table.headers.col("Disabled");

    let mut desired = DesiredMembers::default();
    for (idx, row) in table.rows() {
        let raw = row
            .get(email_col - 1)
            .map(CellValue::as_text)
            .unwrap_or_default();
        let email = match parse_single_email(&raw) {
            Ok(Some(email)) => email,
            Ok(None) => continue,
            Err(CoreError::MultipleEmails(value)) => {
                let message = format!(
                    "Row {idx} in sheet \"{}\" contains multiple email addresses (\"{value}\"); it was skipped.",
                    table.name
                );
                ctx.error(message.clone());
                desired.invalid.push((idx, message));
                continue;
            }
            Err(e) => {
                let message = format!("Row {idx} in sheet \"{}\": {e}", table.name);
                ctx.error(message.clone());
                desired.invalid.push((idx, message));
                continue;
            }
        };

        let disabled = disabled_col
            .and_then(|col| row.get(col - 1))
            .is_some_and(is_disabled_value);

        if !desired.all_emails.contains(&email) {
            desired.all_emails.push(email.clone());
        }
        if disabled {
            if !desired.disabled.iter().any(|m| m.email == email) {
                desired
                    .disabled
                    .push(MembershipEntry::member(email).disabled(true));
            }
        } else if !desired.contains_active(&email) {
            desired.active.push(MembershipEntry::member(email));
        }
    }
    desired
}
