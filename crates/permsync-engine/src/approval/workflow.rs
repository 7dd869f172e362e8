//! Change-request state machine: PENDING → APPLIED | DENIED | EXPIRED.

use permsync_core::{CellValue, Timestamp, normalize_email, parse_single_email};
use permsync_storage::StorageError;
use serde::{Deserialize, Serialize};
use time::Duration;

use super::columns::{
    APPLIED_AT, DENY_REASON, REJECTED_BY, STATUS, approver_columns, parse_request, request_row,
};
use super::model::{ChangeAction, ChangeRequest, RequestStatus, approvals_needed};
use crate::context::SyncContext;
use crate::editors::active_editors;
use crate::error::{EngineError, Result};
use crate::sheets::{CHANGE_REQUESTS, CHANGE_REQUESTS_HEADERS, SheetTable, header_row};

/// What a processing pass did.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RequestsReport {
    pub applied: Vec<String>,
    pub denied: Vec<String>,
    pub expired: Vec<String>,
    pub pending: Vec<String>,
    /// Quorum cannot be reached with the current editors; nothing was evaluated.
    pub blocked: bool,
    /// Approvals are disabled or there is no ChangeRequests sheet.
    pub skipped: bool,
}

/// A structural edit waiting to be submitted.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeProposal {
    pub requested_by: String,
    pub target_sheet: String,
    pub target_row_key: String,
    pub action: ChangeAction,
    pub proposed: Vec<CellValue>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome {
    /// Applied directly; the sheet is unprotected or approvals are off.
    Applied,
    Pending(ChangeRequest),
}

enum Decision {
    Expire(String),
    Deny(String),
    Wait,
    Apply(usize),
}

/// Evaluates every PENDING request once.
pub async fn process_change_requests(ctx: &SyncContext) -> Result<RequestsReport> {
    let mut report = RequestsReport::default();
    if !ctx.config.approvals.enabled || ctx.options.plan_only {
        report.skipped = true;
        return Ok(report);
    }
    let sheets = ctx.remote.sheets.as_ref();
    let Some(table) = SheetTable::read(sheets, CHANGE_REQUESTS).await? else {
        report.skipped = true;
        return Ok(report);
    };

    // Checked before expiry: while the editor pool is short, requests wait
    // instead of expiring.
    let available = active_editors(ctx).await?.len();
    let required = ctx.config.approvals.required_approvals.clamp(1, 3);
    if required as usize > available {
        let message = format!(
            "Required approvals ({required}) exceeds active sheet editors ({available}). Change requests stay pending until more editors are active."
        );
        ctx.warn(message.clone());
        sheets.set_note(CHANGE_REQUESTS, 1, 1, &message).await?;
        report.blocked = true;
        return Ok(report);
    }

    let now = ctx.now();
    for (idx, row) in table.rows() {
        let request = match parse_request(&table, idx, row) {
            Ok(request) => request,
            Err(e) => {
                if table.text(row, STATUS).is_empty()
                    || table.text(row, STATUS).eq_ignore_ascii_case("pending")
                {
                    let reason = format!("Invalid request: {e}");
                    ctx.error(format!("Change request in row {idx}: {reason}"));
                    finish(ctx, &table, idx, RequestStatus::Denied, Some(&reason), None).await?;
                    report.denied.push(table.text(row, "RequestId"));
                }
                continue;
            }
        };
        if request.status.is_terminal() {
            continue;
        }

        match evaluate(ctx, &request, available, now).await? {
            Decision::Expire(reason) => {
                ctx.info(format!("Change request {} expired.", request.id));
                finish(ctx, &table, idx, RequestStatus::Expired, Some(&reason), None).await?;
                report.expired.push(request.id);
            }
            Decision::Deny(reason) => {
                ctx.warn(format!("Change request {} denied: {reason}", request.id));
                finish(ctx, &table, idx, RequestStatus::Denied, Some(&reason), None).await?;
                report.denied.push(request.id);
            }
            Decision::Wait => report.pending.push(request.id),
            Decision::Apply(target_row) => {
                apply_to_target(ctx, &request.target_sheet, target_row, &request).await?;
                finish(ctx, &table, idx, RequestStatus::Applied, None, Some(now)).await?;
                ctx.info(format!(
                    "Applied change request {} ({} on \"{}\" key \"{}\").",
                    request.id, request.action, request.target_sheet, request.target_row_key
                ));
                report.applied.push(request.id);
            }
        }
    }

    tracing::info!(
        applied = report.applied.len(),
        denied = report.denied.len(),
        expired = report.expired.len(),
        pending = report.pending.len(),
        "change requests processed"
    );
    Ok(report)
}

async fn evaluate(
    ctx: &SyncContext,
    request: &ChangeRequest,
    available: usize,
    now: Timestamp,
) -> Result<Decision> {
    // 1. Expiry
    let expiry_hours = ctx.config.approvals.expiry_hours;
    if let Some(requested_at) = request.requested_at.filter(|_| expiry_hours > 0) {
        let limit = Duration::hours(i64::try_from(expiry_hours).unwrap_or(i64::MAX / 3600));
        if now.since(&requested_at) > limit {
            return Ok(Decision::Expire(format!(
                "Expired after {expiry_hours} hour(s) without enough approvals."
            )));
        }
    }

    // 2. Explicit rejection
    if let Some(rejected_by) = &request.rejected_by {
        return Ok(Decision::Deny(
            request
                .deny_reason
                .clone()
                .unwrap_or_else(|| format!("Rejected by {rejected_by}.")),
        ));
    }

    // 3. Quorum must be attainable
    if request.approvals_needed as usize > available {
        let note = format!(
            "Needs {} approvals but only {available} active sheet editors are available.",
            request.approvals_needed
        );
        ctx.remote
            .sheets
            .set_note(CHANGE_REQUESTS, request.row, 1, &note)
            .await?;
        ctx.warn(format!("Change request {}: {note}", request.id));
        return Ok(Decision::Wait);
    }

    // 4. Quorum
    if !request.has_quorum() {
        return Ok(Decision::Wait);
    }

    // 5. Target row must be unique
    match resolve_target(ctx, &request.target_sheet, &request.target_row_key).await {
        Ok(row) => {
            if request.action == ChangeAction::Update && request.proposed.is_empty() {
                return Ok(Decision::Deny("ProposedRowSnapshot is empty.".to_string()));
            }
            Ok(Decision::Apply(row))
        }
        Err(e) if e.is_validation() || e.is_not_found() => Ok(Decision::Deny(e.to_string())),
        Err(e) => Err(e),
    }
}

/// Sets the final status of a request row.
async fn finish(
    ctx: &SyncContext,
    table: &SheetTable,
    row: usize,
    status: RequestStatus,
    reason: Option<&str>,
    applied_at: Option<Timestamp>,
) -> Result<()> {
    let sheets = ctx.remote.sheets.as_ref();
    table.write(sheets, row, STATUS, status.as_str()).await?;
    if let Some(reason) = reason {
        table.write(sheets, row, DENY_REASON, reason).await?;
    }
    if let Some(at) = applied_at {
        table.write(sheets, row, APPLIED_AT, at.to_string()).await?;
    }
    Ok(())
}

/// Header used as the natural key of a sheet: the configured one, else the
/// sheet's first column.
fn key_column(ctx: &SyncContext, table: &SheetTable) -> Result<usize> {
    match ctx.config.key_column(&table.name) {
        Some(column) => Ok(table.headers.require(column)?),
        None if table.headers.is_empty() => Err(EngineError::validation(format!(
            "Sheet \"{}\" has no header row.",
            table.name
        ))),
        None => Ok(1),
    }
}

/// The single row of `sheet` whose natural key equals `key`.
///
/// # Errors
///
/// `NotFound` when nothing matches; `Validation` when several rows match.
pub async fn resolve_target(ctx: &SyncContext, sheet: &str, key: &str) -> Result<usize> {
    let Some(table) = SheetTable::read(ctx.remote.sheets.as_ref(), sheet).await? else {
        return Err(EngineError::validation(format!(
            "Target sheet \"{sheet}\" not found."
        )));
    };
    let matches = find_by_key(ctx, &table, key)?;
    match matches.as_slice() {
        [] => Err(EngineError::not_found(
            "Target row",
            format!("key \"{key}\" in sheet \"{sheet}\""),
        )),
        [row] => Ok(*row),
        rows => Err(EngineError::validation(format!(
            "Multiple rows matched key \"{key}\" in sheet \"{sheet}\" (rows {}).",
            rows.iter().map(usize::to_string).collect::<Vec<_>>().join(", ")
        ))),
    }
}

fn find_by_key(ctx: &SyncContext, table: &SheetTable, key: &str) -> Result<Vec<usize>> {
    let col = key_column(ctx, table)?;
    let key = key.trim();
    Ok(table
        .rows()
        .filter(|(_, row)| row.get(col - 1).map(CellValue::trimmed).unwrap_or_default() == key)
        .map(|(idx, _)| idx)
        .collect())
}

async fn apply_to_target(
    ctx: &SyncContext,
    sheet: &str,
    row: usize,
    request: &ChangeRequest,
) -> Result<()> {
    let sheets = ctx.remote.sheets.as_ref();
    match request.action {
        ChangeAction::Delete => sheets.delete_row(sheet, row).await?,
        ChangeAction::Update => sheets.write_row(sheet, row, &request.proposed).await?,
    }
    ctx.record_change();
    Ok(())
}

/// Submits a structural edit.
///
/// Unprotected sheets, or any sheet while approvals are disabled, are changed
/// immediately. Otherwise a PENDING request is appended to ChangeRequests.
pub async fn submit_change_request(
    ctx: &SyncContext,
    proposal: ChangeProposal,
) -> Result<SubmitOutcome> {
    let requested_by = parse_single_email(&proposal.requested_by)?
        .ok_or_else(|| EngineError::validation("RequestedBy is required."))?;
    if proposal.action == ChangeAction::Update && proposal.proposed.is_empty() {
        return Err(EngineError::validation(
            "An UPDATE request needs the proposed row.",
        ));
    }
    let sheets = ctx.remote.sheets.as_ref();
    let Some(target) = SheetTable::read(sheets, &proposal.target_sheet).await? else {
        return Err(EngineError::validation(format!(
            "Target sheet \"{}\" not found.",
            proposal.target_sheet
        )));
    };

    let approvals = &ctx.config.approvals;
    if !approvals.enabled || !approvals.is_protected(&proposal.target_sheet) {
        apply_directly(ctx, &target, &proposal).await?;
        ctx.info(format!(
            "Applied {} on \"{}\" key \"{}\" without approval.",
            proposal.action, proposal.target_sheet, proposal.target_row_key
        ));
        return Ok(SubmitOutcome::Applied);
    }
    // The key column must exist before anyone is asked to approve.
    key_column(ctx, &target)?;

    let requests = ensure_requests_sheet(ctx).await?;
    let editors = active_editors(ctx).await?;
    let needed = approvals_needed(approvals.required_approvals, &editors, &requested_by);
    let mut request = ChangeRequest {
        row: 0,
        id: format!("CR-{}", uuid::Uuid::new_v4()),
        requested_by,
        requested_at: Some(ctx.now()),
        target_sheet: proposal.target_sheet,
        target_row_key: proposal.target_row_key.trim().to_string(),
        action: proposal.action,
        proposed: proposal.proposed,
        status: RequestStatus::Pending,
        approvals_needed: needed,
        approvers: Vec::new(),
        rejected_by: None,
        deny_reason: None,
        applied_at: None,
    };
    let row = request_row(&requests.headers, &request)?;
    request.row = sheets.append_row(CHANGE_REQUESTS, &row).await?;
    ctx.info(format!(
        "Change request {} submitted by {} ({} approval(s) needed).",
        request.id, request.requested_by, request.approvals_needed
    ));
    Ok(SubmitOutcome::Pending(request))
}

async fn apply_directly(ctx: &SyncContext, target: &SheetTable, proposal: &ChangeProposal) -> Result<()> {
    let sheets = ctx.remote.sheets.as_ref();
    let matches = find_by_key(ctx, target, &proposal.target_row_key)?;
    match (proposal.action, matches.as_slice()) {
        (ChangeAction::Update, []) => {
            sheets.append_row(&target.name, &proposal.proposed).await?;
        }
        (ChangeAction::Update, [row]) => {
            sheets.write_row(&target.name, *row, &proposal.proposed).await?;
        }
        (ChangeAction::Delete, []) => {
            return Err(EngineError::not_found(
                "Target row",
                format!("key \"{}\" in sheet \"{}\"", proposal.target_row_key, target.name),
            ));
        }
        (ChangeAction::Delete, [row]) => sheets.delete_row(&target.name, *row).await?,
        (_, rows) => {
            return Err(EngineError::validation(format!(
                "Multiple rows matched key \"{}\" in sheet \"{}\" ({} rows).",
                proposal.target_row_key,
                target.name,
                rows.len()
            )));
        }
    }
    ctx.record_change();
    Ok(())
}

async fn ensure_requests_sheet(ctx: &SyncContext) -> Result<SheetTable> {
    let sheets = ctx.remote.sheets.as_ref();
    if let Some(table) = SheetTable::read(sheets, CHANGE_REQUESTS).await? {
        return Ok(table);
    }
    match sheets
        .create_sheet(CHANGE_REQUESTS, &header_row(CHANGE_REQUESTS_HEADERS))
        .await
    {
        Ok(()) | Err(StorageError::AlreadyExists { .. }) => {}
        Err(e) => return Err(e.into()),
    }
    SheetTable::read(sheets, CHANGE_REQUESTS)
        .await?
        .ok_or_else(|| EngineError::not_found("sheet", CHANGE_REQUESTS))
}

async fn find_pending(ctx: &SyncContext, request_id: &str) -> Result<(SheetTable, ChangeRequest)> {
    let table = SheetTable::read(ctx.remote.sheets.as_ref(), CHANGE_REQUESTS)
        .await?
        .ok_or_else(|| EngineError::not_found("sheet", CHANGE_REQUESTS))?;
    let idx = table
        .find_rows("RequestId", request_id)
        .into_iter()
        .next()
        .ok_or_else(|| EngineError::not_found("change request", request_id))?;
    let row = table
        .row(idx)
        .ok_or_else(|| EngineError::not_found("change request", request_id))?;
    let request = parse_request(&table, idx, row)?;
    if request.status.is_terminal() {
        return Err(EngineError::validation(format!(
            "Change request {request_id} is already {}.",
            request.status
        )));
    }
    Ok((table, request))
}

fn approver_email(raw: &str) -> Result<String> {
    parse_single_email(raw)?.ok_or_else(|| EngineError::validation("Approver email is required."))
}

/// Records an approval in the first free approver column. Approving twice
/// is a no-op.
///
/// # Errors
///
/// Fails when the approver is not an active sheet editor, the request is not
/// pending, or every approver column is taken. The requester may only
/// approve a request that needs a single approval.
pub async fn approve(ctx: &SyncContext, request_id: &str, approver: &str) -> Result<ChangeRequest> {
    let approver = approver_email(approver)?;
    if !active_editors(ctx).await?.contains(&approver) {
        return Err(EngineError::validation(format!(
            "{approver} is not an active sheet editor."
        )));
    }
    let (table, mut request) = find_pending(ctx, request_id).await?;
    if request.approvals_needed > 1 && approver == normalize_email(&request.requested_by) {
        return Err(EngineError::validation(
            "The requester cannot approve their own request.",
        ));
    }
    if request.approvers.contains(&approver) {
        return Ok(request);
    }

    let row = table.row(request.row).cloned().unwrap_or_default();
    let free = approver_columns(&table.headers)
        .into_iter()
        .find(|col| row.get(col - 1).is_none_or(CellValue::is_blank))
        .ok_or_else(|| {
            EngineError::validation(format!(
                "Change request {request_id} has no free approver column."
            ))
        })?;
    ctx.remote
        .sheets
        .write_cell(CHANGE_REQUESTS, request.row, free, CellValue::text(approver.as_str()))
        .await?;
    ctx.info(format!("{approver} approved change request {request_id}."));
    request.approvers.push(approver);
    Ok(request)
}

/// Rejects a pending request; it moves to DENIED at once.
pub async fn reject(
    ctx: &SyncContext,
    request_id: &str,
    approver: &str,
    reason: Option<&str>,
) -> Result<ChangeRequest> {
    let approver = approver_email(approver)?;
    let (table, mut request) = find_pending(ctx, request_id).await?;
    let reason = match reason.map(str::trim).filter(|r| !r.is_empty()) {
        Some(reason) => format!("Rejected by {approver}: {reason}"),
        None => format!("Rejected by {approver}."),
    };

    let sheets = ctx.remote.sheets.as_ref();
    table.write(sheets, request.row, REJECTED_BY, approver.as_str()).await?;
    finish(ctx, &table, request.row, RequestStatus::Denied, Some(&reason), None).await?;
    ctx.info(format!("Change request {request_id} rejected by {approver}."));

    request.rejected_by = Some(approver);
    request.status = RequestStatus::Denied;
    request.deny_reason = Some(reason);
    Ok(request)
}

/// Every parseable request, in sheet order.
pub async fn list_change_requests(ctx: &SyncContext) -> Result<Vec<ChangeRequest>> {
    let Some(table) = SheetTable::read(ctx.remote.sheets.as_ref(), CHANGE_REQUESTS).await? else {
        return Ok(Vec::new());
    };
    let mut requests = Vec::new();
    for (idx, row) in table.rows() {
        match parse_request(&table, idx, row) {
            Ok(request) => requests.push(request),
            Err(e) => ctx.warn(format!("Skipping change request in row {idx}: {e}")),
        }
    }
    Ok(requests)
}
