//! ChangeRequests sheet columns.

use permsync_core::{CellValue, HeaderMap, Row, Timestamp, normalize_email};

use super::model::ChangeRequest;
use crate::error::{EngineError, Result};
use crate::sheets::SheetTable;

pub const REQUEST_ID: &str = "RequestId";
pub const REQUESTED_BY: &str = "RequestedBy";
pub const REQUESTED_AT: &str = "RequestedAt";
pub const TARGET_SHEET: &str = "TargetSheet";
pub const TARGET_ROW_KEY: &str = "TargetRowKey";
pub const ACTION: &str = "Action";
pub const PROPOSED: &str = "ProposedRowSnapshot";
pub const STATUS: &str = "Status";
pub const APPROVALS_NEEDED: &str = "ApprovalsNeeded";
pub const REJECTED_BY: &str = "RejectedBy";
pub const DENY_REASON: &str = "DenyReason";
pub const APPLIED_AT: &str = "AppliedAt";

/// Every header whose normalized name starts with `approver`.
pub fn approver_columns(headers: &HeaderMap) -> Vec<usize> {
    headers.columns_with_prefix("approver")
}

fn optional_text(table: &SheetTable, row: &[CellValue], column: &str) -> Option<String> {
    let text = table.text(row, column);
    (!text.is_empty()).then_some(text)
}

fn timestamp(table: &SheetTable, row: &[CellValue], column: &str) -> Option<Timestamp> {
    optional_text(table, row, column).and_then(|t| t.parse().ok())
}

/// Parses the proposed row snapshot, a JSON array of cell values.
pub fn parse_proposed(raw: &str) -> Result<Vec<CellValue>> {
    if raw.trim().is_empty() {
        return Ok(Vec::new());
    }
    serde_json::from_str(raw).map_err(|e| {
        EngineError::validation(format!("ProposedRowSnapshot is not a JSON array of cells: {e}"))
    })
}

pub fn parse_request(table: &SheetTable, idx: usize, row: &[CellValue]) -> Result<ChangeRequest> {
    let approvers = approver_columns(&table.headers)
        .into_iter()
        .filter_map(|col| row.get(col - 1))
        .map(|cell| normalize_email(&cell.as_text()))
        .filter(|a| !a.is_empty())
        .collect();

    let approvals_needed = table
        .headers
        .cell(row, APPROVALS_NEEDED)
        .and_then(CellValue::as_number)
        .map(|n| n.max(1.0) as u32)
        .unwrap_or(1);

    Ok(ChangeRequest {
        row: idx,
        id: table.text(row, REQUEST_ID),
        requested_by: normalize_email(&table.text(row, REQUESTED_BY)),
        requested_at: timestamp(table, row, REQUESTED_AT),
        target_sheet: table.text(row, TARGET_SHEET),
        target_row_key: table.text(row, TARGET_ROW_KEY),
        action: table.text(row, ACTION).parse()?,
        proposed: parse_proposed(&table.text(row, PROPOSED))?,
        status: table.text(row, STATUS).parse()?,
        approvals_needed,
        approvers,
        rejected_by: optional_text(table, row, REJECTED_BY).map(|r| normalize_email(&r)),
        deny_reason: optional_text(table, row, DENY_REASON),
        applied_at: timestamp(table, row, APPLIED_AT),
    })
}

/// Serializes a request into a row laid out by `headers`.
pub fn request_row(headers: &HeaderMap, request: &ChangeRequest) -> Result<Row> {
    let mut row = headers.blank_row();
    headers.set(&mut row, REQUEST_ID, request.id.as_str())?;
    headers.set(&mut row, REQUESTED_BY, request.requested_by.as_str())?;
    if let Some(at) = request.requested_at {
        headers.set(&mut row, REQUESTED_AT, at.to_string())?;
    }
    headers.set(&mut row, TARGET_SHEET, request.target_sheet.as_str())?;
    headers.set(&mut row, TARGET_ROW_KEY, request.target_row_key.as_str())?;
    headers.set(&mut row, ACTION, request.action.as_str())?;
    headers.set(&mut row, PROPOSED, serde_json::to_string(&request.proposed)?)?;
    headers.set(&mut row, STATUS, request.status.as_str())?;
    headers.set(
        &mut row,
        APPROVALS_NEEDED,
        CellValue::Number(f64::from(request.approvals_needed)),
    )?;
    for (col, approver) in approver_columns(headers).into_iter().zip(&request.approvers) {
        row[col - 1] = CellValue::text(approver.as_str());
    }
    Ok(row)
}
