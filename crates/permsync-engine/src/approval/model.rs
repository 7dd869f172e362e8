//! Change-request records and the approval-counting rule.

use std::fmt;
use std::str::FromStr;

use permsync_core::{CellValue, Timestamp, normalize_email};
use serde::{Deserialize, Serialize};

use crate::error::EngineError;

/// Lifecycle state. Only `Pending` is ever processed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RequestStatus {
    Pending,
    Applied,
    Denied,
    Expired,
}

impl RequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Applied => "APPLIED",
            Self::Denied => "DENIED",
            Self::Expired => "EXPIRED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RequestStatus {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "" | "PENDING" => Ok(Self::Pending),
            "APPLIED" => Ok(Self::Applied),
            "DENIED" => Ok(Self::Denied),
            "EXPIRED" => Ok(Self::Expired),
            other => Err(EngineError::validation(format!(
                "Unknown request status \"{other}\""
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChangeAction {
    Update,
    Delete,
}

impl ChangeAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Update => "UPDATE",
            Self::Delete => "DELETE",
        }
    }
}

impl fmt::Display for ChangeAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChangeAction {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "" | "UPDATE" | "EDIT" => Ok(Self::Update),
            "DELETE" | "REMOVE" => Ok(Self::Delete),
            other => Err(EngineError::validation(format!(
                "Unknown request action \"{other}\""
            ))),
        }
    }
}

/// One ChangeRequests row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeRequest {
    /// 1-based row in the ChangeRequests sheet.
    pub row: usize,
    pub id: String,
    pub requested_by: String,
    pub requested_at: Option<Timestamp>,
    pub target_sheet: String,
    pub target_row_key: String,
    pub action: ChangeAction,
    /// The full target row as it should look after the change.
    pub proposed: Vec<CellValue>,
    pub status: RequestStatus,
    pub approvals_needed: u32,
    pub approvers: Vec<String>,
    pub rejected_by: Option<String>,
    pub deny_reason: Option<String>,
    pub applied_at: Option<Timestamp>,
}

impl ChangeRequest {
    /// Distinct approvers that count toward quorum.
    ///
    /// The requester is excluded whenever more than one approval is needed;
    /// with a single required approval the requester's own approval counts.
    pub fn counted_approvers(&self) -> Vec<String> {
        let requester = normalize_email(&self.requested_by);
        let mut counted: Vec<String> = Vec::new();
        for approver in &self.approvers {
            let approver = normalize_email(approver);
            if approver.is_empty() || counted.contains(&approver) {
                continue;
            }
            if self.approvals_needed > 1 && approver == requester {
                continue;
            }
            counted.push(approver);
        }
        counted
    }

    pub fn effective_approvals(&self) -> usize {
        self.counted_approvers().len()
    }

    pub fn has_quorum(&self) -> bool {
        self.effective_approvals() >= self.approvals_needed.max(1) as usize
    }
}

/// `clamp(required, 1, 3)` capped at the number of active editors, never below 1.
///
/// A quorum above one cannot count the requester, so it is further capped at
/// the editors other than the requester.
pub fn approvals_needed(required: u32, active_editors: &[String], requester: &str) -> u32 {
    let count = |n: usize| u32::try_from(n).unwrap_or(u32::MAX);
    let needed = required.clamp(1, 3).min(count(active_editors.len())).max(1);
    if needed == 1 {
        return needed;
    }
    let requester = normalize_email(requester);
    let others = active_editors
        .iter()
        .filter(|e| normalize_email(e) != requester)
        .count();
    needed.min(count(others)).max(1)
}
