//! Quorum approval for structural edits.
//!
//! Edits to protected sheets become rows in ChangeRequests and are applied
//! only once enough distinct editors approved them:
//! - [`submit_change_request`] creates the request (or applies directly)
//! - [`approve`] / [`reject`] record decisions
//! - [`process_change_requests`] moves requests to APPLIED, DENIED or EXPIRED

mod columns;
mod model;
mod workflow;

pub use columns::{approver_columns, parse_proposed};
pub use model::{ChangeAction, ChangeRequest, RequestStatus, approvals_needed};
pub use workflow::{
    ChangeProposal, RequestsReport, SubmitOutcome, approve, list_change_requests,
    process_change_requests, reject, resolve_target, submit_change_request,
};
