use anyhow::Result;
use permsync_core::CellValue;
use permsync_engine::approval::{ChangeAction, ChangeProposal, SubmitOutcome};

use crate::cli::{ActionArg, RequestsCommands, SubmitArgs};
use crate::output::{print_requests, print_success, print_warning};
use crate::session::Session;

pub async fn run(session: &Session, command: &RequestsCommands) -> Result<()> {
    let reconciler = &session.reconciler;
    match command {
        RequestsCommands::List => {
            print_requests(&reconciler.list_requests().await?);
        }
        RequestsCommands::Submit(args) => match reconciler.submit(proposal(args)).await? {
            SubmitOutcome::Applied => print_success(&format!(
                "Applied to \"{}\" without approval.",
                args.sheet
            )),
            SubmitOutcome::Pending(request) => print_success(&format!(
                "Submitted {} ({} approval(s) needed).",
                request.id, request.approvals_needed
            )),
        },
        RequestsCommands::Approve(args) => {
            let request = reconciler.approve(&args.id, &args.by).await?;
            print_success(&format!(
                "{} has {}/{} approval(s).",
                request.id,
                request.effective_approvals(),
                request.approvals_needed
            ));
        }
        RequestsCommands::Reject(args) => {
            let request = reconciler
                .reject(&args.id, &args.by, args.reason.as_deref())
                .await?;
            print_success(&format!("{} is {}.", request.id, request.status));
        }
        RequestsCommands::Process => {
            let report = reconciler.process_change_requests().await?;
            if report.skipped {
                print_warning("Approvals are disabled or there are no change requests.");
            } else if report.blocked {
                print_warning("Required approvals exceed the active sheet editors; nothing evaluated.");
            } else {
                print_success(&format!(
                    "Applied {}, denied {}, expired {}, pending {}.",
                    report.applied.len(),
                    report.denied.len(),
                    report.expired.len(),
                    report.pending.len()
                ));
            }
        }
    }
    Ok(())
}

fn proposal(args: &SubmitArgs) -> ChangeProposal {
    ChangeProposal {
        requested_by: args.by.clone(),
        target_sheet: args.sheet.clone(),
        target_row_key: args.key.clone(),
        action: match args.action {
            ActionArg::Update => ChangeAction::Update,
            ActionArg::Delete => ChangeAction::Delete,
        },
        proposed: args.cells.iter().map(|c| CellValue::text(c.as_str())).collect(),
    }
}
