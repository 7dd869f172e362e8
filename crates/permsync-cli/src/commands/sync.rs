use std::io::{self, BufRead, Write};

use anyhow::Result;
use colored::Colorize;
use permsync_engine::{AutoSyncOutcome, DeletionOutcome, SyncOptions, SyncPlan};

use crate::cli::{MergeArgs, SyncArgs, SyncDeletesArgs};
use crate::output::{print_log, print_plans, print_success, print_summary, print_warning};
use crate::session::Session;

fn options(args: &SyncArgs) -> SyncOptions {
    SyncOptions {
        add_only: args.add_only,
        remove_only: args.remove_only,
        plan_only: args.plan,
        name_prefix: args.prefix.clone().filter(|p| !p.trim().is_empty()),
        rows: args.rows.clone(),
        ..SyncOptions::default()
    }
}

pub async fn sync(session: &Session, args: &SyncArgs) -> Result<()> {
    let summary = session.reconciler.sync_all(options(args)).await?;
    print_log(&summary.log);
    print_summary(&summary);
    Ok(())
}

/// Shows the planned removals and asks on stdin.
fn confirm(plans: &[SyncPlan]) -> bool {
    let refs: Vec<&SyncPlan> = plans.iter().collect();
    print_plans(&refs);
    let removals: usize = plans.iter().map(|p| p.to_remove.len()).sum();
    print!("Remove {removals} member(s)? [y/N] ");
    if io::stdout().flush().is_err() {
        return false;
    }
    let mut answer = String::new();
    if io::stdin().lock().read_line(&mut answer).is_err() {
        return false;
    }
    matches!(answer.trim().to_lowercase().as_str(), "y" | "yes")
}

pub async fn sync_deletes(session: &Session, args: &SyncDeletesArgs) -> Result<()> {
    let yes = args.yes;
    let outcome = session
        .reconciler
        .sync_deletes(|plans| yes || confirm(plans))
        .await?;
    match outcome {
        DeletionOutcome::NothingPending => print_success("No user removals are pending."),
        DeletionOutcome::Cancelled(_) => print_warning("Deletion sync cancelled."),
        DeletionOutcome::Applied(summary) => {
            print_log(&summary.log);
            print_summary(&summary);
        }
    }
    Ok(())
}

pub async fn auto_sync(session: &Session) -> Result<()> {
    match session.reconciler.auto_sync().await? {
        AutoSyncOutcome::Disabled => print_warning("AutoSync is disabled."),
        AutoSyncOutcome::Unchanged(_) => {
            print_success("No changes detected since the last snapshot.")
        }
        AutoSyncOutcome::Ran { detection, summary } => {
            for reason in &detection.reasons {
                println!("  {} {reason}", "›".cyan());
            }
            print_log(&summary.log);
            print_summary(&summary);
        }
    }
    Ok(())
}

pub async fn detect_changes(session: &Session) -> Result<()> {
    let detection = session.reconciler.detect_changes().await?;
    if !detection.should_run {
        print_success("No changes detected since the last snapshot.");
        return Ok(());
    }
    println!("{}", "A sync would run:".yellow());
    for reason in &detection.reasons {
        println!("  {} {reason}", "›".cyan());
    }
    Ok(())
}

pub async fn merge(session: &Session, args: &MergeArgs) -> Result<()> {
    let report = session.reconciler.merge_sync(&args.sheet, &args.group).await?;
    if report.skipped {
        print_warning(&format!("Sheet \"{}\" not found; nothing merged.", report.sheet));
        return Ok(());
    }
    for email in &report.appended {
        println!("  {} {email}", "+".green());
    }
    print_success(&format!(
        "Merged {} member(s) of {} into \"{}\".",
        report.appended.len(),
        report.group_email,
        report.sheet
    ));
    Ok(())
}
