use colored::Colorize;
use permsync_engine::approval::{ChangeRequest, RequestStatus};
use permsync_engine::{LogLevel, LogLine, RunSummary, SyncPlan};
use tabled::builder::Builder;
use tabled::settings::Style;

pub fn print_success(msg: &str) {
    println!("{} {}", "✓".green(), msg);
}

pub fn print_warning(msg: &str) {
    println!("{} {}", "!".yellow(), msg);
}

pub fn print_error(msg: &str) {
    eprintln!("{} {}", "✗".red(), msg);
}

pub fn print_log(lines: &[LogLine]) {
    for line in lines {
        let level = match line.level {
            LogLevel::Info => line.level.to_string().cyan(),
            LogLevel::Warn => line.level.to_string().yellow(),
            LogLevel::Error => line.level.to_string().red(),
        };
        println!("  {} {level} {}", line.at.to_string().dimmed(), line.message);
    }
}

pub fn print_plans(plans: &[&SyncPlan]) {
    let plans: Vec<&&SyncPlan> = plans.iter().filter(|p| !p.is_empty()).collect();
    if plans.is_empty() {
        println!("No membership changes.");
        return;
    }
    let mut builder = Builder::default();
    builder.push_record(["Group", "Sheet", "Add", "Remove"]);
    for plan in plans {
        builder.push_record([
            plan.group_email.clone(),
            plan.sheet_name.clone(),
            join_emails(plan.to_add.iter().map(|m| m.email.as_str())),
            join_emails(plan.to_remove.iter().map(|m| m.email.as_str())),
        ]);
    }
    println!("{}", builder.build().with(Style::rounded()));
}

fn join_emails<'a>(emails: impl Iterator<Item = &'a str>) -> String {
    let joined: Vec<&str> = emails.collect();
    if joined.is_empty() {
        "-".to_string()
    } else {
        joined.join("\n")
    }
}

pub fn print_summary(summary: &RunSummary) {
    if summary.plan_only {
        print_plans(&summary.plans());
    }
    let errors = summary.row_errors();
    if !errors.is_empty() {
        let mut builder = Builder::default();
        builder.push_record(["Sheet", "Row", "Error"]);
        for error in errors {
            builder.push_record([error.sheet.clone(), error.row.to_string(), error.message.clone()]);
        }
        println!("{}", builder.build().with(Style::rounded()));
    }
    let totals = summary.totals();
    if totals.failed > 0 || !summary.row_errors().is_empty() {
        print_warning(&summary.text());
    } else {
        print_success(&summary.text());
    }
}

pub fn print_requests(requests: &[ChangeRequest]) {
    if requests.is_empty() {
        println!("No change requests.");
        return;
    }
    let mut builder = Builder::default();
    builder.push_record([
        "Id",
        "Status",
        "Action",
        "Target",
        "Key",
        "Approvals",
        "Requested by",
    ]);
    for request in requests {
        builder.push_record([
            request.id.clone(),
            status_label(request.status),
            request.action.to_string(),
            request.target_sheet.clone(),
            request.target_row_key.clone(),
            format!("{}/{}", request.effective_approvals(), request.approvals_needed),
            request.requested_by.clone(),
        ]);
    }
    println!("{}", builder.build().with(Style::rounded()));
}

fn status_label(status: RequestStatus) -> String {
    let label = status.as_str();
    match status {
        RequestStatus::Pending => label.yellow().to_string(),
        RequestStatus::Applied => label.green().to_string(),
        RequestStatus::Denied | RequestStatus::Expired => label.red().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_emails() {
        assert_eq!(join_emails(std::iter::empty()), "-");
        assert_eq!(
            join_emails(["a@example.com", "b@example.com"].into_iter()),
            "a@example.com\nb@example.com"
        );
    }
}
