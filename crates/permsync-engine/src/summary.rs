use permsync_core::Timestamp;
use serde::{Deserialize, Serialize};

use crate::approval::RequestsReport;
use crate::context::SyncSource;
use crate::diff::SyncPlan;
use crate::editors::EditorsReport;
use crate::executor::ApplySummary;
use crate::processing::{RowError, SectionReport};
use crate::runlog::LogLine;

/// Human-readable result of a sync run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub operation: String,
    pub source: SyncSource,
    pub started_at: Timestamp,
    pub finished_at: Timestamp,
    pub plan_only: bool,
    pub requests: RequestsReport,
    pub folders: SectionReport,
    pub groups: SectionReport,
    pub editors: EditorsReport,
    pub log: Vec<LogLine>,
}

impl RunSummary {
    pub fn new(operation: impl Into<String>, source: SyncSource, started_at: Timestamp) -> Self {
        Self {
            operation: operation.into(),
            source,
            started_at,
            finished_at: started_at,
            plan_only: false,
            requests: RequestsReport::default(),
            folders: SectionReport::default(),
            groups: SectionReport::default(),
            editors: EditorsReport::default(),
            log: Vec::new(),
        }
    }

    /// Member changes across folders, groups and the editors group.
    pub fn totals(&self) -> ApplySummary {
        let mut totals = ApplySummary::default();
        totals.merge(self.folders.summary.clone());
        totals.merge(self.groups.summary.clone());
        totals.merge(self.editors.group.clone());
        totals
    }

    pub fn plans(&self) -> Vec<&SyncPlan> {
        self.folders
            .plans
            .iter()
            .chain(&self.groups.plans)
            .chain(self.editors.plan.as_ref())
            .collect()
    }

    pub fn row_errors(&self) -> Vec<&RowError> {
        self.folders.errors.iter().chain(&self.groups.errors).collect()
    }

    /// Pending removals across every plan.
    pub fn pending_removals(&self) -> usize {
        self.plans().iter().map(|p| p.to_remove.len()).sum()
    }

    /// One-paragraph text for notifications and the status record.
    pub fn text(&self) -> String {
        if self.plan_only {
            let adds: usize = self.plans().iter().map(|p| p.to_add.len()).sum();
            return format!(
                "{}: planned {adds} addition(s) and {} removal(s) across {} group(s).",
                self.operation,
                self.pending_removals(),
                self.plans().len()
            );
        }
        let totals = self.totals();
        let mut text = format!(
            "{}: {} rows processed. {totals}",
            self.operation,
            self.folders.processed + self.groups.processed
        );
        let errors = self.row_errors().len();
        if errors > 0 {
            text.push_str(&format!(" {errors} row(s) reported errors."));
        }
        let deleted = self.folders.deleted + self.groups.deleted;
        if deleted > 0 {
            text.push_str(&format!(" {deleted} binding(s) deleted."));
        }
        if !self.requests.applied.is_empty() {
            text.push_str(&format!(
                " {} change request(s) applied.",
                self.requests.applied.len()
            ));
        }
        text
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_counts_everything() {
        let at: Timestamp = "2024-01-01T00:00:00Z".parse().unwrap();
        let mut summary = RunSummary::new("Full sync", SyncSource::Manual, at);
        summary.folders.processed = 2;
        summary.folders.summary.added = 3;
        summary.groups.summary.removed = 1;
        summary.groups.errors.push(RowError {
            sheet: "UserGroups".into(),
            row: 3,
            message: "boom".into(),
        });
        assert_eq!(
            summary.text(),
            "Full sync: 2 rows processed. Added 3, removed 1, failed 0. 1 row(s) reported errors."
        );
    }
}
