use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Info => write!(f, "info"),
            Self::Warning => write!(f, "warning"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// A message about a sync run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub severity: Severity,
    pub subject: String,
    pub body: String,
}

impl Notification {
    pub fn new(severity: Severity, subject: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            severity,
            subject: subject.into(),
            body: body.into(),
        }
    }

    /// Report for a run that aborted.
    ///
    /// `partially_applied` tells the reader whether some changes landed before
    /// the failure.
    pub fn fatal(operation: &str, error: &str, partially_applied: bool) -> Self {
        let outcome = if partially_applied {
            "Some changes were applied before the failure; review the summary and rerun the sync."
        } else {
            "Nothing was changed."
        };
        let host = hostname::get()
            .map(|h| h.to_string_lossy().into_owned())
            .unwrap_or_else(|_| "unknown host".to_string());
        Self::new(
            Severity::Error,
            format!("permsync: {operation} failed"),
            format!("{operation} failed on {host}: {error}\n\n{outcome}"),
        )
    }

    pub fn summary(operation: &str, summary: &str) -> Self {
        Self::new(
            Severity::Info,
            format!("permsync: {operation} finished"),
            summary.to_string(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_distinguishes_partial_runs() {
        let untouched = Notification::fatal("Full sync", "lock held", false);
        assert_eq!(untouched.severity, Severity::Error);
        assert!(untouched.body.contains("Nothing was changed."));

        let partial = Notification::fatal("Full sync", "quota", true);
        assert!(partial.body.contains("Some changes were applied"));
        assert_eq!(partial.subject, "permsync: Full sync failed");
    }
}
