use thiserror::Error;

/// Core error types for permsync operations
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid email address: {0}")]
    InvalidEmail(String),

    #[error("Cell contains multiple email addresses: {0}")]
    MultipleEmails(String),

    #[error("Unsupported role: \"{0}\"")]
    UnsupportedRole(String),

    #[error("Missing column \"{column}\" in sheet \"{sheet}\"")]
    MissingColumn { sheet: String, column: String },

    #[error("Ambiguous match: {0}")]
    Ambiguous(String),

    #[error("Not found: {kind} {id}")]
    NotFound { kind: String, id: String },

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("JSON serialization error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Time parsing error: {0}")]
    TimeError(#[from] time::error::Parse),
}

impl CoreError {
    /// Create a new Validation error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Create a new InvalidEmail error
    pub fn invalid_email(value: impl Into<String>) -> Self {
        Self::InvalidEmail(value.into())
    }

    /// Create a new MultipleEmails error
    pub fn multiple_emails(value: impl Into<String>) -> Self {
        Self::MultipleEmails(value.into())
    }

    /// Create a new UnsupportedRole error
    pub fn unsupported_role(role: impl Into<String>) -> Self {
        Self::UnsupportedRole(role.into())
    }

    /// Create a new MissingColumn error
    pub fn missing_column(sheet: impl Into<String>, column: impl Into<String>) -> Self {
        Self::MissingColumn {
            sheet: sheet.into(),
            column: column.into(),
        }
    }

    /// Create a new Ambiguous error
    pub fn ambiguous(message: impl Into<String>) -> Self {
        Self::Ambiguous(message.into())
    }

    /// Create a new NotFound error
    pub fn not_found(kind: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound {
            kind: kind.into(),
            id: id.into(),
        }
    }

    /// Create a new Configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    /// Validation failures are reported on the offending row and never retried.
    pub fn is_validation(&self) -> bool {
        matches!(
            self.category(),
            ErrorCategory::Validation | ErrorCategory::Ambiguity
        )
    }

    /// Get error category for logging/monitoring
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Validation(_)
            | Self::InvalidEmail(_)
            | Self::MultipleEmails(_)
            | Self::UnsupportedRole(_)
            | Self::MissingColumn { .. } => ErrorCategory::Validation,
            Self::Ambiguous(_) => ErrorCategory::Ambiguity,
            Self::NotFound { .. } => ErrorCategory::NotFound,
            Self::Configuration(_) => ErrorCategory::Configuration,
            Self::JsonError(_) => ErrorCategory::Serialization,
            Self::TimeError(_) => ErrorCategory::System,
        }
    }
}

/// Error categories for monitoring and classification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Validation,
    Ambiguity,
    NotFound,
    Serialization,
    System,
    Configuration,
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation => write!(f, "validation"),
            Self::Ambiguity => write!(f, "ambiguity"),
            Self::NotFound => write!(f, "not_found"),
            Self::Serialization => write!(f, "serialization"),
            Self::System => write!(f, "system"),
            Self::Configuration => write!(f, "configuration"),
        }
    }
}

/// Convenience result type for core operations
pub type Result<T> = std::result::Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unsupported_role_message() {
        let err = CoreError::unsupported_role("unsupported-role");
        assert_eq!(err.to_string(), "Unsupported role: \"unsupported-role\"");
        assert!(err.is_validation());
        assert_eq!(err.category(), ErrorCategory::Validation);
    }

    #[test]
    fn test_missing_column_message() {
        let err = CoreError::missing_column("ManagedFolders", "Role");
        assert_eq!(
            err.to_string(),
            "Missing column \"Role\" in sheet \"ManagedFolders\""
        );
    }

    #[test]
    fn test_ambiguity_is_validation() {
        let err = CoreError::ambiguous("2 folders named \"Reports\"");
        assert!(err.is_validation());
        assert_eq!(err.category(), ErrorCategory::Ambiguity);
    }

    #[test]
    fn test_not_found_is_not_validation() {
        let err = CoreError::not_found("group", "team@example.com");
        assert!(!err.is_validation());
        assert_eq!(err.to_string(), "Not found: group team@example.com");
    }

    #[test]
    fn test_json_error_conversion() {
        let json_err = serde_json::from_str::<serde_json::Value>("{ nope").unwrap_err();
        let core_err: CoreError = json_err.into();
        assert_eq!(core_err.category(), ErrorCategory::Serialization);
    }

    #[test]
    fn test_error_categories_display() {
        assert_eq!(ErrorCategory::Validation.to_string(), "validation");
        assert_eq!(ErrorCategory::Ambiguity.to_string(), "ambiguity");
        assert_eq!(ErrorCategory::NotFound.to_string(), "not_found");
        assert_eq!(ErrorCategory::Configuration.to_string(), "configuration");
    }
}
