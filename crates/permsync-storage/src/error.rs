//! Errors reported by collaborator implementations.

use std::fmt;

/// Errors that can occur while talking to a directory, drive, sheet or lock backend.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// The requested object does not exist.
    #[error("{kind} not found: {id}")]
    NotFound {
        /// Kind of object, e.g. `group` or `folder`.
        kind: String,
        /// Identifier that was looked up.
        id: String,
    },

    /// Attempted to create an object that already exists.
    #[error("{kind} already exists: {id}")]
    AlreadyExists { kind: String, id: String },

    /// A lookup matched more than one object.
    #[error("Ambiguous: {message}")]
    Ambiguous { message: String },

    /// The remote side throttled the call.
    #[error("Rate limited: {message}")]
    RateLimited { message: String },

    #[error("Timeout: {message}")]
    Timeout { message: String },

    /// Failed to reach the backend.
    #[error("Connection error: {message}")]
    Connection { message: String },

    /// A mutual-exclusion lock could not be acquired within the wait.
    #[error("Lock \"{name}\" is held by another run")]
    LockUnavailable { name: String },

    /// The request itself was malformed.
    #[error("Invalid request: {message}")]
    Invalid { message: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl StorageError {
    /// Creates a new `NotFound` error.
    #[must_use]
    pub fn not_found(kind: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound {
            kind: kind.into(),
            id: id.into(),
        }
    }

    /// Creates a new `AlreadyExists` error.
    #[must_use]
    pub fn already_exists(kind: impl Into<String>, id: impl Into<String>) -> Self {
        Self::AlreadyExists {
            kind: kind.into(),
            id: id.into(),
        }
    }

    #[must_use]
    pub fn ambiguous(message: impl Into<String>) -> Self {
        Self::Ambiguous {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self::RateLimited {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn timeout(message: impl Into<String>) -> Self {
        Self::Timeout {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn lock_unavailable(name: impl Into<String>) -> Self {
        Self::LockUnavailable { name: name.into() }
    }

    #[must_use]
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid {
            message: message.into(),
        }
    }

    /// Creates a new `Internal` error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Returns `true` if this is a not found error.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Returns `true` if this is an already exists error.
    #[must_use]
    pub fn is_already_exists(&self) -> bool {
        matches!(self, Self::AlreadyExists { .. })
    }

    /// Returns `true` for failures worth retrying.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::RateLimited { .. } | Self::Timeout { .. } | Self::Connection { .. }
        )
    }

    /// Returns the error category for logging/monitoring purposes.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::NotFound { .. } => ErrorCategory::NotFound,
            Self::AlreadyExists { .. } => ErrorCategory::Conflict,
            Self::Ambiguous { .. } | Self::Invalid { .. } => ErrorCategory::Validation,
            Self::RateLimited { .. } | Self::Timeout { .. } | Self::Connection { .. } => {
                ErrorCategory::Transient
            }
            Self::LockUnavailable { .. } => ErrorCategory::Contention,
            Self::Internal { .. } => ErrorCategory::Internal,
        }
    }
}

/// Categories of storage errors for logging and monitoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    NotFound,
    Conflict,
    Validation,
    /// Retryable infrastructure failure.
    Transient,
    /// Lock held elsewhere.
    Contention,
    Internal,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => write!(f, "not_found"),
            Self::Conflict => write!(f, "conflict"),
            Self::Validation => write!(f, "validation"),
            Self::Transient => write!(f, "transient"),
            Self::Contention => write!(f, "contention"),
            Self::Internal => write!(f, "internal"),
        }
    }
}
