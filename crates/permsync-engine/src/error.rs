use permsync_config::ConfigError;
use permsync_core::CoreError;
use permsync_storage::StorageError;
use thiserror::Error;

/// Errors raised while planning or applying a sync.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Bad input on a row or request; reported there and never retried.
    #[error("{0}")]
    Validation(String),

    #[error("{kind} not found: {id}")]
    NotFound { kind: String, id: String },

    /// Remote failure that survived every retry.
    #[error("Remote call failed after retries: {0}")]
    Transient(String),

    /// Aborts the whole run.
    #[error("Fatal: {0}")]
    Fatal(String),

    #[error("Sync already in progress (lock \"{0}\" is held)")]
    LockUnavailable(String),

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Storage(StorageError),
}

impl From<StorageError> for EngineError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::LockUnavailable { name } => Self::LockUnavailable(name),
            StorageError::Ambiguous { message } => Self::Validation(message),
            other => Self::Storage(other),
        }
    }
}

impl EngineError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn not_found(kind: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound {
            kind: kind.into(),
            id: id.into(),
        }
    }

    pub fn fatal(message: impl Into<String>) -> Self {
        Self::Fatal(message.into())
    }

    /// True for errors that belong to one row or request.
    pub fn is_validation(&self) -> bool {
        match self {
            Self::Validation(_) => true,
            Self::Core(e) => e.is_validation(),
            Self::Storage(e) => matches!(e, StorageError::Invalid { .. }),
            _ => false,
        }
    }

    pub fn is_not_found(&self) -> bool {
        match self {
            Self::NotFound { .. } => true,
            Self::Storage(e) => e.is_not_found(),
            _ => false,
        }
    }

    /// True for errors that abort the run instead of failing a single row.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Fatal(_) | Self::LockUnavailable(_) | Self::Config(_)
        )
    }

    /// Get error category for logging
    pub fn category(&self) -> &'static str {
        if self.is_fatal() {
            "fatal"
        } else if self.is_validation() {
            "validation"
        } else if self.is_not_found() {
            "not_found"
        } else if matches!(self, Self::Transient(_))
            || matches!(self, Self::Storage(e) if e.is_transient())
        {
            "transient"
        } else {
            "internal"
        }
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;
