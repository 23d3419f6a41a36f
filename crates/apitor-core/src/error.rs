//! Shared error type across apitor crates.

use thiserror::Error;

use crate::metric::MetricKind;

/// Stable error codes (used as a log field by the HTTP layer).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// Metric name was blank.
    EmptyName,
    /// Metric name already registered.
    DuplicateName,
    /// No metric under that name.
    NotFound,
    /// Kind string is not one of the four known kinds.
    InvalidKind,
    /// Operation not legal for the metric's kind.
    WrongKind,
    /// Backing collector does not match the declared kind.
    BackingMismatch,
    /// Kind has no collector constructor.
    UnknownKind,
    /// Failure reported by the metrics backend.
    Backend,
    /// A concurrent update task died.
    TaskFailed,
    /// Invalid configuration.
    BadConfig,
    /// Unsupported config version.
    UnsupportedVersion,
    /// Internal error.
    Internal,
}

impl ErrorCode {
    /// String representation used in structured logs.
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::EmptyName => "EMPTY_NAME",
            ErrorCode::DuplicateName => "DUPLICATE_NAME",
            ErrorCode::NotFound => "NOT_FOUND",
            ErrorCode::InvalidKind => "INVALID_KIND",
            ErrorCode::WrongKind => "WRONG_KIND",
            ErrorCode::BackingMismatch => "BACKING_MISMATCH",
            ErrorCode::UnknownKind => "UNKNOWN_KIND",
            ErrorCode::Backend => "BACKEND",
            ErrorCode::TaskFailed => "TASK_FAILED",
            ErrorCode::BadConfig => "BAD_CONFIG",
            ErrorCode::UnsupportedVersion => "UNSUPPORTED_VERSION",
            ErrorCode::Internal => "INTERNAL",
        }
    }
}

/// Shared result type.
pub type Result<T> = std::result::Result<T, MonitorError>;

/// Unified error type used by core and http.
#[derive(Debug, Error)]
pub enum MonitorError {
    #[error("metric name cannot be empty")]
    EmptyName,
    #[error("metric '{0}' already exists")]
    DuplicateName(String),
    #[error("metric '{0}' not found")]
    NotFound(String),
    #[error("invalid metric kind '{0}'")]
    InvalidKind(String),
    #[error("metric '{name}' is {kind}, {op} not allowed")]
    WrongKind {
        name: String,
        kind: MetricKind,
        op: &'static str,
    },
    #[error("metric '{0}' backing collector does not match its kind")]
    BackingMismatch(String),
    #[error("metric kind '{0}' has no collector constructor")]
    UnknownKind(MetricKind),
    #[error("metrics backend: {0}")]
    Backend(#[from] prometheus::Error),
    #[error("update task failed: {0}")]
    TaskFailed(String),
    #[error("bad config: {0}")]
    BadConfig(String),
    #[error("unsupported config version")]
    UnsupportedVersion,
    #[error("internal: {0}")]
    Internal(String),
}

impl MonitorError {
    /// Map an error to its stable code.
    pub fn code(&self) -> ErrorCode {
        match self {
            MonitorError::EmptyName => ErrorCode::EmptyName,
            MonitorError::DuplicateName(_) => ErrorCode::DuplicateName,
            MonitorError::NotFound(_) => ErrorCode::NotFound,
            MonitorError::InvalidKind(_) => ErrorCode::InvalidKind,
            MonitorError::WrongKind { .. } => ErrorCode::WrongKind,
            MonitorError::BackingMismatch(_) => ErrorCode::BackingMismatch,
            MonitorError::UnknownKind(_) => ErrorCode::UnknownKind,
            MonitorError::Backend(_) => ErrorCode::Backend,
            MonitorError::TaskFailed(_) => ErrorCode::TaskFailed,
            MonitorError::BadConfig(_) => ErrorCode::BadConfig,
            MonitorError::UnsupportedVersion => ErrorCode::UnsupportedVersion,
            MonitorError::Internal(_) => ErrorCode::Internal,
        }
    }
}
