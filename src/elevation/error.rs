use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by the elevation stores, the activator and the rollback path
#[derive(Debug, Error)]
pub enum ElevationError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Expired: {0}")]
    Expired(String),

    #[error("Already used: {0}")]
    AlreadyUsed(String),

    #[error("Privilege already active ({remaining_secs}s remaining)")]
    LockActive { remaining_secs: i64 },

    #[error("No verified challenge for this session")]
    NotVerified,

    #[error("Privilege file does not exist: {}", .0.display())]
    MissingTarget(PathBuf),

    #[error("Failed to toggle privilege: {0}")]
    ToggleFailed(String),

    #[error("Privilege configuration rejected by validator: {0}")]
    SyntaxValidationFailed(String),

    #[error("Notification not delivered: {0}")]
    NotificationFailed(String),

    #[error("I/O failure: {0}")]
    Io(String),

    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),
}

impl From<std::io::Error> for ElevationError {
    fn from(err: std::io::Error) -> Self {
        ElevationError::Io(err.to_string())
    }
}

impl ElevationError {
    /// Storage-layer failures are never shown to callers verbatim
    pub fn is_internal(&self) -> bool {
        matches!(self, ElevationError::Io(_) | ElevationError::Storage(_))
    }
}
