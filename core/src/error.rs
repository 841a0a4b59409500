use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias used throughout the orchestrator.
pub type Result<T> = std::result::Result<T, OrchestratorError>;

/// The closed set of error kinds the facade is allowed to surface to
/// clients. Kept separate from [`OrchestratorError`] so the envelope can
/// serialize a stable `"SCREAMING_SNAKE_CASE"` tag independent of the
/// Rust-side message text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    Invalid,
    NotFound,
    Conflict,
    Cycle,
    VersionConflict,
    Capacity,
    Forbidden,
    Cancelled,
    Internal,
}

/// Errors produced anywhere in the orchestrator core. Every variant maps to
/// exactly one [`ErrorKind`] and one conventional status code, used by the
/// facade to build the envelope's `error` field.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum OrchestratorError {
    #[error("invalid request: {0}")]
    Invalid(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("dependency cycle: {0}")]
    Cycle(String),

    #[error("version conflict: {0}")]
    VersionConflict(String),

    #[error("capacity exceeded: {0}")]
    Capacity(String),

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("cancelled: {0}")]
    Cancelled(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl OrchestratorError {
    pub fn not_found(entity: &str, id: impl std::fmt::Display) -> Self {
        Self::NotFound(format!("{entity} '{id}' not found"))
    }

    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::Invalid(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn cycle(msg: impl Into<String>) -> Self {
        Self::Cycle(msg.into())
    }

    pub fn version_conflict(msg: impl Into<String>) -> Self {
        Self::VersionConflict(msg.into())
    }

    pub fn capacity(msg: impl Into<String>) -> Self {
        Self::Capacity(msg.into())
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::Forbidden(msg.into())
    }

    pub fn cancelled(msg: impl Into<String>) -> Self {
        Self::Cancelled(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Invalid(_) => ErrorKind::Invalid,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::Conflict(_) => ErrorKind::Conflict,
            Self::Cycle(_) => ErrorKind::Cycle,
            Self::VersionConflict(_) => ErrorKind::VersionConflict,
            Self::Capacity(_) => ErrorKind::Capacity,
            Self::Forbidden(_) => ErrorKind::Forbidden,
            Self::Cancelled(_) => ErrorKind::Cancelled,
            Self::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Conventional HTTP-equivalent status code, used only for logging and
    /// diagnostics; the wire envelope carries `kind`, not this code.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Invalid(_) => 400,
            Self::NotFound(_) => 404,
            Self::Conflict(_) => 409,
            Self::Cycle(_) => 409,
            Self::VersionConflict(_) => 409,
            Self::Capacity(_) => 429,
            Self::Forbidden(_) => 403,
            Self::Cancelled(_) => 499,
            Self::Internal(_) => 500,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::VersionConflict(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_and_status_code_agree_per_variant() {
        assert_eq!(OrchestratorError::invalid("x").kind(), ErrorKind::Invalid);
        assert_eq!(OrchestratorError::invalid("x").status_code(), 400);
        assert_eq!(OrchestratorError::not_found("task", 1).status_code(), 404);
        assert!(OrchestratorError::version_conflict("x").is_retryable());
        assert!(!OrchestratorError::conflict("x").is_retryable());
    }

    #[test]
    fn error_kind_serializes_screaming_snake_case() {
        let json = serde_json::to_string(&ErrorKind::VersionConflict).unwrap();
        assert_eq!(json, "\"VERSION_CONFLICT\"");
    }
}
