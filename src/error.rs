//! Error types
//!
//! None of these abort a scan. Tag errors are reported through the scanner's
//! error channel, persistence errors are logged by the store, and config
//! errors only surface when a caller loads a `ScannerConfig` from JSON.

use thiserror::Error;

/// Why an artifact open tag was rejected
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TagError {
    /// A required attribute is absent or empty
    #[error("artifact tag is missing required attribute `{0}`")]
    MissingAttribute(&'static str),

    /// The `type` attribute is not one of the accepted artifact kinds
    #[error("unsupported artifact type `{0}` (expected `react-component` or `component`)")]
    UnsupportedKind(String),
}

/// Failure reported by a persistence backend
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PersistError {
    #[error("persistence backend unavailable: {0}")]
    Unavailable(String),

    #[error("failed to persist artifact {artifact_id} of message {message_id}: {reason}")]
    Rejected {
        message_id: String,
        artifact_id: String,
        reason: String,
    },
}

/// Failure loading scanner configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid scanner config: {0}")]
    Json(#[from] serde_json::Error),

    #[error("tag name `{0}` must be non-empty ASCII alphanumeric (plus `-` / `_`)")]
    InvalidTagName(String),
}
