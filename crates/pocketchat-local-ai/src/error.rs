//! Error types for local AI operations.

use serde::Serialize;
use thiserror::Error;

/// Errors that can occur while acquiring, starting or querying the model.
#[derive(Debug, Error)]
pub enum LocalAIError {
    /// HTTP transport failed (connect, read, TLS).
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The model source answered with a non-success status.
    #[error("failed to download model: {0}")]
    DownloadFailed(String),

    /// Reading or writing the local artifact failed.
    #[error("storage error: {0}")]
    Storage(#[from] std::io::Error),

    /// The inference engine could not be constructed.
    #[error("failed to initialize engine: {0}")]
    EngineInit(String),

    /// llama-server binary not found.
    #[error("llama-server binary not found at {0}")]
    ServerBinaryNotFound(String),

    /// Timeout waiting for server to start.
    #[error("timeout waiting for llama-server to become ready")]
    ServerStartTimeout,

    /// The engine rejected or failed a completion request.
    #[error("completion failed: {0}")]
    Completion(String),

    /// A completion was requested before the model was ready.
    #[error("model is not ready")]
    NotReady,
}

/// Coarse classification of a [`LocalAIError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Network,
    Storage,
    EngineInit,
    Completion,
}

impl LocalAIError {
    /// Classify this error.
    pub fn kind(&self) -> FailureKind {
        match self {
            LocalAIError::Network(_) | LocalAIError::DownloadFailed(_) => FailureKind::Network,
            LocalAIError::Storage(_) => FailureKind::Storage,
            LocalAIError::EngineInit(_)
            | LocalAIError::ServerBinaryNotFound(_)
            | LocalAIError::ServerStartTimeout => FailureKind::EngineInit,
            LocalAIError::Completion(_) | LocalAIError::NotReady => FailureKind::Completion,
        }
    }
}

/// Why the lifecycle ended up `Failed`, kept for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailureReason {
    pub kind: FailureKind,
    pub message: String,
}

impl From<&LocalAIError> for FailureReason {
    fn from(err: &LocalAIError) -> Self {
        Self {
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kinds() {
        assert_eq!(
            LocalAIError::DownloadFailed("HTTP 404".into()).kind(),
            FailureKind::Network
        );
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only");
        assert_eq!(LocalAIError::from(io).kind(), FailureKind::Storage);
        assert_eq!(LocalAIError::ServerStartTimeout.kind(), FailureKind::EngineInit);
        assert_eq!(LocalAIError::NotReady.kind(), FailureKind::Completion);
    }

    #[test]
    fn test_failure_reason_keeps_message() {
        let reason = FailureReason::from(&LocalAIError::EngineInit("bad magic".into()));
        assert_eq!(reason.kind, FailureKind::EngineInit);
        assert_eq!(reason.message, "failed to initialize engine: bad magic");
    }
}
