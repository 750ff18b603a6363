//! Error types for transfer orchestration.

use thiserror::Error;

use crate::transfer_state::TransferId;

/// Errors reported by a transfer engine implementation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("Engine rejected transfer: {0}")]
    Rejected(String),

    #[error("Transfer unknown to engine: {0}")]
    UnknownTransfer(TransferId),

    #[error("Engine unavailable: {0}")]
    Unavailable(String),
}

/// Main error type for orchestration operations.
#[derive(Error, Debug)]
pub enum OrchestratorError {
    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error("Invalid transfer flags: {0}")]
    InvalidFlags(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Orchestrator is not running")]
    NotRunning,

    #[error("No async runtime available: {0}")]
    Runtime(String),
}

impl serde::Serialize for OrchestratorError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

/// Result type alias for orchestration operations.
pub type OrchestratorResult<T> = Result<T, OrchestratorError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_error_is_transparent() {
        let err: OrchestratorError = EngineError::Rejected("bad remote".into()).into();
        assert_eq!(err.to_string(), "Engine rejected transfer: bad remote");
    }

    #[test]
    fn test_error_serializes_as_message() {
        let err = OrchestratorError::InvalidFlags("parallel transfers must be at least 1".into());
        let json = serde_json::to_string(&err).unwrap();
        assert_eq!(json, "\"Invalid transfer flags: parallel transfers must be at least 1\"");
    }
}
