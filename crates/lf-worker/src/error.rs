//! Error types for the transform unit

use thiserror::Error;

/// Unit lifecycle errors, seen by the owner of a [`crate::WorkerUnit`]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UnitError {
    #[error("Failed to spawn transform unit: {0}")]
    SpawnFailed(String),

    #[error("Transform unit disconnected")]
    Disconnected,

    #[error("Transform unit already has a request")]
    AlreadySubmitted,

    #[error("Transform unit terminated")]
    Terminated,
}

/// Failures raised by a [`crate::StretchEngine`] implementation
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("Engine initialization failed: {0}")]
    Init(String),

    #[error("Engine rejected configuration: {0}")]
    Config(String),

    #[error("Engine processing failed: {0}")]
    Processing(String),
}

/// Result type alias
pub type UnitResult<T> = Result<T, UnitError>;

/// Result type alias for engine calls
pub type EngineResult<T> = Result<T, EngineError>;
