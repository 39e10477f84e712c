//! Error types for the transformation pipeline

use std::time::Duration;

use thiserror::Error;

use lf_core::CoreError;
use lf_worker::UnitError;

/// Why a transform job did not produce a buffer
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TransformError {
    #[error("Initialization failed: {0}")]
    Initialization(String),

    #[error("Processing failed: {0}")]
    Processing(String),

    #[error("Processing timed out after {0:?}")]
    Timeout(Duration),

    #[error("Job cancelled")]
    Cancelled,

    #[error("Unit error: {0}")]
    Unit(#[from] UnitError),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PlaybackError {
    #[error("No active buffer")]
    NoActiveBuffer,

    #[error("Invalid loop region: start {start:.3}s must be before end {end:.3}s")]
    InvalidLoop { start: f64, end: f64 },
}

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Session closed")]
    Closed,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Core error: {0}")]
    Core(#[from] CoreError),

    #[error("Playback error: {0}")]
    Playback(#[from] PlaybackError),

    /// The decode task panicked or was cancelled
    #[error("Decode task failed: {0}")]
    Decode(String),
}

pub type TransformResult<T> = Result<T, TransformError>;
pub type PlaybackResult<T> = Result<T, PlaybackError>;
pub type SessionResult<T> = Result<T, SessionError>;
