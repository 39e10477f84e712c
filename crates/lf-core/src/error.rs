//! Error types for LoopForge core

use thiserror::Error;

/// Core error type
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Invalid buffer: {0}")]
    InvalidBuffer(String),

    #[error("Channel length mismatch: channel {channel} has {actual} frames, expected {expected}")]
    ChannelMismatch {
        channel: usize,
        expected: usize,
        actual: usize,
    },

    #[error("Invalid sample rate: {0}")]
    InvalidSampleRate(u32),

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias
pub type CoreResult<T> = Result<T, CoreError>;
