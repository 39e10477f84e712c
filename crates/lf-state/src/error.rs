//! Error types for practice state

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StateError {
    #[error("Favorite not found: {0}")]
    NotFound(String),

    #[error("Invalid order: {0}")]
    InvalidOrder(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

pub type StateResult<T> = Result<T, StateError>;
