//! Error types for the memory-match crate.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum GameError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    /// The key-value backend refused the operation.
    #[error("Storage unavailable: {0}")]
    Storage(String),

    #[error("Username must be at least {min_len} characters")]
    InvalidUsername { min_len: usize },
}

pub type Result<T> = std::result::Result<T, GameError>;
