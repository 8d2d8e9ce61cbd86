//! Error types for the eScan core.

use escan_db::BackendError;
use thiserror::Error;

use crate::recognition::RecognitionError;

pub type Result<T> = std::result::Result<T, CoreError>;

#[derive(Error, Debug)]
pub enum CoreError {
    /// Storage engine failure (open, migrate, insert, query).
    #[error("Storage error: {0}")]
    Storage(#[from] BackendError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Recognition failed: {0}")]
    Recognition(#[from] RecognitionError),
}

impl CoreError {
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}
