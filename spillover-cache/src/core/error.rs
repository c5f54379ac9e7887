use std::io;
use thiserror::Error;

/// Main error type for spillover cache operations
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Key not found: {0}")]
    NotFound(String),

    #[error("Corrupt data for key {key}: {reason}")]
    CorruptData { key: String, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Invalid key: {0}")]
    InvalidKey(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl CacheError {
    /// Whether a read should treat this error as a plain cache miss
    pub fn is_miss(&self) -> bool {
        matches!(self, Self::NotFound(_) | Self::CorruptData { .. })
    }

    pub(crate) fn corrupt(key: &str, reason: impl Into<String>) -> Self {
        Self::CorruptData {
            key: key.to_string(),
            reason: reason.into(),
        }
    }
}

/// Result type alias for cache operations
pub type Result<T> = std::result::Result<T, CacheError>;
