//! Error types for blockindex
//!
//! Provides a unified error type for all operations.
//!
//! Every variant is a hard failure: nothing is retried internally and a
//! failed insert/erase may leave the on-disk structure partially updated.

use thiserror::Error;

use crate::storage::Offset;

/// Result type alias using IndexError
pub type Result<T> = std::result::Result<T, IndexError>;

/// Unified error type for blockindex operations
#[derive(Debug, Error)]
pub enum IndexError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // Block / Chain Errors
    // -------------------------------------------------------------------------
    #[error("Invalid offset {offset} (storage size {size})")]
    InvalidOffset { offset: Offset, size: Offset },

    #[error("Block capacity exceeded: capacity is {capacity}")]
    CapacityExceeded { capacity: usize },

    #[error("Structural inconsistency: {0}")]
    StructuralInconsistency(String),

    #[error("Format error: {0}")]
    Format(String),

    // -------------------------------------------------------------------------
    // Value Log Errors
    // -------------------------------------------------------------------------
    #[error("Value log corruption detected: {0}")]
    ValueLogCorruption(String),

    // -------------------------------------------------------------------------
    // Serialization Errors
    // -------------------------------------------------------------------------
    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Key too long: {len} bytes (max {max})")]
    KeyTooLong { len: usize, max: usize },

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<bincode::Error> for IndexError {
    fn from(err: bincode::Error) -> Self {
        IndexError::Serialization(err.to_string())
    }
}
