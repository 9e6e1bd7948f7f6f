//! Common Error Types for the pool node
//!
//! Provides unified error handling across all modules.

use shielded_pool::PoolError;
use thiserror::Error;

use crate::storage::StorageError;

/// Root error type for the pool node
#[derive(Debug, Error)]
pub enum NodeError {
    /// Configuration errors
    #[error("configuration error: {0}")]
    Config(#[from] super::config::ConfigError),

    /// Logging errors
    #[error("logging error: {0}")]
    Logging(#[from] super::logging::LoggingError),

    /// A transition or read was refused by the ledger core
    #[error("pool error {}: {0}", .0.code())]
    Pool(#[from] PoolError),

    /// Storage errors
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// Proof verifier transport errors
    #[error("verifier error: {0}")]
    Verifier(String),

    /// Validation errors
    #[error("validation error: {0}")]
    Validation(String),

    /// Internal errors
    #[error("internal error: {0}")]
    Internal(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl NodeError {
    /// Create a verifier error
    pub fn verifier(msg: impl Into<String>) -> Self {
        Self::Verifier(msg.into())
    }

    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create an internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Check if this is a retryable error
    ///
    /// Pool rejections are final, except a call that found the ledger busy.
    pub fn is_retryable(&self) -> bool {
        match self {
            NodeError::Pool(e) => matches!(e, PoolError::StateBusy),
            NodeError::Storage(_) | NodeError::Verifier(_) | NodeError::Io(_) => true,
            _ => false,
        }
    }

    /// Get error code for API responses
    pub fn error_code(&self) -> &'static str {
        match self {
            NodeError::Config(_) => "CONFIG_ERROR",
            NodeError::Logging(_) => "LOGGING_ERROR",
            NodeError::Pool(_) => "POOL_ERROR",
            NodeError::Storage(_) => "STORAGE_ERROR",
            NodeError::Verifier(_) => "VERIFIER_ERROR",
            NodeError::Validation(_) => "VALIDATION_ERROR",
            NodeError::Internal(_) => "INTERNAL_ERROR",
            NodeError::Io(_) => "IO_ERROR",
        }
    }

    /// Numeric ledger code when the core refused the call
    pub fn pool_code(&self) -> Option<u32> {
        match self {
            NodeError::Pool(e) => Some(e.code()),
            _ => None,
        }
    }
}

/// Result type alias using NodeError
pub type Result<T> = std::result::Result<T, NodeError>;
