//! Error types for ledgerlens-core
//!
//! Query-level "nothing found" outcomes are not errors: queries return
//! empty or absent results for those. These types cover genuinely invalid
//! requests, such as a posting reference that does not exist in the
//! document it is applied to.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error codes for programmatic error handling
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Posting reference out of range
    PostingNotFound,
    /// Line index outside the document
    LineOutOfRange,
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorCode::PostingNotFound => write!(f, "POSTING_NOT_FOUND"),
            ErrorCode::LineOutOfRange => write!(f, "LINE_OUT_OF_RANGE"),
        }
    }
}

/// Error severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorSeverity {
    Info,
    Warning,
    Error,
}

impl std::fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorSeverity::Info => write!(f, "info"),
            ErrorSeverity::Warning => write!(f, "warning"),
            ErrorSeverity::Error => write!(f, "error"),
        }
    }
}

/// Main error type for ledgerlens-core
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Posting not found: transaction {transaction}, posting {posting}")]
    PostingNotFound { transaction: usize, posting: usize },

    #[error("Line {line} is outside the document")]
    LineOutOfRange { line: usize },
}

impl CoreError {
    /// Get the error code
    pub fn code(&self) -> ErrorCode {
        match self {
            CoreError::PostingNotFound { .. } => ErrorCode::PostingNotFound,
            CoreError::LineOutOfRange { .. } => ErrorCode::LineOutOfRange,
        }
    }

    /// Get the severity level
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            CoreError::PostingNotFound { .. } => ErrorSeverity::Error,
            CoreError::LineOutOfRange { .. } => ErrorSeverity::Error,
        }
    }
}

/// Result type with CoreError
pub type CoreResult<T> = Result<T, CoreError>;

// ==================== Tests ====================
