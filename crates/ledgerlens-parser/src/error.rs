//! Error types for ledgerlens-parser

use thiserror::Error;

/// Failure to parse an individual value
///
/// The document parser never returns these to callers: a whole-document
/// parse always succeeds, and value-level failures are downgraded into
/// [`crate::document::Diagnostic`] entries on the affected line.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("Cannot parse date: '{text}'")]
    MalformedDate { text: String },

    #[error("Cannot parse amount: '{text}'")]
    MalformedAmount { text: String },
}
