//! Ledger document parser
//!
//! A forgiving, position-aware, line-based parser for plain-text
//! double-entry accounting files. Raw text goes in, a [`Document`] with
//! accumulated [`Diagnostic`]s comes out; nothing in here ever throws for
//! malformed input.

pub mod document;
pub mod error;
pub mod parser;
pub mod tokenizer;
pub mod types;

pub use document::{
    BalanceState, Diagnostic, DiagnosticKind, Document, Posting, PostingRef, Severity,
    Transaction,
};
pub use error::ParseError;
pub use parser::LedgerParser;
pub use tokenizer::{classify, tokenize, LineKind, LineToken};
pub use types::{
    parse_date, Amount, Commodity, ReconcileStatus, SpanInfo, SymbolPosition,
};

// ==================== Utility Functions ====================

/// Generate a short hash (8 characters) from document content
///
/// Used as the cache fingerprint for a text snapshot.
pub fn content_hash(content: &str) -> String {
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};

    let mut hasher = DefaultHasher::new();
    content.hash(&mut hasher);
    let hash = hasher.finish();

    format!("{:016x}", hash)[..8].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_hash_is_stable() {
        let a = content_hash("2024-01-01 Shop");
        let b = content_hash("2024-01-01 Shop");
        assert_eq!(a, b);
        assert_eq!(a.len(), 8);
    }

    #[test]
    fn test_content_hash_differs() {
        assert_ne!(content_hash("a"), content_hash("b"));
    }
}
