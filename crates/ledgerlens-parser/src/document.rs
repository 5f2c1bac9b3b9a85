//! Parsed document model: transactions, postings, diagnostics

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::types::{Amount, ReconcileStatus, SpanInfo};

/// Parsed snapshot of one ledger text
///
/// Owns the source text and all structure derived from it. Rebuilt in full
/// on every parse; line and byte positions always refer to the snapshot
/// taken at parse time.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Document {
    source: String,
    line_spans: Vec<SpanInfo>,
    pub transactions: Vec<Transaction>,
    pub diagnostics: Vec<Diagnostic>,
}

impl Document {
    pub(crate) fn new(source: String, line_spans: Vec<SpanInfo>) -> Self {
        Self {
            source,
            line_spans,
            transactions: Vec::new(),
            diagnostics: Vec::new(),
        }
    }

    /// The full source text this document was parsed from
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Number of lines in the snapshot
    pub fn line_count(&self) -> usize {
        self.line_spans.len()
    }

    /// Content of one line, without its terminator
    pub fn line(&self, index: usize) -> Option<&str> {
        self.line_spans
            .get(index)
            .map(|span| &self.source[span.start..span.end])
    }

    /// Byte offset of the start of a line
    pub fn line_offset(&self, index: usize) -> Option<usize> {
        self.line_spans.get(index).map(|span| span.start)
    }

    /// Byte offset for a (line, character-column) position
    ///
    /// Returns None when the line is out of range or the column lies past
    /// the end of the line.
    pub fn offset_at(&self, line: usize, column: usize) -> Option<usize> {
        let span = self.line_spans.get(line)?;
        let text = &self.source[span.start..span.end];
        if column == 0 {
            return Some(span.start);
        }
        let mut chars = 0;
        for (byte_idx, _) in text.char_indices() {
            if chars == column {
                return Some(span.start + byte_idx);
            }
            chars += 1;
        }
        if column == chars {
            Some(span.end)
        } else {
            None
        }
    }

    /// The transaction whose line range contains the given line
    pub fn transaction_at_line(&self, line: usize) -> Option<(usize, &Transaction)> {
        self.transactions
            .iter()
            .enumerate()
            .find(|(_, t)| t.first_line <= line && line <= t.last_line)
    }

    /// Resolve a posting reference
    pub fn posting(&self, r: PostingRef) -> Option<&Posting> {
        self.transactions.get(r.transaction)?.postings.get(r.posting)
    }

    /// Whether transactions appear in non-decreasing date order
    pub fn is_date_sorted(&self) -> bool {
        self.transactions.windows(2).all(|w| w[0].date <= w[1].date)
    }
}

/// One dated transaction and its postings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    /// Primary date from the header line
    pub date: NaiveDate,
    /// Secondary date after `=`, if present
    pub effective_date: Option<NaiveDate>,
    /// Status marker written on the header itself
    pub status: ReconcileStatus,
    /// Free-text payee from the header (may be empty)
    pub payee: String,
    pub postings: Vec<Posting>,
    /// Header line index
    pub first_line: usize,
    /// Last body line index, inclusive (postings and attached comments)
    pub last_line: usize,
    /// True when any posting amount failed to parse
    pub has_malformed_amount: bool,
    /// Outcome of balance validation
    pub balance: BalanceState,
}

impl Transaction {
    /// Reconciliation status derived from the postings
    ///
    /// The header marker wins when present. Otherwise: cleared when every
    /// posting is cleared, pending when any posting is pending, uncleared
    /// otherwise.
    pub fn derived_status(&self) -> ReconcileStatus {
        if self.status != ReconcileStatus::Uncleared {
            return self.status;
        }
        if !self.postings.is_empty()
            && self
                .postings
                .iter()
                .all(|p| p.status == ReconcileStatus::Cleared)
        {
            return ReconcileStatus::Cleared;
        }
        if self
            .postings
            .iter()
            .any(|p| p.status == ReconcileStatus::Pending)
        {
            return ReconcileStatus::Pending;
        }
        ReconcileStatus::Uncleared
    }

    pub fn is_balanced(&self) -> bool {
        matches!(self.balance, BalanceState::Balanced)
    }

    /// Postings whose amount was elided in source
    pub fn elided_postings(&self) -> impl Iterator<Item = (usize, &Posting)> {
        self.postings
            .iter()
            .enumerate()
            .filter(|(_, p)| p.amount.is_none())
    }
}

/// Outcome of balance validation for a transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", tag = "state")]
pub enum BalanceState {
    /// Explicit amounts sum to zero, possibly after elision inference
    Balanced,
    /// Amounts do not sum to zero; the residual is what remains
    Unbalanced { residual: Amount },
    /// Validation was skipped (mixed commodities or malformed amounts)
    Unchecked,
}

impl Default for BalanceState {
    fn default() -> Self {
        BalanceState::Unchecked
    }
}

/// One account/amount line within a transaction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Posting {
    /// Colon-separated account path, e.g. "Expenses:Food"
    pub account: String,
    /// Amount as written, None when elided
    pub amount: Option<Amount>,
    /// Amount assigned by elision inference during balance validation
    pub inferred_amount: Option<Amount>,
    pub status: ReconcileStatus,
    /// Line index of this posting
    pub line: usize,
    /// Trailing `; ...` comment text, marker stripped
    pub comment: Option<String>,
    /// Byte span of the account path
    pub account_span: SpanInfo,
    /// Byte span of the amount text, when explicit
    pub amount_span: Option<SpanInfo>,
    /// Byte span of the status marker character, when present
    pub status_span: Option<SpanInfo>,
}

impl Posting {
    /// The amount this posting contributes: explicit or inferred
    pub fn effective_amount(&self) -> Option<&Amount> {
        self.amount.as_ref().or(self.inferred_amount.as_ref())
    }
}

/// Arena-style address of a posting within a document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostingRef {
    pub transaction: usize,
    pub posting: usize,
}

/// Classification of a diagnostic
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DiagnosticKind {
    MalformedDate,
    MalformedAmount,
    UnbalancedTransaction,
    AmbiguousElision,
    MixedCommodityUnchecked,
}

impl std::fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DiagnosticKind::MalformedDate => write!(f, "MALFORMED_DATE"),
            DiagnosticKind::MalformedAmount => write!(f, "MALFORMED_AMOUNT"),
            DiagnosticKind::UnbalancedTransaction => write!(f, "UNBALANCED_TRANSACTION"),
            DiagnosticKind::AmbiguousElision => write!(f, "AMBIGUOUS_ELISION"),
            DiagnosticKind::MixedCommodityUnchecked => write!(f, "MIXED_COMMODITY_UNCHECKED"),
        }
    }
}

/// Diagnostic severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Info => write!(f, "info"),
            Severity::Warning => write!(f, "warning"),
            Severity::Error => write!(f, "error"),
        }
    }
}

/// A problem found during parsing or validation
///
/// Diagnostics accumulate on the document; one bad line degrades locally
/// and never aborts the parse.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    /// Line the problem was found on
    pub line: usize,
    pub severity: Severity,
    pub kind: DiagnosticKind,
    pub message: String,
}

impl Diagnostic {
    pub fn error(line: usize, kind: DiagnosticKind, message: String) -> Self {
        Self {
            line,
            severity: Severity::Error,
            kind,
            message,
        }
    }

    pub fn info(line: usize, kind: DiagnosticKind, message: String) -> Self {
        Self {
            line,
            severity: Severity::Info,
            kind,
            message,
        }
    }
}

// ==================== Tests ====================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::LedgerParser;

    #[test]
    fn test_offset_at() {
        let doc = LedgerParser::parse("abc\ndef\n");
        assert_eq!(doc.offset_at(0, 0), Some(0));
        assert_eq!(doc.offset_at(0, 2), Some(2));
        assert_eq!(doc.offset_at(0, 3), Some(3));
        assert_eq!(doc.offset_at(1, 1), Some(5));
        assert_eq!(doc.offset_at(1, 4), None);
        assert_eq!(doc.offset_at(5, 0), None);
    }

    #[test]
    fn test_offset_at_multibyte() {
        let doc = LedgerParser::parse("2024-01-01 Café\n");
        // 'é' is two bytes; column counts chars
        assert_eq!(doc.offset_at(0, 15), Some(16));
    }

    #[test]
    fn test_line_access() {
        let doc = LedgerParser::parse("one\n\nthree");
        assert_eq!(doc.line_count(), 3);
        assert_eq!(doc.line(0), Some("one"));
        assert_eq!(doc.line(1), Some(""));
        assert_eq!(doc.line(2), Some("three"));
        assert_eq!(doc.line(3), None);
        assert_eq!(doc.line_offset(2), Some(5));
    }

    #[test]
    fn test_transaction_at_line() {
        let doc = LedgerParser::parse("2024-01-01 Shop\n Expenses:Food  $5.00\n Assets:Cash\n");
        assert!(doc.transaction_at_line(0).is_some());
        assert!(doc.transaction_at_line(2).is_some());
        assert!(doc.transaction_at_line(3).is_none());
    }

    #[test]
    fn test_derived_status() {
        let doc = LedgerParser::parse(
            "2024-01-01 A\n * Expenses:Food  $5.00\n * Assets:Cash  -$5.00\n\n2024-01-02 B\n ! Expenses:Food  $5.00\n Assets:Cash  -$5.00\n",
        );
        assert_eq!(doc.transactions[0].derived_status(), ReconcileStatus::Cleared);
        assert_eq!(doc.transactions[1].derived_status(), ReconcileStatus::Pending);
    }

    #[test]
    fn test_header_status_wins() {
        let doc = LedgerParser::parse("2024-01-01 * Shop\n Expenses:Food  $5.00\n Assets:Cash\n");
        assert_eq!(doc.transactions[0].derived_status(), ReconcileStatus::Cleared);
    }
}
