//! Structured edit operations over the original text
//!
//! Every mutation-shaped feature is expressed as a query returning edit
//! operations (byte range plus replacement) against the snapshot the
//! document was parsed from. Nothing here touches an editor surface.

use ledgerlens_parser::{
    BalanceState, Diagnostic, DiagnosticKind, Document, PostingRef, ReconcileStatus, SpanInfo,
    Transaction,
};
use ledgerlens_utils::display_width;
use once_cell::sync::OnceCell;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::Index;

/// One replacement over the original text
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditOp {
    /// Byte offset where the edit starts
    pub start: usize,
    /// Byte offset where the edit ends (exclusive)
    pub end: usize,
    pub replacement: String,
}

/// Cursor position as (line, character-column)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub line: usize,
    pub column: usize,
}

/// One completion candidate with its mandatory replacement range
///
/// The range always covers the already-typed prefix, so repeated
/// invocation while typing replaces instead of appending.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Completion {
    pub text: String,
    pub replace_range: SpanInfo,
}

/// Apply a set of non-overlapping edits to text
pub fn apply_edits(text: &str, edits: &[EditOp]) -> String {
    let mut sorted: Vec<&EditOp> = edits.iter().collect();
    sorted.sort_by_key(|e| e.start);
    let mut out = String::with_capacity(text.len());
    let mut cursor = 0;
    for edit in sorted {
        out.push_str(&text[cursor..edit.start]);
        out.push_str(&edit.replacement);
        cursor = edit.end;
    }
    out.push_str(&text[cursor..]);
    out
}

static HEADER_PREFIX_PATTERN: OnceCell<Regex> = OnceCell::new();
static POSTING_PREFIX_PATTERN: OnceCell<Regex> = OnceCell::new();
static HARD_GAP_PATTERN: OnceCell<Regex> = OnceCell::new();

fn header_prefix_regex() -> &'static Regex {
    HEADER_PREFIX_PATTERN.get_or_init(|| {
        Regex::new(r"^\d{4}[/-]\d{2}[/-]\d{2}(?:=\d{4}[/-]\d{2}[/-]\d{2})?[ \t]+(?:[*!][ \t]+)?")
            .unwrap()
    })
}

fn posting_prefix_regex() -> &'static Regex {
    POSTING_PREFIX_PATTERN.get_or_init(|| Regex::new(r"^[ \t]+(?:[*!][ \t]+)?").unwrap())
}

fn hard_gap_regex() -> &'static Regex {
    HARD_GAP_PATTERN.get_or_init(|| Regex::new(r" {2,}|\t").unwrap())
}

/// Completion candidates at a cursor position
///
/// A header line completes payees, an indented line completes accounts.
/// Candidates keep the index's first-appearance order; the filter is a
/// case-insensitive prefix match on the typed token. A position outside
/// the document, or in a region with nothing to complete (the date, the
/// amount column), yields an empty list.
pub fn completions(document: &Document, index: &Index<'_>, position: Position) -> Vec<Completion> {
    let line_text = match document.line(position.line) {
        Some(text) => text,
        None => return Vec::new(),
    };
    let cursor = match document.offset_at(position.line, position.column) {
        Some(offset) => offset,
        None => return Vec::new(),
    };
    let line_start = match document.line_offset(position.line) {
        Some(offset) => offset,
        None => return Vec::new(),
    };
    let cursor_in_line = cursor - line_start;

    let (token_start, candidates): (usize, &[&str]) =
        if let Some(m) = header_prefix_regex().find(line_text) {
            (m.end(), index.payees_in_order())
        } else if let Some(m) = posting_prefix_regex().find(line_text) {
            (m.end(), index.accounts_in_order())
        } else {
            return Vec::new();
        };

    if cursor_in_line < token_start {
        return Vec::new();
    }
    let prefix = &line_text[token_start..cursor_in_line];
    // past the account, inside the amount column: nothing to complete
    if hard_gap_regex().is_match(prefix) {
        return Vec::new();
    }

    let prefix_lower = prefix.to_lowercase();
    candidates
        .iter()
        .filter(|c| c.to_lowercase().starts_with(&prefix_lower) && **c != prefix)
        .map(|c| Completion {
            text: c.to_string(),
            replace_range: SpanInfo::new(line_start + token_start, cursor),
        })
        .collect()
}

/// Minimal edit that makes an unbalanced transaction balance
///
/// Only offered when exactly one deterministic fix exists: the diagnostic
/// is an unbalanced-transaction error, every posting has an explicit
/// well-formed amount, and the commodity is unambiguous. The last
/// posting's amount is rewritten so the sum is zero. Anything else
/// returns None rather than a guess.
pub fn quick_fix(document: &Document, diagnostic: &Diagnostic) -> Option<EditOp> {
    if diagnostic.kind != DiagnosticKind::UnbalancedTransaction {
        return None;
    }
    let (_, txn) = document.transaction_at_line(diagnostic.line)?;
    let residual = match &txn.balance {
        BalanceState::Unbalanced { residual } => residual,
        _ => return None,
    };
    if txn.has_malformed_amount || txn.postings.iter().any(|p| p.amount.is_none()) {
        return None;
    }
    let target = txn.postings.last()?;
    let amount = target.amount.as_ref()?;
    let span = target.amount_span?;
    let fixed = amount.with_value(amount.value - residual.value);
    Some(EditOp {
        start: span.start,
        end: span.end,
        replacement: fixed.to_string(),
    })
}

/// Edit that sets a posting's reconciliation marker
///
/// Replaces, inserts, or removes exactly the marker bytes; the rest of
/// the line is untouched. Ok(None) when the posting already has the
/// target status.
pub fn toggle_reconcile(
    document: &Document,
    posting: PostingRef,
    target: ReconcileStatus,
) -> Result<Option<EditOp>, CoreError> {
    let p = document.posting(posting).ok_or(CoreError::PostingNotFound {
        transaction: posting.transaction,
        posting: posting.posting,
    })?;
    if p.status == target {
        return Ok(None);
    }
    let edit = match (p.status_span, target.marker()) {
        (Some(span), Some(marker)) => EditOp {
            start: span.start,
            end: span.end,
            replacement: marker.to_string(),
        },
        (Some(span), None) => EditOp {
            start: span.start,
            end: p.account_span.start,
            replacement: String::new(),
        },
        (None, Some(marker)) => EditOp {
            start: p.account_span.start,
            end: p.account_span.start,
            replacement: format!("{} ", marker),
        },
        // both uncleared is covered by the equality check above
        (None, None) => return Ok(None),
    };
    Ok(Some(edit))
}

/// Tuning for the organize pass
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrganizeOptions {
    /// Spaces between the account column and the amount column
    pub amount_gap: usize,
    /// Floor for the amount column, in display columns from line start
    pub min_amount_column: usize,
}

impl Default for OrganizeOptions {
    fn default() -> Self {
        Self {
            amount_gap: 2,
            min_amount_column: 0,
        }
    }
}

/// Layout unit while reassembling the document
enum Unit {
    /// Index into document.transactions
    Block(usize),
    /// Contiguous run of non-blank lines outside any transaction
    Loose(Vec<usize>),
}

/// Organize with default options
pub fn organize(document: &Document) -> Vec<EditOp> {
    organize_with(document, &OrganizeOptions::default())
}

/// Re-sort transactions by date and re-align amount columns
///
/// The sort is stable: equal dates keep their original relative order.
/// Comment lines inside a transaction's range travel with it. Loose
/// non-blank lines (directives, standalone comments) act as pivots:
/// only runs of adjacent transaction blocks between them are reordered,
/// and the lines themselves stay where they are. Blank separation is
/// normalized to a single line between units. Idempotent.
pub fn organize_with(document: &Document, options: &OrganizeOptions) -> Vec<EditOp> {
    let mut units: Vec<Unit> = Vec::new();
    let mut line = 0;
    while line < document.line_count() {
        if let Some((idx, txn)) = document.transaction_at_line(line) {
            if txn.first_line == line {
                units.push(Unit::Block(idx));
                line = txn.last_line + 1;
                continue;
            }
        }
        let text = document.line(line).unwrap_or("");
        if text.trim().is_empty() {
            line += 1;
            continue;
        }
        match units.last_mut() {
            Some(Unit::Loose(lines)) if *lines.last().unwrap() + 1 == line => lines.push(line),
            _ => units.push(Unit::Loose(vec![line])),
        }
        line += 1;
    }

    // stable date sort within each maximal run of adjacent blocks
    let mut start = 0;
    while start < units.len() {
        if !matches!(units[start], Unit::Block(_)) {
            start += 1;
            continue;
        }
        let mut end = start;
        while end < units.len() && matches!(units[end], Unit::Block(_)) {
            end += 1;
        }
        units[start..end].sort_by_key(|u| match u {
            Unit::Block(idx) => document.transactions[*idx].date,
            Unit::Loose(_) => unreachable!(),
        });
        start = end;
    }

    let mut out_lines: Vec<String> = Vec::new();
    for (i, unit) in units.iter().enumerate() {
        if i > 0 {
            out_lines.push(String::new());
        }
        match unit {
            Unit::Loose(lines) => {
                for &l in lines {
                    out_lines.push(document.line(l).unwrap_or("").to_string());
                }
            }
            Unit::Block(idx) => {
                render_block(document, &document.transactions[*idx], options, &mut out_lines);
            }
        }
    }

    let mut updated = out_lines.join("\n");
    if document.source().ends_with('\n') && !updated.is_empty() {
        updated.push('\n');
    }

    match diff_edit(document.source(), &updated) {
        Some(edit) => vec![edit],
        None => Vec::new(),
    }
}

/// Leading part of a posting line: indent, marker, account
fn posting_lead<'d>(document: &'d Document, account_span: SpanInfo, line: usize) -> &'d str {
    let line_start = document.line_offset(line).unwrap_or(0);
    let text = document.line(line).unwrap_or("");
    &text[..account_span.end - line_start]
}

/// Render one transaction block with aligned amount columns
fn render_block(
    document: &Document,
    txn: &Transaction,
    options: &OrganizeOptions,
    out: &mut Vec<String>,
) {
    let mut column = options.min_amount_column;
    for p in &txn.postings {
        if p.amount_span.is_some() {
            let width = display_width(posting_lead(document, p.account_span, p.line))
                + options.amount_gap;
            column = column.max(width);
        }
    }

    for line in txn.first_line..=txn.last_line {
        let posting = txn.postings.iter().find(|p| p.line == line);
        let text = document.line(line).unwrap_or("");
        match posting {
            None => out.push(text.to_string()),
            Some(p) => {
                let lead = posting_lead(document, p.account_span, p.line);
                let mut rendered = lead.to_string();
                if let Some(span) = p.amount_span {
                    let line_start = document.line_offset(line).unwrap_or(0);
                    let amount_text = &text[span.start - line_start..span.end - line_start];
                    let pad = column.saturating_sub(display_width(lead));
                    rendered.push_str(&" ".repeat(pad));
                    rendered.push_str(amount_text);
                }
                if let Some(comment) = &p.comment {
                    rendered.push_str("  ; ");
                    rendered.push_str(comment);
                }
                out.push(rendered);
            }
        }
    }
}

/// Single edit covering the changed middle of the text, None when equal
fn diff_edit(original: &str, updated: &str) -> Option<EditOp> {
    if original == updated {
        return None;
    }
    let mut prefix = original
        .bytes()
        .zip(updated.bytes())
        .take_while(|(a, b)| a == b)
        .count();
    while !original.is_char_boundary(prefix) || !updated.is_char_boundary(prefix) {
        prefix -= 1;
    }
    let max_suffix = original.len().min(updated.len()) - prefix;
    let mut suffix = original
        .bytes()
        .rev()
        .zip(updated.bytes().rev())
        .take_while(|(a, b)| a == b)
        .count()
        .min(max_suffix);
    while !original.is_char_boundary(original.len() - suffix)
        || !updated.is_char_boundary(updated.len() - suffix)
    {
        suffix -= 1;
    }
    Some(EditOp {
        start: prefix,
        end: original.len() - suffix,
        replacement: updated[prefix..updated.len() - suffix].to_string(),
    })
}

// ==================== Tests ====================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use ledgerlens_parser::LedgerParser;

    fn reorganized(text: &str) -> String {
        let doc = LedgerParser::parse(text);
        apply_edits(text, &organize(&doc))
    }

    #[test]
    fn test_apply_edits() {
        let edits = vec![
            EditOp { start: 4, end: 7, replacement: "XYZ".to_string() },
            EditOp { start: 0, end: 3, replacement: "ab".to_string() },
        ];
        assert_eq!(apply_edits("one two three", &edits), "ab XYZ three");
    }

    #[test]
    fn test_payee_completion_replaces_typed_prefix() {
        let text = "2024-01-01 Grocery Store\n Expenses:Food  $5.00\n Assets:Cash\n\n2024-01-02 Grocery Store\n Expenses:Food  $5.00\n Assets:Cash\n\n2024-01-04 Groc";
        let doc = LedgerParser::parse(text);
        let index = Index::new(&doc);
        let items = completions(&doc, &index, Position { line: 8, column: 15 });
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].text, "Grocery Store");
        let range = items[0].replace_range;
        assert_eq!(&text[range.start..range.end], "Groc");
        // range contract: covers the prefix, ends at the cursor
        let cursor = doc.offset_at(8, 15).unwrap();
        assert!(range.start < cursor);
        assert_eq!(range.end, cursor);
    }

    #[test]
    fn test_account_completion() {
        let text = "2024-01-01 Shop\n Expenses:Food  $5.00\n Assets:Cash\n\n2024-01-02 Shop\n Exp";
        let doc = LedgerParser::parse(text);
        let index = Index::new(&doc);
        let items = completions(&doc, &index, Position { line: 5, column: 4 });
        let labels: Vec<&str> = items.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(labels, vec!["Expenses", "Expenses:Food"]);
        let range = items[0].replace_range;
        assert_eq!(&text[range.start..range.end], "Exp");
    }

    #[test]
    fn test_completion_empty_prefix_returns_all() {
        let text = "2024-01-01 Grocery Store\n Expenses:Food  $5.00\n Assets:Cash\n\n2024-01-02 ";
        let doc = LedgerParser::parse(text);
        let index = Index::new(&doc);
        let items = completions(&doc, &index, Position { line: 4, column: 11 });
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].text, "Grocery Store");
        assert!(items[0].replace_range.is_empty());
    }

    #[test]
    fn test_completion_case_insensitive() {
        let text = "2024-01-01 Grocery Store\n Expenses:Food  $5.00\n Assets:Cash\n\n2024-01-02 groc";
        let doc = LedgerParser::parse(text);
        let index = Index::new(&doc);
        let items = completions(&doc, &index, Position { line: 4, column: 15 });
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].text, "Grocery Store");
    }

    #[test]
    fn test_completion_out_of_range_is_empty() {
        let doc = LedgerParser::parse("2024-01-01 Shop");
        let index = Index::new(&doc);
        assert!(completions(&doc, &index, Position { line: 9, column: 0 }).is_empty());
        assert!(completions(&doc, &index, Position { line: 0, column: 99 }).is_empty());
    }

    #[test]
    fn test_completion_in_amount_column_is_empty() {
        let text = "2024-01-01 Shop\n Expenses:Food  $5.00\n Assets:Cash\n\n2024-01-02 Shop\n Expenses:Food  $1";
        let doc = LedgerParser::parse(text);
        let index = Index::new(&doc);
        let items = completions(&doc, &index, Position { line: 5, column: 18 });
        assert!(items.is_empty());
    }

    #[test]
    fn test_quick_fix_rewrites_last_amount() {
        let text = "2024-01-01 Test\n Assets:A  $10.00\n Assets:B  $5.00";
        let doc = LedgerParser::parse(text);
        let diag = doc.diagnostics[0].clone();
        let edit = quick_fix(&doc, &diag).unwrap();
        assert_eq!(&text[edit.start..edit.end], "$5.00");
        assert_eq!(edit.replacement, "-$10.00");
        let fixed = apply_edits(text, &[edit]);
        let redone = LedgerParser::parse(&fixed);
        assert!(redone.diagnostics.is_empty());
        assert!(redone.transactions[0].is_balanced());
    }

    #[test]
    fn test_quick_fix_none_for_ambiguous_elision() {
        let doc = LedgerParser::parse("2024-01-01 Test\n Assets:A  $10.00\n Assets:B\n Assets:C");
        let diag = doc.diagnostics[0].clone();
        assert!(quick_fix(&doc, &diag).is_none());
    }

    #[test]
    fn test_quick_fix_none_for_other_kinds() {
        let doc = LedgerParser::parse("2024-13-01 Bad\n Assets:A  $10.00");
        let diag = doc.diagnostics[0].clone();
        assert!(quick_fix(&doc, &diag).is_none());
    }

    #[test]
    fn test_toggle_pending_to_cleared() {
        let text = "2024-01-01 Shop\n ! Expenses:Food  $5.00\n Assets:Cash";
        let doc = LedgerParser::parse(text);
        let edit = toggle_reconcile(
            &doc,
            PostingRef { transaction: 0, posting: 0 },
            ReconcileStatus::Cleared,
        )
        .unwrap()
        .unwrap();
        assert_eq!(&text[edit.start..edit.end], "!");
        assert_eq!(edit.replacement, "*");
        let toggled = apply_edits(text, &[edit]);
        assert_eq!(toggled, "2024-01-01 Shop\n * Expenses:Food  $5.00\n Assets:Cash");
    }

    #[test]
    fn test_toggle_insert_and_remove_marker() {
        let text = "2024-01-01 Shop\n Expenses:Food  $5.00\n Assets:Cash";
        let doc = LedgerParser::parse(text);
        let r = PostingRef { transaction: 0, posting: 0 };
        let edit = toggle_reconcile(&doc, r, ReconcileStatus::Pending).unwrap().unwrap();
        let marked = apply_edits(text, &[edit]);
        assert_eq!(marked, "2024-01-01 Shop\n ! Expenses:Food  $5.00\n Assets:Cash");

        let doc2 = LedgerParser::parse(&marked);
        let edit2 = toggle_reconcile(&doc2, r, ReconcileStatus::Uncleared).unwrap().unwrap();
        assert_eq!(apply_edits(&marked, &[edit2]), text);
    }

    #[test]
    fn test_toggle_noop_and_bad_ref() {
        let doc = LedgerParser::parse("2024-01-01 Shop\n * Expenses:Food  $5.00\n Assets:Cash");
        let r = PostingRef { transaction: 0, posting: 0 };
        assert!(toggle_reconcile(&doc, r, ReconcileStatus::Cleared).unwrap().is_none());
        let bad = PostingRef { transaction: 3, posting: 0 };
        assert!(toggle_reconcile(&doc, bad, ReconcileStatus::Cleared).is_err());
    }

    #[test]
    fn test_organize_sorts_by_date() {
        let text = "2024-01-05 Later\n Expenses:Food  $1.00\n Assets:Cash\n\n2024-01-01 Earlier\n Expenses:Food  $2.00\n Assets:Cash\n";
        let organized = reorganized(text);
        let doc = LedgerParser::parse(&organized);
        assert_eq!(doc.transactions[0].payee, "Earlier");
        assert_eq!(doc.transactions[1].payee, "Later");
    }

    #[test]
    fn test_organize_stable_for_equal_dates() {
        let text = "2024-01-05 Z\n Expenses:Food  $1.00\n Assets:Cash\n\n2024-01-01 First\n Expenses:Food  $2.00\n Assets:Cash\n\n2024-01-01 Second\n Expenses:Food  $3.00\n Assets:Cash\n";
        let doc = LedgerParser::parse(&reorganized(text));
        let payees: Vec<&str> = doc.transactions.iter().map(|t| t.payee.as_str()).collect();
        assert_eq!(payees, vec!["First", "Second", "Z"]);
    }

    #[test]
    fn test_organize_aligns_amounts() {
        let text = "2024-01-01 Shop\n Expenses:Food $5.00\n Assets:Checking:Main     -$5.00\n";
        let organized = reorganized(text);
        assert_eq!(
            organized,
            "2024-01-01 Shop\n Expenses:Food         $5.00\n Assets:Checking:Main  -$5.00\n"
        );
    }

    #[test]
    fn test_organize_idempotent() {
        let text = "2024-01-05 Later\n Expenses:Food $1.00\n Assets:Cash\n; note\n\n\n2024-01-01 Earlier\n Expenses:Food  $2.00 ; tagged\n Assets:Cash\n";
        let once = reorganized(text);
        let twice = reorganized(&once);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_organize_round_trip_preserves_semantics() {
        let text = "; journal header\n\n2024-01-05 Later\n ! Expenses:Food $1.00\n Assets:Cash\n\n2024-01-01 Earlier\n Expenses:Rent  $900.00\n Assets:Checking\n";
        let before = LedgerParser::parse(text);
        let organized = reorganized(text);
        let after = LedgerParser::parse(&organized);
        assert_eq!(before.transactions.len(), after.transactions.len());
        let mut b: Vec<_> = before
            .transactions
            .iter()
            .map(|t| (t.date, t.payee.clone(), t.postings.len()))
            .collect();
        let mut a: Vec<_> = after
            .transactions
            .iter()
            .map(|t| (t.date, t.payee.clone(), t.postings.len()))
            .collect();
        b.sort();
        a.sort();
        assert_eq!(a, b);
        assert_eq!(after.transactions[0].date, NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
    }

    #[test]
    fn test_organize_keeps_comments_with_block() {
        let text = "2024-01-05 Later\n Expenses:Food  $1.00\n Assets:Cash\n ; receipt attached\n\n2024-01-01 Earlier\n Expenses:Food  $2.00\n Assets:Cash\n";
        let organized = reorganized(text);
        let lines: Vec<&str> = organized.lines().collect();
        let later = lines.iter().position(|l| l.contains("Later")).unwrap();
        assert_eq!(lines[later + 3], " ; receipt attached");
    }

    #[test]
    fn test_organize_no_change_returns_no_edits() {
        let text = "2024-01-01 Shop\n Expenses:Food  $5.00\n Assets:Cash\n";
        let doc = LedgerParser::parse(text);
        assert!(organize(&doc).is_empty());
    }

    #[test]
    fn test_organize_loose_lines_are_pivots() {
        let text = "2024-01-05 B\n Expenses:Food  $1.00\n Assets:Cash\n\naccount Expenses:Food\n\n2024-01-01 A\n Expenses:Food  $2.00\n Assets:Cash\n";
        let organized = reorganized(text);
        let lines: Vec<&str> = organized.lines().collect();
        // the directive stays between the two transactions
        assert!(lines.iter().position(|l| l.contains("B")).unwrap()
            < lines.iter().position(|l| l.starts_with("account")).unwrap());
        assert!(lines.iter().position(|l| l.starts_with("account")).unwrap()
            < lines.iter().position(|l| l.ends_with("A")).unwrap());
    }
}
