//! Ledger document parser
//!
//! Builds a [`Document`] from raw text. The parse is forgiving: malformed
//! lines degrade into diagnostics on that line and the rest of the
//! document stays fully usable.

use once_cell::sync::OnceCell;
use regex::Regex;

use crate::document::{
    BalanceState, Diagnostic, DiagnosticKind, Document, Posting, Transaction,
};
use crate::tokenizer::{tokenize, LineKind};
use crate::types::{
    looks_like_amount, parse_date, Amount, Commodity, ReconcileStatus, SpanInfo,
};
use rust_decimal::Decimal;

/// Balance comparison epsilon, absorbs decimal rounding in source files
fn epsilon() -> Decimal {
    Decimal::new(1, 9)
}

static HEADER_PATTERN: OnceCell<Regex> = OnceCell::new();
static HARD_GAP_PATTERN: OnceCell<Regex> = OnceCell::new();

fn header_regex() -> &'static Regex {
    HEADER_PATTERN.get_or_init(|| {
        Regex::new(
            r"^(?P<date>\d{4}[/-]\d{2}[/-]\d{2})(?:=(?P<edate>\d{4}[/-]\d{2}[/-]\d{2}))?(?P<rest>.*)$",
        )
        .unwrap()
    })
}

fn hard_gap_regex() -> &'static Regex {
    HARD_GAP_PATTERN.get_or_init(|| Regex::new(r"(?: {2,}|\t)[ \t]*").unwrap())
}

/// Parser state while walking the token stream
enum BodyState {
    /// Not inside a transaction body
    Idle,
    /// Collecting postings for an open transaction
    Open(Transaction),
    /// Consuming the body of a transaction whose date failed to parse
    Skipping,
}

/// Line-based parser for ledger files
pub struct LedgerParser;

impl LedgerParser {
    /// Parse raw text into a document
    ///
    /// The sole entry point. Never fails; problems surface as diagnostics
    /// on the returned document.
    pub fn parse(text: &str) -> Document {
        let mut line_spans = Vec::new();
        let mut offset = 0usize;
        for raw in text.split_inclusive('\n') {
            let mut content = raw;
            if let Some(s) = content.strip_suffix('\n') {
                content = s;
            }
            if let Some(s) = content.strip_suffix('\r') {
                content = s;
            }
            line_spans.push(SpanInfo::new(offset, offset + content.len()));
            offset += raw.len();
        }

        let mut doc = Document::new(text.to_string(), line_spans);
        let mut transactions: Vec<Transaction> = Vec::new();
        let mut diagnostics: Vec<Diagnostic> = Vec::new();
        let mut state = BodyState::Idle;

        for token in tokenize(text) {
            let line_offset = doc.line_offset(token.line).unwrap_or(0);
            match token.kind {
                LineKind::TransactionHeader => {
                    Self::close(&mut state, &mut transactions, &mut diagnostics);
                    state = Self::open_transaction(token.text, token.line, &mut diagnostics);
                }
                LineKind::Blank | LineKind::Directive => {
                    Self::close(&mut state, &mut transactions, &mut diagnostics);
                }
                LineKind::Posting => {
                    if let BodyState::Open(txn) = &mut state {
                        Self::push_posting(txn, token.text, token.line, line_offset, &mut diagnostics);
                        txn.last_line = token.line;
                    }
                }
                LineKind::Comment => {
                    if let BodyState::Open(txn) = &mut state {
                        // a cleared posting marker tokenizes as a comment;
                        // inside an open body it is a posting
                        if token.indent > 0 && Self::is_marker_posting(token.text) {
                            Self::push_posting(txn, token.text, token.line, line_offset, &mut diagnostics);
                        }
                        txn.last_line = token.line;
                    }
                }
            }
        }
        Self::close(&mut state, &mut transactions, &mut diagnostics);

        doc.transactions = transactions;
        doc.diagnostics = diagnostics;
        doc
    }

    /// Indented line that starts with a status marker and has content after it
    fn is_marker_posting(text: &str) -> bool {
        let body = text.trim_start();
        let mut chars = body.chars();
        match chars.next() {
            Some('*') | Some('!') => {}
            _ => return false,
        }
        match chars.next() {
            Some(c) if c.is_whitespace() => {}
            _ => return false,
        }
        !chars.as_str().trim().is_empty()
    }

    fn open_transaction(
        text: &str,
        line: usize,
        diagnostics: &mut Vec<Diagnostic>,
    ) -> BodyState {
        let caps = match header_regex().captures(text) {
            Some(caps) => caps,
            // unreachable in practice: the tokenizer only classifies a
            // header after the date pattern matched
            None => return BodyState::Skipping,
        };

        let date_text = caps.name("date").unwrap().as_str();
        let date = match parse_date(date_text) {
            Ok(date) => date,
            Err(e) => {
                diagnostics.push(Diagnostic::error(
                    line,
                    DiagnosticKind::MalformedDate,
                    e.to_string(),
                ));
                return BodyState::Skipping;
            }
        };

        let effective_date = match caps.name("edate") {
            Some(m) => match parse_date(m.as_str()) {
                Ok(d) => Some(d),
                Err(e) => {
                    diagnostics.push(Diagnostic::error(
                        line,
                        DiagnosticKind::MalformedDate,
                        e.to_string(),
                    ));
                    None
                }
            },
            None => None,
        };

        let rest = caps.name("rest").map(|m| m.as_str()).unwrap_or("").trim_start();
        let (status, payee) = match rest.chars().next().and_then(ReconcileStatus::from_marker) {
            Some(status) if rest.chars().nth(1).map_or(true, |c| c.is_whitespace()) => {
                (status, rest[1..].trim())
            }
            _ => (ReconcileStatus::Uncleared, rest.trim_end()),
        };

        BodyState::Open(Transaction {
            date,
            effective_date,
            status,
            payee: payee.to_string(),
            postings: Vec::new(),
            first_line: line,
            last_line: line,
            has_malformed_amount: false,
            balance: BalanceState::Unchecked,
        })
    }

    fn push_posting(
        txn: &mut Transaction,
        text: &str,
        line: usize,
        line_offset: usize,
        diagnostics: &mut Vec<Diagnostic>,
    ) {
        let indent_bytes = text.len() - text.trim_start().len();
        let mut cursor = indent_bytes;
        let after_indent = &text[cursor..];

        // optional status marker, one char plus separating whitespace
        let mut status = ReconcileStatus::Uncleared;
        let mut status_span = None;
        if let Some(s) = after_indent.chars().next().and_then(ReconcileStatus::from_marker) {
            if after_indent.chars().nth(1).map_or(false, |c| c.is_whitespace()) {
                status = s;
                status_span = Some(SpanInfo::new(line_offset + cursor, line_offset + cursor + 1));
                let rest = &after_indent[1..];
                cursor += 1 + (rest.len() - rest.trim_start().len());
            }
        }

        // trailing comment
        let body_end = text[cursor..].find(';').map(|i| cursor + i).unwrap_or(text.len());
        let comment = if body_end < text.len() {
            Some(text[body_end + 1..].trim().to_string())
        } else {
            None
        };
        let body = &text[cursor..body_end];

        // the amount begins at the last hard gap (2+ spaces or a tab)
        // whose right side looks number-like; with no such gap, fall back
        // to the last single space, so loosely typed postings still split
        let mut split = None;
        for m in hard_gap_regex().find_iter(body) {
            let rhs = body[m.end()..].trim_end();
            if !rhs.is_empty() && looks_like_amount(rhs) {
                split = Some((m.start(), m.end()));
            }
        }
        if split.is_none() {
            for (i, _) in body.match_indices(' ') {
                let rhs = body[i + 1..].trim_end();
                if !rhs.is_empty() && looks_like_amount(rhs) {
                    split = Some((i, i + 1));
                }
            }
        }

        let (account, amount, amount_span) = match split {
            Some((sep_start, sep_end)) => {
                let account = body[..sep_start].trim_end();
                let amount_text = body[sep_end..].trim_end();
                match Amount::parse(amount_text) {
                    Ok(amount) => {
                        let start = line_offset + cursor + sep_end;
                        let span = SpanInfo::new(start, start + amount_text.len());
                        (account, Some(amount), Some(span))
                    }
                    Err(e) => {
                        diagnostics.push(Diagnostic::error(
                            line,
                            DiagnosticKind::MalformedAmount,
                            e.to_string(),
                        ));
                        txn.has_malformed_amount = true;
                        (account, None, None)
                    }
                }
            }
            None => (body.trim_end(), None, None),
        };

        let account_span = SpanInfo::new(line_offset + cursor, line_offset + cursor + account.len());
        txn.postings.push(Posting {
            account: account.to_string(),
            amount,
            inferred_amount: None,
            status,
            line,
            comment,
            account_span,
            amount_span,
            status_span,
        });
    }

    fn close(
        state: &mut BodyState,
        transactions: &mut Vec<Transaction>,
        diagnostics: &mut Vec<Diagnostic>,
    ) {
        if let BodyState::Open(mut txn) = std::mem::replace(state, BodyState::Idle) {
            Self::validate_balance(&mut txn, diagnostics);
            transactions.push(txn);
        }
    }

    /// Balance validation for a closed transaction
    ///
    /// Single-commodity sums only; more than one distinct commodity skips
    /// the check with an informational note instead of guessing at a
    /// conversion.
    fn validate_balance(txn: &mut Transaction, diagnostics: &mut Vec<Diagnostic>) {
        if txn.has_malformed_amount {
            txn.balance = BalanceState::Unchecked;
            return;
        }

        let explicit: Vec<&Amount> = txn.postings.iter().filter_map(|p| p.amount.as_ref()).collect();
        let mut symbols: Vec<&str> = explicit
            .iter()
            .filter_map(|a| a.commodity.as_ref().map(|c| c.symbol.as_str()))
            .collect();
        symbols.sort_unstable();
        symbols.dedup();
        if symbols.len() > 1 {
            diagnostics.push(Diagnostic::info(
                txn.first_line,
                DiagnosticKind::MixedCommodityUnchecked,
                "Multiple commodities in transaction; balance not checked".to_string(),
            ));
            txn.balance = BalanceState::Unchecked;
            return;
        }

        let style: Option<Commodity> = explicit.first().and_then(|a| a.commodity.clone());
        let sum: Decimal = explicit.iter().map(|a| a.value).sum();
        let elided: Vec<usize> = txn
            .postings
            .iter()
            .enumerate()
            .filter(|(_, p)| p.amount.is_none())
            .map(|(i, _)| i)
            .collect();

        match elided.len() {
            0 => {
                if sum.abs() < epsilon() {
                    txn.balance = BalanceState::Balanced;
                } else {
                    let residual = Amount::new(sum, style);
                    diagnostics.push(Diagnostic::error(
                        txn.first_line,
                        DiagnosticKind::UnbalancedTransaction,
                        format!("Transaction does not balance: residual {}", residual),
                    ));
                    txn.balance = BalanceState::Unbalanced { residual };
                }
            }
            1 => {
                txn.postings[elided[0]].inferred_amount = Some(Amount::new(-sum, style));
                txn.balance = BalanceState::Balanced;
            }
            _ => {
                diagnostics.push(Diagnostic::error(
                    txn.first_line,
                    DiagnosticKind::AmbiguousElision,
                    "More than one posting without an amount".to_string(),
                ));
                txn.balance = BalanceState::Unbalanced {
                    residual: Amount::new(sum, style),
                };
            }
        }
    }
}

// ==================== Tests ====================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_balanced_two_postings() {
        let doc = LedgerParser::parse(
            "2024-01-01 Grocery Store\n Expenses:Food $50.00\n Assets:Checking -$50.00",
        );
        assert_eq!(doc.transactions.len(), 1);
        assert!(doc.diagnostics.is_empty());
        let txn = &doc.transactions[0];
        assert_eq!(txn.date, date(2024, 1, 1));
        assert_eq!(txn.payee, "Grocery Store");
        assert_eq!(txn.postings.len(), 2);
        assert_eq!(txn.postings[0].account, "Expenses:Food");
        assert_eq!(txn.postings[1].account, "Assets:Checking");
        assert!(txn.is_balanced());
    }

    #[test]
    fn test_unbalanced_residual() {
        let doc = LedgerParser::parse("2024-01-01 Test\n Assets:A $10.00\n Assets:B $5.00");
        assert_eq!(doc.transactions.len(), 1);
        assert_eq!(doc.diagnostics.len(), 1);
        let d = &doc.diagnostics[0];
        assert_eq!(d.kind, DiagnosticKind::UnbalancedTransaction);
        assert!(d.message.contains("$15.00"), "message was: {}", d.message);
        assert!(!doc.transactions[0].is_balanced());
    }

    #[test]
    fn test_elided_amount_inferred() {
        let doc = LedgerParser::parse("2024-01-01 Shop\n Expenses:Food  $42.50\n Assets:Cash");
        let txn = &doc.transactions[0];
        assert!(txn.is_balanced());
        assert!(txn.postings[1].amount.is_none());
        let inferred = txn.postings[1].inferred_amount.as_ref().unwrap();
        assert_eq!(inferred.to_string(), "-$42.50");
    }

    #[test]
    fn test_ambiguous_elision() {
        let doc = LedgerParser::parse("2024-01-01 Shop\n Expenses:Food  $5.00\n Assets:A\n Assets:B");
        assert_eq!(doc.diagnostics.len(), 1);
        assert_eq!(doc.diagnostics[0].kind, DiagnosticKind::AmbiguousElision);
        let txn = &doc.transactions[0];
        assert!(!txn.is_balanced());
        assert!(txn.postings[1].inferred_amount.is_none());
        assert!(txn.postings[2].inferred_amount.is_none());
    }

    #[test]
    fn test_mixed_commodity_note() {
        let doc = LedgerParser::parse("2024-01-01 Fx\n Assets:EUR  100.00 EUR\n Assets:USD  -110.00 USD");
        assert_eq!(doc.diagnostics.len(), 1);
        let d = &doc.diagnostics[0];
        assert_eq!(d.kind, DiagnosticKind::MixedCommodityUnchecked);
        assert_eq!(d.severity, crate::document::Severity::Info);
        assert_eq!(doc.transactions[0].balance, BalanceState::Unchecked);
    }

    #[test]
    fn test_malformed_date_skips_body() {
        let doc = LedgerParser::parse(
            "2024-13-01 Bad\n Expenses:Food  $5.00\n\n2024-01-02 Good\n Expenses:Food  $5.00\n Assets:Cash",
        );
        assert_eq!(doc.transactions.len(), 1);
        assert_eq!(doc.transactions[0].payee, "Good");
        assert_eq!(doc.diagnostics.len(), 1);
        assert_eq!(doc.diagnostics[0].kind, DiagnosticKind::MalformedDate);
        assert_eq!(doc.diagnostics[0].line, 0);
    }

    #[test]
    fn test_malformed_amount_keeps_parsing() {
        let doc = LedgerParser::parse(
            "2024-01-01 Shop\n Expenses:Food  $5..0\n Assets:Cash  -$5.00",
        );
        let txn = &doc.transactions[0];
        assert_eq!(txn.postings.len(), 2);
        assert!(txn.has_malformed_amount);
        assert_eq!(txn.balance, BalanceState::Unchecked);
        assert_eq!(doc.diagnostics.len(), 1);
        assert_eq!(doc.diagnostics[0].kind, DiagnosticKind::MalformedAmount);
        assert_eq!(doc.diagnostics[0].line, 1);
    }

    #[test]
    fn test_secondary_date() {
        let doc = LedgerParser::parse("2024-01-01=2024-01-05 Rent\n Expenses:Rent  $900.00\n Assets:Checking");
        let txn = &doc.transactions[0];
        assert_eq!(txn.date, date(2024, 1, 1));
        assert_eq!(txn.effective_date, Some(date(2024, 1, 5)));
    }

    #[test]
    fn test_secondary_date_malformed_keeps_transaction() {
        let doc = LedgerParser::parse("2024-01-01=2024-13-05 Rent\n Expenses:Rent  $900.00\n Assets:Checking");
        assert_eq!(doc.transactions.len(), 1);
        assert_eq!(doc.transactions[0].effective_date, None);
        assert_eq!(doc.diagnostics.len(), 1);
        assert_eq!(doc.diagnostics[0].kind, DiagnosticKind::MalformedDate);
    }

    #[test]
    fn test_posting_status_markers() {
        let doc = LedgerParser::parse(
            "2024-01-01 Shop\n * Expenses:Food  $5.00\n ! Assets:Credit  -$3.00\n Assets:Cash",
        );
        let txn = &doc.transactions[0];
        assert_eq!(txn.postings.len(), 3);
        assert_eq!(txn.postings[0].status, ReconcileStatus::Cleared);
        assert_eq!(txn.postings[1].status, ReconcileStatus::Pending);
        assert_eq!(txn.postings[2].status, ReconcileStatus::Uncleared);
        assert_eq!(txn.postings[0].account, "Expenses:Food");
    }

    #[test]
    fn test_posting_comment() {
        let doc = LedgerParser::parse("2024-01-01 Shop\n Expenses:Food  $5.00 ; lunch\n Assets:Cash");
        let p = &doc.transactions[0].postings[0];
        assert_eq!(p.comment.as_deref(), Some("lunch"));
        assert_eq!(p.amount.as_ref().unwrap().to_string(), "$5.00");
    }

    #[test]
    fn test_comment_lines_attach_to_block() {
        let doc = LedgerParser::parse(
            "2024-01-01 Shop\n Expenses:Food  $5.00\n ; receipt filed\n Assets:Cash\n; trailing note\n\n2024-01-02 Other\n Expenses:Misc  $1.00\n Assets:Cash",
        );
        assert_eq!(doc.transactions.len(), 2);
        let first = &doc.transactions[0];
        assert_eq!(first.postings.len(), 2);
        assert_eq!(first.last_line, 4);
    }

    #[test]
    fn test_directive_ends_body() {
        let doc = LedgerParser::parse(
            "2024-01-01 Shop\n Expenses:Food  $5.00\n Assets:Cash\naccount Expenses:Food\n",
        );
        assert_eq!(doc.transactions.len(), 1);
        assert_eq!(doc.transactions[0].last_line, 2);
    }

    #[test]
    fn test_orphan_posting_ignored() {
        let doc = LedgerParser::parse(" Expenses:Food  $5.00\n");
        assert!(doc.transactions.is_empty());
        assert!(doc.diagnostics.is_empty());
    }

    #[test]
    fn test_empty_payee() {
        let doc = LedgerParser::parse("2024-01-01\n Expenses:Food  $5.00\n Assets:Cash");
        assert_eq!(doc.transactions[0].payee, "");
        assert!(doc.transactions[0].is_balanced());
    }

    #[test]
    fn test_account_with_inner_space() {
        let doc = LedgerParser::parse("2024-01-01 Bank\n Assets:My Bank  $5.00\n Assets:Cash");
        assert_eq!(doc.transactions[0].postings[0].account, "Assets:My Bank");
    }

    #[test]
    fn test_spans_are_byte_precise() {
        let text = "2024-01-01 Shop\n ! Expenses:Food  $5.00\n Assets:Cash";
        let doc = LedgerParser::parse(text);
        let p = &doc.transactions[0].postings[0];
        let s = p.status_span.unwrap();
        assert_eq!(&text[s.start..s.end], "!");
        assert_eq!(&text[p.account_span.start..p.account_span.end], "Expenses:Food");
        let a = p.amount_span.unwrap();
        assert_eq!(&text[a.start..a.end], "$5.00");
    }

    #[test]
    fn test_header_only_transaction() {
        let doc = LedgerParser::parse("2024-01-04 Groc");
        assert_eq!(doc.transactions.len(), 1);
        assert_eq!(doc.transactions[0].payee, "Groc");
        assert!(doc.transactions[0].postings.is_empty());
    }

    #[test]
    fn test_slash_date_format() {
        let doc = LedgerParser::parse("2024/01/31 Shop\n Expenses:Food  $5.00\n Assets:Cash");
        assert_eq!(doc.transactions[0].date, date(2024, 1, 31));
    }
}
