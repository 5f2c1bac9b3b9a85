//! Semantic index and query façade over a parsed ledger document
//!
//! Everything here is a pure function of one [`Document`] snapshot: the
//! index holds string slices and positions into the document, never a
//! second copy of the text, and is rebuilt whenever the document is.

pub mod cache;
pub mod edits;
pub mod error;

pub use cache::DocumentCache;
pub use edits::{
    apply_edits, completions, organize, organize_with, quick_fix, toggle_reconcile,
    Completion, EditOp, OrganizeOptions, Position,
};
pub use error::{CoreError, CoreResult, ErrorCode, ErrorSeverity};

use chrono::NaiveDate;
use ledgerlens_parser::Document;
use rust_decimal::Decimal;
use std::collections::HashSet;

/// Derived read-only views over a parsed document
///
/// Construction is O(postings); queries are cheap enough to call on every
/// keystroke-adjacent event.
pub struct Index<'a> {
    document: &'a Document,
    payees: Vec<&'a str>,
    accounts: Vec<&'a str>,
    date_sorted: bool,
}

impl<'a> Index<'a> {
    /// Build the index for a document snapshot
    pub fn new(document: &'a Document) -> Self {
        let mut payees: Vec<&str> = Vec::new();
        let mut seen_payees: HashSet<&str> = HashSet::new();
        let mut accounts: Vec<&str> = Vec::new();
        let mut seen_accounts: HashSet<&str> = HashSet::new();

        for txn in &document.transactions {
            let payee = txn.payee.as_str();
            if !payee.is_empty() && seen_payees.insert(payee) {
                payees.push(payee);
            }
            for posting in &txn.postings {
                let path = posting.account.as_str();
                if path.is_empty() {
                    continue;
                }
                // ancestors first, at segment boundaries, then the full path
                for (i, _) in path.match_indices(':') {
                    let prefix = &path[..i];
                    if seen_accounts.insert(prefix) {
                        accounts.push(prefix);
                    }
                }
                if seen_accounts.insert(path) {
                    accounts.push(path);
                }
            }
        }

        let date_sorted = document.is_date_sorted();
        log::debug!(
            "indexed {} payees, {} accounts, date_sorted={}",
            payees.len(),
            accounts.len(),
            date_sorted
        );

        Self {
            document,
            payees,
            accounts,
            date_sorted,
        }
    }

    /// The document this index was built from
    pub fn document(&self) -> &'a Document {
        self.document
    }

    /// Unique payees in order of first appearance
    pub fn payees_in_order(&self) -> &[&'a str] {
        &self.payees
    }

    /// Unique account paths in order of first appearance, ancestors included
    pub fn accounts_in_order(&self) -> &[&'a str] {
        &self.accounts
    }

    /// Whether transactions appear in non-decreasing date order
    pub fn is_date_sorted(&self) -> bool {
        self.date_sorted
    }

    /// Sum of effective amounts at or under an account path, dated on or
    /// before `as_of`, in document order
    pub fn running_balance(&self, account: &str, as_of: NaiveDate) -> Decimal {
        let mut total = Decimal::ZERO;
        for txn in &self.document.transactions {
            if txn.date > as_of {
                continue;
            }
            for posting in &txn.postings {
                if !account_matches(&posting.account, account) {
                    continue;
                }
                if let Some(amount) = posting.effective_amount() {
                    total += amount.value;
                }
            }
        }
        total
    }

    /// Line index of the first transaction dated on or after the given date
    ///
    /// Binary search over a date-sorted document; a linear scan returning
    /// the first textual occurrence otherwise. None means end of document.
    pub fn nearest_line_on_or_after(&self, date: NaiveDate) -> Option<usize> {
        let txns = &self.document.transactions;
        if self.date_sorted {
            let idx = txns.partition_point(|t| t.date < date);
            txns.get(idx).map(|t| t.first_line)
        } else {
            txns.iter().find(|t| t.date >= date).map(|t| t.first_line)
        }
    }
}

/// Exact path match or segment-boundary prefix match
///
/// "Expenses:Food" is under "Expenses" but "ExpensesX" is not.
pub fn account_matches(path: &str, query: &str) -> bool {
    path == query
        || (path.len() > query.len()
            && path.starts_with(query)
            && path.as_bytes()[query.len()] == b':')
}

// ==================== Tests ====================
