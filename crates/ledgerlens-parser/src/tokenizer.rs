//! Line tokenizer for ledger text
//!
//! Splits raw text into one classified token per line. Classification is a
//! best-effort guess: ambiguity (a `*` that is a cleared marker rather than
//! a comment) is resolved by the parser, never here. This pass cannot fail.

use ledgerlens_utils::leading_ws_width;
use once_cell::sync::OnceCell;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Classification guess for one line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LineKind {
    Blank,
    /// Starts with one of `; # % | *` after optional whitespace
    Comment,
    /// Unindented line beginning with a date pattern
    TransactionHeader,
    /// Indented non-blank line
    Posting,
    /// Unindented non-blank line that is not a header; kept shallow
    Directive,
}

/// One classified input line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineToken<'a> {
    /// Zero-based line index
    pub line: usize,
    /// Leading-whitespace width in chars
    pub indent: usize,
    pub kind: LineKind,
    /// Line content without its terminator
    pub text: &'a str,
}

static COMMENT_PATTERN: OnceCell<Regex> = OnceCell::new();
static DATE_PATTERN: OnceCell<Regex> = OnceCell::new();

fn comment_regex() -> &'static Regex {
    COMMENT_PATTERN.get_or_init(|| Regex::new(r"^\s*[;#%|*]").unwrap())
}

/// Leading date pattern shared with the header parser
pub fn date_regex() -> &'static Regex {
    DATE_PATTERN.get_or_init(|| Regex::new(r"^\d{4}[/-]\d{2}[/-]\d{2}").unwrap())
}

/// Classify a single line
pub fn classify(text: &str) -> LineKind {
    if text.trim().is_empty() {
        return LineKind::Blank;
    }
    if comment_regex().is_match(text) {
        return LineKind::Comment;
    }
    let indent = leading_ws_width(text);
    if indent == 0 && date_regex().is_match(text) {
        return LineKind::TransactionHeader;
    }
    if indent > 0 {
        return LineKind::Posting;
    }
    LineKind::Directive
}

/// Tokenize text into a lazy, restartable sequence of line tokens
pub fn tokenize(text: &str) -> impl Iterator<Item = LineToken<'_>> {
    text.lines().enumerate().map(|(line, text)| LineToken {
        line,
        indent: leading_ws_width(text),
        kind: classify(text),
        text,
    })
}

// ==================== Tests ====================
