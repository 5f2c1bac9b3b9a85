//! Common value types for the ledger document model

use chrono::NaiveDate;
use once_cell::sync::OnceCell;
use regex::Regex;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::error::ParseError;

/// Byte span over the original text, for editor mapping
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpanInfo {
    pub start: usize,
    pub end: usize,
}

impl SpanInfo {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

/// Reconciliation status of a transaction or posting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReconcileStatus {
    /// No marker present
    Uncleared,
    /// Marked with `!`
    Pending,
    /// Marked with `*`
    Cleared,
}

impl ReconcileStatus {
    /// The marker character written in source, if any
    pub fn marker(&self) -> Option<char> {
        match self {
            ReconcileStatus::Uncleared => None,
            ReconcileStatus::Pending => Some('!'),
            ReconcileStatus::Cleared => Some('*'),
        }
    }

    /// Map a marker character back to a status
    pub fn from_marker(c: char) -> Option<Self> {
        match c {
            '!' => Some(ReconcileStatus::Pending),
            '*' => Some(ReconcileStatus::Cleared),
            _ => None,
        }
    }
}

impl Default for ReconcileStatus {
    fn default() -> Self {
        ReconcileStatus::Uncleared
    }
}

impl std::fmt::Display for ReconcileStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReconcileStatus::Uncleared => write!(f, "uncleared"),
            ReconcileStatus::Pending => write!(f, "pending"),
            ReconcileStatus::Cleared => write!(f, "cleared"),
        }
    }
}

impl FromStr for ReconcileStatus {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "uncleared" => Ok(ReconcileStatus::Uncleared),
            "pending" => Ok(ReconcileStatus::Pending),
            "cleared" => Ok(ReconcileStatus::Cleared),
            _ => Err(format!("Invalid reconcile status: {}", s)),
        }
    }
}

/// Where a commodity symbol is written relative to the number
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SymbolPosition {
    /// Prefix symbol, e.g. `$50.00`
    Before,
    /// Suffix code, e.g. `50.00 USD`
    After,
}

/// Commodity attached to an amount
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Commodity {
    pub symbol: String,
    pub position: SymbolPosition,
}

/// Signed decimal amount with an optional commodity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Amount {
    pub value: Decimal,
    pub commodity: Option<Commodity>,
}

static AMOUNT_PATTERN: OnceCell<Regex> = OnceCell::new();

fn amount_regex() -> &'static Regex {
    AMOUNT_PATTERN.get_or_init(|| {
        Regex::new(
            r"^(?P<sign>[-+])?(?P<sym>[^\s\d.,+-]{1,3})?(?P<sign2>[-+])?(?P<num>\d[\d,]*(?:\.\d+)?)(?:\s+(?P<code>[A-Za-z][A-Za-z0-9]*))?$",
        )
        .unwrap()
    })
}

impl Amount {
    pub fn new(value: Decimal, commodity: Option<Commodity>) -> Self {
        Self { value, commodity }
    }

    /// Parse an amount in source style
    ///
    /// Accepts prefix-symbol forms (`$50.00`, `-$50.00`, `$-50.00`) and
    /// suffix-code forms (`50.00 USD`, `-1,234.56 EUR`). Commas are
    /// permitted as thousands separators.
    pub fn parse(text: &str) -> Result<Self, ParseError> {
        let text = text.trim();
        let caps = amount_regex()
            .captures(text)
            .ok_or_else(|| ParseError::MalformedAmount { text: text.to_string() })?;

        let negative = caps.name("sign").map(|m| m.as_str() == "-").unwrap_or(false)
            ^ caps.name("sign2").map(|m| m.as_str() == "-").unwrap_or(false);
        let num = caps.name("num").unwrap().as_str().replace(',', "");
        let mut value: Decimal = num
            .parse()
            .map_err(|_| ParseError::MalformedAmount { text: text.to_string() })?;
        if negative {
            value = -value;
        }

        let commodity = if let Some(sym) = caps.name("sym") {
            Some(Commodity {
                symbol: sym.as_str().to_string(),
                position: SymbolPosition::Before,
            })
        } else {
            caps.name("code").map(|code| Commodity {
                symbol: code.as_str().to_string(),
                position: SymbolPosition::After,
            })
        };

        Ok(Amount { value, commodity })
    }

    /// Same amount with the opposite sign
    pub fn negated(&self) -> Amount {
        Amount {
            value: -self.value,
            commodity: self.commodity.clone(),
        }
    }

    /// Same commodity, different value
    pub fn with_value(&self, value: Decimal) -> Amount {
        Amount {
            value,
            commodity: self.commodity.clone(),
        }
    }
}

impl std::fmt::Display for Amount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.commodity {
            Some(c) if c.position == SymbolPosition::Before => {
                if self.value.is_sign_negative() {
                    write!(f, "-{}{}", c.symbol, -self.value)
                } else {
                    write!(f, "{}{}", c.symbol, self.value)
                }
            }
            Some(c) => write!(f, "{} {}", self.value, c.symbol),
            None => write!(f, "{}", self.value),
        }
    }
}

impl FromStr for Amount {
    type Err = ParseError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Amount::parse(s)
    }
}

/// Quick check that a posting tail starts like an amount
///
/// Used by the account/amount split: the amount column begins at the last
/// hard gap whose right-hand side looks number-like.
pub fn looks_like_amount(text: &str) -> bool {
    static LEAD: OnceCell<Regex> = OnceCell::new();
    let re = LEAD.get_or_init(|| Regex::new(r"^[-+]?[^\s\d.,+-]{0,3}[-+]?\d").unwrap());
    re.is_match(text)
}

/// Parse a calendar date in either `YYYY-MM-DD` or `YYYY/MM/DD` form
///
/// Month and day ranges are validated; nothing is clamped.
pub fn parse_date(text: &str) -> Result<NaiveDate, ParseError> {
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(text, "%Y/%m/%d"))
        .map_err(|_| ParseError::MalformedDate { text: text.to_string() })
}

// ==================== Tests ====================
