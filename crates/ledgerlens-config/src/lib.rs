//! Configuration management for ledgerlens
//!
//! This module handles loading, validation, and management of
//! ledgerlens configuration from YAML files.

pub mod error;

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub use error::ConfigError;

// ==================== Configuration Types ====================

/// Currency and number formatting
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrencyConfig {
    /// Default commodity symbol for amounts that carry none
    #[serde(default = "default_commodity")]
    pub default_commodity: String,
    /// Commodity symbol position ("before" or "after")
    #[serde(default)]
    pub symbol_position: SymbolPosition,
    /// Number of decimal places
    #[serde(default = "default_decimal_places")]
    pub decimal_places: u32,
}

impl Default for CurrencyConfig {
    fn default() -> Self {
        Self {
            default_commodity: "$".to_string(),
            symbol_position: SymbolPosition::Before,
            decimal_places: 2,
        }
    }
}

fn default_commodity() -> String {
    "$".to_string()
}

fn default_decimal_places() -> u32 {
    2
}

/// Commodity symbol position
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SymbolPosition {
    Before,
    After,
}

impl Default for SymbolPosition {
    fn default() -> Self {
        SymbolPosition::Before
    }
}

impl std::str::FromStr for SymbolPosition {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "before" => Ok(SymbolPosition::Before),
            "after" => Ok(SymbolPosition::After),
            _ => Err(format!("Invalid symbol position: {}", s)),
        }
    }
}

impl std::fmt::Display for SymbolPosition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SymbolPosition::Before => write!(f, "before"),
            SymbolPosition::After => write!(f, "after"),
        }
    }
}

/// Organize pass settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrganizeConfig {
    /// Spaces between the account column and the amount column
    #[serde(default = "default_amount_gap")]
    pub amount_gap: usize,
    /// Floor for the amount column, in display columns from line start
    #[serde(default)]
    pub min_amount_column: usize,
}

impl Default for OrganizeConfig {
    fn default() -> Self {
        Self {
            amount_gap: 2,
            min_amount_column: 0,
        }
    }
}

fn default_amount_gap() -> usize {
    2
}

/// Completion settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionConfig {
    /// Maximum number of candidates returned
    #[serde(default = "default_max_results")]
    pub max_results: usize,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self { max_results: 50 }
    }
}

fn default_max_results() -> usize {
    50
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level: debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Currency settings
    #[serde(default)]
    pub currency: CurrencyConfig,
    /// Organize pass settings
    #[serde(default)]
    pub organize: OrganizeConfig,
    /// Completion settings
    #[serde(default)]
    pub completion: CompletionConfig,
    /// Logging settings
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a YAML file
    pub fn load(path: PathBuf) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(&path).map_err(|_| ConfigError::FileNotFound {
            path: path.to_string_lossy().to_string(),
        })?;

        let config: Config =
            serde_yaml::from_str(&content).map_err(|_| ConfigError::InvalidYaml)?;

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.currency.decimal_places > 10 {
            return Err(ConfigError::InvalidValue {
                field: "currency.decimal_places".to_string(),
                reason: "Decimal places must be between 0 and 10".to_string(),
            });
        }

        if self.organize.amount_gap == 0 {
            return Err(ConfigError::InvalidValue {
                field: "organize.amount_gap".to_string(),
                reason: "Amount gap must be at least 1".to_string(),
            });
        }

        if self.completion.max_results == 0 {
            return Err(ConfigError::InvalidValue {
                field: "completion.max_results".to_string(),
                reason: "Max results must be greater than 0".to_string(),
            });
        }

        Ok(())
    }
}

// ==================== Tests ====================
