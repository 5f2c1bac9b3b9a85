//! Ledgerlens main entry point

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use ledgerlens_config::Config;
use ledgerlens_core::{
    apply_edits, completions, organize_with, Index, OrganizeOptions, Position,
};
use ledgerlens_parser::{parse_date, LedgerParser, Severity};
use ledgerlens_utils::format_grouped;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "ledgerlens")]
#[command(author = "Ledgerlens Contributors")]
#[command(version = "0.1.0")]
#[command(about = "Editor support queries for plain-text ledger files", long_about = None)]
struct Args {
    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Parse a ledger file and report diagnostics
    Check {
        file: PathBuf,
        /// Emit diagnostics as JSON
        #[arg(long)]
        json: bool,
    },
    /// Re-sort transactions by date and align amount columns
    Organize {
        file: PathBuf,
        /// Write the result back instead of printing it
        #[arg(long)]
        write: bool,
    },
    /// Running balance for an account, including sub-accounts
    Balance {
        file: PathBuf,
        account: String,
        /// Cut-off date (defaults to today)
        #[arg(long)]
        as_of: Option<String>,
    },
    /// List unique payees in order of first appearance
    Payees { file: PathBuf },
    /// List unique accounts in order of first appearance
    Accounts { file: PathBuf },
    /// First line holding a transaction dated on or after DATE
    Jump { file: PathBuf, date: String },
    /// Completion candidates at a zero-based line/column position
    Complete {
        file: PathBuf,
        line: usize,
        column: usize,
    },
}

fn main() -> Result<()> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => Config::load(path.clone()).context("Failed to load configuration")?,
        None => Config::default(),
    };
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(&config.logging.level),
    )
    .init();

    match args.command {
        Command::Check { file, json } => check(&file, json),
        Command::Organize { file, write } => organize_file(&file, write, &config),
        Command::Balance { file, account, as_of } => balance(&file, &account, as_of.as_deref()),
        Command::Payees { file } => payees(&file),
        Command::Accounts { file } => accounts(&file),
        Command::Jump { file, date } => jump(&file, &date),
        Command::Complete { file, line, column } => complete(&file, line, column, &config),
    }
}

fn read(file: &PathBuf) -> Result<String> {
    std::fs::read_to_string(file).with_context(|| format!("Failed to read {}", file.display()))
}

fn check(file: &PathBuf, json: bool) -> Result<()> {
    let text = read(file)?;
    let doc = LedgerParser::parse(&text);
    log::info!(
        "parsed {} transactions, {} diagnostics",
        doc.transactions.len(),
        doc.diagnostics.len()
    );

    if json {
        println!("{}", serde_json::to_string_pretty(&doc.diagnostics)?);
    } else {
        for d in &doc.diagnostics {
            println!(
                "{}:{}: {} {}: {}",
                file.display(),
                d.line + 1,
                d.severity,
                d.kind,
                d.message
            );
        }
    }

    if doc.diagnostics.iter().any(|d| d.severity == Severity::Error) {
        std::process::exit(1);
    }
    Ok(())
}

fn organize_file(file: &PathBuf, write: bool, config: &Config) -> Result<()> {
    let text = read(file)?;
    let doc = LedgerParser::parse(&text);
    let options = OrganizeOptions {
        amount_gap: config.organize.amount_gap,
        min_amount_column: config.organize.min_amount_column,
    };
    let edits = organize_with(&doc, &options);
    if edits.is_empty() {
        log::info!("{} is already organized", file.display());
        return Ok(());
    }
    let updated = apply_edits(&text, &edits);
    if write {
        std::fs::write(file, &updated)
            .with_context(|| format!("Failed to write {}", file.display()))?;
        log::info!("organized {}", file.display());
    } else {
        print!("{}", updated);
    }
    Ok(())
}

fn balance(file: &PathBuf, account: &str, as_of: Option<&str>) -> Result<()> {
    let text = read(file)?;
    let doc = LedgerParser::parse(&text);
    let index = Index::new(&doc);
    let as_of = resolve_date(as_of)?;
    let total = index.running_balance(account, as_of);
    println!("{}  {}", format_grouped(&total.to_string()), account);
    Ok(())
}

fn payees(file: &PathBuf) -> Result<()> {
    let text = read(file)?;
    let doc = LedgerParser::parse(&text);
    let index = Index::new(&doc);
    for payee in index.payees_in_order() {
        println!("{}", payee);
    }
    Ok(())
}

fn accounts(file: &PathBuf) -> Result<()> {
    let text = read(file)?;
    let doc = LedgerParser::parse(&text);
    let index = Index::new(&doc);
    for account in index.accounts_in_order() {
        println!("{}", account);
    }
    Ok(())
}

fn jump(file: &PathBuf, date: &str) -> Result<()> {
    let text = read(file)?;
    let doc = LedgerParser::parse(&text);
    let index = Index::new(&doc);
    let date = parse_date(date).with_context(|| format!("Invalid date: {}", date))?;
    match index.nearest_line_on_or_after(date) {
        Some(line) => println!("{}", line + 1),
        None => println!("end"),
    }
    Ok(())
}

fn complete(file: &PathBuf, line: usize, column: usize, config: &Config) -> Result<()> {
    let text = read(file)?;
    let doc = LedgerParser::parse(&text);
    let index = Index::new(&doc);
    let mut items = completions(&doc, &index, Position { line, column });
    items.truncate(config.completion.max_results);
    println!("{}", serde_json::to_string_pretty(&items)?);
    Ok(())
}

fn resolve_date(as_of: Option<&str>) -> Result<NaiveDate> {
    match as_of {
        Some(text) => parse_date(text).with_context(|| format!("Invalid date: {}", text)),
        None => Ok(chrono::Local::now().date_naive()),
    }
}
