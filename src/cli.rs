//! Command-line interface parsing for fxconvert
//!
//! This module handles parsing of CLI arguments using clap. Without a
//! subcommand the interactive converter starts, optionally pre-filled with
//! `--from`, `--to` and `--amount`; the subcommands run a single operation
//! and print the outcome.

use clap::{Parser, Subcommand};
use thiserror::Error;

use crate::config::Settings;
use crate::data::normalize_code;
use crate::data::provider::MAX_HISTORY_DAYS;

/// Currency pre-selected as source when none is given
pub const DEFAULT_FROM: &str = "USD";

/// Currency pre-selected as target when none is given
pub const DEFAULT_TO: &str = "EUR";

/// Error types for CLI argument parsing
#[derive(Debug, Error, PartialEq)]
pub enum CliError {
    /// The given string is not a three-letter currency code
    #[error("Invalid currency: '{0}'. Expected a three-letter code such as USD or EUR")]
    InvalidCurrency(String),

    /// The given amount is not a positive number
    #[error("Invalid amount: {0}. Amount must be greater than zero")]
    InvalidAmount(f64),
}

/// fxconvert - Real-time currency conversion with an offline fallback
#[derive(Parser, Debug)]
#[command(name = "fxconvert")]
#[command(about = "Real-time currency conversion with an offline fallback cache")]
#[command(version)]
pub struct Cli {
    #[command(flatten)]
    pub settings: Settings,

    /// Source currency pre-selected in the interactive form
    #[arg(long, value_name = "CODE")]
    pub from: Option<String>,

    /// Target currency pre-selected in the interactive form
    #[arg(long, value_name = "CODE")]
    pub to: Option<String>,

    /// Amount pre-filled in the interactive form
    #[arg(long, allow_negative_numbers = true)]
    pub amount: Option<f64>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

/// One-shot operations
#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Convert an amount and print the result
    ///
    /// Examples:
    ///   fxconvert convert USD EUR 100
    ///   fxconvert convert usd gbp 25.5 --swap
    Convert {
        /// Source currency code
        from: String,
        /// Target currency code
        to: String,
        /// Amount of the source currency
        #[arg(allow_negative_numbers = true)]
        amount: f64,
        /// Exchange source and target before converting
        #[arg(long)]
        swap: bool,
    },

    /// Print the current exchange rates
    List {
        /// Express the rates against this currency instead of the configured base
        base: Option<String>,
    },

    /// Print daily rates for a currency pair
    History {
        /// Source currency code
        from: String,
        /// Target currency code
        to: String,
        /// Number of days to look back (1 to 31)
        #[arg(
            long,
            default_value_t = 7,
            value_parser = clap::value_parser!(u32).range(1..=i64::from(MAX_HISTORY_DAYS))
        )]
        days: u32,
    },

    /// Show what is in the rate cache
    Cache,
}

/// Configuration derived from CLI arguments for interactive startup
#[derive(Debug, Clone, PartialEq)]
pub struct StartupConfig {
    /// Source currency to select initially
    pub from: String,
    /// Target currency to select initially
    pub to: String,
    /// Amount to fill in initially
    pub amount: f64,
}

impl Default for StartupConfig {
    fn default() -> Self {
        Self {
            from: DEFAULT_FROM.to_string(),
            to: DEFAULT_TO.to_string(),
            amount: 1.0,
        }
    }
}

/// Parses a currency argument into a normalised code.
///
/// # Arguments
/// * `s` - The currency string from CLI
///
/// # Returns
/// * `Ok(String)` with the upper-cased code
/// * `Err(CliError::InvalidCurrency)` if it is not three letters
pub fn parse_currency_arg(s: &str) -> Result<String, CliError> {
    normalize_code(s).ok_or_else(|| CliError::InvalidCurrency(s.to_string()))
}

impl StartupConfig {
    /// Creates a StartupConfig from parsed CLI arguments.
    ///
    /// # Arguments
    /// * `cli` - The parsed CLI struct
    ///
    /// # Returns
    /// * `Ok(StartupConfig)` with defaults for anything not given
    /// * `Err(CliError)` if a currency or the amount is invalid
    pub fn from_cli(cli: &Cli) -> Result<Self, CliError> {
        let defaults = StartupConfig::default();

        let from = match &cli.from {
            Some(code) => parse_currency_arg(code)?,
            None => defaults.from,
        };
        let to = match &cli.to {
            Some(code) => parse_currency_arg(code)?,
            None => defaults.to,
        };
        let amount = match cli.amount {
            Some(amount) if amount.is_finite() && amount > 0.0 => amount,
            Some(amount) => return Err(CliError::InvalidAmount(amount)),
            None => defaults.amount,
        };

        Ok(StartupConfig { from, to, amount })
    }
}
