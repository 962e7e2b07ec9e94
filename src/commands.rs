//! One-shot subcommands
//!
//! Runs a single `convert`, `list`, `history` or `cache` operation against
//! the engine and prints the outcome to the given writer.

use chrono::Utc;
use std::io::{self, Write};
use thiserror::Error;

use crate::cache::RateStore;
use crate::cli::{parse_currency_arg, CliError, Command};
use crate::data::{format_rate, ConversionRequest, FetchError, RateFetcher};
use crate::engine::{swap, ConversionEngine, ConvertError};

/// Errors a subcommand reports to the user
#[derive(Debug, Error)]
pub enum CommandError {
    #[error(transparent)]
    Cli(#[from] CliError),

    #[error(transparent)]
    Convert(#[from] ConvertError),

    #[error("{0}")]
    Fetch(#[from] FetchError),

    #[error("Failed to write output: {0}")]
    Io(#[from] io::Error),
}

/// Runs `command` and writes its output to `out`
pub async fn run<F, S, W>(
    engine: &mut ConversionEngine<F, S>,
    command: &Command,
    out: &mut W,
) -> Result<(), CommandError>
where
    F: RateFetcher,
    S: RateStore,
    W: Write,
{
    match command {
        Command::Convert {
            from,
            to,
            amount,
            swap: swap_pair,
        } => {
            let mut request = ConversionRequest::new(from, to, *amount);
            if *swap_pair {
                request = swap(&request);
            }

            let result = engine.convert(&request).await?;

            writeln!(out, "{}", result.summary())?;
            writeln!(out, "Exchange rate: {}", result.rate_line())?;
            let source = result.provenance.describe();
            match result.rates_date {
                Some(date) => writeln!(out, "Source: {} (published {})", source, date)?,
                None => writeln!(out, "Source: {}", source)?,
            }
            if let Some(warning) = &result.storage_warning {
                writeln!(out, "Warning: rates were not cached: {}", warning)?;
            }
        }
        Command::List { base } => {
            let snapshot = engine.rates().await?;
            let table = match base {
                Some(code) => {
                    let code = parse_currency_arg(code)?;
                    snapshot
                        .table
                        .rebased(&code)
                        .ok_or(ConvertError::UnknownCurrency(code))?
                }
                None => snapshot.table,
            };

            writeln!(
                out,
                "Exchange rates for {} ({}):",
                table.base(),
                snapshot.provenance.describe()
            )?;
            for (code, rate) in table.iter() {
                writeln!(out, "{}: {}", code, format_rate(rate))?;
            }
        }
        Command::History { from, to, days } => {
            let from = parse_currency_arg(from)?;
            let to = parse_currency_arg(to)?;
            let history = engine.history(&from, &to, *days).await?;

            writeln!(out, "Recent exchange rates: {} -> {}", from, to)?;
            for entry in history.iter().rev() {
                writeln!(out, "{}: {} {}", entry.date, format_rate(entry.rate), to)?;
            }
        }
        Command::Cache => {
            let info = engine.cache_info();
            writeln!(out, "{}", info)?;
            writeln!(out, "Cache file: {}", info.location)?;
            if let Some(captured_at) = info.captured_at {
                let age = Utc::now().signed_duration_since(captured_at);
                writeln!(out, "Age: {}h {}m", age.num_hours(), age.num_minutes() % 60)?;
            }
        }
    }

    Ok(())
}
