//! Core data models for fxconvert
//!
//! This module contains the data types shared by the conversion engine, the
//! rate cache and the presentation layer: rate tables, cached snapshots,
//! conversion requests and their results.

pub mod provider;

pub use provider::{ExchangeRateClient, FetchError, HistoricalRate, RateFetcher};

use chrono::{DateTime, Local, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

/// Tolerance used when checking that the base currency maps to 1.0
const BASE_RATE_TOLERANCE: f64 = 1e-9;

/// Errors raised when a rate table violates its invariants
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RateTableError {
    /// A currency code is not three ASCII letters
    #[error("Invalid currency code: '{0}'")]
    InvalidCode(String),

    /// The base currency is listed with a rate other than 1.0
    #[error("Base currency {base} must have rate 1.0 (got {rate})")]
    BaseRate { base: String, rate: f64 },

    /// A rate is zero, negative, NaN or infinite
    #[error("Rate for {code} must be positive (got {rate})")]
    NonPositiveRate { code: String, rate: f64 },
}

/// Normalises a currency code to upper case.
///
/// Returns `None` unless the trimmed input is exactly three ASCII letters.
pub fn normalize_code(code: &str) -> Option<String> {
    let trimmed = code.trim();
    if trimmed.len() == 3 && trimmed.chars().all(|c| c.is_ascii_alphabetic()) {
        Some(trimmed.to_ascii_uppercase())
    } else {
        None
    }
}

/// Plain on-the-wire shape of a rate table, validated into [`RateTable`]
#[derive(Debug, Deserialize)]
struct RateTableRecord {
    base: String,
    #[serde(default)]
    date: Option<NaiveDate>,
    rates: BTreeMap<String, f64>,
}

/// A set of exchange rates relative to a single base currency
///
/// The base currency always maps to 1.0 and every rate is positive and
/// finite. Both invariants are checked on construction and again when a
/// table is deserialized from the cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RateTableRecord")]
pub struct RateTable {
    base: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    date: Option<NaiveDate>,
    rates: BTreeMap<String, f64>,
}

impl TryFrom<RateTableRecord> for RateTable {
    type Error = RateTableError;

    fn try_from(record: RateTableRecord) -> Result<Self, Self::Error> {
        RateTable::new(&record.base, record.date, record.rates)
    }
}

impl RateTable {
    /// Builds a validated rate table.
    ///
    /// Codes are upper-cased. The base currency is added with rate 1.0 when
    /// the provider omits it.
    pub fn new(
        base: &str,
        date: Option<NaiveDate>,
        rates: impl IntoIterator<Item = (String, f64)>,
    ) -> Result<Self, RateTableError> {
        let base = normalize_code(base).ok_or_else(|| RateTableError::InvalidCode(base.to_string()))?;

        let mut table = BTreeMap::new();
        for (code, rate) in rates {
            let normalized =
                normalize_code(&code).ok_or_else(|| RateTableError::InvalidCode(code.clone()))?;
            if !rate.is_finite() || rate <= 0.0 {
                return Err(RateTableError::NonPositiveRate {
                    code: normalized,
                    rate,
                });
            }
            table.insert(normalized, rate);
        }

        match table.get(&base) {
            Some(&rate) if (rate - 1.0).abs() > BASE_RATE_TOLERANCE => {
                return Err(RateTableError::BaseRate { base, rate });
            }
            Some(_) => {}
            None => {
                table.insert(base.clone(), 1.0);
            }
        }

        Ok(Self {
            base,
            date,
            rates: table,
        })
    }

    /// The currency every rate is expressed against
    pub fn base(&self) -> &str {
        &self.base
    }

    /// Publication date reported by the provider, if any
    pub fn date(&self) -> Option<NaiveDate> {
        self.date
    }

    /// Rate of `code` relative to the base currency
    pub fn rate(&self, code: &str) -> Option<f64> {
        self.rates.get(code).copied()
    }

    /// Currency codes in alphabetical order
    pub fn currencies(&self) -> impl Iterator<Item = &str> {
        self.rates.keys().map(String::as_str)
    }

    /// Code/rate pairs in alphabetical order
    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.rates.iter().map(|(code, rate)| (code.as_str(), *rate))
    }

    pub fn len(&self) -> usize {
        self.rates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rates.is_empty()
    }

    /// Rate converting one unit of `from` into `to`
    pub fn cross_rate(&self, from: &str, to: &str) -> Option<f64> {
        let from_rate = self.rate(from)?;
        let to_rate = self.rate(to)?;
        Some(to_rate / from_rate)
    }

    /// Re-expresses the table against another base currency in the table.
    ///
    /// Returns `None` if `base` is not part of the table.
    pub fn rebased(&self, base: &str) -> Option<RateTable> {
        let divisor = self.rate(base)?;
        let rates = self
            .rates
            .iter()
            .map(|(code, rate)| (code.clone(), rate / divisor));
        RateTable::new(base, self.date, rates).ok()
    }
}

/// The last successfully fetched rate table and when it was captured
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// The cached rates
    pub table: RateTable,
    /// When the rates were fetched
    pub captured_at: DateTime<Utc>,
}

impl CacheEntry {
    pub fn new(table: RateTable, captured_at: DateTime<Utc>) -> Self {
        Self { table, captured_at }
    }

    /// How long ago the entry was captured, relative to `now`
    pub fn age(&self, now: DateTime<Utc>) -> chrono::Duration {
        now.signed_duration_since(self.captured_at)
    }
}

/// A request to convert `amount` of `from` into `to`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversionRequest {
    /// Source currency code
    pub from: String,
    /// Target currency code
    pub to: String,
    /// Amount of the source currency
    pub amount: f64,
}

impl ConversionRequest {
    /// Creates a request, trimming and upper-casing both codes
    pub fn new(from: &str, to: &str, amount: f64) -> Self {
        Self {
            from: from.trim().to_ascii_uppercase(),
            to: to.trim().to_ascii_uppercase(),
            amount,
        }
    }

    /// The same request with source and target exchanged
    pub fn swapped(&self) -> Self {
        Self {
            from: self.to.clone(),
            to: self.from.clone(),
            amount: self.amount,
        }
    }
}

/// Where the rate behind a conversion came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Provenance {
    /// Fetched from the provider during this request
    Live,
    /// Read from the cached snapshot because the provider was unavailable
    Fallback {
        /// When the cached rates were fetched
        captured_at: DateTime<Utc>,
    },
    /// Source and target are the same currency; no rates were consulted
    Direct,
}

impl Provenance {
    pub fn is_fallback(&self) -> bool {
        matches!(self, Provenance::Fallback { .. })
    }

    /// Human-readable description for status lines
    pub fn describe(&self) -> String {
        match self {
            Provenance::Live => "Live rates".to_string(),
            Provenance::Fallback { captured_at } => format!(
                "Cached rates from {} (provider unavailable)",
                captured_at.with_timezone(&Local).format("%Y-%m-%d %H:%M")
            ),
            Provenance::Direct => "Direct (same currency)".to_string(),
        }
    }
}

/// Outcome of a successful conversion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversionResult {
    /// The request this result answers, with normalised codes
    pub request: ConversionRequest,
    /// Converted amount, full precision
    pub converted: f64,
    /// Units of the target currency per unit of the source currency
    pub rate: f64,
    /// Where the rate came from
    pub provenance: Provenance,
    /// Provider publication date of the rates used, if known
    pub rates_date: Option<NaiveDate>,
    /// Set when live rates could not be written to the cache
    pub storage_warning: Option<String>,
}

impl ConversionResult {
    pub fn is_fallback(&self) -> bool {
        self.provenance.is_fallback()
    }

    /// One-line summary, e.g. `100.00 USD = 90.00 EUR`
    pub fn summary(&self) -> String {
        format!(
            "{} {} = {} {}",
            format_amount(self.request.amount),
            self.request.from,
            format_amount(self.converted),
            self.request.to
        )
    }

    /// Rate line, e.g. `1 USD = 0.900000 EUR`
    pub fn rate_line(&self) -> String {
        format!(
            "1 {} = {} {}",
            self.request.from,
            format_rate(self.rate),
            self.request.to
        )
    }
}

impl fmt::Display for ConversionResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.summary())
    }
}

/// Formats an amount for display (2 decimal places)
pub fn format_amount(amount: f64) -> String {
    format!("{:.2}", amount)
}

/// Formats a rate for display (6 decimal places)
pub fn format_rate(rate: f64) -> String {
    format!("{:.6}", rate)
}
