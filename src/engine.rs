//! Conversion engine
//!
//! Converts amounts between currencies using live rates when the provider is
//! reachable and the cached snapshot when it is not. Every live table is
//! written through to the cache before it is used.

use chrono::{Duration, Utc};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::cache::{CacheInfo, RateStore};
use crate::data::{
    normalize_code, ConversionRequest, ConversionResult, FetchError, HistoricalRate, Provenance,
    RateFetcher, RateTable,
};

/// Base currency requested from the provider unless configured otherwise
pub const DEFAULT_BASE: &str = "USD";

/// Default maximum age of a cached snapshot used as fallback
pub const DEFAULT_MAX_CACHE_AGE_HOURS: u64 = 24;

/// Currencies offered when no rate table has been seen yet
pub const DEFAULT_CURRENCIES: [&str; 20] = [
    "USD", "EUR", "GBP", "JPY", "AUD", "CAD", "CHF", "CNY", "SEK", "NZD", "MXN", "SGD", "HKD",
    "NOK", "KRW", "TRY", "RUB", "INR", "BRL", "ZAR",
];

/// Errors surfaced to the user by a conversion
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConvertError {
    /// Amount is zero, negative or not a number
    #[error("Amount must be greater than zero (got {0})")]
    InvalidAmount(f64),

    /// Currency code missing from the rate table in use
    #[error("Unknown currency: {0}")]
    UnknownCurrency(String),

    /// Provider unreachable and no usable cached rates
    #[error("No exchange rates available: {0}")]
    NoRatesAvailable(String),
}

/// A rate table together with where it came from
#[derive(Debug, Clone, PartialEq)]
pub struct RateSnapshot {
    pub table: RateTable,
    pub provenance: Provenance,
    /// Set when live rates could not be written to the cache
    pub storage_warning: Option<String>,
}

/// Exchanges source and target of a request
pub fn swap(request: &ConversionRequest) -> ConversionRequest {
    request.swapped()
}

/// Converts `amount` from `from` to `to` against `table`.
///
/// Returns `(converted, rate)` where `rate = table[to] / table[from]`.
pub fn convert_with_table(
    table: &RateTable,
    from: &str,
    to: &str,
    amount: f64,
) -> Result<(f64, f64), ConvertError> {
    let rate = table.cross_rate(from, to).ok_or_else(|| {
        let missing = if table.rate(from).is_none() { from } else { to };
        ConvertError::UnknownCurrency(missing.to_string())
    })?;

    Ok((amount * rate, rate))
}

fn validate_amount(amount: f64) -> Result<(), ConvertError> {
    if amount.is_finite() && amount > 0.0 {
        Ok(())
    } else {
        Err(ConvertError::InvalidAmount(amount))
    }
}

fn validate_code(code: &str) -> Result<String, ConvertError> {
    normalize_code(code).ok_or_else(|| ConvertError::UnknownCurrency(code.to_string()))
}

/// Converts currencies with live rates, falling back to a cached snapshot
///
/// The engine owns its fetcher and its store; nothing is global. Each call
/// makes at most one fetch attempt and never retries.
pub struct ConversionEngine<F, S> {
    fetcher: F,
    store: S,
    /// Base currency requested from the provider
    base: String,
    /// Oldest acceptable fallback snapshot; `None` accepts any age
    max_cache_age: Option<Duration>,
    /// Most recent table used, live or cached
    last_table: Option<RateTable>,
}

impl<F: RateFetcher, S: RateStore> ConversionEngine<F, S> {
    /// Creates an engine with the default base and fallback age
    pub fn new(fetcher: F, store: S) -> Self {
        Self {
            fetcher,
            store,
            base: DEFAULT_BASE.to_string(),
            max_cache_age: Some(Duration::hours(DEFAULT_MAX_CACHE_AGE_HOURS as i64)),
            last_table: None,
        }
    }

    /// Request rates relative to `base` from the provider
    pub fn with_base(mut self, base: impl Into<String>) -> Self {
        self.base = base.into().to_ascii_uppercase();
        self
    }

    /// Refuse fallback snapshots older than `age` (`None` accepts any age)
    pub fn with_max_cache_age(mut self, age: Option<Duration>) -> Self {
        self.max_cache_age = age;
        self
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn fetcher(&self) -> &F {
        &self.fetcher
    }

    /// Converts `request.amount` from `request.from` to `request.to`.
    ///
    /// Same-currency requests return the amount unchanged without fetching.
    pub async fn convert(
        &mut self,
        request: &ConversionRequest,
    ) -> Result<ConversionResult, ConvertError> {
        validate_amount(request.amount)?;
        let from = validate_code(&request.from)?;
        let to = validate_code(&request.to)?;
        let request = ConversionRequest {
            from,
            to,
            amount: request.amount,
        };

        if request.from == request.to {
            return Ok(ConversionResult {
                converted: request.amount,
                rate: 1.0,
                provenance: Provenance::Direct,
                rates_date: None,
                storage_warning: None,
                request,
            });
        }

        let snapshot = self.rates().await?;
        let (converted, rate) =
            convert_with_table(&snapshot.table, &request.from, &request.to, request.amount)?;

        info!(
            from = %request.from,
            to = %request.to,
            amount = request.amount,
            converted,
            fallback = snapshot.provenance.is_fallback(),
            "converted"
        );

        Ok(ConversionResult {
            converted,
            rate,
            provenance: snapshot.provenance,
            rates_date: snapshot.table.date(),
            storage_warning: snapshot.storage_warning,
            request,
        })
    }

    /// The table conversions would use right now.
    ///
    /// Attempts one live fetch and writes it through to the store; on failure
    /// returns the cached snapshot if it is recent enough.
    pub async fn rates(&mut self) -> Result<RateSnapshot, ConvertError> {
        match self.fetcher.fetch_latest(&self.base).await {
            Ok(table) => {
                let storage_warning = match self.store.write(&table, Utc::now()) {
                    Ok(()) => None,
                    Err(e) => {
                        warn!(error = %e, "failed to cache live rates");
                        Some(e.to_string())
                    }
                };
                self.last_table = Some(table.clone());

                Ok(RateSnapshot {
                    table,
                    provenance: Provenance::Live,
                    storage_warning,
                })
            }
            Err(fetch_error) => {
                warn!(error = %fetch_error, "live rate fetch failed, trying cached rates");
                self.fallback(&fetch_error)
            }
        }
    }

    fn fallback(&mut self, fetch_error: &FetchError) -> Result<RateSnapshot, ConvertError> {
        let entry = self.store.read().ok_or_else(|| {
            ConvertError::NoRatesAvailable(format!("{} and no cached rates exist", fetch_error))
        })?;

        if let Some(max_age) = self.max_cache_age {
            let age = entry.age(Utc::now());
            if age > max_age {
                warn!(
                    age_hours = age.num_hours(),
                    max_hours = max_age.num_hours(),
                    "cached rates too old for fallback"
                );
                return Err(ConvertError::NoRatesAvailable(format!(
                    "{} and cached rates are {} hours old (limit {})",
                    fetch_error,
                    age.num_hours(),
                    max_age.num_hours()
                )));
            }
        }

        debug!(captured_at = %entry.captured_at, "using cached rates");
        self.last_table = Some(entry.table.clone());

        Ok(RateSnapshot {
            provenance: Provenance::Fallback {
                captured_at: entry.captured_at,
            },
            table: entry.table,
            storage_warning: None,
        })
    }

    /// Daily `from`→`to` rates for the last `days` days, for display only
    pub async fn history(
        &self,
        from: &str,
        to: &str,
        days: u32,
    ) -> Result<Vec<HistoricalRate>, FetchError> {
        self.fetcher.fetch_history(from, to, days).await
    }

    /// Currency codes to offer for selection, alphabetically
    ///
    /// Uses the last table seen, then the cached snapshot, then a built-in list.
    pub fn supported_currencies(&self) -> Vec<String> {
        let from_table =
            |table: &RateTable| -> Vec<String> { table.currencies().map(str::to_string).collect() };

        if let Some(table) = &self.last_table {
            return from_table(table);
        }
        if let Some(entry) = self.store.read() {
            return from_table(&entry.table);
        }

        let mut defaults: Vec<String> = DEFAULT_CURRENCIES.iter().map(|c| c.to_string()).collect();
        defaults.sort();
        defaults
    }

    pub fn cache_info(&self) -> CacheInfo {
        self.store.info()
    }
}
