//! Exchange-rate provider client
//!
//! This module fetches rate tables from an exchangerate-api.com compatible
//! endpoint and parses them into validated [`RateTable`]s. The
//! [`RateFetcher`] trait is the seam the conversion engine talks to, so the
//! engine can be driven by a stub in tests.

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, NaiveDate, Utc};
use futures::stream::{self, StreamExt};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

use super::{RateTable, RateTableError};

/// Default provider endpoint
pub const DEFAULT_API_URL: &str = "https://api.exchangerate-api.com/v4";

/// Default timeout for a single provider request
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Timeout for each per-day history request
const HISTORY_TIMEOUT: Duration = Duration::from_secs(5);

/// Most days of history requested at once
pub const MAX_HISTORY_DAYS: u32 = 31;

/// Concurrent per-day history requests
const HISTORY_CONCURRENCY: usize = 4;

/// Errors that can occur when fetching exchange rates
#[derive(Debug, Error)]
pub enum FetchError {
    /// Transport failure or timeout
    #[error("HTTP request failed: {0}")]
    Network(#[from] reqwest::Error),

    /// Provider answered with a non-success status
    #[error("Provider returned status {0}")]
    Status(StatusCode),

    /// Failed to parse JSON response
    #[error("Failed to parse JSON response: {0}")]
    ParseError(#[from] serde_json::Error),

    /// Response parsed but is unusable
    #[error("Malformed response: {0}")]
    Malformed(String),

    /// Response contained rates that violate the table invariants
    #[error("Invalid rate table: {0}")]
    InvalidTable(#[from] RateTableError),
}

impl FetchError {
    /// Whether the provider could not be reached at all
    pub fn is_network(&self) -> bool {
        matches!(self, FetchError::Network(_))
    }
}

/// Rate between two currencies on a given day
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoricalRate {
    pub date: NaiveDate,
    pub rate: f64,
}

/// Source of exchange rate tables
#[async_trait]
pub trait RateFetcher: Send + Sync {
    /// Fetch the current rates relative to `base`
    async fn fetch_latest(&self, base: &str) -> Result<RateTable, FetchError>;

    /// Fetch the `from`→`to` rate for each of the last `days` days, oldest first
    async fn fetch_history(
        &self,
        _from: &str,
        _to: &str,
        _days: u32,
    ) -> Result<Vec<HistoricalRate>, FetchError> {
        Err(FetchError::Malformed(
            "historical rates are not supported by this provider".to_string(),
        ))
    }
}

/// Body of a `latest` or `history` response
#[derive(Debug, Deserialize)]
struct RatesResponse {
    /// Base currency of the rates
    base: Option<String>,
    /// Publication date (YYYY-MM-DD)
    date: Option<String>,
    /// Rates keyed by currency code
    rates: BTreeMap<String, f64>,
    /// Fixer-style providers report failures in-band
    #[serde(default)]
    success: Option<bool>,
}

/// Client for fetching rates from an exchangerate-api.com compatible API
#[derive(Debug, Clone)]
pub struct ExchangeRateClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    timeout: Duration,
}

impl Default for ExchangeRateClient {
    fn default() -> Self {
        Self::new()
    }
}

impl ExchangeRateClient {
    /// Create a new client for the default provider
    pub fn new() -> Self {
        Self {
            client: Client::new(),
            base_url: DEFAULT_API_URL.to_string(),
            api_key: None,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Use a different provider endpoint
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Send `key` as the `access_key` query parameter
    pub fn with_api_key(mut self, key: Option<String>) -> Self {
        self.api_key = key.filter(|k| !k.trim().is_empty());
        self
    }

    /// Bound every request by `timeout`
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn latest_url(&self, base: &str) -> String {
        format!("{}/latest/{}", self.base_url, base)
    }

    fn history_url(&self, from: &str, date: NaiveDate) -> String {
        format!("{}/history/{}/{}", self.base_url, from, date.format("%Y-%m-%d"))
    }

    /// GET `url` and return the body, failing on non-2xx statuses
    async fn get_text(&self, url: &str, timeout: Duration) -> Result<String, FetchError> {
        debug!(url, "requesting rates");

        let mut request = self.client.get(url).timeout(timeout);
        if let Some(key) = &self.api_key {
            request = request.query(&[("access_key", key)]);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status));
        }

        Ok(response.text().await?)
    }

    /// Fetch the rate of `from`→`to` on a single day
    async fn fetch_history_day(
        &self,
        from: &str,
        to: &str,
        date: NaiveDate,
    ) -> Result<HistoricalRate, FetchError> {
        let timeout = self.timeout.min(HISTORY_TIMEOUT);
        let text = self.get_text(&self.history_url(from, date), timeout).await?;
        let table = parse_rates(&text, from)?;
        let rate = table
            .rate(to)
            .ok_or_else(|| FetchError::Malformed(format!("no {} rate for {}", to, date)))?;

        Ok(HistoricalRate { date, rate })
    }
}

#[async_trait]
impl RateFetcher for ExchangeRateClient {
    async fn fetch_latest(&self, base: &str) -> Result<RateTable, FetchError> {
        let text = self.get_text(&self.latest_url(base), self.timeout).await?;
        parse_rates(&text, base)
    }

    async fn fetch_history(
        &self,
        from: &str,
        to: &str,
        days: u32,
    ) -> Result<Vec<HistoricalRate>, FetchError> {
        let today = Utc::now().date_naive();
        let dates = (0..days.min(MAX_HISTORY_DAYS))
            .filter_map(|offset| today.checked_sub_signed(ChronoDuration::days(i64::from(offset))));

        let results: Vec<_> = stream::iter(dates)
            .map(|date| self.fetch_history_day(from, to, date))
            .buffer_unordered(HISTORY_CONCURRENCY)
            .collect()
            .await;

        let mut history: Vec<HistoricalRate> = results
            .into_iter()
            .filter_map(|result| match result {
                Ok(rate) => Some(rate),
                Err(e) => {
                    debug!(error = %e, "skipping historical rate");
                    None
                }
            })
            .collect();

        if history.is_empty() {
            return Err(FetchError::Malformed(
                "historical data not available".to_string(),
            ));
        }

        history.sort_by_key(|h| h.date);
        Ok(history)
    }
}

/// Parse a provider body into a rate table for `requested_base`
pub fn parse_rates(text: &str, requested_base: &str) -> Result<RateTable, FetchError> {
    let response: RatesResponse = serde_json::from_str(text)?;

    if response.success == Some(false) {
        return Err(FetchError::Malformed(
            "provider reported an unsuccessful response".to_string(),
        ));
    }

    let base = response
        .base
        .unwrap_or_else(|| requested_base.to_string());
    if !base.eq_ignore_ascii_case(requested_base) {
        return Err(FetchError::Malformed(format!(
            "expected rates for {}, got {}",
            requested_base, base
        )));
    }

    if response.rates.is_empty() {
        return Err(FetchError::Malformed("response contains no rates".to_string()));
    }

    let date = response
        .date
        .as_deref()
        .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok());

    Ok(RateTable::new(&base, date, response.rates)?)
}
