//! Runtime configuration
//!
//! Settings come from command-line flags, falling back to environment
//! variables (a `.env` file is loaded by `main` first), falling back to
//! defaults. `Config` is the validated result and knows how to build the
//! rate client, the cache and the engine from it.

use clap::Args;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use crate::cache::CacheManager;
use crate::data::provider::DEFAULT_API_URL;
use crate::data::{normalize_code, ExchangeRateClient};
use crate::engine::{ConversionEngine, DEFAULT_BASE, DEFAULT_MAX_CACHE_AGE_HOURS};

/// Directory used when no XDG cache directory can be determined
const FALLBACK_CACHE_DIR: &str = ".fxconvert";

/// Errors in user-supplied settings
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("Invalid base currency: '{0}'")]
    InvalidBase(String),

    #[error("Timeout must be at least one second")]
    ZeroTimeout,

    #[error("Invalid API URL: '{0}'")]
    InvalidApiUrl(String),

    #[error("Maximum cache age of {0} hours is out of range")]
    MaxCacheAgeOutOfRange(u64),
}

/// Settings shared by every subcommand
#[derive(Args, Debug, Clone)]
pub struct Settings {
    /// API key for the exchange-rate provider
    #[arg(long, env = "EXCHANGE_API_KEY", hide_env_values = true, global = true)]
    pub api_key: Option<String>,

    /// Base URL of the exchange-rate provider
    #[arg(long, env = "FXCONVERT_API_URL", default_value = DEFAULT_API_URL, global = true)]
    pub api_url: String,

    /// Base currency requested from the provider
    #[arg(long, env = "FXCONVERT_BASE", default_value = DEFAULT_BASE, global = true)]
    pub base: String,

    /// Seconds to wait for the provider before using cached rates
    #[arg(long, env = "FXCONVERT_TIMEOUT_SECS", default_value_t = 10, global = true)]
    pub timeout_secs: u64,

    /// Oldest cached rates (in hours) accepted as fallback; 0 accepts any age
    #[arg(long, env = "FXCONVERT_MAX_CACHE_AGE_HOURS", default_value_t = DEFAULT_MAX_CACHE_AGE_HOURS, global = true)]
    pub max_cache_age_hours: u64,

    /// Directory holding the cached rates
    #[arg(long, env = "FXCONVERT_CACHE_DIR", global = true)]
    pub cache_dir: Option<PathBuf>,

    /// Log filter, e.g. "debug" or "fxconvert=trace"
    #[arg(long = "log", env = "RUST_LOG", default_value = "info", global = true)]
    pub log_filter: String,
}

/// Validated configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub api_key: Option<String>,
    pub api_url: String,
    pub base: String,
    pub timeout: Duration,
    /// `None` accepts cached rates of any age
    pub max_cache_age: Option<chrono::Duration>,
    pub cache_dir: Option<PathBuf>,
    pub log_filter: String,
}

impl Config {
    /// Validates `settings` into a configuration
    pub fn from_settings(settings: &Settings) -> Result<Self, ConfigError> {
        let base = normalize_code(&settings.base)
            .ok_or_else(|| ConfigError::InvalidBase(settings.base.clone()))?;

        if settings.timeout_secs == 0 {
            return Err(ConfigError::ZeroTimeout);
        }

        let api_url = settings.api_url.trim().trim_end_matches('/').to_string();
        if !(api_url.starts_with("http://") || api_url.starts_with("https://")) {
            return Err(ConfigError::InvalidApiUrl(settings.api_url.clone()));
        }

        let max_cache_age = match settings.max_cache_age_hours {
            0 => None,
            hours => Some(
                i64::try_from(hours)
                    .ok()
                    .and_then(chrono::Duration::try_hours)
                    .ok_or(ConfigError::MaxCacheAgeOutOfRange(hours))?,
            ),
        };

        Ok(Self {
            api_key: settings.api_key.clone().filter(|k| !k.trim().is_empty()),
            api_url,
            base,
            timeout: Duration::from_secs(settings.timeout_secs),
            max_cache_age,
            cache_dir: settings.cache_dir.clone(),
            log_filter: settings.log_filter.clone(),
        })
    }

    /// HTTP client for the configured provider
    pub fn client(&self) -> ExchangeRateClient {
        ExchangeRateClient::new()
            .with_base_url(self.api_url.clone())
            .with_api_key(self.api_key.clone())
            .with_timeout(self.timeout)
    }

    /// Disk cache in the configured directory, else the XDG cache directory
    pub fn cache_manager(&self) -> CacheManager {
        match &self.cache_dir {
            Some(dir) => CacheManager::with_dir(dir.clone()),
            None => CacheManager::new()
                .unwrap_or_else(|| CacheManager::with_dir(PathBuf::from(FALLBACK_CACHE_DIR))),
        }
    }

    /// Conversion engine wired to the configured provider and cache
    pub fn engine(&self) -> ConversionEngine<ExchangeRateClient, CacheManager> {
        ConversionEngine::new(self.client(), self.cache_manager())
            .with_base(self.base.clone())
            .with_max_cache_age(self.max_cache_age)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> Settings {
        Settings {
            api_key: None,
            api_url: DEFAULT_API_URL.to_string(),
            base: "usd".to_string(),
            timeout_secs: 10,
            max_cache_age_hours: 24,
            cache_dir: None,
            log_filter: "info".to_string(),
        }
    }

    #[test]
    fn test_from_settings_defaults() {
        let config = Config::from_settings(&settings()).unwrap();

        assert_eq!(config.base, "USD");
        assert_eq!(config.api_url, DEFAULT_API_URL);
        assert_eq!(config.timeout, Duration::from_secs(10));
        assert_eq!(config.max_cache_age, Some(chrono::Duration::hours(24)));
        assert!(config.api_key.is_none());
    }

    #[test]
    fn test_zero_max_age_disables_limit() {
        let config = Config::from_settings(&Settings {
            max_cache_age_hours: 0,
            ..settings()
        })
        .unwrap();
        assert!(config.max_cache_age.is_none());
    }

    #[test]
    fn test_huge_max_age_rejected() {
        for hours in [10_u64.pow(16), u64::MAX] {
            let result = Config::from_settings(&Settings {
                max_cache_age_hours: hours,
                ..settings()
            });
            assert_eq!(result.unwrap_err(), ConfigError::MaxCacheAgeOutOfRange(hours));
        }
    }

    #[test]
    fn test_large_max_age_stays_positive() {
        let config = Config::from_settings(&Settings {
            max_cache_age_hours: 24 * 365 * 100,
            ..settings()
        })
        .unwrap();
        assert_eq!(config.max_cache_age, Some(chrono::Duration::hours(24 * 365 * 100)));
    }

    #[test]
    fn test_invalid_base_rejected() {
        let result = Config::from_settings(&Settings {
            base: "DOLLAR".to_string(),
            ..settings()
        });
        assert_eq!(result.unwrap_err(), ConfigError::InvalidBase("DOLLAR".to_string()));
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let result = Config::from_settings(&Settings {
            timeout_secs: 0,
            ..settings()
        });
        assert_eq!(result.unwrap_err(), ConfigError::ZeroTimeout);
    }

    #[test]
    fn test_invalid_api_url_rejected() {
        let result = Config::from_settings(&Settings {
            api_url: "ftp://example.com".to_string(),
            ..settings()
        });
        assert!(matches!(result, Err(ConfigError::InvalidApiUrl(_))));
    }

    #[test]
    fn test_blank_api_key_dropped() {
        let config = Config::from_settings(&Settings {
            api_key: Some("   ".to_string()),
            ..settings()
        })
        .unwrap();
        assert!(config.api_key.is_none());
    }

    #[test]
    fn test_explicit_cache_dir_used() {
        let config = Config::from_settings(&Settings {
            cache_dir: Some(PathBuf::from("/tmp/fx-test-cache")),
            ..settings()
        })
        .unwrap();

        assert_eq!(
            config.cache_manager().cache_dir(),
            PathBuf::from("/tmp/fx-test-cache").as_path()
        );
    }

    #[test]
    fn test_engine_uses_configured_base() {
        let config = Config::from_settings(&Settings {
            base: "eur".to_string(),
            ..settings()
        })
        .unwrap();

        assert_eq!(config.engine().base(), "EUR");
        assert_eq!(config.client().base_url(), DEFAULT_API_URL);
    }
}
