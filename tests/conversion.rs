//! Integration tests for conversions backed by the on-disk cache

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, NaiveDate, Utc};
use proptest::prelude::*;
use tempfile::TempDir;

use fxconvert::cache::{CacheManager, RateStore};
use fxconvert::data::{ConversionRequest, FetchError, Provenance, RateFetcher, RateTable};
use fxconvert::engine::{convert_with_table, swap, ConversionEngine, ConvertError};

/// Serves a fixed table until switched offline
#[derive(Clone)]
struct SwitchableFetcher {
    table: RateTable,
    online: Arc<AtomicBool>,
}

#[async_trait]
impl RateFetcher for SwitchableFetcher {
    async fn fetch_latest(&self, _base: &str) -> Result<RateTable, FetchError> {
        if self.online.load(Ordering::SeqCst) {
            Ok(self.table.clone())
        } else {
            Err(FetchError::Malformed("provider offline".to_string()))
        }
    }
}

fn usd_table() -> RateTable {
    RateTable::new(
        "USD",
        NaiveDate::from_ymd_opt(2024, 7, 15),
        vec![("EUR".to_string(), 0.90), ("GBP".to_string(), 0.80)],
    )
    .unwrap()
}

fn setup() -> (SwitchableFetcher, Arc<AtomicBool>, TempDir) {
    let online = Arc::new(AtomicBool::new(true));
    let fetcher = SwitchableFetcher {
        table: usd_table(),
        online: online.clone(),
    };
    (fetcher, online, TempDir::new().unwrap())
}

#[tokio::test]
async fn test_live_rates_survive_restart_as_fallback() {
    let (fetcher, online, dir) = setup();

    let mut engine =
        ConversionEngine::new(fetcher.clone(), CacheManager::with_dir(dir.path().to_path_buf()));
    let live = engine
        .convert(&ConversionRequest::new("USD", "EUR", 100.0))
        .await
        .unwrap();
    assert_eq!(live.provenance, Provenance::Live);
    assert!((live.converted - 90.0).abs() < 1e-9);

    // A fresh engine over the same directory, with the provider gone
    online.store(false, Ordering::SeqCst);
    let mut engine = ConversionEngine::new(fetcher, CacheManager::with_dir(dir.path().to_path_buf()));
    let cached = engine
        .convert(&ConversionRequest::new("EUR", "GBP", 90.0))
        .await
        .unwrap();

    assert!(cached.is_fallback());
    assert!((cached.converted - 80.0).abs() < 1e-9);
    assert_eq!(cached.rates_date, NaiveDate::from_ymd_opt(2024, 7, 15));
}

#[tokio::test]
async fn test_fallback_matches_table_arithmetic() {
    let (fetcher, online, dir) = setup();
    let mut store = CacheManager::with_dir(dir.path().to_path_buf());
    store.write(&usd_table(), Utc::now()).unwrap();
    online.store(false, Ordering::SeqCst);

    let mut engine = ConversionEngine::new(fetcher, store);
    let result = engine
        .convert(&ConversionRequest::new("GBP", "EUR", 37.5))
        .await
        .unwrap();

    let (expected, rate) = convert_with_table(&usd_table(), "GBP", "EUR", 37.5).unwrap();
    assert_eq!(result.converted, expected);
    assert_eq!(result.rate, rate);
}

#[tokio::test]
async fn test_stale_cache_rejected_unless_unlimited() {
    let (fetcher, online, dir) = setup();
    let mut store = CacheManager::with_dir(dir.path().to_path_buf());
    store
        .write(&usd_table(), Utc::now() - Duration::hours(48))
        .unwrap();
    online.store(false, Ordering::SeqCst);

    let request = ConversionRequest::new("USD", "EUR", 1.0);

    let mut engine = ConversionEngine::new(fetcher.clone(), store)
        .with_max_cache_age(Some(Duration::hours(24)));
    let err = engine.convert(&request).await.unwrap_err();
    assert!(matches!(err, ConvertError::NoRatesAvailable(_)));

    let mut engine = ConversionEngine::new(fetcher, CacheManager::with_dir(dir.path().to_path_buf()))
        .with_max_cache_age(None);
    assert!(engine.convert(&request).await.unwrap().is_fallback());
}

#[tokio::test]
async fn test_cache_info_after_live_fetch() {
    let (fetcher, _online, dir) = setup();
    let mut engine =
        ConversionEngine::new(fetcher, CacheManager::with_dir(dir.path().to_path_buf()));

    assert_eq!(engine.cache_info().count, 0);
    engine.rates().await.unwrap();

    let info = engine.cache_info();
    assert_eq!(info.count, 3);
    assert_eq!(info.base.as_deref(), Some("USD"));
    assert!(info.to_string().starts_with("Cached rates: 3 (base USD)"));
    assert_eq!(
        engine.supported_currencies(),
        vec!["EUR".to_string(), "GBP".to_string(), "USD".to_string()]
    );
}

fn arb_table() -> impl Strategy<Value = RateTable> {
    (0.001f64..1000.0, 0.001f64..1000.0).prop_map(|(eur, jpy)| {
        RateTable::new(
            "USD",
            None,
            vec![("EUR".to_string(), eur), ("JPY".to_string(), jpy)],
        )
        .unwrap()
    })
}

fn arb_code() -> impl Strategy<Value = &'static str> {
    prop::sample::select(vec!["USD", "EUR", "JPY"])
}

proptest! {
    #[test]
    fn prop_round_trip(table in arb_table(), from in arb_code(), to in arb_code(), amount in 0.01f64..1e9) {
        let (there, _) = convert_with_table(&table, from, to, amount).unwrap();
        let (back, _) = convert_with_table(&table, to, from, there).unwrap();
        prop_assert!((back - amount).abs() <= amount * 1e-9);
    }

    #[test]
    fn prop_same_currency_is_identity(table in arb_table(), code in arb_code(), amount in 0.01f64..1e9) {
        let (converted, rate) = convert_with_table(&table, code, code, amount).unwrap();
        prop_assert_eq!(converted, amount);
        prop_assert_eq!(rate, 1.0);
    }

    #[test]
    fn prop_swap_is_involution(from in "[A-Z]{3}", to in "[A-Z]{3}", amount in 0.01f64..1e6) {
        let request = ConversionRequest::new(&from, &to, amount);
        prop_assert_eq!(swap(&swap(&request)), request);
    }
}
