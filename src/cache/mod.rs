//! Cache module for the last-known-good rate snapshot
//!
//! This module persists the most recent successfully fetched rate table so
//! conversions keep working when the provider is unreachable. It holds a
//! single snapshot and never expires it; whether a snapshot is too old to use
//! is decided by the conversion engine.

mod manager;

pub use manager::{CacheInfo, CacheManager, MemoryStore, RateStore, StorageError};
