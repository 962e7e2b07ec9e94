//! Rate snapshot storage
//!
//! Provides the `RateStore` trait the conversion engine writes through, a
//! disk-backed `CacheManager` that keeps the snapshot as a JSON file, and an
//! in-memory `MemoryStore`.

use chrono::{DateTime, Local, Utc};
use directories::ProjectDirs;
use serde::Serialize;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

use crate::data::{CacheEntry, RateTable};

/// File name of the persisted snapshot
const CACHE_FILE: &str = "rates.json";

/// Errors that can occur when persisting the snapshot
#[derive(Debug, Error)]
pub enum StorageError {
    /// Directory creation, file write or rename failed
    #[error("Cache write to {path} failed: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The entry could not be encoded as JSON
    #[error("Failed to serialize cache entry: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Storage for the single last-known-good rate snapshot
///
/// Implementations hold at most one entry; `write` replaces it. Staleness is
/// the caller's decision, so `read` returns whatever was stored last.
pub trait RateStore {
    /// Persist `table` captured at `captured_at`, replacing any prior entry
    fn write(&mut self, table: &RateTable, captured_at: DateTime<Utc>) -> Result<(), StorageError>;

    /// The last persisted entry, or `None` if nothing usable is stored
    fn read(&self) -> Option<CacheEntry>;

    /// Where the snapshot lives, for status displays
    fn location(&self) -> String;

    /// Summary of the stored snapshot
    fn info(&self) -> CacheInfo {
        CacheInfo::new(self.read().as_ref(), self.location())
    }
}

/// Borrowed form of [`CacheEntry`] used for writing
#[derive(Serialize)]
struct CacheRecord<'a> {
    table: &'a RateTable,
    captured_at: DateTime<Utc>,
}

/// Manages reading and writing the rate snapshot on disk
///
/// The snapshot is stored as `rates.json` in an XDG-compliant cache directory
/// (`~/.cache/fxconvert/` on Linux). Writes go to a temporary file that is
/// renamed over the snapshot, so readers never see a partial file.
#[derive(Debug, Clone)]
pub struct CacheManager {
    /// Directory where the cache file is stored
    cache_dir: PathBuf,
}

impl CacheManager {
    /// Creates a new CacheManager using XDG-compliant cache directory
    ///
    /// Returns `None` if the cache directory cannot be determined (e.g., no home directory).
    pub fn new() -> Option<Self> {
        let project_dirs = ProjectDirs::from("", "", "fxconvert")?;
        let cache_dir = project_dirs.cache_dir().to_path_buf();
        Some(Self { cache_dir })
    }

    /// Creates a new CacheManager with a custom cache directory
    pub fn with_dir(cache_dir: PathBuf) -> Self {
        Self { cache_dir }
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Path of the snapshot file
    pub fn cache_path(&self) -> PathBuf {
        self.cache_dir.join(CACHE_FILE)
    }

    /// Ensures the cache directory exists
    fn ensure_dir(&self) -> Result<(), StorageError> {
        fs::create_dir_all(&self.cache_dir).map_err(|source| StorageError::Io {
            path: self.cache_dir.clone(),
            source,
        })
    }
}

impl RateStore for CacheManager {
    fn write(&mut self, table: &RateTable, captured_at: DateTime<Utc>) -> Result<(), StorageError> {
        self.ensure_dir()?;

        let record = CacheRecord { table, captured_at };
        let json = serde_json::to_string_pretty(&record)?;

        let path = self.cache_path();
        let tmp_path = path.with_extension("json.tmp");

        fs::write(&tmp_path, json).map_err(|source| StorageError::Io {
            path: tmp_path.clone(),
            source,
        })?;
        fs::rename(&tmp_path, &path).map_err(|source| StorageError::Io {
            path: path.clone(),
            source,
        })?;

        debug!(path = %path.display(), base = table.base(), "cached rate snapshot");
        Ok(())
    }

    fn read(&self) -> Option<CacheEntry> {
        let path = self.cache_path();
        let content = fs::read_to_string(&path).ok()?;

        match serde_json::from_str::<CacheEntry>(&content) {
            Ok(entry) => Some(entry),
            Err(e) => {
                debug!(path = %path.display(), error = %e, "ignoring unreadable rate snapshot");
                None
            }
        }
    }

    fn location(&self) -> String {
        self.cache_path().display().to_string()
    }
}

/// Keeps the snapshot in memory for the lifetime of the process
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entry: Option<CacheEntry>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store pre-populated with `entry`
    pub fn with_entry(entry: CacheEntry) -> Self {
        Self { entry: Some(entry) }
    }
}

impl RateStore for MemoryStore {
    fn write(&mut self, table: &RateTable, captured_at: DateTime<Utc>) -> Result<(), StorageError> {
        self.entry = Some(CacheEntry::new(table.clone(), captured_at));
        Ok(())
    }

    fn read(&self) -> Option<CacheEntry> {
        self.entry.clone()
    }

    fn location(&self) -> String {
        "memory".to_string()
    }
}

/// Summary of the cached snapshot
#[derive(Debug, Clone, PartialEq)]
pub struct CacheInfo {
    /// Base currency of the cached table
    pub base: Option<String>,
    /// Number of cached rates
    pub count: usize,
    /// When the snapshot was captured
    pub captured_at: Option<DateTime<Utc>>,
    /// Where the snapshot lives
    pub location: String,
}

impl CacheInfo {
    pub fn new(entry: Option<&CacheEntry>, location: String) -> Self {
        Self {
            base: entry.map(|e| e.table.base().to_string()),
            count: entry.map_or(0, |e| e.table.len()),
            captured_at: entry.map(|e| e.captured_at),
            location,
        }
    }

    /// Last update in local time, or "Never"
    pub fn last_update(&self) -> String {
        self.captured_at
            .map(|t| t.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_else(|| "Never".to_string())
    }
}

impl fmt::Display for CacheInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.base {
            Some(base) => write!(
                f,
                "Cached rates: {} (base {}) | Last cache update: {}",
                self.count,
                base,
                self.last_update()
            ),
            None => write!(f, "Cached rates: 0 | Last cache update: Never"),
        }
    }
}
