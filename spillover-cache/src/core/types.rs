use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// A single stored record: the caller's value plus write metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entry<V> {
    /// Caller supplied payload
    pub value: V,
    /// Unix seconds at write time
    pub created_at: i64,
    /// Unix seconds after which the entry is considered stale (not enforced)
    pub expires_at: Option<i64>,
}

impl<V> Entry<V> {
    /// Create a new entry stamped with the current time
    pub fn new(value: V, ttl: Option<Duration>) -> Self {
        let now = Utc::now().timestamp();
        Self {
            value,
            created_at: now,
            expires_at: ttl.map(|ttl| {
                now.saturating_add(i64::try_from(ttl.as_secs()).unwrap_or(i64::MAX))
            }),
        }
    }

    /// Whether the expiration timestamp has passed. Informational only.
    pub fn is_expired(&self) -> bool {
        self.expires_at
            .is_some_and(|expires| Utc::now().timestamp() >= expires)
    }
}

/// Storage tier that is currently authoritative for every key
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    #[default]
    Memory,
    Disk,
}

/// Configuration for a spillover cache
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CacheConfig {
    /// Directory holding one file per entry while on disk
    pub directory: PathBuf,
    /// File name suffix appended to every escaped key
    pub suffix: String,
    /// Maximum number of entries held in memory
    pub capacity: usize,
    /// Remove store files after moving back to memory
    pub purge_on_reload: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("cache"),
            suffix: ".cache".to_string(),
            capacity: 10,
            purge_on_reload: true,
        }
    }
}

impl CacheConfig {
    /// Default configuration with the given capacity
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity,
            ..Self::default()
        }
    }
}

/// Statistics for a spillover cache
#[derive(Debug, Default, Clone, Serialize)]
pub struct CacheStats {
    /// Number of GET operations
    pub gets: u64,
    /// Number of cache hits
    pub hits: u64,
    /// Number of cache misses
    pub misses: u64,
    /// Number of successful SET operations
    pub sets: u64,
    /// Number of successful DELETE operations
    pub deletes: u64,
    /// Memory to disk transitions
    pub spills: u64,
    /// Disk to memory transitions
    pub reloads: u64,
    /// Stored files skipped during reload because they failed to decode
    pub skipped_files: u64,
}

impl CacheStats {
    /// Calculate hit rate
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}
