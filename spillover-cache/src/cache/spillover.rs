//! Spillover Cache
//!
//! Holds entries in memory until the population exceeds `capacity`, then
//! moves every entry to a [`FileStore`] and serves all further operations
//! from disk. Deleting on disk until the stored population is back at or
//! below `capacity` moves everything back into memory.

use super::file_store::FileStore;
use super::key;
use crate::core::error::{CacheError, Result};
use crate::core::types::{CacheConfig, CacheStats, Entry, Tier};
use parking_lot::RwLock;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Tier plus the in-memory map, guarded together.
///
/// `entries` is empty whenever `tier` is [`Tier::Disk`].
struct State<V> {
    tier: Tier,
    entries: HashMap<String, Entry<V>>,
}

/// Key-value cache that spills to disk past a fixed capacity
pub struct SpilloverCache<V> {
    state: Arc<RwLock<State<V>>>,
    stats: Arc<RwLock<CacheStats>>,
    store: Arc<FileStore>,
    capacity: usize,
    purge_on_reload: bool,
}

impl<V> Clone for SpilloverCache<V> {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
            stats: Arc::clone(&self.stats),
            store: Arc::clone(&self.store),
            capacity: self.capacity,
            purge_on_reload: self.purge_on_reload,
        }
    }
}

impl<V> SpilloverCache<V>
where
    V: Serialize + DeserializeOwned + Clone,
{
    /// Create a cache with the given capacity and default store location
    pub fn new(capacity: usize) -> Result<Self> {
        Self::with_config(CacheConfig::with_capacity(capacity))
    }

    /// Create a cache from a full configuration.
    ///
    /// Starts in memory; the store directory is not touched until needed.
    pub fn with_config(config: CacheConfig) -> Result<Self> {
        if config.capacity == 0 {
            return Err(CacheError::InvalidConfig(
                "capacity must be greater than zero".to_string(),
            ));
        }
        if config.suffix.is_empty() || config.suffix.contains(['/', '\\']) {
            return Err(CacheError::InvalidConfig(format!(
                "invalid file suffix {:?}",
                config.suffix
            )));
        }

        info!(
            "Initializing spillover cache with capacity={}, directory={:?}",
            config.capacity, config.directory
        );

        Ok(Self {
            state: Arc::new(RwLock::new(State {
                tier: Tier::Memory,
                entries: HashMap::new(),
            })),
            stats: Arc::new(RwLock::new(CacheStats::default())),
            store: Arc::new(FileStore::new(config.directory, config.suffix)),
            capacity: config.capacity,
            purge_on_reload: config.purge_on_reload,
        })
    }

    /// Create a cache and adopt whatever a previous run left in the store.
    ///
    /// More than `capacity` stored entries start the cache on disk, fewer
    /// are loaded into memory.
    pub fn open(config: CacheConfig) -> Result<Self> {
        let cache = Self::with_config(config)?;
        {
            let mut state = cache.state.write();
            let stored = cache.store.count()?;
            if stored > cache.capacity {
                state.tier = Tier::Disk;
                info!("Opened existing store with {} entries on disk", stored);
            } else if stored > 0 {
                cache.load_store(&mut state)?;
                info!("Opened existing store, loaded {} entries", state.entries.len());
            }
        }
        Ok(cache)
    }

    /// Set a key-value pair
    pub fn set(&self, key: &str, value: V) -> Result<()> {
        self.insert(key, Entry::new(value, None))
    }

    /// Set a key-value pair, recording an expiration timestamp.
    ///
    /// Expiration is metadata only; nothing is reclaimed when it passes.
    pub fn set_with_ttl(&self, key: &str, value: V, ttl: Duration) -> Result<()> {
        self.insert(key, Entry::new(value, Some(ttl)))
    }

    fn insert(&self, key: &str, entry: Entry<V>) -> Result<()> {
        // validate up front so every memory key can later be spilled
        key::file_name(key, self.store.suffix())?;

        let mut state = self.state.write();
        match state.tier {
            Tier::Memory => {
                debug!("SET key={} tier=memory", key);
                state.entries.insert(key.to_string(), entry);
                if state.entries.len() > self.capacity {
                    self.spill(&mut state)?;
                }
            }
            Tier::Disk => {
                debug!("SET key={} tier=disk", key);
                self.store.save(key, &entry)?;
            }
        }

        self.stats.write().sets += 1;
        Ok(())
    }

    /// Get a value by key. Any failure to read is a miss.
    pub fn get(&self, key: &str) -> Option<V> {
        self.get_entry(key).map(|entry| entry.value)
    }

    /// Get the stored entry, including its metadata
    pub fn get_entry(&self, key: &str) -> Option<Entry<V>> {
        let found = {
            let state = self.state.read();
            match state.tier {
                Tier::Memory => state.entries.get(key).cloned(),
                Tier::Disk => match self.store.load(key) {
                    Ok(entry) => Some(entry),
                    Err(CacheError::NotFound(_)) => None,
                    Err(e @ CacheError::CorruptData { .. }) => {
                        warn!("{}", e);
                        None
                    }
                    Err(e) => {
                        debug!("GET key={:?} failed: {}", key, e);
                        None
                    }
                },
            }
        };

        let mut stats = self.stats.write();
        stats.gets += 1;
        if found.is_some() {
            stats.hits += 1;
        } else {
            stats.misses += 1;
        }
        found
    }

    /// Delete a key
    pub fn delete(&self, key: &str) -> Result<()> {
        key::file_name(key, self.store.suffix())?;

        let mut state = self.state.write();
        match state.tier {
            Tier::Memory => {
                debug!("DELETE key={} tier=memory", key);
                state
                    .entries
                    .remove(key)
                    .ok_or_else(|| CacheError::NotFound(key.to_string()))?;
            }
            Tier::Disk => {
                debug!("DELETE key={} tier=disk", key);
                self.store.delete(key)?;
                let remaining = self.store.count()?;
                if remaining <= self.capacity {
                    self.load_store(&mut state)?;
                }
            }
        }

        self.stats.write().deletes += 1;
        Ok(())
    }

    /// Persist every in-memory entry and switch to disk.
    ///
    /// A no-op when already on disk. On failure the cache stays in memory
    /// with every entry intact.
    pub fn flush(&self) -> Result<()> {
        let mut state = self.state.write();
        match state.tier {
            Tier::Memory => self.spill(&mut state),
            Tier::Disk => Ok(()),
        }
    }

    /// Load every stored entry into memory and switch to memory.
    ///
    /// A no-op when already in memory. Files that fail to decode are
    /// skipped.
    pub fn reload(&self) -> Result<()> {
        let mut state = self.state.write();
        match state.tier {
            Tier::Memory => Ok(()),
            Tier::Disk => self.load_store(&mut state),
        }
    }

    fn spill(&self, state: &mut State<V>) -> Result<()> {
        // the store must hold exactly the live key set once on disk
        self.store.purge_all()?;
        for (key, entry) in &state.entries {
            self.store.save(key, entry)?;
        }

        let moved = state.entries.len();
        state.entries.clear();
        state.tier = Tier::Disk;
        self.stats.write().spills += 1;

        info!(
            "Spilled {} entries to disk (capacity={})",
            moved, self.capacity
        );
        Ok(())
    }

    fn load_store(&self, state: &mut State<V>) -> Result<()> {
        let keys = self.store.list_keys()?;
        let mut entries = HashMap::with_capacity(keys.len());
        let mut skipped = 0u64;

        for key in keys {
            match self.store.load(&key) {
                Ok(entry) => {
                    entries.insert(key, entry);
                }
                Err(e) => {
                    warn!("Skipping stored key {:?} during reload: {}", key, e);
                    skipped += 1;
                }
            }
        }

        state.entries = entries;
        state.tier = Tier::Memory;
        {
            let mut stats = self.stats.write();
            stats.reloads += 1;
            stats.skipped_files += skipped;
        }

        info!(
            "Reloaded {} entries into memory ({} skipped)",
            state.entries.len(),
            skipped
        );

        // memory is authoritative now; leftover files are cleared on the next spill
        if self.purge_on_reload {
            if let Err(e) = self.store.purge_all() {
                warn!("Failed to purge store after reload: {}", e);
            }
        }
        Ok(())
    }

    /// Tier currently authoritative for every key
    pub fn tier(&self) -> Tier {
        self.state.read().tier
    }

    /// Number of live keys in the active tier
    pub fn len(&self) -> Result<usize> {
        let state = self.state.read();
        match state.tier {
            Tier::Memory => Ok(state.entries.len()),
            Tier::Disk => self.store.count(),
        }
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn directory(&self) -> &Path {
        self.store.directory()
    }

    /// Get statistics
    pub fn stats(&self) -> CacheStats {
        self.stats.read().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::{TempDir, tempdir};

    fn cache_in(dir: &TempDir, capacity: usize) -> SpilloverCache<String> {
        SpilloverCache::with_config(CacheConfig {
            directory: dir.path().join("cache"),
            capacity,
            ..CacheConfig::default()
        })
        .unwrap()
    }

    #[test]
    fn test_capacity_ten_scenario() {
        let dir = tempdir().unwrap();
        let cache = cache_in(&dir, 10);

        for i in 0..10 {
            cache.set(&format!("k{}", i), format!("v{}", i)).unwrap();
        }
        assert_eq!(cache.tier(), Tier::Memory);

        cache.set("k10", "v10".to_string()).unwrap();
        assert_eq!(cache.tier(), Tier::Disk);
        assert_eq!(cache.get("k0"), Some("v0".to_string()));
        assert_eq!(cache.len().unwrap(), 11);

        cache.delete("k10").unwrap();
        assert_eq!(cache.tier(), Tier::Memory);
        assert_eq!(cache.get("k5"), Some("v5".to_string()));
        assert_eq!(cache.len().unwrap(), 10);
        assert_eq!(cache.get("k10"), None);
    }

    #[test]
    fn test_get_missing_on_fresh_cache() {
        let dir = tempdir().unwrap();
        let cache = cache_in(&dir, 1);
        assert_eq!(cache.get("missing"), None);
        // nothing touched the disk
        assert!(!cache.directory().exists());
    }

    #[test]
    fn test_zero_capacity_rejected() {
        let dir = tempdir().unwrap();
        let result = SpilloverCache::<String>::with_config(CacheConfig {
            directory: dir.path().to_path_buf(),
            capacity: 0,
            ..CacheConfig::default()
        });
        assert!(matches!(result, Err(CacheError::InvalidConfig(_))));
    }

    #[test]
    fn test_bad_suffix_rejected() {
        let result = SpilloverCache::<String>::with_config(CacheConfig {
            suffix: "/x".to_string(),
            ..CacheConfig::default()
        });
        assert!(matches!(result, Err(CacheError::InvalidConfig(_))));
    }

    #[test]
    fn test_delete_missing_in_both_tiers() {
        let dir = tempdir().unwrap();
        let cache = cache_in(&dir, 1);

        assert!(matches!(cache.delete("nope"), Err(CacheError::NotFound(_))));

        cache.set("a", "1".to_string()).unwrap();
        cache.set("b", "2".to_string()).unwrap();
        assert_eq!(cache.tier(), Tier::Disk);
        assert!(matches!(cache.delete("nope"), Err(CacheError::NotFound(_))));
        assert_eq!(cache.tier(), Tier::Disk);
    }

    #[test]
    fn test_overwrite_in_disk_tier() {
        let dir = tempdir().unwrap();
        let cache = cache_in(&dir, 1);

        cache.set("a", "1".to_string()).unwrap();
        cache.set("b", "2".to_string()).unwrap();
        cache.set("a", "updated".to_string()).unwrap();
        assert_eq!(cache.get("a"), Some("updated".to_string()));
        assert_eq!(cache.len().unwrap(), 2);
    }

    #[test]
    fn test_overwrite_does_not_spill() {
        let dir = tempdir().unwrap();
        let cache = cache_in(&dir, 2);

        cache.set("a", "1".to_string()).unwrap();
        cache.set("b", "2".to_string()).unwrap();
        cache.set("b", "3".to_string()).unwrap();
        assert_eq!(cache.tier(), Tier::Memory);
    }

    #[test]
    fn test_invalid_keys() {
        let dir = tempdir().unwrap();
        let cache = cache_in(&dir, 4);

        assert!(matches!(
            cache.set("", "x".to_string()),
            Err(CacheError::InvalidKey(_))
        ));
        assert!(matches!(cache.delete(""), Err(CacheError::InvalidKey(_))));
        assert_eq!(cache.get(""), None);
        assert!(matches!(
            cache.set(&"k".repeat(400), "x".to_string()),
            Err(CacheError::InvalidKey(_))
        ));
    }

    #[test]
    fn test_explicit_flush_and_reload() {
        let dir = tempdir().unwrap();
        let cache = cache_in(&dir, 10);

        cache.set("a", "1".to_string()).unwrap();
        cache.set("b", "2".to_string()).unwrap();

        cache.flush().unwrap();
        assert_eq!(cache.tier(), Tier::Disk);
        assert!(cache.directory().join("a.cache").is_file());
        assert_eq!(cache.get("b"), Some("2".to_string()));

        // idempotent on disk
        cache.flush().unwrap();

        cache.reload().unwrap();
        assert_eq!(cache.tier(), Tier::Memory);
        assert_eq!(cache.get("a"), Some("1".to_string()));
        assert!(!cache.directory().join("a.cache").exists());

        let stats = cache.stats();
        assert_eq!(stats.spills, 1);
        assert_eq!(stats.reloads, 1);
    }

    #[test]
    fn test_reload_skips_corrupt_files() {
        let dir = tempdir().unwrap();
        let cache = cache_in(&dir, 2);

        for key in ["a", "b", "c", "d"] {
            cache.set(key, key.to_uppercase()).unwrap();
        }
        assert_eq!(cache.tier(), Tier::Disk);

        fs::write(cache.directory().join("c.cache"), b"\x00\x01garbage").unwrap();
        assert_eq!(cache.get("c"), None);

        // 3 files remain, above capacity
        cache.delete("d").unwrap();
        assert_eq!(cache.tier(), Tier::Disk);

        // 2 files remain (one corrupt): back to memory, corrupt one dropped
        cache.delete("b").unwrap();
        assert_eq!(cache.tier(), Tier::Memory);
        assert_eq!(cache.get("a"), Some("A".to_string()));
        assert_eq!(cache.get("c"), None);
        assert_eq!(cache.len().unwrap(), 1);
        assert_eq!(cache.stats().skipped_files, 1);
    }

    #[test]
    fn test_failed_spill_stays_in_memory() {
        let dir = tempdir().unwrap();
        let cache = cache_in(&dir, 3);

        for key in ["a", "b", "c"] {
            cache.set(key, key.to_uppercase()).unwrap();
        }
        // a directory in place of d's file makes saving d fail
        let blocker = cache.directory().join("d.cache");
        fs::create_dir_all(&blocker).unwrap();

        assert!(matches!(
            cache.set("d", "D".to_string()),
            Err(CacheError::Io(_))
        ));
        assert_eq!(cache.tier(), Tier::Memory);
        for key in ["a", "b", "c", "d"] {
            assert_eq!(cache.get(key), Some(key.to_uppercase()));
        }

        // deleted while in memory, possibly already written by the failed spill
        cache.delete("a").unwrap();
        fs::remove_dir(&blocker).unwrap();

        cache.set("e", "E".to_string()).unwrap();
        assert_eq!(cache.tier(), Tier::Disk);
        assert_eq!(cache.len().unwrap(), 4);
        assert_eq!(cache.get("a"), None);
        for key in ["b", "c", "d", "e"] {
            assert_eq!(cache.get(key), Some(key.to_uppercase()));
        }
    }

    #[test]
    fn test_spill_ignores_files_from_previous_run() {
        let dir = tempdir().unwrap();
        let leftover = FileStore::new(dir.path().join("cache"), ".cache");
        for key in ["old1", "old2", "old3"] {
            leftover.save(key, &Entry::new(key.to_string(), None)).unwrap();
        }

        let cache = cache_in(&dir, 2);
        for key in ["a", "b", "c"] {
            cache.set(key, key.to_string()).unwrap();
        }

        assert_eq!(cache.tier(), Tier::Disk);
        assert_eq!(cache.len().unwrap(), 3);
        assert_eq!(cache.get("old1"), None);
        assert_eq!(cache.get("c"), Some("c".to_string()));
    }

    #[test]
    fn test_spill_clears_files_kept_by_reload() {
        let dir = tempdir().unwrap();
        let cache: SpilloverCache<String> = SpilloverCache::with_config(CacheConfig {
            directory: dir.path().join("cache"),
            capacity: 1,
            purge_on_reload: false,
            ..CacheConfig::default()
        })
        .unwrap();

        cache.set("a", "1".to_string()).unwrap();
        cache.set("b", "2".to_string()).unwrap();
        cache.delete("b").unwrap();
        cache.delete("a").unwrap();
        assert!(cache.directory().join("a.cache").is_file());

        cache.set("c", "3".to_string()).unwrap();
        cache.set("d", "4".to_string()).unwrap();
        assert_eq!(cache.tier(), Tier::Disk);
        assert_eq!(cache.get("a"), None);
        assert_eq!(cache.len().unwrap(), 2);
    }

    #[test]
    fn test_keep_files_when_purge_disabled() {
        let dir = tempdir().unwrap();
        let cache: SpilloverCache<String> = SpilloverCache::with_config(CacheConfig {
            directory: dir.path().join("cache"),
            capacity: 1,
            purge_on_reload: false,
            ..CacheConfig::default()
        })
        .unwrap();

        cache.set("a", "1".to_string()).unwrap();
        cache.set("b", "2".to_string()).unwrap();
        cache.delete("b").unwrap();

        assert_eq!(cache.tier(), Tier::Memory);
        assert!(cache.directory().join("a.cache").is_file());
    }

    #[test]
    fn test_ttl_metadata_survives_spill() {
        let dir = tempdir().unwrap();
        let cache = cache_in(&dir, 1);

        cache
            .set_with_ttl("a", "1".to_string(), Duration::from_secs(120))
            .unwrap();
        cache.set("b", "2".to_string()).unwrap();
        assert_eq!(cache.tier(), Tier::Disk);

        let entry = cache.get_entry("a").unwrap();
        assert_eq!(entry.expires_at, Some(entry.created_at + 120));
        assert_eq!(cache.get_entry("b").unwrap().expires_at, None);
    }

    #[test]
    fn test_open_adopts_existing_store() {
        let dir = tempdir().unwrap();
        {
            let cache = cache_in(&dir, 2);
            for key in ["a", "b", "c"] {
                cache.set(key, key.to_string()).unwrap();
            }
            assert_eq!(cache.tier(), Tier::Disk);
        }

        let config = CacheConfig {
            directory: dir.path().join("cache"),
            capacity: 2,
            ..CacheConfig::default()
        };
        let reopened: SpilloverCache<String> = SpilloverCache::open(config.clone()).unwrap();
        assert_eq!(reopened.tier(), Tier::Disk);
        assert_eq!(reopened.get("c"), Some("c".to_string()));

        reopened.delete("c").unwrap();
        assert_eq!(reopened.tier(), Tier::Memory);
        drop(reopened);

        // store was purged on reload, so a fresh open starts empty
        let empty: SpilloverCache<String> = SpilloverCache::open(config).unwrap();
        assert_eq!(empty.tier(), Tier::Memory);
        assert!(empty.is_empty().unwrap());
    }

    #[test]
    fn test_stats_counters() {
        let dir = tempdir().unwrap();
        let cache = cache_in(&dir, 5);

        cache.set("a", "1".to_string()).unwrap();
        cache.get("a");
        cache.get("b");
        cache.delete("a").unwrap();

        let stats = cache.stats();
        assert_eq!(stats.sets, 1);
        assert_eq!(stats.gets, 2);
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.deletes, 1);
        assert_eq!(stats.spills, 0);
    }
}
