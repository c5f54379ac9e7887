//! File Store
//!
//! One file per entry in a single directory. File names come from
//! [`key::file_name`], contents from [`codec::encode`].

use super::codec;
use super::key;
use crate::core::error::{CacheError, Result};
use crate::core::types::Entry;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fs::{self, DirBuilder, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tracing::{debug, warn};

const TEMP_PREFIX: &str = ".tmp-";

/// File-per-key store rooted at a fixed directory
#[derive(Debug)]
pub struct FileStore {
    directory: PathBuf,
    suffix: String,
    ready: AtomicBool,
    temp_seq: AtomicU64,
}

impl FileStore {
    /// Create a store handle. The directory is created lazily on first use.
    pub fn new(directory: impl Into<PathBuf>, suffix: impl Into<String>) -> Self {
        Self {
            directory: directory.into(),
            suffix: suffix.into(),
            ready: AtomicBool::new(false),
            temp_seq: AtomicU64::new(0),
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn suffix(&self) -> &str {
        &self.suffix
    }

    /// Create the store directory if needed. Idempotent.
    fn ensure_dir(&self) -> Result<()> {
        if self.ready.load(Ordering::Acquire) {
            return Ok(());
        }

        let mut builder = DirBuilder::new();
        builder.recursive(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::DirBuilderExt;
            builder.mode(0o777);
        }
        builder.create(&self.directory)?;

        debug!("Store directory ready at {:?}", self.directory);
        self.ready.store(true, Ordering::Release);
        Ok(())
    }

    fn path_for(&self, key: &str) -> Result<PathBuf> {
        Ok(self.directory.join(key::file_name(key, &self.suffix)?))
    }

    /// Write an entry, replacing any previous file for the key
    pub fn save<V: Serialize>(&self, key: &str, entry: &Entry<V>) -> Result<()> {
        let path = self.path_for(key)?;
        let frame = codec::encode(entry)?;
        self.ensure_dir()?;

        let temp_path = self.directory.join(format!(
            "{}{}-{}",
            TEMP_PREFIX,
            std::process::id(),
            self.temp_seq.fetch_add(1, Ordering::Relaxed)
        ));

        let written = Self::write_file(&temp_path, &frame)
            .and_then(|()| fs::rename(&temp_path, &path));
        if let Err(e) = written {
            let _ = fs::remove_file(&temp_path);
            return Err(e.into());
        }
        self.sync_dir()?;

        debug!("Saved key={} size={} to {:?}", key, frame.len(), path);
        Ok(())
    }

    /// Make a completed rename durable
    #[cfg(unix)]
    fn sync_dir(&self) -> Result<()> {
        File::open(&self.directory)?.sync_all()?;
        Ok(())
    }

    #[cfg(not(unix))]
    fn sync_dir(&self) -> Result<()> {
        Ok(())
    }

    fn write_file(path: &Path, data: &[u8]) -> io::Result<()> {
        let mut file = File::create(path)?;
        file.write_all(data)?;
        file.sync_all()
    }

    /// Read and decode the entry stored for a key
    pub fn load<V: DeserializeOwned>(&self, key: &str) -> Result<Entry<V>> {
        let path = self.path_for(key)?;
        self.ensure_dir()?;

        let data = fs::read(&path).map_err(|e| not_found_or_io(key, e))?;
        codec::decode(&data).map_err(|e| CacheError::corrupt(key, e.to_string()))
    }

    /// Remove the file stored for a key
    pub fn delete(&self, key: &str) -> Result<()> {
        let path = self.path_for(key)?;
        self.ensure_dir()?;

        fs::remove_file(&path).map_err(|e| not_found_or_io(key, e))?;
        debug!("Deleted {:?}", path);
        Ok(())
    }

    /// Snapshot of every key currently stored.
    ///
    /// Files without the store suffix, hidden files and names that do not
    /// unescape are ignored.
    pub fn list_keys(&self) -> Result<Vec<String>> {
        self.ensure_dir()?;

        let mut keys = Vec::new();
        for dir_entry in fs::read_dir(&self.directory)? {
            let dir_entry = dir_entry?;
            if !dir_entry.file_type()?.is_file() {
                continue;
            }
            let name = dir_entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };
            if name.starts_with('.') {
                continue;
            }
            match key::key_from_file_name(name, &self.suffix) {
                Some(key) => keys.push(key),
                None if name.ends_with(&self.suffix) => {
                    warn!("Ignoring unrecognized store file {:?}", name);
                }
                None => {}
            }
        }
        Ok(keys)
    }

    /// Number of entries currently stored
    pub fn count(&self) -> Result<usize> {
        Ok(self.list_keys()?.len())
    }

    /// Remove every entry file and leftover temporary file.
    ///
    /// Returns the number of entry files removed.
    pub fn purge_all(&self) -> Result<usize> {
        self.ensure_dir()?;

        let mut removed = 0;
        for dir_entry in fs::read_dir(&self.directory)? {
            let dir_entry = dir_entry?;
            if !dir_entry.file_type()?.is_file() {
                continue;
            }
            let name = dir_entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };
            if name.starts_with(TEMP_PREFIX) {
                fs::remove_file(dir_entry.path())?;
            } else if key::key_from_file_name(name, &self.suffix).is_some() {
                fs::remove_file(dir_entry.path())?;
                removed += 1;
            }
        }

        debug!("Purged {} files from {:?}", removed, self.directory);
        Ok(removed)
    }
}

fn not_found_or_io(key: &str, e: io::Error) -> CacheError {
    if e.kind() == io::ErrorKind::NotFound {
        CacheError::NotFound(key.to_string())
    } else {
        CacheError::Io(e)
    }
}
