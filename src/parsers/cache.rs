use anyhow::Result;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::hash_map::DefaultHasher;
use std::fs;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;
use tracing::{debug, warn};

use super::record::ClassRecord;

const DEFAULT_MAX_MEMORY_ENTRIES: usize = 256;

/// One decoded class as it was enumerated from an archive root.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedClass {
    pub ordinal: u64,
    pub entry_name: String,
    pub location: String,
    pub record: ClassRecord,
}

/// Decoded contents of one archive, valid while the archive's modification
/// time, size and the scan filters are unchanged.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchiveCacheEntry {
    pub classes: Vec<CachedClass>,
    pub entries: u64,
    pub timestamp: u64,
    pub file_size: u64,
    pub fingerprint: u64,
}

/// Thread-safe cache of decoded archive roots with memory and (best-effort) disk storage
pub struct ParseCache {
    memory_cache: DashMap<PathBuf, ArchiveCacheEntry>,
    cache_dir: Option<PathBuf>,
    max_memory_entries: usize,
}

impl ParseCache {
    pub fn new(cache_dir: Option<PathBuf>) -> Result<Self> {
        let resolved_dir =
            cache_dir.unwrap_or_else(|| std::env::temp_dir().join("classweave_cache"));
        let cache_dir = match fs::create_dir_all(&resolved_dir) {
            Ok(()) => Some(resolved_dir),
            Err(err) => {
                warn!(
                    dir = %resolved_dir.display(),
                    "failed to initialize disk cache: {err}"
                );
                None
            }
        };

        Ok(Self {
            memory_cache: DashMap::with_capacity(DEFAULT_MAX_MEMORY_ENTRIES),
            cache_dir,
            max_memory_entries: DEFAULT_MAX_MEMORY_ENTRIES,
        })
    }

    /// Build an in-memory-only cache without touching the filesystem
    pub fn in_memory_only() -> Self {
        Self {
            memory_cache: DashMap::with_capacity(DEFAULT_MAX_MEMORY_ENTRIES),
            cache_dir: None,
            max_memory_entries: DEFAULT_MAX_MEMORY_ENTRIES,
        }
    }

    /// Cached classes of `archive` if the entry is still valid for its
    /// current metadata and the given filter fingerprint.
    pub fn get(&self, archive: &Path, fingerprint: u64) -> Option<ArchiveCacheEntry> {
        let (timestamp, file_size) = file_stamp(archive).ok()?;
        let is_current = |entry: &ArchiveCacheEntry| {
            entry.timestamp == timestamp
                && entry.file_size == file_size
                && entry.fingerprint == fingerprint
        };

        if let Some(entry) = self.memory_cache.get(archive) {
            if is_current(entry.value()) {
                return Some(entry.value().clone());
            }
        }

        let cache_path = self.cache_path(archive)?;
        match self.load_from_disk(&cache_path) {
            Ok(entry) if is_current(&entry) => {
                debug!(archive = %archive.display(), "disk cache hit");
                if self.memory_cache.len() < self.max_memory_entries {
                    self.memory_cache
                        .insert(archive.to_path_buf(), entry.clone());
                }
                Some(entry)
            }
            _ => None,
        }
    }

    /// Store the decoded classes of `archive`.
    pub fn store(
        &self,
        archive: &Path,
        fingerprint: u64,
        entries: u64,
        classes: Vec<CachedClass>,
    ) -> Result<()> {
        let (timestamp, file_size) = file_stamp(archive)?;
        let entry = ArchiveCacheEntry {
            classes,
            entries,
            timestamp,
            file_size,
            fingerprint,
        };

        if self.memory_cache.len() >= self.max_memory_entries {
            if let Some(oldest) = self.memory_cache.iter().next() {
                let key = oldest.key().clone();
                drop(oldest);
                self.memory_cache.remove(&key);
            }
        }

        if let Some(cache_path) = self.cache_path(archive) {
            self.store_to_disk(&cache_path, &entry)?;
        }
        self.memory_cache.insert(archive.to_path_buf(), entry);
        Ok(())
    }

    pub fn clear(&self) -> Result<()> {
        self.memory_cache.clear();
        if let Some(cache_dir) = &self.cache_dir {
            if cache_dir.exists() {
                fs::remove_dir_all(cache_dir)?;
                fs::create_dir_all(cache_dir)?;
            }
        }
        Ok(())
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            memory_entries: self.memory_cache.len(),
            disk_entries: self.disk_entries(),
        }
    }

    fn cache_path(&self, archive: &Path) -> Option<PathBuf> {
        let cache_dir = self.cache_dir.as_ref()?;

        let mut hasher = DefaultHasher::new();
        archive.hash(&mut hasher);
        let hash = hasher.finish();

        Some(cache_dir.join(format!("archive_{:x}.bincode", hash)))
    }

    fn load_from_disk(&self, cache_path: &Path) -> Result<ArchiveCacheEntry> {
        let data = fs::read(cache_path)?;
        let entry: ArchiveCacheEntry = bincode::deserialize(&data)?;
        Ok(entry)
    }

    fn store_to_disk(&self, cache_path: &Path, entry: &ArchiveCacheEntry) -> Result<()> {
        let data = bincode::serialize(entry)?;
        fs::write(cache_path, data)?;
        Ok(())
    }

    fn disk_entries(&self) -> usize {
        self.cache_dir
            .as_ref()
            .and_then(|dir| fs::read_dir(dir).ok())
            .map(|entries| entries.filter_map(|e| e.ok()).count())
            .unwrap_or(0)
    }
}

fn file_stamp(path: &Path) -> Result<(u64, u64)> {
    let metadata = fs::metadata(path)?;
    let timestamp = metadata
        .modified()?
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos() as u64;
    Ok((timestamp, metadata.len()))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub memory_entries: usize,
    pub disk_entries: usize,
}
