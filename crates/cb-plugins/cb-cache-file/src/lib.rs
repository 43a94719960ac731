//! # cb-cache-file
//! Device-local `KeyValueCache` backed by one JSON object on disk.
//! A missing or unreadable file is an empty cache; the device simply
//! re-resolves its identity remotely.

use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use cb_core::{AppError, KeyValueCache, Result};
use tracing::warn;

pub struct FileCache {
    path: PathBuf,
    entries: Mutex<BTreeMap<String, String>>,
}

impl FileCache {
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let entries = Self::load(&path);
        Self { path, entries: Mutex::new(entries) }
    }

    fn load(path: &Path) -> BTreeMap<String, String> {
        let raw = match fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return BTreeMap::new(),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "device cache unreadable, starting empty");
                return BTreeMap::new();
            }
        };
        serde_json::from_str(&raw).unwrap_or_else(|e| {
            warn!(path = %path.display(), error = %e, "device cache corrupt, starting empty");
            BTreeMap::new()
        })
    }

    /// Write to a sibling temp file, then rename over the cache.
    fn persist(&self, entries: &BTreeMap<String, String>) -> Result<()> {
        let io = |e: std::io::Error| AppError::Internal(format!("device cache {}: {e}", self.path.display()));

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(io)?;
        }
        let body = serde_json::to_vec_pretty(entries).map_err(|e| AppError::Internal(e.to_string()))?;
        let temp_path = self.path.with_extension("tmp");
        let mut file = fs::File::create(&temp_path).map_err(io)?;
        file.write_all(&body).map_err(io)?;
        file.sync_all().map_err(io)?;
        fs::rename(&temp_path, &self.path).map_err(io)?;
        Ok(())
    }
}

impl KeyValueCache for FileCache {
    fn get(&self, key: &str) -> Option<String> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.insert(key.to_string(), value.to_string());
        self.persist(&entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_values_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state").join("device.json");

        let cache = FileCache::open(&path);
        assert_eq!(cache.get("anonymous_id"), None);
        cache.set("anonymous_id", "48213").unwrap();

        let reopened = FileCache::open(&path);
        assert_eq!(reopened.get("anonymous_id").as_deref(), Some("48213"));
    }

    #[test]
    fn test_corrupt_file_is_an_empty_cache() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("device.json");
        fs::write(&path, "{ not json").unwrap();

        let cache = FileCache::open(&path);
        assert_eq!(cache.get("anonymous_id"), None);

        cache.set("anonymous_id", "10000").unwrap();
        assert_eq!(FileCache::open(&path).get("anonymous_id").as_deref(), Some("10000"));
    }

    #[test]
    fn test_unwritable_location_reports_error() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("file");
        fs::write(&blocker, "x").unwrap();

        let cache = FileCache::open(blocker.join("device.json"));
        assert!(matches!(cache.set("k", "v"), Err(AppError::Internal(_))));
        // The in-memory value is still served for this process.
        assert_eq!(cache.get("k").as_deref(), Some("v"));
    }
}
