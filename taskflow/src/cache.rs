//! Durable local key/value cache.
//!
//! The Rust analogue of the namespaced browser storage the app grew up
//! with: one JSON file per key inside a cache directory, every file name
//! prefixed with `taskflow_` so the directory can be shared with unrelated
//! data. All operations are synchronous and **never fail from the caller's
//! point of view** — a full disk, an unreadable directory, or a corrupted
//! payload degrades to a no-op (`set`/`remove`) or the caller-supplied
//! default (`get`), with the fault logged at `warn`. The rest of the
//! system leans on this contract: durability is best-effort, and cache
//! failure is never an exceptional path.

use std::path::{Path, PathBuf};

use serde::Serialize;
use serde::de::DeserializeOwned;

/// File-name prefix namespacing all cache entries.
const CACHE_PREFIX: &str = "taskflow_";

/// Well-known cache keys.
pub mod keys {
    /// The full task list (`Vec<Task>` as JSON).
    pub const TASKS: &str = "tasks";
    /// The active sort preference ([`crate::prefs::SortOrder`]).
    pub const SORT_BY: &str = "sort_by";
    /// The dark-mode display flag (`bool`).
    pub const DARK_MODE: &str = "dark_mode";
}

/// Namespaced, no-throw key/value store backed by JSON files.
#[derive(Debug, Clone)]
pub struct LocalCache {
    dir: PathBuf,
}

impl LocalCache {
    /// Opens a cache rooted at the given directory, creating it if needed.
    ///
    /// Creation failure is tolerated: the cache still constructs and every
    /// operation degrades per the no-throw contract.
    #[must_use]
    pub fn open(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        if let Err(e) = std::fs::create_dir_all(&dir) {
            tracing::warn!(dir = %dir.display(), error = %e, "could not create cache directory");
        }
        Self { dir }
    }

    /// Reads and deserializes the value for `key`.
    ///
    /// Returns `default` when the key is absent, the file is unreadable,
    /// or the payload does not deserialize as `T`.
    pub fn get<T: DeserializeOwned>(&self, key: &str, default: T) -> T {
        let path = self.path_for(key);
        let raw = match std::fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return default,
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "cache read failed");
                return default;
            }
        };
        match serde_json::from_str(&raw) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "corrupted cache payload, using default");
                default
            }
        }
    }

    /// Serializes and writes `value` under `key`. Best-effort.
    ///
    /// The payload is written to a temporary file and renamed into place,
    /// so a crash mid-write leaves the previous value intact rather than
    /// a truncated one.
    pub fn set<T: Serialize + ?Sized>(&self, key: &str, value: &T) {
        let payload = match serde_json::to_string(value) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "cache serialization failed");
                return;
            }
        };
        let path = self.path_for(key);
        let tmp = path.with_extension("json.tmp");
        let result = std::fs::write(&tmp, payload).and_then(|()| std::fs::rename(&tmp, &path));
        if let Err(e) = result {
            tracing::warn!(key = %key, error = %e, "cache write failed");
            let _ = std::fs::remove_file(&tmp);
        }
    }

    /// Removes the entry for `key`. Best-effort; removing an absent key
    /// is silent.
    pub fn remove(&self, key: &str) {
        if let Err(e) = std::fs::remove_file(self.path_for(key)) {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!(key = %key, error = %e, "cache remove failed");
            }
        }
    }

    /// Lists the keys currently present in this cache's namespace.
    ///
    /// Returns an empty list if the directory cannot be read.
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        let entries = match std::fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!(dir = %self.dir.display(), error = %e, "cache directory unreadable");
                return Vec::new();
            }
        };
        let mut found: Vec<String> = entries
            .filter_map(Result::ok)
            .filter_map(|entry| key_of(&entry.path()))
            .collect();
        found.sort();
        found
    }

    /// The file backing `key`.
    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{CACHE_PREFIX}{key}.json"))
    }
}

/// Extracts the cache key from a file path, if it belongs to our namespace.
fn key_of(path: &Path) -> Option<String> {
    if path.extension()? != "json" {
        return None;
    }
    let stem = path.file_stem()?.to_str()?;
    stem.strip_prefix(CACHE_PREFIX).map(str::to_string)
}
