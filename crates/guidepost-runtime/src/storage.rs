//! Flat key/value persistence for tour flags.
//!
//! The engine persists nothing but presence markers ("this tour was seen",
//! "the end-of-tour hint was shown"). This module provides the
//! [`StorageBackend`] abstraction those markers live in and the
//! [`KeyValueStore`] the engine talks to.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                      KeyValueStore                            │
//! │   - In-memory cache, synchronous get/set/remove               │
//! │   - Write-through: every mutation is flushed immediately      │
//! └──────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌──────────────────────────────────────────────────────────────┐
//! │                     StorageBackend                            │
//! │   - MemoryStorage: in-memory (testing, session scope)         │
//! │   - FileStorage: JSON file (requires state-persistence)       │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Design Invariants
//!
//! 1. **Graceful degradation**: Storage failures never panic; operations return `Result`
//!    and the in-memory cache stays authoritative for the session.
//! 2. **Atomic writes**: File storage uses write-rename so a crash never leaves a torn file.
//! 3. **Presence semantics**: A key is "set" when it exists; values are opaque markers.
//!
//! # Failure Modes
//!
//! | Failure | Cause | Behavior |
//! |---------|-------|----------|
//! | `StorageError::Io` | File I/O failure | Returns error, cache keeps the change |
//! | `StorageError::Serialization` | JSON encode/decode | Load returns empty, logged |
//! | `StorageError::Corruption` | Poisoned lock | Returns error |

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, RwLock};

// ─────────────────────────────────────────────────────────────────────────────
// Error Types
// ─────────────────────────────────────────────────────────────────────────────

/// Errors that can occur during storage operations.
#[derive(Debug)]
pub enum StorageError {
    /// I/O error during file operations.
    Io(std::io::Error),
    /// Serialization or deserialization error.
    #[cfg(feature = "state-persistence")]
    Serialization(String),
    /// Storage is corrupted or a lock was poisoned.
    Corruption(String),
    /// Backend is not available (e.g., read-only location).
    Unavailable(String),
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageError::Io(e) => write!(f, "I/O error: {e}"),
            #[cfg(feature = "state-persistence")]
            StorageError::Serialization(msg) => write!(f, "serialization error: {msg}"),
            StorageError::Corruption(msg) => write!(f, "storage corruption: {msg}"),
            StorageError::Unavailable(msg) => write!(f, "storage unavailable: {msg}"),
        }
    }
}

impl std::error::Error for StorageError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StorageError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for StorageError {
    fn from(e: std::io::Error) -> Self {
        StorageError::Io(e)
    }
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

// ─────────────────────────────────────────────────────────────────────────────
// Storage Backend Trait
// ─────────────────────────────────────────────────────────────────────────────

/// Pluggable flat key→string store.
///
/// # Implementation Notes
///
/// - `load_all` returns an empty map on first use.
/// - `save_all` replaces the whole contents (not a merge).
/// - `clear` removes everything the store holds.
pub trait StorageBackend: Send + Sync {
    /// Human-readable name for logging.
    fn name(&self) -> &str;

    /// Load every stored entry.
    fn load_all(&self) -> StorageResult<HashMap<String, String>>;

    /// Replace the stored contents.
    fn save_all(&self, entries: &HashMap<String, String>) -> StorageResult<()>;

    /// Remove every stored entry.
    fn clear(&self) -> StorageResult<()>;

    /// Check if the backend is available and functional.
    fn is_available(&self) -> bool {
        true
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Memory Storage (always available)
// ─────────────────────────────────────────────────────────────────────────────

/// In-memory backend: session-scoped flags and tests.
///
/// Clones share the same underlying map, so a test can keep a handle and
/// inspect what the engine wrote.
#[derive(Default, Clone)]
pub struct MemoryStorage {
    data: Arc<RwLock<HashMap<String, String>>>,
}

impl MemoryStorage {
    /// Create a new empty memory storage.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create memory storage pre-populated with entries.
    #[must_use]
    pub fn with_entries<K, V>(entries: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        let map = entries
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        Self {
            data: Arc::new(RwLock::new(map)),
        }
    }

    /// Snapshot of the stored map.
    #[must_use]
    pub fn snapshot(&self) -> HashMap<String, String> {
        self.data.read().map(|g| g.clone()).unwrap_or_default()
    }
}

impl StorageBackend for MemoryStorage {
    fn name(&self) -> &str {
        "MemoryStorage"
    }

    fn load_all(&self) -> StorageResult<HashMap<String, String>> {
        let guard = self
            .data
            .read()
            .map_err(|_| StorageError::Corruption("lock poisoned".into()))?;
        Ok(guard.clone())
    }

    fn save_all(&self, entries: &HashMap<String, String>) -> StorageResult<()> {
        let mut guard = self
            .data
            .write()
            .map_err(|_| StorageError::Corruption("lock poisoned".into()))?;
        *guard = entries.clone();
        Ok(())
    }

    fn clear(&self) -> StorageResult<()> {
        let mut guard = self
            .data
            .write()
            .map_err(|_| StorageError::Corruption("lock poisoned".into()))?;
        guard.clear();
        Ok(())
    }
}

impl fmt::Debug for MemoryStorage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let count = self.data.read().map(|g| g.len()).unwrap_or(0);
        f.debug_struct("MemoryStorage")
            .field("entries", &count)
            .finish()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// File Storage (requires state-persistence feature)
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(feature = "state-persistence")]
mod file_storage {
    use super::*;
    use serde::{Deserialize, Serialize};
    use std::fs::{self, File};
    use std::io::{BufReader, BufWriter, Write};
    use std::path::{Path, PathBuf};

    #[derive(Serialize, Deserialize)]
    struct FlagFile {
        format_version: u32,
        entries: HashMap<String, String>,
    }

    impl FlagFile {
        const FORMAT_VERSION: u32 = 1;
    }

    /// JSON file backend with atomic write-rename.
    ///
    /// ```json
    /// {
    ///   "format_version": 1,
    ///   "entries": { "guidepost_seen_home": "true" }
    /// }
    /// ```
    pub struct FileStorage {
        path: PathBuf,
    }

    impl FileStorage {
        /// Create a file storage at the given path.
        ///
        /// The file does not need to exist; it will be created on first save.
        #[must_use]
        pub fn new(path: impl AsRef<Path>) -> Self {
            Self {
                path: path.as_ref().to_path_buf(),
            }
        }

        /// Storage at `$XDG_STATE_HOME/guidepost/{app_name}/flags.json`,
        /// falling back to `~/.local/state` and then the working directory.
        #[must_use]
        pub fn default_for_app(app_name: &str) -> Self {
            let base = state_dir_or_fallback();
            let path = base.join("guidepost").join(app_name).join("flags.json");
            Self { path }
        }

        /// Location of the backing file.
        #[must_use]
        pub fn path(&self) -> &Path {
            &self.path
        }

        fn temp_path(&self) -> PathBuf {
            let mut tmp = self.path.clone();
            tmp.set_extension("json.tmp");
            tmp
        }
    }

    fn state_dir_or_fallback() -> PathBuf {
        if let Ok(state_home) = std::env::var("XDG_STATE_HOME") {
            return PathBuf::from(state_home);
        }
        if let Ok(home) = std::env::var("HOME") {
            return PathBuf::from(home).join(".local").join("state");
        }
        PathBuf::from(".")
    }

    impl StorageBackend for FileStorage {
        fn name(&self) -> &str {
            "FileStorage"
        }

        fn load_all(&self) -> StorageResult<HashMap<String, String>> {
            if !self.path.exists() {
                return Ok(HashMap::new());
            }

            let file = File::open(&self.path)?;
            let reader = BufReader::new(file);
            let flag_file: FlagFile = serde_json::from_reader(reader).map_err(|e| {
                StorageError::Serialization(format!("failed to parse flag file: {e}"))
            })?;

            if flag_file.format_version != FlagFile::FORMAT_VERSION {
                tracing::warn!(
                    stored = flag_file.format_version,
                    expected = FlagFile::FORMAT_VERSION,
                    "flag file format version mismatch, ignoring stored flags"
                );
                return Ok(HashMap::new());
            }

            Ok(flag_file.entries)
        }

        fn save_all(&self, entries: &HashMap<String, String>) -> StorageResult<()> {
            if let Some(parent) = self.path.parent() {
                fs::create_dir_all(parent)?;
            }

            let flag_file = FlagFile {
                format_version: FlagFile::FORMAT_VERSION,
                entries: entries.clone(),
            };

            let tmp_path = self.temp_path();
            {
                let file = File::create(&tmp_path)?;
                let mut writer = BufWriter::new(file);
                serde_json::to_writer_pretty(&mut writer, &flag_file).map_err(|e| {
                    StorageError::Serialization(format!("failed to serialize flags: {e}"))
                })?;
                writer.flush()?;
                writer.get_ref().sync_all()?;
            }
            fs::rename(&tmp_path, &self.path)?;

            tracing::debug!(
                path = %self.path.display(),
                entries = entries.len(),
                "saved tour flags"
            );
            Ok(())
        }

        fn clear(&self) -> StorageResult<()> {
            if self.path.exists() {
                fs::remove_file(&self.path)?;
            }
            Ok(())
        }

        fn is_available(&self) -> bool {
            match self.path.parent() {
                Some(parent) if !parent.as_os_str().is_empty() => {
                    parent.exists() || fs::create_dir_all(parent).is_ok()
                }
                _ => true,
            }
        }
    }

    impl fmt::Debug for FileStorage {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.debug_struct("FileStorage")
                .field("path", &self.path)
                .finish()
        }
    }
}

#[cfg(feature = "state-persistence")]
pub use file_storage::FileStorage;

// ─────────────────────────────────────────────────────────────────────────────
// Key/Value Store
// ─────────────────────────────────────────────────────────────────────────────

/// Synchronous, write-through key/value store over a [`StorageBackend`].
///
/// Reads are served from the cache. Every `set`/`remove` updates the cache
/// first and then writes the whole map through to the backend; a backend
/// failure is returned but the cached change is kept, so the session keeps
/// behaving consistently even when persistence is broken.
pub struct KeyValueStore {
    backend: Box<dyn StorageBackend>,
    cache: RwLock<HashMap<String, String>>,
}

impl KeyValueStore {
    /// Create a store and load the backend's current contents.
    ///
    /// A failing load is logged and the store starts empty.
    #[must_use]
    pub fn new(backend: Box<dyn StorageBackend>) -> Self {
        let initial = match backend.load_all() {
            Ok(entries) => entries,
            Err(err) => {
                tracing::warn!(backend = %backend.name(), error = %err, "failed to load stored flags");
                HashMap::new()
            }
        };
        tracing::debug!(backend = %backend.name(), count = initial.len(), "loaded tour flags");
        Self {
            backend,
            cache: RwLock::new(initial),
        }
    }

    /// Create a store over fresh memory storage.
    #[must_use]
    pub fn in_memory() -> Self {
        Self::new(Box::new(MemoryStorage::new()))
    }

    /// Create a store over file storage at the given path.
    #[cfg(feature = "state-persistence")]
    #[must_use]
    pub fn with_file(path: impl AsRef<std::path::Path>) -> Self {
        Self::new(Box::new(FileStorage::new(path)))
    }

    /// Re-read the backend, replacing the cache.
    pub fn reload(&self) -> StorageResult<usize> {
        let entries = self.backend.load_all()?;
        let count = entries.len();
        let mut cache = self
            .cache
            .write()
            .map_err(|_| StorageError::Corruption("cache lock poisoned".into()))?;
        *cache = entries;
        Ok(count)
    }

    /// Read a value.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<String> {
        self.cache.read().ok()?.get(key).cloned()
    }

    /// Whether a key is present.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.cache
            .read()
            .map(|c| c.contains_key(key))
            .unwrap_or(false)
    }

    /// Set a value and write through.
    pub fn set(&self, key: impl Into<String>, value: impl Into<String>) -> StorageResult<()> {
        {
            let mut cache = self
                .cache
                .write()
                .map_err(|_| StorageError::Corruption("cache lock poisoned".into()))?;
            cache.insert(key.into(), value.into());
        }
        self.write_through()
    }

    /// Remove a key and write through. Returns whether it existed.
    pub fn remove(&self, key: &str) -> StorageResult<bool> {
        let existed = {
            let mut cache = self
                .cache
                .write()
                .map_err(|_| StorageError::Corruption("cache lock poisoned".into()))?;
            cache.remove(key).is_some()
        };
        if existed {
            self.write_through()?;
        }
        Ok(existed)
    }

    /// Remove every key from both cache and backend.
    pub fn clear(&self) -> StorageResult<()> {
        self.backend.clear()?;
        if let Ok(mut cache) = self.cache.write() {
            cache.clear();
        }
        Ok(())
    }

    fn write_through(&self) -> StorageResult<()> {
        let cache = self
            .cache
            .read()
            .map_err(|_| StorageError::Corruption("cache lock poisoned".into()))?;
        self.backend.save_all(&cache)
    }

    /// All keys currently set.
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        self.cache
            .read()
            .map(|c| c.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Number of keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.cache.read().map(|c| c.len()).unwrap_or(0)
    }

    /// Whether no keys are set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Backend name for logging.
    #[must_use]
    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    /// Whether the backend reports itself usable.
    #[must_use]
    pub fn is_available(&self) -> bool {
        self.backend.is_available()
    }
}

impl fmt::Debug for KeyValueStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyValueStore")
            .field("backend", &self.backend.name())
            .field("entries", &self.len())
            .finish()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    /// Backend whose writes always fail.
    struct BrokenStorage;

    impl StorageBackend for BrokenStorage {
        fn name(&self) -> &str {
            "BrokenStorage"
        }

        fn load_all(&self) -> StorageResult<HashMap<String, String>> {
            Err(StorageError::Unavailable("offline".into()))
        }

        fn save_all(&self, _entries: &HashMap<String, String>) -> StorageResult<()> {
            Err(StorageError::Unavailable("offline".into()))
        }

        fn clear(&self) -> StorageResult<()> {
            Err(StorageError::Unavailable("offline".into()))
        }

        fn is_available(&self) -> bool {
            false
        }
    }

    #[test]
    fn memory_storage_basic_operations() {
        let storage = MemoryStorage::new();
        assert!(storage.load_all().unwrap().is_empty());

        let mut data = HashMap::new();
        data.insert("k".to_string(), "true".to_string());
        storage.save_all(&data).unwrap();
        assert_eq!(storage.load_all().unwrap()["k"], "true");

        storage.clear().unwrap();
        assert!(storage.load_all().unwrap().is_empty());
    }

    #[test]
    fn memory_storage_clones_share_data() {
        let storage = MemoryStorage::new();
        let observer = storage.clone();
        let store = KeyValueStore::new(Box::new(storage));
        store.set("flag", "true").unwrap();
        assert_eq!(observer.snapshot().get("flag").map(String::as_str), Some("true"));
    }

    #[test]
    fn store_loads_existing_entries() {
        let storage = MemoryStorage::with_entries([("legacy", "1")]);
        let store = KeyValueStore::new(Box::new(storage));
        assert!(store.contains("legacy"));
        assert_eq!(store.get("legacy").as_deref(), Some("1"));
    }

    #[test]
    fn store_set_remove_round_trip() {
        let store = KeyValueStore::in_memory();
        assert!(store.is_empty());
        store.set("a", "true").unwrap();
        assert!(store.contains("a"));
        assert!(store.remove("a").unwrap());
        assert!(!store.remove("a").unwrap());
        assert!(!store.contains("a"));
    }

    #[test]
    fn store_keeps_cache_when_backend_fails() {
        let store = KeyValueStore::new(Box::new(BrokenStorage));
        assert!(store.is_empty());
        assert!(store.set("x", "true").is_err());
        assert!(store.contains("x"));
        assert!(!store.is_available());
    }

    #[test]
    fn store_clear() {
        let store = KeyValueStore::in_memory();
        store.set("a", "1").unwrap();
        store.set("b", "1").unwrap();
        store.clear().unwrap();
        assert!(store.is_empty());
    }

    #[test]
    fn storage_error_display() {
        let io_err = StorageError::Io(std::io::Error::new(std::io::ErrorKind::NotFound, "missing"));
        assert!(io_err.to_string().contains("I/O error"));
        let corrupt = StorageError::Corruption("bad data".into());
        assert!(corrupt.to_string().contains("corruption"));
        let unavail = StorageError::Unavailable("no backend".into());
        assert!(unavail.to_string().contains("unavailable"));
    }
}
