#![forbid(unsafe_code)]

//! Storage backend with switchable failures.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

use guidepost_runtime::{MemoryStorage, StorageBackend, StorageError, StorageResult};

/// Memory-backed store whose writes fail while [`FlakyStorage::go_offline`]
/// is in effect. Clones share state.
#[derive(Debug, Clone, Default)]
pub struct FlakyStorage {
    inner: MemoryStorage,
    offline: Arc<AtomicBool>,
    failed_writes: Arc<RwLock<usize>>,
}

impl FlakyStorage {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn go_offline(&self) {
        self.offline.store(true, Ordering::SeqCst);
    }

    pub fn go_online(&self) {
        self.offline.store(false, Ordering::SeqCst);
    }

    /// Writes rejected so far.
    #[must_use]
    pub fn failed_writes(&self) -> usize {
        self.failed_writes.read().map(|g| *g).unwrap_or(0)
    }

    /// What actually reached the backend.
    #[must_use]
    pub fn snapshot(&self) -> HashMap<String, String> {
        self.inner.snapshot()
    }

    fn check(&self) -> StorageResult<()> {
        if !self.offline.load(Ordering::SeqCst) {
            return Ok(());
        }
        if let Ok(mut count) = self.failed_writes.write() {
            *count += 1;
        }
        Err(StorageError::Unavailable("storage offline".into()))
    }
}

impl StorageBackend for FlakyStorage {
    fn name(&self) -> &str {
        "FlakyStorage"
    }

    fn load_all(&self) -> StorageResult<HashMap<String, String>> {
        self.inner.load_all()
    }

    fn save_all(&self, entries: &HashMap<String, String>) -> StorageResult<()> {
        self.check()?;
        self.inner.save_all(entries)
    }

    fn clear(&self) -> StorageResult<()> {
        self.check()?;
        self.inner.clear()
    }

    fn is_available(&self) -> bool {
        !self.offline.load(Ordering::SeqCst)
    }
}
