#![forbid(unsafe_code)]

//! Guidepost Runtime
//!
//! Ambient services the tour engine consumes but does not own:
//!
//! - [`storage`] - flat key/value persistence ([`KeyValueStore`] over a
//!   pluggable [`StorageBackend`]).
//! - [`i18n`] - translation lookup with fallback text ([`Translator`],
//!   [`Catalog`]).

pub mod i18n;
pub mod storage;

pub use i18n::{Catalog, NoTranslations, Translator};
#[cfg(feature = "state-persistence")]
pub use storage::FileStorage;
pub use storage::{KeyValueStore, MemoryStorage, StorageBackend, StorageError, StorageResult};
