#![forbid(unsafe_code)]

//! Persistence of per-context "seen" flags.
//!
//! A context can have several physical keys: the primary key derived from
//! the context (and variant) id, historical keys, and a key shared with
//! other contexts. A context counts as seen if **any** of them is present;
//! completing a tour writes the primary key and the shared key.
//!
//! Values carry no meaning beyond presence.

use std::collections::BTreeSet;

use guidepost_runtime::{KeyValueStore, StorageResult};

use crate::catalog::{ContextId, SeenPolicy, TourCatalog};
use crate::context::ResolvedContext;

const MARKER: &str = "true";

/// Alias keys of one (context, variant).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeenKeys {
    pub primary: String,
    pub legacy: Vec<String>,
    pub shared: Option<String>,
}

impl SeenKeys {
    /// Every alias key, primary first.
    pub fn all(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.primary.as_str())
            .chain(self.legacy.iter().map(String::as_str))
            .chain(self.shared.as_deref())
    }

    fn derive(prefix: &str, context: &ResolvedContext, policy: &SeenPolicy) -> Self {
        let primary = match &context.variant {
            Some(variant) => format!("{prefix}{}_{variant}", context.id),
            None => format!("{prefix}{}", context.id),
        };
        Self {
            primary,
            legacy: policy.legacy_keys.clone(),
            shared: policy.shared_key.clone(),
        }
    }
}

/// Seen-flag adapter over a key/value store.
#[derive(Debug)]
pub struct SeenStore {
    store: KeyValueStore,
    prefix: String,
    hint_key: String,
}

impl SeenStore {
    #[must_use]
    pub fn new(store: KeyValueStore, prefix: impl Into<String>, hint_key: impl Into<String>) -> Self {
        Self {
            store,
            prefix: prefix.into(),
            hint_key: hint_key.into(),
        }
    }

    /// Alias keys of a resolved context.
    #[must_use]
    pub fn keys(&self, catalog: &TourCatalog, context: &ResolvedContext) -> SeenKeys {
        let definition = catalog.definition(&context.id);
        let policy = match (definition, context.variant.as_deref()) {
            (Some(def), Some(variant)) => def.variant(variant).map(|v| &v.seen),
            (Some(def), None) => Some(&def.seen),
            (None, _) => None,
        };
        let default_policy = SeenPolicy::default();
        SeenKeys::derive(&self.prefix, context, policy.unwrap_or(&default_policy))
    }

    /// Every alias key of a context across all its variants.
    fn context_keys(&self, catalog: &TourCatalog, id: &ContextId) -> BTreeSet<String> {
        let mut keys = BTreeSet::new();
        let base = ResolvedContext::new(id.clone(), None);
        keys.extend(self.keys(catalog, &base).all().map(str::to_string));
        let variants = catalog
            .definition(id)
            .and_then(|d| d.variants.as_ref())
            .map(|source| source.variants.as_slice())
            .unwrap_or_default();
        for variant in variants {
            let resolved = ResolvedContext::new(id.clone(), Some(&variant.id));
            keys.extend(self.keys(catalog, &resolved).all().map(str::to_string));
        }
        keys
    }

    /// Whether any alias key of the context is present.
    #[must_use]
    pub fn has(&self, catalog: &TourCatalog, context: &ResolvedContext) -> bool {
        self.keys(catalog, context).all().any(|k| self.store.contains(k))
    }

    /// Whether the context was seen under any of its variants.
    #[must_use]
    pub fn has_any(&self, catalog: &TourCatalog, id: &ContextId) -> bool {
        self.context_keys(catalog, id)
            .iter()
            .any(|k| self.store.contains(k))
    }

    /// Record completion: primary key plus shared key.
    pub fn mark_seen(&self, catalog: &TourCatalog, context: &ResolvedContext) -> StorageResult<()> {
        let keys = self.keys(catalog, context);
        self.store.set(keys.primary.as_str(), MARKER)?;
        if let Some(shared) = &keys.shared {
            self.store.set(shared.as_str(), MARKER)?;
        }
        tracing::debug!(context = %context, key = %keys.primary, "tour marked seen");
        Ok(())
    }

    /// Clear every alias key of a context, all variants included.
    pub fn reset(&self, catalog: &TourCatalog, id: &ContextId) -> StorageResult<()> {
        for key in self.context_keys(catalog, id) {
            self.store.remove(&key)?;
        }
        tracing::debug!(context = %id, "tour flags reset");
        Ok(())
    }

    /// Clear every key of every known context, any stray key under the
    /// prefix, and the hint flag.
    pub fn reset_all(&self, catalog: &TourCatalog) -> StorageResult<()> {
        let mut keys = BTreeSet::new();
        for id in catalog.known_contexts() {
            keys.extend(self.context_keys(catalog, id));
        }
        keys.extend(
            self.store
                .keys()
                .into_iter()
                .filter(|k| k.starts_with(&self.prefix)),
        );
        keys.insert(self.hint_key.clone());
        for key in keys {
            self.store.remove(&key)?;
        }
        tracing::debug!("all tour flags reset");
        Ok(())
    }

    /// Whether the one-time end-of-tour hint was shown.
    #[must_use]
    pub fn hint_shown(&self) -> bool {
        self.store.contains(&self.hint_key)
    }

    pub fn mark_hint_shown(&self) -> StorageResult<()> {
        self.store.set(self.hint_key.as_str(), MARKER)
    }

    #[must_use]
    pub fn store(&self) -> &KeyValueStore {
        &self.store
    }
}
