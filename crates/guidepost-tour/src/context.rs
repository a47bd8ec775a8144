#![forbid(unsafe_code)]

//! Location → context resolution.

use std::fmt;

use guidepost_core::surface::HostSurface;
use serde::{Deserialize, Serialize};

use crate::catalog::{ContextId, TourCatalog};

/// How a rule matches the location path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "match", content = "value", rename_all = "snake_case")]
pub enum PathPattern {
    Exact(String),
    Prefix(String),
    Contains(String),
    Suffix(String),
}

impl PathPattern {
    #[must_use]
    pub fn matches(&self, path: &str) -> bool {
        match self {
            Self::Exact(p) => path == p,
            Self::Prefix(p) => path.starts_with(p.as_str()),
            Self::Contains(p) => path.contains(p.as_str()),
            Self::Suffix(p) => path.ends_with(p.as_str()),
        }
    }
}

/// One ordered resolution rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextRule {
    pub pattern: PathPattern,
    pub context: ContextId,
}

impl ContextRule {
    #[must_use]
    pub fn new(pattern: PathPattern, context: impl Into<ContextId>) -> Self {
        Self {
            pattern,
            context: context.into(),
        }
    }
}

/// A context refined by its runtime variant.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResolvedContext {
    pub id: ContextId,
    pub variant: Option<String>,
}

impl ResolvedContext {
    #[must_use]
    pub fn new(id: impl Into<ContextId>, variant: Option<&str>) -> Self {
        Self {
            id: id.into(),
            variant: variant.map(str::to_string),
        }
    }

    #[must_use]
    pub fn unknown() -> Self {
        Self::new(ContextId::unknown(), None)
    }
}

impl fmt::Display for ResolvedContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.variant {
            Some(v) => write!(f, "{}/{v}", self.id),
            None => write!(f, "{}", self.id),
        }
    }
}

/// Strip query and fragment from a location.
fn path_of(location: &str) -> &str {
    let end = location.find(['?', '#']).unwrap_or(location.len());
    &location[..end]
}

/// Context id for a location; first matching rule wins.
#[must_use]
pub fn resolve_id(catalog: &TourCatalog, location: &str) -> ContextId {
    let path = path_of(location);
    catalog
        .rules
        .iter()
        .find(|rule| rule.pattern.matches(path))
        .map(|rule| rule.context.clone())
        .unwrap_or_else(ContextId::unknown)
}

/// Variant of a context as selected by the live mode field.
#[must_use]
pub fn resolve_variant(
    catalog: &TourCatalog,
    id: &ContextId,
    surface: &dyn HostSurface,
) -> Option<String> {
    let source = catalog.definition(id)?.variants.as_ref()?;
    let value = surface.field_value(&source.field);
    source.select(value.as_deref()).map(str::to_string)
}

/// Full resolution against the current surface.
#[must_use]
pub fn resolve(catalog: &TourCatalog, surface: &dyn HostSurface) -> ResolvedContext {
    let id = resolve_id(catalog, &surface.location());
    let variant = resolve_variant(catalog, &id, surface);
    tracing::trace!(context = %id, variant = ?variant, "context resolved");
    ResolvedContext { id, variant }
}

/// Whether `locator` is the variant field of this context.
#[must_use]
pub fn is_variant_field(catalog: &TourCatalog, id: &ContextId, locator: &str) -> bool {
    catalog
        .definition(id)
        .and_then(|d| d.variants.as_ref())
        .is_some_and(|source| source.field == locator)
}
