#![forbid(unsafe_code)]

//! Live conditions over the host surface.
//!
//! Readiness requirements, advancement guards, redirect preconditions, and
//! expansion checks are all expressed as a [`Condition`] so they can be
//! declared in tour content and evaluated against whatever the surface
//! reports *right now*.

use guidepost_core::surface::{self, HostSurface};
use serde::{Deserialize, Serialize};

/// A predicate over the current host UI state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Condition {
    /// An element matching the locator exists.
    ElementExists { locator: String },
    /// An element matching the locator exists and is rendered.
    ElementVisible { locator: String },
    /// At least one element matches (a dynamically populated list has its
    /// first item).
    CollectionNonEmpty { locator: String },
    /// A form field has a non-blank value.
    FieldNonEmpty { locator: String },
    /// A form field has exactly this value.
    FieldEquals { locator: String, value: String },
    /// An element carries an attribute with the given value.
    AttributeEquals {
        locator: String,
        name: String,
        value: String,
    },
    /// An element carries a class.
    HasClass { locator: String, class: String },
    /// Every inner condition holds (vacuously true when empty).
    All { conditions: Vec<Condition> },
    /// Some inner condition holds (false when empty).
    Any { conditions: Vec<Condition> },
    /// The inner condition does not hold.
    Not { condition: Box<Condition> },
}

impl Condition {
    /// Shorthand for [`Condition::ElementExists`].
    #[must_use]
    pub fn exists(locator: impl Into<String>) -> Self {
        Self::ElementExists {
            locator: locator.into(),
        }
    }

    /// Shorthand for [`Condition::ElementVisible`].
    #[must_use]
    pub fn visible(locator: impl Into<String>) -> Self {
        Self::ElementVisible {
            locator: locator.into(),
        }
    }

    /// Shorthand for [`Condition::FieldNonEmpty`].
    #[must_use]
    pub fn field_non_empty(locator: impl Into<String>) -> Self {
        Self::FieldNonEmpty {
            locator: locator.into(),
        }
    }

    /// Shorthand for [`Condition::AttributeEquals`].
    #[must_use]
    pub fn attribute(
        locator: impl Into<String>,
        name: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        Self::AttributeEquals {
            locator: locator.into(),
            name: name.into(),
            value: value.into(),
        }
    }

    /// Negate a condition.
    #[must_use]
    pub fn negate(self) -> Self {
        Self::Not {
            condition: Box::new(self),
        }
    }

    /// Evaluate against the surface.
    pub fn evaluate(&self, surface: &dyn HostSurface) -> bool {
        match self {
            Self::ElementExists { locator } => surface.resolve(locator).is_some(),
            Self::ElementVisible { locator } => surface
                .resolve(locator)
                .is_some_and(|el| surface::is_visible(surface, el)),
            Self::CollectionNonEmpty { locator } => surface.count(locator) > 0,
            Self::FieldNonEmpty { locator } => surface
                .field_value(locator)
                .is_some_and(|v| !v.trim().is_empty()),
            Self::FieldEquals { locator, value } => {
                surface.field_value(locator).as_deref() == Some(value.as_str())
            }
            Self::AttributeEquals {
                locator,
                name,
                value,
            } => surface
                .resolve(locator)
                .and_then(|el| surface.attribute(el, name))
                .is_some_and(|v| v == *value),
            Self::HasClass { locator, class } => surface
                .resolve(locator)
                .is_some_and(|el| surface::has_class(surface, el, class)),
            Self::All { conditions } => conditions.iter().all(|c| c.evaluate(surface)),
            Self::Any { conditions } => conditions.iter().any(|c| c.evaluate(surface)),
            Self::Not { condition } => !condition.evaluate(surface),
        }
    }
}
