#![forbid(unsafe_code)]

//! Target resolution and inline-state access on the host UI tree.
//!
//! [`HostSurface`] is the only way the engine sees or touches the host UI.
//! Reads are infallible and return `None` for elements that no longer exist;
//! writes return [`HostResult`] because an element can be detached between
//! the read that found it and the write that mutates it.
//!
//! # Inline style absence
//!
//! `inline_style` returns `Ok(None)` when the element carries no `style`
//! attribute at all, and `Ok(Some(""))` when it carries an empty one. The
//! two are distinct and restoration preserves the difference.

use std::fmt;

use crate::element::ElementHandle;
use crate::geometry::Rect;
use crate::style::{ComputedVisibility, InlineStyle};

/// Errors reported by host write operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostError {
    /// The element was removed from the tree.
    Detached(ElementHandle),
    /// The host refused the mutation.
    Rejected(String),
}

impl fmt::Display for HostError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Detached(el) => write!(f, "element {el} is detached"),
            Self::Rejected(msg) => write!(f, "host rejected mutation: {msg}"),
        }
    }
}

impl std::error::Error for HostError {}

/// Result type for host operations.
pub type HostResult<T> = Result<T, HostError>;

/// Live host UI tree as seen by the engine.
pub trait HostSurface {
    /// Current location (path) used for context resolution.
    fn location(&self) -> String;

    /// Resolve a locator to the first matching element.
    fn resolve(&self, locator: &str) -> Option<ElementHandle>;

    /// Resolve a locator among the descendants of `scope`.
    fn resolve_within(&self, scope: ElementHandle, locator: &str) -> Option<ElementHandle>;

    /// Number of elements matching a locator.
    fn count(&self, locator: &str) -> usize;

    /// Whether the element is still part of the tree.
    fn is_attached(&self, el: ElementHandle) -> bool;

    /// Effective display/visibility/opacity.
    fn computed_visibility(&self, el: ElementHandle) -> Option<ComputedVisibility>;

    /// Rendered bounding box in viewport coordinates.
    fn bounding_rect(&self, el: ElementHandle) -> Option<Rect>;

    /// Current viewport in the same coordinate space as `bounding_rect`.
    fn viewport(&self) -> Rect;

    /// Raw `style` attribute text (`None` when absent).
    fn inline_style(&self, el: ElementHandle) -> HostResult<Option<String>>;

    /// Replace the `style` attribute text; `None` removes the attribute.
    fn set_inline_style(&mut self, el: ElementHandle, text: Option<&str>) -> HostResult<()>;

    /// Class list in attribute order.
    fn class_list(&self, el: ElementHandle) -> HostResult<Vec<String>>;

    /// Replace the class list.
    fn set_class_list(&mut self, el: ElementHandle, classes: &[String]) -> HostResult<()>;

    /// Read an attribute.
    fn attribute(&self, el: ElementHandle, name: &str) -> Option<String>;

    /// Set an attribute.
    fn set_attribute(&mut self, el: ElementHandle, name: &str, value: &str) -> HostResult<()>;

    /// Remove an attribute (no error when it is absent).
    fn remove_attribute(&mut self, el: ElementHandle, name: &str) -> HostResult<()>;

    /// Dispatch a click.
    fn click(&mut self, el: ElementHandle) -> HostResult<()>;

    /// Value of a form control (e.g. a mode selector).
    fn field_value(&self, locator: &str) -> Option<String>;

    /// Scroll so the element is inside the viewport.
    fn scroll_into_view(&mut self, el: ElementHandle) -> HostResult<()>;
}

/// Whether the element is rendered: computed style shows it and it has a
/// non-zero box.
pub fn is_visible(surface: &dyn HostSurface, el: ElementHandle) -> bool {
    let Some(computed) = surface.computed_visibility(el) else {
        return false;
    };
    if !computed.is_shown() {
        return false;
    }
    surface
        .bounding_rect(el)
        .is_some_and(|rect| !rect.is_empty())
}

/// Whether the element's box lies fully within the viewport.
pub fn is_in_viewport(surface: &dyn HostSurface, el: ElementHandle) -> bool {
    surface
        .bounding_rect(el)
        .is_some_and(|rect| surface.viewport().contains_rect(&rect))
}

/// Whether the element's class list contains `class`.
pub fn has_class(surface: &dyn HostSurface, el: ElementHandle, class: &str) -> bool {
    surface
        .class_list(el)
        .map(|list| list.iter().any(|c| c == class))
        .unwrap_or(false)
}

/// Read one inline declaration value.
pub fn inline_property(
    surface: &dyn HostSurface,
    el: ElementHandle,
    property: &str,
) -> HostResult<Option<String>> {
    let text = surface.inline_style(el)?;
    Ok(text.and_then(|t| InlineStyle::parse(&t).value(property).map(str::to_string)))
}

/// Set one inline declaration, leaving the others untouched.
pub fn set_inline_property(
    surface: &mut dyn HostSurface,
    el: ElementHandle,
    property: &str,
    value: &str,
    important: bool,
) -> HostResult<()> {
    let text = surface.inline_style(el)?.unwrap_or_default();
    let mut style = InlineStyle::parse(&text);
    style.set(property, value, important);
    surface.set_inline_style(el, Some(&style.to_css_text()))
}

/// Remove one inline declaration.
///
/// When it was the last declaration the `style` attribute is removed
/// entirely rather than left empty.
pub fn remove_inline_property(
    surface: &mut dyn HostSurface,
    el: ElementHandle,
    property: &str,
) -> HostResult<()> {
    let Some(text) = surface.inline_style(el)? else {
        return Ok(());
    };
    let mut style = InlineStyle::parse(&text);
    if style.remove(property).is_none() {
        return Ok(());
    }
    if style.is_empty() {
        surface.set_inline_style(el, None)
    } else {
        surface.set_inline_style(el, Some(&style.to_css_text()))
    }
}
