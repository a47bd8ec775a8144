#![forbid(unsafe_code)]

//! Tour-safe host state and its exact restoration.
//!
//! While a tour runs, competing interactive surfaces lose pointer
//! interaction, layout offsets that would skew highlight positions are
//! overridden, and page scroll can be locked. The first override of an
//! element records its verbatim `style` attribute (or its absence), and
//! [`Environment::restore`] reverts exactly the overridden declarations.

use guidepost_core::ElementHandle;
use guidepost_core::renderer::Renderer;
use guidepost_core::style::InlineStyle;
use guidepost_core::surface::{self, HostResult, HostSurface};

use crate::catalog::ContextCapabilities;
use crate::error::TourError;

/// Inline state of one element before the first override.
#[derive(Debug, Clone, PartialEq, Eq)]
struct SavedElement {
    element: ElementHandle,
    /// Verbatim `style` attribute; `None` when it was absent.
    original: Option<String>,
    /// Overridden properties, in override order.
    properties: Vec<String>,
}

/// Saved environment state of one run.
#[derive(Debug, Default)]
pub struct Environment {
    saves: Vec<SavedElement>,
    target_interaction: Option<bool>,
}

impl Environment {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether anything is currently overridden.
    #[must_use]
    pub fn is_applied(&self) -> bool {
        !self.saves.is_empty() || self.target_interaction.is_some()
    }

    /// Enter the tour-safe state described by `caps`.
    ///
    /// Missing elements are skipped. Returns the number of overrides made.
    pub fn apply(&mut self, surface: &mut dyn HostSurface, caps: &ContextCapabilities) -> usize {
        let mut applied = 0;
        for locator in &caps.competing_surfaces {
            applied += usize::from(self.override_at(surface, locator, "pointer-events", "none"));
        }
        for layout in &caps.layout_overrides {
            applied += usize::from(self.override_at(
                surface,
                &layout.locator,
                &layout.property,
                &layout.value,
            ));
        }
        if caps.disable_page_scroll {
            applied += usize::from(self.override_at(surface, &caps.scroll_root, "overflow", "hidden"));
        }
        tracing::debug!(overrides = applied, "tour environment applied");
        applied
    }

    fn override_at(
        &mut self,
        surface: &mut dyn HostSurface,
        locator: &str,
        property: &str,
        value: &str,
    ) -> bool {
        let Some(el) = surface.resolve(locator) else {
            tracing::debug!(locator, property, "environment element missing, skipped");
            return false;
        };
        match self.override_property(surface, el, property, value) {
            Ok(()) => true,
            Err(err) => {
                tracing::warn!(locator, property, error = %err, "environment override failed");
                false
            }
        }
    }

    fn override_property(
        &mut self,
        surface: &mut dyn HostSurface,
        el: ElementHandle,
        property: &str,
        value: &str,
    ) -> HostResult<()> {
        let index = match self.saves.iter().position(|s| s.element == el) {
            Some(index) => index,
            None => {
                let original = surface.inline_style(el)?;
                self.saves.push(SavedElement {
                    element: el,
                    original,
                    properties: Vec::new(),
                });
                self.saves.len() - 1
            }
        };
        let save = &mut self.saves[index];
        let property = property.to_ascii_lowercase();
        if !save.properties.contains(&property) {
            save.properties.push(property.clone());
        }
        surface::set_inline_property(surface, el, &property, value, true)
    }

    /// Let the user interact with the highlighted target, or block it.
    pub fn set_target_interaction(&mut self, renderer: &mut dyn Renderer, enabled: bool) {
        if self.target_interaction != Some(enabled) {
            renderer.set_target_interaction(enabled);
            self.target_interaction = Some(enabled);
        }
    }

    /// Put every saved value back, most recently saved element first.
    pub fn restore(
        &mut self,
        surface: &mut dyn HostSurface,
        renderer: &mut dyn Renderer,
    ) -> Vec<TourError> {
        if self.target_interaction.take() == Some(true) {
            renderer.set_target_interaction(false);
        }
        let mut failures = Vec::new();
        while let Some(save) = self.saves.pop() {
            if let Err(source) = restore_element(surface, &save) {
                tracing::warn!(
                    element = %save.element,
                    properties = ?save.properties,
                    error = %source,
                    "environment restoration failed"
                );
                failures.push(TourError::RestorationFailure {
                    element: save.element,
                    source,
                });
            }
        }
        failures
    }
}

/// Reset the overridden properties to their original declarations.
///
/// When nothing else changed meanwhile the original attribute text is
/// written back verbatim, absence included. An element whose overrides are
/// already gone is left untouched. Otherwise only the overridden
/// declarations are reverted and the rest of the current text is kept.
fn restore_element(surface: &mut dyn HostSurface, save: &SavedElement) -> HostResult<()> {
    let original = InlineStyle::parse(save.original.as_deref().unwrap_or(""));
    let current = surface.inline_style(save.element)?;
    let before = InlineStyle::parse(current.as_deref().unwrap_or(""));
    let mut style = before.clone();
    for property in &save.properties {
        match original.get(property) {
            Some(decl) => style.set(&decl.property, &decl.value, decl.important),
            None => {
                style.remove(property);
            }
        }
    }
    if style == original {
        return surface.set_inline_style(save.element, save.original.as_deref());
    }
    if style == before {
        return Ok(());
    }
    surface.set_inline_style(save.element, Some(&style.to_css_text()))
}
