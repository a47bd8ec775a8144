#![forbid(unsafe_code)]

//! Inline style model.
//!
//! The engine only ever mutates *inline* declarations on host elements and
//! must be able to put them back exactly. [`InlineStyle`] is an ordered
//! declaration list that parses a host's `style` attribute text and
//! serializes back to it, so single-property edits do not disturb the rest
//! of the declarations.
//!
//! Restoration never goes through this model: the original attribute text is
//! kept verbatim and reapplied as-is.

use std::fmt;

/// One `property: value [!important]` declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Declaration {
    /// Lower-cased property name.
    pub property: String,
    /// Value text with surrounding whitespace trimmed.
    pub value: String,
    /// Whether the declaration carries `!important`.
    pub important: bool,
}

/// Ordered inline declarations of a single element.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InlineStyle {
    decls: Vec<Declaration>,
}

impl InlineStyle {
    /// Create an empty style.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse inline style text.
    ///
    /// Malformed fragments (no colon, empty property) are dropped. Semicolons
    /// inside parentheses or quotes do not split declarations. A later
    /// declaration of the same property replaces the earlier one, matching
    /// how hosts resolve duplicate inline declarations.
    #[must_use]
    pub fn parse(text: &str) -> Self {
        let mut style = Self::new();
        for fragment in split_declarations(text) {
            let Some((prop, value)) = fragment.split_once(':') else {
                continue;
            };
            let property = prop.trim().to_ascii_lowercase();
            if property.is_empty() {
                continue;
            }
            let mut value = value.trim();
            let mut important = false;
            if let Some(stripped) = strip_important(value) {
                value = stripped;
                important = true;
            }
            style.set(&property, value, important);
        }
        style
    }

    /// Look up a declaration.
    #[must_use]
    pub fn get(&self, property: &str) -> Option<&Declaration> {
        let property = property.to_ascii_lowercase();
        self.decls.iter().find(|d| d.property == property)
    }

    /// Look up just the value of a declaration.
    #[must_use]
    pub fn value(&self, property: &str) -> Option<&str> {
        self.get(property).map(|d| d.value.as_str())
    }

    /// Set a declaration, replacing an existing one in place or appending.
    pub fn set(&mut self, property: &str, value: &str, important: bool) {
        let property = property.to_ascii_lowercase();
        let value = value.trim().to_string();
        if let Some(existing) = self.decls.iter_mut().find(|d| d.property == property) {
            existing.value = value;
            existing.important = important;
        } else {
            self.decls.push(Declaration {
                property,
                value,
                important,
            });
        }
    }

    /// Remove a declaration, returning it if present.
    pub fn remove(&mut self, property: &str) -> Option<Declaration> {
        let property = property.to_ascii_lowercase();
        let idx = self.decls.iter().position(|d| d.property == property)?;
        Some(self.decls.remove(idx))
    }

    /// Number of declarations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.decls.len()
    }

    /// Whether there are no declarations.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.decls.is_empty()
    }

    /// Iterate declarations in source order.
    pub fn iter(&self) -> impl Iterator<Item = &Declaration> {
        self.decls.iter()
    }

    /// Serialize to `style` attribute text.
    #[must_use]
    pub fn to_css_text(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for InlineStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, decl) in self.decls.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{}: {}", decl.property, decl.value)?;
            if decl.important {
                f.write_str(" !important")?;
            }
            f.write_str(";")?;
        }
        Ok(())
    }
}

fn strip_important(value: &str) -> Option<&str> {
    let bang = value.rfind('!')?;
    let (head, tail) = value.split_at(bang);
    if tail[1..].trim().eq_ignore_ascii_case("important") {
        Some(head.trim_end())
    } else {
        None
    }
}

fn split_declarations(text: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut start = 0;
    for (i, c) in text.char_indices() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '"' | '\'') => quote = Some(c),
            (None, '(') => depth += 1,
            (None, ')') => depth = depth.saturating_sub(1),
            (None, ';') if depth == 0 => {
                out.push(&text[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    out.push(&text[start..]);
    out.into_iter().filter(|s| !s.trim().is_empty()).collect()
}

/// The three properties that can hide an element and that the visibility
/// enforcer is allowed to override.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HideProperty {
    Display,
    Visibility,
    Opacity,
}

impl HideProperty {
    /// All hide properties in override order.
    pub const ALL: [HideProperty; 3] = [
        HideProperty::Display,
        HideProperty::Visibility,
        HideProperty::Opacity,
    ];

    /// CSS property name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            HideProperty::Display => "display",
            HideProperty::Visibility => "visibility",
            HideProperty::Opacity => "opacity",
        }
    }
}

impl fmt::Display for HideProperty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Computed (effective) visibility-related style of an element.
#[derive(Debug, Clone, PartialEq)]
pub struct ComputedVisibility {
    pub display: String,
    pub visibility: String,
    pub opacity: f32,
}

impl Default for ComputedVisibility {
    fn default() -> Self {
        Self {
            display: "block".into(),
            visibility: "visible".into(),
            opacity: 1.0,
        }
    }
}

impl ComputedVisibility {
    /// Whether the given property currently hides the element.
    #[must_use]
    pub fn hides_via(&self, prop: HideProperty) -> bool {
        match prop {
            HideProperty::Display => self.display.eq_ignore_ascii_case("none"),
            HideProperty::Visibility => {
                self.visibility.eq_ignore_ascii_case("hidden")
                    || self.visibility.eq_ignore_ascii_case("collapse")
            }
            HideProperty::Opacity => self.opacity <= 0.0,
        }
    }

    /// Properties that currently hide the element, in override order.
    #[must_use]
    pub fn hiding_properties(&self) -> Vec<HideProperty> {
        HideProperty::ALL
            .into_iter()
            .filter(|p| self.hides_via(*p))
            .collect()
    }

    /// Whether no property hides the element.
    #[must_use]
    pub fn is_shown(&self) -> bool {
        HideProperty::ALL.into_iter().all(|p| !self.hides_via(p))
    }
}
