#![forbid(unsafe_code)]

//! Tour content: contexts, steps, and per-context capability descriptors.
//!
//! A [`TourCatalog`] is static configuration. It maps locations to contexts
//! ([`ContextRule`]), and each context to a [`TourDefinition`] carrying its
//! ordered steps plus the hooks the state machine dispatches on:
//! [`ContextCapabilities`], an optional [`ExpansionRule`], [`AdvanceGuard`]s
//! and [`RedirectRule`]s. The state machine never compares context names; it
//! only asks the definition what it needs.
//!
//! Everything here deserializes from JSON:
//!
//! ```json
//! {
//!   "rules": [{ "pattern": { "match": "exact", "value": "/" }, "context": "home" }],
//!   "tours": [{
//!     "context": "home",
//!     "steps": [{ "target": "#chat", "title": "Chat", "description": "Talk here" }]
//!   }]
//! }
//! ```

use std::fmt;

use guidepost_runtime::Translator;
use serde::{Deserialize, Serialize};

use crate::condition::Condition;
use crate::config::ConfigError;
use crate::context::ContextRule;

/// Opaque identifier of a tour context.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContextId(String);

impl ContextId {
    /// Context used when no rule matches. It never has steps.
    pub const UNKNOWN: &'static str = "unknown";

    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn unknown() -> Self {
        Self::new(Self::UNKNOWN)
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn is_unknown(&self) -> bool {
        self.0 == Self::UNKNOWN
    }
}

impl fmt::Display for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ContextId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// User-visible text: either literal, or a translation key with fallback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Text {
    Plain(String),
    Keyed { key: String, fallback: String },
}

impl Text {
    #[must_use]
    pub fn keyed(key: impl Into<String>, fallback: impl Into<String>) -> Self {
        Self::Keyed {
            key: key.into(),
            fallback: fallback.into(),
        }
    }

    /// Resolve through the translator; plain text is returned as-is.
    pub fn resolve(&self, translator: &dyn Translator) -> String {
        match self {
            Self::Plain(text) => text.clone(),
            Self::Keyed { key, fallback } => translator.translate(key, fallback),
        }
    }
}

impl Default for Text {
    fn default() -> Self {
        Self::Plain(String::new())
    }
}

impl From<&str> for Text {
    fn from(text: &str) -> Self {
        Self::Plain(text.to_string())
    }
}

impl From<String> for Text {
    fn from(text: String) -> Self {
        Self::Plain(text)
    }
}

/// Action performed automatically shortly after a step is shown.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AutoAction {
    #[default]
    None,
    Click,
}

/// Behavioral flags of a step.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StepFlags {
    /// Keep the step even if its target does not exist yet (it appears
    /// dynamically during the tour).
    pub skip_initial_check: bool,
    /// Never force the target visible.
    pub skip_auto_show: bool,
    pub auto_action: AutoAction,
    /// Let the user interact with the highlighted element itself.
    pub enable_target_interaction: bool,
    /// Run the context's expansion routine before showing this step.
    pub needs_advanced_expansion: bool,
}

/// One tour step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepSpec {
    /// Target locator.
    pub target: String,
    #[serde(default)]
    pub title: Text,
    #[serde(default)]
    pub description: Text,
    #[serde(default)]
    pub flags: StepFlags,
    /// Clickable element for the auto action, looked up inside the target
    /// first. Defaults to the target itself.
    #[serde(default)]
    pub click_target: Option<String>,
    /// When set, the auto action is skipped while this holds. Otherwise an
    /// `aria-expanded="true"` click target counts as already satisfied.
    #[serde(default)]
    pub action_satisfied_when: Option<Condition>,
}

impl StepSpec {
    #[must_use]
    pub fn new(target: impl Into<String>, title: impl Into<Text>, description: impl Into<Text>) -> Self {
        Self {
            target: target.into(),
            title: title.into(),
            description: description.into(),
            flags: StepFlags::default(),
            click_target: None,
            action_satisfied_when: None,
        }
    }

    #[must_use]
    pub fn with_flags(mut self, flags: StepFlags) -> Self {
        self.flags = flags;
        self
    }

    #[must_use]
    pub fn skip_initial_check(mut self) -> Self {
        self.flags.skip_initial_check = true;
        self
    }

    #[must_use]
    pub fn skip_auto_show(mut self) -> Self {
        self.flags.skip_auto_show = true;
        self
    }

    #[must_use]
    pub fn auto_click(mut self, click_target: Option<&str>) -> Self {
        self.flags.auto_action = AutoAction::Click;
        self.click_target = click_target.map(str::to_string);
        self
    }

    #[must_use]
    pub fn interactive(mut self) -> Self {
        self.flags.enable_target_interaction = true;
        self
    }

    #[must_use]
    pub fn needs_expansion(mut self) -> Self {
        self.flags.needs_advanced_expansion = true;
        self
    }
}

/// A forced inline declaration on a host element for the duration of a tour.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayoutOverride {
    pub locator: String,
    pub property: String,
    pub value: String,
}

/// Periodic visibility re-assertion for a contested target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtectSpec {
    pub locator: String,
    /// Re-assertion interval; the configured default when absent.
    #[serde(default)]
    pub interval_ms: Option<u64>,
}

fn default_scroll_root() -> String {
    "body".to_string()
}

/// What a context needs from the environment while its tour runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContextCapabilities {
    /// Show the staging prompt and enter fullscreen before starting.
    pub needs_fullscreen: bool,
    /// Lock scrolling on [`Self::scroll_root`].
    pub disable_page_scroll: bool,
    /// Precondition awaited before the tour starts.
    pub readiness: Option<Condition>,
    /// Readiness bound; the configured default when absent.
    pub readiness_timeout_ms: Option<u64>,
    /// Surfaces whose pointer interaction is suspended during the tour.
    pub competing_surfaces: Vec<String>,
    pub layout_overrides: Vec<LayoutOverride>,
    pub protect: Option<ProtectSpec>,
    #[serde(default = "default_scroll_root")]
    pub scroll_root: String,
}

impl Default for ContextCapabilities {
    fn default() -> Self {
        Self {
            needs_fullscreen: false,
            disable_page_scroll: false,
            readiness: None,
            readiness_timeout_ms: None,
            competing_surfaces: Vec::new(),
            layout_overrides: Vec::new(),
            protect: None,
            scroll_root: default_scroll_root(),
        }
    }
}

/// One collapsible level on the way to nested targets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpansionLevel {
    /// Control that expands this level when clicked.
    pub toggle: String,
    /// Holds once the level is open.
    pub expanded_when: Condition,
}

/// Multi-level expansion precondition for steps flagged
/// `needs_advanced_expansion`. Levels are opened outermost first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpansionRule {
    pub levels: Vec<ExpansionLevel>,
}

/// Blocks the advance control on a step until a condition holds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdvanceGuard {
    /// Target locator of the guarded step.
    pub step: String,
    pub condition: Condition,
}

/// Jump to an earlier step when a step's precondition is violated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedirectRule {
    /// Target locator of the step being entered.
    pub step: String,
    /// Must hold to show the step.
    pub precondition: Condition,
    /// Target locator of the step that establishes the precondition.
    pub redirect_to: String,
}

/// Extra seen keys of a context.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SeenPolicy {
    /// Historical keys that still count as seen.
    pub legacy_keys: Vec<String>,
    /// Key shared with other contexts or variants; set on completion.
    pub shared_key: Option<String>,
}

/// A runtime sub-mode of a context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariantDefinition {
    pub id: String,
    /// Field values selecting this variant.
    pub values: Vec<String>,
    /// Variant steps; the context's own steps when absent.
    #[serde(default)]
    pub steps: Option<Vec<StepSpec>>,
    #[serde(default)]
    pub seen: SeenPolicy,
}

/// Live field whose value selects a context variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariantSource {
    /// Locator of the mode field.
    pub field: String,
    pub variants: Vec<VariantDefinition>,
    /// Variant used when the field is absent or matches nothing.
    #[serde(default)]
    pub default_variant: Option<String>,
}

impl VariantSource {
    /// Variant id selected by a field value.
    #[must_use]
    pub fn select(&self, value: Option<&str>) -> Option<&str> {
        value
            .and_then(|v| {
                self.variants
                    .iter()
                    .find(|variant| variant.values.iter().any(|candidate| candidate == v))
            })
            .map(|variant| variant.id.as_str())
            .or(self.default_variant.as_deref())
    }
}

/// Tour of one context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TourDefinition {
    pub context: ContextId,
    #[serde(default)]
    pub steps: Vec<StepSpec>,
    #[serde(default)]
    pub capabilities: ContextCapabilities,
    #[serde(default)]
    pub expansion: Option<ExpansionRule>,
    #[serde(default)]
    pub guards: Vec<AdvanceGuard>,
    #[serde(default)]
    pub redirects: Vec<RedirectRule>,
    #[serde(default)]
    pub seen: SeenPolicy,
    #[serde(default)]
    pub variants: Option<VariantSource>,
}

impl TourDefinition {
    #[must_use]
    pub fn new(context: impl Into<ContextId>, steps: Vec<StepSpec>) -> Self {
        Self {
            context: context.into(),
            steps,
            capabilities: ContextCapabilities::default(),
            expansion: None,
            guards: Vec::new(),
            redirects: Vec::new(),
            seen: SeenPolicy::default(),
            variants: None,
        }
    }

    #[must_use]
    pub fn with_capabilities(mut self, capabilities: ContextCapabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    #[must_use]
    pub fn with_expansion(mut self, rule: ExpansionRule) -> Self {
        self.expansion = Some(rule);
        self
    }

    #[must_use]
    pub fn with_guard(mut self, step: impl Into<String>, condition: Condition) -> Self {
        self.guards.push(AdvanceGuard {
            step: step.into(),
            condition,
        });
        self
    }

    #[must_use]
    pub fn with_redirect(
        mut self,
        step: impl Into<String>,
        precondition: Condition,
        redirect_to: impl Into<String>,
    ) -> Self {
        self.redirects.push(RedirectRule {
            step: step.into(),
            precondition,
            redirect_to: redirect_to.into(),
        });
        self
    }

    #[must_use]
    pub fn with_seen(mut self, seen: SeenPolicy) -> Self {
        self.seen = seen;
        self
    }

    #[must_use]
    pub fn with_variants(mut self, variants: VariantSource) -> Self {
        self.variants = Some(variants);
        self
    }

    /// Variant definition by id.
    #[must_use]
    pub fn variant(&self, id: &str) -> Option<&VariantDefinition> {
        self.variants
            .as_ref()
            .and_then(|source| source.variants.iter().find(|v| v.id == id))
    }

    /// Steps for a variant (or the base steps).
    #[must_use]
    pub fn steps_for(&self, variant: Option<&str>) -> &[StepSpec] {
        variant
            .and_then(|id| self.variant(id))
            .and_then(|v| v.steps.as_deref())
            .unwrap_or(&self.steps)
    }

    /// Guard installed on the step with this target.
    #[must_use]
    pub fn guard_for(&self, target: &str) -> Option<&AdvanceGuard> {
        self.guards.iter().find(|g| g.step == target)
    }

    /// Redirect rule for the step with this target.
    #[must_use]
    pub fn redirect_for(&self, target: &str) -> Option<&RedirectRule> {
        self.redirects.iter().find(|r| r.step == target)
    }
}

/// "Where to go next" step appended once to the entry context's tour.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndHint {
    pub entry_context: ContextId,
    pub step: StepSpec,
}

/// All tour content of an application.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TourCatalog {
    pub rules: Vec<ContextRule>,
    pub tours: Vec<TourDefinition>,
    pub end_hint: Option<EndHint>,
}

impl TourCatalog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a catalog from JSON.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let catalog: Self = serde_json::from_str(json)?;
        catalog.check()?;
        Ok(catalog)
    }

    #[must_use]
    pub fn with_rule(mut self, rule: ContextRule) -> Self {
        self.rules.push(rule);
        self
    }

    #[must_use]
    pub fn with_tour(mut self, tour: TourDefinition) -> Self {
        self.tours.push(tour);
        self
    }

    #[must_use]
    pub fn with_end_hint(mut self, entry_context: impl Into<ContextId>, step: StepSpec) -> Self {
        self.end_hint = Some(EndHint {
            entry_context: entry_context.into(),
            step,
        });
        self
    }

    /// Tour defined for a context.
    #[must_use]
    pub fn definition(&self, context: &ContextId) -> Option<&TourDefinition> {
        self.tours.iter().find(|t| &t.context == context)
    }

    /// Every context that has a tour, in declaration order.
    pub fn known_contexts(&self) -> impl Iterator<Item = &ContextId> {
        self.tours.iter().map(|t| &t.context)
    }

    /// Hint step to append for this context, if it is the entry context.
    #[must_use]
    pub fn hint_for(&self, context: &ContextId) -> Option<&StepSpec> {
        self.end_hint
            .as_ref()
            .filter(|hint| &hint.entry_context == context)
            .map(|hint| &hint.step)
    }

    /// Structural checks serde cannot express.
    fn check(&self) -> Result<(), ConfigError> {
        for (i, tour) in self.tours.iter().enumerate() {
            if tour.context.is_unknown() {
                return Err(ConfigError::Invalid(format!(
                    "tour #{i} uses the reserved context {:?}",
                    ContextId::UNKNOWN
                )));
            }
            if self.tours[..i].iter().any(|t| t.context == tour.context) {
                return Err(ConfigError::Invalid(format!(
                    "context {} is defined twice",
                    tour.context
                )));
            }
            let Some(source) = &tour.variants else {
                continue;
            };
            if let Some(default) = &source.default_variant {
                if !source.variants.iter().any(|v| &v.id == default) {
                    return Err(ConfigError::Invalid(format!(
                        "context {} names unknown default variant {default:?}",
                        tour.context
                    )));
                }
            }
        }
        Ok(())
    }
}
