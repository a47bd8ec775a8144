#![forbid(unsafe_code)]

//! Engine configuration.
//!
//! [`TourConfig`] collects every timing constant and behavior knob of the
//! engine. All fields have defaults, so a JSON document only needs to name
//! what it changes:
//!
//! ```json
//! { "readiness_timeout_ms": 8000, "hiding_classes": ["hidden", "is-collapsed"] }
//! ```

use std::fmt;
use std::time::Duration;

use guidepost_core::renderer::RendererOptions;
use guidepost_runtime::Translator;
use serde::{Deserialize, Serialize};

use crate::catalog::Text;

/// Errors loading configuration or tour content.
#[derive(Debug)]
pub enum ConfigError {
    /// The document is not valid JSON for the expected shape.
    Parse(serde_json::Error),
    /// The document parsed but is inconsistent.
    Invalid(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Parse(e) => write!(f, "config parse error: {e}"),
            Self::Invalid(msg) => write!(f, "invalid config: {msg}"),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Parse(e) => Some(e),
            Self::Invalid(_) => None,
        }
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(e: serde_json::Error) -> Self {
        Self::Parse(e)
    }
}

/// Renderer settings before translation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RendererSettings {
    pub show_progress: bool,
    pub allow_close: bool,
    pub overlay_opacity: f32,
    pub stage_padding: u32,
    pub animate: bool,
    pub next_label: Text,
    pub prev_label: Text,
    pub done_label: Text,
}

impl Default for RendererSettings {
    fn default() -> Self {
        let defaults = RendererOptions::default();
        Self {
            show_progress: defaults.show_progress,
            allow_close: defaults.allow_close,
            overlay_opacity: defaults.overlay_opacity,
            stage_padding: defaults.stage_padding,
            animate: defaults.animate,
            next_label: Text::keyed("tour.next", defaults.next_label),
            prev_label: Text::keyed("tour.prev", defaults.prev_label),
            done_label: Text::keyed("tour.done", defaults.done_label),
        }
    }
}

impl RendererSettings {
    /// Renderer options with labels translated.
    pub fn to_options(&self, translator: &dyn Translator) -> RendererOptions {
        RendererOptions {
            show_progress: self.show_progress,
            allow_close: self.allow_close,
            overlay_opacity: self.overlay_opacity.clamp(0.0, 1.0),
            stage_padding: self.stage_padding,
            animate: self.animate,
            next_label: self.next_label.resolve(translator),
            prev_label: self.prev_label.resolve(translator),
            done_label: self.done_label.resolve(translator),
        }
    }
}

/// Text of the blocking fullscreen staging prompt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StagingPrompt {
    pub title: Text,
    pub body: Text,
}

impl Default for StagingPrompt {
    fn default() -> Self {
        Self {
            title: Text::keyed("tour.fullscreen.title", "Fullscreen tour"),
            body: Text::keyed(
                "tour.fullscreen.body",
                "This tour runs in fullscreen. Continue to enter fullscreen and start.",
            ),
        }
    }
}

/// Timing constants and behavior knobs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TourConfig {
    /// Readiness poll interval.
    pub readiness_poll_ms: u64,
    /// Readiness bound when the context does not set one.
    pub readiness_timeout_ms: u64,
    /// Advancement guard poll interval.
    pub guard_poll_ms: u64,
    /// Unmet guards give up and re-enable advancing after this long.
    pub guard_timeout_ms: u64,
    /// Fallback if fullscreen never engages.
    pub fullscreen_timeout_ms: u64,
    pub expansion_retry_ms: u64,
    pub expansion_max_attempts: u32,
    /// Delay before a step's automatic action.
    pub auto_action_delay_ms: u64,
    /// Delay between an automatic action and the position refresh.
    pub post_action_refresh_ms: u64,
    /// Refreshes for steps whose target appears dynamically.
    pub dynamic_refresh_ms: Vec<u64>,
    /// Single refresh after an ordinary step is shown.
    pub refresh_delay_ms: u64,
    /// Refresh after scrolling a highlighted target into view.
    pub highlight_refresh_ms: u64,
    /// Delay before restarting after a sub-context change.
    pub settle_delay_ms: u64,
    /// Protection interval when the context does not set one.
    pub protect_interval_ms: u64,
    /// Prefix of per-context seen keys.
    pub seen_key_prefix: String,
    /// Key of the one-time end-of-tour hint flag.
    pub hint_key: String,
    /// Classes removed from a target to reveal it.
    pub hiding_classes: Vec<String>,
    /// Display value forced onto `display: none` targets.
    pub forced_display: String,
    /// Attribute marking elements the engine forced visible.
    pub marker_attribute: String,
    pub renderer: RendererSettings,
    pub staging_prompt: StagingPrompt,
}

impl Default for TourConfig {
    fn default() -> Self {
        Self {
            readiness_poll_ms: 100,
            readiness_timeout_ms: 5000,
            guard_poll_ms: 300,
            guard_timeout_ms: 30_000,
            fullscreen_timeout_ms: 2000,
            expansion_retry_ms: 150,
            expansion_max_attempts: 10,
            auto_action_delay_ms: 300,
            post_action_refresh_ms: 300,
            dynamic_refresh_ms: vec![200, 600, 1000],
            refresh_delay_ms: 100,
            highlight_refresh_ms: 50,
            settle_delay_ms: 500,
            protect_interval_ms: 200,
            seen_key_prefix: "guidepost_seen_".into(),
            hint_key: "guidepost_end_hint_shown".into(),
            hiding_classes: vec!["hidden".into()],
            forced_display: "block".into(),
            marker_attribute: "data-guidepost-forced".into(),
            renderer: RendererSettings::default(),
            staging_prompt: StagingPrompt::default(),
        }
    }
}

impl TourConfig {
    /// Parse from JSON; missing fields take their defaults.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.readiness_poll_ms == 0 || self.guard_poll_ms == 0 {
            return Err(ConfigError::Invalid("poll intervals must be non-zero".into()));
        }
        if self.guard_timeout_ms == 0 {
            return Err(ConfigError::Invalid("guard_timeout_ms must be non-zero".into()));
        }
        if self.expansion_max_attempts == 0 {
            return Err(ConfigError::Invalid(
                "expansion_max_attempts must be at least 1".into(),
            ));
        }
        if self.seen_key_prefix.is_empty() {
            return Err(ConfigError::Invalid("seen_key_prefix must not be empty".into()));
        }
        Ok(())
    }

    #[must_use]
    pub fn with_readiness_timeout(mut self, timeout: Duration) -> Self {
        self.readiness_timeout_ms = duration_ms(timeout);
        self
    }

    #[must_use]
    pub fn with_guard_poll(mut self, interval: Duration) -> Self {
        self.guard_poll_ms = duration_ms(interval).max(1);
        self
    }

    #[must_use]
    pub fn with_guard_timeout(mut self, timeout: Duration) -> Self {
        self.guard_timeout_ms = duration_ms(timeout).max(1);
        self
    }

    #[must_use]
    pub fn with_protect_interval(mut self, interval: Duration) -> Self {
        self.protect_interval_ms = duration_ms(interval).max(1);
        self
    }

    #[must_use]
    pub fn with_seen_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.seen_key_prefix = prefix.into();
        self
    }

    #[must_use]
    pub fn with_hiding_classes(mut self, classes: Vec<String>) -> Self {
        self.hiding_classes = classes;
        self
    }

    pub fn readiness_poll(&self) -> Duration {
        Duration::from_millis(self.readiness_poll_ms)
    }

    pub fn guard_poll(&self) -> Duration {
        Duration::from_millis(self.guard_poll_ms)
    }

    pub fn guard_timeout(&self) -> Duration {
        Duration::from_millis(self.guard_timeout_ms)
    }

    pub fn fullscreen_timeout(&self) -> Duration {
        Duration::from_millis(self.fullscreen_timeout_ms)
    }

    pub fn expansion_retry(&self) -> Duration {
        Duration::from_millis(self.expansion_retry_ms)
    }

    pub fn auto_action_delay(&self) -> Duration {
        Duration::from_millis(self.auto_action_delay_ms)
    }

    pub fn post_action_refresh(&self) -> Duration {
        Duration::from_millis(self.post_action_refresh_ms)
    }

    pub fn refresh_delay(&self) -> Duration {
        Duration::from_millis(self.refresh_delay_ms)
    }

    pub fn highlight_refresh(&self) -> Duration {
        Duration::from_millis(self.highlight_refresh_ms)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }
}

fn duration_ms(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}
