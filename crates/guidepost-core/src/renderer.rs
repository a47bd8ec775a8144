#![forbid(unsafe_code)]

//! Contract to the external highlight/popover renderer.
//!
//! The renderer owns the overlay, the popover markup, and the navigation
//! buttons. The engine tells it which steps exist and which one to show; the
//! renderer reports lifecycle notifications back as [`RendererEvent`] values
//! that the host forwards to the engine.
//!
//! The renderer recreates the popover element on every step, so anything the
//! engine attaches to it (drag handling) must be re-attached after each
//! [`RendererEvent::Highlighted`].

use std::fmt;

use crate::element::ElementHandle;

/// Renderer-level options applied once per run.
#[derive(Debug, Clone, PartialEq)]
pub struct RendererOptions {
    /// Show the step counter ("2 of 7").
    pub show_progress: bool,
    /// Let clicks on the dimmed overlay close the tour.
    pub allow_close: bool,
    /// Overlay opacity, 0.0..=1.0.
    pub overlay_opacity: f32,
    /// Padding around the highlighted target, in pixels.
    pub stage_padding: u32,
    /// Animate transitions between steps.
    pub animate: bool,
    /// Navigation button labels (already translated).
    pub next_label: String,
    pub prev_label: String,
    pub done_label: String,
}

impl Default for RendererOptions {
    fn default() -> Self {
        Self {
            show_progress: true,
            allow_close: true,
            overlay_opacity: 0.6,
            stage_padding: 6,
            animate: true,
            next_label: "Next".into(),
            prev_label: "Previous".into(),
            done_label: "Done".into(),
        }
    }
}

/// One step as handed to the renderer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderStep {
    /// Target locator.
    pub target: String,
    /// Popover title (translated).
    pub title: String,
    /// Popover body (translated).
    pub description: String,
}

/// Handles of the current popover markup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PopoverParts {
    /// The popover root element.
    pub root: ElementHandle,
    /// The title/header region, when the markup has one.
    pub header: Option<ElementHandle>,
}

/// Lifecycle notifications emitted by the renderer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RendererEvent {
    /// The user pressed the advance control.
    Next,
    /// The user pressed the back control.
    Previous,
    /// A step's target was highlighted and its popover is in place.
    Highlighted {
        index: usize,
        element: Option<ElementHandle>,
    },
    /// The renderer tore itself down (close, completion, or programmatic).
    Destroyed,
}

/// Renderer failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RendererError {
    /// The renderer could not be initialized at all.
    Unavailable(String),
}

impl fmt::Display for RendererError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unavailable(msg) => write!(f, "renderer unavailable: {msg}"),
        }
    }
}

impl std::error::Error for RendererError {}

/// Highlight/popover renderer.
pub trait Renderer {
    /// Apply options; an error here makes the engine inert.
    fn configure(&mut self, options: &RendererOptions) -> Result<(), RendererError>;

    /// Replace the step list.
    fn set_steps(&mut self, steps: &[RenderStep]);

    /// Start at step 0.
    fn start(&mut self);

    /// Show a specific step.
    fn show_step(&mut self, index: usize);

    /// Index of the currently shown step, if active.
    fn current_step_index(&self) -> Option<usize>;

    /// Recompute highlight and popover position.
    fn refresh(&mut self);

    /// Tear down overlay and popover.
    fn destroy(&mut self);

    /// Enable or disable the advance control.
    fn set_advance_enabled(&mut self, enabled: bool);

    /// Allow or block pointer interaction with the highlighted target.
    fn set_target_interaction(&mut self, enabled: bool);

    /// Current popover markup, if one is shown.
    fn popover(&self) -> Option<PopoverParts>;

    /// Whether the renderer is currently active.
    fn is_active(&self) -> bool {
        self.current_step_index().is_some()
    }
}
