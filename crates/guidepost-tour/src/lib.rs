#![forbid(unsafe_code)]

//! Guidepost Tour
//!
//! Context-aware guided tours over a host UI the engine does not own.
//!
//! # Key Components
//!
//! - [`TourEngine`] - the host control surface and step state machine
//! - [`TourCatalog`] - contexts, steps, and per-context capability descriptors
//! - [`TourConfig`] - timings, storage keys, renderer labels
//! - [`Condition`] - declarative UI predicates used by readiness, guards,
//!   expansion and redirects
//! - [`VisibilityEnforcer`] - reversible forced visibility with exact
//!   restoration
//!
//! # How it fits together
//!
//! The host supplies a [`HostSurface`](guidepost_core::surface::HostSurface),
//! a [`Renderer`](guidepost_core::renderer::Renderer) and optionally a
//! [`Fullscreen`](guidepost_core::fullscreen::Fullscreen) through
//! [`HostBindings`]. It then forwards events (renderer lifecycle,
//! navigation, field changes, pointer input) and advances time with
//! [`TourEngine::advance_time`]. Nothing in this crate sleeps or spawns.

pub mod catalog;
pub mod condition;
pub mod config;
pub mod context;
pub mod drag;
pub mod engine;
pub mod environment;
pub mod error;
pub mod machine;
pub mod readiness;
pub mod seen;
pub mod validate;
pub mod visibility;

pub use catalog::{
    AdvanceGuard, AutoAction, ContextCapabilities, ContextId, EndHint, ExpansionLevel,
    ExpansionRule, LayoutOverride, ProtectSpec, RedirectRule, SeenPolicy, StepFlags, StepSpec,
    Text, TourCatalog, TourDefinition, VariantDefinition, VariantSource,
};
pub use condition::Condition;
pub use config::{ConfigError, RendererSettings, StagingPrompt, TourConfig};
pub use context::{ContextRule, PathPattern, ResolvedContext};
pub use drag::{DragController, PointerEvent};
pub use engine::{EngineStatus, HostBindings, TourEngine};
pub use environment::Environment;
pub use error::TourError;
pub use machine::{EndReason, ResetScope, StartOutcome, TourPhase, TourRun, TransitionReason};
pub use readiness::{ReadinessStatus, ReadinessWait};
pub use seen::{SeenKeys, SeenStore};
pub use validate::{ValidatedStep, ValidationReport};
pub use visibility::{EnsureVisible, StyleSnapshot, VisibilityEnforcer};
