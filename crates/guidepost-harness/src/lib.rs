#![forbid(unsafe_code)]

//! Test doubles for the Guidepost tour engine.
//!
//! - [`FakeSurface`] - shared in-memory host UI tree
//! - [`FakeRenderer`] - recording highlight renderer that draws its popovers
//!   on a [`FakeSurface`]
//! - [`FakeFullscreen`] - scriptable fullscreen controller
//! - [`FlakyStorage`] - storage backend whose writes can be switched off
//!
//! All fakes are cheap `Rc` handles: clone one into the engine and keep
//! another to drive and inspect it.

pub mod fullscreen;
pub mod renderer;
pub mod storage;
pub mod surface;

pub use fullscreen::FakeFullscreen;
pub use renderer::{FakeRenderer, POPOVER_LOCATOR, POPOVER_TITLE_LOCATOR, RendererCall};
pub use storage::FlakyStorage;
pub use surface::{ClickHandler, DEFAULT_VIEWPORT, FakeSurface};

// Re-export types useful for harness users.
pub use guidepost_core::geometry::{Point, Rect};
pub use guidepost_core::ElementHandle;
