#![forbid(unsafe_code)]

//! Core: host contracts, geometry, deterministic time, and bounded polling.
//!
//! Everything the tour engine needs from its environment is expressed here as
//! a trait or a plain value type, so the engine itself never touches a real
//! UI tree:
//!
//! - [`surface::HostSurface`] resolves targets and reads/writes inline state.
//! - [`renderer::Renderer`] is the popover/highlight library contract.
//! - [`fullscreen::Fullscreen`] abstracts presentation-mode entry and exit.
//! - [`clock::DeterministicClock`] and [`scheduler::Scheduler`] model every
//!   suspension point as a timer with a concrete delay.
//! - [`poll::BoundedPoll`] is the single bounded polling primitive.

pub mod clock;
pub mod element;
pub mod fullscreen;
pub mod geometry;
pub mod logging;
pub mod poll;
pub mod renderer;
pub mod scheduler;
pub mod style;
pub mod surface;

// Re-export tracing macros at crate root for ergonomic use.
#[cfg(feature = "tracing")]
pub use logging::{debug, trace, warn};

pub use element::ElementHandle;
pub use geometry::{Point, Rect};
