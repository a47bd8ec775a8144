#![forbid(unsafe_code)]

//! Fullscreen presentation capability.
//!
//! Vendor prefixes and API differences live entirely in the host's
//! implementation. Entry is asynchronous: [`Fullscreen::request_enter`] only
//! issues the request; the host reports the actual change later through the
//! engine's fullscreen-change input.

/// Fullscreen presentation mode.
pub trait Fullscreen {
    /// Whether the host can present fullscreen at all.
    fn is_supported(&self) -> bool {
        true
    }

    /// Request fullscreen. Returns `false` if the request could not even be
    /// issued (unsupported, denied synchronously).
    fn request_enter(&mut self) -> bool;

    /// Leave fullscreen if active.
    fn exit(&mut self);

    /// Whether fullscreen is currently engaged.
    fn is_active(&self) -> bool;

    /// Show the blocking "enter fullscreen to start the tour" prompt.
    fn show_staging_prompt(&mut self, title: &str, body: &str);

    /// Remove the prompt if it is shown.
    fn hide_staging_prompt(&mut self);
}

/// Fullscreen implementation for hosts without the capability.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoFullscreen;

impl Fullscreen for NoFullscreen {
    fn is_supported(&self) -> bool {
        false
    }

    fn request_enter(&mut self) -> bool {
        false
    }

    fn exit(&mut self) {}

    fn is_active(&self) -> bool {
        false
    }

    fn show_staging_prompt(&mut self, _title: &str, _body: &str) {}

    fn hide_staging_prompt(&mut self) {}
}
