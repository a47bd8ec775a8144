#![forbid(unsafe_code)]

//! Scriptable fullscreen controller.
//!
//! Real fullscreen entry completes asynchronously, so by default a request
//! is accepted but nothing changes until the test calls
//! [`FakeFullscreen::engage`] (and then tells the engine through
//! `fullscreen_changed`).

use std::cell::RefCell;
use std::rc::Rc;

use guidepost_core::fullscreen::Fullscreen;

#[derive(Debug, Default)]
struct State {
    unsupported: bool,
    deny: bool,
    immediate: bool,
    active: bool,
    requests: usize,
    exits: usize,
    prompt: Option<(String, String)>,
    prompts_shown: usize,
}

/// Shared fake fullscreen controller.
#[derive(Debug, Clone, Default)]
pub struct FakeFullscreen {
    state: Rc<RefCell<State>>,
}

impl FakeFullscreen {
    /// Supported; requests are accepted and engage only on [`Self::engage`].
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests engage synchronously.
    #[must_use]
    pub fn immediate() -> Self {
        let fullscreen = Self::new();
        fullscreen.state.borrow_mut().immediate = true;
        fullscreen
    }

    /// Requests are refused.
    #[must_use]
    pub fn denying() -> Self {
        let fullscreen = Self::new();
        fullscreen.state.borrow_mut().deny = true;
        fullscreen
    }

    #[must_use]
    pub fn unsupported() -> Self {
        let fullscreen = Self::new();
        fullscreen.state.borrow_mut().unsupported = true;
        fullscreen
    }

    /// Host-side completion of a pending request.
    pub fn engage(&self) {
        self.state.borrow_mut().active = true;
    }

    /// Host-side exit (e.g. the user pressed Escape).
    pub fn disengage(&self) {
        self.state.borrow_mut().active = false;
    }

    #[must_use]
    pub fn requests(&self) -> usize {
        self.state.borrow().requests
    }

    #[must_use]
    pub fn exits(&self) -> usize {
        self.state.borrow().exits
    }

    /// Title and body of the visible staging prompt.
    #[must_use]
    pub fn prompt(&self) -> Option<(String, String)> {
        self.state.borrow().prompt.clone()
    }

    #[must_use]
    pub fn prompts_shown(&self) -> usize {
        self.state.borrow().prompts_shown
    }
}

impl Fullscreen for FakeFullscreen {
    fn is_supported(&self) -> bool {
        !self.state.borrow().unsupported
    }

    fn request_enter(&mut self) -> bool {
        let mut state = self.state.borrow_mut();
        if state.deny || state.unsupported {
            return false;
        }
        state.requests += 1;
        if state.immediate {
            state.active = true;
        }
        true
    }

    fn exit(&mut self) {
        let mut state = self.state.borrow_mut();
        if state.active {
            state.active = false;
            state.exits += 1;
        }
    }

    fn is_active(&self) -> bool {
        self.state.borrow().active
    }

    fn show_staging_prompt(&mut self, title: &str, body: &str) {
        let mut state = self.state.borrow_mut();
        state.prompt = Some((title.to_string(), body.to_string()));
        state.prompts_shown += 1;
    }

    fn hide_staging_prompt(&mut self) {
        self.state.borrow_mut().prompt = None;
    }
}
