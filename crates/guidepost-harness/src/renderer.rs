#![forbid(unsafe_code)]

//! Recording renderer.
//!
//! [`FakeRenderer`] behaves like a small highlight library: it creates a
//! popover element on the shared [`FakeSurface`] for every shown step,
//! queues the lifecycle events a real renderer would emit, and records every
//! call the engine makes. Clones share state, so a test keeps one handle
//! while the engine owns another.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use guidepost_core::geometry::Rect;
use guidepost_core::renderer::{
    PopoverParts, RenderStep, Renderer, RendererError, RendererEvent, RendererOptions,
};
use guidepost_core::surface::HostSurface;

use crate::surface::FakeSurface;

/// Locator of the popover root created per step.
pub const POPOVER_LOCATOR: &str = ".guidepost-popover";
/// Locator of the popover title region.
pub const POPOVER_TITLE_LOCATOR: &str = ".guidepost-popover-title";

/// One call made on the renderer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RendererCall {
    Configure,
    SetSteps(usize),
    Start,
    ShowStep(usize),
    Refresh,
    Destroy,
    SetAdvanceEnabled(bool),
    SetTargetInteraction(bool),
}

#[derive(Debug)]
struct State {
    failure: Option<String>,
    options: Option<RendererOptions>,
    steps: Vec<RenderStep>,
    current: Option<usize>,
    advance_enabled: bool,
    target_interaction: bool,
    refreshes: usize,
    popover: Option<PopoverParts>,
    events: VecDeque<RendererEvent>,
    calls: Vec<RendererCall>,
}

/// Shared recording renderer.
#[derive(Debug, Clone)]
pub struct FakeRenderer {
    surface: FakeSurface,
    state: Rc<RefCell<State>>,
}

impl FakeRenderer {
    /// Renderer drawing its popovers on `surface`.
    #[must_use]
    pub fn new(surface: FakeSurface) -> Self {
        Self {
            surface,
            state: Rc::new(RefCell::new(State {
                failure: None,
                options: None,
                steps: Vec::new(),
                current: None,
                advance_enabled: true,
                target_interaction: false,
                refreshes: 0,
                popover: None,
                events: VecDeque::new(),
                calls: Vec::new(),
            })),
        }
    }

    /// Renderer whose `configure` fails with `reason`.
    #[must_use]
    pub fn failing(surface: FakeSurface, reason: &str) -> Self {
        let renderer = Self::new(surface);
        renderer.state.borrow_mut().failure = Some(reason.to_string());
        renderer
    }

    /// Drain queued lifecycle events, oldest first.
    pub fn take_events(&self) -> Vec<RendererEvent> {
        self.state.borrow_mut().events.drain(..).collect()
    }

    /// The user presses the advance control. Ignored while it is disabled.
    pub fn press_next(&self) -> bool {
        let mut state = self.state.borrow_mut();
        if state.current.is_none() || !state.advance_enabled {
            return false;
        }
        state.events.push_back(RendererEvent::Next);
        true
    }

    pub fn press_previous(&self) -> bool {
        let mut state = self.state.borrow_mut();
        if state.current.is_none() {
            return false;
        }
        state.events.push_back(RendererEvent::Previous);
        true
    }

    /// The user closes the tour.
    pub fn close(&self) {
        self.teardown();
    }

    #[must_use]
    pub fn steps(&self) -> Vec<RenderStep> {
        self.state.borrow().steps.clone()
    }

    #[must_use]
    pub fn current(&self) -> Option<usize> {
        self.state.borrow().current
    }

    #[must_use]
    pub fn advance_enabled(&self) -> bool {
        self.state.borrow().advance_enabled
    }

    #[must_use]
    pub fn target_interaction(&self) -> bool {
        self.state.borrow().target_interaction
    }

    #[must_use]
    pub fn refresh_count(&self) -> usize {
        self.state.borrow().refreshes
    }

    #[must_use]
    pub fn options(&self) -> Option<RendererOptions> {
        self.state.borrow().options.clone()
    }

    #[must_use]
    pub fn calls(&self) -> Vec<RendererCall> {
        self.state.borrow().calls.clone()
    }

    /// Number of recorded calls equal to `call`.
    #[must_use]
    pub fn count(&self, call: &RendererCall) -> usize {
        self.state.borrow().calls.iter().filter(|c| *c == call).count()
    }

    fn record(&self, call: RendererCall) {
        self.state.borrow_mut().calls.push(call);
    }

    fn show(&self, index: usize) {
        let target = {
            let state = self.state.borrow();
            match state.steps.get(index) {
                Some(step) => step.target.clone(),
                None => return,
            }
        };
        self.drop_popover();
        let element = self.surface.resolve(&target);
        let anchor = element
            .and_then(|el| self.surface.bounding_rect(el))
            .unwrap_or_default();
        let origin_y = anchor.y.saturating_add(anchor.height as i32).saturating_add(8);
        let root = self
            .surface
            .add(POPOVER_LOCATOR, Rect::new(anchor.x, origin_y, 320, 140));
        let header = self.surface.add_child(
            root,
            POPOVER_TITLE_LOCATOR,
            Rect::new(anchor.x, origin_y, 320, 28),
        );
        let mut state = self.state.borrow_mut();
        state.current = Some(index);
        state.popover = Some(PopoverParts {
            root,
            header: Some(header),
        });
        state
            .events
            .push_back(RendererEvent::Highlighted { index, element });
    }

    fn drop_popover(&self) {
        let old = self.state.borrow_mut().popover.take();
        if let Some(parts) = old {
            self.surface.detach(parts.root);
        }
    }

    fn teardown(&self) {
        if self.state.borrow().current.is_none() {
            return;
        }
        self.drop_popover();
        let mut state = self.state.borrow_mut();
        state.current = None;
        state.events.push_back(RendererEvent::Destroyed);
    }
}

impl Renderer for FakeRenderer {
    fn configure(&mut self, options: &RendererOptions) -> Result<(), RendererError> {
        self.record(RendererCall::Configure);
        let mut state = self.state.borrow_mut();
        if let Some(reason) = &state.failure {
            return Err(RendererError::Unavailable(reason.clone()));
        }
        state.options = Some(options.clone());
        Ok(())
    }

    fn set_steps(&mut self, steps: &[RenderStep]) {
        self.record(RendererCall::SetSteps(steps.len()));
        self.state.borrow_mut().steps = steps.to_vec();
    }

    fn start(&mut self) {
        self.record(RendererCall::Start);
        self.show(0);
    }

    fn show_step(&mut self, index: usize) {
        self.record(RendererCall::ShowStep(index));
        self.show(index);
    }

    fn current_step_index(&self) -> Option<usize> {
        self.state.borrow().current
    }

    fn refresh(&mut self) {
        self.record(RendererCall::Refresh);
        self.state.borrow_mut().refreshes += 1;
    }

    fn destroy(&mut self) {
        self.record(RendererCall::Destroy);
        self.teardown();
    }

    fn set_advance_enabled(&mut self, enabled: bool) {
        self.record(RendererCall::SetAdvanceEnabled(enabled));
        self.state.borrow_mut().advance_enabled = enabled;
    }

    fn set_target_interaction(&mut self, enabled: bool) {
        self.record(RendererCall::SetTargetInteraction(enabled));
        self.state.borrow_mut().target_interaction = enabled;
    }

    fn popover(&self) -> Option<PopoverParts> {
        self.state.borrow().popover
    }
}
