#![forbid(unsafe_code)]

//! The tour engine: host control surface and state machine driver.
//!
//! [`TourEngine`] owns every collaborator it was constructed with and a
//! deterministic clock. The host feeds it events (renderer lifecycle,
//! navigation, field changes, fullscreen changes, pointer input) and
//! advances time with [`TourEngine::advance_time`]; every delayed behavior
//! is a scheduler task that re-reads current state when it fires.
//!
//! # Invariants
//!
//! - At most one [`TourRun`] (or pending start) exists; a concurrent start
//!   is rejected, never queued.
//! - A run drives only its validated step copy, never the catalog.
//! - Ending a run, for any reason, runs the full restoration sequence
//!   exactly once.
//! - Once the renderer fails to configure, every public operation is a
//!   no-op.

use std::time::Duration;

use guidepost_core::ElementHandle;
use guidepost_core::clock::DeterministicClock;
use guidepost_core::fullscreen::{Fullscreen, NoFullscreen};
use guidepost_core::poll::{BoundedPoll, PollOutcome};
use guidepost_core::renderer::{RenderStep, Renderer, RendererEvent};
use guidepost_core::scheduler::{Fired, Scheduler};
use guidepost_core::surface::{self, HostSurface};
use guidepost_runtime::{KeyValueStore, NoTranslations, StorageResult, Translator};
use tracing::{debug, error, info, trace, warn};

use crate::catalog::{AutoAction, ContextId, ExpansionRule, StepSpec, TourCatalog, TourDefinition};
use crate::config::TourConfig;
use crate::context::{self, ResolvedContext};
use crate::drag::{DragController, PointerEvent};
use crate::environment::Environment;
use crate::error::TourError;
use crate::machine::{
    EndReason, EngineTask, GuardWatch, PendingExpansion, PendingPhase, PendingStart, ResetScope,
    StartOutcome, TourPhase, TourRun, TransitionReason,
};
use crate::readiness::{ReadinessStatus, ReadinessWait};
use crate::seen::SeenStore;
use crate::validate;
use crate::visibility::VisibilityEnforcer;

/// Collaborators supplied by the host.
pub struct HostBindings {
    pub surface: Box<dyn HostSurface>,
    pub renderer: Box<dyn Renderer>,
    pub fullscreen: Box<dyn Fullscreen>,
    pub translator: Box<dyn Translator>,
}

impl HostBindings {
    /// Bindings without fullscreen support or translations.
    pub fn new(surface: impl HostSurface + 'static, renderer: impl Renderer + 'static) -> Self {
        Self {
            surface: Box::new(surface),
            renderer: Box::new(renderer),
            fullscreen: Box::new(NoFullscreen),
            translator: Box::new(NoTranslations),
        }
    }

    #[must_use]
    pub fn with_fullscreen(mut self, fullscreen: impl Fullscreen + 'static) -> Self {
        self.fullscreen = Box::new(fullscreen);
        self
    }

    #[must_use]
    pub fn with_translator(mut self, translator: impl Translator + 'static) -> Self {
        self.translator = Box::new(translator);
        self
    }
}

/// Snapshot of engine state for hosts and tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineStatus {
    pub phase: TourPhase,
    pub context: ResolvedContext,
    pub current_step: Option<usize>,
    pub step_count: usize,
    pub advance_blocked: bool,
    pub inert: bool,
}

/// Guided-tour orchestration engine.
pub struct TourEngine {
    config: TourConfig,
    catalog: TourCatalog,
    surface: Box<dyn HostSurface>,
    renderer: Box<dyn Renderer>,
    fullscreen: Box<dyn Fullscreen>,
    translator: Box<dyn Translator>,
    seen: SeenStore,
    clock: DeterministicClock,
    scheduler: Scheduler<EngineTask>,
    visibility: VisibilityEnforcer,
    environment: Environment,
    drag: DragController,
    context: ResolvedContext,
    run: Option<TourRun>,
    pending: Option<PendingStart>,
    next_id: u64,
    context_epoch: u64,
    tour_active: bool,
    inert: bool,
    diagnostics: Vec<TourError>,
}

impl TourEngine {
    /// Create an engine and configure the renderer.
    ///
    /// A renderer that fails to configure leaves the engine inert; the
    /// failure is logged and reported once through [`Self::take_diagnostics`].
    pub fn new(
        config: TourConfig,
        catalog: TourCatalog,
        host: HostBindings,
        store: KeyValueStore,
    ) -> Self {
        let HostBindings {
            surface,
            mut renderer,
            fullscreen,
            translator,
        } = host;
        let mut diagnostics = Vec::new();
        let options = config.renderer.to_options(translator.as_ref());
        let inert = match renderer.configure(&options) {
            Ok(()) => false,
            Err(err) => {
                error!(error = %err, "renderer unavailable, tour engine disabled");
                diagnostics.push(TourError::from(err));
                true
            }
        };
        let context = context::resolve(&catalog, surface.as_ref());
        let seen = SeenStore::new(store, config.seen_key_prefix.clone(), config.hint_key.clone());
        debug!(context = %context, backend = %seen.store().backend_name(), "tour engine ready");
        Self {
            visibility: VisibilityEnforcer::new(&config),
            config,
            catalog,
            surface,
            renderer,
            fullscreen,
            translator,
            seen,
            clock: DeterministicClock::new(),
            scheduler: Scheduler::new(),
            environment: Environment::new(),
            drag: DragController::new(),
            context,
            run: None,
            pending: None,
            next_id: 1,
            context_epoch: 0,
            tour_active: false,
            inert,
            diagnostics,
        }
    }

    // ── Host control surface ────────────────────────────────────────────

    /// Start the tour of the current context, ignoring the seen flag.
    pub fn start_tutorial(&mut self) -> StartOutcome {
        if self.inert {
            return StartOutcome::Inert;
        }
        if self.is_busy() {
            debug!("start rejected, tour already running");
            return StartOutcome::AlreadyRunning;
        }
        self.context = context::resolve(&self.catalog, self.surface.as_ref());
        self.begin(self.context.clone())
    }

    /// Page-load entry: start only if the current context is unseen.
    pub fn maybe_auto_start(&mut self) -> StartOutcome {
        if self.inert {
            return StartOutcome::Inert;
        }
        if self.is_busy() {
            return StartOutcome::AlreadyRunning;
        }
        self.context = context::resolve(&self.catalog, self.surface.as_ref());
        if self.seen.has(&self.catalog, &self.context) {
            debug!(context = %self.context, "tour already seen, not auto-starting");
            return StartOutcome::AlreadySeen;
        }
        self.begin(self.context.clone())
    }

    /// End any run, clear the current context's flags, and start afresh.
    pub fn restart_tutorial(&mut self) -> StartOutcome {
        if self.inert {
            return StartOutcome::Inert;
        }
        self.cancel_pending();
        self.end_run(EndReason::Restarted);
        self.context = context::resolve(&self.catalog, self.surface.as_ref());
        if let Err(err) = self.seen.reset(&self.catalog, &self.context.id) {
            warn!(context = %self.context, error = %err, "failed to reset tour flags");
        }
        self.begin(self.context.clone())
    }

    /// Restart the tour of the context already resolved, from its first
    /// step, keeping stored flags.
    pub fn restart_current_tutorial(&mut self) -> StartOutcome {
        if self.inert {
            return StartOutcome::Inert;
        }
        let context = self
            .run
            .as_ref()
            .map(|run| run.context.clone())
            .or_else(|| self.pending.as_ref().map(|p| p.context.clone()))
            .unwrap_or_else(|| self.context.clone());
        self.cancel_pending();
        self.end_run(EndReason::Restarted);
        self.begin(context)
    }

    /// Clear the seen flags of one context or of all of them.
    pub fn reset_page_tutorial(&mut self, scope: ResetScope) -> StorageResult<()> {
        if self.inert {
            return Ok(());
        }
        match scope {
            ResetScope::Current => self.seen.reset(&self.catalog, &self.context.id),
            ResetScope::Context(id) => self.seen.reset(&self.catalog, &id),
            ResetScope::All => self.seen.reset_all(&self.catalog),
        }
    }

    pub fn reset_all_tutorials(&mut self) -> StorageResult<()> {
        self.reset_page_tutorial(ResetScope::All)
    }

    /// Whether a context (the current one when `None`) was seen.
    #[must_use]
    pub fn has_seen_tutorial(&self, context: Option<&ContextId>) -> bool {
        match context {
            None => self.seen.has(&self.catalog, &self.context),
            Some(id) if *id == self.context.id => self.seen.has(&self.catalog, &self.context),
            Some(id) => self.seen.has_any(&self.catalog, id),
        }
    }

    // ── Host event inputs ───────────────────────────────────────────────

    /// The host location changed: end any tour and re-resolve the context.
    pub fn navigate(&mut self) -> ResolvedContext {
        if self.inert {
            return self.context.clone();
        }
        self.cancel_pending();
        self.end_run(EndReason::Navigated);
        self.context_epoch += 1;
        self.context = context::resolve(&self.catalog, self.surface.as_ref());
        debug!(context = %self.context, "navigated");
        self.context.clone()
    }

    /// A host field changed. When it selects the context variant and the
    /// new variant is unseen, a fresh start is scheduled after the settle
    /// delay.
    pub fn field_changed(&mut self, locator: &str) {
        if self.inert || !context::is_variant_field(&self.catalog, &self.context.id, locator) {
            return;
        }
        let variant = context::resolve_variant(&self.catalog, &self.context.id, self.surface.as_ref());
        if variant == self.context.variant {
            return;
        }
        self.context.variant = variant;
        self.context_epoch += 1;
        info!(context = %self.context, "sub-context changed");
        if self.seen.has(&self.catalog, &self.context) {
            return;
        }
        let now = self.clock.now();
        self.scheduler.schedule_after(
            now,
            self.config.settle_delay(),
            EngineTask::DeferredStart {
                epoch: self.context_epoch,
            },
        );
    }

    /// Lifecycle notification from the renderer.
    pub fn handle_renderer_event(&mut self, event: RendererEvent) {
        if self.inert {
            return;
        }
        trace!(event = ?event, "renderer event");
        match event {
            RendererEvent::Next => self.next(),
            RendererEvent::Previous => self.previous(),
            RendererEvent::Highlighted { index, element } => self.on_highlighted(index, element),
            // A restart destroys and restarts the renderer before the old
            // session's notification arrives.
            RendererEvent::Destroyed if self.renderer.is_active() => {
                trace!("destroy notification of an earlier session ignored");
            }
            RendererEvent::Destroyed => self.end_run(EndReason::Closed),
        }
    }

    /// Fullscreen engaged or disengaged.
    pub fn fullscreen_changed(&mut self, active: bool) {
        if self.inert {
            return;
        }
        let awaiting = matches!(
            self.pending.as_ref().map(|p| &p.phase),
            Some(PendingPhase::Fullscreen { .. })
        );
        if awaiting && active {
            if let Some(pending) = self.pending.take() {
                if let PendingPhase::Fullscreen { timer, .. } = pending.phase {
                    self.scheduler.cancel(timer);
                }
                debug!("fullscreen engaged");
                self.launch(pending.id, pending.context, pending.definition, true);
            }
            return;
        }
        if let Some(run) = self.run.as_mut() {
            if run.requested_fullscreen {
                run.entered_fullscreen = active;
            }
        }
    }

    /// The user accepted the fullscreen staging prompt.
    pub fn confirm_staging_prompt(&mut self) -> StartOutcome {
        if self.inert {
            return StartOutcome::Inert;
        }
        let confirming = matches!(
            self.pending.as_ref().map(|p| &p.phase),
            Some(PendingPhase::Confirmation)
        );
        if !confirming {
            return StartOutcome::NothingPending;
        }
        let Some(mut pending) = self.pending.take() else {
            return StartOutcome::NothingPending;
        };
        self.fullscreen.hide_staging_prompt();
        if !self.fullscreen.request_enter() {
            warn!("fullscreen request refused, starting without it");
            return self.launch(pending.id, pending.context, pending.definition, false);
        }
        if self.fullscreen.is_active() {
            return self.launch(pending.id, pending.context, pending.definition, true);
        }
        let now = self.clock.now();
        let timer = self.scheduler.schedule_after(
            now,
            self.config.fullscreen_timeout(),
            EngineTask::FullscreenTimeout { run: pending.id },
        );
        pending.phase = PendingPhase::Fullscreen { timer, since: now };
        self.pending = Some(pending);
        StartOutcome::AwaitingFullscreen
    }

    /// The user closed the staging prompt without accepting. The tour
    /// stays un-started and unseen.
    pub fn dismiss_staging_prompt(&mut self) {
        if self.inert {
            return;
        }
        let confirming = matches!(
            self.pending.as_ref().map(|p| &p.phase),
            Some(PendingPhase::Confirmation)
        );
        if confirming {
            info!("staging prompt dismissed");
            self.cancel_pending();
        }
    }

    /// Pointer input for popover dragging. Returns whether it was consumed.
    pub fn pointer(&mut self, event: PointerEvent) -> bool {
        if self.inert {
            return false;
        }
        self.drag.pointer(self.surface.as_mut(), event)
    }

    /// Advance time and fire every timer that comes due, in order.
    pub fn advance_time(&mut self, dt: Duration) {
        if self.inert {
            return;
        }
        let target = self.clock.now().saturating_add(dt);
        while let Some(fired) = self.scheduler.pop_due(target) {
            self.clock.set(fired.due);
            self.fire(fired);
        }
        self.clock.set(target);
    }

    /// Jump to a step of the running tour.
    pub fn jump_to(&mut self, index: usize) -> bool {
        let valid = !self.inert && self.run.as_ref().is_some_and(|run| index < run.len());
        if valid {
            self.transition(index, TransitionReason::Jump, 0);
        }
        valid
    }

    // ── Queries ─────────────────────────────────────────────────────────

    #[must_use]
    pub fn status(&self) -> EngineStatus {
        let phase = match (&self.run, &self.pending) {
            (Some(run), _) => run.phase(),
            (None, Some(pending)) => pending.tour_phase(),
            (None, None) => TourPhase::Idle,
        };
        EngineStatus {
            phase,
            context: self.context.clone(),
            current_step: self.run.as_ref().map(TourRun::current_index),
            step_count: self.run.as_ref().map_or(0, TourRun::len),
            advance_blocked: self.run.as_ref().is_some_and(TourRun::guard_active),
            inert: self.inert,
        }
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.run.is_some()
    }

    #[must_use]
    pub fn is_inert(&self) -> bool {
        self.inert
    }

    /// Whether the global "tour active" flag is set.
    #[must_use]
    pub fn is_tour_active(&self) -> bool {
        self.tour_active
    }

    #[must_use]
    pub fn run(&self) -> Option<&TourRun> {
        self.run.as_ref()
    }

    #[must_use]
    pub fn context(&self) -> &ResolvedContext {
        &self.context
    }

    #[must_use]
    pub fn now(&self) -> Duration {
        self.clock.now()
    }

    #[must_use]
    pub fn pending_timers(&self) -> usize {
        self.scheduler.len()
    }

    #[must_use]
    pub fn config(&self) -> &TourConfig {
        &self.config
    }

    #[must_use]
    pub fn catalog(&self) -> &TourCatalog {
        &self.catalog
    }

    /// Drain recorded non-fatal failures.
    pub fn take_diagnostics(&mut self) -> Vec<TourError> {
        std::mem::take(&mut self.diagnostics)
    }

    // ── Start path ──────────────────────────────────────────────────────

    fn is_busy(&self) -> bool {
        self.run.is_some() || self.pending.is_some()
    }

    fn allocate_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn begin(&mut self, context: ResolvedContext) -> StartOutcome {
        let Some(definition) = self.catalog.definition(&context.id).cloned() else {
            debug!(context = %context, "no tour for context");
            return StartOutcome::NoTour;
        };
        let id = self.allocate_id();
        if let Some(condition) = definition.capabilities.readiness.clone() {
            if !condition.evaluate(self.surface.as_ref()) {
                let now = self.clock.now();
                let timeout = definition
                    .capabilities
                    .readiness_timeout_ms
                    .unwrap_or(self.config.readiness_timeout_ms);
                let wait = ReadinessWait::new(
                    condition,
                    now,
                    self.config.readiness_poll(),
                    Duration::from_millis(timeout),
                );
                self.scheduler.schedule_after(
                    now,
                    self.config.readiness_poll(),
                    EngineTask::ReadinessPoll { run: id },
                );
                debug!(context = %context, timeout_ms = timeout, "waiting for readiness");
                self.pending = Some(PendingStart {
                    id,
                    context,
                    definition,
                    phase: PendingPhase::Readiness(wait),
                });
                return StartOutcome::WaitingForReadiness;
            }
        }
        self.after_readiness(id, context, definition)
    }

    fn after_readiness(
        &mut self,
        id: u64,
        context: ResolvedContext,
        definition: TourDefinition,
    ) -> StartOutcome {
        let steps = definition.steps_for(context.variant.as_deref());
        if validate::runnable_count(self.surface.as_ref(), steps) == 0 {
            info!(context = %context, "no runnable steps, tour not started");
            return StartOutcome::NoSteps;
        }
        let staging = definition.capabilities.needs_fullscreen
            && self.fullscreen.is_supported()
            && !self.fullscreen.is_active();
        if staging {
            let prompt = &self.config.staging_prompt;
            let title = prompt.title.resolve(self.translator.as_ref());
            let body = prompt.body.resolve(self.translator.as_ref());
            self.fullscreen.show_staging_prompt(&title, &body);
            debug!(context = %context, "awaiting staging confirmation");
            self.pending = Some(PendingStart {
                id,
                context,
                definition,
                phase: PendingPhase::Confirmation,
            });
            return StartOutcome::AwaitingConfirmation;
        }
        self.launch(id, context, definition, false)
    }

    fn hint_step(&self, context: &ContextId) -> Option<StepSpec> {
        if self.seen.hint_shown() {
            return None;
        }
        self.catalog.hint_for(context).cloned()
    }

    fn launch(
        &mut self,
        id: u64,
        context: ResolvedContext,
        definition: TourDefinition,
        requested_fullscreen: bool,
    ) -> StartOutcome {
        let hint = self.hint_step(&context.id);
        let steps = definition.steps_for(context.variant.as_deref()).to_vec();
        let report = validate::validate_steps(
            self.surface.as_mut(),
            &mut self.visibility,
            &steps,
            hint.as_ref(),
        );
        for locator in &report.dropped {
            self.diagnostics.push(TourError::MissingTarget {
                context: context.id.clone(),
                locator: locator.clone(),
            });
        }
        if report.is_empty() {
            info!(context = %context, "every step was filtered out, tour not started");
            if requested_fullscreen && self.fullscreen.is_active() {
                self.fullscreen.exit();
            }
            return StartOutcome::NoSteps;
        }

        let render_steps: Vec<RenderStep> = report
            .steps
            .iter()
            .map(|s| RenderStep {
                target: s.spec.target.clone(),
                title: s.spec.title.resolve(self.translator.as_ref()),
                description: s.spec.description.resolve(self.translator.as_ref()),
            })
            .collect();
        self.renderer.set_steps(&render_steps);

        self.tour_active = true;
        self.environment
            .apply(self.surface.as_mut(), &definition.capabilities);
        if let Some(protect) = &definition.capabilities.protect {
            let interval = Duration::from_millis(
                protect
                    .interval_ms
                    .unwrap_or(self.config.protect_interval_ms),
            );
            let now = self.clock.now();
            self.visibility.protect(
                &mut self.scheduler,
                now,
                &protect.locator,
                interval,
                EngineTask::Protect { run: id },
            );
        }

        let entered = requested_fullscreen && self.fullscreen.is_active();
        let count = report.steps.len();
        info!(context = %context, steps = count, hint = report.includes_hint, "tour started");
        self.run = Some(TourRun::new(
            id,
            context,
            definition,
            report,
            requested_fullscreen,
            entered,
        ));
        self.transition(0, TransitionReason::Start, 0);
        StartOutcome::Started { steps: count }
    }

    fn cancel_pending(&mut self) {
        let Some(pending) = self.pending.take() else {
            return;
        };
        match pending.phase {
            PendingPhase::Confirmation => self.fullscreen.hide_staging_prompt(),
            PendingPhase::Fullscreen { timer, .. } => {
                self.scheduler.cancel(timer);
                if self.fullscreen.is_active() {
                    self.fullscreen.exit();
                }
            }
            PendingPhase::Readiness(_) => {}
        }
        self.scheduler.retain(|task| task.run_id() != Some(pending.id));
        debug!(context = %pending.context, "pending start cancelled");
    }

    // ── Transitions ─────────────────────────────────────────────────────

    fn next(&mut self) {
        let Some(run) = self.run.as_ref() else {
            return;
        };
        if run.expansion.is_some() {
            debug!("advance ignored while expanding");
            return;
        }
        if let Some(guard) = &run.guard {
            if !guard.condition.evaluate(self.surface.as_ref()) {
                debug!("advance blocked by guard");
                return;
            }
            self.clear_guard();
        }
        let Some(run) = self.run.as_ref() else {
            return;
        };
        let index = run.current + 1;
        if index < run.len() {
            self.transition(index, TransitionReason::Next, 0);
        } else {
            self.renderer.destroy();
            self.end_run(EndReason::Completed);
        }
    }

    fn previous(&mut self) {
        let Some(run) = self.run.as_ref() else {
            return;
        };
        if run.current > 0 && run.expansion.is_none() {
            let index = run.current - 1;
            self.transition(index, TransitionReason::Previous, 0);
        }
    }

    /// Steps 1-2 of a transition; the rest runs in [`Self::enter_step`],
    /// possibly after expansion retries.
    fn transition(&mut self, index: usize, reason: TransitionReason, depth: u8) {
        self.clear_guard();
        let now = self.clock.now();
        let retry = self.config.expansion_retry();
        let max_attempts = self.config.expansion_max_attempts;
        let Some(run) = self.run.as_mut() else {
            return;
        };
        let Some(step) = run.step(index).cloned() else {
            return;
        };
        run.generation += 1;
        run.expansion = None;
        let generation = run.generation;
        let run_id = run.id;
        let rule = step
            .flags
            .needs_advanced_expansion
            .then(|| run.definition.expansion.clone())
            .flatten();

        if let Some(rule) = rule {
            if !self.expand(&rule) {
                let mut poll = BoundedPoll::with_attempts(now, retry, max_attempts);
                if let PollOutcome::Pending { retry_in } = poll.check(now, false) {
                    if let Some(run) = self.run.as_mut() {
                        run.expansion = Some(PendingExpansion {
                            index,
                            reason,
                            depth,
                            poll,
                        });
                    }
                    self.scheduler.schedule_after(
                        now,
                        retry_in,
                        EngineTask::ExpansionRetry {
                            run: run_id,
                            generation,
                        },
                    );
                    debug!(index, "waiting for expansion");
                    return;
                }
                warn!(index, "expansion precondition not met, showing step anyway");
            }
        }
        self.enter_step(index, reason, depth);
    }

    /// Open every collapsed level; true once all report expanded.
    fn expand(&mut self, rule: &ExpansionRule) -> bool {
        for level in &rule.levels {
            if level.expanded_when.evaluate(self.surface.as_ref()) {
                continue;
            }
            match self.surface.resolve(&level.toggle) {
                Some(toggle) => {
                    if let Err(err) = self.surface.click(toggle) {
                        warn!(toggle = %level.toggle, error = %err, "expansion click failed");
                    }
                }
                None => debug!(toggle = %level.toggle, "expansion toggle not present yet"),
            }
        }
        rule.levels
            .iter()
            .all(|level| level.expanded_when.evaluate(self.surface.as_ref()))
    }

    /// Steps 3-9 of a transition.
    fn enter_step(&mut self, index: usize, reason: TransitionReason, depth: u8) {
        let now = self.clock.now();
        let Some(run) = self.run.as_ref() else {
            return;
        };
        let Some(step) = run.step(index).cloned() else {
            return;
        };
        let run_id = run.id;
        let generation = run.generation;
        let context_id = run.context.id.clone();
        let guard = run.definition.guard_for(&step.target).cloned();
        let redirect = run.definition.redirect_for(&step.target).cloned();
        let redirect_index = redirect
            .as_ref()
            .map(|rule| run.index_of(&rule.redirect_to));

        // 3. Target interaction passthrough.
        self.environment
            .set_target_interaction(self.renderer.as_mut(), step.flags.enable_target_interaction);

        // 4. Advancement guard.
        if let Some(guard) = guard {
            if !guard.condition.evaluate(self.surface.as_ref()) {
                self.renderer.set_advance_enabled(false);
                let interval = self.config.guard_poll();
                let timeout = self.config.guard_timeout();
                let timer = self.scheduler.schedule_repeating(
                    now,
                    interval,
                    EngineTask::GuardPoll {
                        run: run_id,
                        generation,
                    },
                );
                if let Some(run) = self.run.as_mut() {
                    run.guard = Some(GuardWatch {
                        condition: guard.condition,
                        poll: BoundedPoll::with_timeout(now, interval, timeout),
                        timer,
                    });
                }
                debug!(index, "advance disabled until guard holds");
            }
        }

        // 5. Corrective redirect.
        if let (Some(rule), Some(target_index)) = (redirect, redirect_index) {
            if depth == 0 && !rule.precondition.evaluate(self.surface.as_ref()) {
                match target_index {
                    Some(to) if to != index => {
                        info!(from = index, to, "step precondition violated, redirecting");
                        self.transition(to, TransitionReason::Redirect, depth + 1);
                        return;
                    }
                    Some(_) => {}
                    None => {
                        warn!(
                            step = %step.target,
                            redirect_to = %rule.redirect_to,
                            "redirect target not in tour, showing step as is"
                        );
                        self.diagnostics.push(TourError::MissingTarget {
                            context: context_id.clone(),
                            locator: rule.redirect_to.clone(),
                        });
                    }
                }
            }
        }

        // 6. Target visibility.
        let element = self.surface.resolve(&step.target);
        match element {
            Some(el) => {
                if !step.flags.skip_auto_show && !surface::is_visible(self.surface.as_ref(), el) {
                    self.visibility.ensure_visible(self.surface.as_mut(), el);
                }
            }
            None if !step.flags.skip_initial_check => {
                warn!(target_locator = %step.target, "step target missing at transition");
                self.diagnostics.push(TourError::MissingTarget {
                    context: context_id,
                    locator: step.target.clone(),
                });
            }
            None => {}
        }

        if self.renderer.is_active() {
            self.renderer.show_step(index);
        } else {
            self.renderer.start();
            if index != 0 {
                self.renderer.show_step(index);
            }
        }
        if let Some(run) = self.run.as_mut() {
            run.current = index;
        }

        // 7-8. Automatic action or position refreshes.
        match step.flags.auto_action {
            AutoAction::Click => {
                self.scheduler.schedule_after(
                    now,
                    self.config.auto_action_delay(),
                    EngineTask::AutoAction {
                        run: run_id,
                        step: index,
                        element,
                    },
                );
            }
            AutoAction::None => {
                let delays: Vec<u64> = if step.flags.skip_initial_check {
                    self.config.dynamic_refresh_ms.clone()
                } else {
                    vec![self.config.refresh_delay_ms]
                };
                for delay in delays {
                    self.scheduler.schedule_after(
                        now,
                        Duration::from_millis(delay),
                        EngineTask::Refresh {
                            run: run_id,
                            generation,
                        },
                    );
                }
            }
        }

        // 9. Drag affordance on the fresh popover.
        self.reattach_drag();
        debug!(index, reason = ?reason, "step shown");
    }

    fn clear_guard(&mut self) {
        let Some(guard) = self.run.as_mut().and_then(|run| run.guard.take()) else {
            return;
        };
        self.scheduler.cancel(guard.timer);
        self.renderer.set_advance_enabled(true);
    }

    fn reattach_drag(&mut self) {
        if let Some(parts) = self.renderer.popover() {
            self.drag.attach(self.surface.as_mut(), parts);
        }
    }

    fn on_highlighted(&mut self, index: usize, element: Option<ElementHandle>) {
        let Some(run) = self.run.as_ref() else {
            return;
        };
        if index != run.current {
            trace!(index, current = run.current, "highlight for a step no longer current");
        }
        let Some(step) = run.step(run.current).cloned() else {
            return;
        };
        let run_id = run.id;
        let generation = run.generation;
        self.reattach_drag();

        let element = element
            .filter(|el| self.surface.is_attached(*el))
            .or_else(|| self.surface.resolve(&step.target));
        let Some(el) = element else {
            return;
        };
        let protected = self.visibility.protected_locator() == Some(step.target.as_str());
        if (protected || !step.flags.skip_auto_show) && !surface::is_visible(self.surface.as_ref(), el)
        {
            self.visibility.ensure_visible(self.surface.as_mut(), el);
        }
        if !surface::is_in_viewport(self.surface.as_ref(), el) {
            if let Err(err) = self.surface.scroll_into_view(el) {
                debug!(error = %err, "scroll into view failed");
                return;
            }
            let now = self.clock.now();
            self.scheduler.schedule_after(
                now,
                self.config.highlight_refresh(),
                EngineTask::Refresh {
                    run: run_id,
                    generation,
                },
            );
        }
    }

    // ── End path ────────────────────────────────────────────────────────

    fn end_run(&mut self, reason: EndReason) {
        let Some(run) = self.run.take() else {
            return;
        };
        if self.renderer.is_active() {
            self.renderer.destroy();
        }
        if let Some(guard) = run.guard {
            self.scheduler.cancel(guard.timer);
            self.renderer.set_advance_enabled(true);
        }
        self.visibility.stop_protection(&mut self.scheduler);
        if run.entered_fullscreen && self.fullscreen.is_active() {
            self.fullscreen.exit();
        }
        if let Err(err) = self.seen.mark_seen(&self.catalog, &run.context) {
            warn!(context = %run.context, error = %err, "failed to record tour as seen");
        }
        self.tour_active = false;
        // Snapshots taken mid-run include environment overrides: unwind
        // them before the environment.
        let failures = self.visibility.restore_all(self.surface.as_mut());
        self.diagnostics.extend(failures);
        let failures = self
            .environment
            .restore(self.surface.as_mut(), self.renderer.as_mut());
        self.diagnostics.extend(failures);
        self.drag.detach(self.surface.as_mut());
        if run.includes_hint {
            if let Err(err) = self.seen.mark_hint_shown() {
                warn!(error = %err, "failed to record end hint");
            }
        }
        self.scheduler.retain(|task| task.run_id() != Some(run.id));
        info!(context = %run.context, reason = %reason, "tour ended");
    }

    // ── Timers ──────────────────────────────────────────────────────────

    fn current_generation(&self, run_id: u64) -> Option<u64> {
        self.run
            .as_ref()
            .filter(|run| run.id == run_id)
            .map(|run| run.generation)
    }

    fn fire(&mut self, fired: Fired<EngineTask>) {
        trace!(task = ?fired.task, due_ms = fired.due.as_millis() as u64, "timer fired");
        match fired.task {
            EngineTask::ReadinessPoll { run } => self.on_readiness_poll(run),
            EngineTask::FullscreenTimeout { run } => self.on_fullscreen_timeout(run),
            EngineTask::GuardPoll { run, generation } => {
                if self.current_generation(run) == Some(generation) {
                    self.on_guard_poll();
                } else {
                    self.scheduler.cancel(fired.id);
                }
            }
            EngineTask::Protect { run } => {
                if self.tour_active && self.current_generation(run).is_some() {
                    self.visibility.protect_tick(self.surface.as_mut());
                } else {
                    self.scheduler.cancel(fired.id);
                }
            }
            EngineTask::ExpansionRetry { run, generation } => {
                if self.current_generation(run) == Some(generation) {
                    self.on_expansion_retry();
                }
            }
            EngineTask::AutoAction { run, step, element } => {
                if self.current_generation(run).is_some() {
                    self.on_auto_action(step, element);
                }
            }
            EngineTask::Refresh { run, generation } => {
                if self.current_generation(run) == Some(generation) {
                    self.renderer.refresh();
                } else {
                    trace!("stale refresh dropped");
                }
            }
            EngineTask::DeferredStart { epoch } => {
                if epoch == self.context_epoch {
                    self.on_deferred_start();
                }
            }
        }
    }

    fn on_readiness_poll(&mut self, run_id: u64) {
        let now = self.clock.now();
        let Some(pending) = self.pending.as_mut().filter(|p| p.id == run_id) else {
            return;
        };
        let PendingPhase::Readiness(wait) = &mut pending.phase else {
            return;
        };
        match wait.check(now, self.surface.as_ref()) {
            ReadinessStatus::Ready => {
                if let Some(pending) = self.pending.take() {
                    debug!(context = %pending.context, "ready");
                    self.after_readiness(pending.id, pending.context, pending.definition);
                }
            }
            ReadinessStatus::Waiting(retry_in) => {
                self.scheduler
                    .schedule_after(now, retry_in, EngineTask::ReadinessPoll { run: run_id });
            }
            ReadinessStatus::TimedOut => {
                let waited = wait.elapsed(now);
                let context = pending.context.id.clone();
                warn!(context = %context, waited_ms = waited.as_millis() as u64, "readiness timed out, tour skipped");
                self.diagnostics
                    .push(TourError::ReadinessTimeout { context, waited });
                self.pending = None;
            }
        }
    }

    fn on_fullscreen_timeout(&mut self, run_id: u64) {
        let Some(pending) = self.pending.take() else {
            return;
        };
        let since = match (&pending.phase, pending.id == run_id) {
            (PendingPhase::Fullscreen { since, .. }, true) => *since,
            _ => {
                self.pending = Some(pending);
                return;
            }
        };
        let waited = self.clock.now().saturating_sub(since);
        warn!(waited_ms = waited.as_millis() as u64, "fullscreen did not engage, starting without it");
        self.diagnostics.push(TourError::FullscreenTimeout { waited });
        self.launch(pending.id, pending.context, pending.definition, true);
    }

    fn on_guard_poll(&mut self) {
        let now = self.clock.now();
        let Some(guard) = self.run.as_mut().and_then(|run| run.guard.as_mut()) else {
            return;
        };
        let satisfied = guard.condition.evaluate(self.surface.as_ref());
        match guard.poll.check(now, satisfied) {
            PollOutcome::Pending { .. } => {}
            PollOutcome::Ready => {
                debug!("guard satisfied, advance enabled");
                self.clear_guard();
            }
            PollOutcome::Exhausted => {
                warn!(attempts = guard.poll.attempts(), "guard timed out, advance enabled");
                self.clear_guard();
            }
        }
    }

    fn on_expansion_retry(&mut self) {
        let now = self.clock.now();
        let Some(run) = self.run.as_ref() else {
            return;
        };
        let Some(rule) = run.definition.expansion.clone() else {
            return;
        };
        let run_id = run.id;
        let generation = run.generation;
        let expanded = self.expand(&rule);
        let Some(mut pending) = self.run.as_mut().and_then(|run| run.expansion.take()) else {
            return;
        };
        let outcome = pending.poll.check(now, expanded);
        match outcome {
            PollOutcome::Pending { retry_in } => {
                if let Some(run) = self.run.as_mut() {
                    run.expansion = Some(pending);
                }
                self.scheduler.schedule_after(
                    now,
                    retry_in,
                    EngineTask::ExpansionRetry {
                        run: run_id,
                        generation,
                    },
                );
            }
            PollOutcome::Ready => {
                debug!(index = pending.index, attempts = pending.poll.attempts(), "expanded");
                self.enter_step(pending.index, pending.reason, pending.depth);
            }
            PollOutcome::Exhausted => {
                warn!(index = pending.index, "expansion precondition not met, showing step anyway");
                self.enter_step(pending.index, pending.reason, pending.depth);
            }
        }
    }

    fn on_auto_action(&mut self, step_index: usize, element: Option<ElementHandle>) {
        let Some(run) = self.run.as_ref() else {
            return;
        };
        let Some(step) = run.step(step_index).cloned() else {
            return;
        };
        let run_id = run.id;
        let context_id = run.context.id.clone();

        let scope = element
            .filter(|el| self.surface.is_attached(*el))
            .or_else(|| self.surface.resolve(&step.target));
        let clickable = match (&step.click_target, scope) {
            (Some(locator), Some(scope)) => self
                .surface
                .resolve_within(scope, locator)
                .or_else(|| self.surface.resolve(locator)),
            (Some(locator), None) => self.surface.resolve(locator),
            (None, scope) => scope,
        };
        let Some(clickable) = clickable else {
            let locator = step.click_target.clone().unwrap_or(step.target);
            warn!(locator = %locator, "auto-action target missing");
            self.diagnostics.push(TourError::MissingTarget {
                context: context_id,
                locator,
            });
            return;
        };

        let satisfied = match &step.action_satisfied_when {
            Some(condition) => condition.evaluate(self.surface.as_ref()),
            None => self.surface.attribute(clickable, "aria-expanded").as_deref() == Some("true"),
        };
        if satisfied {
            debug!(element = %clickable, "auto-action already satisfied, skipped");
        } else if let Err(err) = self.surface.click(clickable) {
            warn!(element = %clickable, error = %err, "auto-action click failed");
        }

        let Some(generation) = self.current_generation(run_id) else {
            return;
        };
        let now = self.clock.now();
        self.scheduler.schedule_after(
            now,
            self.config.post_action_refresh(),
            EngineTask::Refresh {
                run: run_id,
                generation,
            },
        );
    }

    fn on_deferred_start(&mut self) {
        self.context = context::resolve(&self.catalog, self.surface.as_ref());
        let current = self
            .run
            .as_ref()
            .map(|run| &run.context)
            .or_else(|| self.pending.as_ref().map(|pending| &pending.context));
        if current == Some(&self.context) {
            debug!(context = %self.context, "sub-context settled back, tour kept");
            return;
        }
        if self.seen.has(&self.catalog, &self.context) {
            debug!(context = %self.context, "sub-context seen meanwhile, not restarting");
            return;
        }
        self.cancel_pending();
        self.end_run(EndReason::ContextChanged);
        info!(context = %self.context, "restarting tour for new sub-context");
        self.begin(self.context.clone());
    }
}

impl std::fmt::Debug for TourEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TourEngine")
            .field("context", &self.context)
            .field("run", &self.run.as_ref().map(|r| (r.id, r.current)))
            .field("pending", &self.pending.as_ref().map(|p| p.id))
            .field("timers", &self.scheduler.len())
            .field("inert", &self.inert)
            .finish()
    }
}
