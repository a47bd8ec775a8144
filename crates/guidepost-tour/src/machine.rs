#![forbid(unsafe_code)]

//! Run state of the tour state machine.
//!
//! ```text
//!            start / auto-start
//!   Idle ─────────────────────────┐
//!    ▲    (readiness, staging      │
//!    │     prompt, fullscreen)     ▼
//!    │                          Running ── next/prev/jump ──┐
//!    │                             │  ▲                     │
//!    │                             │  └──── transition ◄────┘
//!    └──────── Ended ◄── destroy ──┘
//! ```
//!
//! A [`TourRun`] exists only while Running and owns a frozen copy of the
//! context's definition and the validated steps. Timer tasks carry the run id
//! and, where they touch the current step, the transition generation; a task
//! whose ids no longer match is dropped when it fires.

use std::fmt;
use std::time::Duration;

use guidepost_core::ElementHandle;
use guidepost_core::poll::BoundedPoll;
use guidepost_core::scheduler::TimerId;

use crate::catalog::{StepSpec, TourDefinition};
use crate::condition::Condition;
use crate::context::ResolvedContext;
use crate::readiness::ReadinessWait;
use crate::validate::{ValidatedStep, ValidationReport};

/// Externally visible phase of the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TourPhase {
    Idle,
    AwaitingReadiness,
    AwaitingConfirmation,
    AwaitingFullscreen,
    /// Running, waiting for the expansion precondition of the next step.
    Expanding,
    /// Running, a step is shown.
    Showing,
}

impl TourPhase {
    #[must_use]
    pub const fn is_running(self) -> bool {
        matches!(self, Self::Expanding | Self::Showing)
    }
}

/// Why a step is being entered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionReason {
    Start,
    Next,
    Previous,
    Jump,
    Redirect,
}

/// Why a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndReason {
    /// The last step was completed.
    Completed,
    /// The renderer was destroyed (user close).
    Closed,
    Navigated,
    Restarted,
    /// The sub-context changed under the run.
    ContextChanged,
}

impl fmt::Display for EndReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Completed => "completed",
            Self::Closed => "closed",
            Self::Navigated => "navigated",
            Self::Restarted => "restarted",
            Self::ContextChanged => "context-changed",
        };
        f.write_str(s)
    }
}

/// Result of a start request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    /// The renderer is unavailable; nothing happens.
    Inert,
    /// A run (or a pending start) already exists.
    AlreadyRunning,
    /// Auto-start skipped because the context was seen.
    AlreadySeen,
    /// No tour is defined for the context.
    NoTour,
    /// Every step was filtered out.
    NoSteps,
    WaitingForReadiness,
    AwaitingConfirmation,
    AwaitingFullscreen,
    /// No staging prompt was pending.
    NothingPending,
    Started { steps: usize },
}

/// What to reset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResetScope {
    /// The currently resolved context.
    Current,
    Context(crate::catalog::ContextId),
    All,
}

/// Timer payloads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineTask {
    ReadinessPoll { run: u64 },
    FullscreenTimeout { run: u64 },
    GuardPoll { run: u64, generation: u64 },
    Protect { run: u64 },
    ExpansionRetry { run: u64, generation: u64 },
    /// Acts on the step and element captured when it was scheduled.
    AutoAction {
        run: u64,
        step: usize,
        element: Option<ElementHandle>,
    },
    Refresh { run: u64, generation: u64 },
    DeferredStart { epoch: u64 },
}

impl EngineTask {
    /// Run (or pending start) the task belongs to.
    #[must_use]
    pub const fn run_id(&self) -> Option<u64> {
        match self {
            Self::ReadinessPoll { run }
            | Self::FullscreenTimeout { run }
            | Self::GuardPoll { run, .. }
            | Self::Protect { run }
            | Self::ExpansionRetry { run, .. }
            | Self::AutoAction { run, .. }
            | Self::Refresh { run, .. } => Some(*run),
            Self::DeferredStart { .. } => None,
        }
    }
}

/// Installed advancement guard.
#[derive(Debug, Clone)]
pub(crate) struct GuardWatch {
    pub condition: Condition,
    pub poll: BoundedPoll,
    pub timer: TimerId,
}

/// Transition waiting on the expansion precondition.
#[derive(Debug, Clone)]
pub(crate) struct PendingExpansion {
    pub index: usize,
    pub reason: TransitionReason,
    pub depth: u8,
    pub poll: BoundedPoll,
}

/// Start request that has not produced a run yet.
#[derive(Debug, Clone)]
pub(crate) struct PendingStart {
    pub id: u64,
    pub context: ResolvedContext,
    pub definition: TourDefinition,
    pub phase: PendingPhase,
}

#[derive(Debug, Clone)]
pub(crate) enum PendingPhase {
    Readiness(ReadinessWait),
    Confirmation,
    Fullscreen { timer: TimerId, since: Duration },
}

impl PendingStart {
    pub fn tour_phase(&self) -> TourPhase {
        match self.phase {
            PendingPhase::Readiness(_) => TourPhase::AwaitingReadiness,
            PendingPhase::Confirmation => TourPhase::AwaitingConfirmation,
            PendingPhase::Fullscreen { .. } => TourPhase::AwaitingFullscreen,
        }
    }
}

/// State of the single active run.
#[derive(Debug, Clone)]
pub struct TourRun {
    pub(crate) id: u64,
    pub(crate) context: ResolvedContext,
    pub(crate) definition: TourDefinition,
    pub(crate) steps: Vec<ValidatedStep>,
    pub(crate) current: usize,
    pub(crate) generation: u64,
    pub(crate) guard: Option<GuardWatch>,
    pub(crate) expansion: Option<PendingExpansion>,
    /// This run asked for fullscreen.
    pub(crate) requested_fullscreen: bool,
    /// Fullscreen is engaged on this run's behalf and must be exited.
    pub(crate) entered_fullscreen: bool,
    pub(crate) includes_hint: bool,
}

impl TourRun {
    pub(crate) fn new(
        id: u64,
        context: ResolvedContext,
        definition: TourDefinition,
        report: ValidationReport,
        requested_fullscreen: bool,
        entered_fullscreen: bool,
    ) -> Self {
        Self {
            id,
            context,
            definition,
            includes_hint: report.includes_hint,
            steps: report.steps,
            current: 0,
            generation: 0,
            guard: None,
            expansion: None,
            requested_fullscreen,
            entered_fullscreen,
        }
    }

    #[must_use]
    pub fn context(&self) -> &ResolvedContext {
        &self.context
    }

    #[must_use]
    pub fn current_index(&self) -> usize {
        self.current
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    #[must_use]
    pub fn step(&self, index: usize) -> Option<&StepSpec> {
        self.steps.get(index).map(|s| &s.spec)
    }

    #[must_use]
    pub fn validated_steps(&self) -> &[ValidatedStep] {
        &self.steps
    }

    #[must_use]
    pub fn is_last(&self, index: usize) -> bool {
        index + 1 >= self.steps.len()
    }

    /// Index of the step with this target.
    #[must_use]
    pub fn index_of(&self, target: &str) -> Option<usize> {
        self.steps.iter().position(|s| s.spec.target == target)
    }

    #[must_use]
    pub fn guard_active(&self) -> bool {
        self.guard.is_some()
    }

    #[must_use]
    pub fn phase(&self) -> TourPhase {
        if self.expansion.is_some() {
            TourPhase::Expanding
        } else {
            TourPhase::Showing
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(targets: &[&str]) -> TourRun {
        let report = ValidationReport {
            steps: targets
                .iter()
                .map(|t| ValidatedStep {
                    spec: StepSpec::new(*t, "", ""),
                    is_hint: false,
                })
                .collect(),
            ..ValidationReport::default()
        };
        TourRun::new(
            1,
            ResolvedContext::new("home", None),
            TourDefinition::new("home", vec![]),
            report,
            false,
            false,
        )
    }

    #[test]
    fn index_lookup() {
        let run = run(&["#a", "#b", "#c"]);
        assert_eq!(run.index_of("#b"), Some(1));
        assert_eq!(run.index_of("#zzz"), None);
        assert!(run.is_last(2));
        assert!(!run.is_last(1));
        assert_eq!(run.phase(), TourPhase::Showing);
    }

    #[test]
    fn task_run_ids() {
        assert_eq!(EngineTask::Protect { run: 4 }.run_id(), Some(4));
        assert_eq!(EngineTask::DeferredStart { epoch: 1 }.run_id(), None);
        assert!(TourPhase::Expanding.is_running());
        assert!(!TourPhase::AwaitingFullscreen.is_running());
    }
}
