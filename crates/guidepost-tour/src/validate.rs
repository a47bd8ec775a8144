#![forbid(unsafe_code)]

//! Building the runnable step list of a tour from live UI state.

use guidepost_core::surface::{self, HostSurface};

use crate::catalog::StepSpec;
use crate::visibility::{EnsureVisible, VisibilityEnforcer};

/// A step that survived validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedStep {
    pub spec: StepSpec,
    /// This is the appended end-of-tour hint.
    pub is_hint: bool,
}

/// Result of validating a step list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationReport {
    pub steps: Vec<ValidatedStep>,
    /// Targets of dropped steps, in input order.
    pub dropped: Vec<String>,
    /// Targets that had to be forced visible.
    pub forced_visible: Vec<String>,
    pub includes_hint: bool,
}

impl ValidationReport {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.steps.len()
    }
}

enum Verdict {
    Keep { forced: bool },
    Drop,
}

fn judge(
    surface: &mut dyn HostSurface,
    enforcer: Option<&mut VisibilityEnforcer>,
    step: &StepSpec,
) -> Verdict {
    if step.flags.skip_initial_check {
        return Verdict::Keep { forced: false };
    }
    let Some(el) = surface.resolve(&step.target) else {
        return Verdict::Drop;
    };
    if step.flags.skip_auto_show || surface::is_visible(surface, el) {
        return Verdict::Keep { forced: false };
    }
    let forced = match enforcer {
        Some(enforcer) => matches!(enforcer.ensure_visible(surface, el), EnsureVisible::Forced(_)),
        None => false,
    };
    Verdict::Keep { forced }
}

/// Validate `steps` (plus the optional hint step, appended last).
///
/// Steps flagged `skip_initial_check` are kept as-is. Other steps are
/// dropped when their target is absent, and forced visible when it is
/// present but hidden (unless flagged `skip_auto_show`). Order is preserved.
pub fn validate_steps(
    surface: &mut dyn HostSurface,
    enforcer: &mut VisibilityEnforcer,
    steps: &[StepSpec],
    hint: Option<&StepSpec>,
) -> ValidationReport {
    let mut report = ValidationReport::default();
    let candidates = steps
        .iter()
        .map(|s| (s, false))
        .chain(hint.map(|h| (h, true)));
    for (step, is_hint) in candidates {
        match judge(surface, Some(&mut *enforcer), step) {
            Verdict::Drop => {
                tracing::warn!(target_locator = %step.target, "tour target missing, step dropped");
                report.dropped.push(step.target.clone());
            }
            Verdict::Keep { forced } => {
                if forced {
                    report.forced_visible.push(step.target.clone());
                }
                report.includes_hint |= is_hint;
                report.steps.push(ValidatedStep {
                    spec: step.clone(),
                    is_hint,
                });
            }
        }
    }
    tracing::debug!(
        kept = report.steps.len(),
        dropped = report.dropped.len(),
        forced = report.forced_visible.len(),
        "steps validated"
    );
    report
}

/// Number of steps that would survive validation, without mutating
/// anything.
pub fn runnable_count(surface: &dyn HostSurface, steps: &[StepSpec]) -> usize {
    steps
        .iter()
        .filter(|s| s.flags.skip_initial_check || surface.resolve(&s.target).is_some())
        .count()
}
