#![forbid(unsafe_code)]

//! Reversible visibility overrides.
//!
//! The enforcer forces hidden targets visible and remembers exactly what it
//! touched. Snapshots live in an arena keyed by [`ElementHandle`]; at most
//! one snapshot exists per handle, and it always holds the state captured
//! *before the first override*, no matter how often the element is forced
//! again afterwards. Elements that were already visible are never tracked
//! and therefore never touched at restoration.
//!
//! A single protection timer can re-assert the overrides on one contested
//! target while a tour is active.

use std::collections::HashMap;
use std::time::Duration;

use guidepost_core::ElementHandle;
use guidepost_core::scheduler::{Scheduler, TimerId};
use guidepost_core::style::HideProperty;
use guidepost_core::surface::{self, HostError, HostResult, HostSurface};

use crate::config::TourConfig;
use crate::error::TourError;

/// Pre-override state of one element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StyleSnapshot {
    /// Verbatim `style` attribute (`None` when it was absent).
    pub original_style: Option<String>,
    pub original_classes: Vec<String>,
    /// Properties the engine forced.
    pub modified: Vec<HideProperty>,
}

/// Result of [`VisibilityEnforcer::ensure_visible`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnsureVisible {
    /// Nothing hid the element; nothing was recorded or changed.
    AlreadyVisible,
    /// Overrides were applied; lists the properties forced by this call.
    Forced(Vec<HideProperty>),
    /// The element could not be read or written.
    Failed(HostError),
}

#[derive(Debug, Clone)]
struct Protection {
    locator: String,
    timer: TimerId,
}

/// Snapshot arena plus the protection loop.
#[derive(Debug)]
pub struct VisibilityEnforcer {
    snapshots: HashMap<ElementHandle, StyleSnapshot>,
    /// First-touch order, used for restoration.
    order: Vec<ElementHandle>,
    hiding_classes: Vec<String>,
    forced_display: String,
    marker: String,
    protection: Option<Protection>,
}

impl VisibilityEnforcer {
    #[must_use]
    pub fn new(config: &TourConfig) -> Self {
        Self {
            snapshots: HashMap::new(),
            order: Vec::new(),
            hiding_classes: config.hiding_classes.clone(),
            forced_display: config.forced_display.clone(),
            marker: config.marker_attribute.clone(),
            protection: None,
        }
    }

    fn forced_value(&self, prop: HideProperty) -> &str {
        match prop {
            HideProperty::Display => &self.forced_display,
            HideProperty::Visibility => "visible",
            HideProperty::Opacity => "1",
        }
    }

    /// Force `el` visible, snapshotting it on first override.
    pub fn ensure_visible(&mut self, surface: &mut dyn HostSurface, el: ElementHandle) -> EnsureVisible {
        let Some(computed) = surface.computed_visibility(el) else {
            return EnsureVisible::Failed(HostError::Detached(el));
        };
        if computed.is_shown() {
            return EnsureVisible::AlreadyVisible;
        }
        match self.force(surface, el) {
            Ok(forced) => {
                tracing::debug!(element = %el, forced = ?forced, "forced target visible");
                EnsureVisible::Forced(forced)
            }
            Err(err) => {
                tracing::warn!(element = %el, error = %err, "failed to force target visible");
                EnsureVisible::Failed(err)
            }
        }
    }

    fn force(&mut self, surface: &mut dyn HostSurface, el: ElementHandle) -> HostResult<Vec<HideProperty>> {
        if !self.snapshots.contains_key(&el) {
            let snapshot = StyleSnapshot {
                original_style: surface.inline_style(el)?,
                original_classes: surface.class_list(el)?,
                modified: Vec::new(),
            };
            self.snapshots.insert(el, snapshot);
            self.order.push(el);
        }

        let classes = surface.class_list(el)?;
        let kept: Vec<String> = classes
            .iter()
            .filter(|c| !self.hiding_classes.contains(c))
            .cloned()
            .collect();
        if kept.len() != classes.len() {
            surface.set_class_list(el, &kept)?;
        }

        let hiding = surface
            .computed_visibility(el)
            .ok_or(HostError::Detached(el))?
            .hiding_properties();
        for prop in &hiding {
            let value = self.forced_value(*prop).to_string();
            surface::set_inline_property(surface, el, prop.name(), &value, true)?;
        }
        if let Some(snapshot) = self.snapshots.get_mut(&el) {
            for prop in &hiding {
                if !snapshot.modified.contains(prop) {
                    snapshot.modified.push(*prop);
                }
            }
        }
        surface.set_attribute(el, &self.marker, "true")?;
        Ok(hiding)
    }

    /// Snapshot of an element, if the engine changed it.
    #[must_use]
    pub fn snapshot(&self, el: ElementHandle) -> Option<&StyleSnapshot> {
        self.snapshots.get(&el)
    }

    #[must_use]
    pub fn tracked_count(&self) -> usize {
        self.snapshots.len()
    }

    /// Start (or replace) the protection timer for `locator`.
    pub fn protect<T: Clone>(
        &mut self,
        scheduler: &mut Scheduler<T>,
        now: Duration,
        locator: &str,
        interval: Duration,
        task: T,
    ) -> TimerId {
        self.stop_protection(scheduler);
        let timer = scheduler.schedule_repeating(now, interval, task);
        tracing::debug!(locator, interval_ms = interval.as_millis() as u64, "protection started");
        self.protection = Some(Protection {
            locator: locator.to_string(),
            timer,
        });
        timer
    }

    /// Locator under protection.
    #[must_use]
    pub fn protected_locator(&self) -> Option<&str> {
        self.protection.as_ref().map(|p| p.locator.as_str())
    }

    /// One protection cycle: re-force the protected target if it is hidden.
    pub fn protect_tick(&mut self, surface: &mut dyn HostSurface) -> Option<EnsureVisible> {
        let locator = self.protection.as_ref()?.locator.clone();
        let el = surface.resolve(&locator)?;
        match self.ensure_visible(surface, el) {
            EnsureVisible::AlreadyVisible => None,
            outcome => {
                tracing::trace!(locator = %locator, "protection re-asserted visibility");
                Some(outcome)
            }
        }
    }

    /// Cancel the protection timer.
    pub fn stop_protection<T: Clone>(&mut self, scheduler: &mut Scheduler<T>) {
        if let Some(protection) = self.protection.take() {
            scheduler.cancel(protection.timer);
            tracing::debug!(locator = %protection.locator, "protection stopped");
        }
    }

    /// Restore every tracked element and clear the arena.
    ///
    /// A failing element is reported and skipped; the rest are still
    /// restored. Calling this with nothing tracked does nothing.
    pub fn restore_all(&mut self, surface: &mut dyn HostSurface) -> Vec<TourError> {
        let mut failures = Vec::new();
        for el in std::mem::take(&mut self.order) {
            let Some(snapshot) = self.snapshots.remove(&el) else {
                continue;
            };
            if let Err(source) = self.restore_one(surface, el, &snapshot) {
                tracing::warn!(element = %el, error = %source, "restoration failed");
                failures.push(TourError::RestorationFailure { element: el, source });
            }
        }
        self.snapshots.clear();
        failures
    }

    fn restore_one(
        &self,
        surface: &mut dyn HostSurface,
        el: ElementHandle,
        snapshot: &StyleSnapshot,
    ) -> HostResult<()> {
        surface.set_inline_style(el, snapshot.original_style.as_deref())?;
        surface.set_class_list(el, &snapshot.original_classes)?;
        surface.remove_attribute(el, &self.marker)
    }
}
