#![forbid(unsafe_code)]

//! Environment-facing behavior: visibility protection, the fullscreen
//! staging flow, readiness waits, and restoration failures.

mod common;

use std::time::Duration;

use common::{TourDriver, single_catalog};
use guidepost_core::renderer::RendererEvent;
use guidepost_harness::{ElementHandle, FakeFullscreen, FakeSurface, Rect};
use guidepost_runtime::MemoryStorage;
use guidepost_tour::{
    Condition, ContextCapabilities, ContextId, ProtectSpec, StartOutcome, StepSpec, TourConfig,
    TourDefinition, TourError, TourPhase,
};
use pretty_assertions::assert_eq;

// ── Protection ─────────────────────────────────────────────────────────

fn board_driver(surface: &FakeSurface) -> TourDriver {
    let definition = TourDefinition::new(
        "board",
        vec![
            StepSpec::new("#toolbar", "Toolbar", "Your tools"),
            StepSpec::new("#canvas", "Canvas", "Draw here"),
        ],
    )
    .with_capabilities(ContextCapabilities {
        protect: Some(ProtectSpec {
            locator: "#toolbar".into(),
            interval_ms: None,
        }),
        ..ContextCapabilities::default()
    });
    TourDriver::new(surface, single_catalog("/board", definition))
}

#[test]
fn protected_target_never_stays_hidden_past_one_interval() {
    let surface = FakeSurface::new("/board");
    let toolbar = surface.add("#toolbar", Rect::new(0, 0, 1280, 48));
    surface.add("#canvas", Rect::new(0, 60, 1280, 700));
    let mut driver = board_driver(&surface);
    driver.start();

    // Each tick samples what the host would paint, then the host competes
    // for the toolbar by hiding it every 150ms.
    let mut hidden_since: Option<u64> = None;
    let mut longest = 0;
    for now in (10..=3000u64).step_by(10) {
        driver.advance(10);
        if surface.shown(toolbar) {
            hidden_since = None;
        } else {
            let since = *hidden_since.get_or_insert(now);
            longest = longest.max(now - since);
        }
        if now % 150 == 0 {
            surface.hide(toolbar);
        }
    }
    assert!(longest < 200, "toolbar stayed hidden for {longest}ms");
}

// ── Helpers ────────────────────────────────────────────────────────────

/// Forward renderer events one at a time. Right before a toolbar highlight
/// reaches the engine the host hides the toolbar again; right after, the
/// highlighted target must be on screen. Returns the highlights seen.
fn pump_contested(driver: &mut TourDriver, toolbar: ElementHandle) -> Vec<usize> {
    let mut highlighted = Vec::new();
    loop {
        let events = driver.renderer.take_events();
        if events.is_empty() {
            return highlighted;
        }
        for event in events {
            let target = match event {
                RendererEvent::Highlighted { index, element } => Some((index, element)),
                _ => None,
            };
            if let Some((_, Some(el))) = target {
                if el == toolbar {
                    driver.surface.hide(toolbar);
                }
            }
            driver.engine.handle_renderer_event(event);
            if let Some((index, element)) = target {
                let el = element.unwrap_or_else(|| panic!("step {index} highlighted nothing"));
                assert!(
                    driver.surface.shown(el),
                    "step {index} target hidden when its highlight was handled"
                );
                highlighted.push(index);
            }
        }
    }
}

#[test]
fn highlighted_target_is_visible_under_contention() {
    let surface = FakeSurface::new("/board");
    let toolbar = surface.add("#toolbar", Rect::new(0, 0, 1280, 48));
    surface.add("#canvas", Rect::new(0, 60, 1280, 700));
    let mut driver = board_driver(&surface);
    assert_eq!(driver.engine.start_tutorial(), StartOutcome::Started { steps: 2 });
    assert_eq!(pump_contested(&mut driver, toolbar), vec![0]);

    let mut visited = Vec::new();
    for round in 0..6u64 {
        surface.hide(toolbar);
        let pressed = if round % 2 == 0 {
            driver.renderer.press_next()
        } else {
            driver.renderer.press_previous()
        };
        assert!(pressed, "round {round} was ignored");
        visited.extend(pump_contested(&mut driver, toolbar));
        for _ in 0..7 {
            driver.engine.advance_time(Duration::from_millis(10));
            pump_contested(&mut driver, toolbar);
        }
    }
    assert_eq!(visited, vec![1, 0, 1, 0, 1, 0]);
    assert_eq!(driver.current(), Some(0));
    assert!(surface.shown(toolbar));
}

#[test]
fn protection_stops_when_the_tour_ends() {
    let surface = FakeSurface::new("/board");
    let toolbar = surface.add("#toolbar", Rect::new(0, 0, 1280, 48));
    surface.add("#canvas", Rect::new(0, 60, 1280, 700));
    let mut driver = board_driver(&surface);
    driver.start();
    driver.advance(400);

    driver.close();
    assert_eq!(driver.engine.pending_timers(), 0);
    assert_eq!(surface.style_of(toolbar), None);

    surface.hide(toolbar);
    driver.advance(1000);
    assert!(!surface.shown(toolbar));
}

// ── Fullscreen staging ─────────────────────────────────────────────────

fn present_surface() -> FakeSurface {
    let surface = FakeSurface::new("/present");
    surface.add("#slides", Rect::new(0, 0, 1280, 700));
    surface.add("#notes", Rect::new(0, 700, 1280, 100));
    surface
}

fn present_driver(surface: &FakeSurface, fullscreen: FakeFullscreen) -> TourDriver {
    let definition = TourDefinition::new(
        "present",
        vec![
            StepSpec::new("#slides", "Slides", "Your deck"),
            StepSpec::new("#notes", "Notes", "Speaker notes"),
        ],
    )
    .with_capabilities(ContextCapabilities {
        needs_fullscreen: true,
        ..ContextCapabilities::default()
    });
    TourDriver::build(
        surface,
        single_catalog("/present", definition),
        TourConfig::default(),
        fullscreen,
        MemoryStorage::new(),
    )
}

#[test]
fn confirmed_prompt_waits_for_fullscreen_then_exits_it() {
    let surface = present_surface();
    let mut driver = present_driver(&surface, FakeFullscreen::new());

    assert_eq!(driver.start(), StartOutcome::AwaitingConfirmation);
    assert_eq!(driver.engine.status().phase, TourPhase::AwaitingConfirmation);
    assert!(driver.fullscreen.prompt().is_some());
    assert!(!driver.engine.is_running());
    assert_eq!(driver.start(), StartOutcome::AlreadyRunning);

    assert_eq!(driver.engine.confirm_staging_prompt(), StartOutcome::AwaitingFullscreen);
    assert!(driver.fullscreen.prompt().is_none());
    assert_eq!(driver.fullscreen.requests(), 1);
    assert_eq!(driver.engine.status().phase, TourPhase::AwaitingFullscreen);

    driver.advance(500);
    driver.engage_fullscreen();
    assert!(driver.engine.is_running());
    assert_eq!(driver.current(), Some(0));

    driver.advance(5000);
    assert!(driver.engine.take_diagnostics().is_empty());

    driver.close();
    assert_eq!(driver.fullscreen.exits(), 1);
}

#[test]
fn fullscreen_that_never_engages_starts_the_tour_anyway() {
    let surface = present_surface();
    let mut driver = present_driver(&surface, FakeFullscreen::new());

    driver.start();
    driver.engine.confirm_staging_prompt();
    driver.advance(1990);
    assert!(!driver.engine.is_running());
    driver.advance(10);

    assert!(driver.engine.is_running());
    assert_eq!(
        driver.engine.take_diagnostics(),
        vec![TourError::FullscreenTimeout {
            waited: Duration::from_millis(2000),
        }]
    );
    driver.close();
    assert_eq!(driver.fullscreen.exits(), 0);
}

#[test]
fn refused_fullscreen_starts_without_it() {
    let surface = present_surface();
    let mut driver = present_driver(&surface, FakeFullscreen::denying());

    driver.start();
    let outcome = driver.engine.confirm_staging_prompt();
    driver.pump();
    assert_eq!(outcome, StartOutcome::Started { steps: 2 });
    assert!(driver.engine.is_running());
    driver.close();
    assert_eq!(driver.fullscreen.exits(), 0);
}

#[test]
fn immediate_fullscreen_starts_at_once() {
    let surface = present_surface();
    let mut driver = present_driver(&surface, FakeFullscreen::immediate());

    driver.start();
    let outcome = driver.engine.confirm_staging_prompt();
    driver.pump();
    assert_eq!(outcome, StartOutcome::Started { steps: 2 });
    driver.finish();
    assert_eq!(driver.fullscreen.exits(), 1);
}

#[test]
fn unsupported_fullscreen_skips_the_prompt() {
    let surface = present_surface();
    let mut driver = present_driver(&surface, FakeFullscreen::unsupported());

    assert_eq!(driver.start(), StartOutcome::Started { steps: 2 });
    assert_eq!(driver.fullscreen.prompts_shown(), 0);
}

#[test]
fn dismissed_prompt_leaves_the_tour_unstarted_and_unseen() {
    let surface = present_surface();
    let mut driver = present_driver(&surface, FakeFullscreen::new());

    driver.start();
    driver.engine.dismiss_staging_prompt();

    assert_eq!(driver.engine.status().phase, TourPhase::Idle);
    assert!(driver.fullscreen.prompt().is_none());
    assert_eq!(driver.fullscreen.requests(), 0);
    assert!(driver.stored_keys().is_empty());
    assert_eq!(driver.engine.confirm_staging_prompt(), StartOutcome::NothingPending);

    assert_eq!(driver.auto_start(), StartOutcome::AwaitingConfirmation);
    assert_eq!(driver.fullscreen.prompts_shown(), 2);
}

#[test]
fn navigating_away_cancels_a_pending_fullscreen_start() {
    let surface = present_surface();
    let mut driver = present_driver(&surface, FakeFullscreen::new());

    driver.start();
    driver.engine.confirm_staging_prompt();
    driver.navigate("/elsewhere");
    driver.advance(3000);

    assert!(!driver.engine.is_running());
    assert_eq!(driver.engine.status().phase, TourPhase::Idle);
    assert!(driver.engine.take_diagnostics().is_empty());
    assert!(driver.stored_keys().is_empty());
}

// ── Readiness ──────────────────────────────────────────────────────────

fn feed_driver(surface: &FakeSurface) -> TourDriver {
    let definition = TourDefinition::new(
        "feed",
        vec![StepSpec::new("#feed", "Feed", "Latest posts")],
    )
    .with_capabilities(ContextCapabilities {
        readiness: Some(Condition::CollectionNonEmpty {
            locator: ".feed-item".into(),
        }),
        ..ContextCapabilities::default()
    });
    TourDriver::new(surface, single_catalog("/feed", definition))
}

#[test]
fn start_waits_for_readiness() {
    let surface = FakeSurface::new("/feed");
    surface.add("#feed", Rect::new(0, 0, 600, 700));
    let mut driver = feed_driver(&surface);

    assert_eq!(driver.start(), StartOutcome::WaitingForReadiness);
    assert_eq!(driver.engine.status().phase, TourPhase::AwaitingReadiness);
    assert_eq!(driver.start(), StartOutcome::AlreadyRunning);

    driver.advance(250);
    surface.add(".feed-item", Rect::new(0, 0, 600, 80));
    driver.advance(40);
    assert!(!driver.engine.is_running());
    driver.advance(10);
    assert!(driver.engine.is_running());
    assert_eq!(driver.current(), Some(0));
}

#[test]
fn readiness_timeout_skips_the_tour() {
    let surface = FakeSurface::new("/feed");
    surface.add("#feed", Rect::new(0, 0, 600, 700));
    let mut driver = feed_driver(&surface);

    driver.start();
    driver.advance(4990);
    assert_eq!(driver.engine.status().phase, TourPhase::AwaitingReadiness);
    driver.advance(10);

    assert_eq!(driver.engine.status().phase, TourPhase::Idle);
    assert_eq!(
        driver.engine.take_diagnostics(),
        vec![TourError::ReadinessTimeout {
            context: ContextId::new("feed"),
            waited: Duration::from_millis(5000),
        }]
    );
    assert!(driver.stored_keys().is_empty());
    assert_eq!(driver.engine.pending_timers(), 0);
}

#[test]
fn satisfied_readiness_starts_synchronously() {
    let surface = FakeSurface::new("/feed");
    surface.add("#feed", Rect::new(0, 0, 600, 700));
    surface.add(".feed-item", Rect::new(0, 0, 600, 80));
    let mut driver = feed_driver(&surface);

    assert_eq!(driver.start(), StartOutcome::Started { steps: 1 });
}

// ── Restoration failures ───────────────────────────────────────────────

#[test]
fn restoration_failure_of_one_element_does_not_block_the_rest() {
    let surface = FakeSurface::new("/");
    let first = surface.add("#first", Rect::new(0, 0, 100, 40));
    let second = surface.add("#second", Rect::new(0, 50, 100, 40));
    surface.put_style(first, Some("display: none"));
    surface.put_style(second, Some("visibility: hidden"));
    let definition = TourDefinition::new(
        "home",
        vec![
            StepSpec::new("#first", "First", "One"),
            StepSpec::new("#second", "Second", "Two"),
        ],
    );
    let mut driver = TourDriver::new(&surface, single_catalog("/", definition));

    assert_eq!(driver.start(), StartOutcome::Started { steps: 2 });
    assert!(surface.shown(first));
    assert!(surface.shown(second));
    surface.reject_writes(first);
    driver.close();

    let diagnostics = driver.engine.take_diagnostics();
    assert_eq!(diagnostics.len(), 1);
    assert!(matches!(
        diagnostics[0],
        TourError::RestorationFailure { element, .. } if element == first
    ));
    assert_eq!(surface.style_of(second).as_deref(), Some("visibility: hidden"));
    assert!(!driver.engine.is_running());
    assert_eq!(driver.stored_keys(), vec!["guidepost_seen_home"]);
}
