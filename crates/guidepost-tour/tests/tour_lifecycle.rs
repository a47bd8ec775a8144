#![forbid(unsafe_code)]

//! End-to-end lifecycle of a tour: start, step, end, and restart.

mod common;

use common::{TourDriver, home_catalog, home_surface, single_catalog};
use guidepost_core::renderer::Renderer;
use guidepost_core::surface::HostSurface;
use guidepost_harness::{FakeFullscreen, FakeRenderer, POPOVER_LOCATOR, Point, Rect, RendererCall};
use guidepost_runtime::MemoryStorage;
use guidepost_tour::{
    ContextCapabilities, ContextId, LayoutOverride, PointerEvent, ResetScope, StartOutcome,
    StepSpec, TourConfig, TourDefinition, TourError, TourPhase,
};
use pretty_assertions::assert_eq;

#[test]
fn home_tour_runs_valid_steps_in_order() {
    let surface = home_surface();
    let mut driver = TourDriver::new(&surface, home_catalog());

    assert_eq!(driver.start(), StartOutcome::Started { steps: 5 });
    assert_eq!(
        driver.targets(),
        vec!["#search", "#chat", "#composer", "#history", "#settings"]
    );
    assert_eq!(
        driver.engine.take_diagnostics(),
        vec![TourError::MissingTarget {
            context: ContextId::new("home"),
            locator: "#gone".into(),
        }]
    );
    assert_eq!(driver.current(), Some(0));
    assert!(driver.engine.is_tour_active());

    for expected in 1..5 {
        assert!(driver.next());
        assert_eq!(driver.current(), Some(expected));
        assert_eq!(driver.renderer.current(), Some(expected));
    }
    assert!(driver.next());

    assert!(!driver.engine.is_running());
    assert!(!driver.engine.is_tour_active());
    assert_eq!(driver.renderer.current(), None);
    assert_eq!(surface.count(POPOVER_LOCATOR), 0);
    assert_eq!(driver.stored_keys(), vec!["guidepost_seen_home"]);
    assert!(driver.engine.has_seen_tutorial(None));
    assert_eq!(driver.auto_start(), StartOutcome::AlreadySeen);
    assert_eq!(driver.renderer.count(&RendererCall::Start), 1);
    assert_eq!(driver.renderer.count(&RendererCall::Destroy), 1);
}

#[test]
fn concurrent_start_is_rejected() {
    let surface = home_surface();
    let mut driver = TourDriver::new(&surface, home_catalog());

    assert_eq!(driver.start(), StartOutcome::Started { steps: 5 });
    assert!(driver.next());
    assert_eq!(driver.start(), StartOutcome::AlreadyRunning);
    assert_eq!(driver.auto_start(), StartOutcome::AlreadyRunning);

    assert_eq!(driver.current(), Some(1));
    assert_eq!(driver.renderer.count(&RendererCall::SetSteps(5)), 1);
    assert_eq!(driver.renderer.count(&RendererCall::Start), 1);
}

#[test]
fn refresh_from_an_earlier_step_is_dropped() {
    let surface = home_surface();
    let mut driver = TourDriver::new(&surface, home_catalog());

    driver.start();
    assert!(driver.next());
    driver.advance(100);

    assert_eq!(driver.renderer.refresh_count(), 1);
    assert_eq!(driver.engine.pending_timers(), 0);
}

#[test]
fn unseen_context_auto_starts_once() {
    let surface = home_surface();
    let mut driver = TourDriver::new(&surface, home_catalog());

    assert!(matches!(driver.auto_start(), StartOutcome::Started { .. }));
    driver.close();
    assert!(!driver.engine.is_running());
    assert_eq!(driver.auto_start(), StartOutcome::AlreadySeen);
    assert!(matches!(driver.start(), StartOutcome::Started { .. }));
}

#[test]
fn location_without_tour_does_nothing() {
    let surface = home_surface();
    surface.set_location("/billing");
    let mut driver = TourDriver::new(&surface, home_catalog());

    assert!(driver.engine.context().id.is_unknown());
    assert_eq!(driver.start(), StartOutcome::NoTour);
    assert_eq!(driver.auto_start(), StartOutcome::NoTour);
    assert!(driver.stored_keys().is_empty());
}

#[test]
fn tour_without_runnable_steps_is_not_started() {
    let surface = home_surface();
    let definition = TourDefinition::new(
        "empty",
        vec![
            StepSpec::new("#nothing", "Nothing", "Not here"),
            StepSpec::new("#neither", "Neither", "Not here either"),
        ],
    );
    let mut driver = TourDriver::new(&surface, single_catalog("/", definition));

    assert_eq!(driver.start(), StartOutcome::NoSteps);
    assert!(!driver.engine.is_running());
    assert!(driver.renderer.calls().iter().all(|c| *c == RendererCall::Configure));
    assert!(driver.stored_keys().is_empty());
}

#[test]
fn closing_mid_tour_restores_the_host_exactly() {
    let surface = home_surface();
    let chat = surface.resolve("#chat").expect("chat present");
    let history = surface.resolve("#history").expect("history present");
    let body = surface.add("body", Rect::new(0, 0, 1280, 800));
    surface.put_style(chat, Some("display:none; color: red"));
    surface.put_classes(history, &["panel", "hidden"]);
    surface.put_style(body, Some("overflow: auto"));

    let definition = TourDefinition::new("home", common::home_steps()).with_capabilities(
        ContextCapabilities {
            competing_surfaces: vec!["#composer".into()],
            layout_overrides: vec![LayoutOverride {
                locator: "#search".into(),
                property: "margin-top".into(),
                value: "0".into(),
            }],
            disable_page_scroll: true,
            ..ContextCapabilities::default()
        },
    );
    let mut driver = TourDriver::new(&surface, single_catalog("/", definition));
    let before = surface.snapshot();

    assert_eq!(driver.start(), StartOutcome::Started { steps: 5 });
    assert!(surface.shown(chat));
    assert!(surface.shown(history));
    assert_ne!(surface.snapshot(), before);

    assert!(driver.next());
    assert!(driver.next());
    driver.close();

    assert!(!driver.engine.is_running());
    assert_eq!(surface.snapshot(), before);
    assert_eq!(surface.style_of(chat).as_deref(), Some("display:none; color: red"));
    assert_eq!(surface.classes_of(history), vec!["panel", "hidden"]);
    assert_eq!(driver.stored_keys(), vec!["guidepost_seen_home"]);
    assert!(!driver.renderer.target_interaction());
}

#[test]
fn navigation_ends_the_tour_and_resolves_the_new_context() {
    let surface = home_surface();
    let mut driver = TourDriver::new(&surface, home_catalog());
    let before = surface.snapshot();

    driver.start();
    assert!(driver.next());
    driver.navigate("/settings");

    assert!(!driver.engine.is_running());
    assert!(driver.engine.context().id.is_unknown());
    assert_eq!(driver.renderer.current(), None);
    assert_eq!(surface.count(POPOVER_LOCATOR), 0);
    assert_eq!(driver.engine.pending_timers(), 0);
    assert_eq!(driver.stored_keys(), vec!["guidepost_seen_home"]);

    surface.set_location("/");
    assert_eq!(surface.snapshot(), before);
}

#[test]
fn restart_clears_the_flag_and_starts_from_the_first_step() {
    let surface = home_surface();
    let mut driver = TourDriver::new(&surface, home_catalog());

    driver.start();
    driver.finish();
    assert!(driver.engine.has_seen_tutorial(None));

    let outcome = driver.engine.restart_tutorial();
    driver.pump();
    assert_eq!(outcome, StartOutcome::Started { steps: 5 });
    assert_eq!(driver.current(), Some(0));
    assert!(driver.storage.snapshot().is_empty());
    assert_eq!(driver.renderer.count(&RendererCall::Start), 2);
}

#[test]
fn restart_current_goes_back_to_the_first_step() {
    let surface = home_surface();
    let mut driver = TourDriver::new(&surface, home_catalog());

    driver.start();
    assert!(driver.next());
    assert!(driver.next());
    assert_eq!(driver.current(), Some(2));

    let outcome = driver.engine.restart_current_tutorial();
    driver.pump();
    assert_eq!(outcome, StartOutcome::Started { steps: 5 });
    assert_eq!(driver.current(), Some(0));
    assert_eq!(driver.renderer.current(), Some(0));
    assert!(driver.engine.is_running());
}

#[test]
fn jump_moves_to_a_valid_step_only() {
    let surface = home_surface();
    let mut driver = TourDriver::new(&surface, home_catalog());

    assert!(!driver.engine.jump_to(0));
    driver.start();
    assert!(driver.engine.jump_to(3));
    driver.pump();
    assert_eq!(driver.current(), Some(3));
    assert_eq!(driver.renderer.current(), Some(3));
    assert!(!driver.engine.jump_to(5));
    assert_eq!(driver.current(), Some(3));
}

#[test]
fn previous_walks_back_and_stops_at_the_first_step() {
    let surface = home_surface();
    let mut driver = TourDriver::new(&surface, home_catalog());

    driver.start();
    assert!(driver.next());
    assert!(driver.previous());
    assert_eq!(driver.current(), Some(0));
    driver.previous();
    assert_eq!(driver.current(), Some(0));
    assert!(driver.engine.is_running());
}

#[test]
fn status_reflects_the_run() {
    let surface = home_surface();
    let mut driver = TourDriver::new(&surface, home_catalog());

    let idle = driver.engine.status();
    assert_eq!(idle.phase, TourPhase::Idle);
    assert_eq!(idle.current_step, None);
    assert_eq!(idle.context.id, ContextId::new("home"));

    driver.start();
    let showing = driver.engine.status();
    assert_eq!(showing.phase, TourPhase::Showing);
    assert_eq!(showing.current_step, Some(0));
    assert_eq!(showing.step_count, 5);
    assert!(!showing.advance_blocked);
    assert!(!showing.inert);
}

#[test]
fn unavailable_renderer_leaves_the_engine_inert() {
    let surface = home_surface();
    let renderer = FakeRenderer::failing(surface.clone(), "script not loaded");
    let mut driver = TourDriver::assemble(
        &surface,
        home_catalog(),
        TourConfig::default(),
        renderer,
        FakeFullscreen::new(),
        MemoryStorage::new(),
    );
    let before = surface.snapshot();

    let diagnostics = driver.engine.take_diagnostics();
    assert_eq!(diagnostics.len(), 1);
    assert!(matches!(diagnostics[0], TourError::RendererUnavailable(_)));

    assert_eq!(driver.start(), StartOutcome::Inert);
    assert_eq!(driver.auto_start(), StartOutcome::Inert);
    assert_eq!(driver.engine.restart_tutorial(), StartOutcome::Inert);
    assert_eq!(driver.engine.confirm_staging_prompt(), StartOutcome::Inert);
    driver.engine.dismiss_staging_prompt();
    assert_eq!(driver.fullscreen.prompts_shown(), 0);
    assert_eq!(driver.fullscreen.exits(), 0);
    driver.navigate("/elsewhere");
    driver.advance(1000);
    assert!(driver.engine.reset_page_tutorial(ResetScope::All).is_ok());

    assert!(driver.engine.status().inert);
    assert!(driver.engine.take_diagnostics().is_empty());
    assert_eq!(driver.renderer.calls(), vec![RendererCall::Configure]);
    surface.set_location("/");
    assert_eq!(surface.snapshot(), before);
}

#[test]
fn popover_drags_by_its_header_and_reattaches_per_step() {
    let surface = home_surface();
    let mut driver = TourDriver::new(&surface, home_catalog());
    driver.start();

    let parts = driver.renderer.popover().expect("popover shown");
    let header = parts.header.expect("popover has a header");
    assert_eq!(surface.bounding_rect_of(parts.root), Some(Rect::new(20, 68, 320, 140)));

    assert!(!driver.engine.pointer(PointerEvent::Down {
        target: parts.root,
        at: Point::new(30, 70),
    }));
    assert!(driver.engine.pointer(PointerEvent::Down {
        target: header,
        at: Point::new(30, 70),
    }));
    assert!(driver.engine.pointer(PointerEvent::Move {
        at: Point::new(130, 170),
    }));
    assert!(driver.engine.pointer(PointerEvent::Up));
    assert_eq!(surface.bounding_rect_of(parts.root), Some(Rect::new(120, 168, 320, 140)));

    assert!(driver.next());
    let fresh = driver.renderer.popover().expect("popover shown");
    assert_ne!(fresh.root, parts.root);
    let fresh_header = fresh.header.expect("popover has a header");
    assert!(driver.engine.pointer(PointerEvent::Down {
        target: fresh_header,
        at: Point::new(0, 0),
    }));
    assert!(driver.engine.pointer(PointerEvent::Up));

    driver.close();
    assert!(!driver.engine.pointer(PointerEvent::Down {
        target: fresh_header,
        at: Point::new(0, 0),
    }));
}
