#![forbid(unsafe_code)]

//! Structured log output of the engine.

mod common;

use common::{TourDriver, capture_logs, home_catalog, home_surface};
use guidepost_harness::{FakeFullscreen, FakeRenderer};
use guidepost_runtime::MemoryStorage;
use guidepost_tour::TourConfig;
use pretty_assertions::assert_eq;
use tracing::Level;

#[test]
fn dropped_step_is_warned_with_its_locator() {
    let (_, events) = capture_logs(|| {
        let surface = home_surface();
        let mut driver = TourDriver::new(&surface, home_catalog());
        driver.start();
    });

    let dropped: Vec<_> = events
        .iter()
        .filter(|e| e.level == Level::WARN && e.message == "tour target missing, step dropped")
        .collect();
    assert_eq!(dropped.len(), 1);
    assert_eq!(
        dropped[0].fields.get("target_locator").map(String::as_str),
        Some("#gone")
    );
}

#[test]
fn unavailable_renderer_is_logged_once_as_an_error() {
    let (_, events) = capture_logs(|| {
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
        driver.start();
        driver.auto_start();
        driver.advance(100);
    });

    let errors: Vec<_> = events.iter().filter(|e| e.level == Level::ERROR).collect();
    assert_eq!(errors.len(), 1);
    assert!(errors[0].message.contains("renderer unavailable"));
    assert!(errors[0].fields["error"].contains("script not loaded"));
}

#[test]
fn tour_end_is_logged_with_its_reason() {
    let (_, events) = capture_logs(|| {
        let surface = home_surface();
        let mut driver = TourDriver::new(&surface, home_catalog());
        driver.start();
        driver.finish();
        driver.start();
        driver.close();
    });

    let reasons: Vec<&str> = events
        .iter()
        .filter(|e| e.level == Level::INFO && e.message == "tour ended")
        .filter_map(|e| e.fields.get("reason").map(String::as_str))
        .collect();
    assert_eq!(reasons, vec!["completed", "closed"]);

    let started = events
        .iter()
        .filter(|e| e.message == "tour started")
        .count();
    assert_eq!(started, 2);
}
