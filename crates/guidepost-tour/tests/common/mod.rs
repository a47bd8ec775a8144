#![forbid(unsafe_code)]
#![allow(dead_code)]

//! Shared fixtures for the tour integration tests.
//!
//! [`TourDriver`] plays the host: it owns the engine plus test-side handles
//! of every fake, forwards renderer events after each input, and advances
//! time in small ticks the way a host event loop would.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use guidepost_harness::{FakeFullscreen, FakeRenderer, FakeSurface, Rect};
use guidepost_runtime::{KeyValueStore, MemoryStorage};
use guidepost_tour::{
    ContextRule, PathPattern, StartOutcome, StepSpec, TourCatalog, TourConfig, TourDefinition,
    TourEngine, HostBindings,
};
use tracing_subscriber::layer::{Context, SubscriberExt};

/// Host event-loop granularity.
pub const TICK: Duration = Duration::from_millis(10);

/// Upper bound on event-forwarding rounds per input.
const MAX_PUMP_ROUNDS: usize = 64;

pub struct TourDriver {
    pub engine: TourEngine,
    pub surface: FakeSurface,
    pub renderer: FakeRenderer,
    pub fullscreen: FakeFullscreen,
    pub storage: MemoryStorage,
}

impl TourDriver {
    pub fn new(surface: &FakeSurface, catalog: TourCatalog) -> Self {
        Self::with_config(surface, catalog, TourConfig::default())
    }

    pub fn with_config(surface: &FakeSurface, catalog: TourCatalog, config: TourConfig) -> Self {
        Self::build(
            surface,
            catalog,
            config,
            FakeFullscreen::new(),
            MemoryStorage::new(),
        )
    }

    pub fn build(
        surface: &FakeSurface,
        catalog: TourCatalog,
        config: TourConfig,
        fullscreen: FakeFullscreen,
        storage: MemoryStorage,
    ) -> Self {
        let renderer = FakeRenderer::new(surface.clone());
        Self::assemble(surface, catalog, config, renderer, fullscreen, storage)
    }

    pub fn assemble(
        surface: &FakeSurface,
        catalog: TourCatalog,
        config: TourConfig,
        renderer: FakeRenderer,
        fullscreen: FakeFullscreen,
        storage: MemoryStorage,
    ) -> Self {
        let host = HostBindings::new(surface.clone(), renderer.clone())
            .with_fullscreen(fullscreen.clone());
        let store = KeyValueStore::new(Box::new(storage.clone()));
        let engine = TourEngine::new(config, catalog, host, store);
        Self {
            engine,
            surface: surface.clone(),
            renderer,
            fullscreen,
            storage,
        }
    }

    /// Forward queued renderer events until none are left.
    pub fn pump(&mut self) -> usize {
        let mut forwarded = 0;
        for _ in 0..MAX_PUMP_ROUNDS {
            let events = self.renderer.take_events();
            if events.is_empty() {
                break;
            }
            for event in events {
                self.engine.handle_renderer_event(event);
                forwarded += 1;
            }
        }
        forwarded
    }

    pub fn start(&mut self) -> StartOutcome {
        let outcome = self.engine.start_tutorial();
        self.pump();
        outcome
    }

    pub fn auto_start(&mut self) -> StartOutcome {
        let outcome = self.engine.maybe_auto_start();
        self.pump();
        outcome
    }

    /// Press the advance control. False when the renderer ignored it.
    pub fn next(&mut self) -> bool {
        let pressed = self.renderer.press_next();
        self.pump();
        pressed
    }

    pub fn previous(&mut self) -> bool {
        let pressed = self.renderer.press_previous();
        self.pump();
        pressed
    }

    pub fn close(&mut self) {
        self.renderer.close();
        self.pump();
    }

    /// Advance time by `ms`, one tick at a time.
    pub fn advance(&mut self, ms: u64) {
        let mut left = Duration::from_millis(ms);
        while !left.is_zero() {
            let step = left.min(TICK);
            self.engine.advance_time(step);
            self.pump();
            left -= step;
        }
    }

    pub fn navigate(&mut self, location: &str) {
        self.surface.set_location(location);
        self.engine.navigate();
        self.pump();
    }

    pub fn change_field(&mut self, locator: &str, value: &str) {
        self.surface.set_field(locator, value);
        self.engine.field_changed(locator);
        self.pump();
    }

    pub fn engage_fullscreen(&mut self) {
        self.fullscreen.engage();
        self.engine.fullscreen_changed(true);
        self.pump();
    }

    /// Step through to the end of the running tour.
    pub fn finish(&mut self) {
        let mut guard = 0;
        while self.engine.is_running() && guard < 100 {
            self.next();
            guard += 1;
        }
    }

    pub fn current(&self) -> Option<usize> {
        self.engine.status().current_step
    }

    /// Targets of the running tour's steps.
    pub fn targets(&self) -> Vec<String> {
        self.renderer
            .steps()
            .into_iter()
            .map(|s| s.target)
            .collect()
    }

    /// Stored keys, sorted.
    pub fn stored_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.storage.snapshot().into_keys().collect();
        keys.sort();
        keys
    }
}

/// The landing page: five present targets and one that is missing.
pub fn home_surface() -> FakeSurface {
    let surface = FakeSurface::new("/");
    surface.add("#search", Rect::new(20, 20, 400, 40));
    surface.add("#chat", Rect::new(20, 80, 600, 400));
    surface.add("#composer", Rect::new(20, 500, 600, 60));
    surface.add("#history", Rect::new(640, 80, 300, 400));
    surface.add("#settings", Rect::new(1200, 20, 40, 40));
    surface
}

pub fn home_steps() -> Vec<StepSpec> {
    vec![
        StepSpec::new("#search", "Search", "Find anything"),
        StepSpec::new("#chat", "Chat", "Talk here"),
        StepSpec::new("#composer", "Composer", "Write a message"),
        StepSpec::new("#gone", "Gone", "This feature was removed"),
        StepSpec::new("#history", "History", "Earlier conversations"),
        StepSpec::new("#settings", "Settings", "Tune things"),
    ]
}

pub fn home_catalog() -> TourCatalog {
    TourCatalog::new()
        .with_rule(ContextRule::new(PathPattern::Exact("/".into()), "home"))
        .with_tour(TourDefinition::new("home", home_steps()))
}

/// Catalog with a single context `ctx` at `path`.
pub fn single_catalog(path: &str, definition: TourDefinition) -> TourCatalog {
    let context = definition.context.clone();
    TourCatalog::new()
        .with_rule(ContextRule::new(PathPattern::Exact(path.into()), context))
        .with_tour(definition)
}

// ---------------------------------------------------------------------------
// Log capture
// ---------------------------------------------------------------------------

/// One captured log event.
#[derive(Debug, Clone)]
pub struct CapturedEvent {
    pub level: tracing::Level,
    pub message: String,
    pub fields: BTreeMap<String, String>,
}

#[derive(Default)]
struct FieldVisitor {
    message: String,
    fields: BTreeMap<String, String>,
}

impl tracing::field::Visit for FieldVisitor {
    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
        let text = format!("{value:?}");
        if field.name() == "message" {
            self.message = text;
        } else {
            self.fields.insert(field.name().to_string(), text);
        }
    }

    fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
        if field.name() == "message" {
            self.message = value.to_string();
        } else {
            self.fields.insert(field.name().to_string(), value.to_string());
        }
    }
}

struct EventCapture {
    events: Arc<Mutex<Vec<CapturedEvent>>>,
}

impl<S: tracing::Subscriber> tracing_subscriber::Layer<S> for EventCapture {
    fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
        let mut visitor = FieldVisitor::default();
        event.record(&mut visitor);
        if let Ok(mut events) = self.events.lock() {
            events.push(CapturedEvent {
                level: *event.metadata().level(),
                message: visitor.message,
                fields: visitor.fields,
            });
        }
    }
}

/// Run `f` with a subscriber that records every event, and return them.
pub fn capture_logs<R>(f: impl FnOnce() -> R) -> (R, Vec<CapturedEvent>) {
    let events = Arc::new(Mutex::new(Vec::new()));
    let layer = EventCapture {
        events: events.clone(),
    };
    let subscriber = tracing_subscriber::registry().with(layer);
    let out = tracing::subscriber::with_default(subscriber, f);
    let captured = events.lock().map(|e| e.clone()).unwrap_or_default();
    (out, captured)
}
