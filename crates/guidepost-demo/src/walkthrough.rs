#![forbid(unsafe_code)]

//! A scripted user walking through a tour on an in-memory host page.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use guidepost_core::surface::HostSurface;
use guidepost_harness::{FakeRenderer, FakeSurface, Rect};
use guidepost_runtime::KeyValueStore;
use guidepost_tour::{
    Condition, ConfigError, ContextCapabilities, ContextRule, HostBindings, PathPattern,
    StartOutcome, StepSpec, TourCatalog, TourConfig, TourDefinition, TourEngine, TourPhase,
};
use serde_json::{Value, json};
use tracing::{info, warn};

use crate::cli::Opts;

/// Longest a start may wait on readiness or staging.
const MAX_START_WAIT: Duration = Duration::from_secs(30);
/// Longest a run may take before the scripted user closes it.
const MAX_RUN: Duration = Duration::from_secs(120);
/// Upper bound on event-forwarding rounds per input.
const MAX_PUMP_ROUNDS: usize = 64;

/// Text the scripted user types into a guarded field.
const TYPED_TEXT: &str = "Hello from the walkthrough";

/// Failure to set up a walkthrough.
#[derive(Debug)]
pub enum DemoError {
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    Config {
        path: PathBuf,
        source: ConfigError,
    },
}

impl fmt::Display for DemoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Read { path, source } => write!(f, "cannot read {}: {source}", path.display()),
            Self::Config { path, source } => write!(f, "invalid {}: {source}", path.display()),
        }
    }
}

impl std::error::Error for DemoError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Read { source, .. } => Some(source),
            Self::Config { source, .. } => Some(source),
        }
    }
}

/// One step as the user saw it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepVisit {
    pub index: usize,
    pub target: String,
    pub title: String,
    /// Engine time when the step first showed.
    pub at: Duration,
}

/// Outcome of one walkthrough.
#[derive(Debug, Clone, PartialEq)]
pub struct Report {
    pub context: String,
    pub outcome: StartOutcome,
    pub visited: Vec<StepVisit>,
    /// The user advanced past the last step.
    pub completed: bool,
    /// Every host element is back to its pre-tour state.
    pub host_restored: bool,
    /// Fields the user filled to satisfy advance guards.
    pub filled_fields: Vec<String>,
    pub diagnostics: Vec<String>,
    pub elapsed: Duration,
}

impl Report {
    #[must_use]
    pub fn to_json(&self) -> Value {
        json!({
            "context": self.context,
            "outcome": format!("{:?}", self.outcome),
            "visited": self.visited.iter().map(|v| json!({
                "index": v.index,
                "target": v.target,
                "title": v.title,
                "at_ms": v.at.as_millis() as u64,
            })).collect::<Vec<_>>(),
            "completed": self.completed,
            "host_restored": self.host_restored,
            "filled_fields": self.filled_fields,
            "diagnostics": self.diagnostics,
            "elapsed_ms": self.elapsed.as_millis() as u64,
        })
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "context: {} ({:?})", self.context, self.outcome)?;
        for visit in &self.visited {
            writeln!(
                f,
                "  {:>6}ms  step {}  {:<12} {}",
                visit.at.as_millis(),
                visit.index + 1,
                visit.target,
                visit.title
            )?;
        }
        for field in &self.filled_fields {
            writeln!(f, "  filled {field}")?;
        }
        for diagnostic in &self.diagnostics {
            writeln!(f, "  note: {diagnostic}")?;
        }
        write!(
            f,
            "completed: {}  host restored: {}  elapsed: {}ms",
            self.completed,
            self.host_restored,
            self.elapsed.as_millis()
        )
    }
}

/// The engine plus the host side the scripted user acts on.
pub struct Walkthrough {
    engine: TourEngine,
    surface: FakeSurface,
    renderer: FakeRenderer,
    tick: Duration,
}

impl Walkthrough {
    pub fn new(
        surface: FakeSurface,
        catalog: TourCatalog,
        config: TourConfig,
        store: KeyValueStore,
        tick: Duration,
    ) -> Self {
        let renderer = FakeRenderer::new(surface.clone());
        let host = HostBindings::new(surface.clone(), renderer.clone());
        let engine = TourEngine::new(config, catalog, host, store);
        Self {
            engine,
            surface,
            renderer,
            tick: tick.max(Duration::from_millis(1)),
        }
    }

    pub fn engine(&mut self) -> &mut TourEngine {
        &mut self.engine
    }

    /// Start the page's tour and step through it, spending `dwell` on each
    /// step.
    pub fn run(&mut self, auto: bool, dwell: Duration) -> Report {
        let before = self.surface.snapshot()["elements"].clone();
        let started_at = self.engine.now();
        let outcome = if auto {
            self.engine.maybe_auto_start()
        } else {
            self.engine.start_tutorial()
        };
        self.pump();
        let context = self.engine.context().id.to_string();
        info!(context = %context, ?outcome, "walkthrough started");
        self.await_start();

        let mut visited: Vec<StepVisit> = Vec::new();
        let mut filled_fields = Vec::new();
        let mut completed = false;
        let mut last_shown = None;
        while self.engine.is_running() && self.engine.now() - started_at < MAX_RUN {
            let current = self.renderer.current();
            if current != last_shown {
                if let Some(index) = current {
                    self.record_visit(index, &mut visited);
                }
                last_shown = current;
            }

            self.advance(dwell);
            if !self.engine.is_running() {
                break;
            }
            let on_last = current.is_some_and(|i| i + 1 == self.renderer.steps().len());
            if self.renderer.press_next() {
                self.pump();
                completed = on_last && !self.engine.is_running();
            } else if let Some(field) = self.fill_guarded_field() {
                if !filled_fields.contains(&field) {
                    filled_fields.push(field);
                }
            }
        }
        if self.engine.is_running() {
            warn!(context = %context, "walkthrough took too long, closing the tour");
            self.renderer.close();
            self.pump();
        }

        let host_restored = self.surface.snapshot()["elements"] == before;
        let diagnostics = self
            .engine
            .take_diagnostics()
            .iter()
            .map(ToString::to_string)
            .collect();
        Report {
            context,
            outcome,
            visited,
            completed,
            host_restored,
            filled_fields,
            diagnostics,
            elapsed: self.engine.now() - started_at,
        }
    }

    /// Let a pending start resolve: readiness polling, or the staging
    /// prompt, which the scripted user always confirms.
    fn await_start(&mut self) {
        let deadline = self.engine.now() + MAX_START_WAIT;
        while !self.engine.is_running() && self.engine.now() < deadline {
            match self.engine.status().phase {
                TourPhase::Idle => return,
                TourPhase::AwaitingConfirmation => {
                    self.engine.confirm_staging_prompt();
                    self.pump();
                }
                _ => self.advance(self.tick),
            }
        }
    }

    fn record_visit(&self, index: usize, visited: &mut Vec<StepVisit>) {
        let Some(step) = self.renderer.steps().into_iter().nth(index) else {
            return;
        };
        info!(index, target = %step.target, title = %step.title, "step shown");
        visited.push(StepVisit {
            index,
            target: step.target,
            title: step.title,
            at: self.engine.now(),
        });
    }

    /// Type into the field an advance guard of the current step waits on.
    fn fill_guarded_field(&mut self) -> Option<String> {
        let status = self.engine.status();
        let index = status.current_step?;
        let target = self.renderer.steps().into_iter().nth(index)?.target;
        let definition = self.engine.catalog().definition(&status.context.id)?;
        let (locator, value) = match &definition.guard_for(&target)?.condition {
            Condition::FieldNonEmpty { locator } => (locator.clone(), TYPED_TEXT.to_string()),
            Condition::FieldEquals { locator, value } => (locator.clone(), value.clone()),
            _ => return None,
        };
        if self.surface.field_value(&locator).as_deref() == Some(value.as_str()) {
            return None;
        }
        info!(field = %locator, "scripted user fills the guarded field");
        self.surface.set_field(&locator, &value);
        self.engine.field_changed(&locator);
        self.pump();
        Some(locator)
    }

    fn pump(&mut self) {
        for _ in 0..MAX_PUMP_ROUNDS {
            let events = self.renderer.take_events();
            if events.is_empty() {
                break;
            }
            for event in events {
                self.engine.handle_renderer_event(event);
            }
        }
    }

    fn advance(&mut self, total: Duration) {
        let mut left = total;
        while !left.is_zero() {
            let step = left.min(self.tick);
            self.engine.advance_time(step);
            self.pump();
            left -= step;
        }
    }
}

/// Build the walkthrough described by `opts` and run it.
pub fn run_from_opts(opts: &Opts) -> Result<Report, DemoError> {
    let catalog = match &opts.catalog {
        Some(path) => {
            let text = read(path)?;
            TourCatalog::from_json_str(&text).map_err(|source| DemoError::Config {
                path: path.clone(),
                source,
            })?
        }
        None => sample_catalog(),
    };
    let config = match &opts.config {
        Some(path) => {
            let text = read(path)?;
            TourConfig::from_json_str(&text).map_err(|source| DemoError::Config {
                path: path.clone(),
                source,
            })?
        }
        None => TourConfig::default(),
    };

    let mut walkthrough = Walkthrough::new(
        sample_surface(&opts.page),
        catalog,
        config,
        open_store(opts.state.as_deref()),
        Duration::from_millis(opts.tick_ms),
    );
    if opts.reset {
        if let Err(err) = walkthrough.engine().reset_all_tutorials() {
            warn!(error = %err, "could not reset seen flags");
        }
    }
    Ok(walkthrough.run(opts.auto, Duration::from_millis(opts.dwell_ms)))
}

fn read(path: &Path) -> Result<String, DemoError> {
    std::fs::read_to_string(path).map_err(|source| DemoError::Read {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(feature = "state-persistence")]
fn open_store(state: Option<&Path>) -> KeyValueStore {
    match state {
        Some(path) => KeyValueStore::with_file(path),
        None => KeyValueStore::in_memory(),
    }
}

#[cfg(not(feature = "state-persistence"))]
fn open_store(state: Option<&Path>) -> KeyValueStore {
    if let Some(path) = state {
        warn!(
            path = %path.display(),
            "built without state-persistence; seen flags stay in memory"
        );
    }
    KeyValueStore::in_memory()
}

/// The demo host page at `location`.
#[must_use]
pub fn sample_surface(location: &str) -> FakeSurface {
    let surface = FakeSurface::new(location);
    surface.add("body", Rect::new(0, 0, 1280, 800));
    surface.add("#help", Rect::new(1220, 740, 40, 40));
    if location.starts_with("/settings") {
        surface.add("#profile", Rect::new(20, 20, 600, 200));
        surface.add("#theme", Rect::new(20, 240, 600, 120));
        surface.add("#save", Rect::new(20, 380, 120, 40));
    } else {
        surface.add("#search", Rect::new(20, 20, 400, 40));
        surface.add("#chat", Rect::new(20, 80, 600, 400));
        surface.add("#composer", Rect::new(20, 500, 600, 60));
        let history = surface.add("#history", Rect::new(640, 80, 300, 400));
        surface.put_classes(history, &["panel", "hidden"]);
        let notifications = surface.add("#notifications", Rect::new(960, 80, 300, 200));
        surface.put_style(notifications, Some("pointer-events: auto"));
    }
    surface
}

/// Tours for the demo page: a home tour with a guarded step and a hidden
/// panel, a settings tour, and an end hint pointing at help.
#[must_use]
pub fn sample_catalog() -> TourCatalog {
    let home = TourDefinition::new(
        "home",
        vec![
            StepSpec::new("#search", "Search", "Find any conversation or file."),
            StepSpec::new("#chat", "Chat", "Your conversation appears here."),
            StepSpec::new("#composer", "Composer", "Type a message to continue.").interactive(),
            StepSpec::new("#history", "History", "Earlier conversations live here."),
        ],
    )
    .with_capabilities(ContextCapabilities {
        disable_page_scroll: true,
        competing_surfaces: vec!["#notifications".into()],
        ..ContextCapabilities::default()
    })
    .with_guard(
        "#composer",
        Condition::FieldNonEmpty {
            locator: "#composer".into(),
        },
    );

    let settings = TourDefinition::new(
        "settings",
        vec![
            StepSpec::new("#profile", "Profile", "Your name and avatar."),
            StepSpec::new("#theme", "Theme", "Light, dark, or follow the system."),
            StepSpec::new("#save", "Save", "Nothing changes until you save."),
        ],
    );

    TourCatalog::new()
        .with_rule(ContextRule::new(PathPattern::Exact("/".into()), "home"))
        .with_rule(ContextRule::new(PathPattern::Prefix("/settings".into()), "settings"))
        .with_tour(home)
        .with_tour(settings)
        .with_end_hint(
            "home",
            StepSpec::new("#help", "More tours", "Replay any tour from the help menu."),
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn walkthrough(page: &str) -> Walkthrough {
        Walkthrough::new(
            sample_surface(page),
            sample_catalog(),
            TourConfig::default(),
            KeyValueStore::in_memory(),
            Duration::from_millis(10),
        )
    }

    #[test]
    fn home_walkthrough_visits_every_step_and_restores_the_page() {
        let mut demo = walkthrough("/");
        let report = demo.run(false, Duration::from_millis(400));

        assert_eq!(report.outcome, StartOutcome::Started { steps: 5 });
        let targets: Vec<&str> = report.visited.iter().map(|v| v.target.as_str()).collect();
        assert_eq!(targets, vec!["#search", "#chat", "#composer", "#history", "#help"]);
        assert_eq!(report.filled_fields, vec!["#composer"]);
        assert!(report.completed);
        assert!(report.host_restored);
        assert!(report.diagnostics.is_empty());
    }

    #[test]
    fn auto_start_runs_once_per_store() {
        let mut demo = walkthrough("/settings");
        let first = demo.run(true, Duration::from_millis(100));
        assert_eq!(first.outcome, StartOutcome::Started { steps: 3 });
        assert!(first.completed);

        let second = demo.run(true, Duration::from_millis(100));
        assert_eq!(second.outcome, StartOutcome::AlreadySeen);
        assert!(second.visited.is_empty());
        assert!(!second.completed);
    }

    #[test]
    fn unknown_page_has_nothing_to_show() {
        let mut demo = walkthrough("/billing");
        let report = demo.run(false, Duration::from_millis(100));
        assert_eq!(report.outcome, StartOutcome::NoTour);
        assert_eq!(report.context, "unknown");
        assert!(report.host_restored);
    }

    #[test]
    fn report_serializes_visits() {
        let mut demo = walkthrough("/settings");
        let json = demo.run(false, Duration::from_millis(100)).to_json();
        assert_eq!(json["context"], "settings");
        assert_eq!(json["visited"].as_array().map(Vec::len), Some(3));
        assert_eq!(json["visited"][1]["target"], "#theme");
        assert_eq!(json["completed"], true);
    }

    #[test]
    fn missing_catalog_file_is_reported() {
        let opts = Opts {
            catalog: Some(PathBuf::from("/nonexistent/guidepost/catalog.json")),
            ..Opts::default()
        };
        let err = run_from_opts(&opts).err().map(|e| e.to_string());
        assert!(err.is_some_and(|e| e.starts_with("cannot read")));
    }

    #[cfg(feature = "state-persistence")]
    #[test]
    fn state_file_remembers_seen_tours_between_runs() {
        let dir = tempfile::TempDir::new().expect("temp dir");
        let opts = Opts {
            page: "/settings".into(),
            state: Some(dir.path().join("flags.json")),
            dwell_ms: 50,
            auto: true,
            ..Opts::default()
        };
        let first = run_from_opts(&opts).expect("first run");
        assert!(first.completed);
        let second = run_from_opts(&opts).expect("second run");
        assert_eq!(second.outcome, StartOutcome::AlreadySeen);

        let reset = Opts {
            reset: true,
            ..opts
        };
        let third = run_from_opts(&reset).expect("third run");
        assert_eq!(third.outcome, StartOutcome::Started { steps: 3 });
    }
}
