#![forbid(unsafe_code)]

//! Command-line argument parsing for the walkthrough demo.
//!
//! Parses args manually. Environment variables with the `GUIDEPOST_DEMO_*`
//! prefix provide defaults that explicit flags override.

use std::env;
use std::fmt;
use std::path::PathBuf;
use std::process;

const VERSION: &str = env!("CARGO_PKG_VERSION");

const HELP_TEXT: &str = "\
Guidepost Demo: a scripted guided tour over an in-memory host page

USAGE:
    guidepost-demo [OPTIONS]

OPTIONS:
    --page=PATH          Location to open: '/' (default) or '/settings'
    --catalog=FILE       Load the tour catalog from a JSON file
    --config=FILE        Load engine timings and keys from a JSON file
    --state=FILE         Keep seen flags in FILE between runs
    --dwell-ms=N         Time spent on each step before advancing (default: 400)
    --tick-ms=N          Host event-loop granularity (default: 10)
    --auto               Start only if the page's tour was not seen yet
    --reset              Forget every seen flag before starting
    --json               Print the run report as JSON
    --help, -h           Show this help message
    --version, -V        Show version

ENVIRONMENT VARIABLES:
    GUIDEPOST_DEMO_PAGE        Override --page
    GUIDEPOST_DEMO_CATALOG     Override --catalog
    GUIDEPOST_DEMO_CONFIG      Override --config
    GUIDEPOST_DEMO_STATE       Override --state
    GUIDEPOST_DEMO_DWELL_MS    Override --dwell-ms
    GUIDEPOST_DEMO_TICK_MS     Override --tick-ms
    RUST_LOG                   Log filter (default: guidepost=info)";

/// Parsed command-line options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Opts {
    /// Host location the page opens at.
    pub page: String,
    /// Catalog JSON file; the built-in catalog when `None`.
    pub catalog: Option<PathBuf>,
    /// Config JSON file; defaults when `None`.
    pub config: Option<PathBuf>,
    /// Seen-flag file; session memory when `None`.
    pub state: Option<PathBuf>,
    /// Milliseconds spent on each step.
    pub dwell_ms: u64,
    /// Milliseconds per host tick.
    pub tick_ms: u64,
    pub auto: bool,
    pub reset: bool,
    pub json: bool,
}

impl Default for Opts {
    fn default() -> Self {
        Self {
            page: "/".into(),
            catalog: None,
            config: None,
            state: None,
            dwell_ms: 400,
            tick_ms: 10,
            auto: false,
            reset: false,
            json: false,
        }
    }
}

/// What the command line asked for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Run(Opts),
    Help,
    Version,
}

/// A flag the parser could not accept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CliError {
    InvalidValue { flag: &'static str, value: String },
    UnknownArgument(String),
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidValue { flag, value } => write!(f, "Invalid {flag} value: {value}"),
            Self::UnknownArgument(arg) => write!(f, "Unknown argument: {arg}"),
        }
    }
}

impl std::error::Error for CliError {}

impl Opts {
    /// Parse the process arguments and environment, exiting on `--help`,
    /// `--version`, or a bad flag.
    pub fn parse() -> Self {
        let args = env::args().skip(1);
        match Self::parse_from(args, |name| env::var(name).ok()) {
            Ok(Command::Run(opts)) => opts,
            Ok(Command::Help) => {
                println!("{HELP_TEXT}");
                process::exit(0);
            }
            Ok(Command::Version) => {
                println!("guidepost-demo {VERSION}");
                process::exit(0);
            }
            Err(err) => {
                eprintln!("{err}");
                eprintln!("Run with --help for usage information.");
                process::exit(1);
            }
        }
    }

    /// Parse `args` with `var` as the environment lookup.
    pub fn parse_from<I, F>(args: I, var: F) -> Result<Command, CliError>
    where
        I: IntoIterator<Item = String>,
        F: Fn(&str) -> Option<String>,
    {
        let mut opts = Self::default();

        // Environment defaults first
        if let Some(val) = var("GUIDEPOST_DEMO_PAGE") {
            opts.page = val;
        }
        if let Some(val) = var("GUIDEPOST_DEMO_CATALOG") {
            opts.catalog = Some(PathBuf::from(val));
        }
        if let Some(val) = var("GUIDEPOST_DEMO_CONFIG") {
            opts.config = Some(PathBuf::from(val));
        }
        if let Some(val) = var("GUIDEPOST_DEMO_STATE") {
            opts.state = Some(PathBuf::from(val));
        }
        if let Some(n) = var("GUIDEPOST_DEMO_DWELL_MS").and_then(|v| v.parse().ok()) {
            opts.dwell_ms = n;
        }
        if let Some(n) = var("GUIDEPOST_DEMO_TICK_MS").and_then(|v| v.parse().ok()) {
            opts.tick_ms = n;
        }

        for arg in args {
            match arg.as_str() {
                "--help" | "-h" => return Ok(Command::Help),
                "--version" | "-V" => return Ok(Command::Version),
                "--auto" => opts.auto = true,
                "--reset" => opts.reset = true,
                "--json" => opts.json = true,
                other => {
                    if let Some(val) = other.strip_prefix("--page=") {
                        opts.page = val.to_string();
                    } else if let Some(val) = other.strip_prefix("--catalog=") {
                        opts.catalog = Some(PathBuf::from(val));
                    } else if let Some(val) = other.strip_prefix("--config=") {
                        opts.config = Some(PathBuf::from(val));
                    } else if let Some(val) = other.strip_prefix("--state=") {
                        opts.state = Some(PathBuf::from(val));
                    } else if let Some(val) = other.strip_prefix("--dwell-ms=") {
                        opts.dwell_ms = parse_number("--dwell-ms", val)?;
                    } else if let Some(val) = other.strip_prefix("--tick-ms=") {
                        opts.tick_ms = parse_number("--tick-ms", val)?;
                        if opts.tick_ms == 0 {
                            return Err(CliError::InvalidValue {
                                flag: "--tick-ms",
                                value: val.to_string(),
                            });
                        }
                    } else {
                        return Err(CliError::UnknownArgument(other.to_string()));
                    }
                }
            }
        }

        if opts.tick_ms == 0 {
            opts.tick_ms = Self::default().tick_ms;
        }
        Ok(Command::Run(opts))
    }
}

fn parse_number(flag: &'static str, val: &str) -> Result<u64, CliError> {
    val.parse().map_err(|_| CliError::InvalidValue {
        flag,
        value: val.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn default_opts() {
        let opts = Opts::default();
        assert_eq!(opts.page, "/");
        assert_eq!(opts.dwell_ms, 400);
        assert_eq!(opts.tick_ms, 10);
        assert!(!opts.auto);
        assert!(opts.state.is_none());
    }

    #[test]
    fn flags_are_parsed() {
        let cmd = Opts::parse_from(
            args(&["--page=/settings", "--auto", "--json", "--dwell-ms=50", "--state=/tmp/f.json"]),
            no_env,
        );
        let opts = match cmd {
            Ok(Command::Run(opts)) => opts,
            other => panic!("expected run, got {other:?}"),
        };
        assert_eq!(opts.page, "/settings");
        assert!(opts.auto);
        assert!(opts.json);
        assert_eq!(opts.dwell_ms, 50);
        assert_eq!(opts.state, Some(PathBuf::from("/tmp/f.json")));
    }

    #[test]
    fn flags_override_environment() {
        let env = |name: &str| match name {
            "GUIDEPOST_DEMO_PAGE" => Some("/settings".to_string()),
            "GUIDEPOST_DEMO_DWELL_MS" => Some("900".to_string()),
            "GUIDEPOST_DEMO_TICK_MS" => Some("not a number".to_string()),
            _ => None,
        };
        let Ok(Command::Run(from_env)) = Opts::parse_from(Vec::new(), env) else {
            panic!("expected run");
        };
        assert_eq!(from_env.page, "/settings");
        assert_eq!(from_env.dwell_ms, 900);
        assert_eq!(from_env.tick_ms, 10);

        let Ok(Command::Run(overridden)) = Opts::parse_from(args(&["--page=/"]), env) else {
            panic!("expected run");
        };
        assert_eq!(overridden.page, "/");
    }

    #[test]
    fn help_and_version_short_circuit() {
        assert_eq!(Opts::parse_from(args(&["-h", "--bogus"]), no_env), Ok(Command::Help));
        assert_eq!(Opts::parse_from(args(&["--version"]), no_env), Ok(Command::Version));
    }

    #[test]
    fn bad_values_are_rejected() {
        assert_eq!(
            Opts::parse_from(args(&["--dwell-ms=soon"]), no_env),
            Err(CliError::InvalidValue {
                flag: "--dwell-ms",
                value: "soon".into(),
            })
        );
        assert!(Opts::parse_from(args(&["--tick-ms=0"]), no_env).is_err());
        assert_eq!(
            Opts::parse_from(args(&["--screen=2"]), no_env),
            Err(CliError::UnknownArgument("--screen=2".into()))
        );
    }

    #[test]
    fn version_string_nonempty() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn help_text_lists_environment_overrides() {
        assert!(HELP_TEXT.contains("GUIDEPOST_DEMO_PAGE"));
        assert!(HELP_TEXT.contains("GUIDEPOST_DEMO_STATE"));
    }
}
