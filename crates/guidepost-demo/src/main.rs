#![forbid(unsafe_code)]

//! Guidepost demo binary entry point.

use guidepost_demo::cli;
use guidepost_demo::walkthrough;
use tracing_subscriber::EnvFilter;

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("guidepost=info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn main() {
    let opts = cli::Opts::parse();
    init_logging();

    match walkthrough::run_from_opts(&opts) {
        Ok(report) if opts.json => println!("{}", report.to_json()),
        Ok(report) => println!("{report}"),
        Err(e) => {
            eprintln!("guidepost-demo: {e}");
            std::process::exit(1);
        }
    }
}
