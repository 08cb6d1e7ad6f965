//! Stderr log output for the library crates' `log` records

use tracing_subscriber::filter::{Directive, EnvFilter, LevelFilter};

/// Crates whose records reach the terminal
const TARGETS: &[&str] = &["sp_core", "sp_sql", "sp_warehouse", "sp_convert", "sp_cli"];

/// Level for the global flags: warnings by default, everything with
/// `--verbose`, nothing with `--quiet`
pub(crate) fn level_for(verbose: bool, quiet: bool) -> LevelFilter {
    if quiet {
        LevelFilter::OFF
    } else if verbose {
        LevelFilter::DEBUG
    } else {
        LevelFilter::WARN
    }
}

/// Filter that passes `level` for our crates and silences dependencies
pub(crate) fn filter_for(level: LevelFilter) -> EnvFilter {
    TARGETS
        .iter()
        .filter_map(|target| format!("{}={}", target, level).parse::<Directive>().ok())
        .fold(EnvFilter::new("off"), EnvFilter::add_directive)
}

pub(crate) fn init(level: LevelFilter) {
    // a second init (tests) keeps the first subscriber
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter_for(level))
        .with_writer(std::io::stderr)
        .without_time()
        .with_target(false)
        .try_init();
}

#[cfg(test)]
#[path = "logging_test.rs"]
mod tests;
