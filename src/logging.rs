//! Logging setup for drivers embedding the engine
//!
//! The engine only emits through the `log` facade. Drivers call
//! [`init_logging`] once at startup to route it to stderr.

use log::LevelFilter;

/// Map a `-v` count to a level; `quiet` wins over verbosity
pub fn level_for(verbose: u8, quiet: bool) -> LevelFilter {
    if quiet {
        return LevelFilter::Error;
    }
    match verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    }
}

/// Install an `env_logger` at the level for `verbose`/`quiet`.
///
/// `RUST_LOG` still refines the filter. Calling this again is a no-op.
pub fn init_logging(verbose: u8, quiet: bool) {
    let _ = env_logger::Builder::new()
        .filter_level(level_for(verbose, quiet))
        .parse_default_env()
        .format_timestamp(None)
        .try_init();
}
