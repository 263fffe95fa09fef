//! Tracing setup for the `cnotes` binary and the library's tests.
//!
//! Log lines go to stderr so that `--json` output on stdout stays parseable.
//! `RUST_LOG`, when set, replaces the directive derived from the CLI flags.

use tracing::Level;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// How chatty the process is, as picked by `-q` / `-v` / `-vv`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Verbosity {
    /// `-q`: errors only.
    Quiet,
    /// No flag: startup, backend selection and warnings.
    #[default]
    Normal,
    /// `-v`: store mutations and per-request HTTP traces.
    Verbose,
    /// `-vv`: everything, including backend wire calls.
    Trace,
}

impl Verbosity {
    /// The level applied to this crate's own targets.
    #[must_use]
    pub fn to_level_filter(&self) -> Level {
        match self {
            Self::Quiet => Level::ERROR,
            Self::Normal => Level::INFO,
            Self::Verbose => Level::DEBUG,
            Self::Trace => Level::TRACE,
        }
    }

    /// The default `EnvFilter` directive for this verbosity.
    ///
    /// Request tracing from `tower_http` only shows up from `Verbose` on.
    #[must_use]
    pub fn directive(&self) -> String {
        let level = self.to_level_filter();
        let http_level = match self {
            Self::Quiet => Level::ERROR,
            Self::Normal => Level::WARN,
            Self::Verbose | Self::Trace => level,
        };
        format!("companynotes={level},cnotes={level},tower_http={http_level}")
    }
}

/// Install the global subscriber. Later calls are no-ops.
///
/// ```no_run
/// use companynotes::{init_logging, logging::Verbosity};
///
/// init_logging(Verbosity::Verbose);
/// ```
pub fn init_logging(verbosity: Verbosity) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(verbosity.directive()));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_file(false)
                .with_line_number(false),
        )
        .try_init();
}

/// Route warnings from code under test through the test harness's capture.
#[cfg(test)]
pub fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("warn")
        .with_test_writer()
        .try_init();
}
