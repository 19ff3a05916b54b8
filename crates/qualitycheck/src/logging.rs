//! Diagnostics for the library and the `qcheck` binary.
//!
//! Everything goes to stderr so report output on stdout stays pipeable into
//! files and other tools. `RUST_LOG` replaces the flag-derived filter.

use std::io::IsTerminal;

use tracing::Level;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Tracing targets emitted by this project: the library and the binary.
const TARGETS: [&str; 2] = ["qualitycheck", "qcheck"];

/// Verbosity level for logging output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Verbosity {
    /// Errors only.
    Quiet,
    /// Submissions, exports and retries (info and above).
    #[default]
    Normal,
    /// Store access and batch detail (debug and above).
    Verbose,
    /// Everything.
    Trace,
}

impl Verbosity {
    /// Derive verbosity from `-q` and repeated `-v` flags.
    ///
    /// Quiet wins over any number of `-v`.
    #[must_use]
    pub fn from_flags(quiet: bool, verbose: u8) -> Self {
        if quiet {
            return Self::Quiet;
        }
        match verbose {
            0 => Self::Normal,
            1 => Self::Verbose,
            _ => Self::Trace,
        }
    }

    /// Convert verbosity to tracing level filter.
    #[must_use]
    pub fn to_level_filter(&self) -> Level {
        match self {
            Self::Quiet => Level::ERROR,
            Self::Normal => Level::INFO,
            Self::Verbose => Level::DEBUG,
            Self::Trace => Level::TRACE,
        }
    }

    /// Filter directive covering every project target at this level.
    ///
    /// Dependencies stay at their defaults (off).
    #[must_use]
    pub fn directive(&self) -> String {
        let level = self.to_level_filter();
        TARGETS
            .iter()
            .map(|target| format!("{target}={level}"))
            .collect::<Vec<_>>()
            .join(",")
    }
}

/// Initialize the logging system.
///
/// Call once at startup; later calls are ignored. A valid `RUST_LOG`
/// overrides `verbosity`.
///
/// # Examples
///
/// ```no_run
/// use qualitycheck::{init_logging, logging::Verbosity};
///
/// init_logging(Verbosity::Verbose);
/// ```
pub fn init_logging(verbosity: Verbosity) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(verbosity.directive()));

    let subscriber = tracing_subscriber::registry().with(env_filter).with(
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_ansi(std::io::stderr().is_terminal())
            .with_target(verbosity != Verbosity::Normal),
    );

    let _ = subscriber.try_init();
}
