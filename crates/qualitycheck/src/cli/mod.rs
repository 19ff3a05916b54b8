//! Command-line interface for qualitycheck.
//!
//! This module provides the CLI structure and command handlers for the
//! `qcheck` binary.

mod commands;
pub mod render;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

pub use commands::{
    ConfigCommand, ExportCommand, HistoryCommand, OutputFormat, ParetoCommand, PendingCommand,
    PhotoCommand, StatusCommand, SubmitCommand, SummaryCommand,
};

/// qcheck - Quality inspection checklists
///
/// Record pass/fail checklist results per serial-numbered unit and review
/// approval rates, failure Pareto tables and full inspection history.
#[derive(Debug, Parser)]
#[command(name = "qcheck")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to custom configuration file
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Increase verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Inspector username
    #[arg(short, long, global = true, env = "QCHECK_USER")]
    pub user: Option<String>,

    /// Inspector password
    #[arg(long, global = true, env = "QCHECK_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// The command to execute
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Record a checklist for one unit
    Submit(SubmitCommand),

    /// Show unit approval counts
    Summary(SummaryCommand),

    /// Rank checklist items by failure count
    Pareto(ParetoCommand),

    /// List serials waiting for reinspection
    Pending(PendingCommand),

    /// Browse stored checklist rows
    History(HistoryCommand),

    /// Export the full history as CSV
    Export(ExportCommand),

    /// Extract the label photo of a serial
    Photo(PhotoCommand),

    /// List the configured checklist items
    Items,

    /// Show storage status
    Status(StatusCommand),

    /// View or validate configuration
    #[command(subcommand)]
    Config(ConfigCommand),
}

impl Cli {
    /// Get the verbosity level based on flags.
    #[must_use]
    pub fn verbosity(&self) -> crate::logging::Verbosity {
        crate::logging::Verbosity::from_flags(self.quiet, self.verbose)
    }
}
