//! CLI command definitions.
//!
//! This module defines the structure of all CLI subcommands.

use std::collections::HashMap;
use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Args, Subcommand, ValueEnum};

use crate::checklist::{ItemResult, Status, Submission};
use crate::error::{Error, Result};
use crate::photo::LabelPhoto;

/// Submit command arguments.
#[derive(Debug, Args)]
pub struct SubmitCommand {
    /// Serial number of the inspected unit
    pub serial: String,

    /// Result for one item, e.g. `Solder=nc` (repeatable)
    #[arg(short, long = "status", value_name = "ITEM=STATUS", value_parser = parse_assignment)]
    pub statuses: Vec<(String, String)>,

    /// Status for every item not given with --status
    #[arg(long, value_name = "STATUS")]
    pub all: Option<String>,

    /// Notes for one item, e.g. `Paint=scratch on lid` (repeatable)
    #[arg(short, long = "note", value_name = "ITEM=TEXT", value_parser = parse_assignment)]
    pub notes: Vec<(String, String)>,

    /// Label photo to attach
    #[arg(short, long, value_name = "FILE")]
    pub photo: Option<PathBuf>,

    /// Resubmit a previously inspected serial
    #[arg(short, long)]
    pub reinspect: bool,

    /// Output the stored rows as JSON
    #[arg(short, long)]
    pub json: bool,
}

impl SubmitCommand {
    /// Build the submission for the configured `items`.
    ///
    /// Explicit `--status` values win over `--all`. Notes must name an item
    /// that has a result. Reading the photo file happens here.
    ///
    /// # Errors
    ///
    /// Returns [`Error::IncompleteSubmission`] for an unparseable status or a
    /// note without a matching result, and an I/O or photo error if the photo
    /// cannot be read.
    pub fn to_submission(&self, items: &[String]) -> Result<Submission> {
        let mut results: HashMap<String, ItemResult> = HashMap::new();
        for (item, value) in &self.statuses {
            let status: Status = value
                .parse()
                .map_err(|_| Error::incomplete(format!("unknown status '{value}' for {item}")))?;
            results.insert(item.clone(), ItemResult::new(status));
        }

        if let Some(value) = &self.all {
            let status: Status = value.parse()?;
            for item in items {
                results
                    .entry(item.clone())
                    .or_insert_with(|| ItemResult::new(status));
            }
        }

        for (item, text) in &self.notes {
            let result = results
                .get_mut(item)
                .ok_or_else(|| Error::incomplete(format!("note given for {item}, which has no status")))?;
            result.notes.clone_from(text);
        }

        let photo = self.photo.as_ref().map(LabelPhoto::read).transpose()?;

        Ok(Submission {
            serial: self.serial.clone(),
            results,
            photo,
            is_reinspection: self.reinspect,
        })
    }
}

/// Summary command arguments.
#[derive(Debug, Args)]
pub struct SummaryCommand {
    /// First day to include (YYYY-MM-DD)
    #[arg(long)]
    pub from: Option<NaiveDate>,

    /// Last day to include (YYYY-MM-DD)
    #[arg(long)]
    pub to: Option<NaiveDate>,

    /// Output as JSON
    #[arg(short, long)]
    pub json: bool,
}

/// Pareto command arguments.
#[derive(Debug, Args)]
pub struct ParetoCommand {
    /// First day to include (YYYY-MM-DD)
    #[arg(long)]
    pub from: Option<NaiveDate>,

    /// Last day to include (YYYY-MM-DD)
    #[arg(long)]
    pub to: Option<NaiveDate>,

    /// Output as JSON
    #[arg(short, long)]
    pub json: bool,
}

/// Pending command arguments.
#[derive(Debug, Args)]
pub struct PendingCommand {
    /// Output as JSON
    #[arg(short, long)]
    pub json: bool,
}

/// History command arguments.
#[derive(Debug, Args)]
pub struct HistoryCommand {
    /// Only this serial
    #[arg(long)]
    pub serial: Option<String>,

    /// Only rows submitted by this inspector
    #[arg(short, long)]
    pub inspector: Option<String>,

    /// Only this checklist item
    #[arg(long)]
    pub item: Option<String>,

    /// First day to include (YYYY-MM-DD)
    #[arg(long)]
    pub from: Option<NaiveDate>,

    /// Last day to include (YYYY-MM-DD)
    #[arg(long)]
    pub to: Option<NaiveDate>,

    /// Only the most recent batch of each serial
    #[arg(long)]
    pub latest: bool,

    /// Output format
    #[arg(short, long, value_enum, default_value = "table")]
    pub format: OutputFormat,
}

/// Export command arguments.
#[derive(Debug, Args)]
pub struct ExportCommand {
    /// Write to this file instead of stdout
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,
}

/// Photo command arguments.
#[derive(Debug, Args)]
pub struct PhotoCommand {
    /// Serial whose label photo to extract
    pub serial: String,

    /// Destination file (defaults to `<SERIAL>.<ext>` in the current directory)
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,
}

/// Status command arguments.
#[derive(Debug, Args)]
pub struct StatusCommand {
    /// Output as JSON
    #[arg(short, long)]
    pub json: bool,
}

/// Configuration commands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show {
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Show the configuration file path
    Path,

    /// Validate configuration
    Validate {
        /// Path to configuration file to validate
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
}

/// Output format for commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// Plain text output
    Plain,
    /// Formatted table
    #[default]
    Table,
    /// JSON output
    Json,
    /// CSV output
    Csv,
}

/// Parse `KEY=VALUE`, trimming the key.
fn parse_assignment(s: &str) -> std::result::Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected ITEM=VALUE, got '{s}'"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("missing item name in '{s}'"));
    }
    Ok((key.to_string(), value.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_assignment() {
        assert_eq!(
            parse_assignment("Drum + Screw=nc").unwrap(),
            ("Drum + Screw".to_string(), "nc".to_string())
        );
        assert_eq!(
            parse_assignment("Paint=a=b").unwrap(),
            ("Paint".to_string(), "a=b".to_string())
        );
        assert_eq!(
            parse_assignment(" Label =").unwrap(),
            ("Label".to_string(), String::new())
        );
    }

    #[test]
    fn test_parse_assignment_errors() {
        assert!(parse_assignment("Solder").is_err());
        assert!(parse_assignment("=ok").is_err());
    }

    fn submit(statuses: &[(&str, &str)], all: Option<&str>) -> SubmitCommand {
        SubmitCommand {
            serial: "SN1".to_string(),
            statuses: statuses
                .iter()
                .map(|(i, s)| ((*i).to_string(), (*s).to_string()))
                .collect(),
            all: all.map(str::to_string),
            notes: Vec::new(),
            photo: None,
            reinspect: false,
            json: false,
        }
    }

    fn items() -> Vec<String> {
        vec!["Label".to_string(), "Solder".to_string(), "Paint".to_string()]
    }

    #[test]
    fn test_to_submission_explicit_wins_over_all() {
        let cmd = submit(&[("Solder", "nc")], Some("ok"));
        let submission = cmd.to_submission(&items()).unwrap();

        assert_eq!(submission.results.len(), 3);
        assert_eq!(submission.results["Solder"].status, Status::NonConforming);
        assert_eq!(submission.results["Label"].status, Status::Conforming);
        assert!(submission.is_rejected());
        assert!(submission.photo.is_none());
    }

    #[test]
    fn test_to_submission_notes() {
        let mut cmd = submit(&[], Some("ok"));
        cmd.notes.push(("Paint".to_string(), "small scratch".to_string()));
        let submission = cmd.to_submission(&items()).unwrap();
        assert_eq!(submission.results["Paint"].notes, "small scratch");

        let mut orphan = submit(&[("Label", "ok")], None);
        orphan.notes.push(("Paint".to_string(), "x".to_string()));
        assert!(orphan.to_submission(&items()).is_err());
    }

    #[test]
    fn test_to_submission_bad_status() {
        let err = submit(&[("Label", "maybe")], None)
            .to_submission(&items())
            .unwrap_err();
        assert!(err.to_string().contains("Label"));
    }

    #[test]
    fn test_to_submission_reads_photo() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("label.png");
        std::fs::write(&path, [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0]).unwrap();

        let mut cmd = submit(&[], Some("ok"));
        cmd.photo = Some(path);
        cmd.reinspect = true;
        let submission = cmd.to_submission(&items()).unwrap();

        assert!(submission.is_reinspection);
        assert_eq!(submission.photo.unwrap().len(), 9);
    }

    #[test]
    fn test_output_format_default() {
        assert_eq!(OutputFormat::default(), OutputFormat::Table);
    }

    #[test]
    fn test_status_command_debug() {
        let cmd = StatusCommand { json: true };
        let debug_str = format!("{cmd:?}");
        assert!(debug_str.contains("json"));
    }

    #[test]
    fn test_config_command_debug() {
        let cmd = ConfigCommand::Show { json: false };
        let debug_str = format!("{cmd:?}");
        assert!(debug_str.contains("Show"));
    }

    #[test]
    fn test_output_format_debug() {
        let format = OutputFormat::Csv;
        let debug_str = format!("{format:?}");
        assert_eq!(debug_str, "Csv");
    }
}
