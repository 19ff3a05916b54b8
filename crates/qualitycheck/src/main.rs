//! `qcheck` - CLI for qualitycheck
//!
//! This binary records inspection checklists and prints reports over the
//! stored rows.

#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

use std::fs::File;
use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing::info;

use qualitycheck::cli::render::{history_table, pareto_table, status_table};
use qualitycheck::cli::{
    Cli, Command, ConfigCommand, ExportCommand, HistoryCommand, OutputFormat, ParetoCommand,
    PendingCommand, PhotoCommand, StatusCommand, SubmitCommand, SummaryCommand,
};
use qualitycheck::inspection::{self, latest_batches};
use qualitycheck::report::{self, DateRange, HistoryFilter};
use qualitycheck::storage::export_csv;
use qualitycheck::{init_logging, AppContext, ChecklistRow, Config, Error};

/// Exit status for a submission refused by validation.
const EXIT_REJECTED: u8 = 2;

fn main() -> ExitCode {
    match try_main() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {err:#}");
            let refused = err
                .downcast_ref::<Error>()
                .is_some_and(Error::is_validation_error);
            if refused {
                ExitCode::from(EXIT_REJECTED)
            } else {
                ExitCode::FAILURE
            }
        }
    }
}

fn try_main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    init_logging(cli.verbosity());

    // Commands that never touch checklist data run without a login
    match cli.command {
        Command::Config(cmd) => handle_config(cli.config, cmd),
        Command::Items => {
            let config = load_config(cli.config)?;
            print_items(&config);
            Ok(())
        }
        command => {
            let config = load_config(cli.config)?;
            let mut ctx = AppContext::login(config, cli.user.as_deref(), cli.password.as_deref())
                .context("login failed")?;
            run(&mut ctx, command)
        }
    }
}

fn load_config(path: Option<PathBuf>) -> Result<Config> {
    Config::load_from(path).context("failed to load configuration")
}

fn run(ctx: &mut AppContext, command: Command) -> Result<()> {
    match command {
        Command::Submit(cmd) => handle_submit(ctx, &cmd),
        Command::Summary(cmd) => handle_summary(ctx, &cmd),
        Command::Pareto(cmd) => handle_pareto(ctx, &cmd),
        Command::Pending(cmd) => handle_pending(ctx, &cmd),
        Command::History(cmd) => handle_history(ctx, &cmd),
        Command::Export(cmd) => handle_export(ctx, &cmd),
        Command::Photo(cmd) => handle_photo(ctx, &cmd),
        Command::Status(cmd) => handle_status(ctx, &cmd),
        Command::Items | Command::Config(_) => Ok(()),
    }
}

fn handle_submit(ctx: &mut AppContext, cmd: &SubmitCommand) -> Result<()> {
    let submission = cmd.to_submission(&ctx.config.checklist.items)?;
    let rows = inspection::submit(ctx, submission)?;

    if cmd.json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    let Some(head) = rows.first() else {
        return Ok(());
    };
    let verdict = if head.rejected { "REJECTED" } else { "APPROVED" };
    let kind = if head.is_reinspection {
        "reinspection"
    } else {
        "inspection"
    };
    println!(
        "Recorded {} of {}: {} ({} items, inspector {}, {})",
        kind,
        head.serial,
        verdict,
        rows.len(),
        head.inspector,
        head.timestamp.format("%Y-%m-%d %H:%M:%S %:z")
    );
    for row in rows.iter().filter(|row| !row.notes.is_empty()) {
        println!("  {}: {}", row.item, row.notes);
    }
    Ok(())
}

fn handle_summary(ctx: &AppContext, cmd: &SummaryCommand) -> Result<()> {
    let range = DateRange::new(cmd.from, cmd.to)?;
    let rows = ctx.rows()?;
    let summary = report::summary(&rows, Some(&range));

    if cmd.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        println!("Inspection summary{}", describe_range(&range));
        println!("------------------");
        println!("Units inspected:  {}", summary.total_units);
        println!("Approved:         {}", summary.approved_units);
        println!("Rejected:         {}", summary.rejected_units);
        println!("Approval rate:    {:.1}%", summary.approval_pct);
    }
    Ok(())
}

fn handle_pareto(ctx: &AppContext, cmd: &ParetoCommand) -> Result<()> {
    let range = DateRange::new(cmd.from, cmd.to)?;
    let rows: Vec<ChecklistRow> = ctx
        .rows()?
        .into_iter()
        .filter(|row| range.contains(row.date()))
        .collect();
    let pareto = report::failure_pareto(&rows);

    if cmd.json {
        println!("{}", serde_json::to_string_pretty(&pareto)?);
        return Ok(());
    }
    if pareto.is_empty() {
        println!("No non-conforming items to report{}.", describe_range(&range));
        return Ok(());
    }

    println!("{}", pareto_table(&pareto));
    Ok(())
}

fn handle_pending(ctx: &AppContext, cmd: &PendingCommand) -> Result<()> {
    let rows = ctx.rows()?;
    let pending = inspection::find_pending_reinspection(&rows);

    if cmd.json {
        println!("{}", serde_json::to_string_pretty(&pending)?);
    } else if pending.is_empty() {
        println!("No units are waiting for reinspection.");
    } else {
        println!("{} unit(s) waiting for reinspection:", pending.len());
        for serial in &pending {
            println!("  {serial}");
        }
    }
    Ok(())
}

fn handle_history(ctx: &AppContext, cmd: &HistoryCommand) -> Result<()> {
    let filter = HistoryFilter {
        serial: cmd.serial.clone(),
        inspector: cmd.inspector.clone(),
        item: cmd.item.clone(),
        dates: DateRange::new(cmd.from, cmd.to)?,
    };
    let rows = ctx.rows()?;

    let mut selected = report::history(&rows, &filter);
    if cmd.latest {
        let latest: Vec<&ChecklistRow> = latest_batches(&rows).into_values().flatten().collect();
        selected.retain(|row| latest.iter().any(|l| std::ptr::eq(*l, *row)));
    }

    match cmd.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&selected)?),
        OutputFormat::Csv => {
            let owned: Vec<ChecklistRow> = selected.into_iter().cloned().collect();
            export_csv(&owned, io::stdout().lock())?;
        }
        OutputFormat::Plain => {
            for row in &selected {
                println!(
                    "{} {} [{}] {}{}{}",
                    row.timestamp.format("%Y-%m-%d %H:%M"),
                    row.serial,
                    row.item,
                    row.status,
                    if row.notes.is_empty() { "" } else { ": " },
                    row.notes
                );
            }
        }
        OutputFormat::Table => print_history_table(&selected),
    }
    Ok(())
}

fn print_history_table(rows: &[&ChecklistRow]) {
    if rows.is_empty() {
        println!("No matching checklist rows.");
        return;
    }

    println!("{}", history_table(rows));
    println!();
    println!("{} row(s)", rows.len());
}

fn handle_export(ctx: &AppContext, cmd: &ExportCommand) -> Result<()> {
    let rows = ctx.rows()?;
    match &cmd.output {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("failed to create {}", path.display()))?;
            export_csv(&rows, file)?;
            info!("Exported {} rows to {}", rows.len(), path.display());
        }
        None => export_csv(&rows, io::stdout().lock())?,
    }
    Ok(())
}

fn handle_photo(ctx: &AppContext, cmd: &PhotoCommand) -> Result<()> {
    let serial = cmd.serial.trim();
    let rows = ctx.store.query_by_serial(serial)?;
    if rows.is_empty() {
        bail!("serial {serial} has never been inspected");
    }
    let Some(photo) = rows.iter().rev().find_map(|row| row.label_photo.as_ref()) else {
        bail!("no label photo stored for {serial}");
    };

    let path = cmd
        .output
        .clone()
        .unwrap_or_else(|| PathBuf::from(format!("{serial}.{}", photo.format().extension())));
    let mut file =
        File::create(&path).with_context(|| format!("failed to create {}", path.display()))?;
    file.write_all(photo.as_bytes())?;

    println!(
        "Wrote {} photo of {} ({} bytes) to {}",
        photo.format().extension(),
        serial,
        photo.len(),
        path.display()
    );
    Ok(())
}

fn handle_status(ctx: &AppContext, cmd: &StatusCommand) -> Result<()> {
    let stats = ctx.store.stats()?;
    let pending = inspection::find_pending_reinspection(&ctx.rows()?).len();

    if cmd.json {
        let status = serde_json::json!({
            "inspector": ctx.inspector.name(),
            "storage": stats,
            "pending_reinspection": pending,
        });
        println!("{}", serde_json::to_string_pretty(&status)?);
    } else {
        println!("{}", status_table(&ctx.inspector, &stats, pending));
    }
    Ok(())
}

fn print_items(config: &Config) {
    let checklist = &config.checklist;
    println!("Checklist items:");
    for (i, item) in checklist.items.iter().enumerate() {
        let marker = if *item == checklist.photo_item {
            "  (photo)"
        } else {
            ""
        };
        println!("  {}. {item}{marker}", i + 1);
    }
}

fn describe_range(range: &DateRange) -> String {
    match (range.from, range.to) {
        (None, None) => String::new(),
        (Some(from), None) => format!(" since {from}"),
        (None, Some(to)) => format!(" through {to}"),
        (Some(from), Some(to)) => format!(" from {from} to {to}"),
    }
}

fn handle_config(path: Option<PathBuf>, cmd: ConfigCommand) -> Result<()> {
    match cmd {
        ConfigCommand::Show { json } => {
            let config = load_config(path)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&config)?);
            } else {
                println!("Current Configuration");
                println!("=====================");
                println!();
                println!("[Storage]");
                println!("  Backend:            {}", config.storage.backend);
                println!("  Database path:      {}", config.database_path().display());
                println!("  CSV path:           {}", config.csv_path().display());
                println!("  Retry attempts:     {}", config.storage.retry_attempts);
                println!("  Retry backoff (ms): {}", config.storage.retry_backoff_ms);
                println!();
                println!("[Checklist]");
                println!("  Items:              {}", config.checklist.items.join(", "));
                println!("  Photo item:         {}", config.checklist.photo_item);
                println!("  Photo policy:       {:?}", config.checklist.photo_policy);
                println!(
                    "  Serial pattern:     {}",
                    config.checklist.serial_pattern.as_deref().unwrap_or("(any)")
                );
                println!();
                println!("[Identity]");
                println!("  Users:              {}", config.identity.users.len());
                println!();
                println!("[Locale]");
                println!("  UTC offset:         {}", config.timezone());
            }
        }
        ConfigCommand::Path => {
            println!(
                "{}",
                path.unwrap_or_else(Config::default_config_path).display()
            );
        }
        ConfigCommand::Validate { file } => {
            let path = file.or(path).unwrap_or_else(Config::default_config_path);
            println!("Validating configuration: {}", path.display());
            match Config::load_from(Some(path)) {
                Ok(_) => println!("Configuration is valid."),
                Err(e) => bail!("configuration error: {e}"),
            }
        }
    }
    Ok(())
}
