//! Terminal tables for report output.

use chrono::{DateTime, FixedOffset};
use comfy_table::presets::{ASCII_MARKDOWN, UTF8_FULL};
use comfy_table::{Cell, CellAlignment, ContentArrangement, Row, Table};

use crate::checklist::ChecklistRow;
use crate::identity::Inspector;
use crate::report::ParetoEntry;
use crate::storage::StorageStats;

/// Width of the longest bar in the Pareto chart.
pub const BAR_WIDTH: usize = 40;

fn right(text: impl ToString) -> Cell {
    Cell::new(text).set_alignment(CellAlignment::Right)
}

fn minutes(t: &DateTime<FixedOffset>) -> String {
    t.format("%Y-%m-%d %H:%M").to_string()
}

/// One line per row: when, what, verdict and notes.
#[must_use]
pub fn history_table(rows: &[&ChecklistRow]) -> Table {
    let mut table = Table::new();
    table.load_preset(ASCII_MARKDOWN);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        "Timestamp",
        "Serial",
        "Item",
        "Status",
        "Verdict",
        "Reinsp",
        "Inspector",
        "Notes",
    ]);

    for it in rows {
        let mut row = Row::new();
        row.add_cell(Cell::new(minutes(&it.timestamp)))
            .add_cell(Cell::new(&it.serial))
            .add_cell(Cell::new(&it.item))
            .add_cell(Cell::new(it.status.as_str()))
            .add_cell(Cell::new(if it.rejected { "rejected" } else { "approved" }))
            .add_cell(Cell::new(if it.is_reinspection { "yes" } else { "no" }))
            .add_cell(Cell::new(&it.inspector))
            .add_cell(Cell::new(&it.notes));
        table.add_row(row);
    }
    table
}

/// Length of the `#` bar for `count`, scaled so `max` fills [`BAR_WIDTH`].
#[must_use]
pub fn bar(count: usize, max: usize) -> String {
    if max == 0 {
        return String::new();
    }
    "#".repeat((count * BAR_WIDTH).div_ceil(max))
}

/// Failure counts with cumulative share and a bar per item.
#[must_use]
pub fn pareto_table(entries: &[ParetoEntry]) -> Table {
    let max_count = entries.iter().map(|e| e.count).max().unwrap_or(0);

    let mut table = Table::new();
    table.load_preset(ASCII_MARKDOWN);
    table.set_header(vec![
        Cell::new("Item"),
        right("Count"),
        right("Cum %"),
        Cell::new(""),
    ]);
    for entry in entries {
        table.add_row(vec![
            Cell::new(&entry.item),
            right(entry.count),
            right(format!("{:.1}%", entry.cumulative_pct)),
            Cell::new(bar(entry.count, max_count)),
        ]);
    }
    table
}

/// Key/value view of the store and the session.
#[must_use]
pub fn status_table(inspector: &Inspector, stats: &StorageStats, pending: usize) -> Table {
    let time = |t: Option<&DateTime<FixedOffset>>| t.map_or_else(|| "-".to_string(), minutes);

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["key", "value"]);
    table.add_row(vec![Cell::new("Logged in as"), Cell::new(inspector)]);
    table.add_row(vec![Cell::new("Backend"), Cell::new(stats.backend)]);
    table.add_row(vec![Cell::new("Location"), Cell::new(&stats.location)]);
    table.add_row(vec![Cell::new("Rows"), right(stats.total_rows)]);
    table.add_row(vec![Cell::new("Units"), right(stats.serials)]);
    table.add_row(vec![Cell::new("Photos"), right(stats.photos)]);
    table.add_row(vec![Cell::new("Pending"), right(pending)]);
    table.add_row(vec![Cell::new("Oldest"), Cell::new(time(stats.oldest.as_ref()))]);
    table.add_row(vec![Cell::new("Newest"), Cell::new(time(stats.newest.as_ref()))]);
    table
}
