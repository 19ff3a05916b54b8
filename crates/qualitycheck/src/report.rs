//! Aggregate reports over stored checklist rows.
//!
//! All functions are pure: they take rows in insertion order and never touch
//! storage.

use std::collections::HashSet;

use chrono::NaiveDate;
use serde::Serialize;

use crate::checklist::{ChecklistRow, Status};
use crate::error::{Error, Result};

/// Inclusive range of civil dates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DateRange {
    /// First day included, unbounded if `None`.
    pub from: Option<NaiveDate>,
    /// Last day included, unbounded if `None`.
    pub to: Option<NaiveDate>,
}

impl DateRange {
    /// Build a range, rejecting `from` after `to`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::IncompleteSubmission`] if the bounds are reversed.
    pub fn new(from: Option<NaiveDate>, to: Option<NaiveDate>) -> Result<Self> {
        if let (Some(from), Some(to)) = (from, to) {
            if from > to {
                return Err(Error::incomplete(format!(
                    "date range starts after it ends ({from} > {to})"
                )));
            }
        }
        Ok(Self { from, to })
    }

    /// Whether `date` falls inside the range.
    #[must_use]
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.from.map_or(true, |from| date >= from) && self.to.map_or(true, |to| date <= to)
    }
}

/// Unit-level pass/fail counts.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Summary {
    /// Distinct serials in the window.
    pub total_units: usize,
    /// Distinct serials with at least one approved row in the window.
    pub approved_units: usize,
    /// Distinct serials with at least one rejected row in the window.
    pub rejected_units: usize,
    /// `approved_units / total_units * 100`, or 0 with no units.
    pub approval_pct: f64,
}

/// Count units and approvals, optionally restricted to a date range.
///
/// A serial with both an approved and a rejected batch inside the window is
/// counted in both `approved_units` and `rejected_units`.
#[must_use]
pub fn summary(rows: &[ChecklistRow], range: Option<&DateRange>) -> Summary {
    let mut total = HashSet::new();
    let mut approved = HashSet::new();
    let mut rejected = HashSet::new();

    for row in rows
        .iter()
        .filter(|row| range.map_or(true, |r| r.contains(row.date())))
    {
        let serial = row.serial.as_str();
        total.insert(serial);
        if row.rejected {
            rejected.insert(serial);
        } else {
            approved.insert(serial);
        }
    }

    Summary {
        total_units: total.len(),
        approved_units: approved.len(),
        rejected_units: rejected.len(),
        approval_pct: percentage(approved.len(), total.len()),
    }
}

/// One line of the failure Pareto table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParetoEntry {
    /// Checklist item.
    pub item: String,
    /// Non-conforming rows for the item.
    pub count: usize,
    /// Running share of all non-conforming rows, in percent.
    pub cumulative_pct: f64,
}

/// Rank items by how often they were non-conforming.
///
/// Sorted by count descending; items with equal counts keep the order in
/// which they first failed. The last entry's `cumulative_pct` is 100.
#[must_use]
pub fn failure_pareto(rows: &[ChecklistRow]) -> Vec<ParetoEntry> {
    let mut counts: Vec<(&str, usize)> = Vec::new();
    for row in rows.iter().filter(|row| row.status == Status::NonConforming) {
        match counts.iter_mut().find(|(item, _)| *item == row.item) {
            Some((_, count)) => *count += 1,
            None => counts.push((row.item.as_str(), 1)),
        }
    }

    // stable sort keeps first-appearance order among ties
    counts.sort_by(|a, b| b.1.cmp(&a.1));

    let total: usize = counts.iter().map(|(_, count)| count).sum();
    let mut running = 0;
    counts
        .into_iter()
        .map(|(item, count)| {
            running += count;
            ParetoEntry {
                item: item.to_string(),
                count,
                cumulative_pct: percentage(running, total),
            }
        })
        .collect()
}

/// Criteria for [`history`]. Unset fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HistoryFilter {
    /// Exact serial.
    pub serial: Option<String>,
    /// Exact inspector name.
    pub inspector: Option<String>,
    /// Exact item name.
    pub item: Option<String>,
    /// Civil-date window.
    pub dates: DateRange,
}

impl HistoryFilter {
    /// Whether `row` passes every set criterion.
    #[must_use]
    pub fn matches(&self, row: &ChecklistRow) -> bool {
        self.serial.as_ref().map_or(true, |s| *s == row.serial)
            && self.inspector.as_ref().map_or(true, |i| *i == row.inspector)
            && self.item.as_ref().map_or(true, |i| *i == row.item)
            && self.dates.contains(row.date())
    }
}

/// Rows matching `filter`, in insertion order.
#[must_use]
pub fn history<'a>(rows: &'a [ChecklistRow], filter: &HistoryFilter) -> Vec<&'a ChecklistRow> {
    rows.iter().filter(|row| filter.matches(row)).collect()
}

#[allow(clippy::cast_precision_loss)]
fn percentage(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64 * 100.0
    }
}
