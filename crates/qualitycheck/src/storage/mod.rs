//! Storage layer for qualitycheck.
//!
//! Checklist rows live in an append-only [`RowStore`]. Three interchangeable
//! backends implement it:
//! - [`MemoryStore`]: ephemeral in-process table
//! - [`CsvStore`]: flat CSV file
//! - [`SqliteStore`]: `SQLite` table with photos inline as base64
//!
//! Every backend enforces the duplicate-serial rule inside `insert_batch`, so
//! the check and the write cannot be separated by another writer using the
//! same store handle. [`Retrying`] wraps any backend with bounded backoff.

pub mod csv_file;
pub mod memory;
pub mod migrations;
pub mod retry;
pub mod schema;
pub mod sqlite;

use std::collections::HashSet;

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

use crate::checklist::{parse_flag, ChecklistRow, Status};
use crate::config::{Backend, Config};
use crate::error::{Error, Result};
use crate::photo;

pub use csv_file::{export_csv, CsvStore};
pub use memory::MemoryStore;
pub use retry::{RetryPolicy, Retrying};
pub use sqlite::SqliteStore;

/// An append-only store of checklist rows.
///
/// Rows are returned in insertion order.
pub trait RowStore: std::fmt::Debug {
    /// Which backend this is.
    fn backend(&self) -> Backend;

    /// Human-readable location (file path or `:memory:`).
    fn location(&self) -> String;

    /// Append one submission batch, all or nothing.
    ///
    /// Every row must share serial and reinspection flag. For a batch that
    /// is not a reinspection, fails with [`Error::DuplicateSerial`] and
    /// writes nothing if the serial already has rows.
    ///
    /// # Errors
    ///
    /// Returns an error on a duplicate serial, a malformed batch, or a
    /// storage failure; the store is unchanged in every case.
    fn insert_batch(&mut self, rows: &[ChecklistRow]) -> Result<()>;

    /// All rows, in insertion order.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    fn query_all(&self) -> Result<Vec<ChecklistRow>>;

    /// Rows for one serial, in insertion order.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    fn query_by_serial(&self, serial: &str) -> Result<Vec<ChecklistRow>>;

    /// Whether any row exists for `serial`.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    fn contains_serial(&self, serial: &str) -> Result<bool> {
        Ok(!self.query_by_serial(serial)?.is_empty())
    }

    /// Summary statistics about the stored rows.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    fn stats(&self) -> Result<StorageStats> {
        let rows = self.query_all()?;
        Ok(StorageStats::from_rows(self.backend(), self.location(), &rows))
    }
}

/// Open the backend selected in `config`, wrapped in the configured retry policy.
///
/// # Errors
///
/// Returns an error if the backing file or database cannot be opened.
pub fn open_store(config: &Config) -> Result<Box<dyn RowStore>> {
    let policy = RetryPolicy::from_config(config);
    let store: Box<dyn RowStore> = match config.storage.backend {
        Backend::Memory => Box::new(Retrying::new(MemoryStore::new(), policy)),
        Backend::Csv => {
            let path = config.csv_path();
            let store = policy.run("open csv store", || CsvStore::open(&path))?;
            Box::new(Retrying::new(store, policy))
        }
        Backend::Sqlite => {
            let path = config.database_path();
            let store = policy.run("open sqlite store", || SqliteStore::open(&path))?;
            Box::new(Retrying::new(store, policy))
        }
    };
    Ok(store)
}

/// Check that `rows` form one batch and return its serial and reinspection flag.
///
/// # Errors
///
/// Returns [`Error::Internal`] for an empty batch or one mixing serials or kinds.
pub(crate) fn batch_key(rows: &[ChecklistRow]) -> Result<(&str, bool)> {
    let first = rows
        .first()
        .ok_or_else(|| Error::internal("refusing to insert an empty batch"))?;
    if rows.iter().any(|row| !row.same_batch(first)) {
        return Err(Error::internal(format!(
            "batch for serial {} mixes rows from different submissions",
            first.serial
        )));
    }
    Ok((first.serial.as_str(), first.is_reinspection))
}

/// Row layout shared by the text-oriented backends.
///
/// Field order is the CSV column order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct StoredRow {
    pub serial: String,
    pub item: String,
    pub status: String,
    pub notes: String,
    pub inspector: String,
    pub timestamp: String,
    pub rejected: String,
    pub is_reinspection: String,
    #[serde(default)]
    pub label_photo: String,
    #[serde(default)]
    pub photo_digest: String,
}

impl StoredRow {
    /// Column names, in order.
    pub const HEADERS: [&'static str; 10] = [
        "serial",
        "item",
        "status",
        "notes",
        "inspector",
        "timestamp",
        "rejected",
        "is_reinspection",
        "label_photo",
        "photo_digest",
    ];

    pub fn from_row(row: &ChecklistRow) -> Self {
        let (label_photo, photo_digest) = row
            .label_photo
            .as_ref()
            .map(|photo| {
                let encoded = photo.encode();
                (encoded.data, encoded.digest)
            })
            .unwrap_or_default();

        Self {
            serial: row.serial.clone(),
            item: row.item.clone(),
            status: row.status.to_string(),
            notes: row.notes.clone(),
            inspector: row.inspector.clone(),
            timestamp: row.timestamp.to_rfc3339(),
            rejected: row.rejected.to_string(),
            is_reinspection: row.is_reinspection.to_string(),
            label_photo,
            photo_digest,
        }
    }

    /// Convert back to a row. An undecodable photo is dropped with a warning.
    pub fn into_row(self) -> Result<ChecklistRow> {
        let status: Status = self.status.parse().map_err(|_| {
            Error::corrupt_row(format!(
                "serial {}: unknown status '{}'",
                self.serial, self.status
            ))
        })?;
        let timestamp = DateTime::<FixedOffset>::parse_from_rfc3339(&self.timestamp).map_err(
            |e| {
                Error::corrupt_row(format!(
                    "serial {}: bad timestamp '{}': {e}",
                    self.serial, self.timestamp
                ))
            },
        )?;
        let flag = |name: &str, value: &str| {
            parse_flag(value).ok_or_else(|| {
                Error::corrupt_row(format!("serial {}: bad {name} flag '{value}'", self.serial))
            })
        };
        let rejected = flag("rejected", &self.rejected)?;
        let is_reinspection = flag("is_reinspection", &self.is_reinspection)?;
        let label_photo = photo::decode_or_warn(&self.serial, &self.label_photo, &self.photo_digest);

        Ok(ChecklistRow {
            serial: self.serial,
            item: self.item,
            status,
            notes: self.notes,
            inspector: self.inspector,
            timestamp,
            rejected,
            is_reinspection,
            label_photo,
        })
    }
}

/// Statistics about the storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StorageStats {
    /// Backend in use.
    pub backend: Backend,
    /// Where the rows live.
    pub location: String,
    /// Total number of rows.
    pub total_rows: usize,
    /// Number of distinct serials.
    pub serials: usize,
    /// Rows carrying a label photo.
    pub photos: usize,
    /// Timestamp of the oldest row.
    pub oldest: Option<DateTime<FixedOffset>>,
    /// Timestamp of the newest row.
    pub newest: Option<DateTime<FixedOffset>>,
}

impl StorageStats {
    /// Compute statistics by scanning `rows`.
    #[must_use]
    pub fn from_rows(backend: Backend, location: String, rows: &[ChecklistRow]) -> Self {
        let serials: HashSet<&str> = rows.iter().map(|row| row.serial.as_str()).collect();
        Self {
            backend,
            location,
            total_rows: rows.len(),
            serials: serials.len(),
            photos: rows.iter().filter(|row| row.has_photo()).count(),
            oldest: rows.iter().map(|row| row.timestamp).min(),
            newest: rows.iter().map(|row| row.timestamp).max(),
        }
    }
}
