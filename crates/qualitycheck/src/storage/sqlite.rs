//! `SQLite`-backed row store.
//!
//! Photos are stored inline as base64 text with a BLAKE3 digest, the same
//! representation the CSV store uses.

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, FixedOffset};
use rusqlite::{params, Connection, ErrorCode, OptionalExtension, TransactionBehavior};
use tracing::{debug, info};

use crate::checklist::ChecklistRow;
use crate::config::Backend;
use crate::error::{Error, Result};

use super::schema::ROW_COLUMNS;
use super::{batch_key, migrations, RowStore, StorageStats, StoredRow};

/// How long a connection waits on a locked database before reporting busy.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Storage engine for checklist rows.
#[derive(Debug)]
pub struct SqliteStore {
    /// Path to the database file.
    path: PathBuf,
    /// Database connection.
    conn: Connection,
}

impl SqliteStore {
    /// Open or create a storage database at the given path.
    ///
    /// Creates the parent directories and database file if they don't exist.
    /// Initializes the schema if this is a new database.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or schema initialization fails.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|source| Error::DirectoryCreate {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
        }

        debug!("Opening database at {}", path.display());
        let conn = Connection::open(&path).map_err(|source| Error::DatabaseOpen {
            path: path.clone(),
            source,
        })?;

        conn.busy_timeout(BUSY_TIMEOUT)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;

        migrations::initialize_schema(&conn)?;

        info!("Database opened successfully at {}", path.display());
        Ok(Self { path, conn })
    }

    /// Create an in-memory storage instance for testing.
    ///
    /// # Errors
    ///
    /// Returns an error if the in-memory database cannot be created.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|source| Error::DatabaseOpen {
            path: PathBuf::from(":memory:"),
            source,
        })?;

        migrations::initialize_schema(&conn)?;

        Ok(Self {
            path: PathBuf::from(":memory:"),
            conn,
        })
    }

    /// Get the path to the database file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Count total rows in storage.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn count(&self) -> Result<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM checklist_rows", [], |row| row.get(0))?;
        Ok(usize::try_from(count).unwrap_or(0))
    }

    fn select(&self, filter: &str, args: impl rusqlite::Params) -> Result<Vec<ChecklistRow>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {ROW_COLUMNS} FROM checklist_rows {filter} ORDER BY id ASC"
        ))?;

        let stored = stmt
            .query_map(args, Self::row_to_stored)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        stored.into_iter().map(StoredRow::into_row).collect()
    }

    /// Convert a database row to its text layout.
    fn row_to_stored(row: &rusqlite::Row) -> rusqlite::Result<StoredRow> {
        let rejected: bool = row.get(6)?;
        let is_reinspection: bool = row.get(7)?;
        let label_photo: Option<String> = row.get(8)?;
        let photo_digest: Option<String> = row.get(9)?;

        Ok(StoredRow {
            serial: row.get(0)?,
            item: row.get(1)?,
            status: row.get(2)?,
            notes: row.get(3)?,
            inspector: row.get(4)?,
            timestamp: row.get(5)?,
            rejected: rejected.to_string(),
            is_reinspection: is_reinspection.to_string(),
            label_photo: label_photo.unwrap_or_default(),
            photo_digest: photo_digest.unwrap_or_default(),
        })
    }

    fn timestamp_bound(&self, order: &str) -> Result<Option<DateTime<FixedOffset>>> {
        let value: Option<String> = self
            .conn
            .query_row(
                &format!("SELECT timestamp FROM checklist_rows ORDER BY timestamp {order} LIMIT 1"),
                [],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value.and_then(|s| DateTime::parse_from_rfc3339(&s).ok()))
    }
}

/// Whether `err` is the first-inspection unique index firing.
fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if e.code == ErrorCode::ConstraintViolation
                && e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
    )
}

impl RowStore for SqliteStore {
    fn backend(&self) -> Backend {
        Backend::Sqlite
    }

    fn location(&self) -> String {
        self.path.display().to_string()
    }

    fn insert_batch(&mut self, rows: &[ChecklistRow]) -> Result<()> {
        let (serial, is_reinspection) = batch_key(rows)?;

        // IMMEDIATE takes the write lock up front, so the duplicate check
        // and the inserts see the same database state.
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;

        if !is_reinspection {
            let existing: i64 = tx.query_row(
                "SELECT COUNT(*) FROM checklist_rows WHERE serial = ?1",
                [serial],
                |row| row.get(0),
            )?;
            if existing > 0 {
                return Err(Error::duplicate_serial(serial));
            }
        }

        {
            let mut stmt = tx.prepare(
                r"
                INSERT INTO checklist_rows
                    (serial, item, status, notes, inspector, timestamp,
                     rejected, is_reinspection, label_photo, photo_digest)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
                ",
            )?;
            for row in rows {
                let stored = StoredRow::from_row(row);
                let photo = (!stored.label_photo.is_empty()).then_some(stored.label_photo);
                let digest = (!stored.photo_digest.is_empty()).then_some(stored.photo_digest);
                stmt.execute(params![
                    stored.serial,
                    stored.item,
                    stored.status,
                    stored.notes,
                    stored.inspector,
                    stored.timestamp,
                    row.rejected,
                    row.is_reinspection,
                    photo,
                    digest,
                ])
                .map_err(|e| {
                    if is_unique_violation(&e) {
                        Error::duplicate_serial(serial)
                    } else {
                        e.into()
                    }
                })?;
            }
        }

        tx.commit()?;
        debug!(serial, rows = rows.len(), "Inserted batch");
        Ok(())
    }

    fn query_all(&self) -> Result<Vec<ChecklistRow>> {
        self.select("", [])
    }

    fn query_by_serial(&self, serial: &str) -> Result<Vec<ChecklistRow>> {
        self.select("WHERE serial = ?1", [serial])
    }

    fn contains_serial(&self, serial: &str) -> Result<bool> {
        let found: Option<i64> = self
            .conn
            .query_row(
                "SELECT 1 FROM checklist_rows WHERE serial = ?1 LIMIT 1",
                [serial],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    fn stats(&self) -> Result<StorageStats> {
        let serials: i64 = self.conn.query_row(
            "SELECT COUNT(DISTINCT serial) FROM checklist_rows",
            [],
            |row| row.get(0),
        )?;
        let photos: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM checklist_rows WHERE label_photo IS NOT NULL",
            [],
            |row| row.get(0),
        )?;

        Ok(StorageStats {
            backend: Backend::Sqlite,
            location: self.location(),
            total_rows: self.count()?,
            serials: usize::try_from(serials).unwrap_or(0),
            photos: usize::try_from(photos).unwrap_or(0),
            oldest: self.timestamp_bound("ASC")?,
            newest: self.timestamp_bound("DESC")?,
        })
    }
}
