//! Schema versioning for the `SQLite` store.
//!
//! The version lives in the `metadata` table. Opening a database written by a
//! newer build is refused, as is a `checklist_rows` table that lacks any
//! column the store reads.

use rusqlite::Connection;
use tracing::debug;

use crate::error::{Error, Result};

use super::schema::{ROW_COLUMNS, SCHEMA_STATEMENTS};

/// The current schema version.
pub const CURRENT_VERSION: i32 = 1;

/// Key used to store the schema version in the metadata table.
const VERSION_KEY: &str = "schema_version";

/// Create missing tables, bring the schema up to [`CURRENT_VERSION`] and
/// check the row table's columns.
///
/// # Errors
///
/// Returns [`Error::DatabaseMigration`] if the database is from a newer
/// version or its row table is missing columns, and a query error if schema
/// creation fails.
pub fn initialize_schema(conn: &Connection) -> Result<()> {
    for statement in SCHEMA_STATEMENTS {
        conn.execute(statement, [])?;
    }

    let version = get_schema_version(conn)?;
    if version > CURRENT_VERSION {
        return Err(Error::DatabaseMigration {
            message: format!(
                "database schema version {version} is newer than supported version {CURRENT_VERSION}"
            ),
        });
    }
    if version < CURRENT_VERSION {
        run_migrations(conn, version)?;
    }

    let missing = missing_columns(conn)?;
    if !missing.is_empty() {
        return Err(Error::DatabaseMigration {
            message: format!("checklist_rows is missing columns: {}", missing.join(", ")),
        });
    }
    Ok(())
}

/// Get the current schema version from the database.
///
/// Returns 0 if no version is set (fresh database).
fn get_schema_version(conn: &Connection) -> Result<i32> {
    let result: std::result::Result<String, rusqlite::Error> = conn.query_row(
        "SELECT value FROM metadata WHERE key = ?1",
        [VERSION_KEY],
        |row| row.get(0),
    );

    match result {
        Ok(value) => value.parse().map_err(|_| Error::DatabaseMigration {
            message: format!("invalid schema version: {value}"),
        }),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(0),
        Err(e) => Err(e.into()),
    }
}

fn set_schema_version(conn: &Connection, version: i32) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO metadata (key, value) VALUES (?1, ?2)",
        (VERSION_KEY, version.to_string()),
    )?;
    Ok(())
}

fn run_migrations(conn: &Connection, from_version: i32) -> Result<()> {
    for version in from_version + 1..=CURRENT_VERSION {
        debug!(version, "Applying schema migration");
        run_migration(conn, version)?;
    }
    set_schema_version(conn, CURRENT_VERSION)
}

fn run_migration(conn: &Connection, version: i32) -> Result<()> {
    match version {
        // The base schema, already created by `SCHEMA_STATEMENTS`.
        1 => set_schema_version(conn, 1),
        _ => Err(Error::DatabaseMigration {
            message: format!("unknown migration version: {version}"),
        }),
    }
}

/// Columns in [`ROW_COLUMNS`] that `checklist_rows` does not have.
fn missing_columns(conn: &Connection) -> Result<Vec<&'static str>> {
    let mut stmt = conn.prepare("PRAGMA table_info(checklist_rows)")?;
    let present = stmt
        .query_map([], |row| row.get::<_, String>(1))?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(ROW_COLUMNS
        .split(',')
        .map(str::trim)
        .filter(|column| !present.iter().any(|name| name == column))
        .collect())
}
