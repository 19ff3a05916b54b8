//! Flat CSV file row store.
//!
//! One header line followed by one record per checklist row, photos inline
//! as base64. A batch is serialized into memory first and appended with a
//! single write; if the write or sync fails the file is truncated back to
//! its previous length.
//!
//! The duplicate check and the append both happen under `&mut self`, which
//! serializes writers sharing one handle. Separate processes appending to the
//! same file are not coordinated.

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::checklist::ChecklistRow;
use crate::config::Backend;
use crate::error::{Error, Result};

use super::{batch_key, RowStore, StoredRow};

/// Checklist rows in a CSV file.
#[derive(Debug)]
pub struct CsvStore {
    path: PathBuf,
}

impl CsvStore {
    /// Open or create a CSV store at the given path.
    ///
    /// Creates parent directories and writes the header line if the file is
    /// new or empty.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory or file cannot be created.
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

        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        if file.metadata()?.len() == 0 {
            let mut writer = csv::Writer::from_writer(file);
            writer
                .write_record(StoredRow::HEADERS)
                .and_then(|()| writer.flush().map_err(csv::Error::from))
                .map_err(|source| Error::Csv {
                    path: path.clone(),
                    source,
                })?;
            info!("Created CSV store at {}", path.display());
        } else {
            debug!("Opened CSV store at {}", path.display());
        }

        Ok(Self { path })
    }

    /// Get the path to the CSV file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn csv_error(&self, source: csv::Error) -> Error {
        Error::Csv {
            path: self.path.clone(),
            source,
        }
    }

    fn read_rows(&self, mut keep: impl FnMut(&StoredRow) -> bool) -> Result<Vec<ChecklistRow>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_path(&self.path)
            .map_err(|e| self.csv_error(e))?;

        let mut rows = Vec::new();
        for record in reader.deserialize::<StoredRow>() {
            let stored = record.map_err(|e| self.csv_error(e))?;
            if keep(&stored) {
                rows.push(stored.into_row()?);
            }
        }
        Ok(rows)
    }

    /// Serialize `rows` without a header.
    fn encode_batch(&self, rows: &[ChecklistRow]) -> Result<Vec<u8>> {
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(Vec::new());
        for row in rows {
            writer
                .serialize(StoredRow::from_row(row))
                .map_err(|e| self.csv_error(e))?;
        }
        writer.into_inner().map_err(|e| Error::Io(e.into_error()))
    }

    fn append(&self, buf: &[u8]) -> Result<()> {
        self.append_with(buf, |file, buf| {
            file.write_all(buf).and_then(|()| file.sync_data())
        })
    }

    /// Append through `write`; the file is truncated to its previous length
    /// if `write` fails.
    fn append_with(
        &self,
        buf: &[u8],
        write: impl FnOnce(&mut File, &[u8]) -> io::Result<()>,
    ) -> Result<()> {
        let mut file = OpenOptions::new().append(true).open(&self.path)?;
        let original_len = file.metadata()?.len();

        if let Err(e) = write(&mut file, buf) {
            warn!(
                "Append to {} failed, truncating to {} bytes",
                self.path.display(),
                original_len
            );
            rollback(&file, original_len);
            return Err(e.into());
        }
        Ok(())
    }
}

/// Write `rows` as CSV with a header line, in the CSV store's column layout.
///
/// # Errors
///
/// Returns an error if writing to `writer` fails.
pub fn export_csv<W: Write>(rows: &[ChecklistRow], writer: W) -> Result<()> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(writer);
    let into_error = |source: csv::Error| Error::Csv {
        path: PathBuf::from("<export>"),
        source,
    };

    writer.write_record(StoredRow::HEADERS).map_err(into_error)?;
    for row in rows {
        writer.serialize(StoredRow::from_row(row)).map_err(into_error)?;
    }
    writer.flush()?;
    Ok(())
}

fn rollback(file: &File, len: u64) {
    if let Err(e) = file.set_len(len).and_then(|()| file.sync_data()) {
        warn!("Could not truncate CSV store after failed append: {}", e);
    }
}

impl RowStore for CsvStore {
    fn backend(&self) -> Backend {
        Backend::Csv
    }

    fn location(&self) -> String {
        self.path.display().to_string()
    }

    fn insert_batch(&mut self, rows: &[ChecklistRow]) -> Result<()> {
        let (serial, is_reinspection) = batch_key(rows)?;
        if !is_reinspection && self.contains_serial(serial)? {
            return Err(Error::duplicate_serial(serial));
        }

        let buf = self.encode_batch(rows)?;
        self.append(&buf)?;
        debug!(serial, rows = rows.len(), "Appended batch to CSV store");
        Ok(())
    }

    fn query_all(&self) -> Result<Vec<ChecklistRow>> {
        self.read_rows(|_| true)
    }

    fn query_by_serial(&self, serial: &str) -> Result<Vec<ChecklistRow>> {
        self.read_rows(|stored| stored.serial == serial)
    }
}
