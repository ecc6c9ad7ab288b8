//! Record sources feeding the indexer.
//!
//! A corpus is either a CSV export with `file` and `message` columns or a
//! directory tree holding one raw message per file. Both yield
//! `Result<IngestRecord>`; a record that cannot be read or parsed comes out
//! as [`Error::MalformedRecord`] and iteration carries on.

pub mod message;

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use walkdir::WalkDir;

use crate::error::{Error, Result};
use crate::model::types::IngestRecord;

pub use self::message::parse_message;

/// Boxed record stream, as returned by [`open_source`].
pub type RecordStream = Box<dyn Iterator<Item = Result<IngestRecord>>>;

#[derive(Debug, Deserialize)]
struct CsvRow {
    file: String,
    message: String,
}

/// Rows of a `file,message` CSV export.
pub struct CsvSource<R: Read> {
    rows: csv::DeserializeRecordsIntoIter<R, CsvRow>,
    position: u64,
}

impl CsvSource<File> {
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        Ok(Self::from_reader(file))
    }
}

impl<R: Read> CsvSource<R> {
    pub fn from_reader(reader: R) -> Self {
        let rows = csv::ReaderBuilder::new()
            .has_headers(true)
            .from_reader(reader)
            .into_deserialize();
        Self { rows, position: 0 }
    }
}

impl<R: Read> Iterator for CsvSource<R> {
    type Item = Result<IngestRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        let row = self.rows.next()?;
        self.position += 1;
        Some(match row {
            Ok(row) if row.file.trim().is_empty() => {
                Err(Error::malformed(self.position, "empty `file` column"))
            }
            Ok(row) => Ok(parse_message(row.file.trim(), &row.message)),
            Err(err) if err.is_io_error() => Err(Error::Csv(err)),
            Err(err) => Err(Error::malformed(self.position, err.to_string())),
        })
    }
}

/// Every regular file below a root directory, in file-name order.
pub struct DirectorySource {
    root: PathBuf,
    entries: walkdir::IntoIter,
    position: u64,
}

impl DirectorySource {
    pub fn new(root: &Path) -> Self {
        let entries = WalkDir::new(root)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter();
        Self {
            root: root.to_path_buf(),
            entries,
            position: 0,
        }
    }

    fn relative_path(&self, path: &Path) -> String {
        let relative = path.strip_prefix(&self.root).unwrap_or(path);
        relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/")
    }

    fn read(&self, path: &Path) -> Result<IngestRecord> {
        let bytes = std::fs::read(path)
            .map_err(|e| Error::malformed(self.position, format!("{}: {e}", path.display())))?;
        let raw = String::from_utf8(bytes).map_err(|_| {
            Error::malformed(self.position, format!("{}: not valid UTF-8", path.display()))
        })?;
        Ok(parse_message(&self.relative_path(path), &raw))
    }
}

impl Iterator for DirectorySource {
    type Item = Result<IngestRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let entry = self.entries.next()?;
            match entry {
                Ok(entry) if entry.file_type().is_file() => {
                    self.position += 1;
                    return Some(self.read(entry.path()));
                }
                Ok(_) => continue,
                Err(err) => {
                    self.position += 1;
                    return Some(Err(Error::malformed(self.position, err.to_string())));
                }
            }
        }
    }
}

/// Open `path` as a directory corpus or, for a regular file, a CSV export.
pub fn open_source(path: &Path) -> Result<RecordStream> {
    if path.is_dir() {
        return Ok(Box::new(DirectorySource::new(path)));
    }
    Ok(Box::new(CsvSource::open(path)?))
}
