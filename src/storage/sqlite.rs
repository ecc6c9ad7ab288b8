//! SQLite-backed index store.
//!
//! Two tables: `documents` (one row per unique source path and content key)
//! and `postings` (one row per `(term, document_id)`), clustered on the
//! posting key so term and prefix lookups are range scans. Secondary indexes
//! are only built by [`IndexWriter::finish_bulk_load`].

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::Duration;

use rusqlite::{Connection, OpenFlags, Row, params, params_from_iter};
use tracing::{debug, info};

use super::{IndexReader, IndexWriter};
use crate::error::{Error, Result};
use crate::model::types::{Document, DocumentId, NewDocument, Posting};

/// Upper bound on bound parameters per `IN (...)` list.
const MAX_IN_PARAMS: usize = 500;

/// Sorts after every character that can follow a prefix in UTF-8 order.
const PREFIX_UPPER_SENTINEL: char = '\u{10FFFF}';

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS documents (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        source_path TEXT NOT NULL UNIQUE,
        subject TEXT NOT NULL,
        sender TEXT NOT NULL,
        recipients TEXT NOT NULL,
        date_sent TEXT NOT NULL,
        body TEXT NOT NULL,
        content_key TEXT NOT NULL UNIQUE
    );

    CREATE TABLE IF NOT EXISTS postings (
        term TEXT NOT NULL,
        document_id INTEGER NOT NULL,
        frequency INTEGER NOT NULL,
        PRIMARY KEY (term, document_id)
    ) WITHOUT ROWID;
";

const DEFERRED_INDEXES: &str = "
    CREATE INDEX IF NOT EXISTS idx_postings_document ON postings(document_id);
    CREATE INDEX IF NOT EXISTS idx_documents_sender ON documents(sender);
";

const DOCUMENT_COLUMNS: &str =
    "id, source_path, subject, sender, recipients, date_sent, body";

pub struct SqliteStorage {
    conn: Connection,
    path: Option<PathBuf>,
}

impl SqliteStorage {
    /// Open (creating if needed) a writable index at `path`.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        conn.busy_timeout(Duration::from_secs(5))?;
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA foreign_keys = OFF;",
        )?;
        conn.execute_batch(SCHEMA)?;
        debug!(path = %path.display(), "Opened index for writing");
        Ok(Self {
            conn,
            path: Some(path.to_path_buf()),
        })
    }

    /// Open an existing index for searching.
    pub fn open_read_only(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(Error::MissingIndex(path.to_path_buf()));
        }
        let conn = Connection::open_with_flags(path, OpenFlags::SQLITE_OPEN_READ_ONLY)?;
        conn.busy_timeout(Duration::from_secs(5))?;
        if !table_exists(&conn, "documents") || !table_exists(&conn, "postings") {
            return Err(Error::MissingIndex(path.to_path_buf()));
        }
        Ok(Self {
            conn,
            path: Some(path.to_path_buf()),
        })
    }

    /// Fresh in-memory index, used by tests and throwaway runs.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn, path: None })
    }

    /// Delete the database at `path` together with its WAL side files.
    pub fn remove_database(path: &Path) -> Result<bool> {
        let mut removed = false;
        for suffix in ["", "-wal", "-shm"] {
            let mut candidate = path.as_os_str().to_owned();
            candidate.push(suffix);
            let candidate = PathBuf::from(candidate);
            if candidate.exists() {
                std::fs::remove_file(&candidate)?;
                removed = true;
            }
        }
        Ok(removed)
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn posting_count(&self) -> Result<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM postings", [], |row| row.get(0))?;
        Ok(count as u64)
    }
}

/// Check whether a table exists in the database.
fn table_exists(conn: &Connection, name: &str) -> bool {
    conn.query_row(
        "SELECT 1 FROM sqlite_master WHERE type='table' AND name=?1",
        [name],
        |_| Ok(()),
    )
    .is_ok()
}

fn placeholders(count: usize) -> String {
    (1..=count)
        .map(|i| format!("?{i}"))
        .collect::<Vec<_>>()
        .join(", ")
}

fn document_from_row(row: &Row<'_>) -> rusqlite::Result<Document> {
    Ok(Document {
        id: row.get(0)?,
        source_path: row.get(1)?,
        subject: row.get(2)?,
        sender: row.get(3)?,
        recipients: row.get(4)?,
        date_sent: row.get(5)?,
        body: row.get(6)?,
    })
}

impl IndexWriter for SqliteStorage {
    fn begin_batch(&self) -> Result<()> {
        self.conn.execute_batch("BEGIN")?;
        Ok(())
    }

    fn commit_batch(&self) -> Result<()> {
        self.conn.execute_batch("COMMIT")?;
        Ok(())
    }

    fn rollback_batch(&self) -> Result<()> {
        if !self.conn.is_autocommit() {
            self.conn.execute_batch("ROLLBACK")?;
        }
        Ok(())
    }

    fn insert_document(&self, doc: &NewDocument<'_>) -> Result<Option<DocumentId>> {
        let mut stmt = self.conn.prepare_cached(
            "INSERT OR IGNORE INTO documents
                (source_path, subject, sender, recipients, date_sent, body, content_key)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        )?;
        let record = doc.record;
        let inserted = stmt.execute(params![
            record.source_path,
            record.subject,
            record.sender,
            record.recipients,
            record.date_sent,
            record.body,
            doc.content_key,
        ])?;
        if inserted == 0 {
            return Ok(None);
        }
        Ok(Some(self.conn.last_insert_rowid()))
    }

    fn upsert_posting(&self, term: &str, document_id: DocumentId, frequency: u32) -> Result<()> {
        let mut stmt = self.conn.prepare_cached(
            "INSERT OR REPLACE INTO postings (term, document_id, frequency) VALUES (?1, ?2, ?3)",
        )?;
        stmt.execute(params![term, document_id, frequency])?;
        Ok(())
    }

    fn finish_bulk_load(&self) -> Result<()> {
        self.conn.execute_batch(DEFERRED_INDEXES)?;
        info!("Secondary indexes built");
        Ok(())
    }
}

impl IndexReader for SqliteStorage {
    fn postings(&self, term: &str) -> Result<Vec<Posting>> {
        let mut stmt = self
            .conn
            .prepare_cached("SELECT document_id, frequency FROM postings WHERE term = ?1")?;
        let rows = stmt.query_map([term], |row| {
            Ok(Posting {
                document_id: row.get(0)?,
                frequency: row.get(1)?,
            })
        })?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    fn terms_with_prefix(&self, prefix: &str, limit: usize) -> Result<Vec<String>> {
        let upper = format!("{prefix}{PREFIX_UPPER_SENTINEL}");
        let mut stmt = self.conn.prepare_cached(
            "SELECT DISTINCT term FROM postings
             WHERE term >= ?1 AND term < ?2
             ORDER BY term
             LIMIT ?3",
        )?;
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let rows = stmt.query_map(params![prefix, upper, limit], |row| row.get(0))?;
        Ok(rows.collect::<rusqlite::Result<Vec<String>>>()?)
    }

    fn terms_in_length_range(&self, min_chars: usize, max_chars: usize) -> Result<Vec<String>> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT DISTINCT term FROM postings
             WHERE length(term) BETWEEN ?1 AND ?2
             ORDER BY term",
        )?;
        let rows = stmt.query_map(params![min_chars as i64, max_chars as i64], |row| {
            row.get(0)
        })?;
        Ok(rows.collect::<rusqlite::Result<Vec<String>>>()?)
    }

    fn documents_by_ids(&self, ids: &[DocumentId]) -> Result<Vec<Document>> {
        let mut found: HashMap<DocumentId, Document> = HashMap::with_capacity(ids.len());
        for chunk in ids.chunks(MAX_IN_PARAMS) {
            let sql = format!(
                "SELECT {DOCUMENT_COLUMNS} FROM documents WHERE id IN ({})",
                placeholders(chunk.len())
            );
            let mut stmt = self.conn.prepare(&sql)?;
            let rows = stmt.query_map(params_from_iter(chunk.iter()), document_from_row)?;
            for doc in rows {
                let doc = doc?;
                found.insert(doc.id, doc);
            }
        }
        Ok(ids.iter().filter_map(|id| found.remove(id)).collect())
    }

    fn documents_by_senders(
        &self,
        senders: &[String],
        exclude: &HashSet<DocumentId>,
        limit: usize,
    ) -> Result<Vec<Document>> {
        if senders.is_empty() || limit == 0 {
            return Ok(Vec::new());
        }
        let sql = format!(
            "SELECT {DOCUMENT_COLUMNS} FROM documents WHERE sender IN ({}) ORDER BY id DESC",
            placeholders(senders.len())
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(senders.iter()))?;

        let mut docs = Vec::new();
        while let Some(row) = rows.next()? {
            let id: DocumentId = row.get(0)?;
            if exclude.contains(&id) {
                continue;
            }
            docs.push(document_from_row(row)?);
            if docs.len() >= limit {
                break;
            }
        }
        Ok(docs)
    }

    fn document_terms(&self, id: DocumentId) -> Result<Vec<(String, u32)>> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT term, frequency FROM postings WHERE document_id = ?1 ORDER BY term",
        )?;
        let rows = stmt.query_map([id], |row| Ok((row.get(0)?, row.get(1)?)))?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    fn document_count(&self) -> Result<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM documents", [], |row| row.get(0))?;
        Ok(count as u64)
    }
}
