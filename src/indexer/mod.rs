//! Inverted-index construction.
//!
//! - **[`tokenize`]**: term extraction and body normalization.
//! - **[`dedup`]**: content keys for exact-duplicate detection.
//! - [`IndexBuilder`]: the ingestion loop that filters, deduplicates, and
//!   writes documents and postings in batched transactions.

pub mod dedup;
pub mod tokenize;

use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::{DEFAULT_BATCH_SIZE, DEFAULT_MIN_BODY_CHARS, IndexConfig};
use crate::error::{Error, Result};
use crate::model::types::{DocumentId, IngestRecord, NewDocument};
use crate::storage::IndexWriter;

use self::dedup::content_key;
use self::tokenize::{normalize, term_frequencies};

/// Knobs for one ingestion run.
#[derive(Debug, Clone)]
pub struct IngestOptions {
    /// Processed records per transaction.
    pub batch_size: usize,
    /// Wall-clock budget, checked once per record.
    pub time_budget: Option<Duration>,
    /// Stop once this many records have been processed.
    pub max_records: Option<u64>,
    /// Bodies shorter than this after [`normalize`] are skipped.
    pub min_body_chars: usize,
}

impl Default for IngestOptions {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            time_budget: None,
            max_records: None,
            min_body_chars: DEFAULT_MIN_BODY_CHARS,
        }
    }
}

impl IngestOptions {
    pub fn from_config(config: &IndexConfig) -> Self {
        Self {
            batch_size: config.batch_size.max(1),
            time_budget: None,
            max_records: config.record_ceiling(),
            min_body_chars: config.min_body_chars,
        }
    }
}

/// Why an ingestion run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// The record source ran dry.
    #[default]
    Exhausted,
    TimeBudget,
    RecordLimit,
}

/// Outcome of an ingestion run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct IngestionReport {
    /// Records that passed the body filter (new documents and duplicates).
    pub processed: u64,
    /// Processed records that created a new document.
    pub inserted: u64,
    /// Processed records ignored because their path or content was already indexed.
    pub duplicates: u64,
    /// Records rejected by the body filter or as malformed.
    pub skipped: u64,
    /// Subset of `skipped` that could not be parsed at all.
    pub malformed: u64,
    pub elapsed: Duration,
    pub stopped: StopReason,
}

impl IngestionReport {
    pub fn records_per_sec(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.processed as f64 / secs
        } else {
            0.0
        }
    }
}

/// Snapshot handed to the progress callback after each committed batch.
#[derive(Debug, Clone, Copy)]
pub struct IngestProgress {
    pub processed: u64,
    pub skipped: u64,
    pub batches_committed: u64,
    pub elapsed: Duration,
}

/// Builds documents and postings from a stream of records.
pub struct IndexBuilder<'a, W: IndexWriter> {
    store: &'a W,
    options: IngestOptions,
}

impl<'a, W: IndexWriter> IndexBuilder<'a, W> {
    pub fn new(store: &'a W, options: IngestOptions) -> Self {
        Self { store, options }
    }

    pub fn options(&self) -> &IngestOptions {
        &self.options
    }

    /// True when the record's normalized body meets the length floor.
    pub fn should_index(&self, record: &IngestRecord) -> bool {
        normalize(&record.body).chars().count() >= self.options.min_body_chars
    }

    /// Ingest `records`, committing every `batch_size` processed records.
    ///
    /// Malformed records are logged and counted; any other error aborts the
    /// run after rolling back the open batch, leaving earlier batches intact.
    pub fn ingest<I, F>(&self, records: I, mut progress: F) -> Result<IngestionReport>
    where
        I: IntoIterator<Item = Result<IngestRecord>>,
        F: FnMut(&IngestProgress),
    {
        let started = Instant::now();
        self.store.begin_batch()?;

        match self.run(records, started, &mut progress) {
            Ok(report) => Ok(report),
            Err(err) => {
                if let Err(rollback_err) = self.store.rollback_batch() {
                    warn!(error = %rollback_err, "Rollback after failed ingestion also failed");
                }
                Err(err)
            }
        }
    }

    fn run<I, F>(&self, records: I, started: Instant, progress: &mut F) -> Result<IngestionReport>
    where
        I: IntoIterator<Item = Result<IngestRecord>>,
        F: FnMut(&IngestProgress),
    {
        let batch_size = self.options.batch_size.max(1) as u64;
        let mut report = IngestionReport::default();
        let mut batches_committed = 0u64;

        for item in records {
            if let Some(max) = self.options.max_records
                && report.processed >= max
            {
                report.stopped = StopReason::RecordLimit;
                break;
            }
            if let Some(budget) = self.options.time_budget
                && started.elapsed() >= budget
            {
                report.stopped = StopReason::TimeBudget;
                break;
            }

            let record = match item {
                Ok(record) => record,
                Err(Error::MalformedRecord { position, reason }) => {
                    warn!(position, %reason, "Skipping malformed record");
                    report.malformed += 1;
                    report.skipped += 1;
                    continue;
                }
                Err(other) => return Err(other),
            };

            if !self.should_index(&record) {
                report.skipped += 1;
                continue;
            }

            match self.index_record(&record)? {
                Some(_) => report.inserted += 1,
                None => report.duplicates += 1,
            }
            report.processed += 1;

            if report.processed % batch_size == 0 {
                self.store.commit_batch()?;
                self.store.begin_batch()?;
                batches_committed += 1;
                info!(
                    processed = report.processed,
                    skipped = report.skipped,
                    "Committed batch"
                );
                progress(&IngestProgress {
                    processed: report.processed,
                    skipped: report.skipped,
                    batches_committed,
                    elapsed: started.elapsed(),
                });
            }
        }

        self.store.commit_batch()?;
        self.store.finish_bulk_load()?;

        report.elapsed = started.elapsed();
        info!(
            processed = report.processed,
            inserted = report.inserted,
            duplicates = report.duplicates,
            skipped = report.skipped,
            malformed = report.malformed,
            stopped = ?report.stopped,
            "Ingestion finished"
        );
        Ok(report)
    }

    /// Insert one document and its postings. Returns `None` for duplicates.
    fn index_record(&self, record: &IngestRecord) -> Result<Option<DocumentId>> {
        let doc = NewDocument {
            record,
            content_key: content_key(record),
        };
        let Some(id) = self.store.insert_document(&doc)? else {
            debug!(source_path = %record.source_path, "Duplicate document ignored");
            return Ok(None);
        };

        let text = format!("{} {}", record.subject, record.body);
        for (term, frequency) in term_frequencies(&text) {
            self.store.upsert_posting(&term, id, frequency)?;
        }
        Ok(Some(id))
    }
}
