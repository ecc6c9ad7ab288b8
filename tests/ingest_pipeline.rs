//! Ingestion pipeline integration tests.
//!
//! Records flow from real CSV exports and maildir-style trees through the
//! IndexBuilder into on-disk SQLite indexes. No mocks.

use std::time::Duration;

use mailsearch::corpus::{CsvSource, DirectorySource, open_source};
use mailsearch::error::{Error, Result};
use mailsearch::indexer::tokenize::tokenize;
use mailsearch::indexer::{IndexBuilder, IngestOptions, StopReason};
use mailsearch::model::types::{DocumentId, IngestRecord};
use mailsearch::storage::IndexReader;
use mailsearch::storage::sqlite::SqliteStorage;
use proptest::prelude::*;
use tempfile::TempDir;

mod util;

use util::{CorpusBuilder, PADDING, capture_warnings};

fn all_ids(store: &SqliteStorage) -> Vec<DocumentId> {
    let count = store.document_count().unwrap() as i64;
    (1..=count).collect()
}

fn posting_total(store: &SqliteStorage, id: DocumentId) -> u64 {
    store
        .document_terms(id)
        .unwrap()
        .into_iter()
        .map(|(_, f)| u64::from(f))
        .sum()
}

// =============================================================================
// SOURCES END TO END
// =============================================================================

#[test]
fn csv_export_is_indexed_with_headers() {
    let dir = TempDir::new().unwrap();
    let corpus = CorpusBuilder::new()
        .message(
            "allen-p/_sent_mail/1.",
            "phillip.allen@enron.com",
            "Merger timeline",
            &format!("The merger closes next week {PADDING}"),
        )
        .message(
            "allen-p/_sent_mail/2.",
            "phillip.allen@enron.com",
            "Gas desk",
            &format!("Gas curves attached for review {PADDING}"),
        );
    let csv = corpus.write_csv(dir.path());

    let store = SqliteStorage::open(&dir.path().join("index.db")).unwrap();
    let report = IndexBuilder::new(&store, IngestOptions::default())
        .ingest(CsvSource::open(&csv).unwrap(), |_| {})
        .unwrap();

    assert_eq!(report.processed, 2);
    assert_eq!(report.inserted, 2);
    assert_eq!(report.stopped, StopReason::Exhausted);

    let docs = store.documents_by_ids(&[1, 2]).unwrap();
    assert_eq!(docs[0].source_path, "allen-p/_sent_mail/1.");
    assert_eq!(docs[0].sender, "phillip.allen@enron.com");
    assert_eq!(docs[0].subject, "Merger timeline");
    assert_eq!(docs[0].file_name(), "1.");
    assert!(docs[1].body.starts_with("Gas curves attached"));

    // Subject terms are indexed alongside the body.
    let merger = store.postings("merger").unwrap();
    assert_eq!(merger.len(), 1);
    assert_eq!(merger[0].frequency, 2);
    assert_eq!(store.postings("timeline").unwrap().len(), 1);
}

#[test]
fn directory_tree_uses_relative_paths() {
    let dir = TempDir::new().unwrap();
    let root = CorpusBuilder::new()
        .padded("lay-k/inbox/1.", "quarterly earnings call")
        .padded("skilling-j/deleted_items/7.", "board meeting agenda")
        .write_tree(dir.path());

    let store = SqliteStorage::open_in_memory().unwrap();
    let report = IndexBuilder::new(&store, IngestOptions::default())
        .ingest(open_source(&root).unwrap(), |_| {})
        .unwrap();

    assert_eq!(report.inserted, 2);
    let paths: Vec<String> = store
        .documents_by_ids(&[1, 2])
        .unwrap()
        .into_iter()
        .map(|d| d.source_path)
        .collect();
    assert_eq!(paths, vec!["lay-k/inbox/1.", "skilling-j/deleted_items/7."]);
}

#[test]
fn unreadable_files_are_skipped_not_fatal() {
    let dir = TempDir::new().unwrap();
    let root = CorpusBuilder::new()
        .padded("a/1.", "first readable message")
        .padded("c/3.", "third readable message")
        .write_tree(dir.path());
    std::fs::create_dir_all(root.join("b")).unwrap();
    std::fs::write(root.join("b/2."), [0xff, 0xfe, 0x00, 0x9f]).unwrap();

    let store = SqliteStorage::open_in_memory().unwrap();
    let (report, logs) = capture_warnings(|| {
        IndexBuilder::new(&store, IngestOptions::default())
            .ingest(DirectorySource::new(&root), |_| {})
            .unwrap()
    });

    assert_eq!(report.inserted, 2);
    assert_eq!(report.malformed, 1);
    assert_eq!(report.skipped, 1);
    assert!(logs.contains("Skipping malformed record"), "{logs}");
}

#[test]
fn headerless_record_becomes_body_only_document() {
    let dir = TempDir::new().unwrap();
    let csv = dir.path().join("emails.csv");
    let raw = "no header block here just a long run of plain text about pipeline capacity";
    std::fs::write(&csv, format!("file,message\nloose/1.,\"{raw}\"\n")).unwrap();

    let store = SqliteStorage::open_in_memory().unwrap();
    let report = IndexBuilder::new(&store, IngestOptions::default())
        .ingest(CsvSource::open(&csv).unwrap(), |_| {})
        .unwrap();

    assert_eq!(report.inserted, 1);
    let doc = &store.documents_by_ids(&[1]).unwrap()[0];
    assert_eq!(doc.subject, "");
    assert_eq!(doc.sender, "");
    assert_eq!(doc.body, raw);
    assert_eq!(store.postings("pipeline").unwrap().len(), 1);
}

#[test]
fn missing_corpus_is_an_error() {
    let dir = TempDir::new().unwrap();
    let err = open_source(&dir.path().join("absent.csv")).err().unwrap();
    assert!(matches!(err, Error::Io(_)));
}

// =============================================================================
// FILTERING AND DEDUPLICATION
// =============================================================================

#[test]
fn body_floor_is_fifty_normalized_characters() {
    let store = SqliteStorage::open_in_memory().unwrap();
    let records: Vec<Result<IngestRecord>> = vec![
        Ok(IngestRecord::with_body("short", "x".repeat(49))),
        Ok(IngestRecord::with_body("exact", "y".repeat(50))),
        // Punctuation is stripped before measuring.
        Ok(IngestRecord::with_body("punct", format!("{}!!!!!", "z".repeat(48)))),
    ];
    let report = IndexBuilder::new(&store, IngestOptions::default())
        .ingest(records, |_| {})
        .unwrap();

    assert_eq!(report.processed, 1);
    assert_eq!(report.skipped, 2);
    assert_eq!(store.document_count().unwrap(), 1);
    assert!(store.postings(&"x".repeat(49)).unwrap().is_empty());
    assert_eq!(store.postings(&"y".repeat(50)).unwrap().len(), 1);
}

#[test]
fn reingesting_a_corpus_is_idempotent() {
    let dir = TempDir::new().unwrap();
    let db = dir.path().join("index.db");
    let corpus = CorpusBuilder::new()
        .padded("m/1.", "merger merger secret")
        .padded("m/2.", "merger public disclosure")
        .padded("m/3.", "weather report for houston");

    let first = {
        let store = SqliteStorage::open(&db).unwrap();
        IndexBuilder::new(&store, IngestOptions::default())
            .ingest(corpus.stream(), |_| {})
            .unwrap();
        let snapshot: Vec<_> = (1..=3).map(|id| store.document_terms(id).unwrap()).collect();
        (store.document_count().unwrap(), store.posting_count().unwrap(), snapshot)
    };

    let store = SqliteStorage::open(&db).unwrap();
    let report = IndexBuilder::new(&store, IngestOptions::default())
        .ingest(corpus.stream(), |_| {})
        .unwrap();
    assert_eq!(report.inserted, 0);
    assert_eq!(report.duplicates, 3);

    let snapshot: Vec<_> = (1..=3).map(|id| store.document_terms(id).unwrap()).collect();
    assert_eq!(
        (store.document_count().unwrap(), store.posting_count().unwrap(), snapshot),
        first
    );
}

#[test]
fn identical_content_under_new_path_is_a_duplicate() {
    let store = SqliteStorage::open_in_memory().unwrap();
    let corpus = CorpusBuilder::new()
        .padded("inbox/1.", "Forwarded: the merger memo")
        .padded("sent/1.", "forwarded the MERGER memo");
    let report = IndexBuilder::new(&store, IngestOptions::default())
        .ingest(corpus.stream(), |_| {})
        .unwrap();
    assert_eq!(report.inserted, 1);
    assert_eq!(report.duplicates, 1);
}

// =============================================================================
// BATCHING AND BOUNDED RUNS
// =============================================================================

#[test]
fn progress_is_reported_per_committed_batch() {
    let mut corpus = CorpusBuilder::new();
    for i in 0..7 {
        corpus = corpus.padded(&format!("b/{i}."), &format!("batch record number{i}"));
    }
    let store = SqliteStorage::open_in_memory().unwrap();
    let options = IngestOptions {
        batch_size: 3,
        ..IngestOptions::default()
    };

    let mut seen = Vec::new();
    let report = IndexBuilder::new(&store, options)
        .ingest(corpus.stream(), |p| seen.push((p.processed, p.batches_committed)))
        .unwrap();

    assert_eq!(seen, vec![(3, 1), (6, 2)]);
    assert_eq!(report.processed, 7);
    assert_eq!(store.document_count().unwrap(), 7);
}

#[test]
fn record_ceiling_stops_cleanly() {
    let mut corpus = CorpusBuilder::new();
    for i in 0..10 {
        corpus = corpus.padded(&format!("c/{i}."), &format!("ceiling record number{i}"));
    }
    let store = SqliteStorage::open_in_memory().unwrap();
    let options = IngestOptions {
        batch_size: 4,
        max_records: Some(6),
        ..IngestOptions::default()
    };
    let report = IndexBuilder::new(&store, options)
        .ingest(corpus.stream(), |_| {})
        .unwrap();

    assert_eq!(report.stopped, StopReason::RecordLimit);
    assert_eq!(report.processed, 6);
    // The in-flight batch was committed too.
    assert_eq!(store.document_count().unwrap(), 6);
}

#[test]
fn exhausted_time_budget_leaves_valid_partial_index() {
    let dir = TempDir::new().unwrap();
    let db = dir.path().join("index.db");
    let corpus = CorpusBuilder::new().padded("t/1.", "timed record");
    {
        let store = SqliteStorage::open(&db).unwrap();
        let options = IngestOptions {
            time_budget: Some(Duration::ZERO),
            ..IngestOptions::default()
        };
        let report = IndexBuilder::new(&store, options)
            .ingest(corpus.stream(), |_| {})
            .unwrap();
        assert_eq!(report.stopped, StopReason::TimeBudget);
        assert_eq!(report.processed, 0);
    }
    let reader = SqliteStorage::open_read_only(&db).unwrap();
    assert_eq!(reader.document_count().unwrap(), 0);
}

#[test]
fn source_error_aborts_the_run() {
    let store = SqliteStorage::open_in_memory().unwrap();
    let records: Vec<Result<IngestRecord>> = vec![
        Ok(IngestRecord::with_body("ok/1.", format!("fine record {PADDING}"))),
        Err(Error::Io(std::io::Error::other("disk vanished"))),
        Ok(IngestRecord::with_body("ok/2.", format!("never reached {PADDING}"))),
    ];
    let err = IndexBuilder::new(&store, IngestOptions::default())
        .ingest(records, |_| {})
        .unwrap_err();
    assert!(matches!(err, Error::Io(_)));
    // The open batch was rolled back.
    assert_eq!(store.document_count().unwrap(), 0);
}

#[test]
fn storage_failure_rolls_back_only_the_open_batch() {
    let dir = TempDir::new().unwrap();
    let db = dir.path().join("mail.db");
    drop(SqliteStorage::open(&db).unwrap());
    // Any posting for "poison" now fails inside SQLite itself.
    rusqlite::Connection::open(&db)
        .unwrap()
        .execute_batch(
            "CREATE TRIGGER reject_poison BEFORE INSERT ON postings
             WHEN NEW.term = 'poison'
             BEGIN SELECT RAISE(ABORT, 'poisoned term'); END;",
        )
        .unwrap();

    let store = SqliteStorage::open(&db).unwrap();
    let records: Vec<Result<IngestRecord>> = vec![
        Ok(IngestRecord::with_body("b1/1.", format!("alpha first {PADDING}"))),
        Ok(IngestRecord::with_body("b1/2.", format!("bravo second {PADDING}"))),
        Ok(IngestRecord::with_body("b2/3.", format!("charlie third {PADDING}"))),
        Ok(IngestRecord::with_body("b2/4.", format!("poison fourth {PADDING}"))),
        Ok(IngestRecord::with_body("b3/5.", format!("delta fifth {PADDING}"))),
    ];
    let options = IngestOptions {
        batch_size: 2,
        ..IngestOptions::default()
    };
    let err = IndexBuilder::new(&store, options)
        .ingest(records, |_| {})
        .unwrap_err();

    assert!(matches!(err, Error::Storage(_)), "{err:?}");
    assert!(err.to_string().contains("poisoned term"), "{err}");
    drop(store);

    let reader = SqliteStorage::open_read_only(&db).unwrap();
    let docs = reader.documents_by_ids(&all_ids(&reader)).unwrap();
    let paths: Vec<&str> = docs.iter().map(|d| d.source_path.as_str()).collect();
    assert_eq!(paths, vec!["b1/1.", "b1/2."]);
    assert_eq!(reader.postings("bravo").unwrap().len(), 1);
    assert!(reader.postings("charlie").unwrap().is_empty());
    assert!(reader.postings("delta").unwrap().is_empty());
}

// =============================================================================
// PROPERTIES
// =============================================================================

const WORDS: &[&str] = &[
    "merger", "secret", "gas", "power", "to", "of", "california", "ENRON", "deal's", "q3",
    "board", "x_y", "a1b2",
];

fn text_strategy() -> impl Strategy<Value = String> {
    prop::collection::vec(prop::sample::select(WORDS), 0..30).prop_map(|words| words.join(" "))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    /// Posting frequencies of a document add up to its indexable token count.
    #[test]
    fn posting_frequencies_sum_to_token_count(
        docs in prop::collection::vec((text_strategy(), text_strategy()), 1..8)
    ) {
        let store = SqliteStorage::open_in_memory().unwrap();
        let records: Vec<Result<IngestRecord>> = docs
            .iter()
            .enumerate()
            .map(|(i, (subject, body))| Ok(IngestRecord {
                source_path: format!("p/{i}."),
                subject: subject.clone(),
                body: format!("{body} {PADDING} marker{i}"),
                ..IngestRecord::default()
            }))
            .collect();
        IndexBuilder::new(&store, IngestOptions::default())
            .ingest(records, |_| {})
            .unwrap();

        for doc in store.documents_by_ids(&all_ids(&store)).unwrap() {
            let expected = tokenize(&format!("{} {}", doc.subject, doc.body)).len() as u64;
            prop_assert_eq!(posting_total(&store, doc.id), expected);
        }
    }
}
