//! Storage collaborator contract.
//!
//! The indexer and the query pipeline only talk to storage through these two
//! traits, so boolean evaluation, fuzzy expansion, and related-document
//! lookups stay independent of any particular query language. Set algebra
//! happens in process over the primitives below.
//!
//! - **[`IndexWriter`]**: batched, transactional document and posting writes.
//! - **[`IndexReader`]**: posting, vocabulary, and document lookups.
//! - **[`sqlite`]**: the rusqlite-backed implementation of both.

pub mod sqlite;

use std::collections::HashSet;

use crate::error::Result;
use crate::model::types::{Document, DocumentId, NewDocument, Posting};

/// Write side used by ingestion.
pub trait IndexWriter {
    fn begin_batch(&self) -> Result<()>;

    fn commit_batch(&self) -> Result<()>;

    fn rollback_batch(&self) -> Result<()>;

    /// Insert a document unless its source path or content key already
    /// exists. Returns the new id, or `None` when the insert was ignored.
    fn insert_document(&self, doc: &NewDocument<'_>) -> Result<Option<DocumentId>>;

    /// Insert or replace the posting keyed by `(term, document_id)`.
    fn upsert_posting(&self, term: &str, document_id: DocumentId, frequency: u32) -> Result<()>;

    /// Build whatever secondary structures were deferred during bulk load.
    fn finish_bulk_load(&self) -> Result<()>;
}

/// Read side used by the query pipeline.
pub trait IndexReader {
    /// Every posting recorded for `term`.
    fn postings(&self, term: &str) -> Result<Vec<Posting>>;

    /// Distinct vocabulary terms starting with `prefix`, in term order.
    fn terms_with_prefix(&self, prefix: &str, limit: usize) -> Result<Vec<String>>;

    /// Distinct vocabulary terms whose character length lies in `min..=max`.
    fn terms_in_length_range(&self, min_chars: usize, max_chars: usize) -> Result<Vec<String>>;

    /// Documents for `ids`, returned in the order of `ids`; unknown ids are skipped.
    fn documents_by_ids(&self, ids: &[DocumentId]) -> Result<Vec<Document>>;

    /// Documents sent by any of `senders`, newest id first, skipping
    /// `exclude`, at most `limit`.
    fn documents_by_senders(
        &self,
        senders: &[String],
        exclude: &HashSet<DocumentId>,
        limit: usize,
    ) -> Result<Vec<Document>>;

    /// `(term, frequency)` pairs indexed for one document.
    fn document_terms(&self, id: DocumentId) -> Result<Vec<(String, u32)>>;

    fn document_count(&self) -> Result<u64>;
}
