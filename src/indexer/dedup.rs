//! Content keys for exact-duplicate detection.
//!
//! The key is a SHA256 digest over `normalize(subject) | normalize(body)`, so
//! two messages stored under different paths but carrying the same text
//! collapse into one document.

use sha2::{Digest, Sha256};

use super::tokenize::normalize;
use crate::model::types::IngestRecord;

/// Separator between the normalized subject and body before hashing.
const FIELD_SEPARATOR: &str = "|";

/// Compute the hex-encoded content key for a record.
pub fn content_key(record: &IngestRecord) -> String {
    content_key_for(&record.subject, &record.body)
}

/// Compute the content key from raw subject and body text.
pub fn content_key_for(subject: &str, body: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(normalize(subject).as_bytes());
    hasher.update(FIELD_SEPARATOR.as_bytes());
    hasher.update(normalize(body).as_bytes());
    hex::encode(hasher.finalize())
}
