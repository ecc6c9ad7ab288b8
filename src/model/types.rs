//! Normalized entity structs.

use serde::{Deserialize, Serialize};

/// Surrogate id assigned by storage when a document row is created.
pub type DocumentId = i64;

/// One raw record handed over by a corpus source.
///
/// Every field except `source_path` may be empty. Header formatting is not
/// validated here; that belongs to whoever produced the record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestRecord {
    pub source_path: String,
    pub subject: String,
    pub sender: String,
    pub recipients: String,
    pub date_sent: String,
    pub body: String,
}

impl IngestRecord {
    /// Record with only a source path and body, headers left empty.
    pub fn with_body(source_path: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            source_path: source_path.into(),
            body: body.into(),
            ..Default::default()
        }
    }
}

/// Document row about to be inserted, carrying its derived content key.
#[derive(Debug, Clone)]
pub struct NewDocument<'a> {
    pub record: &'a IngestRecord,
    pub content_key: String,
}

/// A stored document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub id: DocumentId,
    pub source_path: String,
    pub subject: String,
    pub sender: String,
    pub recipients: String,
    pub date_sent: String,
    pub body: String,
}

impl Document {
    /// Final path component of the source path, falling back to the whole path.
    pub fn file_name(&self) -> &str {
        std::path::Path::new(&self.source_path)
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or(&self.source_path)
    }
}

/// One inverted-index entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Posting {
    pub document_id: DocumentId,
    pub frequency: u32,
}

/// Boolean combination applied across query terms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Operator {
    And,
    #[default]
    Or,
}

impl std::fmt::Display for Operator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Operator::And => write!(f, "AND"),
            Operator::Or => write!(f, "OR"),
        }
    }
}

/// Document id paired with its summed term frequency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankedDoc {
    pub id: DocumentId,
    pub score: u64,
}
