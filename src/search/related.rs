//! Related-document strategies.
//!
//! Two independent strategies sit behind [`RelatedFinder`] and rank very
//! differently, so they are kept apart rather than blended:
//!
//! - [`SenderRelated`]: other messages from the senders of the top results,
//!   newest id first, each with a nominal score of 1.0.
//! - [`SharedTermsRelated`]: messages sharing at least two distinct terms with
//!   the top results, scored by how many they share.

use std::collections::{HashMap, HashSet};

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::model::types::{Document, DocumentId};
use crate::storage::IndexReader;

/// Related documents are only looked up for searches with at least this many results.
pub const MIN_RESULTS_FOR_RELATED: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum RelatedStrategy {
    /// Same sender as one of the top results.
    #[default]
    Sender,
    /// Shares terms with the top results.
    SharedTerms,
}

impl RelatedStrategy {
    pub fn label(self) -> &'static str {
        match self {
            RelatedStrategy::Sender => "by sender",
            RelatedStrategy::SharedTerms => "by shared terms",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RelatedHit {
    pub document: Document,
    pub score: f64,
}

pub trait RelatedFinder {
    /// Documents related to `top`, never including any id in `result_ids`.
    fn find(&self, top: &[Document], result_ids: &HashSet<DocumentId>) -> Result<Vec<RelatedHit>>;
}

/// Build the finder for `strategy`.
pub fn finder_for<'a, R: IndexReader + ?Sized>(
    strategy: RelatedStrategy,
    store: &'a R,
) -> Box<dyn RelatedFinder + 'a> {
    match strategy {
        RelatedStrategy::Sender => Box::new(SenderRelated::new(store)),
        RelatedStrategy::SharedTerms => Box::new(SharedTermsRelated::new(store)),
    }
}

pub struct SenderRelated<'a, R: IndexReader + ?Sized> {
    store: &'a R,
    max_senders: usize,
    limit: usize,
}

impl<'a, R: IndexReader + ?Sized> SenderRelated<'a, R> {
    pub fn new(store: &'a R) -> Self {
        Self {
            store,
            max_senders: 3,
            limit: 10,
        }
    }
}

impl<R: IndexReader + ?Sized> RelatedFinder for SenderRelated<'_, R> {
    fn find(&self, top: &[Document], result_ids: &HashSet<DocumentId>) -> Result<Vec<RelatedHit>> {
        let mut senders: Vec<String> = Vec::with_capacity(self.max_senders);
        for doc in top {
            if senders.len() >= self.max_senders {
                break;
            }
            if !doc.sender.is_empty() && !senders.contains(&doc.sender) {
                senders.push(doc.sender.clone());
            }
        }

        let docs = self
            .store
            .documents_by_senders(&senders, result_ids, self.limit)?;
        Ok(docs
            .into_iter()
            .map(|document| RelatedHit {
                document,
                score: 1.0,
            })
            .collect())
    }
}

pub struct SharedTermsRelated<'a, R: IndexReader + ?Sized> {
    store: &'a R,
    max_seeds: usize,
    min_shared: usize,
    limit: usize,
}

impl<'a, R: IndexReader + ?Sized> SharedTermsRelated<'a, R> {
    pub fn new(store: &'a R) -> Self {
        Self {
            store,
            max_seeds: 3,
            min_shared: 2,
            limit: 20,
        }
    }
}

impl<R: IndexReader + ?Sized> RelatedFinder for SharedTermsRelated<'_, R> {
    fn find(&self, top: &[Document], result_ids: &HashSet<DocumentId>) -> Result<Vec<RelatedHit>> {
        let mut seed_terms: HashSet<String> = HashSet::new();
        for doc in top.iter().take(self.max_seeds) {
            seed_terms.extend(self.store.document_terms(doc.id)?.into_iter().map(|(t, _)| t));
        }

        let mut shared: HashMap<DocumentId, usize> = HashMap::new();
        for term in &seed_terms {
            for posting in self.store.postings(term)? {
                if !result_ids.contains(&posting.document_id) {
                    *shared.entry(posting.document_id).or_insert(0) += 1;
                }
            }
        }

        let mut ranked: Vec<(DocumentId, usize)> = shared
            .into_iter()
            .filter(|(_, count)| *count >= self.min_shared)
            .collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then(b.0.cmp(&a.0)));
        ranked.truncate(self.limit);

        let ids: Vec<DocumentId> = ranked.iter().map(|(id, _)| *id).collect();
        let counts: HashMap<DocumentId, usize> = ranked.into_iter().collect();
        Ok(self
            .store
            .documents_by_ids(&ids)?
            .into_iter()
            .map(|document| RelatedHit {
                score: counts.get(&document.id).copied().unwrap_or(0) as f64,
                document,
            })
            .collect())
    }
}
