//! Search layer facade.
//!
//! - **[`query`]**: raw query text into terms and an operator.
//! - **[`boolean`]**: AND/OR retrieval ranked by summed term frequency.
//! - **[`fuzzy`]**: prefix and edit-distance expansion when exact retrieval is empty.
//! - **[`snippet`]**: context window around the first term hit.
//! - **[`related`]**: related-document strategies over the top results.
//!
//! [`SearchPipeline`] chains them for one search against an open store.

pub mod boolean;
pub mod fuzzy;
pub mod query;
pub mod related;
pub mod snippet;

use std::collections::HashSet;

use serde::Serialize;
use tracing::{debug, info};

use crate::config::{DEFAULT_RESULT_LIMIT, SearchConfig};
use crate::error::Result;
use crate::model::types::{Document, DocumentId};
use crate::storage::IndexReader;

use self::boolean::BooleanRetriever;
use self::fuzzy::{FuzzyConfig, FuzzyExpander};
use self::query::{ParsedQuery, parse_query};
use self::related::{MIN_RESULTS_FOR_RELATED, RelatedStrategy, finder_for};
use self::snippet::snippet;

pub use self::related::RelatedHit;

#[derive(Debug, Clone)]
pub struct SearchOptions {
    /// Ranked hits materialized into the outcome.
    pub limit: usize,
    pub related: RelatedStrategy,
    pub fuzzy: FuzzyConfig,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            limit: DEFAULT_RESULT_LIMIT,
            related: RelatedStrategy::default(),
            fuzzy: FuzzyConfig::default(),
        }
    }
}

impl SearchOptions {
    pub fn from_config(search: &SearchConfig, fuzzy: &FuzzyConfig) -> Self {
        Self {
            limit: search.limit.max(1),
            related: search.related,
            fuzzy: fuzzy.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchHit {
    pub document: Document,
    pub score: u64,
    pub snippet: String,
}

/// Everything one search produced, in display order.
#[derive(Debug, Clone, Serialize)]
pub struct SearchOutcome {
    pub query: ParsedQuery,
    /// `Some` when exact retrieval was empty and fuzzy expansion ran; holds
    /// the candidates it found, possibly none.
    pub expanded_terms: Option<Vec<String>>,
    /// Matches before `limit` was applied.
    pub total_matches: usize,
    pub hits: Vec<SearchHit>,
    pub related_strategy: RelatedStrategy,
    pub related: Vec<RelatedHit>,
}

impl SearchOutcome {
    fn empty(query: ParsedQuery, related_strategy: RelatedStrategy) -> Self {
        Self {
            query,
            expanded_terms: None,
            total_matches: 0,
            hits: Vec::new(),
            related_strategy,
            related: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.total_matches == 0
    }

    /// True when exact retrieval came back empty and fuzzy expansion was tried.
    pub fn used_fuzzy(&self) -> bool {
        self.expanded_terms.is_some()
    }
}

/// One stateless query run: parse, retrieve, fall back to fuzzy expansion,
/// then build snippets and related documents for the top hits.
pub struct SearchPipeline<'a, R: IndexReader + ?Sized> {
    store: &'a R,
    options: &'a SearchOptions,
}

impl<'a, R: IndexReader + ?Sized> SearchPipeline<'a, R> {
    pub fn new(store: &'a R, options: &'a SearchOptions) -> Self {
        Self { store, options }
    }

    pub fn run(&self, raw_query: &str) -> Result<SearchOutcome> {
        let query = parse_query(raw_query);
        let mut outcome = SearchOutcome::empty(query.clone(), self.options.related);
        if query.is_empty() {
            debug!(raw_query, "Query has no searchable terms");
            return Ok(outcome);
        }

        let retriever = BooleanRetriever::new(self.store);
        let mut ranked = retriever.search(&query.terms, query.operator)?;
        let mut match_terms = query.terms.clone();

        if ranked.is_empty() {
            let expanded =
                FuzzyExpander::new(self.store, &self.options.fuzzy).expand(&query.terms)?;
            if !expanded.is_empty() {
                ranked = retriever.search(&expanded, query.operator)?;
                match_terms = expanded.clone();
            }
            outcome.expanded_terms = Some(expanded);
        }

        outcome.total_matches = ranked.len();
        info!(
            query = %query.describe(),
            matches = ranked.len(),
            fuzzy = outcome.used_fuzzy(),
            "Search finished"
        );
        if ranked.is_empty() {
            return Ok(outcome);
        }

        let result_ids: HashSet<DocumentId> = ranked.iter().map(|r| r.id).collect();
        ranked.truncate(self.options.limit);
        let top_ids: Vec<DocumentId> = ranked.iter().map(|r| r.id).collect();
        let documents = self.store.documents_by_ids(&top_ids)?;

        outcome.hits = ranked
            .iter()
            .zip(documents)
            .map(|(rank, document)| SearchHit {
                snippet: snippet(&document.body, &match_terms),
                score: rank.score,
                document,
            })
            .collect();

        if outcome.total_matches >= MIN_RESULTS_FOR_RELATED {
            let top: Vec<Document> = outcome.hits.iter().map(|h| h.document.clone()).collect();
            outcome.related = finder_for(self.options.related, self.store).find(&top, &result_ids)?;
        }

        Ok(outcome)
    }
}
