//! Misspelling-tolerant term expansion.
//!
//! Only runs after exact retrieval came back empty. Each query term of at
//! least `min_term_chars` characters is widened two ways against the indexed
//! vocabulary:
//!
//! 1. prefix: terms starting with the query term minus its last character
//!    (catches a wrong or missing final letter and short suffixes), and
//! 2. edit distance: terms within `max_length_delta` characters in length and
//!    `max_edit_distance` Levenshtein edits.
//!
//! Candidates from every term are merged, first occurrence wins.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::Result;
use crate::storage::IndexReader;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FuzzyConfig {
    /// Shorter terms are never expanded.
    pub min_term_chars: usize,
    pub max_edit_distance: usize,
    pub max_length_delta: usize,
    /// Prefix matches kept per term.
    pub prefix_candidates: usize,
}

impl Default for FuzzyConfig {
    fn default() -> Self {
        Self {
            min_term_chars: 4,
            max_edit_distance: 2,
            max_length_delta: 2,
            prefix_candidates: 5,
        }
    }
}

pub struct FuzzyExpander<'a, R: IndexReader + ?Sized> {
    store: &'a R,
    config: &'a FuzzyConfig,
}

impl<'a, R: IndexReader + ?Sized> FuzzyExpander<'a, R> {
    pub fn new(store: &'a R, config: &'a FuzzyConfig) -> Self {
        Self { store, config }
    }

    /// Vocabulary terms close to any of `terms`, deduplicated.
    pub fn expand(&self, terms: &[String]) -> Result<Vec<String>> {
        let mut seen = HashSet::new();
        let mut expanded = Vec::new();

        for term in terms {
            for candidate in self.candidates_for(term)? {
                if seen.insert(candidate.clone()) {
                    expanded.push(candidate);
                }
            }
        }

        debug!(?terms, ?expanded, "Fuzzy expansion");
        Ok(expanded)
    }

    fn candidates_for(&self, term: &str) -> Result<Vec<String>> {
        let len = term.chars().count();
        if len == 0 || len < self.config.min_term_chars {
            return Ok(Vec::new());
        }
        let within_length = |candidate: &str| {
            candidate.chars().count().abs_diff(len) <= self.config.max_length_delta
        };

        let prefix: String = term.chars().take(len - 1).collect();
        let mut candidates: Vec<String> = self
            .store
            .terms_with_prefix(&prefix, self.config.prefix_candidates)?
            .into_iter()
            .filter(|candidate| within_length(candidate.as_str()))
            .collect();

        let min_len = len.saturating_sub(self.config.max_length_delta).max(1);
        let max_len = len + self.config.max_length_delta;
        candidates.extend(
            self.store
                .terms_in_length_range(min_len, max_len)?
                .into_iter()
                .filter(|candidate| levenshtein(term, candidate) <= self.config.max_edit_distance),
        );
        Ok(candidates)
    }
}

/// Classic Levenshtein distance over characters: unit-cost insert, delete,
/// and substitute, filled row by row in an `(n+1) x (m+1)` table.
pub fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let width = b.len() + 1;
    let mut table = vec![0usize; (a.len() + 1) * width];
    for i in 0..=a.len() {
        table[i * width] = i;
    }
    for j in 0..=b.len() {
        table[j] = j;
    }

    for i in 1..=a.len() {
        for j in 1..=b.len() {
            let cost = usize::from(a[i - 1] != b[j - 1]);
            let delete = table[(i - 1) * width + j] + 1;
            let insert = table[i * width + j - 1] + 1;
            let substitute = table[(i - 1) * width + j - 1] + cost;
            table[i * width + j] = delete.min(insert).min(substitute);
        }
    }
    table[a.len() * width + b.len()]
}
