//! Boolean retrieval over per-term posting sets.
//!
//! AND intersects the document sets of every term, OR unions them. A
//! document's score is the sum of the frequencies of the queried terms it
//! contains. Ties are ordered by ascending document id so output is stable.

use std::collections::{HashMap, HashSet};

use crate::error::Result;
use crate::model::types::{DocumentId, Operator, RankedDoc};
use crate::storage::IndexReader;

pub struct BooleanRetriever<'a, R: IndexReader + ?Sized> {
    store: &'a R,
}

impl<'a, R: IndexReader + ?Sized> BooleanRetriever<'a, R> {
    pub fn new(store: &'a R) -> Self {
        Self { store }
    }

    /// Rank documents matching `terms` under `operator`, best first.
    ///
    /// An empty term list yields no results. Repeated terms count once.
    pub fn search(&self, terms: &[String], operator: Operator) -> Result<Vec<RankedDoc>> {
        let mut seen = HashSet::new();
        let unique: Vec<&str> = terms
            .iter()
            .map(String::as_str)
            .filter(|term| seen.insert(*term))
            .collect();
        if unique.is_empty() {
            return Ok(Vec::new());
        }

        let mut per_term: Vec<HashMap<DocumentId, u32>> = Vec::with_capacity(unique.len());
        for term in &unique {
            let postings = self.store.postings(term)?;
            if postings.is_empty() && operator == Operator::And {
                return Ok(Vec::new());
            }
            per_term.push(
                postings
                    .into_iter()
                    .map(|p| (p.document_id, p.frequency))
                    .collect(),
            );
        }

        let candidates: HashSet<DocumentId> = match operator {
            Operator::And => intersect(&per_term),
            Operator::Or => per_term.iter().flat_map(|m| m.keys().copied()).collect(),
        };

        let mut ranked: Vec<RankedDoc> = candidates
            .into_iter()
            .map(|id| RankedDoc {
                id,
                score: per_term
                    .iter()
                    .filter_map(|m| m.get(&id))
                    .map(|f| u64::from(*f))
                    .sum(),
            })
            .collect();
        ranked.sort_by(|a, b| b.score.cmp(&a.score).then(a.id.cmp(&b.id)));
        Ok(ranked)
    }
}

fn intersect(per_term: &[HashMap<DocumentId, u32>]) -> HashSet<DocumentId> {
    let Some(smallest) = per_term.iter().min_by_key(|m| m.len()) else {
        return HashSet::new();
    };
    smallest
        .keys()
        .copied()
        .filter(|id| per_term.iter().all(|m| m.contains_key(id)))
        .collect()
}
