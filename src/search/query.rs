//! Query parsing: raw text into an ordered term list and an operator.

use serde::Serialize;

use crate::indexer::tokenize::{STRIP_PUNCTUATION, is_indexable};
use crate::model::types::Operator;

const AND_SEPARATOR: &str = " and ";
const OR_SEPARATOR: &str = " or ";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ParsedQuery {
    /// Terms in query order; duplicates are kept.
    pub terms: Vec<String>,
    pub operator: Operator,
}

impl ParsedQuery {
    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    /// Human-readable form, e.g. `merger AND secret`.
    pub fn describe(&self) -> String {
        self.terms.join(&format!(" {} ", self.operator))
    }
}

fn clean_term(piece: &str) -> &str {
    piece.trim().trim_matches(STRIP_PUNCTUATION)
}

fn collect_terms<'a>(pieces: impl Iterator<Item = &'a str>) -> Vec<String> {
    pieces
        .map(clean_term)
        .filter(|term| is_indexable(term))
        .map(str::to_string)
        .collect()
}

/// Parse a raw query.
///
/// A literal ` and ` anywhere makes the whole query an AND over the pieces
/// between the separators; otherwise ` or ` makes it an OR. Without either,
/// whitespace-separated words are OR'd. Pieces are not split further, so
/// `enron merger and secret` yields the two terms `enron merger` and `secret`.
pub fn parse_query(query: &str) -> ParsedQuery {
    let normalized = query.to_lowercase();

    if normalized.contains(AND_SEPARATOR) {
        return ParsedQuery {
            terms: collect_terms(normalized.split(AND_SEPARATOR)),
            operator: Operator::And,
        };
    }

    if normalized.contains(OR_SEPARATOR) {
        return ParsedQuery {
            terms: collect_terms(normalized.split(OR_SEPARATOR)),
            operator: Operator::Or,
        };
    }

    ParsedQuery {
        terms: collect_terms(normalized.split_whitespace()),
        operator: Operator::Or,
    }
}
