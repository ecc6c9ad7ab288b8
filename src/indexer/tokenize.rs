//! Term extraction and text normalization.
//!
//! [`tokenize`] produces index terms; [`normalize`] is a separate, lighter
//! cleanup used for the minimum-body-length filter and content keys.
//! Normalization keeps words of every length and only strips a fixed
//! punctuation set.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeMap;

/// Tokens of this many characters or fewer are never indexed.
pub const MAX_DISCARDED_TOKEN_CHARS: usize = 2;

/// Punctuation removed by [`normalize`] and trimmed from query terms.
pub const STRIP_PUNCTUATION: [char; 8] = ['.', ',', ':', ';', '!', '?', '"', '\''];

static STRIP_PUNCTUATION_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"[.,:;!?"']"#).expect("strip punctuation regex"));
static REPEATED_SPACES_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r" {2,}").expect("repeated spaces regex"));

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// True when a token is long enough to be an index term.
pub fn is_indexable(token: &str) -> bool {
    token.chars().count() > MAX_DISCARDED_TOKEN_CHARS
}

/// Lowercase `text` and split it on runs of non-word characters.
///
/// Tokens keep input order and duplicates; callers aggregate.
pub fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !is_word_char(c))
        .filter(|token| is_indexable(token))
        .map(str::to_string)
        .collect()
}

/// Occurrence count per term, ordered by term.
pub fn term_frequencies(text: &str) -> BTreeMap<String, u32> {
    let mut counts = BTreeMap::new();
    for term in tokenize(text) {
        *counts.entry(term).or_insert(0) += 1;
    }
    counts
}

/// Lowercase, strip [`STRIP_PUNCTUATION`], trim, and collapse space runs.
pub fn normalize(text: &str) -> String {
    if text.is_empty() {
        return String::new();
    }
    let lowered = text.to_lowercase();
    let stripped = STRIP_PUNCTUATION_RE.replace_all(&lowered, "");
    REPEATED_SPACES_RE
        .replace_all(stripped.trim(), " ")
        .into_owned()
}
