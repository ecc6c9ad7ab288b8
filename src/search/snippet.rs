//! Context snippets around the first query-term hit in a body.

/// Words kept on each side of the matching word.
pub const CONTEXT_WORDS: usize = 10;

/// Words shown when no term matches.
pub const LEAD_WORDS: usize = 20;

pub const ELLIPSIS: &str = "...";

/// Build a snippet of `body` for `terms`.
///
/// A word matches when its lowercased form contains any term as a substring.
/// The window around the first match spans `CONTEXT_WORDS` words before it and
/// up to `CONTEXT_WORDS` words starting at it. Without a match, the first
/// `LEAD_WORDS` words are shown, or the untouched body when it is shorter.
pub fn snippet(body: &str, terms: &[String]) -> String {
    let words: Vec<&str> = body.split_whitespace().collect();
    let terms: Vec<&str> = terms
        .iter()
        .map(String::as_str)
        .filter(|term| !term.is_empty())
        .collect();

    let first_hit = words.iter().position(|word| {
        let lowered = word.to_lowercase();
        terms.iter().any(|term| lowered.contains(term))
    });

    if let Some(i) = first_hit {
        let start = i.saturating_sub(CONTEXT_WORDS);
        let end = (i + CONTEXT_WORDS).min(words.len());
        return format!("{}{ELLIPSIS}", words[start..end].join(" "));
    }

    if words.len() > LEAD_WORDS {
        format!("{}{ELLIPSIS}", words[..LEAD_WORDS].join(" "))
    } else {
        body.to_string()
    }
}
