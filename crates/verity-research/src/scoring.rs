//! Deterministic lexical relevance scoring.

use crate::registry::EntityKind;

/// Boost for filings whose form type is named in the query.
pub const FORM_TYPE_BOOST: f64 = 0.5;

/// Fraction of query terms found in the text.
///
/// Terms are the whitespace-separated, lower-cased words of the query; a term
/// counts when it occurs anywhere in the lower-cased text. An empty query
/// scores 0.
pub fn relevance(query: &str, text: &str) -> f64 {
    let terms: Vec<String> = query.split_whitespace().map(str::to_lowercase).collect();
    if terms.is_empty() {
        return 0.0;
    }

    let text = text.to_lowercase();
    let matched = terms.iter().filter(|term| text.contains(term.as_str())).count();
    matched as f64 / terms.len() as f64
}

/// Relevance of a filing, boosted when the query names its form type.
pub fn filing_relevance(query: &str, text: &str, form_type: &str) -> f64 {
    let score = relevance(query, text);
    let form_type = form_type.trim().to_lowercase();
    if !form_type.is_empty() && query.to_lowercase().contains(&form_type) {
        (score + FORM_TYPE_BOOST).min(1.0)
    } else {
        score
    }
}

/// A scored search candidate.
#[derive(Debug, Clone, PartialEq)]
pub struct Scored<T> {
    /// Relevance in [0, 1]
    pub score: f64,
    /// Kind of the candidate
    pub kind: EntityKind,
    /// Natural key of the candidate
    pub key: String,
    /// The candidate itself
    pub item: T,
}

/// Keep the `k` best candidates.
///
/// Ordered by score descending, then kind, then natural key, so equal scores
/// always come back in the same order.
pub fn top_k<T>(mut candidates: Vec<Scored<T>>, k: usize) -> Vec<Scored<T>> {
    candidates.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then_with(|| a.kind.cmp(&b.kind))
            .then_with(|| a.key.cmp(&b.key))
    });
    candidates.truncate(k);
    candidates
}
