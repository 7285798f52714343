//! Lexical relevance ranking over the candidate document set.
//!
//! Scoring is deliberately simple keyword matching, not semantic search:
//! whole-word occurrence counts per query token, plus fixed bonuses when
//! the document's category or tags show up in the query. Candidates with a
//! zero score are dropped; ties keep their input order (stable sort).

use regex::Regex;

use crate::models::Document;

/// Query words this short or common carry no signal and are dropped.
const STOPWORDS: &[&str] = &[
    "what", "when", "where", "which", "with", "would", "could", "should", "have", "this", "that",
    "there", "their", "about",
];

/// Points for the document category appearing in the query.
const CATEGORY_BONUS: i64 = 5;
/// Points per document tag appearing in the query.
const TAG_BONUS: i64 = 3;

#[derive(Debug, Clone)]
pub struct ScoredDocument {
    pub document: Document,
    pub score: i64,
}

/// Split a query into scoring tokens: non-word boundaries, keep tokens
/// longer than 3 characters, drop stopwords. Tokens come back lowercased.
pub fn tokenize_query(query: &str) -> Vec<String> {
    query
        .to_lowercase()
        .split(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
        .filter(|t| t.chars().count() > 3)
        .filter(|t| !STOPWORDS.contains(t))
        .map(|t| t.to_string())
        .collect()
}

/// Count whole-word, case-insensitive occurrences of `token` in `text`.
pub fn count_whole_word(text: &str, token: &str) -> usize {
    match Regex::new(&format!(r"(?i)\b{}\b", regex::escape(token))) {
        Ok(re) => re.find_iter(text).count(),
        Err(_) => 0,
    }
}

fn category_matches(query_lower: &str, category: &str) -> bool {
    let category_lower = category.to_lowercase();
    if query_lower.contains(&category_lower) {
        return true;
    }
    // Multi-word labels never occur verbatim in a question; any
    // significant word of the label counts.
    category_lower
        .split(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
        .filter(|w| w.chars().count() > 3)
        .any(|w| query_lower.contains(w))
}

fn score_document(query_lower: &str, tokens: &[String], doc: &Document) -> i64 {
    let content = match doc.content.as_deref() {
        Some(c) if !c.is_empty() => c,
        _ => return 0,
    };

    let mut score: i64 = 0;
    for token in tokens {
        score += count_whole_word(content, token) as i64;
    }

    if let Some(category) = doc.metadata.category.as_deref() {
        if category_matches(query_lower, category) {
            score += CATEGORY_BONUS;
        }
    }

    for tag in &doc.metadata.tags {
        if query_lower.contains(&tag.to_lowercase()) {
            score += TAG_BONUS;
        }
    }

    score
}

/// Rank candidates against a query and keep the best `max_results`.
///
/// Zero-score candidates never appear in the output; an empty candidate
/// set yields an empty result, not an error.
pub fn rank_documents(
    query: &str,
    candidates: Vec<Document>,
    max_results: usize,
) -> Vec<ScoredDocument> {
    let query_lower = query.to_lowercase();
    let tokens = tokenize_query(query);

    let mut scored: Vec<ScoredDocument> = candidates
        .into_iter()
        .filter_map(|doc| {
            let score = score_document(&query_lower, &tokens, &doc);
            if score > 0 {
                Some(ScoredDocument {
                    document: doc,
                    score,
                })
            } else {
                None
            }
        })
        .collect();

    // Stable: equal scores keep candidate order
    scored.sort_by(|a, b| b.score.cmp(&a.score));
    scored.truncate(max_results);
    scored
}
