//! Query-relevant excerpt extraction.
//!
//! Picks the single most relevant paragraph of a document for a query and
//! truncates it to a length budget, preferring a sentence boundary when
//! one falls late enough in the window. A second, independent truncation —
//! a plain prefix — produces the shorter user-facing source preview; the
//! two are intentionally different strategies.

use crate::rank::{count_whole_word, tokenize_query};

/// Paragraphs shorter than this carry headers and fragments, not prose.
const MIN_PARAGRAPH_CHARS: usize = 30;
/// Preferred fallback: the first paragraph with at least this much text.
const FALLBACK_PARAGRAPH_CHARS: usize = 50;
/// A sentence cut is only taken when it lands at least this far into the
/// truncation window.
const SENTENCE_CUT_RATIO: f64 = 0.7;

/// Default excerpt budget for prompt context.
pub const DEFAULT_EXCERPT_CHARS: usize = 500;

/// Extract the best excerpt of `content` for `query`, at most `max_chars`
/// characters (plus a `...` marker when hard-truncated).
pub fn extract_excerpt(content: &str, query: &str, max_chars: usize) -> String {
    let paragraphs: Vec<&str> = content
        .split("\n\n")
        .map(|p| p.trim())
        .filter(|p| p.chars().count() >= MIN_PARAGRAPH_CHARS)
        .collect();

    if paragraphs.is_empty() {
        return truncate_at_sentence(content.trim(), max_chars);
    }

    let tokens = tokenize_query(query);

    let mut best: Option<(&str, i64)> = None;
    for para in paragraphs.iter().copied() {
        let para_lower = para.to_lowercase();
        let mut score: i64 = 0;
        for token in &tokens {
            if count_whole_word(para, token) > 0 {
                score += 2;
            } else if para_lower.contains(token.as_str()) {
                score += 1;
            }
        }
        // First paragraph wins ties
        if best.map(|(_, s)| score > s).unwrap_or(true) {
            best = Some((para, score));
        }
    }

    let selected = match best {
        Some((para, score)) if score > 0 => para,
        _ => paragraphs
            .iter()
            .find(|p| p.chars().count() > FALLBACK_PARAGRAPH_CHARS)
            .copied()
            .unwrap_or(paragraphs[0]),
    };

    truncate_at_sentence(selected, max_chars)
}

/// The user-facing preview: a plain character prefix, no sentence logic.
pub fn source_preview(excerpt: &str, max_chars: usize) -> String {
    excerpt.chars().take(max_chars).collect()
}

/// Truncate to `max_chars`, cutting at the last `.` inside the window when
/// it falls at or past [`SENTENCE_CUT_RATIO`] of the budget, otherwise
/// hard-cutting and appending `...`.
fn truncate_at_sentence(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }

    let window: Vec<char> = text.chars().take(max_chars).collect();
    let last_period = window.iter().rposition(|&c| c == '.');

    match last_period {
        Some(pos) if (pos as f64) >= SENTENCE_CUT_RATIO * max_chars as f64 => {
            window[..=pos].iter().collect()
        }
        _ => {
            let mut out: String = window.into_iter().collect();
            out.push_str("...");
            out
        }
    }
}
