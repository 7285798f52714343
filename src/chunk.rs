//! Paragraph-boundary text chunker.
//!
//! Splits extracted document text into [`Chunk`]s whose joined length
//! respects a character budget (default 500). Splitting occurs on paragraph
//! boundaries (`\n\n`) only: a single paragraph longer than the budget
//! becomes its own oversize chunk rather than being cut mid-paragraph.
//!
//! Joining all chunk texts with `\n\n` reproduces the input modulo leading
//! and trailing whitespace per paragraph.

use crate::models::Chunk;

/// Split text into chunks on paragraph boundaries, respecting `max_chars`.
/// Returns chunks with contiguous indices starting at 0.
pub fn chunk_text(text: &str, max_chars: usize) -> Vec<Chunk> {
    if text.trim().is_empty() {
        return vec![make_chunk(0, text.trim())];
    }

    let paragraphs: Vec<&str> = text.split("\n\n").collect();
    let mut chunks = Vec::new();
    let mut current_buf = String::new();
    let mut chunk_index: i64 = 0;

    for para in paragraphs {
        let trimmed = para.trim();
        if trimmed.is_empty() {
            continue;
        }

        // If adding this paragraph would exceed the budget, flush first
        let would_be = if current_buf.is_empty() {
            trimmed.chars().count()
        } else {
            current_buf.chars().count() + 2 + trimmed.chars().count() // +2 for \n\n separator
        };

        if would_be > max_chars && !current_buf.is_empty() {
            chunks.push(make_chunk(chunk_index, &current_buf));
            chunk_index += 1;
            current_buf.clear();
        }

        if trimmed.chars().count() > max_chars {
            // Oversize paragraph: keep it whole as its own chunk
            chunks.push(make_chunk(chunk_index, trimmed));
            chunk_index += 1;
        } else {
            if !current_buf.is_empty() {
                current_buf.push_str("\n\n");
            }
            current_buf.push_str(trimmed);
        }
    }

    // Flush remaining
    if !current_buf.is_empty() {
        chunks.push(make_chunk(chunk_index, &current_buf));
    }

    if chunks.is_empty() {
        chunks.push(make_chunk(0, text.trim()));
    }

    chunks
}

fn make_chunk(index: i64, text: &str) -> Chunk {
    Chunk {
        index,
        text: text.to_string(),
    }
}
