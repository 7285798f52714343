//! Document processor: raw stored bytes → searchable text + metadata.
//!
//! Supported inputs are PDF, legacy Word, OOXML Word, and any `text/*`
//! type. All of them are decoded as UTF-8 text: no PDF or Word binary
//! parsing happens here. The byte stream is treated as text and line
//! endings are normalized.

use sha2::{Digest, Sha256};
use sqlx::SqlitePool;
use tracing::info;

use crate::chunk::chunk_text;
use crate::models::DocumentMeta;
use crate::storage::{BlobStore, StorageError};
use crate::store;

pub const MIME_PDF: &str = "application/pdf";
pub const MIME_DOC: &str = "application/msword";
pub const MIME_DOCX: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document";

/// Words-per-page heuristic used to estimate PDF page counts.
const WORDS_PER_PAGE: u64 = 500;

/// Ordered category checklist. The first group with any keyword present in
/// the text wins, so the order here is load-bearing.
const CATEGORY_RULES: &[(&str, &[&str])] = &[
    (
        "Recording Grants",
        &["sound recording", "recording", "album", "studio", "master"],
    ),
    (
        "Touring & Showcase Grants",
        &["touring", "tour", "showcase", "live performance"],
    ),
    (
        "Marketing & Promotion",
        &["marketing", "promotion", "publicity", "advertising"],
    ),
    (
        "Application Guidelines",
        &["guidelines", "application", "eligibility", "criteria", "how to apply"],
    ),
    (
        "Budget & Financial",
        &["budget", "financial", "funding", "costs", "expenses"],
    ),
];

const FALLBACK_CATEGORY: &str = "General Information";

/// Fixed tag vocabulary, scanned in order. A document's derived tags are
/// the first [`store::MAX_TAGS`] of these literally present in its text.
const TAG_VOCABULARY: &[&str] = &[
    "grant",
    "factor",
    "musicaction",
    "eligibility",
    "deadline",
    "recording",
    "album",
    "studio",
    "touring",
    "tour",
    "showcase",
    "marketing",
    "promotion",
    "budget",
    "funding",
    "application",
    "juried",
    "demo",
    "production",
    "distribution",
    "radio",
    "airplay",
    "streaming",
    "publishing",
    "songwriting",
    "artist",
    "label",
    "royalties",
    "festival",
    "sponsorship",
];

#[derive(Debug)]
pub enum ProcessError {
    UnsupportedFileType(String),
    DocumentNotFound(String),
    FileNotFound(String),
    Persist(String),
    Internal(String),
}

impl std::fmt::Display for ProcessError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProcessError::UnsupportedFileType(t) => write!(f, "unsupported file type: {}", t),
            ProcessError::DocumentNotFound(id) => write!(f, "document not found: {}", id),
            ProcessError::FileNotFound(key) => write!(f, "stored file not found: {}", key),
            ProcessError::Persist(e) => write!(f, "failed to persist processing result: {}", e),
            ProcessError::Internal(e) => write!(f, "internal error: {}", e),
        }
    }
}

impl std::error::Error for ProcessError {}

fn is_supported(file_type: &str) -> bool {
    file_type == MIME_PDF
        || file_type == MIME_DOC
        || file_type == MIME_DOCX
        || file_type.starts_with("text/")
}

/// Decode stored bytes into the text the rest of the pipeline works on.
pub fn decode_text(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).replace("\r\n", "\n")
}

/// First matching label from the ordered keyword checklist.
pub fn detect_category(text: &str) -> &'static str {
    let lower = text.to_lowercase();
    for (label, keywords) in CATEGORY_RULES {
        if keywords.iter().any(|k| lower.contains(k)) {
            return label;
        }
    }
    FALLBACK_CATEGORY
}

/// Up to [`store::MAX_TAGS`] vocabulary terms present in the text,
/// vocabulary order preserved.
pub fn detect_tags(text: &str) -> Vec<String> {
    let lower = text.to_lowercase();
    let mut tags = Vec::new();
    for term in TAG_VOCABULARY {
        if tags.len() >= store::MAX_TAGS {
            break;
        }
        if lower.contains(term) && !tags.iter().any(|t: &String| t == term) {
            tags.push((*term).to_string());
        }
    }
    tags
}

/// Derive the full metadata object for a decoded document.
pub fn build_metadata(file_type: &str, bytes: &[u8], text: &str, max_chunk_chars: usize) -> DocumentMeta {
    let word_count = text.split_whitespace().count() as u64;
    let chunk_count = chunk_text(text, max_chunk_chars).len() as u64;

    let (word_count, page_count) = if file_type == MIME_PDF {
        (None, Some(word_count.div_ceil(WORDS_PER_PAGE)))
    } else {
        (Some(word_count), None)
    };

    DocumentMeta {
        tags: detect_tags(text),
        category: Some(detect_category(text).to_string()),
        size: Some(bytes.len() as u64),
        word_count,
        page_count,
        chunk_count: Some(chunk_count),
        processing_date: Some(chrono::Utc::now()),
        extra: serde_json::Map::new(),
    }
}

/// Run the full processing pipeline for one stored document.
///
/// One blob read, one row update; deterministic for identical bytes apart
/// from `processingDate`. Reprocessing is allowed and overwrites the
/// previous result (last writer wins).
pub async fn process_document(
    pool: &SqlitePool,
    blobs: &BlobStore,
    max_chunk_chars: usize,
    id: &str,
) -> Result<DocumentMeta, ProcessError> {
    let doc = store::get_document(pool, id)
        .await
        .map_err(|e| ProcessError::Internal(e.to_string()))?
        .ok_or_else(|| ProcessError::DocumentNotFound(id.to_string()))?;

    if !is_supported(&doc.file_type) {
        return Err(ProcessError::UnsupportedFileType(doc.file_type));
    }

    let bytes = blobs.get(&doc.file_path).map_err(|e| match e {
        StorageError::NotFound(key) => ProcessError::FileNotFound(key),
        other => ProcessError::Internal(other.to_string()),
    })?;

    let text = decode_text(&bytes);
    let metadata = build_metadata(&doc.file_type, &bytes, &text, max_chunk_chars);

    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    let content_hash = format!("{:x}", hasher.finalize());

    let updated = store::mark_processed(pool, id, &text, &content_hash, &metadata)
        .await
        .map_err(|e| ProcessError::Persist(e.to_string()))?;
    if !updated {
        // Row disappeared between the read and the write
        return Err(ProcessError::DocumentNotFound(id.to_string()));
    }

    info!(
        document = id,
        category = metadata.category.as_deref().unwrap_or(""),
        chunks = metadata.chunk_count.unwrap_or(0),
        "processed document"
    );

    Ok(metadata)
}
