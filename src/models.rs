//! Core data models used throughout Grantmuse.
//!
//! These types represent the documents, chunks, chat interactions, and
//! source citations that flow through the processing and answer pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Stored document row: an uploaded file plus (once processed) its
/// extracted text and derived metadata.
#[derive(Debug, Clone)]
pub struct Document {
    pub id: String,
    pub file_name: String,
    pub file_type: String,
    /// Opaque locator into the blob store.
    pub file_path: String,
    /// Extracted plain text. `None` until processing completes; never
    /// partially written.
    pub content: Option<String>,
    /// SHA-256 of the raw bytes at processing time.
    pub content_hash: Option<String>,
    pub metadata: DocumentMeta,
    pub created_at: i64,
}

/// Derived document metadata, stored as a JSON object on the row.
///
/// All fields are optional so an unprocessed document's `{}` parses
/// cleanly. Keys not known to this struct survive the processor's merge
/// through `extra`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DocumentMeta {
    pub tags: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub word_count: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_count: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chunk_count: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processing_date: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// A paragraph-aligned slice of a document's extracted text.
///
/// Chunks are derived on demand and never persisted; joining all chunk
/// texts with `\n\n` reproduces the content modulo boundary whitespace.
#[derive(Debug, Clone)]
pub struct Chunk {
    pub index: i64,
    pub text: String,
}

/// Caller-supplied profile, interpolated verbatim into the system prompt.
/// Free text throughout; the core performs no validation on these fields.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UserProfile {
    pub career_stage: String,
    pub genre: String,
    pub project_type: String,
    pub project_budget: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub streaming_numbers: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous_grants: Option<String>,
}

/// User-facing citation returned alongside a generated answer.
///
/// `snippet` is a plain 150-character prefix of the excerpt, distinct from
/// the sentence-aware excerpt that goes into the prompt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentSource {
    pub id: String,
    pub name: String,
    pub snippet: String,
}

/// One persisted record of a user message and the generated answer.
/// Append-only: interactions are never mutated or deleted by the core.
#[derive(Debug, Clone)]
pub struct ChatInteraction {
    pub id: String,
    pub user_message: String,
    pub assistant_response: String,
    pub user_profile: serde_json::Value,
    pub sources: Option<Vec<DocumentSource>>,
    pub created_at: i64,
}
