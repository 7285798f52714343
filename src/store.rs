//! Document and interaction persistence.
//!
//! All SQL for the `documents` and `interactions` tables lives here so the
//! CLI, the HTTP server, and the orchestrator share one set of queries.
//! Writes rely on SQLite's per-row atomicity; there are no cross-document
//! transactions.

use anyhow::Result;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::models::{ChatInteraction, Document, DocumentMeta, DocumentSource};

/// Cap on `metadata.tags`, shared by derived and manually added tags.
pub const MAX_TAGS: usize = 5;

fn row_to_document(row: &sqlx::sqlite::SqliteRow) -> Document {
    let metadata_json: String = row.get("metadata_json");
    let metadata: DocumentMeta = serde_json::from_str(&metadata_json).unwrap_or_default();

    Document {
        id: row.get("id"),
        file_name: row.get("file_name"),
        file_type: row.get("file_type"),
        file_path: row.get("file_path"),
        content: row.get("content"),
        content_hash: row.get("content_hash"),
        metadata,
        created_at: row.get("created_at"),
    }
}

/// Create an unprocessed document row and return its id.
pub async fn insert_document(
    pool: &SqlitePool,
    file_name: &str,
    file_type: &str,
    file_path: &str,
) -> Result<String> {
    let id = Uuid::new_v4().to_string();
    let now = chrono::Utc::now().timestamp();

    sqlx::query(
        r#"
        INSERT INTO documents (id, file_name, file_type, file_path, metadata_json, created_at)
        VALUES (?, ?, ?, ?, '{}', ?)
        "#,
    )
    .bind(&id)
    .bind(file_name)
    .bind(file_type)
    .bind(file_path)
    .bind(now)
    .execute(pool)
    .await?;

    Ok(id)
}

pub async fn get_document(pool: &SqlitePool, id: &str) -> Result<Option<Document>> {
    let row = sqlx::query(
        "SELECT id, file_name, file_type, file_path, content, content_hash, metadata_json, created_at
         FROM documents WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;

    Ok(row.as_ref().map(row_to_document))
}

pub async fn list_documents(pool: &SqlitePool) -> Result<Vec<Document>> {
    let rows = sqlx::query(
        "SELECT id, file_name, file_type, file_path, content, content_hash, metadata_json, created_at
         FROM documents ORDER BY created_at DESC, id ASC",
    )
    .fetch_all(pool)
    .await?;

    Ok(rows.iter().map(row_to_document).collect())
}

/// The ranker's candidate set: the N most recently created documents.
pub async fn recent_documents(pool: &SqlitePool, limit: i64) -> Result<Vec<Document>> {
    let rows = sqlx::query(
        "SELECT id, file_name, file_type, file_path, content, content_hash, metadata_json, created_at
         FROM documents ORDER BY created_at DESC, id ASC LIMIT ?",
    )
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows.iter().map(row_to_document).collect())
}

/// The processor's single atomic write: content, hash, and merged metadata.
///
/// Existing metadata keys are preserved unless the new metadata overwrites
/// them, so a manually added tag set or an unknown key survives
/// reprocessing only if the processor does not produce that key itself.
pub async fn mark_processed(
    pool: &SqlitePool,
    id: &str,
    content: &str,
    content_hash: &str,
    metadata: &DocumentMeta,
) -> Result<bool> {
    let existing: Option<String> =
        sqlx::query_scalar("SELECT metadata_json FROM documents WHERE id = ?")
            .bind(id)
            .fetch_optional(pool)
            .await?;

    let existing = match existing {
        Some(json) => json,
        None => return Ok(false),
    };

    let merged = merge_metadata(&existing, metadata)?;

    let result = sqlx::query(
        "UPDATE documents SET content = ?, content_hash = ?, metadata_json = ? WHERE id = ?",
    )
    .bind(content)
    .bind(content_hash)
    .bind(&merged)
    .bind(id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

fn merge_metadata(existing_json: &str, metadata: &DocumentMeta) -> Result<String> {
    let mut base: serde_json::Map<String, serde_json::Value> =
        serde_json::from_str(existing_json).unwrap_or_default();

    let new_value = serde_json::to_value(metadata)?;
    if let serde_json::Value::Object(new_map) = new_value {
        for (k, v) in new_map {
            base.insert(k, v);
        }
    }

    Ok(serde_json::Value::Object(base).to_string())
}

/// Append a user-supplied tag. Deduplicated; rejected beyond [`MAX_TAGS`].
pub async fn add_tag(pool: &SqlitePool, id: &str, tag: &str) -> Result<bool> {
    let doc = match get_document(pool, id).await? {
        Some(d) => d,
        None => return Ok(false),
    };

    let tag = tag.trim().to_lowercase();
    if tag.is_empty() {
        anyhow::bail!("tag must not be empty");
    }

    let mut metadata = doc.metadata;
    if metadata.tags.iter().any(|t| t == &tag) {
        return Ok(true);
    }
    if metadata.tags.len() >= MAX_TAGS {
        anyhow::bail!("document already has {} tags", MAX_TAGS);
    }
    metadata.tags.push(tag);

    let metadata_json = serde_json::to_string(&metadata)?;
    sqlx::query("UPDATE documents SET metadata_json = ? WHERE id = ?")
        .bind(&metadata_json)
        .bind(id)
        .execute(pool)
        .await?;

    Ok(true)
}

/// Remove a document row. Blob deletion is the caller's responsibility and
/// happens before the row goes away.
pub async fn delete_document(pool: &SqlitePool, id: &str) -> Result<bool> {
    let result = sqlx::query("DELETE FROM documents WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn insert_interaction(pool: &SqlitePool, interaction: &ChatInteraction) -> Result<()> {
    let sources_json = match &interaction.sources {
        Some(sources) => Some(serde_json::to_string(sources)?),
        None => None,
    };

    sqlx::query(
        r#"
        INSERT INTO interactions (id, user_message, assistant_response, user_profile_json, sources_json, created_at)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&interaction.id)
    .bind(&interaction.user_message)
    .bind(&interaction.assistant_response)
    .bind(interaction.user_profile.to_string())
    .bind(&sources_json)
    .bind(interaction.created_at)
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn list_interactions(pool: &SqlitePool, limit: i64) -> Result<Vec<ChatInteraction>> {
    let rows = sqlx::query(
        "SELECT id, user_message, assistant_response, user_profile_json, sources_json, created_at
         FROM interactions ORDER BY created_at DESC, id ASC LIMIT ?",
    )
    .bind(limit)
    .fetch_all(pool)
    .await?;

    let interactions = rows
        .iter()
        .map(|row| {
            let profile_json: String = row.get("user_profile_json");
            let sources_json: Option<String> = row.get("sources_json");
            let sources: Option<Vec<DocumentSource>> =
                sources_json.and_then(|s| serde_json::from_str(&s).ok());

            ChatInteraction {
                id: row.get("id"),
                user_message: row.get("user_message"),
                assistant_response: row.get("assistant_response"),
                user_profile: serde_json::from_str(&profile_json)
                    .unwrap_or(serde_json::json!({})),
                sources,
                created_at: row.get("created_at"),
            }
        })
        .collect();

    Ok(interactions)
}
