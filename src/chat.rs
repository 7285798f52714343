//! Answer orchestration.
//!
//! One chat request runs straight through: validate → assemble the system
//! prompt (role + optional profile clause) → rank the recent documents →
//! pull one excerpt per selected document → call the generation backend →
//! persist the interaction → return the answer with its source list.
//!
//! Failure policy: an empty message and a failed generation call are hard
//! errors; candidate fetching and excerpting degrade to "no sources"; the
//! interaction write is attempted, logged on failure, and never surfaces.

use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tracing::warn;
use uuid::Uuid;

use crate::config::RetrievalConfig;
use crate::generation::{GenerationBackend, GenerationError};
use crate::models::{ChatInteraction, DocumentSource, UserProfile};
use crate::rank::rank_documents;
use crate::snippet::{extract_excerpt, source_preview};
use crate::store;

const BASE_SYSTEM_PROMPT: &str = "You are a grant-writing assistant for Canadian musicians. You \
know the major Canadian funding bodies — FACTOR, Musicaction, the Canada Council for the Arts, \
and the provincial music industry associations — and you help artists choose programs, check \
eligibility, and draft strong applications. Be practical and specific. When excerpts from the \
user's uploaded documents are included below, ground your answer in them.";

#[derive(Debug)]
pub enum ChatError {
    /// The request carried no message text.
    MissingMessage,
    /// The generation API did not return success.
    Upstream(GenerationError),
}

impl std::fmt::Display for ChatError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChatError::MissingMessage => write!(f, "message is required"),
            ChatError::Upstream(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for ChatError {}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub user_profile: Option<UserProfile>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatResponse {
    pub response: String,
    /// `null` when no document scored above zero for the query.
    pub sources: Option<Vec<DocumentSource>>,
}

/// Build the profile clause appended to the system prompt. Fields are
/// interpolated verbatim; they are free text and validated nowhere.
fn profile_clause(profile: &UserProfile) -> String {
    let mut clause = format!(
        "\n\nThe musician you are helping: career stage: {}; genre: {}; project type: {}; \
         project budget: {}.",
        profile.career_stage, profile.genre, profile.project_type, profile.project_budget
    );
    if let Some(streaming) = &profile.streaming_numbers {
        clause.push_str(&format!(" Streaming numbers: {}.", streaming));
    }
    if let Some(previous) = &profile.previous_grants {
        clause.push_str(&format!(" Previous grants: {}.", previous));
    }
    clause
}

/// Run one chat request end to end.
pub async fn answer_chat(
    pool: &SqlitePool,
    retrieval: &RetrievalConfig,
    backend: &dyn GenerationBackend,
    request: ChatRequest,
) -> Result<ChatResponse, ChatError> {
    if request.message.trim().is_empty() {
        return Err(ChatError::MissingMessage);
    }

    let mut system_prompt = BASE_SYSTEM_PROMPT.to_string();
    if let Some(profile) = &request.user_profile {
        system_prompt.push_str(&profile_clause(profile));
    }

    // Candidate fetch failures degrade to "no sources", never abort.
    let candidates = match store::recent_documents(pool, retrieval.candidate_limit).await {
        Ok(docs) => docs,
        Err(e) => {
            warn!(error = %e, "candidate fetch failed; answering without sources");
            Vec::new()
        }
    };

    let ranked = rank_documents(&request.message, candidates, retrieval.max_sources);

    let mut sources: Vec<DocumentSource> = Vec::new();
    for scored in &ranked {
        let doc = &scored.document;
        let content = match doc.content.as_deref() {
            Some(c) => c,
            None => continue,
        };
        let excerpt = extract_excerpt(content, &request.message, retrieval.excerpt_chars);
        system_prompt.push_str(&format!(
            "\n\nFrom document \"{}\": {}",
            doc.file_name, excerpt
        ));
        sources.push(DocumentSource {
            id: doc.id.clone(),
            name: doc.file_name.clone(),
            snippet: source_preview(&excerpt, retrieval.preview_chars),
        });
    }

    let answer = backend
        .complete(&system_prompt, &request.message)
        .await
        .map_err(ChatError::Upstream)?;

    let sources = if sources.is_empty() {
        None
    } else {
        Some(sources)
    };

    let interaction = ChatInteraction {
        id: Uuid::new_v4().to_string(),
        user_message: request.message.clone(),
        assistant_response: answer.clone(),
        user_profile: request
            .user_profile
            .as_ref()
            .and_then(|p| serde_json::to_value(p).ok())
            .unwrap_or_else(|| serde_json::json!({})),
        sources: sources.clone(),
        created_at: chrono::Utc::now().timestamp(),
    };
    // Best effort: the answer goes back to the user whether or not the
    // log write lands.
    if let Err(e) = store::insert_interaction(pool, &interaction).await {
        warn!(error = %e, "failed to persist chat interaction");
    }

    Ok(ChatResponse {
        response: answer,
        sources,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::migrate;
    use crate::models::DocumentMeta;
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct MockBackend {
        fail_status: Option<u16>,
        calls: Mutex<Vec<(String, String)>>,
    }

    impl MockBackend {
        fn ok() -> Self {
            Self {
                fail_status: None,
                calls: Mutex::new(Vec::new()),
            }
        }

        fn failing(status: u16) -> Self {
            Self {
                fail_status: Some(status),
                calls: Mutex::new(Vec::new()),
            }
        }

        fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }

        fn last_system_prompt(&self) -> String {
            self.calls.lock().unwrap().last().unwrap().0.clone()
        }
    }

    #[async_trait]
    impl GenerationBackend for MockBackend {
        async fn complete(&self, system: &str, user: &str) -> Result<String, GenerationError> {
            self.calls
                .lock()
                .unwrap()
                .push((system.to_string(), user.to_string()));
            match self.fail_status {
                Some(status) => Err(GenerationError {
                    status: Some(status),
                    message: "upstream failure".to_string(),
                }),
                None => Ok("Here is what I found about grants.".to_string()),
            }
        }
    }

    async fn test_pool() -> SqlitePool {
        let pool = sqlx::sqlite::SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        migrate::apply(&pool).await.unwrap();
        pool
    }

    async fn seed_processed_doc(pool: &SqlitePool, name: &str, content: &str, category: &str) {
        let id = store::insert_document(pool, name, "text/plain", &format!("k/{}", name))
            .await
            .unwrap();
        let meta = DocumentMeta {
            tags: crate::process::detect_tags(content),
            category: Some(category.to_string()),
            size: Some(content.len() as u64),
            word_count: Some(content.split_whitespace().count() as u64),
            chunk_count: Some(1),
            ..Default::default()
        };
        store::mark_processed(pool, &id, content, "hash", &meta)
            .await
            .unwrap();
    }

    fn request(message: &str) -> ChatRequest {
        ChatRequest {
            message: message.to_string(),
            user_profile: None,
        }
    }

    #[tokio::test]
    async fn test_missing_message_skips_generation() {
        let pool = test_pool().await;
        let backend = MockBackend::ok();

        let err = answer_chat(&pool, &RetrievalConfig::default(), &backend, request("  "))
            .await
            .unwrap_err();
        assert!(matches!(err, ChatError::MissingMessage));
        // The external call was never made
        assert_eq!(backend.call_count(), 0);
    }

    #[tokio::test]
    async fn test_empty_store_yields_null_sources() {
        let pool = test_pool().await;
        let backend = MockBackend::ok();

        let response = answer_chat(
            &pool,
            &RetrievalConfig::default(),
            &backend,
            request("what touring grants exist?"),
        )
        .await
        .unwrap();

        assert_eq!(response.response, "Here is what I found about grants.");
        assert!(response.sources.is_none());
        assert!(!backend.last_system_prompt().contains("From document"));
    }

    #[tokio::test]
    async fn test_sources_included_for_matching_documents() {
        let pool = test_pool().await;
        seed_processed_doc(
            &pool,
            "touring.txt",
            "The touring grant covers showcase travel.\n\nThe touring deadline is May 30 and \
             applications are juried by industry peers in the fall.",
            "Touring & Showcase Grants",
        )
        .await;
        seed_processed_doc(
            &pool,
            "unrelated.txt",
            "Office seating chart.\n\nNothing about music funding lives in this file at all.",
            "General Information",
        )
        .await;

        let backend = MockBackend::ok();
        let response = answer_chat(
            &pool,
            &RetrievalConfig::default(),
            &backend,
            request("when is the touring deadline?"),
        )
        .await
        .unwrap();

        let sources = response.sources.unwrap();
        assert_eq!(sources.len(), 1);
        assert_eq!(sources[0].name, "touring.txt");
        assert!(sources[0].snippet.chars().count() <= 150);

        let prompt = backend.last_system_prompt();
        assert!(prompt.contains("From document \"touring.txt\":"));
        assert!(!prompt.contains("unrelated.txt"));
    }

    #[tokio::test]
    async fn test_profile_interpolated_into_prompt() {
        let pool = test_pool().await;
        let backend = MockBackend::ok();

        let req = ChatRequest {
            message: "which grant fits me?".to_string(),
            user_profile: Some(UserProfile {
                career_stage: "emerging".to_string(),
                genre: "folk".to_string(),
                project_type: "debut album".to_string(),
                project_budget: "$12,000".to_string(),
                streaming_numbers: Some("40k monthly".to_string()),
                previous_grants: None,
            }),
        };
        answer_chat(&pool, &RetrievalConfig::default(), &backend, req)
            .await
            .unwrap();

        let prompt = backend.last_system_prompt();
        assert!(prompt.contains("career stage: emerging"));
        assert!(prompt.contains("genre: folk"));
        assert!(prompt.contains("Streaming numbers: 40k monthly"));
        assert!(!prompt.contains("Previous grants"));
    }

    #[tokio::test]
    async fn test_upstream_failure_aborts_without_persisting() {
        let pool = test_pool().await;
        let backend = MockBackend::failing(500);

        let err = answer_chat(
            &pool,
            &RetrievalConfig::default(),
            &backend,
            request("what grants exist?"),
        )
        .await
        .unwrap_err();

        match err {
            ChatError::Upstream(e) => assert_eq!(e.status, Some(500)),
            other => panic!("expected upstream error, got {:?}", other),
        }

        let interactions = store::list_interactions(&pool, 10).await.unwrap();
        assert!(interactions.is_empty());
    }

    #[tokio::test]
    async fn test_interaction_persisted_on_success() {
        let pool = test_pool().await;
        let backend = MockBackend::ok();

        answer_chat(
            &pool,
            &RetrievalConfig::default(),
            &backend,
            request("tell me about funding"),
        )
        .await
        .unwrap();

        let interactions = store::list_interactions(&pool, 10).await.unwrap();
        assert_eq!(interactions.len(), 1);
        assert_eq!(interactions[0].user_message, "tell me about funding");
        assert_eq!(
            interactions[0].assistant_response,
            "Here is what I found about grants."
        );
        assert!(interactions[0].sources.is_none());
    }

    #[tokio::test]
    async fn test_persistence_failure_is_swallowed() {
        let pool = test_pool().await;
        pool.close().await;
        let backend = MockBackend::ok();

        // With the pool closed, both the candidate fetch and the
        // interaction write fail; the answer still comes back.
        let response = answer_chat(
            &pool,
            &RetrievalConfig::default(),
            &backend,
            request("still works?"),
        )
        .await
        .unwrap();

        assert_eq!(response.response, "Here is what I found about grants.");
        assert!(response.sources.is_none());
    }
}
