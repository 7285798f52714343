//! External text-generation client.
//!
//! The orchestrator talks to an OpenAI-compatible chat-completions
//! endpoint through the [`GenerationBackend`] trait so tests can substitute
//! a local fake. The HTTP implementation sends a non-streaming two-message
//! exchange and reports non-success statuses as [`GenerationError`]s with
//! the upstream status attached.
//!
//! There is no automatic retry or backoff: a failed call is surfaced to
//! the caller as a single failure. The configurable request timeout
//! (30 s default) bounds a hung upstream.

use async_trait::async_trait;
use std::time::Duration;

use crate::config::GenerationConfig;

#[derive(Debug)]
pub struct GenerationError {
    /// Upstream HTTP status, when the upstream answered at all.
    pub status: Option<u16>,
    pub message: String,
}

impl std::fmt::Display for GenerationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.status {
            Some(status) => write!(f, "generation API error {}: {}", status, self.message),
            None => write!(f, "generation request failed: {}", self.message),
        }
    }
}

impl std::error::Error for GenerationError {}

/// Seam between the orchestrator and the external generation API.
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    /// Run one non-streaming system+user exchange and return the answer text.
    async fn complete(&self, system: &str, user: &str) -> Result<String, GenerationError>;
}

/// Production backend: bearer-authenticated HTTPS calls to the configured
/// chat-completions endpoint.
pub struct HttpGenerationClient {
    config: GenerationConfig,
}

impl HttpGenerationClient {
    pub fn new(config: GenerationConfig) -> Self {
        Self { config }
    }

    fn api_key(&self) -> Result<String, GenerationError> {
        std::env::var(&self.config.api_key_env).map_err(|_| GenerationError {
            status: None,
            message: format!("{} environment variable not set", self.config.api_key_env),
        })
    }
}

#[async_trait]
impl GenerationBackend for HttpGenerationClient {
    async fn complete(&self, system: &str, user: &str) -> Result<String, GenerationError> {
        let api_key = self.api_key()?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(self.config.timeout_secs))
            .build()
            .map_err(|e| GenerationError {
                status: None,
                message: e.to_string(),
            })?;

        let body = serde_json::json!({
            "model": self.config.model,
            "messages": [
                { "role": "system", "content": system },
                { "role": "user", "content": user },
            ],
            "stream": false,
        });

        let response = client
            .post(&self.config.api_url)
            .header("Authorization", format!("Bearer {}", api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| GenerationError {
                status: None,
                message: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            return Err(GenerationError {
                status: Some(status.as_u16()),
                message: body_text,
            });
        }

        let json: serde_json::Value = response.json().await.map_err(|e| GenerationError {
            status: None,
            message: format!("invalid response body: {}", e),
        })?;

        parse_completion_response(&json)
    }
}

/// Extract `choices[0].message.content` from a chat-completions response.
fn parse_completion_response(json: &serde_json::Value) -> Result<String, GenerationError> {
    json.get("choices")
        .and_then(|c| c.as_array())
        .and_then(|c| c.first())
        .and_then(|c| c.get("message"))
        .and_then(|m| m.get("content"))
        .and_then(|c| c.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| GenerationError {
            status: None,
            message: "invalid response: missing choices[0].message.content".to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid_response() {
        let json = serde_json::json!({
            "choices": [
                { "message": { "role": "assistant", "content": "FACTOR funds recordings." } }
            ]
        });
        assert_eq!(
            parse_completion_response(&json).unwrap(),
            "FACTOR funds recordings."
        );
    }

    #[test]
    fn test_parse_missing_choices() {
        let json = serde_json::json!({ "error": "rate limited" });
        let err = parse_completion_response(&json).unwrap_err();
        assert!(err.message.contains("choices"));
    }

    #[test]
    fn test_parse_empty_choices() {
        let json = serde_json::json!({ "choices": [] });
        assert!(parse_completion_response(&json).is_err());
    }

    #[test]
    fn test_error_display_with_status() {
        let err = GenerationError {
            status: Some(500),
            message: "boom".to_string(),
        };
        assert!(err.to_string().contains("500"));
    }
}
