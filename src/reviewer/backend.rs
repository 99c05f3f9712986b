//! Model backends for soliciting structured proposal reviews.
//!
//! The pipeline talks to the model through the [`ModelBackend`] trait
//! so the retry loop can be exercised against stubs. The production
//! backend drives the Ollama chat API over HTTP.

use crate::models::Vote;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// The structured payload a backend must produce for one proposal.
#[derive(Debug, Clone, PartialEq)]
pub struct ReviewPayload {
    pub summary: String,
    pub comment: String,
    pub vote: Vote,
}

/// Outcome of a single model invocation attempt.
///
/// Invocation failures are data, not exceptions: the retry loop
/// inspects the variant instead of catching errors. `Retryable`
/// covers transient service failures and malformed responses;
/// `Fatal` covers failures that no amount of retrying will fix.
#[derive(Debug, Clone)]
pub enum AttemptOutcome {
    Success(ReviewPayload),
    Retryable(String),
    Fatal(String),
}

/// A model that can review one proposal from a rendered prompt.
pub trait ModelBackend {
    fn invoke(&self, prompt: &str) -> impl std::future::Future<Output = AttemptOutcome> + Send;
}

/// Configuration for the Ollama backend.
#[derive(Debug, Clone)]
pub struct OllamaConfig {
    pub url: String,
    pub model_name: String,
    pub temperature: f32,
    pub timeout_seconds: u64,
}

/// Ollama chat API request.
#[derive(Debug, Serialize)]
struct OllamaChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    stream: bool,
    format: &'static str,
    options: OllamaOptions,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Serialize)]
struct OllamaOptions {
    temperature: f32,
}

/// Ollama chat API response.
#[derive(Debug, Deserialize)]
struct OllamaChatResponse {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: String,
}

/// The JSON object the model is instructed to emit.
#[derive(Debug, Deserialize)]
struct RawReview {
    summary: String,
    comment: String,
    vote: String,
}

/// Production backend against the Ollama chat API.
pub struct OllamaBackend {
    config: OllamaConfig,
    http_client: reqwest::Client,
}

impl OllamaBackend {
    pub fn new(config: OllamaConfig) -> anyhow::Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;

        Ok(Self {
            config,
            http_client,
        })
    }

    async fn chat(&self, prompt: &str) -> AttemptOutcome {
        let url = format!("{}/api/chat", self.config.url);

        let request = OllamaChatRequest {
            model: self.config.model_name.clone(),
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: REVIEW_SYSTEM_PROMPT.to_string(),
                },
                ChatMessage {
                    role: "user",
                    content: prompt.to_string(),
                },
            ],
            stream: false,
            format: "json",
            options: OllamaOptions {
                temperature: self.config.temperature,
            },
        };

        let response = match self.http_client.post(&url).json(&request).send().await {
            Ok(response) => response,
            Err(e) if e.is_timeout() => {
                return AttemptOutcome::Retryable(format!(
                    "request timed out after {}s",
                    self.config.timeout_seconds
                ));
            }
            Err(e) if e.is_connect() => {
                return AttemptOutcome::Retryable(format!(
                    "cannot connect to Ollama at {}",
                    self.config.url
                ));
            }
            Err(e) => {
                return AttemptOutcome::Retryable(format!("failed to send request: {}", e));
            }
        };

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            // Client errors other than rate limiting will not fix
            // themselves; retrying them just burns the attempt budget.
            if status.is_client_error() && status.as_u16() != 429 {
                return AttemptOutcome::Fatal(format!("Ollama API error {}: {}", status, body));
            }
            return AttemptOutcome::Retryable(format!("Ollama API error {}: {}", status, body));
        }

        let chat_response: OllamaChatResponse = match response.json().await {
            Ok(parsed) => parsed,
            Err(e) => {
                return AttemptOutcome::Retryable(format!("failed to parse Ollama response: {}", e));
            }
        };

        parse_review(&chat_response.message.content)
    }
}

impl ModelBackend for OllamaBackend {
    async fn invoke(&self, prompt: &str) -> AttemptOutcome {
        debug!("Sending review request to {}", self.config.model_name);
        self.chat(prompt).await
    }
}

/// Validate the model's raw output against the review contract.
///
/// Anything that is not a JSON object with a `summary`, a `comment`,
/// and one of the four literal vote strings is a retryable failure.
fn parse_review(content: &str) -> AttemptOutcome {
    let raw: RawReview = match serde_json::from_str(content.trim()) {
        Ok(raw) => raw,
        Err(e) => {
            return AttemptOutcome::Retryable(format!("malformed review object: {}", e));
        }
    };

    let vote: Vote = match raw.vote.parse() {
        Ok(vote) => vote,
        Err(e) => return AttemptOutcome::Retryable(e.to_string()),
    };

    AttemptOutcome::Success(ReviewPayload {
        summary: raw.summary,
        comment: raw.comment,
        vote,
    })
}

const REVIEW_SYSTEM_PROMPT: &str = r#"You are a conference programme committee reviewer.
Respond with exactly one JSON object of the shape
{"summary": "...", "comment": "...", "vote": "..."}
where vote is one of "+1", "+0", "-0", "-1".
Only output valid JSON, no explanations or markdown."#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_review_valid_object() {
        let outcome = parse_review(r#"{"summary": "S", "comment": "C", "vote": "+1"}"#);
        match outcome {
            AttemptOutcome::Success(payload) => {
                assert_eq!(payload.summary, "S");
                assert_eq!(payload.vote, Vote::PlusOne);
            }
            other => panic!("expected success, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_review_bad_vote_is_retryable() {
        let outcome = parse_review(r#"{"summary": "S", "comment": "C", "vote": "yes"}"#);
        assert!(matches!(outcome, AttemptOutcome::Retryable(_)));
    }

    #[test]
    fn test_parse_review_non_json_is_retryable() {
        let outcome = parse_review("I think this talk is great!");
        assert!(matches!(outcome, AttemptOutcome::Retryable(_)));
    }

    #[test]
    fn test_parse_review_missing_field_is_retryable() {
        let outcome = parse_review(r#"{"summary": "S", "vote": "+1"}"#);
        assert!(matches!(outcome, AttemptOutcome::Retryable(_)));
    }
}
