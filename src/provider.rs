//! Language-model provider abstraction and the OpenAI-backed client.
//!
//! The pipeline talks to the provider through the [`LanguageModel`] trait:
//! `embed_batch` / `embed` for vectors and `complete` for grounded answer
//! generation. [`OpenAiClient`] is the one conforming implementation; unit
//! and integration tests substitute deterministic fakes.
//!
//! # Retry strategy
//!
//! Provider calls use bounded exponential backoff for transient errors:
//! - HTTP 429 (rate limited) and 5xx (server error) → retry
//! - HTTP 4xx (client error, not 429) → fail immediately
//! - Network errors → retry
//! - Backoff: 1s, 2s, 4s, ... (capped at 2^5)
//!
//! Every request carries the configured timeout so a hung provider call
//! fails the operation instead of stalling it indefinitely.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::ProviderConfig;
use crate::error::{QaError, Result};

const OPENAI_API_BASE: &str = "https://api.openai.com/v1";

/// Capability interface for the external embedding/generation provider.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Embed a batch of texts, returning one vector per input in order.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Embed a single text (e.g. a question).
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Generate a completion for the given prompt.
    async fn complete(&self, prompt: &str) -> Result<String>;
}

/// [`LanguageModel`] backed by the OpenAI embeddings and chat APIs.
pub struct OpenAiClient {
    client: reqwest::Client,
    api_key: String,
    api_base: String,
    embedding_model: String,
    chat_model: String,
    max_retries: u32,
}

impl OpenAiClient {
    /// Build a client from configuration. Requires `OPENAI_API_KEY` in the
    /// environment.
    pub fn from_config(config: &ProviderConfig) -> Result<Self> {
        let api_key = std::env::var("OPENAI_API_KEY").map_err(|_| {
            QaError::InvalidConfiguration("OPENAI_API_KEY environment variable not set".to_string())
        })?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| QaError::EmbeddingProvider(format!("failed to build client: {}", e)))?;

        Ok(Self {
            client,
            api_key,
            api_base: config
                .api_base
                .clone()
                .unwrap_or_else(|| OPENAI_API_BASE.to_string()),
            embedding_model: config.embedding_model.clone(),
            chat_model: config.chat_model.clone(),
            max_retries: config.max_retries,
        })
    }

    /// POST `body` to `url` with retry/backoff. Returns the response body
    /// text on success, or a description of the final failure.
    async fn post_with_retry(
        &self,
        url: &str,
        body: &serde_json::Value,
    ) -> std::result::Result<String, String> {
        let mut last_err = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = Duration::from_secs(1 << (attempt - 1).min(5));
                debug!(attempt, delay_secs = delay.as_secs(), "retrying provider call");
                tokio::time::sleep(delay).await;
            }

            let resp = self
                .client
                .post(url)
                .bearer_auth(&self.api_key)
                .json(body)
                .send()
                .await;

            match resp {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        return response.text().await.map_err(|e| e.to_string());
                    }

                    let body_text = response.text().await.unwrap_or_default();

                    // Rate limited or server error — retry
                    if status.as_u16() == 429 || status.is_server_error() {
                        warn!(%status, "provider returned retryable error");
                        last_err = Some(format!("provider error {}: {}", status, body_text));
                        continue;
                    }

                    // Client error (not 429) — don't retry
                    return Err(format!("provider error {}: {}", status, body_text));
                }
                Err(e) => {
                    warn!(error = %e, "provider request failed");
                    last_err = Some(e.to_string());
                    continue;
                }
            }
        }

        Err(last_err.unwrap_or_else(|| "provider call failed after retries".to_string()))
    }
}

// ============ Wire types ============

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    index: usize,
    embedding: Vec<f32>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    content: String,
}

#[async_trait]
impl LanguageModel for OpenAiClient {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        debug!(batch_size = texts.len(), model = %self.embedding_model, "embedding batch");

        let body = serde_json::json!({
            "model": self.embedding_model,
            "input": texts,
        });

        let url = format!("{}/embeddings", self.api_base);
        let text = self
            .post_with_retry(&url, &body)
            .await
            .map_err(QaError::EmbeddingProvider)?;

        let parsed: EmbeddingResponse = serde_json::from_str(&text).map_err(|e| {
            QaError::EmbeddingProvider(format!("invalid embeddings response: {}", e))
        })?;

        if parsed.data.len() != texts.len() {
            return Err(QaError::EmbeddingProvider(format!(
                "provider returned {} embeddings for {} inputs",
                parsed.data.len(),
                texts.len()
            )));
        }

        // Order by index so output matches input order
        let mut data = parsed.data;
        data.sort_by_key(|d| d.index);
        Ok(data.into_iter().map(|d| d.embedding).collect())
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let results = self.embed_batch(&[text.to_string()]).await?;
        results
            .into_iter()
            .next()
            .ok_or_else(|| QaError::EmbeddingProvider("empty embedding response".to_string()))
    }

    async fn complete(&self, prompt: &str) -> Result<String> {
        debug!(model = %self.chat_model, prompt_len = prompt.len(), "requesting completion");

        let messages = vec![ChatMessage {
            role: "user",
            content: prompt,
        }];
        let body = serde_json::json!({
            "model": self.chat_model,
            "messages": messages,
            "temperature": 0,
        });

        let url = format!("{}/chat/completions", self.api_base);
        let text = self
            .post_with_retry(&url, &body)
            .await
            .map_err(QaError::Completion)?;

        let parsed: ChatResponse = serde_json::from_str(&text)
            .map_err(|e| QaError::Completion(format!("invalid chat response: {}", e)))?;

        parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| QaError::Completion("chat response contained no choices".to_string()))
    }
}
