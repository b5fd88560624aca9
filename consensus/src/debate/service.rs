//! Text-completion service seam and its OpenAI-compatible client.

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

use crate::message::ChatMessage;

#[derive(Debug, Error)]
pub enum CompletionError {
    #[error("Request failed: {0}")]
    RequestFailed(String),

    #[error("Completion API error ({status}): {body}")]
    Status { status: u16, body: String },

    #[error("Failed to parse completion response: {0}")]
    ParseError(String),

    #[error("Client setup failed: {0}")]
    Setup(String),
}

/// Anything that turns a conversation into one assistant reply.
#[async_trait]
pub trait CompletionService: Send + Sync {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, CompletionError>;
}

/// Endpoint settings for [`OpenAiClient`].
#[derive(Debug, Clone)]
pub struct EndpointConfig {
    /// Base URL up to and including the version segment, e.g. `https://api.openai.com/v1`.
    pub url: String,
    pub model: String,
    pub api_key: Option<String>,
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout: Duration,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            url: std::env::var("DEBATE_API_URL")
                .unwrap_or_else(|_| "https://api.openai.com/v1".into()),
            model: std::env::var("DEBATE_MODEL").unwrap_or_else(|_| "gpt-3.5-turbo".into()),
            api_key: std::env::var("OPENAI_API_KEY").ok(),
            temperature: 1.0,
            max_tokens: 2048,
            timeout: Duration::from_secs(120),
        }
    }
}

impl EndpointConfig {
    fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.url.trim_end_matches('/'))
    }
}

/// Client for any `/chat/completions` endpoint.
pub struct OpenAiClient {
    config: EndpointConfig,
    client: reqwest::Client,
}

impl OpenAiClient {
    pub fn new(config: EndpointConfig) -> Result<Self, CompletionError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| CompletionError::Setup(e.to_string()))?;
        Ok(Self { config, client })
    }

    pub fn config(&self) -> &EndpointConfig {
        &self.config
    }
}

#[async_trait]
impl CompletionService for OpenAiClient {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, CompletionError> {
        let start = std::time::Instant::now();

        let request_body = serde_json::json!({
            "model": self.config.model,
            "messages": messages,
            "max_tokens": self.config.max_tokens,
            "temperature": self.config.temperature,
        });

        let mut request = self
            .client
            .post(self.config.completions_url())
            .header("Content-Type", "application/json");
        if let Some(key) = &self.config.api_key {
            request = request.header("Authorization", format!("Bearer {}", key));
        }

        let response = request
            .json(&request_body)
            .send()
            .await
            .map_err(|e| CompletionError::RequestFailed(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(CompletionError::Status { status, body });
        }

        let resp_json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| CompletionError::ParseError(e.to_string()))?;

        // A null or missing content is a valid empty completion.
        let content = resp_json["choices"][0]["message"]["content"]
            .as_str()
            .unwrap_or("")
            .to_string();

        debug!(
            model = %self.config.model,
            chars = content.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "completion received"
        );

        Ok(content)
    }
}
