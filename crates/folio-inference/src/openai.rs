//! OpenAI-compatible provider implementation.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use folio_core::{ProviderError, Result, TextProvider};

use crate::config::ProviderConfig;

/// Hosted OpenAI-compatible backend over `/chat/completions`.
pub struct OpenAiProvider {
    client: Client,
    config: ProviderConfig,
}

impl OpenAiProvider {
    /// Create a new OpenAI-compatible provider.
    pub fn new(config: ProviderConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| {
                folio_core::Error::Provider(ProviderError::Configuration(format!(
                    "failed to create HTTP client: {}",
                    e
                )))
            })?;

        debug!(
            base_url = %config.base_url,
            model = %config.model,
            "Initializing OpenAI provider"
        );

        Ok(Self { client, config })
    }

    async fn request(&self, text: &str, system: &str) -> std::result::Result<String, ProviderError> {
        let mut messages = Vec::new();
        if !system.is_empty() {
            messages.push(ChatMessage {
                role: "system".to_string(),
                content: system.to_string(),
            });
        }
        messages.push(ChatMessage {
            role: "user".to_string(),
            content: text.to_string(),
        });

        let request = ChatRequest {
            model: self.config.model.clone(),
            messages,
        };

        let url = format!(
            "{}/chat/completions",
            self.config.base_url.trim_end_matches('/')
        );
        let mut req = self.client.post(&url).json(&request);
        if let Some(ref api_key) = self.config.api_key {
            req = req.header("Authorization", format!("Bearer {}", api_key));
        }

        let response = req.send().await.map_err(classify_transport)?;

        let status = response.status();
        if !status.is_success() {
            let body: ApiErrorResponse = response.json().await.unwrap_or_default();
            return Err(classify_status(
                status.as_u16(),
                &body.error.error_type,
                body.error.code.as_deref().unwrap_or(""),
                &body.error.message,
            ));
        }

        let result: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Transient(format!("failed to parse response: {}", e)))?;

        let choice = result
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::Transient("response contained no choices".to_string()))?;

        if choice.finish_reason.as_deref() == Some("content_filter") {
            return Err(ProviderError::ContentPolicy(
                "response stopped by content filter".to_string(),
            ));
        }

        Ok(choice.message.content)
    }
}

fn classify_transport(e: reqwest::Error) -> ProviderError {
    if e.is_timeout() {
        ProviderError::Transient(format!("request timed out: {}", e))
    } else if e.is_connect() {
        ProviderError::Transient(format!("connection failed: {}", e))
    } else {
        ProviderError::Transient(format!("request failed: {}", e))
    }
}

/// Map an error response to a provider error class.
///
/// Quota exhaustion is distinguished from plain rate limiting: the former
/// will not recover within a job's lifetime.
fn classify_status(status: u16, error_type: &str, code: &str, message: &str) -> ProviderError {
    match status {
        401 | 403 => ProviderError::Fatal(format!("authentication failed: {}", message)),
        404 => ProviderError::Fatal(format!("model not found: {}", message)),
        429 => {
            if error_type.contains("insufficient_quota") || code.contains("insufficient_quota") {
                ProviderError::Fatal(format!("quota exhausted: {}", message))
            } else {
                ProviderError::Transient(format!("rate limited: {}", message))
            }
        }
        400 if error_type.contains("content") || code.contains("content_filter") => {
            ProviderError::ContentPolicy(message.to_string())
        }
        500..=599 => ProviderError::Transient(format!("server error {}: {}", status, message)),
        _ if error_type == "model_not_found" || code == "model_not_found" => {
            ProviderError::Fatal(format!("model not found: {}", message))
        }
        _ => ProviderError::Fatal(format!("API returned {}: {}", status, message)),
    }
}

#[async_trait]
impl TextProvider for OpenAiProvider {
    async fn transform(
        &self,
        text: &str,
        system_prompt: &str,
        cancel: &CancellationToken,
    ) -> std::result::Result<String, ProviderError> {
        if cancel.is_cancelled() {
            return Err(ProviderError::Cancelled);
        }
        tokio::select! {
            _ = cancel.cancelled() => Err(ProviderError::Cancelled),
            result = self.request(text, system_prompt) => result,
        }
    }

    fn name(&self) -> &str {
        "openai"
    }
}

#[derive(Serialize, Deserialize, Clone)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChatMessage,
    finish_reason: Option<String>,
}

#[derive(Deserialize, Default)]
struct ApiErrorResponse {
    error: ApiError,
}

#[derive(Deserialize, Default)]
struct ApiError {
    #[serde(default)]
    message: String,
    #[serde(rename = "type", default)]
    error_type: String,
    #[serde(default)]
    code: Option<String>,
}
