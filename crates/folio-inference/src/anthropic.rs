//! Anthropic messages API provider implementation.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use folio_core::{defaults, ProviderError, Result, TextProvider};

use crate::config::ProviderConfig;

const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Hosted Anthropic backend over `/v1/messages`.
pub struct AnthropicProvider {
    client: Client,
    config: ProviderConfig,
}

impl AnthropicProvider {
    /// Create a new Anthropic provider.
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
            "Initializing Anthropic provider"
        );

        Ok(Self { client, config })
    }

    async fn request(&self, text: &str, system: &str) -> std::result::Result<String, ProviderError> {
        let request = MessagesRequest {
            model: self.config.model.clone(),
            max_tokens: defaults::ANTHROPIC_MAX_TOKENS,
            system: if system.is_empty() {
                None
            } else {
                Some(system.to_string())
            },
            messages: vec![Message {
                role: "user".to_string(),
                content: text.to_string(),
            }],
        };

        let url = format!("{}/v1/messages", self.config.base_url.trim_end_matches('/'));
        let response = self
            .client
            .post(&url)
            .header("x-api-key", self.config.api_key.as_deref().unwrap_or(""))
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&request)
            .send()
            .await
            .map_err(classify_transport)?;

        let status = response.status();
        if !status.is_success() {
            let body: ApiErrorResponse = response.json().await.unwrap_or_default();
            return Err(classify_status(status.as_u16(), &body.error.message));
        }

        let result: MessagesResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Transient(format!("failed to parse response: {}", e)))?;

        let content: String = result
            .content
            .into_iter()
            .filter_map(|block| block.text)
            .collect();
        Ok(content)
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

fn classify_status(status: u16, message: &str) -> ProviderError {
    match status {
        401 | 403 => ProviderError::Fatal(format!("authentication failed: {}", message)),
        404 => ProviderError::Fatal(format!("model not found: {}", message)),
        429 => ProviderError::Transient(format!("rate limited: {}", message)),
        // 529 is the API's overloaded signal.
        529 => ProviderError::Transient(format!("service overloaded: {}", message)),
        500..=528 | 530..=599 => {
            ProviderError::Transient(format!("server error {}: {}", status, message))
        }
        _ => ProviderError::Fatal(format!("API returned {}: {}", status, message)),
    }
}

#[async_trait]
impl TextProvider for AnthropicProvider {
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
        "anthropic"
    }
}

#[derive(Serialize)]
struct MessagesRequest {
    model: String,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    messages: Vec<Message>,
}

#[derive(Serialize)]
struct Message {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Deserialize, Default)]
struct ApiErrorResponse {
    error: ApiError,
}

#[derive(Deserialize, Default)]
struct ApiError {
    #[serde(default)]
    message: String,
}
