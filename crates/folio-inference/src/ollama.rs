//! Ollama provider implementation (local model server).

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use folio_core::{ProviderError, Result, TextProvider};

use crate::config::ProviderConfig;

/// Local Ollama backend over `/api/chat`.
///
/// A single local model instance serves one request at a time, so this
/// backend reports `supports_parallel() == false` and the engine runs it
/// on the sequential path.
pub struct OllamaProvider {
    client: Client,
    config: ProviderConfig,
}

impl OllamaProvider {
    /// Create a new Ollama provider.
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
            "Initializing Ollama provider"
        );

        Ok(Self { client, config })
    }

    async fn request(&self, text: &str, system: &str) -> std::result::Result<String, ProviderError> {
        let start = Instant::now();

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
            stream: false,
        };

        let response = self
            .client
            .post(format!(
                "{}/api/chat",
                self.config.base_url.trim_end_matches('/')
            ))
            .json(&request)
            .send()
            .await
            .map_err(classify_transport)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(status.as_u16(), &body));
        }

        let result: ChatResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Transient(format!("failed to parse response: {}", e)))?;

        let content = result.message.content;
        let elapsed = start.elapsed().as_millis() as u64;
        debug!(
            response_len = content.len(),
            duration_ms = elapsed,
            "Transform complete"
        );
        if elapsed > 30_000 {
            warn!(
                duration_ms = elapsed,
                chunk_len = text.len(),
                "Slow transform"
            );
        }
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

fn classify_status(status: u16, body: &str) -> ProviderError {
    match status {
        404 => ProviderError::Fatal(format!("model not found: {}", body)),
        500..=599 => ProviderError::Transient(format!("Ollama returned {}: {}", status, body)),
        _ => ProviderError::Fatal(format!("Ollama returned {}: {}", status, body)),
    }
}

#[async_trait]
impl TextProvider for OllamaProvider {
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
        "ollama"
    }

    fn supports_parallel(&self) -> bool {
        false
    }
}

/// Chat API message for `/api/chat`.
#[derive(Serialize, Deserialize, Clone)]
struct ChatMessage {
    role: String,
    content: String,
}

/// Request payload for the Ollama `/api/chat` endpoint.
#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    stream: bool,
}

/// Response from the Ollama `/api/chat` endpoint.
#[derive(Deserialize)]
struct ChatResponse {
    message: ChatMessage,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProviderKind;

    #[test]
    fn test_classify_status_model_missing() {
        let err = classify_status(404, "model \"nope\" not found");
        assert!(matches!(err, ProviderError::Fatal(_)));
        assert!(err.to_string().contains("model not found"));
    }

    #[test]
    fn test_classify_status_server_error_transient() {
        assert!(classify_status(500, "").is_retryable());
        assert!(classify_status(503, "overloaded").is_retryable());
    }

    #[test]
    fn test_classify_status_other_fatal() {
        assert!(matches!(
            classify_status(400, "bad request"),
            ProviderError::Fatal(_)
        ));
    }

    #[test]
    fn test_provider_name_and_parallelism() {
        let provider = OllamaProvider::new(ProviderConfig::new(ProviderKind::Ollama)).unwrap();
        assert_eq!(provider.name(), "ollama");
        assert!(!provider.supports_parallel());
    }

    #[tokio::test]
    async fn test_transform_observes_pre_cancelled_token() {
        let provider = OllamaProvider::new(ProviderConfig::new(ProviderKind::Ollama)).unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = provider.transform("text", "system", &cancel).await;
        assert!(matches!(result, Err(ProviderError::Cancelled)));
    }
}
