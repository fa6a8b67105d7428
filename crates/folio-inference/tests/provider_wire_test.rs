//! Wire-level tests for the provider backends against a mock HTTP server.
//!
//! Verifies request shape, response extraction, and error classification
//! for each backend without a live inference service.

use folio_core::{CancellationToken, ProviderError, TextProvider};
use folio_inference::{AnthropicProvider, OllamaProvider, OpenAiProvider, ProviderConfig, ProviderKind};
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn ollama_config(uri: &str) -> ProviderConfig {
    ProviderConfig::new(ProviderKind::Ollama)
        .with_base_url(uri)
        .with_model("test-model")
        .with_timeout_secs(5)
}

fn openai_config(uri: &str) -> ProviderConfig {
    ProviderConfig::new(ProviderKind::OpenAi)
        .with_base_url(uri)
        .with_api_key("test-key")
        .with_model("test-model")
        .with_timeout_secs(5)
}

fn anthropic_config(uri: &str) -> ProviderConfig {
    ProviderConfig::new(ProviderKind::Anthropic)
        .with_base_url(uri)
        .with_api_key("test-key")
        .with_model("test-model")
        .with_timeout_secs(5)
}

#[tokio::test]
async fn test_ollama_transform_success() {
    let server = MockServer::start().await;

    let response = serde_json::json!({
        "message": {"role": "assistant", "content": "Cleaned text"}
    });

    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .and(body_partial_json(serde_json::json!({
            "model": "test-model",
            "stream": false
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(&response))
        .expect(1)
        .mount(&server)
        .await;

    let provider = OllamaProvider::new(ollama_config(&server.uri())).unwrap();
    let cancel = CancellationToken::new();

    let result = provider
        .transform("dirty text", "clean this up", &cancel)
        .await
        .unwrap();
    assert_eq!(result, "Cleaned text");
}

#[tokio::test]
async fn test_ollama_missing_model_is_fatal() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(ResponseTemplate::new(404).set_body_string("model \"nope\" not found"))
        .mount(&server)
        .await;

    let provider = OllamaProvider::new(ollama_config(&server.uri())).unwrap();
    let cancel = CancellationToken::new();

    let err = provider.transform("text", "", &cancel).await.unwrap_err();
    assert!(matches!(err, ProviderError::Fatal(_)), "got {:?}", err);
}

#[tokio::test]
async fn test_openai_transform_success_with_auth_header() {
    let server = MockServer::start().await;

    let response = serde_json::json!({
        "id": "chatcmpl-123",
        "choices": [{
            "index": 0,
            "message": {"role": "assistant", "content": "Cleaned text"},
            "finish_reason": "stop"
        }]
    });

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("Authorization", "Bearer test-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&response))
        .expect(1)
        .mount(&server)
        .await;

    let provider = OpenAiProvider::new(openai_config(&server.uri())).unwrap();
    let cancel = CancellationToken::new();

    let result = provider.transform("dirty", "prompt", &cancel).await.unwrap();
    assert_eq!(result, "Cleaned text");
}

#[tokio::test]
async fn test_openai_invalid_key_is_fatal() {
    let server = MockServer::start().await;

    let body = serde_json::json!({
        "error": {
            "message": "Incorrect API key provided",
            "type": "invalid_request_error",
            "code": "invalid_api_key"
        }
    });

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(401).set_body_json(&body))
        .mount(&server)
        .await;

    let provider = OpenAiProvider::new(openai_config(&server.uri())).unwrap();
    let cancel = CancellationToken::new();

    let err = provider.transform("text", "", &cancel).await.unwrap_err();
    assert!(matches!(err, ProviderError::Fatal(_)), "got {:?}", err);
    assert!(err.to_string().contains("authentication failed"));
}

#[tokio::test]
async fn test_openai_quota_exhausted_is_fatal() {
    let server = MockServer::start().await;

    let body = serde_json::json!({
        "error": {
            "message": "You exceeded your current quota",
            "type": "insufficient_quota",
            "code": "insufficient_quota"
        }
    });

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(429).set_body_json(&body))
        .mount(&server)
        .await;

    let provider = OpenAiProvider::new(openai_config(&server.uri())).unwrap();
    let cancel = CancellationToken::new();

    let err = provider.transform("text", "", &cancel).await.unwrap_err();
    assert!(matches!(err, ProviderError::Fatal(_)), "got {:?}", err);
}

#[tokio::test]
async fn test_openai_rate_limit_is_transient() {
    let server = MockServer::start().await;

    let body = serde_json::json!({
        "error": {
            "message": "Rate limit reached",
            "type": "rate_limit_exceeded"
        }
    });

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(429).set_body_json(&body))
        .mount(&server)
        .await;

    let provider = OpenAiProvider::new(openai_config(&server.uri())).unwrap();
    let cancel = CancellationToken::new();

    let err = provider.transform("text", "", &cancel).await.unwrap_err();
    assert!(err.is_retryable(), "got {:?}", err);
}

#[tokio::test]
async fn test_anthropic_transform_success_with_headers() {
    let server = MockServer::start().await;

    let response = serde_json::json!({
        "id": "msg_123",
        "content": [{"type": "text", "text": "Cleaned text"}],
        "stop_reason": "end_turn"
    });

    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .and(header("x-api-key", "test-key"))
        .and(header("anthropic-version", "2023-06-01"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&response))
        .expect(1)
        .mount(&server)
        .await;

    let provider = AnthropicProvider::new(anthropic_config(&server.uri())).unwrap();
    let cancel = CancellationToken::new();

    let result = provider.transform("dirty", "prompt", &cancel).await.unwrap();
    assert_eq!(result, "Cleaned text");
}

#[tokio::test]
async fn test_anthropic_overloaded_is_transient() {
    let server = MockServer::start().await;

    let body = serde_json::json!({
        "error": {"type": "overloaded_error", "message": "Overloaded"}
    });

    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .respond_with(ResponseTemplate::new(529).set_body_json(&body))
        .mount(&server)
        .await;

    let provider = AnthropicProvider::new(anthropic_config(&server.uri())).unwrap();
    let cancel = CancellationToken::new();

    let err = provider.transform("text", "", &cancel).await.unwrap_err();
    assert!(err.is_retryable(), "got {:?}", err);
}

#[tokio::test]
async fn test_connection_refused_is_transient() {
    // Nothing is listening on this port.
    let config = openai_config("http://127.0.0.1:9");
    let provider = OpenAiProvider::new(config).unwrap();
    let cancel = CancellationToken::new();

    let err = provider.transform("text", "", &cancel).await.unwrap_err();
    assert!(err.is_retryable(), "got {:?}", err);
}

#[tokio::test]
async fn test_cancellation_aborts_in_flight_call() {
    let server = MockServer::start().await;

    // Response delayed well past the cancellation point.
    let response = serde_json::json!({
        "message": {"role": "assistant", "content": "too late"}
    });
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(&response)
                .set_delay(std::time::Duration::from_secs(30)),
        )
        .mount(&server)
        .await;

    let provider = OllamaProvider::new(ollama_config(&server.uri())).unwrap();
    let cancel = CancellationToken::new();

    let token = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        token.cancel();
    });

    let start = std::time::Instant::now();
    let err = provider.transform("text", "", &cancel).await.unwrap_err();
    assert!(matches!(err, ProviderError::Cancelled));
    assert!(
        start.elapsed() < std::time::Duration::from_secs(5),
        "cancellation must not wait for the response"
    );
}
