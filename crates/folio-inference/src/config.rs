//! Provider selection and configuration.
//!
//! Providers are polymorphic behind [`TextProvider`]; this module owns the
//! only place where a provider kind is matched on. After
//! [`build_provider`] returns, callers hold an `Arc<dyn TextProvider>` and
//! never branch on backend identity again.

use std::sync::Arc;

use folio_core::{defaults, Error, ProviderError, Result, TextProvider};

use crate::anthropic::AnthropicProvider;
use crate::ollama::OllamaProvider;
use crate::openai::OpenAiProvider;

/// Supported provider backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    /// Local Ollama model server.
    Ollama,
    /// OpenAI-compatible hosted API.
    OpenAi,
    /// Anthropic messages API.
    Anthropic,
}

impl ProviderKind {
    /// Parse kind from string (case-insensitive, accepts common aliases).
    pub fn from_str_loose(s: &str) -> Option<Self> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "ollama" | "local" => Some(Self::Ollama),
            "openai" | "openai_compatible" | "oai" => Some(Self::OpenAi),
            "anthropic" | "claude" => Some(Self::Anthropic),
            _ => None,
        }
    }

    /// Whether this backend requires an API key.
    pub fn requires_api_key(&self) -> bool {
        matches!(self, Self::OpenAi | Self::Anthropic)
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ollama => write!(f, "ollama"),
            Self::OpenAi => write!(f, "openai"),
            Self::Anthropic => write!(f, "anthropic"),
        }
    }
}

/// Configuration for a provider backend.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub kind: ProviderKind,
    /// Base URL for the API endpoint.
    pub base_url: String,
    /// API key (not used by local backends).
    pub api_key: Option<String>,
    /// Model to use for transforms.
    pub model: String,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl ProviderConfig {
    /// Create a config with the per-kind defaults.
    pub fn new(kind: ProviderKind) -> Self {
        let (base_url, model) = match kind {
            ProviderKind::Ollama => (defaults::OLLAMA_URL, defaults::OLLAMA_MODEL),
            ProviderKind::OpenAi => (defaults::OPENAI_URL, defaults::OPENAI_MODEL),
            ProviderKind::Anthropic => (defaults::ANTHROPIC_URL, defaults::ANTHROPIC_MODEL),
        };
        Self {
            kind,
            base_url: base_url.to_string(),
            api_key: None,
            model: model.to_string(),
            timeout_secs: defaults::TRANSFORM_TIMEOUT_SECS,
        }
    }

    /// Create from environment variables for the given kind.
    ///
    /// | Kind | Variables |
    /// |------|-----------|
    /// | ollama | `OLLAMA_BASE`, `OLLAMA_MODEL` |
    /// | openai | `OPENAI_BASE_URL`, `OPENAI_API_KEY`, `OPENAI_MODEL` |
    /// | anthropic | `ANTHROPIC_BASE_URL`, `ANTHROPIC_API_KEY`, `ANTHROPIC_MODEL` |
    ///
    /// `FOLIO_TRANSFORM_TIMEOUT_SECS` overrides the timeout for any kind.
    pub fn from_env(kind: ProviderKind) -> Self {
        let mut config = Self::new(kind);

        let (url_var, key_var, model_var) = match kind {
            ProviderKind::Ollama => ("OLLAMA_BASE", "", "OLLAMA_MODEL"),
            ProviderKind::OpenAi => ("OPENAI_BASE_URL", "OPENAI_API_KEY", "OPENAI_MODEL"),
            ProviderKind::Anthropic => (
                "ANTHROPIC_BASE_URL",
                "ANTHROPIC_API_KEY",
                "ANTHROPIC_MODEL",
            ),
        };

        if let Ok(val) = std::env::var(url_var) {
            config.base_url = val;
        }
        if !key_var.is_empty() {
            config.api_key = std::env::var(key_var).ok();
        }
        if let Ok(val) = std::env::var(model_var) {
            config.model = val;
        }
        if let Ok(val) = std::env::var("FOLIO_TRANSFORM_TIMEOUT_SECS") {
            if let Ok(secs) = val.parse::<u64>() {
                config.timeout_secs = secs;
            }
        }

        config
    }

    /// Set the base URL.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Set the API key.
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Set the model.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Set the request timeout in seconds.
    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    /// Validate the configuration before any chunk work starts.
    ///
    /// Missing credentials or model are `Configuration` failures so the
    /// job aborts up front instead of burning the manifest on doomed
    /// calls.
    pub fn validate(&self) -> std::result::Result<(), ProviderError> {
        if self.model.trim().is_empty() {
            return Err(ProviderError::Configuration(format!(
                "no model configured for {} backend",
                self.kind
            )));
        }
        if self.base_url.trim().is_empty() {
            return Err(ProviderError::Configuration(format!(
                "no base URL configured for {} backend",
                self.kind
            )));
        }
        if self.kind.requires_api_key() && self.api_key.as_deref().unwrap_or("").trim().is_empty() {
            return Err(ProviderError::Configuration(format!(
                "missing API key for {} backend",
                self.kind
            )));
        }
        Ok(())
    }
}

/// Build a provider from its configuration.
///
/// Validates first, then dispatches once; the returned trait object is the
/// only provider handle the engine ever sees.
pub fn build_provider(config: &ProviderConfig) -> Result<Arc<dyn TextProvider>> {
    config.validate().map_err(Error::Provider)?;

    let provider: Arc<dyn TextProvider> = match config.kind {
        ProviderKind::Ollama => Arc::new(OllamaProvider::new(config.clone())?),
        ProviderKind::OpenAi => Arc::new(OpenAiProvider::new(config.clone())?),
        ProviderKind::Anthropic => Arc::new(AnthropicProvider::new(config.clone())?),
    };
    Ok(provider)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_kind_from_str_loose() {
        assert_eq!(
            ProviderKind::from_str_loose("ollama"),
            Some(ProviderKind::Ollama)
        );
        assert_eq!(
            ProviderKind::from_str_loose("LOCAL"),
            Some(ProviderKind::Ollama)
        );
        assert_eq!(
            ProviderKind::from_str_loose("openai"),
            Some(ProviderKind::OpenAi)
        );
        assert_eq!(
            ProviderKind::from_str_loose("openai-compatible"),
            Some(ProviderKind::OpenAi)
        );
        assert_eq!(
            ProviderKind::from_str_loose("claude"),
            Some(ProviderKind::Anthropic)
        );
        assert_eq!(ProviderKind::from_str_loose("invalid"), None);
        assert_eq!(ProviderKind::from_str_loose(""), None);
    }

    #[test]
    fn test_provider_kind_display() {
        assert_eq!(ProviderKind::Ollama.to_string(), "ollama");
        assert_eq!(ProviderKind::OpenAi.to_string(), "openai");
        assert_eq!(ProviderKind::Anthropic.to_string(), "anthropic");
    }

    #[test]
    fn test_config_defaults_per_kind() {
        let config = ProviderConfig::new(ProviderKind::Ollama);
        assert_eq!(config.base_url, "http://127.0.0.1:11434");
        assert!(config.api_key.is_none());

        let config = ProviderConfig::new(ProviderKind::Anthropic);
        assert_eq!(config.base_url, "https://api.anthropic.com");
    }

    #[test]
    fn test_config_builder() {
        let config = ProviderConfig::new(ProviderKind::OpenAi)
            .with_base_url("http://localhost:8080/v1")
            .with_api_key("sk-test")
            .with_model("test-model")
            .with_timeout_secs(30);

        assert_eq!(config.base_url, "http://localhost:8080/v1");
        assert_eq!(config.api_key.as_deref(), Some("sk-test"));
        assert_eq!(config.model, "test-model");
        assert_eq!(config.timeout_secs, 30);
    }

    #[test]
    fn test_validate_missing_model() {
        let config = ProviderConfig::new(ProviderKind::Ollama).with_model("");
        let err = config.validate().unwrap_err();
        assert!(matches!(err, ProviderError::Configuration(_)));
        assert!(err.to_string().contains("no model"));
    }

    #[test]
    fn test_validate_missing_api_key_for_hosted() {
        let config = ProviderConfig::new(ProviderKind::OpenAi);
        let err = config.validate().unwrap_err();
        assert!(matches!(err, ProviderError::Configuration(_)));
        assert!(err.to_string().contains("missing API key"));
    }

    #[test]
    fn test_validate_local_needs_no_key() {
        let config = ProviderConfig::new(ProviderKind::Ollama);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_build_provider_rejects_invalid_config() {
        let config = ProviderConfig::new(ProviderKind::Anthropic);
        let err = match build_provider(&config) {
            Ok(_) => panic!("expected build_provider to reject invalid config"),
            Err(e) => e,
        };
        assert!(matches!(
            err,
            Error::Provider(ProviderError::Configuration(_))
        ));
    }

    #[test]
    fn test_build_provider_dispatch() {
        let provider =
            build_provider(&ProviderConfig::new(ProviderKind::Ollama)).expect("build ollama");
        assert_eq!(provider.name(), "ollama");
        assert!(!provider.supports_parallel());

        let provider = build_provider(
            &ProviderConfig::new(ProviderKind::OpenAi).with_api_key("sk-test"),
        )
        .expect("build openai");
        assert_eq!(provider.name(), "openai");
        assert!(provider.supports_parallel());
    }
}
