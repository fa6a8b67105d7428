//! # folio-inference
//!
//! Text-generation provider backends for folio.
//!
//! This crate provides:
//! - Pluggable provider implementations behind the `TextProvider` trait:
//!   Ollama (local), OpenAI-compatible and Anthropic (hosted)
//! - Provider configuration, validation, and the trait-object factory
//! - The bounded retry policy wrapping every provider call
//!
//! # Feature Flags
//!
//! - `mock`: Enable the scripted mock provider outside this crate's tests

pub mod anthropic;
pub mod config;
pub mod ollama;
pub mod openai;
pub mod retry;

#[cfg(any(test, feature = "mock"))]
pub mod mock;

pub use anthropic::AnthropicProvider;
pub use config::{build_provider, ProviderConfig, ProviderKind};
pub use ollama::OllamaProvider;
pub use openai::OpenAiProvider;
pub use retry::RetryPolicy;

#[cfg(any(test, feature = "mock"))]
pub use mock::MockProvider;
