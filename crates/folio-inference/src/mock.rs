//! Mock text provider for deterministic testing.
//!
//! Scripted responses, failures, and per-call latency let tests drive the
//! engine through every guard and scheduling path without a network.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use folio_inference::mock::MockProvider;
//!
//! let provider = MockProvider::new()
//!     .with_response("raw text", "clean text")
//!     .with_failure(ProviderError::Transient("blip".into()));
//! ```

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use folio_core::{ProviderError, TextProvider};

type TransformFn = Arc<dyn Fn(&str) -> String + Send + Sync>;
type LatencyFn = Arc<dyn Fn(&str, usize) -> u64 + Send + Sync>;

/// Scripted mock provider.
///
/// Default behavior is the identity transform (response == input), which
/// passes every output-fidelity check. Cloning shares the call log and
/// scripted failure queue.
#[derive(Clone)]
pub struct MockProvider {
    config: Arc<MockConfig>,
    calls: Arc<Mutex<Vec<String>>>,
    scripted_failures: Arc<Mutex<VecDeque<ProviderError>>>,
}

#[derive(Clone, Default)]
struct MockConfig {
    responses: HashMap<String, String>,
    transform: Option<TransformFn>,
    latency: Option<LatencyFn>,
    failure_rate: f64,
    serial_only: bool,
}

impl MockProvider {
    /// Create a mock with default (identity) behavior.
    pub fn new() -> Self {
        Self {
            config: Arc::new(MockConfig::default()),
            calls: Arc::new(Mutex::new(Vec::new())),
            scripted_failures: Arc::new(Mutex::new(VecDeque::new())),
        }
    }

    /// Map an exact input to a fixed response.
    pub fn with_response(mut self, input: impl Into<String>, output: impl Into<String>) -> Self {
        Arc::make_mut(&mut self.config)
            .responses
            .insert(input.into(), output.into());
        self
    }

    /// Set the default transform applied to unmapped inputs.
    pub fn with_transform<F>(mut self, f: F) -> Self
    where
        F: Fn(&str) -> String + Send + Sync + 'static,
    {
        Arc::make_mut(&mut self.config).transform = Some(Arc::new(f));
        self
    }

    /// Queue a failure returned (once) before any response logic runs.
    /// Multiple queued failures are consumed in order.
    pub fn with_failure(self, err: ProviderError) -> Self {
        self.scripted_failures.lock().unwrap().push_back(err);
        self
    }

    /// Simulate a fixed latency for every call.
    pub fn with_latency_ms(mut self, ms: u64) -> Self {
        Arc::make_mut(&mut self.config).latency = Some(Arc::new(move |_, _| ms));
        self
    }

    /// Simulate latency computed from (input, zero-based call index).
    /// Useful for forcing out-of-order completion across workers.
    pub fn with_latency_fn<F>(mut self, f: F) -> Self
    where
        F: Fn(&str, usize) -> u64 + Send + Sync + 'static,
    {
        Arc::make_mut(&mut self.config).latency = Some(Arc::new(f));
        self
    }

    /// Set a random failure rate (0.0 - 1.0) producing Transient errors.
    pub fn with_failure_rate(mut self, rate: f64) -> Self {
        Arc::make_mut(&mut self.config).failure_rate = rate.clamp(0.0, 1.0);
        self
    }

    /// Report `supports_parallel() == false`, routing the engine onto the
    /// sequential path.
    pub fn serial_only(mut self) -> Self {
        Arc::make_mut(&mut self.config).serial_only = true;
        self
    }

    /// All inputs seen so far, in call order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    /// Number of transform calls made.
    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    fn should_fail(&self) -> bool {
        if self.config.failure_rate > 0.0 {
            use rand::Rng;
            rand::thread_rng().gen::<f64>() < self.config.failure_rate
        } else {
            false
        }
    }
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TextProvider for MockProvider {
    async fn transform(
        &self,
        text: &str,
        _system_prompt: &str,
        cancel: &CancellationToken,
    ) -> std::result::Result<String, ProviderError> {
        if cancel.is_cancelled() {
            return Err(ProviderError::Cancelled);
        }

        let call_index = {
            let mut calls = self.calls.lock().unwrap();
            calls.push(text.to_string());
            calls.len() - 1
        };

        if let Some(err) = self.scripted_failures.lock().unwrap().pop_front() {
            return Err(err);
        }

        if self.should_fail() {
            return Err(ProviderError::Transient("simulated failure".to_string()));
        }

        if let Some(ref latency) = self.config.latency {
            let ms = latency(text, call_index);
            if ms > 0 {
                tokio::select! {
                    _ = cancel.cancelled() => return Err(ProviderError::Cancelled),
                    _ = tokio::time::sleep(Duration::from_millis(ms)) => {}
                }
            }
        }

        if cancel.is_cancelled() {
            return Err(ProviderError::Cancelled);
        }

        if let Some(response) = self.config.responses.get(text) {
            return Ok(response.clone());
        }
        if let Some(ref transform) = self.config.transform {
            return Ok(transform(text));
        }
        Ok(text.to_string())
    }

    fn name(&self) -> &str {
        "mock"
    }

    fn supports_parallel(&self) -> bool {
        !self.config.serial_only
    }
}
