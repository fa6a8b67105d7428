//! Centralized default constants for folio.
//!
//! **This module is the single source of truth** for all shared default
//! values. Crates reference these constants instead of defining their own
//! magic numbers. Organized by domain area.

// =============================================================================
// SEGMENTATION
// =============================================================================

/// Maximum bytes per chunk sent to a provider.
pub const CHUNK_SIZE: usize = 8_000;

/// Trailing window (bytes) searched for a natural boundary before the
/// target chunk end. Bounding the search keeps segmentation O(n).
pub const BOUNDARY_WINDOW: usize = 600;

// =============================================================================
// OUTPUT GUARD
// =============================================================================

/// Minimum response/input length ratio accepted in cleanup mode.
pub const CLEANUP_LENGTH_RATIO: f64 = 0.7;

/// Minimum response/input length ratio accepted in simplification mode.
/// Simplification is expected to shrink text, hence the looser bound.
pub const SIMPLIFY_LENGTH_RATIO: f64 = 0.3;

/// Minimum input size (chars) for bisection retry. Below this a refusal
/// is recorded as a copyright fallback instead of recursing further.
pub const BISECT_MIN_CHARS: usize = 2_000;

/// Maximum bisection recursion depth.
pub const BISECT_MAX_DEPTH: u32 = 8;

/// Inputs at or below this length (chars) may legitimately resolve to a
/// skip marker without counting as a fallback.
pub const TRIVIAL_INPUT_CHARS: usize = 300;

/// Sentinel tokens a provider is instructed to emit for unprocessable
/// input.
pub const SKIP_MARKERS: &[&str] = &["[[SKIP]]", "[[UNPROCESSABLE]]"];

/// Leading span of the response (chars) scanned for conversational
/// leakage.
pub const LEAKAGE_SCAN_CHARS: usize = 200;

/// Length (chars) of the provider-response sample kept in audit records.
pub const RESPONSE_SAMPLE_CHARS: usize = 200;

// =============================================================================
// JOB PROCESSING
// =============================================================================

/// Default parallel worker count.
pub const WORKER_COUNT: usize = 3;

/// Cumulative fallback count at which the circuit breaker aborts the job.
pub const FALLBACK_THRESHOLD: u32 = 10;

/// Default event bus broadcast channel capacity.
pub const EVENT_BUS_CAPACITY: usize = 256;

// =============================================================================
// PROVIDERS
// =============================================================================

/// Maximum provider call attempts (first try included).
pub const RETRY_MAX_ATTEMPTS: u32 = 3;

/// Base backoff delay in milliseconds; attempt N waits N × this.
pub const RETRY_BACKOFF_MS: u64 = 2_000;

/// Timeout for a single transform request in seconds.
pub const TRANSFORM_TIMEOUT_SECS: u64 = 120;

/// Default Ollama base URL.
pub const OLLAMA_URL: &str = "http://127.0.0.1:11434";

/// Default Ollama generation model.
pub const OLLAMA_MODEL: &str = "gpt-oss:20b";

/// Default OpenAI-compatible API endpoint.
pub const OPENAI_URL: &str = "https://api.openai.com/v1";

/// Default OpenAI generation model.
pub const OPENAI_MODEL: &str = "gpt-4o-mini";

/// Default Anthropic API endpoint.
pub const ANTHROPIC_URL: &str = "https://api.anthropic.com";

/// Default Anthropic generation model.
pub const ANTHROPIC_MODEL: &str = "claude-3-5-haiku-latest";

/// Maximum output tokens requested from the Anthropic messages API.
pub const ANTHROPIC_MAX_TOKENS: u32 = 8_192;
