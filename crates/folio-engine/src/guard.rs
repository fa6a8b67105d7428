//! Output fidelity checks for provider responses.
//!
//! The upstream transformer may refuse, summarize, or chat instead of
//! transforming. Every response is checked against its input before it can
//! replace original text; the engine always has "keep the original chunk"
//! as the safe outcome, so no content is ever lost to a misbehaving model.

use once_cell::sync::Lazy;
use regex::Regex;

use folio_core::{defaults, FallbackReason, RewriteMode};

/// Verdict for one response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// Response passed all checks; use this text.
    Accept(String),
    /// Response rejected; keep the original chunk text.
    SoftFail(FallbackReason),
    /// Refusal on a large input; split the input and retry each half.
    Bisect,
}

/// Assistant-style openers that indicate the model chatted instead of
/// transforming. Matched against the leading span of the response only.
static LEAKAGE_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(?i)^(sure|certainly|of course)[,!.]",
        r"(?i)here (is|are) (the|your|a|an)",
        r"(?i)here's (the|your|a|an)",
        r"(?i)i('d| would) be happy to",
        r"(?i)could you (please )?(provide|clarify|share|confirm)",
        r"(?i)^as an ai",
        r"(?i)i can(not|'t) (help|assist) with",
        r"(?i)let me know if",
        r"(?i)is there anything else",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("invalid leakage pattern"))
    .collect()
});

/// Refusal vocabulary that marks a short response as a rights-based
/// refusal rather than plain truncation.
static REFUSAL_VOCAB: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)copyright|cannot reproduce|can't reproduce|unable to reproduce|lengthy passage|intellectual property",
    )
    .expect("invalid refusal pattern")
});

/// Inspects one transformation response against its input.
#[derive(Debug, Clone)]
pub struct OutputGuard {
    mode: RewriteMode,
    bisect_min_chars: usize,
    trivial_input_chars: usize,
}

impl OutputGuard {
    /// Create a guard for the given rewrite mode.
    pub fn new(mode: RewriteMode) -> Self {
        Self {
            mode,
            bisect_min_chars: defaults::BISECT_MIN_CHARS,
            trivial_input_chars: defaults::TRIVIAL_INPUT_CHARS,
        }
    }

    /// Set the minimum input size (chars) for bisection retry.
    pub fn with_bisect_min_chars(mut self, min: usize) -> Self {
        self.bisect_min_chars = min;
        self
    }

    /// Set the input size (chars) at or below which a skip marker is a
    /// legitimate skip.
    pub fn with_trivial_input_chars(mut self, max: usize) -> Self {
        self.trivial_input_chars = max;
        self
    }

    /// Classify `response` for the chunk `original`.
    pub fn evaluate(&self, original: &str, response: &str) -> Verdict {
        let trimmed = response.trim();

        // Skip marker: exactly the sentinel means the provider declared
        // the input unprocessable. Trivial inputs (page numbers, headings)
        // legitimately resolve to nothing; anything larger is a loss.
        if defaults::SKIP_MARKERS.contains(&trimmed) {
            return if original.chars().count() > self.trivial_input_chars {
                Verdict::SoftFail(FallbackReason::ContentSkip)
            } else {
                Verdict::Accept(String::new())
            };
        }
        if defaults::SKIP_MARKERS.iter().any(|m| trimmed.contains(m)) {
            return Verdict::SoftFail(FallbackReason::MarkerMismatch);
        }

        // Conversational leakage in the response head.
        let head: String = trimmed
            .chars()
            .take(defaults::LEAKAGE_SCAN_CHARS)
            .collect();
        if LEAKAGE_PATTERNS.iter().any(|p| p.is_match(&head)) {
            return Verdict::SoftFail(FallbackReason::ContentSkip);
        }

        // Length ratio against the mode threshold.
        let orig_chars = original.chars().count();
        let resp_chars = response.chars().count();
        if (resp_chars as f64) < (orig_chars as f64) * self.mode.length_ratio() {
            if REFUSAL_VOCAB.is_match(response) {
                if orig_chars >= self.bisect_min_chars {
                    return Verdict::Bisect;
                }
                // Too small to shrink further; keep the original.
                return Verdict::SoftFail(FallbackReason::Copyright);
            }
            return Verdict::SoftFail(FallbackReason::Truncated);
        }

        Verdict::Accept(response.to_string())
    }
}

/// Leading sample of a provider response for audit records.
pub fn response_sample(response: &str) -> String {
    response
        .chars()
        .take(defaults::RESPONSE_SAMPLE_CHARS)
        .collect()
}
