//! Per-chunk processing pipeline: retry → provider → guard, with bounded
//! bisection retry on refusal.

use std::sync::Arc;

use futures::future::BoxFuture;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use folio_core::{
    defaults, Chunk, FallbackReason, JobConfig, ProviderError, SkippedChunk, TextProvider,
};
use folio_inference::RetryPolicy;

use crate::guard::{response_sample, OutputGuard, Verdict};
use crate::segmenter::Segmenter;

/// Outcome of processing one chunk.
#[derive(Debug, Clone)]
pub struct ProcessedChunk {
    /// Transformed text, or original text for soft-failed pieces.
    pub text: String,
    /// At most one fallback reason per chunk, for the circuit breaker.
    pub fallback: Option<FallbackReason>,
    /// One audit record per soft-failed piece (bisection can produce
    /// several for a single chunk).
    pub audit: Vec<SkippedChunk>,
}

/// Intermediate result for one (possibly bisected) piece of text.
struct Rewrite {
    text: String,
    fallback: Option<FallbackReason>,
    /// (reason, original piece, response sample) per soft-failed piece.
    pieces: Vec<(FallbackReason, String, String)>,
}

/// Drives a single chunk through retry, transform, and fidelity checks.
///
/// On a `Bisect` verdict the input is split at its best midpoint boundary
/// and each half is processed independently; sub-results concatenate in
/// order, so the chunk invariant (no loss, no reordering) holds even when
/// parts of it fall back to their original text. Recursion is bounded both
/// by the guard's minimum input size and by an explicit depth limit.
pub struct ChunkProcessor {
    provider: Arc<dyn TextProvider>,
    retry: RetryPolicy,
    guard: OutputGuard,
    system_prompt: String,
    bisect_max_depth: u32,
}

impl ChunkProcessor {
    /// Create a processor for the given provider and job configuration.
    pub fn new(provider: Arc<dyn TextProvider>, config: &JobConfig) -> Self {
        Self {
            provider,
            retry: RetryPolicy::default(),
            guard: OutputGuard::new(config.mode).with_bisect_min_chars(config.bisect_min_chars),
            system_prompt: config.system_prompt.clone(),
            bisect_max_depth: defaults::BISECT_MAX_DEPTH,
        }
    }

    /// Override the retry policy.
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Override the bisection depth bound.
    pub fn with_bisect_max_depth(mut self, depth: u32) -> Self {
        self.bisect_max_depth = depth;
        self
    }

    /// Process one chunk to a final result.
    ///
    /// Errors are provider failures that the retry policy did not absorb;
    /// guard rejections never error — they resolve to the original text.
    pub async fn process(
        &self,
        chunk: &Chunk,
        cancel: &CancellationToken,
    ) -> std::result::Result<ProcessedChunk, ProviderError> {
        let rewrite = self.rewrite(&chunk.text, 0, cancel).await?;

        let audit = rewrite
            .pieces
            .into_iter()
            .map(|(reason, original_text, response_sample)| SkippedChunk {
                chapter_id: chunk.chapter_id.clone(),
                chapter_index: chunk.chapter_index,
                chunk_index: chunk.index,
                reason,
                original_text,
                response_sample,
            })
            .collect();

        Ok(ProcessedChunk {
            text: rewrite.text,
            fallback: rewrite.fallback,
            audit,
        })
    }

    fn rewrite<'a>(
        &'a self,
        text: &'a str,
        depth: u32,
        cancel: &'a CancellationToken,
    ) -> BoxFuture<'a, std::result::Result<Rewrite, ProviderError>> {
        Box::pin(async move {
            let response = self
                .retry
                .run(cancel, |_| {
                    self.provider.transform(text, &self.system_prompt, cancel)
                })
                .await?;

            match self.guard.evaluate(text, &response) {
                Verdict::Accept(out) => Ok(Rewrite {
                    text: out,
                    fallback: None,
                    pieces: Vec::new(),
                }),
                Verdict::SoftFail(reason) => {
                    debug!(
                        fallback_reason = %reason,
                        chunk_len = text.len(),
                        "Response rejected, keeping original text"
                    );
                    Ok(Rewrite {
                        text: text.to_string(),
                        fallback: Some(reason),
                        pieces: vec![(reason, text.to_string(), response_sample(&response))],
                    })
                }
                Verdict::Bisect => {
                    if depth >= self.bisect_max_depth {
                        warn!(depth, "Bisection depth exhausted, keeping original text");
                        let reason = FallbackReason::Copyright;
                        return Ok(Rewrite {
                            text: text.to_string(),
                            fallback: Some(reason),
                            pieces: vec![(reason, text.to_string(), response_sample(&response))],
                        });
                    }

                    debug!(depth, chunk_len = text.len(), "Refusal on large input, bisecting");
                    let (left, right) = Segmenter::bisect(text);
                    let l = self.rewrite(left, depth + 1, cancel).await?;
                    let r = self.rewrite(right, depth + 1, cancel).await?;

                    let mut pieces = l.pieces;
                    pieces.extend(r.pieces);
                    Ok(Rewrite {
                        text: l.text + &r.text,
                        fallback: l.fallback.or(r.fallback),
                        pieces,
                    })
                }
            }
        })
    }
}
