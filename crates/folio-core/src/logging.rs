//! Structured logging field name constants for folio.
//!
//! All crates use these constants for consistent structured logging
//! fields, so log aggregation tools can query by standardized names
//! across every subsystem.
//!
//! ## Log Level Contract
//!
//! | Level | Usage |
//! |-------|-------|
//! | ERROR | Job-terminating failures |
//! | WARN  | Recoverable issue, fallback applied, retry scheduled |
//! | INFO  | Job lifecycle (phases, chapter saves, completion) |
//! | DEBUG | Decision points, guard verdicts, config choices |
//! | TRACE | Per-chunk iteration detail |

// ─── Identity fields ───────────────────────────────────────────────────────

/// Job UUID being processed.
pub const JOB_ID: &str = "job_id";

/// Chapter id being operated on.
pub const CHAPTER_ID: &str = "chapter_id";

/// Intra-chapter chunk index.
pub const CHUNK_INDEX: &str = "chunk_index";

/// Provider backend name.
pub const PROVIDER: &str = "provider";

/// Model name used for the transform.
pub const MODEL: &str = "model";

// ─── Measurement fields ────────────────────────────────────────────────────

/// Wall-clock duration in milliseconds.
pub const DURATION_MS: &str = "duration_ms";

/// Total chunks in the job manifest.
pub const CHUNK_COUNT: &str = "chunk_count";

/// Byte length of a chunk sent to a provider.
pub const CHUNK_LEN: &str = "chunk_len";

/// Byte length of a provider response.
pub const RESPONSE_LEN: &str = "response_len";

/// Retry attempt number.
pub const ATTEMPT: &str = "attempt";

// ─── Outcome fields ────────────────────────────────────────────────────────

/// Fallback reason applied to a chunk.
pub const FALLBACK_REASON: &str = "fallback_reason";

/// Cumulative fallback count for the job.
pub const FALLBACK_COUNT: &str = "fallback_count";

/// Error message when an operation fails.
pub const ERROR_MSG: &str = "error";
