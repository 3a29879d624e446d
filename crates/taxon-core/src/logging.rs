//! Structured logging field name constants.
//!
//! All crates use these constants for consistent structured logging fields,
//! so log aggregation tools can query by standardized names across the
//! engine.
//!
//! ## Log Level Contract
//!
//! | Level | Usage |
//! |-------|-------|
//! | ERROR | Degraded service, requires operator attention |
//! | WARN  | Recoverable issue, automatic fallback applied |
//! | INFO  | Lifecycle events, committed structural mutations |
//! | DEBUG | Decision points, per-operation summaries |
//! | TRACE | Per-row iteration (clone steps, query hits) |

// ─── Identity fields ───────────────────────────────────────────────────────

/// Subsystem originating the log event. Values: "db".
pub const SUBSYSTEM: &str = "subsystem";

/// Component within the subsystem.
/// Examples: "pool", "taxonomies", "terms", "locks", "moves", "queries"
pub const COMPONENT: &str = "component";

/// Logical operation name.
/// Examples: "create_term", "move_term", "mark_busy", "descendants"
pub const OPERATION: &str = "op";

// ─── Entity fields ─────────────────────────────────────────────────────────

/// Taxonomy code being operated on.
pub const TAXONOMY_CODE: &str = "taxonomy_code";

/// Term UUID being operated on.
pub const TERM_ID: &str = "term_id";

/// Logical term path being operated on.
pub const TERM_PATH: &str = "term_path";

/// Target path of a move/rename.
pub const TARGET_PATH: &str = "target_path";

// ─── Measurement fields ────────────────────────────────────────────────────

/// Wall-clock duration in milliseconds.
pub const DURATION_MS: &str = "duration_ms";

/// Number of rows returned by a query.
pub const RESULT_COUNT: &str = "result_count";

/// Number of terms touched by a structural operation (root + descendants).
pub const TOUCHED_COUNT: &str = "touched_count";

/// Number of rows physically purged by an unmark.
pub const PURGED_COUNT: &str = "purged_count";

// ─── Database fields ───────────────────────────────────────────────────────

/// Number of active connections in the pool.
pub const POOL_SIZE: &str = "pool_size";

/// Number of idle connections in the pool.
pub const POOL_IDLE: &str = "pool_idle";

// ─── Outcome fields ────────────────────────────────────────────────────────

/// Boolean success/failure indicator.
pub const SUCCESS: &str = "success";

/// Error message when an operation fails.
pub const ERROR_MSG: &str = "error";
