//! Error types for the taxon engine.

use thiserror::Error;

/// Result type alias using taxon's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for taxonomy storage operations.
///
/// Every structural failure is detected synchronously inside its
/// transaction and rolls it back entirely; no partial subtree mutation is
/// ever committed. Retries are a caller policy.
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation failed (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Taxonomy code already exists
    #[error("Duplicate taxonomy code: {0}")]
    DuplicateCode(String),

    /// Slug already exists among alive siblings
    #[error("Duplicate slug: {0}")]
    DuplicateSlug(String),

    /// Attempted structural change under a non-alive, busy, or obsoleted parent
    #[error("Inactive parent: {0}")]
    InactiveParent(String),

    /// Attempted move/delete on a term (or descendant) with a pending operation
    #[error("Term busy: {0}")]
    TermBusy(String),

    /// Move destination is the source or one of its own descendants.
    /// Field names avoid `source`, which thiserror reserves for error
    /// chaining.
    #[error("Cyclic move: {from} -> {to}")]
    CyclicMove { from: String, to: String },

    /// Referenced taxonomy or term does not exist under default visibility
    #[error("Not found: {0}")]
    NotFound(String),

    /// An event-sink hook rejected the operation
    #[error("Vetoed: {0}")]
    Vetoed(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}
