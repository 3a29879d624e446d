//! # taxon-db
//!
//! PostgreSQL storage engine for taxonomy forests.
//!
//! This crate provides:
//! - Connection pool management
//! - Tree store repositories for taxonomies and terms
//! - The busy-count lock manager coordinating asynchronous collaborators
//! - The copy-and-obsolete move/rename/delete engine
//! - Read-only ancestor/descendant queries
//!
//! ## Example
//!
//! ```rust,no_run
//! use taxon_db::{Database, TaxonomyRepository, TermRepository};
//! use taxon_core::{CreateTaxonomyRequest, CreateTermRequest, TermParentRef};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let db = Database::connect("postgres://localhost/taxon").await?;
//!
//!     db.taxonomies.create_taxonomy(CreateTaxonomyRequest {
//!         code: "countries".to_string(),
//!         url: None,
//!         extra_data: None,
//!     }).await?;
//!
//!     let term = db.terms.create_term(CreateTermRequest::new(
//!         TermParentRef::taxonomy("countries"),
//!         "Europe",
//!     )).await?;
//!
//!     println!("Created term at {}", term.path);
//!     Ok(())
//! }
//! ```

pub mod locks;
pub mod moves;
pub mod pool;
pub mod queries;
pub mod taxonomies;
pub mod terms;

// Test fixtures for integration tests
// Note: Always compiled so integration tests (in tests/) can use DEFAULT_TEST_DATABASE_URL
pub mod test_fixtures;

use std::sync::Arc;

use sqlx::PgPool;

// Re-export core types
pub use taxon_core::*;

pub use locks::PgLockManager;
pub use moves::{MoveEngine, PgMoveEngine};
pub use pool::{create_pool, create_pool_with_config, PoolConfig};
pub use queries::{DescendantsOptions, PgQueryEngine, TermVisibility};
pub use taxonomies::{PgTaxonomyRepository, TaxonomyRepository};
pub use terms::{PgTermRepository, TermRepository};

/// Map a hook error into the veto kind, preserving explicit vetoes.
pub(crate) fn veto_err(e: taxon_core::Error) -> taxon_core::Error {
    match e {
        taxon_core::Error::Vetoed(_) => e,
        other => taxon_core::Error::Vetoed(other.to_string()),
    }
}

/// True for PostgreSQL unique-constraint violations (SQLSTATE 23505).
pub(crate) fn is_unique_violation(e: &sqlx::Error) -> bool {
    matches!(e, sqlx::Error::Database(db) if db.code().as_deref() == Some("23505"))
}

/// Combined database context with all engine components.
pub struct Database {
    /// The underlying connection pool.
    pub pool: PgPool,
    /// Taxonomy namespace repository.
    pub taxonomies: PgTaxonomyRepository,
    /// Term repository for creation and reads.
    pub terms: PgTermRepository,
    /// Busy-count lock manager.
    pub locks: PgLockManager,
    /// Copy-and-obsolete move/rename/delete engine.
    pub mover: PgMoveEngine,
    /// Read-only query engine.
    pub queries: PgQueryEngine,
    codec: Arc<dyn PathCodec>,
    sink: Arc<dyn TaxonomyEventSink>,
}

impl Database {
    /// Create a new Database from a connection pool with the portable
    /// escaped-path codec and no event sink.
    pub fn new(pool: PgPool) -> Self {
        Self::assemble(pool, Arc::new(EscapedPathCodec), Arc::new(NoopEventSink))
    }

    fn assemble(pool: PgPool, codec: Arc<dyn PathCodec>, sink: Arc<dyn TaxonomyEventSink>) -> Self {
        let terms = PgTermRepository::new(pool.clone(), codec.clone(), sink.clone());
        let locks = PgLockManager::new(pool.clone());
        Self {
            taxonomies: PgTaxonomyRepository::new(pool.clone(), sink.clone()),
            mover: PgMoveEngine::new(
                pool.clone(),
                codec.clone(),
                terms.clone(),
                locks.clone(),
                sink.clone(),
            ),
            queries: PgQueryEngine::new(pool.clone(), codec.clone(), terms.clone()),
            terms,
            locks,
            codec,
            sink,
            pool,
        }
    }

    /// Configure an event sink; mutations fire its before/after hooks.
    pub fn with_event_sink(self, sink: Arc<dyn TaxonomyEventSink>) -> Self {
        Self::assemble(self.pool, self.codec, sink)
    }

    /// Use the PostgreSQL `ltree` codec instead of the portable escaped
    /// encoding. Requires the `ltree` extension and an `ltree`-typed path
    /// column.
    pub fn with_ltree_paths(self) -> Self {
        Self::assemble(self.pool, Arc::new(LtreePathCodec), self.sink)
    }

    /// Create a new Database by connecting to the given URL.
    pub async fn connect(url: &str) -> Result<Self> {
        let pool = create_pool(url).await?;
        Ok(Self::new(pool))
    }

    /// Create with custom pool configuration.
    pub async fn connect_with_config(url: &str, config: PoolConfig) -> Result<Self> {
        let pool = create_pool_with_config(url, config).await?;
        Ok(Self::new(pool))
    }

    /// Run pending migrations.
    #[cfg(feature = "migrations")]
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("../../migrations")
            .run(&self.pool)
            .await
            .map_err(|e| Error::Database(sqlx::Error::Migrate(Box::new(e))))?;
        Ok(())
    }

    /// Get the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

impl Clone for Database {
    fn clone(&self) -> Self {
        Self::assemble(self.pool.clone(), self.codec.clone(), self.sink.clone())
    }
}
