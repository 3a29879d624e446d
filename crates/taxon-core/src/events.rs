//! Typed, injectable event sink for taxonomy mutations.
//!
//! External collaborators (search reindexing, reference validation, ...)
//! observe structural changes through an explicit [`TaxonomyEventSink`]
//! configured on the engine, instead of a global signal dispatcher. Every
//! hook has a defaulted no-op implementation, so sinks implement only what
//! they care about.
//!
//! A `before_*` hook returning `Err` vetoes the operation: the engine rolls
//! back (including restoring any busy marks it took) and surfaces
//! `Error::Vetoed`. Taxonomy and term create/update/delete hooks run inside
//! the operation's transaction, so an `Err` from their `after_*`
//! counterparts aborts the write too. The structural `after_term_moved` and
//! `after_term_deleted` hooks fire only after the busy locks have released;
//! an error from them propagates to the caller but no longer undoes the
//! mutation.
//!
//! Hooks may kick off asynchronous external work; the busy-count protocol
//! exists specifically to make that safe without holding a database
//! transaction open. The engine never awaits that external work itself.

use async_trait::async_trait;
use serde_json::Value;
use uuid::Uuid;

use crate::error::Result;
use crate::models::{Taxonomy, TaxonomyTerm};

/// Before/after hooks for taxonomy and term mutations.
#[async_trait]
pub trait TaxonomyEventSink: Send + Sync {
    async fn before_taxonomy_created(&self, code: &str, extra_data: Option<&Value>) -> Result<()> {
        let _ = (code, extra_data);
        Ok(())
    }

    async fn after_taxonomy_created(&self, taxonomy: &Taxonomy) -> Result<()> {
        let _ = taxonomy;
        Ok(())
    }

    async fn before_taxonomy_updated(&self, taxonomy: &Taxonomy) -> Result<()> {
        let _ = taxonomy;
        Ok(())
    }

    async fn after_taxonomy_updated(&self, taxonomy: &Taxonomy) -> Result<()> {
        let _ = taxonomy;
        Ok(())
    }

    async fn before_taxonomy_deleted(&self, taxonomy: &Taxonomy) -> Result<()> {
        let _ = taxonomy;
        Ok(())
    }

    async fn after_taxonomy_deleted(&self, taxonomy: &Taxonomy) -> Result<()> {
        let _ = taxonomy;
        Ok(())
    }

    async fn before_term_created(&self, taxonomy_id: Uuid, path: &str) -> Result<()> {
        let _ = (taxonomy_id, path);
        Ok(())
    }

    async fn after_term_created(&self, term: &TaxonomyTerm) -> Result<()> {
        let _ = term;
        Ok(())
    }

    async fn before_term_updated(&self, term: &TaxonomyTerm) -> Result<()> {
        let _ = term;
        Ok(())
    }

    async fn after_term_updated(&self, term: &TaxonomyTerm) -> Result<()> {
        let _ = term;
        Ok(())
    }

    /// Fired after the subtree has been busy-marked; `touched` is the full
    /// id set (source root plus descendants).
    async fn before_term_deleted(&self, term: &TaxonomyTerm, touched: &[Uuid]) -> Result<()> {
        let _ = (term, touched);
        Ok(())
    }

    async fn after_term_deleted(&self, term: &TaxonomyTerm) -> Result<()> {
        let _ = term;
        Ok(())
    }

    /// Fired after the subtree has been busy-marked and before cloning;
    /// collaborators can begin asynchronous work referencing old and
    /// target identifiers.
    async fn before_term_moved(
        &self,
        source: &TaxonomyTerm,
        target_path: &str,
        touched: &[Uuid],
    ) -> Result<()> {
        let _ = (source, target_path, touched);
        Ok(())
    }

    /// Fired once the busy locks are released; `old_root` is the obsoleted
    /// original, `new_root` the alive clone at the destination.
    async fn after_term_moved(
        &self,
        old_root: &TaxonomyTerm,
        new_root: &TaxonomyTerm,
    ) -> Result<()> {
        let _ = (old_root, new_root);
        Ok(())
    }
}

/// Sink that observes nothing. Default for engines with no collaborators.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopEventSink;

#[async_trait]
impl TaxonomyEventSink for NoopEventSink {}
