//! Move/rename/delete engine: copy-and-obsolete over busy-marked subtrees.
//!
//! A move never renames rows in place. The whole affected subtree is
//! busy-marked in one short transaction (recording the intended outcome in
//! its status), cloned to the destination in a second transaction with each
//! original pointed at its clone via `obsoleted_by_id`, then released in a
//! third. Collaborators notified between the steps can run arbitrarily slow
//! external work without any database transaction staying open.
//!
//! Historical identifiers survive: with `keep_history` the originals remain
//! as `deleted` rows whose forward pointers let callers resolve old paths
//! to the terms that replaced them.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use sqlx::{Pool, Postgres, Transaction};
use tracing::info;
use uuid::Uuid;

use taxon_core::{
    path, slugify, Error, MoveDestination, MoveTermRequest, PathCodec, Result, TaxonomyEventSink,
    TaxonomyTerm, TermRef, TermStatus,
};

use crate::locks::PgLockManager;
use crate::terms::{map_term_row, PgTermRepository, TERM_COLUMNS};
use crate::veto_err;

/// Engine trait for structural subtree mutation.
#[async_trait]
pub trait MoveEngine: Send + Sync {
    /// Move or rename a subtree; returns the alive clone of the source root
    /// at its destination.
    async fn move_term(&self, req: MoveTermRequest) -> Result<TaxonomyTerm>;

    /// Delete a subtree. With `keep_history` the terms remain as `deleted`
    /// rows; without it they are purged as the busy locks release.
    async fn delete_term(&self, source: &TermRef, keep_history: bool) -> Result<()>;
}

/// PostgreSQL implementation of [`MoveEngine`].
#[derive(Clone)]
pub struct PgMoveEngine {
    pool: Pool<Postgres>,
    codec: Arc<dyn PathCodec>,
    terms: PgTermRepository,
    locks: PgLockManager,
    sink: Arc<dyn TaxonomyEventSink>,
}

/// Snapshot of the affected subtree plus the computed destination.
struct MovePlan {
    source: TaxonomyTerm,
    /// Source root first, then descendants in path order (parents before
    /// children).
    subtree: Vec<TaxonomyTerm>,
    ids: Vec<Uuid>,
    new_parent_id: Option<Uuid>,
    target_path: String,
}

impl PgMoveEngine {
    pub fn new(
        pool: Pool<Postgres>,
        codec: Arc<dyn PathCodec>,
        terms: PgTermRepository,
        locks: PgLockManager,
        sink: Arc<dyn TaxonomyEventSink>,
    ) -> Self {
        Self {
            pool,
            codec,
            terms,
            locks,
            sink,
        }
    }

    /// Alive subtree rooted at `root`, root included, ordered by path.
    async fn fetch_subtree_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        root: &TaxonomyTerm,
    ) -> Result<Vec<TaxonomyTerm>> {
        let binds = self.codec.descendant_binds(&root.path);
        let sql = format!(
            "SELECT {TERM_COLUMNS} FROM taxonomy_term t \
             WHERE t.taxonomy_id = $1 AND {} AND t.status = 'alive' \
             ORDER BY t.path",
            self.codec.descendant_predicate("t.path", 2)
        );

        let mut q = sqlx::query(&sql).bind(root.taxonomy_id);
        for b in &binds {
            q = q.bind(b);
        }
        let rows = q.fetch_all(&mut **tx).await.map_err(Error::Database)?;
        rows.iter()
            .map(|r| map_term_row(r, self.codec.as_ref()))
            .collect()
    }

    /// Resolve source and destination and validate the move. Read-only: a
    /// validation failure here leaves the tree untouched, with no locks
    /// taken and no rows mutated.
    async fn plan_move(&self, req: &MoveTermRequest) -> Result<MovePlan> {
        let mut tx = self.pool.begin().await.map_err(Error::Database)?;

        let source = self.terms.resolve_ref_tx(&mut tx, &req.source).await?;
        let subtree = self.fetch_subtree_tx(&mut tx, &source).await?;

        let (new_parent_id, new_parent_path) = match &req.destination {
            None => (
                source.parent_id,
                path::parent_path(&source.path).map(String::from),
            ),
            Some(MoveDestination::Root) => (None, None),
            Some(MoveDestination::Under(parent_ref)) => {
                let parent = self.terms.resolve_ref_tx(&mut tx, parent_ref).await?;
                if parent.taxonomy_id != source.taxonomy_id {
                    return Err(Error::InvalidInput(
                        "cannot move a term across taxonomies".to_string(),
                    ));
                }
                if parent.busy_count > 0 || parent.obsoleted_by_id.is_some() {
                    return Err(Error::InactiveParent(parent.path.clone()));
                }
                (Some(parent.id), Some(parent.path))
            }
        };

        let new_slug = match &req.new_slug {
            Some(s) => slugify(s)?,
            None => source.slug().to_string(),
        };
        let target_path = match &new_parent_path {
            Some(p) => format!("{p}/{new_slug}"),
            None => new_slug,
        };

        if target_path == source.path || path::is_descendant_of(&target_path, &source.path) {
            return Err(Error::CyclicMove {
                from: source.path.clone(),
                to: target_path,
            });
        }

        let taken = self
            .alive_path_exists_tx(&mut tx, source.taxonomy_id, &target_path)
            .await?;
        if taken {
            return Err(Error::DuplicateSlug(target_path));
        }

        tx.commit().await.map_err(Error::Database)?;

        let ids = subtree.iter().map(|t| t.id).collect();
        Ok(MovePlan {
            source,
            subtree,
            ids,
            new_parent_id,
            target_path,
        })
    }

    async fn alive_path_exists_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        taxonomy_id: Uuid,
        logical_path: &str,
    ) -> Result<bool> {
        let sql = format!(
            "SELECT EXISTS(SELECT 1 FROM taxonomy_term t \
             WHERE t.taxonomy_id = $1 AND {} AND t.status = 'alive')",
            self.codec.eq_predicate("t.path", 2)
        );
        sqlx::query_scalar(&sql)
            .bind(taxonomy_id)
            .bind(self.codec.encode(logical_path))
            .fetch_one(&mut **tx)
            .await
            .map_err(Error::Database)
    }

    /// Clone the snapshot rooted at the target path in one transaction and
    /// point each original at its clone. Iterates the snapshot in path
    /// order, so a clone's parent always exists before it.
    async fn clone_subtree(&self, plan: &MovePlan) -> Result<TaxonomyTerm> {
        let mut tx = self.pool.begin().await.map_err(Error::Database)?;
        let mut clones: HashMap<Uuid, Uuid> = HashMap::with_capacity(plan.subtree.len());
        let mut new_root = None;

        for original in &plan.subtree {
            let relative = &original.path[plan.source.path.len()..];
            let clone_path = format!("{}{relative}", plan.target_path);

            let parent_id = if original.id == plan.source.id {
                plan.new_parent_id
            } else {
                let old_parent = original.parent_id.ok_or_else(|| {
                    Error::Internal(format!("term {} has no parent inside subtree", original.id))
                })?;
                Some(*clones.get(&old_parent).ok_or_else(|| {
                    Error::Internal(format!("subtree snapshot missing parent of {}", original.id))
                })?)
            };

            let clone = self
                .terms
                .insert_tx(
                    &mut tx,
                    original.taxonomy_id,
                    parent_id,
                    &clone_path,
                    original.extra_data.as_ref(),
                )
                .await?;

            sqlx::query("UPDATE taxonomy_term SET obsoleted_by_id = $1, updated_at = NOW() WHERE id = $2")
                .bind(clone.id)
                .bind(original.id)
                .execute(&mut *tx)
                .await
                .map_err(Error::Database)?;

            clones.insert(original.id, clone.id);
            if original.id == plan.source.id {
                new_root = Some(clone);
            }
        }

        tx.commit().await.map_err(Error::Database)?;
        new_root.ok_or_else(|| Error::Internal("empty subtree snapshot".to_string()))
    }
}

#[async_trait]
impl MoveEngine for PgMoveEngine {
    async fn move_term(&self, req: MoveTermRequest) -> Result<TaxonomyTerm> {
        let plan = self.plan_move(&req).await?;

        let outcome = if req.keep_history {
            TermStatus::Deleted
        } else {
            TermStatus::DeletePending
        };
        self.locks
            .mark_busy_exclusive(&plan.ids, Some(outcome))
            .await?;

        if let Err(e) = self
            .sink
            .before_term_moved(&plan.source, &plan.target_path, &plan.ids)
            .await
        {
            self.locks.abort_busy(&plan.ids).await?;
            return Err(veto_err(e));
        }

        let new_root = match self.clone_subtree(&plan).await {
            Ok(root) => root,
            Err(e) => {
                self.locks.abort_busy(&plan.ids).await?;
                return Err(e);
            }
        };

        self.locks.unmark_busy(&plan.ids).await?;
        self.sink.after_term_moved(&plan.source, &new_root).await?;

        info!(
            subsystem = "db",
            component = "moves",
            op = "move_term",
            term_path = %plan.source.path,
            target_path = %new_root.path,
            touched_count = plan.ids.len(),
            keep_history = req.keep_history,
            "Subtree moved"
        );
        Ok(new_root)
    }

    async fn delete_term(&self, source: &TermRef, keep_history: bool) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(Error::Database)?;
        let root = self.terms.resolve_ref_tx(&mut tx, source).await?;
        let subtree = self.fetch_subtree_tx(&mut tx, &root).await?;
        tx.commit().await.map_err(Error::Database)?;

        let ids: Vec<Uuid> = subtree.iter().map(|t| t.id).collect();
        let outcome = if keep_history {
            TermStatus::Deleted
        } else {
            TermStatus::DeletePending
        };
        self.locks.mark_busy_exclusive(&ids, Some(outcome)).await?;

        if let Err(e) = self.sink.before_term_deleted(&root, &ids).await {
            self.locks.abort_busy(&ids).await?;
            return Err(veto_err(e));
        }

        self.locks.unmark_busy(&ids).await?;
        self.sink.after_term_deleted(&root).await?;

        info!(
            subsystem = "db",
            component = "moves",
            op = "delete_term",
            term_path = %root.path,
            touched_count = ids.len(),
            keep_history,
            "Subtree deleted"
        );
        Ok(())
    }
}
