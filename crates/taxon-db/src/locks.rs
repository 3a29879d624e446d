//! Busy-count lock manager.
//!
//! Converts "lock held for an unbounded external operation" into "reference
//! count held across two short transactions". `mark_busy` and `unmark_busy`
//! are each a single short transaction; the slow external side effect runs
//! between them with no database transaction open. Structural operations
//! consult the count and refuse rather than block.
//!
//! Row-level `FOR UPDATE` locking on the exact id set serializes concurrent
//! marks touching overlapping subtrees: a second mover blocks until the
//! first mark commits, then observes the updated counts and fails fast.
//!
//! The engine never reclaims a lock on its own. A caller that crashes
//! between mark and unmark leaves the set locked; [`PgLockManager::abort_busy`]
//! exists so a supervisory caller can force-release stale locks.

use sqlx::{Pool, Postgres, Row, Transaction};
use tracing::{debug, warn};
use uuid::Uuid;

use taxon_core::{Error, Result, TermStatus};

/// PostgreSQL busy-count lock manager.
#[derive(Clone)]
pub struct PgLockManager {
    pool: Pool<Postgres>,
}

impl PgLockManager {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Atomically increment `busy_count` for every id and optionally set a
    /// new status, regardless of current counts. External collaborators use
    /// this to layer additional work onto already-busy terms.
    pub async fn mark_busy(&self, ids: &[Uuid], new_status: Option<TermStatus>) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(Error::Database)?;
        Self::lock_rows(&mut tx, ids).await?;
        Self::increment(&mut tx, ids, new_status).await?;
        tx.commit().await.map_err(Error::Database)?;

        debug!(
            subsystem = "db",
            component = "locks",
            op = "mark_busy",
            touched_count = ids.len(),
            "Busy marks taken"
        );
        Ok(())
    }

    /// Like [`Self::mark_busy`], but fails fast with `TermBusy` if any of
    /// the rows already carries a busy mark. Structural operations use this
    /// so conflicting changes are refused, never queued.
    pub async fn mark_busy_exclusive(
        &self,
        ids: &[Uuid],
        new_status: Option<TermStatus>,
    ) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(Error::Database)?;
        let rows = Self::lock_rows(&mut tx, ids).await?;
        for row in &rows {
            let busy: i32 = row.get("busy_count");
            if busy > 0 {
                let id: Uuid = row.get("id");
                return Err(Error::TermBusy(id.to_string()));
            }
        }
        Self::increment(&mut tx, ids, new_status).await?;
        tx.commit().await.map_err(Error::Database)?;

        debug!(
            subsystem = "db",
            component = "locks",
            op = "mark_busy_exclusive",
            touched_count = ids.len(),
            "Exclusive busy marks taken"
        );
        Ok(())
    }

    /// Atomically decrement `busy_count`; any row reaching zero with
    /// status `delete_pending` is purged in the same transaction.
    pub async fn unmark_busy(&self, ids: &[Uuid]) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(Error::Database)?;
        Self::lock_rows(&mut tx, ids).await?;

        sqlx::query(
            "UPDATE taxonomy_term SET busy_count = busy_count - 1, updated_at = NOW()
             WHERE id = ANY($1)",
        )
        .bind(ids)
        .execute(&mut *tx)
        .await
        .map_err(Error::Database)?;

        let purged = sqlx::query(
            "DELETE FROM taxonomy_term
             WHERE id = ANY($1) AND busy_count <= 0 AND status = 'delete_pending'",
        )
        .bind(ids)
        .execute(&mut *tx)
        .await
        .map_err(Error::Database)?;

        tx.commit().await.map_err(Error::Database)?;

        debug!(
            subsystem = "db",
            component = "locks",
            op = "unmark_busy",
            touched_count = ids.len(),
            purged_count = purged.rows_affected(),
            "Busy marks released"
        );
        Ok(())
    }

    /// Roll back a provisional mark: decrement `busy_count` and restore
    /// status to alive. Used when a structural operation is vetoed or fails
    /// after its mark step, and by supervisors force-releasing stale locks.
    pub async fn abort_busy(&self, ids: &[Uuid]) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(Error::Database)?;
        Self::lock_rows(&mut tx, ids).await?;

        sqlx::query(
            "UPDATE taxonomy_term
             SET busy_count = GREATEST(busy_count - 1, 0), status = 'alive', updated_at = NOW()
             WHERE id = ANY($1)",
        )
        .bind(ids)
        .execute(&mut *tx)
        .await
        .map_err(Error::Database)?;

        tx.commit().await.map_err(Error::Database)?;

        warn!(
            subsystem = "db",
            component = "locks",
            op = "abort_busy",
            touched_count = ids.len(),
            "Busy marks aborted, statuses restored to alive"
        );
        Ok(())
    }

    /// Row-lock the exact id set, serializing concurrent marks.
    async fn lock_rows(
        tx: &mut Transaction<'_, Postgres>,
        ids: &[Uuid],
    ) -> Result<Vec<sqlx::postgres::PgRow>> {
        sqlx::query("SELECT id, busy_count FROM taxonomy_term WHERE id = ANY($1) FOR UPDATE")
            .bind(ids)
            .fetch_all(&mut **tx)
            .await
            .map_err(Error::Database)
    }

    async fn increment(
        tx: &mut Transaction<'_, Postgres>,
        ids: &[Uuid],
        new_status: Option<TermStatus>,
    ) -> Result<()> {
        match new_status {
            Some(status) => {
                sqlx::query(
                    "UPDATE taxonomy_term
                     SET busy_count = busy_count + 1, status = $2, updated_at = NOW()
                     WHERE id = ANY($1)",
                )
                .bind(ids)
                .bind(status.as_str())
                .execute(&mut **tx)
                .await
                .map_err(Error::Database)?;
            }
            None => {
                sqlx::query(
                    "UPDATE taxonomy_term SET busy_count = busy_count + 1, updated_at = NOW()
                     WHERE id = ANY($1)",
                )
                .bind(ids)
                .execute(&mut **tx)
                .await
                .map_err(Error::Database)?;
            }
        }
        Ok(())
    }
}
