//! Term repository: create/read/update for taxonomy terms.
//!
//! Structural creation resolves a parent reference (a term id, a taxonomy
//! code plus parent path, or a full path whose first segment is the
//! taxonomy code), normalizes the segment to a slug, applies the caller's
//! collision policy, and inserts with the path/level invariants computed
//! here. Moves and deletes live in [`crate::moves`].

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Pool, Postgres, Row, Transaction};
use tracing::debug;
use uuid::Uuid;

use taxon_core::{
    new_v7, path, slugify, CreateTermRequest, Error, PathCodec, Result, SlugPolicy, TaxonomyTerm,
    TaxonomyEventSink, TermParentRef, TermRef, TermStatus, UpdateTermRequest,
};

use crate::veto_err;

/// Standard SELECT columns for taxonomy_term rows, aliased as `t`.
pub(crate) const TERM_COLUMNS: &str = r#"
    t.id, t.taxonomy_id, t.parent_id, t.path, t.level, t.extra_data,
    t.busy_count, t.status, t.obsoleted_by_id, t.created_at, t.updated_at
"#;

/// Map a taxonomy_term row into the domain type, decoding the stored path
/// key back to its logical form.
pub(crate) fn map_term_row(row: &sqlx::postgres::PgRow, codec: &dyn PathCodec) -> Result<TaxonomyTerm> {
    let status: String = row.get("status");
    let stored_path: String = row.get("path");
    Ok(TaxonomyTerm {
        id: row.get("id"),
        taxonomy_id: row.get("taxonomy_id"),
        parent_id: row.get("parent_id"),
        path: codec.decode(&stored_path),
        level: row.get("level"),
        extra_data: row.get("extra_data"),
        busy_count: row.get("busy_count"),
        status: status.parse::<TermStatus>()?,
        obsoleted_by_id: row.get("obsoleted_by_id"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

/// Resolved parent of a new or relocated term.
#[derive(Debug, Clone)]
pub(crate) struct ResolvedParent {
    pub taxonomy_id: Uuid,
    /// None for taxonomy-root-level placement.
    pub parent_id: Option<Uuid>,
    pub parent_path: Option<String>,
}

/// Repository trait for term operations.
#[async_trait]
pub trait TermRepository: Send + Sync {
    /// Create a term under the resolved parent.
    async fn create_term(&self, req: CreateTermRequest) -> Result<TaxonomyTerm>;

    /// Get an alive term by taxonomy code and logical path.
    async fn get_term(&self, taxonomy: &str, term_path: &str) -> Result<Option<TaxonomyTerm>>;

    /// Get a term by taxonomy code and logical path regardless of status.
    async fn get_term_any_status(
        &self,
        taxonomy: &str,
        term_path: &str,
    ) -> Result<Option<TaxonomyTerm>>;

    /// Get a term by id regardless of status.
    async fn get_term_by_id(&self, id: Uuid) -> Result<Option<TaxonomyTerm>>;

    /// Update a term's metadata.
    async fn update_term(&self, term: &TermRef, req: UpdateTermRequest) -> Result<TaxonomyTerm>;
}

/// PostgreSQL implementation of [`TermRepository`].
#[derive(Clone)]
pub struct PgTermRepository {
    pool: Pool<Postgres>,
    codec: Arc<dyn PathCodec>,
    sink: Arc<dyn TaxonomyEventSink>,
}

impl PgTermRepository {
    pub fn new(
        pool: Pool<Postgres>,
        codec: Arc<dyn PathCodec>,
        sink: Arc<dyn TaxonomyEventSink>,
    ) -> Self {
        Self { pool, codec, sink }
    }

    /// Fetch a term by id within a transaction, any status.
    pub(crate) async fn get_by_id_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        id: Uuid,
    ) -> Result<Option<TaxonomyTerm>> {
        let row = sqlx::query(&format!(
            "SELECT {TERM_COLUMNS} FROM taxonomy_term t WHERE t.id = $1"
        ))
        .bind(id)
        .fetch_optional(&mut **tx)
        .await
        .map_err(Error::Database)?;

        row.map(|r| map_term_row(&r, self.codec.as_ref())).transpose()
    }

    /// Fetch a term by taxonomy code and logical path within a transaction.
    pub(crate) async fn get_by_path_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        taxonomy: &str,
        term_path: &str,
        alive_only: bool,
    ) -> Result<Option<TaxonomyTerm>> {
        let status_clause = if alive_only {
            " AND t.status = 'alive'"
        } else {
            ""
        };
        // Historical rows may share a path with a later re-created alive
        // term; prefer the alive row, then the most recently touched one.
        let sql = format!(
            "SELECT {TERM_COLUMNS} FROM taxonomy_term t \
             JOIN taxonomy x ON x.id = t.taxonomy_id \
             WHERE x.code = $1 AND {}{status_clause} \
             ORDER BY (t.status = 'alive') DESC, t.updated_at DESC \
             LIMIT 1",
            self.codec.eq_predicate("t.path", 2)
        );

        let row = sqlx::query(&sql)
            .bind(taxonomy)
            .bind(self.codec.encode(term_path))
            .fetch_optional(&mut **tx)
            .await
            .map_err(Error::Database)?;

        row.map(|r| map_term_row(&r, self.codec.as_ref())).transpose()
    }

    /// Resolve a parent reference for term creation. A parent that exists
    /// but is not alive, is busy, or has been obsoleted is `InactiveParent`;
    /// a parent that does not exist at all is `NotFound`.
    pub(crate) async fn resolve_parent_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        parent: &TermParentRef,
    ) -> Result<ResolvedParent> {
        match parent {
            TermParentRef::Term(id) => {
                let term = self
                    .get_by_id_tx(tx, *id)
                    .await?
                    .ok_or_else(|| Error::NotFound(format!("term {id}")))?;
                Self::check_active_parent(&term)?;
                Ok(ResolvedParent {
                    taxonomy_id: term.taxonomy_id,
                    parent_id: Some(term.id),
                    parent_path: Some(term.path),
                })
            }
            TermParentRef::Taxonomy { code, parent_path } => {
                self.resolve_code_and_path(tx, code, parent_path.as_deref())
                    .await
            }
            TermParentRef::FullPath(full) => {
                let (code, rest) = match full.split_once(path::PATH_SEPARATOR) {
                    Some((code, rest)) if !rest.is_empty() => (code, Some(rest)),
                    _ => (full.as_str(), None),
                };
                self.resolve_code_and_path(tx, code, rest).await
            }
        }
    }

    async fn resolve_code_and_path(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        code: &str,
        parent_path: Option<&str>,
    ) -> Result<ResolvedParent> {
        let taxonomy_id: Option<Uuid> = sqlx::query_scalar("SELECT id FROM taxonomy WHERE code = $1")
            .bind(code)
            .fetch_optional(&mut **tx)
            .await
            .map_err(Error::Database)?;
        let taxonomy_id =
            taxonomy_id.ok_or_else(|| Error::NotFound(format!("taxonomy {code}")))?;

        match parent_path {
            None => Ok(ResolvedParent {
                taxonomy_id,
                parent_id: None,
                parent_path: None,
            }),
            Some(p) => {
                let term = self
                    .get_by_path_tx(tx, code, p, true)
                    .await?
                    .ok_or_else(|| Error::NotFound(format!("term {code}/{p}")))?;
                Self::check_active_parent(&term)?;
                Ok(ResolvedParent {
                    taxonomy_id,
                    parent_id: Some(term.id),
                    parent_path: Some(term.path),
                })
            }
        }
    }

    fn check_active_parent(term: &TaxonomyTerm) -> Result<()> {
        if term.status != TermStatus::Alive
            || term.busy_count > 0
            || term.obsoleted_by_id.is_some()
        {
            return Err(Error::InactiveParent(term.path.clone()));
        }
        Ok(())
    }

    /// Pick a free slug among alive siblings according to the policy.
    async fn disambiguate_slug(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        taxonomy_id: Uuid,
        parent_path: Option<&str>,
        slug: &str,
        policy: SlugPolicy,
    ) -> Result<String> {
        let child_path = |s: &str| match parent_path {
            Some(p) => format!("{p}/{s}"),
            None => s.to_string(),
        };

        let taken = self
            .alive_path_exists(tx, taxonomy_id, &child_path(slug))
            .await?;
        if !taken {
            return Ok(child_path(slug));
        }
        if policy == SlugPolicy::Reject {
            return Err(Error::DuplicateSlug(child_path(slug)));
        }

        let mut suffix = 1u32;
        loop {
            let candidate = child_path(&format!("{slug}-{suffix}"));
            if !self.alive_path_exists(tx, taxonomy_id, &candidate).await? {
                return Ok(candidate);
            }
            suffix += 1;
        }
    }

    async fn alive_path_exists(
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
        let exists: bool = sqlx::query_scalar(&sql)
            .bind(taxonomy_id)
            .bind(self.codec.encode(logical_path))
            .fetch_one(&mut **tx)
            .await
            .map_err(Error::Database)?;
        Ok(exists)
    }

    /// Insert a fully-computed term row within a transaction. Used both by
    /// `create_term` and by the move engine's clone step.
    pub(crate) async fn insert_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        taxonomy_id: Uuid,
        parent_id: Option<Uuid>,
        logical_path: &str,
        extra_data: Option<&serde_json::Value>,
    ) -> Result<TaxonomyTerm> {
        let id = new_v7();
        let now = Utc::now();
        let level = path::level_of(logical_path);

        sqlx::query(
            r#"
            INSERT INTO taxonomy_term (
                id, taxonomy_id, parent_id, path, level, extra_data,
                busy_count, status, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, 0, 'alive', $7, $7)
            "#,
        )
        .bind(id)
        .bind(taxonomy_id)
        .bind(parent_id)
        .bind(self.codec.encode(logical_path))
        .bind(level)
        .bind(extra_data)
        .bind(now)
        .execute(&mut **tx)
        .await
        .map_err(|e| {
            if crate::is_unique_violation(&e) {
                Error::DuplicateSlug(logical_path.to_string())
            } else {
                Error::Database(e)
            }
        })?;

        Ok(TaxonomyTerm {
            id,
            taxonomy_id,
            parent_id,
            path: logical_path.to_string(),
            level,
            extra_data: extra_data.cloned(),
            busy_count: 0,
            status: TermStatus::Alive,
            obsoleted_by_id: None,
            created_at: now,
            updated_at: now,
        })
    }

    /// Resolve a term reference within a transaction; alive terms only.
    /// Path lookups filter on status in the query itself, so an obsoleted
    /// row sharing the path can never shadow the alive term.
    pub(crate) async fn resolve_ref_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        term: &TermRef,
    ) -> Result<TaxonomyTerm> {
        let found = match term {
            TermRef::Id(id) => self
                .get_by_id_tx(tx, *id)
                .await?
                .filter(|t| t.status == TermStatus::Alive),
            TermRef::Path { taxonomy, path } => {
                self.get_by_path_tx(tx, taxonomy, path, true).await?
            }
        };
        found.ok_or_else(|| {
            Error::NotFound(match term {
                TermRef::Id(id) => format!("term {id}"),
                TermRef::Path { taxonomy, path } => format!("term {taxonomy}/{path}"),
            })
        })
    }
}

#[async_trait]
impl TermRepository for PgTermRepository {
    async fn create_term(&self, req: CreateTermRequest) -> Result<TaxonomyTerm> {
        let mut tx = self.pool.begin().await.map_err(Error::Database)?;

        let parent = self.resolve_parent_tx(&mut tx, &req.parent).await?;
        let slug = slugify(&req.slug)?;
        let child_path = self
            .disambiguate_slug(
                &mut tx,
                parent.taxonomy_id,
                parent.parent_path.as_deref(),
                &slug,
                req.slug_policy,
            )
            .await?;

        self.sink
            .before_term_created(parent.taxonomy_id, &child_path)
            .await
            .map_err(veto_err)?;

        let term = self
            .insert_tx(
                &mut tx,
                parent.taxonomy_id,
                parent.parent_id,
                &child_path,
                req.extra_data.as_ref(),
            )
            .await?;

        self.sink.after_term_created(&term).await?;
        tx.commit().await.map_err(Error::Database)?;

        debug!(
            subsystem = "db",
            component = "terms",
            op = "create_term",
            term_id = %term.id,
            term_path = %term.path,
            "Term created"
        );
        Ok(term)
    }

    async fn get_term(&self, taxonomy: &str, term_path: &str) -> Result<Option<TaxonomyTerm>> {
        let mut tx = self.pool.begin().await.map_err(Error::Database)?;
        let term = self.get_by_path_tx(&mut tx, taxonomy, term_path, true).await?;
        tx.commit().await.map_err(Error::Database)?;
        Ok(term)
    }

    async fn get_term_any_status(
        &self,
        taxonomy: &str,
        term_path: &str,
    ) -> Result<Option<TaxonomyTerm>> {
        let mut tx = self.pool.begin().await.map_err(Error::Database)?;
        let term = self
            .get_by_path_tx(&mut tx, taxonomy, term_path, false)
            .await?;
        tx.commit().await.map_err(Error::Database)?;
        Ok(term)
    }

    async fn get_term_by_id(&self, id: Uuid) -> Result<Option<TaxonomyTerm>> {
        let mut tx = self.pool.begin().await.map_err(Error::Database)?;
        let term = self.get_by_id_tx(&mut tx, id).await?;
        tx.commit().await.map_err(Error::Database)?;
        Ok(term)
    }

    async fn update_term(&self, term: &TermRef, req: UpdateTermRequest) -> Result<TaxonomyTerm> {
        let mut tx = self.pool.begin().await.map_err(Error::Database)?;

        let mut found = self.resolve_ref_tx(&mut tx, term).await?;
        self.sink.before_term_updated(&found).await.map_err(veto_err)?;

        let now = Utc::now();
        sqlx::query("UPDATE taxonomy_term SET extra_data = $1, updated_at = $2 WHERE id = $3")
            .bind(&req.extra_data)
            .bind(now)
            .bind(found.id)
            .execute(&mut *tx)
            .await
            .map_err(Error::Database)?;

        found.extra_data = req.extra_data;
        found.updated_at = now;

        self.sink.after_term_updated(&found).await?;
        tx.commit().await.map_err(Error::Database)?;
        Ok(found)
    }
}
