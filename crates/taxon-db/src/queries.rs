//! Read-only ancestor/descendant/listing queries.
//!
//! All tree-shape resolution goes through the same [`taxon_core::PathCodec`]
//! predicates structural validation uses, so queries and validation can
//! never disagree. Nothing here takes row locks.

use std::sync::Arc;

use chrono::Utc;
use sqlx::{Pool, Postgres};
use tracing::debug;

use taxon_core::{Error, PathCodec, Result, TaxonomyTerm, TermRef};

use crate::terms::{map_term_row, PgTermRepository, TERM_COLUMNS};

/// Which term statuses a query returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TermVisibility {
    /// Alive terms only (default).
    #[default]
    Alive,
    /// Include deleted and delete-pending terms.
    All,
}

impl TermVisibility {
    fn clause(&self) -> &'static str {
        match self {
            TermVisibility::Alive => " AND t.status = 'alive'",
            TermVisibility::All => "",
        }
    }
}

/// Options for descendant traversal.
#[derive(Debug, Clone, Copy, Default)]
pub struct DescendantsOptions {
    pub include_self: bool,
    /// How many levels below the root to include; `None` is unbounded.
    pub max_levels: Option<i32>,
    pub visibility: TermVisibility,
}

/// PostgreSQL query engine over the taxonomy forest.
#[derive(Clone)]
pub struct PgQueryEngine {
    pool: Pool<Postgres>,
    codec: Arc<dyn PathCodec>,
    terms: PgTermRepository,
}

impl PgQueryEngine {
    pub fn new(pool: Pool<Postgres>, codec: Arc<dyn PathCodec>, terms: PgTermRepository) -> Self {
        Self { pool, codec, terms }
    }

    async fn resolve(&self, term: &TermRef) -> Result<TaxonomyTerm> {
        let mut tx = self.pool.begin().await.map_err(Error::Database)?;
        let term = self.terms.resolve_ref_tx(&mut tx, term).await?;
        tx.commit().await.map_err(Error::Database)?;
        Ok(term)
    }

    /// Subtree rooted at `root`, ordered by path (depth-first).
    pub async fn descendants(
        &self,
        root: &TermRef,
        opts: DescendantsOptions,
    ) -> Result<Vec<TaxonomyTerm>> {
        let start = Utc::now();
        let root = self.resolve(root).await?;

        let binds = self.codec.descendant_binds(&root.path);
        let mut sql = format!(
            "SELECT {TERM_COLUMNS} FROM taxonomy_term t \
             WHERE t.taxonomy_id = $1 AND {}",
            self.codec.descendant_predicate("t.path", 2)
        );
        let mut param_idx = 2 + binds.len();

        if !opts.include_self {
            sql.push_str(&format!(" AND t.level > ${param_idx}"));
            param_idx += 1;
        }
        if opts.max_levels.is_some() {
            sql.push_str(&format!(" AND t.level <= ${param_idx}"));
        }
        sql.push_str(opts.visibility.clause());
        sql.push_str(" ORDER BY t.path");

        let mut q = sqlx::query(&sql).bind(root.taxonomy_id);
        for b in &binds {
            q = q.bind(b);
        }
        if !opts.include_self {
            q = q.bind(root.level);
        }
        if let Some(levels) = opts.max_levels {
            q = q.bind(root.level + levels);
        }

        let rows = q.fetch_all(&self.pool).await.map_err(Error::Database)?;
        let terms = rows
            .iter()
            .map(|r| map_term_row(r, self.codec.as_ref()))
            .collect::<Result<Vec<_>>>()?;

        debug!(
            subsystem = "db",
            component = "queries",
            op = "descendants",
            term_path = %root.path,
            result_count = terms.len(),
            duration_ms = (Utc::now() - start).num_milliseconds(),
            "Descendant query"
        );
        Ok(terms)
    }

    /// Chain from the taxonomy root down to `term`, ordered root-first.
    pub async fn ancestors(
        &self,
        term: &TermRef,
        include_self: bool,
        visibility: TermVisibility,
    ) -> Result<Vec<TaxonomyTerm>> {
        let term = self.resolve(term).await?;

        let binds = self.codec.ancestor_binds(&term.path);
        let mut sql = format!(
            "SELECT {TERM_COLUMNS} FROM taxonomy_term t \
             WHERE t.taxonomy_id = $1 AND {}",
            self.codec.ancestor_predicate("t.path", 2)
        );
        let param_idx = 2 + binds.len();

        if !include_self {
            sql.push_str(&format!(" AND t.level < ${param_idx}"));
        }
        sql.push_str(visibility.clause());
        sql.push_str(" ORDER BY t.path");

        let mut q = sqlx::query(&sql).bind(term.taxonomy_id);
        for b in &binds {
            q = q.bind(b);
        }
        if !include_self {
            q = q.bind(term.level);
        }

        let rows = q.fetch_all(&self.pool).await.map_err(Error::Database)?;
        rows.iter()
            .map(|r| map_term_row(r, self.codec.as_ref()))
            .collect()
    }

    /// Whole-forest listing for a taxonomy; top-level terms are level 0.
    pub async fn list_taxonomy(
        &self,
        code: &str,
        max_levels: Option<i32>,
        visibility: TermVisibility,
    ) -> Result<Vec<TaxonomyTerm>> {
        let mut sql = format!(
            "SELECT {TERM_COLUMNS} FROM taxonomy_term t \
             JOIN taxonomy x ON x.id = t.taxonomy_id \
             WHERE x.code = $1"
        );
        if max_levels.is_some() {
            sql.push_str(" AND t.level < $2");
        }
        sql.push_str(visibility.clause());
        sql.push_str(" ORDER BY t.path");

        let mut q = sqlx::query(&sql).bind(code);
        if let Some(levels) = max_levels {
            q = q.bind(levels);
        }

        let rows = q.fetch_all(&self.pool).await.map_err(Error::Database)?;
        rows.iter()
            .map(|r| map_term_row(r, self.codec.as_ref()))
            .collect()
    }
}
