//! Taxonomy repository: namespaces owning term trees.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Pool, Postgres, Row};
use tracing::info;

use taxon_core::{
    new_v7, CreateTaxonomyRequest, Error, Result, Taxonomy, TaxonomyEventSink,
    UpdateTaxonomyRequest,
};

use crate::veto_err;

const TAXONOMY_COLUMNS: &str = "id, code, url, extra_data, created_at, updated_at";

fn map_taxonomy_row(row: &sqlx::postgres::PgRow) -> Taxonomy {
    Taxonomy {
        id: row.get("id"),
        code: row.get("code"),
        url: row.get("url"),
        extra_data: row.get("extra_data"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

/// Repository trait for taxonomy operations.
#[async_trait]
pub trait TaxonomyRepository: Send + Sync {
    /// Create a new taxonomy; fails with `DuplicateCode` if the code exists.
    async fn create_taxonomy(&self, req: CreateTaxonomyRequest) -> Result<Taxonomy>;

    /// Get a taxonomy by code.
    async fn get_taxonomy(&self, code: &str) -> Result<Option<Taxonomy>>;

    /// List all taxonomies, ordered by code.
    async fn list_taxonomies(&self) -> Result<Vec<Taxonomy>>;

    /// Update a taxonomy's url/metadata.
    async fn update_taxonomy(&self, code: &str, req: UpdateTaxonomyRequest) -> Result<Taxonomy>;

    /// Delete a taxonomy, cascading to all of its terms. Destructive by
    /// design: no per-term busy check is made; callers authorize this at a
    /// higher layer.
    async fn delete_taxonomy(&self, code: &str) -> Result<()>;
}

/// PostgreSQL implementation of [`TaxonomyRepository`].
#[derive(Clone)]
pub struct PgTaxonomyRepository {
    pool: Pool<Postgres>,
    sink: Arc<dyn TaxonomyEventSink>,
}

impl PgTaxonomyRepository {
    pub fn new(pool: Pool<Postgres>, sink: Arc<dyn TaxonomyEventSink>) -> Self {
        Self { pool, sink }
    }
}

#[async_trait]
impl TaxonomyRepository for PgTaxonomyRepository {
    async fn create_taxonomy(&self, req: CreateTaxonomyRequest) -> Result<Taxonomy> {
        let mut tx = self.pool.begin().await.map_err(Error::Database)?;

        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM taxonomy WHERE code = $1)")
            .bind(&req.code)
            .fetch_one(&mut *tx)
            .await
            .map_err(Error::Database)?;
        if exists {
            return Err(Error::DuplicateCode(req.code));
        }

        self.sink
            .before_taxonomy_created(&req.code, req.extra_data.as_ref())
            .await
            .map_err(veto_err)?;

        let id = new_v7();
        let now = Utc::now();
        sqlx::query(
            "INSERT INTO taxonomy (id, code, url, extra_data, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $5)",
        )
        .bind(id)
        .bind(&req.code)
        .bind(&req.url)
        .bind(&req.extra_data)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            if crate::is_unique_violation(&e) {
                Error::DuplicateCode(req.code.clone())
            } else {
                Error::Database(e)
            }
        })?;

        let taxonomy = Taxonomy {
            id,
            code: req.code,
            url: req.url,
            extra_data: req.extra_data,
            created_at: now,
            updated_at: now,
        };

        self.sink.after_taxonomy_created(&taxonomy).await?;
        tx.commit().await.map_err(Error::Database)?;

        info!(
            subsystem = "db",
            component = "taxonomies",
            op = "create_taxonomy",
            taxonomy_code = %taxonomy.code,
            "Taxonomy created"
        );
        Ok(taxonomy)
    }

    async fn get_taxonomy(&self, code: &str) -> Result<Option<Taxonomy>> {
        let row = sqlx::query(&format!(
            "SELECT {TAXONOMY_COLUMNS} FROM taxonomy WHERE code = $1"
        ))
        .bind(code)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(row.map(|r| map_taxonomy_row(&r)))
    }

    async fn list_taxonomies(&self) -> Result<Vec<Taxonomy>> {
        let rows = sqlx::query(&format!(
            "SELECT {TAXONOMY_COLUMNS} FROM taxonomy ORDER BY code"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(rows.iter().map(map_taxonomy_row).collect())
    }

    async fn update_taxonomy(&self, code: &str, req: UpdateTaxonomyRequest) -> Result<Taxonomy> {
        let mut tx = self.pool.begin().await.map_err(Error::Database)?;

        let row = sqlx::query(&format!(
            "SELECT {TAXONOMY_COLUMNS} FROM taxonomy WHERE code = $1"
        ))
        .bind(code)
        .fetch_optional(&mut *tx)
        .await
        .map_err(Error::Database)?;
        let mut taxonomy = row
            .map(|r| map_taxonomy_row(&r))
            .ok_or_else(|| Error::NotFound(format!("taxonomy {code}")))?;

        self.sink
            .before_taxonomy_updated(&taxonomy)
            .await
            .map_err(veto_err)?;

        let now = Utc::now();
        sqlx::query("UPDATE taxonomy SET url = $1, extra_data = $2, updated_at = $3 WHERE id = $4")
            .bind(&req.url)
            .bind(&req.extra_data)
            .bind(now)
            .bind(taxonomy.id)
            .execute(&mut *tx)
            .await
            .map_err(Error::Database)?;

        taxonomy.url = req.url;
        taxonomy.extra_data = req.extra_data;
        taxonomy.updated_at = now;

        self.sink.after_taxonomy_updated(&taxonomy).await?;
        tx.commit().await.map_err(Error::Database)?;
        Ok(taxonomy)
    }

    async fn delete_taxonomy(&self, code: &str) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(Error::Database)?;

        let row = sqlx::query(&format!(
            "SELECT {TAXONOMY_COLUMNS} FROM taxonomy WHERE code = $1"
        ))
        .bind(code)
        .fetch_optional(&mut *tx)
        .await
        .map_err(Error::Database)?;
        let taxonomy = row
            .map(|r| map_taxonomy_row(&r))
            .ok_or_else(|| Error::NotFound(format!("taxonomy {code}")))?;

        self.sink
            .before_taxonomy_deleted(&taxonomy)
            .await
            .map_err(veto_err)?;

        // Terms go with the taxonomy via the FK cascade.
        sqlx::query("DELETE FROM taxonomy WHERE id = $1")
            .bind(taxonomy.id)
            .execute(&mut *tx)
            .await
            .map_err(Error::Database)?;

        self.sink.after_taxonomy_deleted(&taxonomy).await?;
        tx.commit().await.map_err(Error::Database)?;

        info!(
            subsystem = "db",
            component = "taxonomies",
            op = "delete_taxonomy",
            taxonomy_code = %taxonomy.code,
            "Taxonomy deleted"
        );
        Ok(())
    }
}
