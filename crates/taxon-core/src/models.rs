//! Core data model for taxonomies and taxonomy terms.
//!
//! A `Taxonomy` is a namespace/root; a `TaxonomyTerm` is one node of the
//! forest, addressed by a materialized path of slug segments. Terms carry a
//! `busy_count` reference count used by the lock manager to coordinate
//! structural mutation with asynchronous external side effects.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::Error;

/// Lifecycle status of a taxonomy term.
///
/// A term is created `Alive`. The move/rename engine transitions it to
/// `Deleted` (retained indefinitely for audit/redirect purposes) or
/// `DeletePending` (physically purged once its busy count drops to zero).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TermStatus {
    Alive,
    Deleted,
    DeletePending,
}

impl TermStatus {
    /// Database text representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            TermStatus::Alive => "alive",
            TermStatus::Deleted => "deleted",
            TermStatus::DeletePending => "delete_pending",
        }
    }
}

impl FromStr for TermStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "alive" => Ok(TermStatus::Alive),
            "deleted" => Ok(TermStatus::Deleted),
            "delete_pending" => Ok(TermStatus::DeletePending),
            other => Err(Error::InvalidInput(format!(
                "unknown term status: {other}"
            ))),
        }
    }
}

/// A taxonomy: a named namespace owning one tree of terms.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Taxonomy {
    pub id: Uuid,
    /// Unique human-readable name.
    pub code: String,
    /// Optional external canonical URL.
    pub url: Option<String>,
    /// Opaque key/value document.
    pub extra_data: Option<Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One node of a taxonomy tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaxonomyTerm {
    pub id: Uuid,
    pub taxonomy_id: Uuid,
    /// Null only for taxonomy-root-level terms.
    pub parent_id: Option<Uuid>,
    /// Materialized path: slug segments from the taxonomy root, `/`-separated.
    pub path: String,
    /// Depth; root children are level 0. Always `segments(path) - 1`.
    pub level: i32,
    pub extra_data: Option<Value>,
    /// Reference count of pending external operations. Structural mutation
    /// under a term with `busy_count > 0` is rejected, never blocked on.
    pub busy_count: i32,
    pub status: TermStatus,
    /// Forward pointer to the term that replaced this one. Set only when
    /// status is not `Alive`; once set it is never cleared or changed.
    pub obsoleted_by_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TaxonomyTerm {
    /// Last slug segment of the materialized path.
    pub fn slug(&self) -> &str {
        crate::path::last_segment(&self.path)
    }
}

/// Reference to the parent under which a new term is created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TermParentRef {
    /// Direct child of this term.
    Term(Uuid),
    /// Taxonomy code plus an optional parent path inside it; `None` creates
    /// a top-level term.
    Taxonomy {
        code: String,
        parent_path: Option<String>,
    },
    /// Full path whose first segment is the taxonomy code, e.g.
    /// `countries/europe/cz`.
    FullPath(String),
}

impl TermParentRef {
    /// Top level of the named taxonomy.
    pub fn taxonomy(code: impl Into<String>) -> Self {
        TermParentRef::Taxonomy {
            code: code.into(),
            parent_path: None,
        }
    }

    /// A path inside the named taxonomy.
    pub fn path(code: impl Into<String>, parent_path: impl Into<String>) -> Self {
        TermParentRef::Taxonomy {
            code: code.into(),
            parent_path: Some(parent_path.into()),
        }
    }
}

/// Reference to an existing term.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TermRef {
    Id(Uuid),
    /// Taxonomy code and the term's full path inside it.
    Path { taxonomy: String, path: String },
}

impl TermRef {
    pub fn path(taxonomy: impl Into<String>, path: impl Into<String>) -> Self {
        TermRef::Path {
            taxonomy: taxonomy.into(),
            path: path.into(),
        }
    }
}

/// Destination of a subtree move.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MoveDestination {
    /// Move to the taxonomy root (top level).
    Root,
    /// Move under another term.
    Under(TermRef),
}

/// What to do when a new term's slug collides with an alive sibling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SlugPolicy {
    /// Suffix `-1`, `-2`, ... until the slug is free.
    #[default]
    Disambiguate,
    /// Fail with `DuplicateSlug`.
    Reject,
}

/// Request to create a new taxonomy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateTaxonomyRequest {
    pub code: String,
    pub url: Option<String>,
    pub extra_data: Option<Value>,
}

/// Request to update a taxonomy's metadata.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateTaxonomyRequest {
    pub url: Option<String>,
    pub extra_data: Option<Value>,
}

/// Request to create a new term.
#[derive(Debug, Clone)]
pub struct CreateTermRequest {
    pub parent: TermParentRef,
    /// Raw segment; normalized to a URL-safe slug before insertion.
    pub slug: String,
    pub extra_data: Option<Value>,
    pub slug_policy: SlugPolicy,
}

impl CreateTermRequest {
    pub fn new(parent: TermParentRef, slug: impl Into<String>) -> Self {
        Self {
            parent,
            slug: slug.into(),
            extra_data: None,
            slug_policy: SlugPolicy::default(),
        }
    }

    pub fn with_extra_data(mut self, extra_data: Value) -> Self {
        self.extra_data = Some(extra_data);
        self
    }

    pub fn with_slug_policy(mut self, policy: SlugPolicy) -> Self {
        self.slug_policy = policy;
        self
    }
}

/// Request to update a term's metadata.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateTermRequest {
    pub extra_data: Option<Value>,
}

/// Request for a subtree move or rename.
///
/// A rename is a move with `destination: None` and a `new_slug`; a move to
/// the taxonomy root uses `destination: Some(MoveDestination::Root)`.
#[derive(Debug, Clone)]
pub struct MoveTermRequest {
    pub source: TermRef,
    /// `None` keeps the current parent (pure rename).
    pub destination: Option<MoveDestination>,
    /// `None` keeps the current last segment.
    pub new_slug: Option<String>,
    /// When true, originals are retained as `Deleted` with
    /// `obsoleted_by_id` pointing at their clones; when false they are
    /// marked `DeletePending` and purged as the busy locks release.
    pub keep_history: bool,
}
