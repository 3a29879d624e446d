//! # taxon-core
//!
//! Core types, errors, events, and the materialized-path codec for the
//! taxon tree engine. The storage layer lives in `taxon-db`; this crate is
//! store-agnostic apart from error-type compatibility with sqlx.

pub mod error;
pub mod events;
pub mod logging;
pub mod models;
pub mod path;
pub mod slug;
pub mod uuid_utils;

pub use error::{Error, Result};
pub use events::{NoopEventSink, TaxonomyEventSink};
pub use models::{
    CreateTaxonomyRequest, CreateTermRequest, MoveDestination, MoveTermRequest, SlugPolicy,
    Taxonomy, TaxonomyTerm, TermParentRef, TermRef, TermStatus, UpdateTaxonomyRequest,
    UpdateTermRequest,
};
pub use path::{EscapedPathCodec, LtreePathCodec, PathCodec};
pub use slug::slugify;
pub use uuid_utils::new_v7;
