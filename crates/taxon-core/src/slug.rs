//! Slug normalization for term segments.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{Error, Result};

static NON_SLUG: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^a-z0-9]+").expect("valid regex"));

/// Normalize a raw segment to a URL-safe slug: lowercase, runs of anything
/// outside `[a-z0-9]` collapsed to a single `-`, leading/trailing dashes
/// trimmed.
///
/// Fails with `InvalidInput` when nothing survives normalization, and when
/// the input contains a `/` (segments are single path components).
pub fn slugify(segment: &str) -> Result<String> {
    if segment.contains('/') {
        return Err(Error::InvalidInput(format!(
            "slug segment may not contain '/': {segment}"
        )));
    }
    let lowered = segment.to_lowercase();
    let slug = NON_SLUG
        .replace_all(&lowered, "-")
        .trim_matches('-')
        .to_string();
    if slug.is_empty() {
        return Err(Error::InvalidInput(format!(
            "slug is empty after normalization: {segment:?}"
        )));
    }
    Ok(slug)
}
