//! UUIDv7 utilities for time-ordered surrogate keys.

use uuid::Uuid;

/// Generate a new UUIDv7 identifier.
///
/// UUIDv7 embeds a Unix timestamp (milliseconds) in the first 48 bits,
/// so ids created later are lexicographically greater — useful for stable
/// creation-order tiebreaks without an extra column.
#[inline]
pub fn new_v7() -> Uuid {
    Uuid::now_v7()
}
