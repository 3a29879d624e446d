//! Materialized-path predicates and the storage path codec.
//!
//! Logical paths are `/`-separated slug sequences (`europe/cz/prague`).
//! Ancestor/descendant relations are exact segment-boundary prefix matches:
//! `a/b` is an ancestor of `a/b/c` but never of `a/bc`.
//!
//! The [`PathCodec`] trait abstracts how a logical path becomes a single
//! comparable storage key and how prefix filters are expressed in SQL. Two
//! interchangeable implementations exist:
//!
//! - [`EscapedPathCodec`] (portable default): a `TEXT` column where `/` is
//!   replaced by a private escape byte, so a `LIKE <path><escape>%` filter
//!   cannot false-positive on sibling names sharing a prefix.
//! - [`LtreePathCodec`]: PostgreSQL `ltree` with native `<@`/`@>` operators.
//!
//! Both must produce identical query results for the same logical tree;
//! structural validation uses the pure predicates below, so queries and
//! validation can never disagree on tree shape.

/// Logical path separator.
pub const PATH_SEPARATOR: char = '/';

/// Separator byte used by [`EscapedPathCodec`] in stored keys. As low as
/// possible so a parent always sorts before anything inside its subtree;
/// `\x00` is mishandled by some drivers.
pub const ESCAPE_CHAR: char = '\u{0001}';

/// True if `candidate` is a proper segment-boundary prefix of `path`.
pub fn is_ancestor_of(candidate: &str, path: &str) -> bool {
    path.len() > candidate.len()
        && path.starts_with(candidate)
        && path[candidate.len()..].starts_with(PATH_SEPARATOR)
}

/// True if `path` lies strictly inside the subtree rooted at `candidate`.
pub fn is_descendant_of(path: &str, candidate: &str) -> bool {
    is_ancestor_of(candidate, path)
}

/// Last slug segment of a logical path.
pub fn last_segment(path: &str) -> &str {
    path.rsplit(PATH_SEPARATOR).next().unwrap_or(path)
}

/// Parent path, or `None` for a top-level term.
pub fn parent_path(path: &str) -> Option<&str> {
    path.rfind(PATH_SEPARATOR).map(|idx| &path[..idx])
}

/// Depth of a path: number of segments minus one (top-level terms are 0).
pub fn level_of(path: &str) -> i32 {
    path.matches(PATH_SEPARATOR).count() as i32
}

/// Encoding strategy between logical paths and stored keys, including the
/// SQL predicates repositories compose into dynamic queries.
///
/// Predicate builders receive the column expression and the index of the
/// first `$n` bind parameter they may consume; the matching `*_binds`
/// method returns the values to bind, in order.
pub trait PathCodec: Send + Sync {
    /// Encode a logical path into its stored key.
    fn encode(&self, path: &str) -> String;

    /// Decode a stored key back into the logical path.
    fn decode(&self, stored: &str) -> String;

    /// Predicate: `column` equals the bound path.
    fn eq_predicate(&self, column: &str, first_param: usize) -> String;

    /// Predicate: `column` lies in the subtree rooted at the bound path,
    /// the root itself included.
    fn descendant_predicate(&self, column: &str, first_param: usize) -> String;

    /// Bind values for [`Self::descendant_predicate`].
    fn descendant_binds(&self, path: &str) -> Vec<String>;

    /// Predicate: `column` is an ancestor of the bound path, the bound
    /// path itself included.
    fn ancestor_predicate(&self, column: &str, first_param: usize) -> String;

    /// Bind values for [`Self::ancestor_predicate`].
    fn ancestor_binds(&self, path: &str) -> Vec<String>;
}

/// Portable codec: `/` becomes [`ESCAPE_CHAR`] in a `TEXT` column.
///
/// Slugs are restricted to `[a-z0-9-]`, so stored keys contain no LIKE
/// metacharacters and patterns need no escaping.
#[derive(Debug, Clone, Copy, Default)]
pub struct EscapedPathCodec;

impl PathCodec for EscapedPathCodec {
    fn encode(&self, path: &str) -> String {
        path.replace(PATH_SEPARATOR, &ESCAPE_CHAR.to_string())
    }

    fn decode(&self, stored: &str) -> String {
        stored.replace(ESCAPE_CHAR, &PATH_SEPARATOR.to_string())
    }

    fn eq_predicate(&self, column: &str, first_param: usize) -> String {
        format!("{column} = ${first_param}")
    }

    fn descendant_predicate(&self, column: &str, first_param: usize) -> String {
        format!(
            "({column} = ${first_param} OR {column} LIKE ${})",
            first_param + 1
        )
    }

    fn descendant_binds(&self, path: &str) -> Vec<String> {
        let encoded = self.encode(path);
        let pattern = format!("{encoded}{ESCAPE_CHAR}%");
        vec![encoded, pattern]
    }

    fn ancestor_predicate(&self, column: &str, first_param: usize) -> String {
        // Reverse LIKE: the bound path matches `column || escape || '%'`
        // exactly when `column` is a proper segment-boundary prefix.
        format!(
            "({column} = ${first_param} OR ${} LIKE ({column} || ${}))",
            first_param + 1,
            first_param + 2
        )
    }

    fn ancestor_binds(&self, path: &str) -> Vec<String> {
        let encoded = self.encode(path);
        vec![encoded.clone(), encoded, format!("{ESCAPE_CHAR}%")]
    }
}

/// PostgreSQL `ltree` codec: `/` becomes `.` and `-` becomes `_` (ltree
/// labels do not allow hyphens). Slugs never contain `_` by construction,
/// so the mapping is lossless.
#[derive(Debug, Clone, Copy, Default)]
pub struct LtreePathCodec;

impl PathCodec for LtreePathCodec {
    fn encode(&self, path: &str) -> String {
        path.replace(PATH_SEPARATOR, ".").replace('-', "_")
    }

    fn decode(&self, stored: &str) -> String {
        stored.replace('.', &PATH_SEPARATOR.to_string()).replace('_', "-")
    }

    fn eq_predicate(&self, column: &str, first_param: usize) -> String {
        format!("{column} = ${first_param}::ltree")
    }

    fn descendant_predicate(&self, column: &str, first_param: usize) -> String {
        format!("{column} <@ ${first_param}::ltree")
    }

    fn descendant_binds(&self, path: &str) -> Vec<String> {
        vec![self.encode(path)]
    }

    fn ancestor_predicate(&self, column: &str, first_param: usize) -> String {
        format!("{column} @> ${first_param}::ltree")
    }

    fn ancestor_binds(&self, path: &str) -> Vec<String> {
        vec![self.encode(path)]
    }
}
