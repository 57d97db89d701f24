//! Filtered selection builder for media-index queries.
//!
//! Builds the WHERE clause and bound arguments for a catalog query from
//! the caller's predicate, the active path filters, and the minimum
//! duration threshold. Building is pure; execution lives in
//! [`crate::media_index`].

/// Base predicate restricting the index to music rows.
pub const IS_MUSIC: &str = "is_music = 1";

/// Canonical catalog order used for cache rebuilds.
pub const CANONICAL_ORDER: &str = "id ASC";

/// Largest number of bound parameters spent on one IN() predicate.
/// SQLite's default host-parameter ceiling is 999; one slot is kept
/// free for an extra bound value alongside the list.
pub const MAX_BOUND_PATHS: usize = 998;

/// Point-in-time view of the active path filters and duration floor.
#[derive(Debug, Clone, Default)]
pub struct FilterSnapshot {
    /// Whitelist mode ignores the blacklist entirely.
    pub whitelist_mode: bool,
    pub whitelist: Vec<String>,
    pub blacklist: Vec<String>,
    pub min_duration_ms: i64,
}

/// A ready-to-issue selection: WHERE clause, bound args, ORDER BY key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogSelection {
    /// `None` means no WHERE clause at all.
    pub clause: Option<String>,
    pub args: Vec<String>,
    pub order_by: String,
}

/// Builds the selection for a catalog query.
///
/// Returns `None` when whitelist mode is active with an empty whitelist:
/// the query must not be issued at all and yields zero songs (fail-closed).
/// With `ignore_filters` only the caller's predicate is used.
pub fn build_selection(
    extra_clause: Option<&str>,
    extra_args: &[String],
    filter: &FilterSnapshot,
    order_by: &str,
    ignore_filters: bool,
) -> Option<CatalogSelection> {
    let mut args: Vec<String> = extra_args.to_vec();

    if ignore_filters {
        return Some(CatalogSelection {
            clause: extra_clause
                .filter(|clause| !clause.trim().is_empty())
                .map(str::to_string),
            args,
            order_by: order_by.to_string(),
        });
    }

    let mut clause = match extra_clause {
        Some(extra) if !extra.trim().is_empty() => format!("{} AND {}", IS_MUSIC, extra),
        _ => IS_MUSIC.to_string(),
    };

    if filter.whitelist_mode {
        if filter.whitelist.is_empty() {
            return None;
        }
        clause.push_str(" AND (");
        for (index, prefix) in filter.whitelist.iter().enumerate() {
            if index > 0 {
                clause.push_str(" OR ");
            }
            clause.push_str("path LIKE ?");
            args.push(format!("{}%", prefix));
        }
        clause.push(')');
    } else {
        for prefix in &filter.blacklist {
            clause.push_str(" AND path NOT LIKE ?");
            args.push(format!("{}%", prefix));
        }
    }

    clause.push_str(&format!(" AND duration_ms >= {}", filter.min_duration_ms));

    Some(CatalogSelection {
        clause: Some(clause),
        args,
        order_by: order_by.to_string(),
    })
}

/// Builds a `path IN (?, ?, ...)` predicate for `count` bound paths.
/// `count` must be between 1 and [`MAX_BOUND_PATHS`].
pub fn path_in_clause(count: usize) -> String {
    debug_assert!(count >= 1 && count <= MAX_BOUND_PATHS);
    let mut clause = String::from("path IN (?");
    for _ in 1..count {
        clause.push_str(",?");
    }
    clause.push(')');
    clause
}
