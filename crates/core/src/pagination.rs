//! Limit/offset bounds for paginated listings.

/// Default page size for ledger history listings.
pub const DEFAULT_HISTORY_LIMIT: i64 = 50;

/// Largest page a single ledger history request may return.
pub const MAX_HISTORY_LIMIT: i64 = 200;

/// Clamp a user-provided limit to `[1, max]`, falling back to `default`.
pub fn clamp_limit(limit: Option<i64>, default: i64, max: i64) -> i64 {
    limit.unwrap_or(default).clamp(1, max)
}

/// Clamp a user-provided offset to non-negative.
pub fn clamp_offset(offset: Option<i64>) -> i64 {
    offset.unwrap_or(0).max(0)
}
