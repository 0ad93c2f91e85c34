//! Shared query parameter types for API handlers.

use serde::Deserialize;
use simdesk_core::types::Hours;

/// Generic pagination parameters (`?limit=&offset=`).
///
/// Values are clamped by the ledger via `clamp_limit` / `clamp_offset`.
#[derive(Debug, Deserialize)]
pub struct PaginationParams {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// `?hours=N` for the availability preview.
#[derive(Debug, Deserialize)]
pub struct HoursParams {
    pub hours: Hours,
}
