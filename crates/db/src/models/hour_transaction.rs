//! Hour-ledger transaction models (append-only, no `updated_at`).

use serde::Serialize;
use simdesk_core::hours::HourTransactionType;
use simdesk_core::types::{DbId, Hours, Timestamp};
use sqlx::FromRow;

/// A row from `project_hour_transactions`. Immutable once created.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct HourTransaction {
    pub id: DbId,
    pub project_id: DbId,
    pub request_id: Option<DbId>,
    #[sqlx(try_from = "String")]
    pub transaction_type: HourTransactionType,
    pub hours: Hours,
    pub balance_before: Hours,
    pub balance_after: Hours,
    pub performed_by: Option<DbId>,
    pub performed_by_name: String,
    pub notes: Option<String>,
    pub created_at: Timestamp,
}

/// A history entry: the transaction plus the originating request's title.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct HourTransactionEntry {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub transaction: HourTransaction,
    pub request_title: Option<String>,
}

/// Insert DTO. Only the ledger engine builds these, after the balance
/// decision has been made under the project row lock.
#[derive(Debug, Clone)]
pub struct CreateHourTransaction {
    pub project_id: DbId,
    pub request_id: Option<DbId>,
    pub transaction_type: HourTransactionType,
    pub hours: Hours,
    pub balance_before: Hours,
    pub balance_after: Hours,
    pub performed_by: Option<DbId>,
    pub performed_by_name: String,
    pub notes: Option<String>,
}
