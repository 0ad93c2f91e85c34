//! Repository for the append-only `project_hour_transactions` table.
//!
//! There are no update or delete methods: ledger rows are immutable and the
//! table rejects updates at the database level.

use simdesk_core::hours::TX_EXTENSION;
use simdesk_core::types::{DbId, Hours};
use sqlx::{PgConnection, PgPool};

use crate::models::hour_transaction::{
    CreateHourTransaction, HourTransaction, HourTransactionEntry,
};

/// Column list for `project_hour_transactions` SELECT queries.
const COLUMNS: &str = "\
    id, project_id, request_id, transaction_type, hours, \
    balance_before, balance_after, performed_by, performed_by_name, \
    notes, created_at";

/// Same columns qualified with the `t.` alias, for joined queries.
const QUALIFIED_COLUMNS: &str = "\
    t.id, t.project_id, t.request_id, t.transaction_type, t.hours, \
    t.balance_before, t.balance_after, t.performed_by, t.performed_by_name, \
    t.notes, t.created_at";

/// Provides insert and query operations for hour transactions.
pub struct HourTransactionRepo;

impl HourTransactionRepo {
    /// Append a transaction row on the caller's transaction.
    pub async fn insert(
        conn: &mut PgConnection,
        input: &CreateHourTransaction,
    ) -> Result<HourTransaction, sqlx::Error> {
        let query = format!(
            "INSERT INTO project_hour_transactions
                (project_id, request_id, transaction_type, hours, balance_before,
                 balance_after, performed_by, performed_by_name, notes)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, HourTransaction>(&query)
            .bind(input.project_id)
            .bind(input.request_id)
            .bind(input.transaction_type.as_str())
            .bind(input.hours)
            .bind(input.balance_before)
            .bind(input.balance_after)
            .bind(input.performed_by)
            .bind(&input.performed_by_name)
            .bind(&input.notes)
            .fetch_one(&mut *conn)
            .await
    }

    /// Page through a project's transactions, newest first, with the title of
    /// the originating request when there is one.
    pub async fn list_for_project(
        pool: &PgPool,
        project_id: DbId,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<HourTransactionEntry>, sqlx::Error> {
        let query = format!(
            "SELECT {QUALIFIED_COLUMNS}, r.title AS request_title
             FROM project_hour_transactions t
             LEFT JOIN simulation_requests r ON r.id = t.request_id
             WHERE t.project_id = $1
             ORDER BY t.created_at DESC, t.id DESC
             LIMIT $2 OFFSET $3"
        );
        sqlx::query_as::<_, HourTransactionEntry>(&query)
            .bind(project_id)
            .bind(limit)
            .bind(offset)
            .fetch_all(pool)
            .await
    }

    /// Count a project's transactions (for pagination metadata).
    pub async fn count_for_project(pool: &PgPool, project_id: DbId) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*)::BIGINT FROM project_hour_transactions WHERE project_id = $1",
        )
        .bind(project_id)
        .fetch_one(pool)
        .await
    }

    /// Net hours currently tied up by a request: the sum of every usage
    /// movement recorded against the `(project, request)` pair.
    pub async fn sum_for_request(
        pool: &PgPool,
        project_id: DbId,
        request_id: DbId,
    ) -> Result<Hours, sqlx::Error> {
        sqlx::query_scalar::<_, Hours>(
            "SELECT COALESCE(SUM(hours), 0) FROM project_hour_transactions
             WHERE project_id = $1 AND request_id = $2 AND transaction_type <> $3",
        )
        .bind(project_id)
        .bind(request_id)
        .bind(TX_EXTENSION)
        .fetch_one(pool)
        .await
    }

    /// Sum of every usage movement on a project. Equals `projects.used_hours`
    /// when the ledger is consistent.
    pub async fn sum_usage_for_project(
        pool: &PgPool,
        project_id: DbId,
    ) -> Result<Hours, sqlx::Error> {
        sqlx::query_scalar::<_, Hours>(
            "SELECT COALESCE(SUM(hours), 0) FROM project_hour_transactions
             WHERE project_id = $1 AND transaction_type <> $2",
        )
        .bind(project_id)
        .bind(TX_EXTENSION)
        .fetch_one(pool)
        .await
    }
}
