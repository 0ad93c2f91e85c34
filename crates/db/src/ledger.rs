//! Project hour ledger engine.
//!
//! Every write locks the project row (`SELECT ... FOR UPDATE`), decides with
//! [`simdesk_core::hours::evaluate`], appends one immutable row to
//! `project_hour_transactions`, and moves the project's balance, all in one
//! database transaction. The row lock serializes writers per project, so two
//! concurrent allocations can never both read the same `balance_before`.
//!
//! Operations run in a [`UnitOfWork`]: either the engine owns the
//! transaction, or it joins one the caller already holds so a ledger write
//! commits together with the caller's own writes.
//!
//! Hour quantities must fit the `NUMERIC(10, 2)` columns exactly; anything
//! Postgres would round or overflow is a `PreconditionFailed`.
//!
//! Failures come back as [`LedgerError`] values; raw `sqlx` errors are
//! logged, the owned transaction is rolled back, and the caller sees
//! [`LedgerError::Unexpected`].

use std::time::Duration;

use serde::Serialize;
use simdesk_core::hours::{
    completion_delta, evaluate, require_non_negative, require_positive, require_storable,
    require_text, Actor, AllocationPolicy, HourTransactionType, LedgerError, LedgerResult,
};
use simdesk_core::pagination::{
    clamp_limit, clamp_offset, DEFAULT_HISTORY_LIMIT, MAX_HISTORY_LIMIT,
};
use simdesk_core::status::ProjectStatus;
use simdesk_core::types::{DbId, Hours};
use sqlx::{PgConnection, PgPool, Postgres, Transaction};

use crate::models::hour_transaction::{CreateHourTransaction, HourTransactionEntry};
use crate::models::project::Project;
use crate::repositories::{HourTransactionRepo, ProjectRepo};

// ---------------------------------------------------------------------------
// Unit of work
// ---------------------------------------------------------------------------

/// Transactional context a ledger write runs in.
pub enum UnitOfWork<'c> {
    /// The engine begins, commits, and rolls back its own transaction.
    Pool(&'c PgPool),
    /// The engine joins a transaction owned by the caller and never commits
    /// or rolls it back. Pass `&mut *tx` for a `sqlx::Transaction`.
    ///
    /// A rejected operation writes nothing, so the caller may still commit
    /// its other work. After [`LedgerError::Unexpected`] the transaction is
    /// unusable and the caller must roll back.
    Transaction(&'c mut PgConnection),
}

// ---------------------------------------------------------------------------
// Inputs and outputs
// ---------------------------------------------------------------------------

/// Parameters for [`HourLedger::record_transaction`].
#[derive(Debug, Clone)]
pub struct RecordHours {
    pub project_id: DbId,
    pub request_id: Option<DbId>,
    pub transaction_type: HourTransactionType,
    /// Signed: positive consumes budget, negative returns it.
    pub hours: Hours,
    pub actor: Actor,
    pub notes: Option<String>,
}

/// Outcome of a successful ledger write.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LedgerReceipt {
    pub transaction_id: DbId,
    pub project_id: DbId,
    pub balance_before: Hours,
    pub balance_after: Hours,
    pub total_hours: Hours,
    pub available_hours: Hours,
}

/// Read-only availability preview. See [`HourLedger::check_availability`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HourAvailability {
    pub available: bool,
    pub requested_hours: Hours,
    pub current_available: Hours,
    pub total_hours: Hours,
    pub used_hours: Hours,
    pub status: ProjectStatus,
}

/// One page of a project's ledger history.
#[derive(Debug, Clone, Serialize)]
pub struct HourHistoryPage {
    pub transactions: Vec<HourTransactionEntry>,
    pub total: i64,
}

/// Comparison of the stored balance against the sum of the ledger rows.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LedgerReconciliation {
    pub project_id: DbId,
    pub used_hours: Hours,
    pub ledger_hours: Hours,
    pub consistent: bool,
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// The hour ledger. Cheap to clone; holds only configuration.
#[derive(Debug, Clone, Default)]
pub struct HourLedger {
    policy: AllocationPolicy,
    lock_timeout: Option<Duration>,
}

impl HourLedger {
    pub fn new(policy: AllocationPolicy) -> Self {
        Self {
            policy,
            lock_timeout: None,
        }
    }

    /// Bound how long an owned transaction waits for the project row lock.
    /// A wait that times out fails with [`LedgerError::Unexpected`].
    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = Some(timeout);
        self
    }

    pub fn policy(&self) -> &AllocationPolicy {
        &self.policy
    }

    // ── Core write path ──────────────────────────────────────────────

    /// Apply a signed change to a project's `used_hours` and append the
    /// matching transaction row.
    pub async fn record_transaction(
        &self,
        uow: UnitOfWork<'_>,
        params: &RecordHours,
    ) -> LedgerResult<LedgerReceipt> {
        require_storable(params.hours, "hours")?;
        require_text(&params.actor.name, "performed_by_name")?;

        match uow {
            UnitOfWork::Pool(pool) => {
                let mut tx = self.begin(pool).await?;
                let outcome = self.apply(&mut *tx, params).await;
                finish(tx, outcome).await
            }
            UnitOfWork::Transaction(conn) => self.apply(conn, params).await,
        }
    }

    async fn apply(
        &self,
        conn: &mut PgConnection,
        params: &RecordHours,
    ) -> LedgerResult<LedgerReceipt> {
        let project = lock_project(conn, params.project_id).await?;

        let change = evaluate(&project.budget(), params.hours, &self.policy).inspect_err(|err| {
            tracing::warn!(
                project_id = params.project_id,
                transaction_type = %params.transaction_type,
                hours = %params.hours,
                error = %err,
                "Hour ledger rejected transaction"
            );
        })?;

        let row = HourTransactionRepo::insert(
            &mut *conn,
            &CreateHourTransaction {
                project_id: project.id,
                request_id: params.request_id,
                transaction_type: params.transaction_type,
                hours: params.hours,
                balance_before: change.balance_before,
                balance_after: change.balance_after,
                performed_by: params.actor.id,
                performed_by_name: params.actor.name.clone(),
                notes: params.notes.clone(),
            },
        )
        .await
        .map_err(|e| unexpected("insert hour transaction", e))?;

        ProjectRepo::set_used_hours(&mut *conn, project.id, change.balance_after)
            .await
            .map_err(|e| unexpected("update used hours", e))?;

        tracing::info!(
            project_id = project.id,
            transaction_id = row.id,
            transaction_type = %params.transaction_type,
            hours = %params.hours,
            balance_after = %change.balance_after,
            "Hour ledger transaction recorded"
        );

        Ok(LedgerReceipt {
            transaction_id: row.id,
            project_id: project.id,
            balance_before: change.balance_before,
            balance_after: change.balance_after,
            total_hours: project.total_hours,
            available_hours: project.total_hours - change.balance_after,
        })
    }

    // ── Derived writes ───────────────────────────────────────────────

    /// Commit `hours` of the project budget to a request.
    pub async fn allocate(
        &self,
        uow: UnitOfWork<'_>,
        project_id: DbId,
        request_id: DbId,
        hours: Hours,
        actor: &Actor,
    ) -> LedgerResult<LedgerReceipt> {
        require_positive(hours, "hours")?;
        self.record_transaction(
            uow,
            &RecordHours {
                project_id,
                request_id: Some(request_id),
                transaction_type: HourTransactionType::Allocation,
                hours,
                actor: actor.clone(),
                notes: Some(format!("Allocated {} hours", hours.normalize())),
            },
        )
        .await
    }

    /// Return `hours` previously allocated to a request.
    pub async fn deallocate(
        &self,
        uow: UnitOfWork<'_>,
        project_id: DbId,
        request_id: DbId,
        hours: Hours,
        actor: &Actor,
        reason: &str,
    ) -> LedgerResult<LedgerReceipt> {
        require_positive(hours, "hours")?;
        self.record_transaction(
            uow,
            &RecordHours {
                project_id,
                request_id: Some(request_id),
                transaction_type: HourTransactionType::Deallocation,
                hours: -hours,
                actor: actor.clone(),
                notes: non_blank(reason),
            },
        )
        .await
    }

    /// Manual signed correction of `used_hours`, not tied to a request.
    pub async fn adjust(
        &self,
        uow: UnitOfWork<'_>,
        project_id: DbId,
        hours: Hours,
        actor: &Actor,
        reason: &str,
    ) -> LedgerResult<LedgerReceipt> {
        require_text(reason, "reason")?;
        if hours.is_zero() {
            return Err(LedgerError::PreconditionFailed(
                "hours must be non-zero for an adjustment".to_string(),
            ));
        }
        self.record_transaction(
            uow,
            &RecordHours {
                project_id,
                request_id: None,
                transaction_type: HourTransactionType::Adjustment,
                hours,
                actor: actor.clone(),
                notes: non_blank(reason),
            },
        )
        .await
    }

    /// Reconcile a closing request's allocated hours against its actual hours.
    ///
    /// Unused hours go back to the budget; an overrun is charged (and, being a
    /// positive movement, needs an allocatable project status). Returns
    /// `Ok(None)` without touching the database when the two match.
    pub async fn finalize_on_completion(
        &self,
        uow: UnitOfWork<'_>,
        project_id: DbId,
        request_id: DbId,
        allocated_hours: Hours,
        actual_hours: Hours,
        actor: &Actor,
    ) -> LedgerResult<Option<LedgerReceipt>> {
        require_non_negative(allocated_hours, "allocated_hours")?;
        require_non_negative(actual_hours, "actual_hours")?;
        require_storable(allocated_hours, "allocated_hours")?;
        require_storable(actual_hours, "actual_hours")?;

        let Some(delta) = completion_delta(allocated_hours, actual_hours) else {
            tracing::debug!(project_id, request_id, "Completion with no hour difference");
            return Ok(None);
        };

        let receipt = self
            .record_transaction(
                uow,
                &RecordHours {
                    project_id,
                    request_id: Some(request_id),
                    transaction_type: HourTransactionType::Completion,
                    hours: delta,
                    actor: actor.clone(),
                    notes: Some(format!(
                        "Request completed: allocated {}, actual {}",
                        allocated_hours.normalize(),
                        actual_hours.normalize()
                    )),
                },
            )
            .await?;
        Ok(Some(receipt))
    }

    /// Grow a project's budget ceiling by `additional_hours`.
    ///
    /// Does not pass through the balance decision: usage is unchanged, and
    /// the recorded row has `balance_before == balance_after`.
    pub async fn extend(
        &self,
        uow: UnitOfWork<'_>,
        project_id: DbId,
        additional_hours: Hours,
        actor: &Actor,
        reason: &str,
    ) -> LedgerResult<LedgerReceipt> {
        require_positive(additional_hours, "additional_hours")?;
        require_storable(additional_hours, "additional_hours")?;
        require_text(reason, "reason")?;
        require_text(&actor.name, "performed_by_name")?;

        match uow {
            UnitOfWork::Pool(pool) => {
                let mut tx = self.begin(pool).await?;
                let outcome =
                    apply_extension(&mut *tx, project_id, additional_hours, actor, reason).await;
                finish(tx, outcome).await
            }
            UnitOfWork::Transaction(conn) => {
                apply_extension(conn, project_id, additional_hours, actor, reason).await
            }
        }
    }

    // ── Queries ──────────────────────────────────────────────────────

    /// A page of the project's transactions, newest first, plus the total
    /// row count. `limit` defaults to 50 and is capped at 200.
    pub async fn history(
        &self,
        pool: &PgPool,
        project_id: DbId,
        limit: Option<i64>,
        offset: Option<i64>,
    ) -> LedgerResult<HourHistoryPage> {
        find_project(pool, project_id).await?;

        let limit = clamp_limit(limit, DEFAULT_HISTORY_LIMIT, MAX_HISTORY_LIMIT);
        let offset = clamp_offset(offset);

        let transactions = HourTransactionRepo::list_for_project(pool, project_id, limit, offset)
            .await
            .map_err(|e| unexpected("list hour transactions", e))?;
        let total = HourTransactionRepo::count_for_project(pool, project_id)
            .await
            .map_err(|e| unexpected("count hour transactions", e))?;

        Ok(HourHistoryPage {
            transactions,
            total,
        })
    }

    /// Hours currently tied up by a request, rebuilt from its transactions.
    pub async fn allocated_for_request(
        &self,
        pool: &PgPool,
        project_id: DbId,
        request_id: DbId,
    ) -> LedgerResult<Hours> {
        HourTransactionRepo::sum_for_request(pool, project_id, request_id)
            .await
            .map_err(|e| unexpected("sum request hours", e))
    }

    /// Preview whether `requested_hours` could be allocated right now.
    ///
    /// This is not a reservation. Nothing is locked, so another writer may
    /// consume the hours before a following [`allocate`](Self::allocate);
    /// callers must still handle that call failing.
    pub async fn check_availability(
        &self,
        pool: &PgPool,
        project_id: DbId,
        requested_hours: Hours,
    ) -> LedgerResult<HourAvailability> {
        let project = find_project(pool, project_id).await?;
        let current_available = project.available_hours();

        Ok(HourAvailability {
            available: current_available >= requested_hours && self.policy.allows(project.status),
            requested_hours,
            current_available,
            total_hours: project.total_hours,
            used_hours: project.used_hours,
            status: project.status,
        })
    }

    /// Compare `used_hours` with the sum of the project's usage rows.
    pub async fn reconcile(
        &self,
        pool: &PgPool,
        project_id: DbId,
    ) -> LedgerResult<LedgerReconciliation> {
        let project = find_project(pool, project_id).await?;
        let ledger_hours = HourTransactionRepo::sum_usage_for_project(pool, project_id)
            .await
            .map_err(|e| unexpected("sum project hours", e))?;

        let consistent = ledger_hours == project.used_hours;
        if !consistent {
            tracing::error!(
                project_id,
                used_hours = %project.used_hours,
                ledger_hours = %ledger_hours,
                "Project used hours disagree with hour ledger"
            );
        }

        Ok(LedgerReconciliation {
            project_id,
            used_hours: project.used_hours,
            ledger_hours,
            consistent,
        })
    }

    // ── Transaction plumbing ─────────────────────────────────────────

    async fn begin(&self, pool: &PgPool) -> LedgerResult<Transaction<'static, Postgres>> {
        let mut tx = pool
            .begin()
            .await
            .map_err(|e| unexpected("begin transaction", e))?;

        if let Some(timeout) = self.lock_timeout {
            // SET does not take bind parameters; the value is an integer.
            let statement = format!("SET LOCAL lock_timeout = {}", timeout.as_millis());
            if let Err(e) = sqlx::query(&statement).execute(&mut *tx).await {
                let err = unexpected("set lock timeout", e);
                return finish(tx, Err(err)).await;
            }
        }

        Ok(tx)
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

async fn apply_extension(
    conn: &mut PgConnection,
    project_id: DbId,
    additional_hours: Hours,
    actor: &Actor,
    reason: &str,
) -> LedgerResult<LedgerReceipt> {
    let project = lock_project(conn, project_id).await?;
    let total_hours = project.total_hours + additional_hours;
    require_storable(total_hours, "total_hours")?;

    ProjectRepo::set_total_hours(&mut *conn, project.id, total_hours)
        .await
        .map_err(|e| unexpected("update total hours", e))?;

    let row = HourTransactionRepo::insert(
        &mut *conn,
        &CreateHourTransaction {
            project_id: project.id,
            request_id: None,
            transaction_type: HourTransactionType::Extension,
            hours: additional_hours,
            balance_before: project.used_hours,
            balance_after: project.used_hours,
            performed_by: actor.id,
            performed_by_name: actor.name.clone(),
            notes: non_blank(reason),
        },
    )
    .await
    .map_err(|e| unexpected("insert extension transaction", e))?;

    tracing::info!(
        project_id = project.id,
        transaction_id = row.id,
        additional_hours = %additional_hours,
        total_hours = %total_hours,
        "Project hour budget extended"
    );

    Ok(LedgerReceipt {
        transaction_id: row.id,
        project_id: project.id,
        balance_before: project.used_hours,
        balance_after: project.used_hours,
        total_hours,
        available_hours: total_hours - project.used_hours,
    })
}

/// Lock the project row, mapping a missing row to `NotFound`.
async fn lock_project(conn: &mut PgConnection, project_id: DbId) -> LedgerResult<Project> {
    ProjectRepo::find_for_update(conn, project_id)
        .await
        .map_err(|e| unexpected("lock project", e))?
        .ok_or(LedgerError::NotFound { project_id })
}

async fn find_project(pool: &PgPool, project_id: DbId) -> LedgerResult<Project> {
    ProjectRepo::find_by_id(pool, project_id)
        .await
        .map_err(|e| unexpected("load project", e))?
        .ok_or(LedgerError::NotFound { project_id })
}

/// Commit on success, roll back on any failure.
async fn finish<T>(
    tx: Transaction<'static, Postgres>,
    outcome: LedgerResult<T>,
) -> LedgerResult<T> {
    match outcome {
        Ok(value) => {
            tx.commit().await.map_err(|e| unexpected("commit", e))?;
            Ok(value)
        }
        Err(err) => {
            if let Err(rollback_err) = tx.rollback().await {
                tracing::warn!(error = %rollback_err, "Hour ledger rollback failed");
            }
            Err(err)
        }
    }
}

/// Log a persistence failure and hide it behind `LedgerError::Unexpected`.
fn unexpected(context: &str, err: sqlx::Error) -> LedgerError {
    tracing::error!(error = %err, context, "Hour ledger database error");
    LedgerError::Unexpected(format!("{context} failed"))
}

fn non_blank(text: &str) -> Option<String> {
    let trimmed = text.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}
