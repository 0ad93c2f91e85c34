//! Project hour-ledger rules.
//!
//! The ledger tracks a budget per project (`total_hours`) and its current
//! consumption (`used_hours`). Every change is an immutable transaction row
//! carrying the balance before and after. This module holds the parts of that
//! mechanism that need no database: transaction kinds, the error taxonomy,
//! the configurable allocation policy, and [`evaluate`], the decision applied
//! to a locked project row before anything is written.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::status::ProjectStatus;
use crate::types::{DbId, Hours};

// ---------------------------------------------------------------------------
// Transaction types
// ---------------------------------------------------------------------------

pub const TX_ALLOCATION: &str = "allocation";
pub const TX_DEALLOCATION: &str = "deallocation";
pub const TX_ADJUSTMENT: &str = "adjustment";
pub const TX_COMPLETION: &str = "completion";
pub const TX_EXTENSION: &str = "extension";

/// All valid `transaction_type` column values.
pub const VALID_TRANSACTION_TYPES: &[&str] = &[
    TX_ALLOCATION,
    TX_DEALLOCATION,
    TX_ADJUSTMENT,
    TX_COMPLETION,
    TX_EXTENSION,
];

/// Kind of change recorded by a ledger transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HourTransactionType {
    /// Hours committed to a request.
    Allocation,
    /// Hours returned from a request.
    Deallocation,
    /// Manual correction with a rationale.
    Adjustment,
    /// Reconciliation of allocated against actual hours when a request closes.
    Completion,
    /// Growth of the budget ceiling. Does not touch `used_hours`.
    Extension,
}

impl HourTransactionType {
    /// Convert from a database string value.
    pub fn from_str_value(s: &str) -> Result<Self, String> {
        match s {
            TX_ALLOCATION => Ok(Self::Allocation),
            TX_DEALLOCATION => Ok(Self::Deallocation),
            TX_ADJUSTMENT => Ok(Self::Adjustment),
            TX_COMPLETION => Ok(Self::Completion),
            TX_EXTENSION => Ok(Self::Extension),
            _ => Err(format!(
                "Invalid transaction type '{s}'. Must be one of: {}",
                VALID_TRANSACTION_TYPES.join(", ")
            )),
        }
    }

    /// Convert to the database string value.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Allocation => TX_ALLOCATION,
            Self::Deallocation => TX_DEALLOCATION,
            Self::Adjustment => TX_ADJUSTMENT,
            Self::Completion => TX_COMPLETION,
            Self::Extension => TX_EXTENSION,
        }
    }

    /// Whether rows of this type contribute to a project's `used_hours`.
    pub fn affects_usage(self) -> bool {
        match self {
            Self::Allocation | Self::Deallocation | Self::Adjustment | Self::Completion => true,
            Self::Extension => false,
        }
    }
}

impl TryFrom<String> for HourTransactionType {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::from_str_value(&value)
    }
}

impl std::fmt::Display for HourTransactionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Why a ledger operation did not apply.
///
/// Every public ledger operation returns this as a value so callers can
/// branch on the reason and surface the numbers to end users.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LedgerError {
    #[error("Project with id {project_id} not found")]
    NotFound { project_id: DbId },

    #[error("Insufficient hours. Available: {available}, Requested: {requested}")]
    InsufficientBudget { available: Hours, requested: Hours },

    #[error("Cannot deallocate more hours than are used. Used: {used}, Requested: {requested}")]
    NegativeBalance { used: Hours, requested: Hours },

    #[error("Cannot allocate hours to a project with status '{status}'")]
    InvalidProjectState { status: ProjectStatus },

    #[error("{0}")]
    PreconditionFailed(String),

    #[error("Hour ledger operation failed: {0}")]
    Unexpected(String),
}

pub type LedgerResult<T> = Result<T, LedgerError>;

// ---------------------------------------------------------------------------
// Allocation policy
// ---------------------------------------------------------------------------

/// The set of project statuses that accept positive allocations.
///
/// Negative movements (deallocations, refunds on completion) are allowed in
/// any status so hours can always be returned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllocationPolicy {
    allocatable: Vec<ProjectStatus>,
}

impl Default for AllocationPolicy {
    fn default() -> Self {
        Self::new([ProjectStatus::Approved, ProjectStatus::Active])
    }
}

impl AllocationPolicy {
    /// Build a policy from a list of statuses. Duplicates are dropped.
    pub fn new(statuses: impl IntoIterator<Item = ProjectStatus>) -> Self {
        let mut allocatable = Vec::new();
        for status in statuses {
            if !allocatable.contains(&status) {
                allocatable.push(status);
            }
        }
        Self { allocatable }
    }

    /// Parse a comma-separated list of status names, e.g. `"approved,active"`.
    pub fn parse(list: &str) -> Result<Self, CoreError> {
        let statuses = list
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(ProjectStatus::from_str_value)
            .collect::<Result<Vec<_>, _>>()
            .map_err(CoreError::Validation)?;

        if statuses.is_empty() {
            return Err(CoreError::Validation(
                "Allocation policy must name at least one project status".to_string(),
            ));
        }
        Ok(Self::new(statuses))
    }

    pub fn allows(&self, status: ProjectStatus) -> bool {
        self.allocatable.contains(&status)
    }

    pub fn statuses(&self) -> &[ProjectStatus] {
        &self.allocatable
    }
}

// ---------------------------------------------------------------------------
// Balance decision
// ---------------------------------------------------------------------------

/// The budget fields of a project row, read under lock.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BudgetSnapshot {
    pub total_hours: Hours,
    pub used_hours: Hours,
    pub status: ProjectStatus,
}

impl BudgetSnapshot {
    /// Hours still unallocated (`total - used`).
    pub fn available(&self) -> Hours {
        self.total_hours - self.used_hours
    }
}

/// Accepted movement of `used_hours`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BalanceChange {
    pub balance_before: Hours,
    pub balance_after: Hours,
}

/// Decide whether moving `used_hours` by `hours` is allowed.
///
/// Checks run in a fixed order and the first violation wins:
/// 1. the new balance may not exceed `total_hours`;
/// 2. the new balance may not drop below zero;
/// 3. a positive movement requires an allocatable project status.
pub fn evaluate(
    snapshot: &BudgetSnapshot,
    hours: Hours,
    policy: &AllocationPolicy,
) -> LedgerResult<BalanceChange> {
    let balance_before = snapshot.used_hours;
    let balance_after = balance_before + hours;

    if balance_after > snapshot.total_hours {
        return Err(LedgerError::InsufficientBudget {
            available: snapshot.available().normalize(),
            requested: hours.normalize(),
        });
    }

    if balance_after < Decimal::ZERO {
        return Err(LedgerError::NegativeBalance {
            used: balance_before.normalize(),
            requested: (-hours).normalize(),
        });
    }

    if hours > Decimal::ZERO && !policy.allows(snapshot.status) {
        return Err(LedgerError::InvalidProjectState {
            status: snapshot.status,
        });
    }

    Ok(BalanceChange {
        balance_before,
        balance_after,
    })
}

/// Signed movement recorded when a request closes.
///
/// Returns `None` when nothing needs reconciling. Otherwise the delta is
/// `actual - allocated`: negative returns unused hours to the budget,
/// positive charges the overrun.
pub fn completion_delta(allocated: Hours, actual: Hours) -> Option<Hours> {
    if allocated == actual {
        None
    } else {
        Some(actual - allocated)
    }
}

// ---------------------------------------------------------------------------
// Preconditions
// ---------------------------------------------------------------------------

/// Reject zero or negative quantities.
pub fn require_positive(hours: Hours, field: &str) -> LedgerResult<()> {
    if hours <= Decimal::ZERO {
        return Err(LedgerError::PreconditionFailed(format!(
            "{field} must be greater than zero, got {hours}"
        )));
    }
    Ok(())
}

/// Reject negative quantities.
pub fn require_non_negative(hours: Hours, field: &str) -> LedgerResult<()> {
    if hours < Decimal::ZERO {
        return Err(LedgerError::PreconditionFailed(format!(
            "{field} must not be negative, got {hours}"
        )));
    }
    Ok(())
}

/// Decimal places kept by the `NUMERIC(10, 2)` hour columns.
pub const HOURS_SCALE: u32 = 2;

/// Largest magnitude an hour column can hold (`99999999.99`).
pub fn max_storable_hours() -> Hours {
    Decimal::new(9_999_999_999, HOURS_SCALE)
}

/// Reject quantities the hour columns would round or overflow.
///
/// Postgres silently rounds extra decimal places on insert, which would make
/// the stored row disagree with the balance decided here.
pub fn require_storable(hours: Hours, field: &str) -> LedgerResult<()> {
    if hours.normalize().scale() > HOURS_SCALE {
        return Err(LedgerError::PreconditionFailed(format!(
            "{field} allows at most {HOURS_SCALE} decimal places, got {hours}"
        )));
    }
    if hours.abs() > max_storable_hours() {
        return Err(LedgerError::PreconditionFailed(format!(
            "{field} must not exceed {}, got {hours}",
            max_storable_hours()
        )));
    }
    Ok(())
}

/// Reject empty or whitespace-only text.
pub fn require_text(value: &str, field: &str) -> LedgerResult<()> {
    if value.trim().is_empty() {
        return Err(LedgerError::PreconditionFailed(format!(
            "{field} is required"
        )));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Actor attribution
// ---------------------------------------------------------------------------

/// Who performed a ledger operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    /// User id, when the actor is a known user.
    pub id: Option<DbId>,
    /// Display name stored on the transaction row. Required.
    pub name: String,
}

impl Actor {
    pub fn new(id: Option<DbId>, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
