/// All database primary keys are PostgreSQL BIGSERIAL.
pub type DbId = i64;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// Hour quantities (budgets, balances, deltas) are exact decimals.
pub type Hours = rust_decimal::Decimal;
