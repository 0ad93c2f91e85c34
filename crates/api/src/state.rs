use std::sync::Arc;

use simdesk_db::ledger::HourLedger;

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// Cheaply cloneable (inner data is behind `Arc` or is already `Clone`).
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool.
    pub pool: simdesk_db::DbPool,
    /// Server configuration (JWT secret for the auth extractors).
    pub config: Arc<ServerConfig>,
    /// The project hour ledger, configured from `config`.
    pub ledger: Arc<HourLedger>,
}

impl AppState {
    /// Build state from a pool and config, deriving the ledger from the
    /// config's allocation policy and lock timeout.
    pub fn new(pool: simdesk_db::DbPool, config: ServerConfig) -> Self {
        let mut ledger = HourLedger::new(config.allocation_policy.clone());
        if let Some(timeout) = config.ledger_lock_timeout {
            ledger = ledger.with_lock_timeout(timeout);
        }

        Self {
            pool,
            config: Arc::new(config),
            ledger: Arc::new(ledger),
        }
    }
}
