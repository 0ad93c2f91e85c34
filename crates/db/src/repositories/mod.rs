//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async query methods.
//! Plain reads and writes accept `&PgPool`; methods that must run inside a
//! transaction the caller already holds accept `&mut PgConnection` (a
//! `sqlx::Transaction` derefs to one).

pub mod hour_transaction_repo;
pub mod project_repo;
pub mod simulation_request_repo;

pub use hour_transaction_repo::HourTransactionRepo;
pub use project_repo::ProjectRepo;
pub use simulation_request_repo::SimulationRequestRepo;
