//! Pure domain logic for simdesk.
//!
//! This crate has no database or HTTP dependencies so that the rules it
//! encodes (hour-ledger decisions, status sets, role names) can be shared by
//! the repository layer, the API layer, and their tests.

pub mod error;
pub mod hours;
pub mod pagination;
pub mod roles;
pub mod status;
pub mod types;
