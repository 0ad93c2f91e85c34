//! HTTP handlers, one module per resource.

pub mod project;
pub mod project_hours;
pub mod simulation_request;
