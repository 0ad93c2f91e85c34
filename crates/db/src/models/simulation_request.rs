//! Simulation request entity model and DTOs.

use serde::{Deserialize, Serialize};
use simdesk_core::types::{DbId, Hours, Timestamp};
use sqlx::FromRow;

/// A row from the `simulation_requests` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct SimulationRequest {
    pub id: DbId,
    pub project_id: DbId,
    pub title: String,
    pub description: Option<String>,
    pub assigned_to: Option<DbId>,
    pub allocated_hours: Option<Hours>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// DTO for submitting a new simulation request.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateSimulationRequest {
    pub title: String,
    pub description: Option<String>,
}
