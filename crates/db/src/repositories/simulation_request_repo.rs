//! Repository for the `simulation_requests` table.

use simdesk_core::types::{DbId, Hours};
use sqlx::{PgConnection, PgPool};

use crate::models::simulation_request::{CreateSimulationRequest, SimulationRequest};

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str = "id, project_id, title, description, assigned_to, allocated_hours, \
    created_at, updated_at";

/// Provides create/read operations for simulation requests and the
/// assignment write used alongside an hour allocation.
pub struct SimulationRequestRepo;

impl SimulationRequestRepo {
    /// Insert a new request under `project_id`, returning the created row.
    pub async fn create(
        pool: &PgPool,
        project_id: DbId,
        input: &CreateSimulationRequest,
    ) -> Result<SimulationRequest, sqlx::Error> {
        let query = format!(
            "INSERT INTO simulation_requests (project_id, title, description)
             VALUES ($1, $2, $3)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, SimulationRequest>(&query)
            .bind(project_id)
            .bind(&input.title)
            .bind(&input.description)
            .fetch_one(pool)
            .await
    }

    /// Find a request by ID, scoped to its project.
    pub async fn find_by_id(
        pool: &PgPool,
        project_id: DbId,
        id: DbId,
    ) -> Result<Option<SimulationRequest>, sqlx::Error> {
        let query =
            format!("SELECT {COLUMNS} FROM simulation_requests WHERE id = $1 AND project_id = $2");
        sqlx::query_as::<_, SimulationRequest>(&query)
            .bind(id)
            .bind(project_id)
            .fetch_optional(pool)
            .await
    }

    /// List a project's requests, newest first.
    pub async fn list_by_project(
        pool: &PgPool,
        project_id: DbId,
    ) -> Result<Vec<SimulationRequest>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM simulation_requests
             WHERE project_id = $1
             ORDER BY created_at DESC, id DESC"
        );
        sqlx::query_as::<_, SimulationRequest>(&query)
            .bind(project_id)
            .fetch_all(pool)
            .await
    }

    /// Record the assigned engineer and the hours reserved for the request.
    ///
    /// Runs on the caller's transaction so it commits or rolls back together
    /// with the matching ledger allocation. Returns `None` if the request does
    /// not exist under `project_id`.
    pub async fn assign(
        conn: &mut PgConnection,
        project_id: DbId,
        id: DbId,
        engineer_id: DbId,
        allocated_hours: Hours,
    ) -> Result<Option<SimulationRequest>, sqlx::Error> {
        let query = format!(
            "UPDATE simulation_requests SET
                assigned_to = $3,
                allocated_hours = COALESCE(allocated_hours, 0) + $4,
                updated_at = NOW()
             WHERE id = $1 AND project_id = $2
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, SimulationRequest>(&query)
            .bind(id)
            .bind(project_id)
            .bind(engineer_id)
            .bind(allocated_hours)
            .fetch_optional(&mut *conn)
            .await
    }
}
