//! Handlers for simulation requests nested under a project.
//!
//! Assignment is the one place the HTTP layer composes its own write with a
//! ledger write: both run in a single transaction owned by the handler.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use simdesk_core::error::CoreError;
use simdesk_core::hours::{require_positive, require_storable};
use simdesk_core::types::{DbId, Hours};
use simdesk_db::ledger::{LedgerReceipt, UnitOfWork};
use simdesk_db::models::simulation_request::{CreateSimulationRequest, SimulationRequest};
use simdesk_db::repositories::SimulationRequestRepo;

use crate::error::{AppError, AppResult};
use crate::handlers::project::find_project;
use crate::middleware::rbac::{RequireAuth, RequireManager};
use crate::response::DataResponse;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

/// Body for `POST /projects/{id}/requests/{request_id}/assign`.
#[derive(Debug, Deserialize)]
pub struct AssignRequest {
    pub engineer_id: DbId,
    pub hours: Hours,
}

/// The updated request together with the ledger receipt for its allocation.
#[derive(Debug, Serialize)]
pub struct Assignment {
    pub request: SimulationRequest,
    pub receipt: LedgerReceipt,
}

/// Load a request scoped to its project or fail with 404.
pub(crate) async fn find_request(
    state: &AppState,
    project_id: DbId,
    id: DbId,
) -> AppResult<SimulationRequest> {
    SimulationRequestRepo::find_by_id(&state.pool, project_id, id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "SimulationRequest",
            id,
        }))
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// POST /api/v1/projects/{project_id}/requests
pub async fn create(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    Path(project_id): Path<DbId>,
    Json(input): Json<CreateSimulationRequest>,
) -> AppResult<(StatusCode, Json<DataResponse<SimulationRequest>>)> {
    if input.title.trim().is_empty() {
        return Err(CoreError::Validation("title is required".into()).into());
    }
    find_project(&state, project_id).await?;

    let request = SimulationRequestRepo::create(&state.pool, project_id, &input).await?;
    tracing::info!(
        project_id,
        request_id = request.id,
        user_id = user.user_id,
        "Simulation request created"
    );
    Ok((StatusCode::CREATED, Json(DataResponse { data: request })))
}

/// GET /api/v1/projects/{project_id}/requests
pub async fn list_by_project(
    RequireAuth(_user): RequireAuth,
    State(state): State<AppState>,
    Path(project_id): Path<DbId>,
) -> AppResult<Json<DataResponse<Vec<SimulationRequest>>>> {
    find_project(&state, project_id).await?;
    let requests = SimulationRequestRepo::list_by_project(&state.pool, project_id).await?;
    Ok(Json(DataResponse { data: requests }))
}

/// GET /api/v1/projects/{project_id}/requests/{id}
pub async fn get_by_id(
    RequireAuth(_user): RequireAuth,
    State(state): State<AppState>,
    Path((project_id, id)): Path<(DbId, DbId)>,
) -> AppResult<Json<DataResponse<SimulationRequest>>> {
    let request = find_request(&state, project_id, id).await?;
    Ok(Json(DataResponse { data: request }))
}

/// POST /api/v1/projects/{project_id}/requests/{id}/assign
///
/// Records the engineer and allocates the hours in one transaction. If the
/// ledger rejects the allocation, the assignment is rolled back too.
pub async fn assign(
    RequireManager(user): RequireManager,
    State(state): State<AppState>,
    Path((project_id, id)): Path<(DbId, DbId)>,
    Json(input): Json<AssignRequest>,
) -> AppResult<Json<DataResponse<Assignment>>> {
    require_positive(input.hours, "hours")?;
    require_storable(input.hours, "hours")?;

    let mut tx = state.pool.begin().await?;

    let request =
        SimulationRequestRepo::assign(&mut *tx, project_id, id, input.engineer_id, input.hours)
            .await?
            .ok_or(AppError::Core(CoreError::NotFound {
                entity: "SimulationRequest",
                id,
            }))?;

    // An early return drops `tx`, which rolls it back.
    let receipt = state
        .ledger
        .allocate(
            UnitOfWork::Transaction(&mut *tx),
            project_id,
            id,
            input.hours,
            &user.actor(),
        )
        .await?;

    tx.commit().await?;

    tracing::info!(
        project_id,
        request_id = id,
        engineer_id = input.engineer_id,
        hours = %input.hours,
        "Simulation request assigned"
    );
    Ok(Json(DataResponse {
        data: Assignment { request, receipt },
    }))
}
