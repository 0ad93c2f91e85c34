//! Handlers for a project's hour ledger (`/projects/{id}/hours`).
//!
//! Reads are open to any authenticated user. Every write requires a manager
//! or admin and is attributed to the caller through the token's `sub` and
//! `name` claims.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use simdesk_core::error::CoreError;
use simdesk_core::types::{DbId, Hours};
use simdesk_db::ledger::{
    HourAvailability, HourHistoryPage, LedgerReceipt, LedgerReconciliation, UnitOfWork,
};

use crate::error::AppResult;
use crate::handlers::simulation_request::find_request;
use crate::middleware::rbac::{RequireAuth, RequireManager};
use crate::query::{HoursParams, PaginationParams};
use crate::response::DataResponse;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct AllocateHoursRequest {
    pub request_id: DbId,
    pub hours: Hours,
}

#[derive(Debug, Deserialize)]
pub struct DeallocateHoursRequest {
    pub request_id: DbId,
    pub hours: Hours,
    #[serde(default)]
    pub reason: String,
}

#[derive(Debug, Deserialize)]
pub struct AdjustHoursRequest {
    pub hours: Hours,
    #[serde(default)]
    pub reason: String,
}

#[derive(Debug, Deserialize)]
pub struct ExtendHoursRequest {
    pub additional_hours: Hours,
    #[serde(default)]
    pub reason: String,
}

/// Body for the completion endpoint. When `allocated_hours` is omitted the
/// request's current ledger total is used.
#[derive(Debug, Deserialize)]
pub struct CompleteRequestHours {
    pub request_id: DbId,
    pub allocated_hours: Option<Hours>,
    pub actual_hours: Hours,
}

/// Hours currently tied up by one request.
#[derive(Debug, Serialize)]
pub struct RequestAllocation {
    pub project_id: DbId,
    pub request_id: DbId,
    pub allocated_hours: Hours,
}

// ---------------------------------------------------------------------------
// Reads
// ---------------------------------------------------------------------------

/// GET /api/v1/projects/{id}/hours
pub async fn summary(
    RequireAuth(_user): RequireAuth,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<Json<DataResponse<HourAvailability>>> {
    let summary = state
        .ledger
        .check_availability(&state.pool, id, Decimal::ZERO)
        .await?;
    Ok(Json(DataResponse { data: summary }))
}

/// GET /api/v1/projects/{id}/hours/availability?hours=N
///
/// A preview only; a following allocation may still be rejected.
pub async fn availability(
    RequireAuth(_user): RequireAuth,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
    Query(params): Query<HoursParams>,
) -> AppResult<Json<DataResponse<HourAvailability>>> {
    if params.hours.is_sign_negative() {
        return Err(CoreError::Validation("hours must not be negative".into()).into());
    }
    let availability = state
        .ledger
        .check_availability(&state.pool, id, params.hours)
        .await?;
    Ok(Json(DataResponse { data: availability }))
}

/// GET /api/v1/projects/{id}/hours/history?limit=&offset=
pub async fn history(
    RequireAuth(_user): RequireAuth,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
    Query(params): Query<PaginationParams>,
) -> AppResult<Json<DataResponse<HourHistoryPage>>> {
    let page = state
        .ledger
        .history(&state.pool, id, params.limit, params.offset)
        .await?;
    Ok(Json(DataResponse { data: page }))
}

/// GET /api/v1/projects/{id}/hours/requests/{request_id}
pub async fn allocated_for_request(
    RequireAuth(_user): RequireAuth,
    State(state): State<AppState>,
    Path((id, request_id)): Path<(DbId, DbId)>,
) -> AppResult<Json<DataResponse<RequestAllocation>>> {
    find_request(&state, id, request_id).await?;
    let allocated_hours = state
        .ledger
        .allocated_for_request(&state.pool, id, request_id)
        .await?;
    Ok(Json(DataResponse {
        data: RequestAllocation {
            project_id: id,
            request_id,
            allocated_hours,
        },
    }))
}

/// GET /api/v1/projects/{id}/hours/reconcile
pub async fn reconcile(
    RequireManager(_user): RequireManager,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<Json<DataResponse<LedgerReconciliation>>> {
    let reconciliation = state.ledger.reconcile(&state.pool, id).await?;
    Ok(Json(DataResponse {
        data: reconciliation,
    }))
}

// ---------------------------------------------------------------------------
// Writes
// ---------------------------------------------------------------------------

/// POST /api/v1/projects/{id}/hours/allocate
pub async fn allocate(
    RequireManager(user): RequireManager,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
    Json(input): Json<AllocateHoursRequest>,
) -> AppResult<(StatusCode, Json<DataResponse<LedgerReceipt>>)> {
    find_request(&state, id, input.request_id).await?;
    let receipt = state
        .ledger
        .allocate(
            UnitOfWork::Pool(&state.pool),
            id,
            input.request_id,
            input.hours,
            &user.actor(),
        )
        .await?;
    Ok((StatusCode::CREATED, Json(DataResponse { data: receipt })))
}

/// POST /api/v1/projects/{id}/hours/deallocate
pub async fn deallocate(
    RequireManager(user): RequireManager,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
    Json(input): Json<DeallocateHoursRequest>,
) -> AppResult<(StatusCode, Json<DataResponse<LedgerReceipt>>)> {
    find_request(&state, id, input.request_id).await?;
    let receipt = state
        .ledger
        .deallocate(
            UnitOfWork::Pool(&state.pool),
            id,
            input.request_id,
            input.hours,
            &user.actor(),
            &input.reason,
        )
        .await?;
    Ok((StatusCode::CREATED, Json(DataResponse { data: receipt })))
}

/// POST /api/v1/projects/{id}/hours/adjust
pub async fn adjust(
    RequireManager(user): RequireManager,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
    Json(input): Json<AdjustHoursRequest>,
) -> AppResult<(StatusCode, Json<DataResponse<LedgerReceipt>>)> {
    let receipt = state
        .ledger
        .adjust(
            UnitOfWork::Pool(&state.pool),
            id,
            input.hours,
            &user.actor(),
            &input.reason,
        )
        .await?;
    Ok((StatusCode::CREATED, Json(DataResponse { data: receipt })))
}

/// POST /api/v1/projects/{id}/hours/extend
pub async fn extend(
    RequireManager(user): RequireManager,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
    Json(input): Json<ExtendHoursRequest>,
) -> AppResult<(StatusCode, Json<DataResponse<LedgerReceipt>>)> {
    let receipt = state
        .ledger
        .extend(
            UnitOfWork::Pool(&state.pool),
            id,
            input.additional_hours,
            &user.actor(),
            &input.reason,
        )
        .await?;
    Ok((StatusCode::CREATED, Json(DataResponse { data: receipt })))
}

/// POST /api/v1/projects/{id}/hours/complete
///
/// Responds `201` with the receipt when a completion row was written, or
/// `200` with `data: null` when allocated and actual hours already match.
pub async fn complete(
    RequireManager(user): RequireManager,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
    Json(input): Json<CompleteRequestHours>,
) -> AppResult<(StatusCode, Json<DataResponse<Option<LedgerReceipt>>>)> {
    find_request(&state, id, input.request_id).await?;

    let allocated_hours = match input.allocated_hours {
        Some(hours) => hours,
        None => {
            state
                .ledger
                .allocated_for_request(&state.pool, id, input.request_id)
                .await?
        }
    };

    let receipt = state
        .ledger
        .finalize_on_completion(
            UnitOfWork::Pool(&state.pool),
            id,
            input.request_id,
            allocated_hours,
            input.actual_hours,
            &user.actor(),
        )
        .await?;

    let status = if receipt.is_some() {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((status, Json(DataResponse { data: receipt })))
}
