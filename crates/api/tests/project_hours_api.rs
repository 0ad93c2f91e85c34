//! HTTP-level integration tests for projects, simulation requests, and the
//! project hour ledger endpoints.
//!
//! Uses Axum's tower::ServiceExt to send requests directly to the router
//! without an actual TCP listener.

mod common;

use axum::http::StatusCode;
use common::{
    body_json, engineer_token, get, get_auth, manager_token, post_json_auth, put_json_auth,
};
use serde_json::json;
use sqlx::PgPool;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

async fn create_project(pool: &PgPool, total_hours: f64, status: &str) -> i64 {
    let app = common::build_test_app(pool.clone());
    let response = post_json_auth(
        app,
        "/api/v1/projects",
        json!({"name": "Hours project", "status": status, "total_hours": total_hours}),
        &manager_token(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    body_json(response).await["data"]["id"].as_i64().unwrap()
}

async fn create_request(pool: &PgPool, project_id: i64, title: &str) -> i64 {
    let app = common::build_test_app(pool.clone());
    let response = post_json_auth(
        app,
        &format!("/api/v1/projects/{project_id}/requests"),
        json!({"title": title}),
        &engineer_token(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    body_json(response).await["data"]["id"].as_i64().unwrap()
}

async fn allocate(
    pool: &PgPool,
    project_id: i64,
    request_id: i64,
    hours: f64,
) -> (StatusCode, serde_json::Value) {
    let app = common::build_test_app(pool.clone());
    let response = post_json_auth(
        app,
        &format!("/api/v1/projects/{project_id}/hours/allocate"),
        json!({"request_id": request_id, "hours": hours}),
        &manager_token(),
    )
    .await;
    let status = response.status();
    (status, body_json(response).await)
}

async fn summary(pool: &PgPool, project_id: i64) -> serde_json::Value {
    let app = common::build_test_app(pool.clone());
    let response = get_auth(
        app,
        &format!("/api/v1/projects/{project_id}/hours"),
        &engineer_token(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    body_json(response).await["data"].clone()
}

// ---------------------------------------------------------------------------
// Authentication and projects
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_requests_without_token_are_401(pool: PgPool) {
    let app = common::build_test_app(pool);
    let response = get(app, "/api/v1/projects").await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await["code"], "UNAUTHORIZED");
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_engineer_cannot_create_project(pool: PgPool) {
    let app = common::build_test_app(pool);
    let response = post_json_auth(
        app,
        "/api/v1/projects",
        json!({"name": "Nope"}),
        &engineer_token(),
    )
    .await;

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_create_and_get_project(pool: PgPool) {
    let id = create_project(&pool, 100.0, "active").await;

    let app = common::build_test_app(pool);
    let response = get_auth(app, &format!("/api/v1/projects/{id}"), &engineer_token()).await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["data"]["name"], "Hours project");
    assert_eq!(json["data"]["status"], "active");
    assert_eq!(json["data"]["total_hours"].as_f64(), Some(100.0));
    assert_eq!(json["data"]["used_hours"].as_f64(), Some(0.0));
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_project_update_ignores_hour_fields(pool: PgPool) {
    let id = create_project(&pool, 40.0, "draft").await;

    let app = common::build_test_app(pool);
    let response = put_json_auth(
        app,
        &format!("/api/v1/projects/{id}"),
        json!({"status": "approved", "total_hours": 9999, "used_hours": 5}),
        &manager_token(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["data"]["status"], "approved");
    assert_eq!(json["data"]["total_hours"].as_f64(), Some(40.0));
    assert_eq!(json["data"]["used_hours"].as_f64(), Some(0.0));
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_unknown_project_status_is_rejected(pool: PgPool) {
    let app = common::build_test_app(pool);
    let response = post_json_auth(
        app,
        "/api/v1/projects",
        json!({"name": "Bad", "status": "frozen"}),
        &manager_token(),
    )
    .await;

    assert!(response.status().is_client_error());
}

// ---------------------------------------------------------------------------
// Allocation
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_allocate_returns_receipt(pool: PgPool) {
    let project = create_project(&pool, 100.0, "active").await;
    let request = create_request(&pool, project, "R1").await;

    let (status, json) = allocate(&pool, project, request, 30.0).await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(json["data"]["balance_before"].as_f64(), Some(0.0));
    assert_eq!(json["data"]["balance_after"].as_f64(), Some(30.0));
    assert_eq!(json["data"]["available_hours"].as_f64(), Some(70.0));
    assert!(json["data"]["transaction_id"].is_number());

    let summary = summary(&pool, project).await;
    assert_eq!(summary["used_hours"].as_f64(), Some(30.0));
    assert_eq!(summary["current_available"].as_f64(), Some(70.0));
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_over_allocation_returns_409_with_details(pool: PgPool) {
    let project = create_project(&pool, 50.0, "active").await;
    let r1 = create_request(&pool, project, "R1").await;
    let r2 = create_request(&pool, project, "R2").await;

    let (status, _) = allocate(&pool, project, r1, 40.0).await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, json) = allocate(&pool, project, r2, 20.0).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["code"], "INSUFFICIENT_HOURS");
    assert_eq!(json["details"]["available"].as_f64(), Some(10.0));
    assert_eq!(json["details"]["requested"].as_f64(), Some(20.0));

    assert_eq!(summary(&pool, project).await["used_hours"].as_f64(), Some(40.0));
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_allocate_to_draft_project_returns_409(pool: PgPool) {
    let project = create_project(&pool, 50.0, "draft").await;
    let request = create_request(&pool, project, "R1").await;

    let (status, json) = allocate(&pool, project, request, 5.0).await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["code"], "INVALID_PROJECT_STATE");
    assert_eq!(json["details"]["status"], "draft");
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_allocate_for_request_of_other_project_returns_404(pool: PgPool) {
    let project = create_project(&pool, 50.0, "active").await;
    let other = create_project(&pool, 50.0, "active").await;
    let foreign_request = create_request(&pool, other, "Elsewhere").await;

    let (status, json) = allocate(&pool, project, foreign_request, 5.0).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["code"], "NOT_FOUND");
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_engineer_cannot_move_hours(pool: PgPool) {
    let project = create_project(&pool, 50.0, "active").await;
    let request = create_request(&pool, project, "R1").await;

    let app = common::build_test_app(pool.clone());
    let response = post_json_auth(
        app,
        &format!("/api/v1/projects/{project}/hours/allocate"),
        json!({"request_id": request, "hours": 5}),
        &engineer_token(),
    )
    .await;

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(summary(&pool, project).await["used_hours"].as_f64(), Some(0.0));
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_zero_hours_is_a_precondition_failure(pool: PgPool) {
    let project = create_project(&pool, 50.0, "active").await;
    let request = create_request(&pool, project, "R1").await;

    let (status, json) = allocate(&pool, project, request, 0.0).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["code"], "PRECONDITION_FAILED");
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_hours_beyond_two_decimals_are_rejected(pool: PgPool) {
    let project = create_project(&pool, 50.0, "active").await;
    let request = create_request(&pool, project, "R1").await;

    let (status, json) = allocate(&pool, project, request, 0.005).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["code"], "PRECONDITION_FAILED");

    let app = common::build_test_app(pool.clone());
    let response = post_json_auth(
        app,
        &format!("/api/v1/projects/{project}/requests/{request}/assign"),
        json!({"engineer_id": 20, "hours": 1.005}),
        &manager_token(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let app = common::build_test_app(pool.clone());
    let response = post_json_auth(
        app,
        "/api/v1/projects",
        json!({"name": "Oversized", "total_hours": 100000000.0}),
        &manager_token(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["code"], "PRECONDITION_FAILED");

    assert_eq!(summary(&pool, project).await["used_hours"].as_f64(), Some(0.0));
}

// ---------------------------------------------------------------------------
// Deallocation, adjustment, extension, completion
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_deallocate_more_than_used_returns_409(pool: PgPool) {
    let project = create_project(&pool, 50.0, "active").await;
    let request = create_request(&pool, project, "R1").await;
    allocate(&pool, project, request, 5.0).await;

    let app = common::build_test_app(pool);
    let response = post_json_auth(
        app,
        &format!("/api/v1/projects/{project}/hours/deallocate"),
        json!({"request_id": request, "hours": 8, "reason": "denied"}),
        &manager_token(),
    )
    .await;

    assert_eq!(response.status(), StatusCode::CONFLICT);
    let json = body_json(response).await;
    assert_eq!(json["code"], "NEGATIVE_BALANCE");
    assert_eq!(json["details"]["used"].as_f64(), Some(5.0));
    assert_eq!(json["details"]["requested"].as_f64(), Some(8.0));
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_adjust_requires_reason(pool: PgPool) {
    let project = create_project(&pool, 50.0, "active").await;

    let app = common::build_test_app(pool.clone());
    let response = post_json_auth(
        app,
        &format!("/api/v1/projects/{project}/hours/adjust"),
        json!({"hours": 2}),
        &manager_token(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["code"], "PRECONDITION_FAILED");

    let app = common::build_test_app(pool.clone());
    let response = post_json_auth(
        app,
        &format!("/api/v1/projects/{project}/hours/adjust"),
        json!({"hours": 2.25, "reason": "timesheet import"}),
        &manager_token(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    assert_eq!(
        body_json(response).await["data"]["balance_after"].as_f64(),
        Some(2.25)
    );
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_extend_grows_budget(pool: PgPool) {
    let project = create_project(&pool, 100.0, "active").await;
    let request = create_request(&pool, project, "R1").await;
    allocate(&pool, project, request, 90.0).await;

    let app = common::build_test_app(pool.clone());
    let response = post_json_auth(
        app,
        &format!("/api/v1/projects/{project}/hours/extend"),
        json!({"additional_hours": 50, "reason": "scope increase"}),
        &manager_token(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let json = body_json(response).await;
    assert_eq!(json["data"]["total_hours"].as_f64(), Some(150.0));
    assert_eq!(json["data"]["balance_before"].as_f64(), Some(90.0));
    assert_eq!(json["data"]["balance_after"].as_f64(), Some(90.0));
    assert_eq!(json["data"]["available_hours"].as_f64(), Some(60.0));

    let summary = summary(&pool, project).await;
    assert_eq!(summary["total_hours"].as_f64(), Some(150.0));
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_complete_uses_ledger_total_when_allocated_is_omitted(pool: PgPool) {
    let project = create_project(&pool, 100.0, "active").await;
    let request = create_request(&pool, project, "R3").await;
    allocate(&pool, project, request, 20.0).await;

    let app = common::build_test_app(pool.clone());
    let response = post_json_auth(
        app,
        &format!("/api/v1/projects/{project}/hours/complete"),
        json!({"request_id": request, "actual_hours": 15}),
        &manager_token(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let json = body_json(response).await;
    assert_eq!(json["data"]["balance_after"].as_f64(), Some(15.0));

    // A second completion at the same figure changes nothing.
    let app = common::build_test_app(pool.clone());
    let response = post_json_auth(
        app,
        &format!("/api/v1/projects/{project}/hours/complete"),
        json!({"request_id": request, "actual_hours": 15}),
        &manager_token(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_json(response).await["data"].is_null());

    let app = common::build_test_app(pool);
    let response = get_auth(
        app,
        &format!("/api/v1/projects/{project}/hours/requests/{request}"),
        &engineer_token(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        body_json(response).await["data"]["allocated_hours"].as_f64(),
        Some(15.0)
    );
}

// ---------------------------------------------------------------------------
// Queries
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_history_is_paginated_and_attributed(pool: PgPool) {
    let project = create_project(&pool, 100.0, "active").await;
    let request = create_request(&pool, project, "Thermal sweep").await;
    allocate(&pool, project, request, 10.0).await;
    allocate(&pool, project, request, 5.0).await;

    let app = common::build_test_app(pool.clone());
    let response = get_auth(
        app,
        &format!("/api/v1/projects/{project}/hours/history?limit=1"),
        &engineer_token(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["data"]["total"], 2);
    let items = json["data"]["transactions"].as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["transaction_type"], "allocation");
    assert_eq!(items[0]["hours"].as_f64(), Some(5.0));
    assert_eq!(items[0]["performed_by"], 10);
    assert_eq!(items[0]["performed_by_name"], "Morgan Manager");
    assert_eq!(items[0]["request_title"], "Thermal sweep");

    let app = common::build_test_app(pool);
    let response = get_auth(
        app,
        "/api/v1/projects/999999/hours/history",
        &engineer_token(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_availability_preview(pool: PgPool) {
    let project = create_project(&pool, 50.0, "active").await;
    let request = create_request(&pool, project, "R1").await;
    allocate(&pool, project, request, 40.0).await;

    let app = common::build_test_app(pool.clone());
    let response = get_auth(
        app,
        &format!("/api/v1/projects/{project}/hours/availability?hours=10"),
        &engineer_token(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["data"]["available"], true);
    assert_eq!(json["data"]["current_available"].as_f64(), Some(10.0));

    let app = common::build_test_app(pool);
    let response = get_auth(
        app,
        &format!("/api/v1/projects/{project}/hours/availability?hours=10.5"),
        &engineer_token(),
    )
    .await;
    assert_eq!(body_json(response).await["data"]["available"], false);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_reconcile_reports_consistent_ledger(pool: PgPool) {
    let project = create_project(&pool, 50.0, "active").await;
    let request = create_request(&pool, project, "R1").await;
    allocate(&pool, project, request, 12.0).await;

    let app = common::build_test_app(pool.clone());
    let response = get_auth(
        app,
        &format!("/api/v1/projects/{project}/hours/reconcile"),
        &manager_token(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["data"]["consistent"], true);
    assert_eq!(json["data"]["ledger_hours"].as_f64(), Some(12.0));

    let app = common::build_test_app(pool);
    let response = get_auth(
        app,
        &format!("/api/v1/projects/{project}/hours/reconcile"),
        &engineer_token(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

// ---------------------------------------------------------------------------
// Assignment (request write + ledger write in one transaction)
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_assign_records_engineer_and_allocates(pool: PgPool) {
    let project = create_project(&pool, 40.0, "approved").await;
    let request = create_request(&pool, project, "R1").await;

    let app = common::build_test_app(pool.clone());
    let response = post_json_auth(
        app,
        &format!("/api/v1/projects/{project}/requests/{request}/assign"),
        json!({"engineer_id": 20, "hours": 8}),
        &manager_token(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["data"]["request"]["assigned_to"], 20);
    assert_eq!(json["data"]["request"]["allocated_hours"].as_f64(), Some(8.0));
    assert_eq!(json["data"]["receipt"]["balance_after"].as_f64(), Some(8.0));
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_rejected_assign_rolls_back_assignment(pool: PgPool) {
    let project = create_project(&pool, 5.0, "active").await;
    let request = create_request(&pool, project, "R1").await;

    let app = common::build_test_app(pool.clone());
    let response = post_json_auth(
        app,
        &format!("/api/v1/projects/{project}/requests/{request}/assign"),
        json!({"engineer_id": 20, "hours": 6}),
        &manager_token(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert_eq!(body_json(response).await["code"], "INSUFFICIENT_HOURS");

    let app = common::build_test_app(pool.clone());
    let response = get_auth(
        app,
        &format!("/api/v1/projects/{project}/requests/{request}"),
        &engineer_token(),
    )
    .await;
    let json = body_json(response).await;
    assert!(json["data"]["assigned_to"].is_null());
    assert!(json["data"]["allocated_hours"].is_null());

    assert_eq!(summary(&pool, project).await["used_hours"].as_f64(), Some(0.0));
}
