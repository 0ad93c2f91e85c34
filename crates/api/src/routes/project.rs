//! Route definitions for the `/projects` resource.
//!
//! Also nests the hour ledger and simulation request routes under
//! `/projects/{project_id}/...`.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::{project, project_hours, simulation_request};
use crate::state::AppState;

/// Routes mounted at `/projects`.
///
/// ```text
/// GET    /                                         -> list
/// POST   /                                         -> create
/// GET    /{id}                                     -> get_by_id
/// PUT    /{id}                                     -> update
///
/// GET    /{project_id}/hours                       -> summary
/// GET    /{project_id}/hours/availability          -> availability
/// GET    /{project_id}/hours/history               -> history
/// GET    /{project_id}/hours/reconcile             -> reconcile
/// GET    /{project_id}/hours/requests/{request_id} -> allocated_for_request
/// POST   /{project_id}/hours/allocate              -> allocate
/// POST   /{project_id}/hours/deallocate            -> deallocate
/// POST   /{project_id}/hours/adjust                -> adjust
/// POST   /{project_id}/hours/extend                -> extend
/// POST   /{project_id}/hours/complete              -> complete
///
/// GET    /{project_id}/requests                    -> list_by_project
/// POST   /{project_id}/requests                    -> create
/// GET    /{project_id}/requests/{id}               -> get_by_id
/// POST   /{project_id}/requests/{id}/assign        -> assign
/// ```
pub fn router() -> Router<AppState> {
    let hour_routes = Router::new()
        .route("/", get(project_hours::summary))
        .route("/availability", get(project_hours::availability))
        .route("/history", get(project_hours::history))
        .route("/reconcile", get(project_hours::reconcile))
        .route(
            "/requests/{request_id}",
            get(project_hours::allocated_for_request),
        )
        .route("/allocate", post(project_hours::allocate))
        .route("/deallocate", post(project_hours::deallocate))
        .route("/adjust", post(project_hours::adjust))
        .route("/extend", post(project_hours::extend))
        .route("/complete", post(project_hours::complete));

    let request_routes = Router::new()
        .route(
            "/",
            get(simulation_request::list_by_project).post(simulation_request::create),
        )
        .route("/{id}", get(simulation_request::get_by_id))
        .route("/{id}/assign", post(simulation_request::assign));

    Router::new()
        .route("/", get(project::list).post(project::create))
        .route("/{id}", get(project::get_by_id).put(project::update))
        .nest("/{project_id}/hours", hour_routes)
        .nest("/{project_id}/requests", request_routes)
}
