use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::{json, Value};
use simdesk_core::error::CoreError;
use simdesk_core::hours::LedgerError;

/// Application-level error type for HTTP handlers.
///
/// Wraps [`CoreError`], [`LedgerError`], and raw database errors. Implements [`IntoResponse`] to produce consistent
/// JSON error responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// A domain-level error from `simdesk_core`.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// A rejected or failed hour ledger operation.
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    /// A database error from sqlx.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Convenience type alias for handler return values.
pub type AppResult<T> = Result<T, AppError>;

const INTERNAL_MESSAGE: &str = "An internal error occurred";

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message, details) = match &self {
            // --- CoreError variants ---
            AppError::Core(core) => {
                let (status, code, message) = classify_core_error(core);
                (status, code, message, None)
            }

            // --- Ledger errors ---
            AppError::Ledger(err) => classify_ledger_error(err),

            // --- Database errors ---
            AppError::Database(err) => {
                let (status, code, message) = classify_sqlx_error(err);
                (status, code, message, None)
            }
        };

        let mut body = json!({
            "error": message,
            "code": code,
        });
        if let Some(details) = details {
            body["details"] = details;
        }

        (status, axum::Json(body)).into_response()
    }
}

fn classify_core_error(core: &CoreError) -> (StatusCode, &'static str, String) {
    match core {
        CoreError::NotFound { entity, id } => (
            StatusCode::NOT_FOUND,
            "NOT_FOUND",
            format!("{entity} with id {id} not found"),
        ),
        CoreError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
        CoreError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED", msg.clone()),
        CoreError::Forbidden(msg) => (StatusCode::FORBIDDEN, "FORBIDDEN", msg.clone()),
    }
}

/// Map a ledger error to status, code, message, and structured details.
///
/// Budget rejections are 409 with the numbers the client needs to retry;
/// `Unexpected` is already logged by the ledger and is sanitized here.
fn classify_ledger_error(err: &LedgerError) -> (StatusCode, &'static str, String, Option<Value>) {
    match err {
        LedgerError::NotFound { .. } => (StatusCode::NOT_FOUND, "NOT_FOUND", err.to_string(), None),
        LedgerError::InsufficientBudget {
            available,
            requested,
        } => (
            StatusCode::CONFLICT,
            "INSUFFICIENT_HOURS",
            err.to_string(),
            Some(json!({ "available": available, "requested": requested })),
        ),
        LedgerError::NegativeBalance { used, requested } => (
            StatusCode::CONFLICT,
            "NEGATIVE_BALANCE",
            err.to_string(),
            Some(json!({ "used": used, "requested": requested })),
        ),
        LedgerError::InvalidProjectState { status } => (
            StatusCode::CONFLICT,
            "INVALID_PROJECT_STATE",
            err.to_string(),
            Some(json!({ "status": status })),
        ),
        LedgerError::PreconditionFailed(msg) => (
            StatusCode::BAD_REQUEST,
            "PRECONDITION_FAILED",
            msg.clone(),
            None,
        ),
        LedgerError::Unexpected(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            "INTERNAL_ERROR",
            INTERNAL_MESSAGE.to_string(),
            None,
        ),
    }
}

/// Classify a sqlx error into an HTTP status, error code, and message.
///
/// - `RowNotFound` maps to 404.
/// - Unique constraint violations (constraint name starting with `uq_`) map to 409.
/// - Check constraint violations (constraint name starting with `ck_`) map to 400.
/// - Everything else maps to 500 with a sanitized message.
fn classify_sqlx_error(err: &sqlx::Error) -> (StatusCode, &'static str, String) {
    match err {
        sqlx::Error::RowNotFound => (
            StatusCode::NOT_FOUND,
            "NOT_FOUND",
            "Resource not found".to_string(),
        ),
        sqlx::Error::Database(db_err) => {
            let constraint = db_err.constraint().unwrap_or("unknown");
            match db_err.code().as_deref() {
                // PostgreSQL unique_violation
                Some("23505") if constraint.starts_with("uq_") => {
                    return (
                        StatusCode::CONFLICT,
                        "CONFLICT",
                        format!("Duplicate value violates unique constraint: {constraint}"),
                    );
                }
                // PostgreSQL check_violation
                Some("23514") if constraint.starts_with("ck_") => {
                    return (
                        StatusCode::BAD_REQUEST,
                        "VALIDATION_ERROR",
                        format!("Value violates check constraint: {constraint}"),
                    );
                }
                _ => {}
            }
            tracing::error!(error = %db_err, "Database error");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                INTERNAL_MESSAGE.to_string(),
            )
        }
        other => {
            tracing::error!(error = %other, "Database error");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                INTERNAL_MESSAGE.to_string(),
            )
        }
    }
}
