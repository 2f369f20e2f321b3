use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde::Serialize;
use serde_json::json;

use storefront_infra::OrderError;

/// `{ "success": true, "data": ... }`
pub fn success<T: Serialize>(status: StatusCode, data: T) -> axum::response::Response {
    (status, axum::Json(json!({ "success": true, "data": data }))).into_response()
}

/// `{ "success": false, "error": "..." }`
pub fn json_error(status: StatusCode, message: impl Into<String>) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "success": false,
            "error": message.into(),
        })),
    )
        .into_response()
}

pub fn order_error_to_response(err: OrderError) -> axum::response::Response {
    match err {
        OrderError::Validation(msg) => json_error(StatusCode::BAD_REQUEST, msg),
        OrderError::Reference { message, .. } => json_error(StatusCode::BAD_REQUEST, message),
        e @ OrderError::NotFound(_) => json_error(StatusCode::NOT_FOUND, e.to_string()),
        OrderError::Conflict(msg) => json_error(StatusCode::CONFLICT, msg),
        OrderError::InvalidTransition(msg) => json_error(StatusCode::CONFLICT, msg),
        OrderError::Storage(msg) => {
            tracing::error!(error = %msg, "order storage failure");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "Order storage is unavailable")
        }
    }
}

pub fn json_rejection(rejection: JsonRejection) -> axum::response::Response {
    json_error(
        StatusCode::BAD_REQUEST,
        format!("invalid JSON body: {}", rejection.body_text()),
    )
}

pub fn query_rejection(rejection: QueryRejection) -> axum::response::Response {
    json_error(
        StatusCode::BAD_REQUEST,
        format!("invalid query string: {}", rejection.body_text()),
    )
}
