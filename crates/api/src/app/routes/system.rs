use std::sync::Arc;

use axum::{extract::Extension, http::StatusCode};

use crate::app::errors;
use crate::app::services::AppServices;

pub async fn health(Extension(services): Extension<Arc<AppServices>>) -> axum::response::Response {
    errors::success(
        StatusCode::OK,
        serde_json::json!({
            "status": "ok",
            "service": "orders",
            "store": services.store_backend(),
        }),
    )
}

pub async fn not_found() -> axum::response::Response {
    errors::json_error(StatusCode::NOT_FOUND, "Route not found")
}
