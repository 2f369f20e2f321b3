use std::sync::Arc;

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Extension, Path, Query,
    },
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use serde_json::Value;

use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new()
        .route("/", post(create_order).get(list_orders))
        .route("/:id", get(get_order).delete(delete_order))
        .route("/:id/status", put(update_status))
}

pub async fn create_order(
    Extension(services): Extension<Arc<AppServices>>,
    body: Result<Json<Value>, JsonRejection>,
) -> axum::response::Response {
    let Json(body) = match body {
        Ok(b) => b,
        Err(rejection) => return errors::json_rejection(rejection),
    };

    let request = match dto::parse_create_order(&body) {
        Ok(r) => r,
        Err(e) => return errors::order_error_to_response(e),
    };

    match services.orders.create_order(request).await {
        Ok(order) => errors::success(StatusCode::CREATED, order),
        Err(e) => errors::order_error_to_response(e),
    }
}

pub async fn list_orders(
    Extension(services): Extension<Arc<AppServices>>,
    query: Result<Query<dto::ListOrdersQuery>, QueryRejection>,
) -> axum::response::Response {
    let Query(query) = match query {
        Ok(q) => q,
        Err(rejection) => return errors::query_rejection(rejection),
    };

    let filter = match query.into_filter() {
        Ok(f) => f,
        Err(e) => return errors::order_error_to_response(e),
    };

    match services.orders.list_orders(&filter).await {
        Ok(orders) => errors::success(StatusCode::OK, orders),
        Err(e) => errors::order_error_to_response(e),
    }
}

pub async fn get_order(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id = match dto::parse_order_id(&id) {
        Ok(id) => id,
        Err(e) => return errors::order_error_to_response(e),
    };

    match services.orders.get_order(id).await {
        Ok(order) => errors::success(StatusCode::OK, order),
        Err(e) => errors::order_error_to_response(e),
    }
}

pub async fn update_status(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    body: Result<Json<Value>, JsonRejection>,
) -> axum::response::Response {
    let id = match dto::parse_order_id(&id) {
        Ok(id) => id,
        Err(e) => return errors::order_error_to_response(e),
    };
    let Json(body) = match body {
        Ok(b) => b,
        Err(rejection) => return errors::json_rejection(rejection),
    };
    let update = match dto::parse_status_update(&body) {
        Ok(u) => u,
        Err(e) => return errors::order_error_to_response(e),
    };

    match services.orders.set_status(id, &update.status, update.version).await {
        Ok(order) => errors::success(StatusCode::OK, order),
        Err(e) => errors::order_error_to_response(e),
    }
}

pub async fn delete_order(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id = match dto::parse_order_id(&id) {
        Ok(id) => id,
        Err(e) => return errors::order_error_to_response(e),
    };

    match services.orders.delete_order(id).await {
        Ok(()) => errors::success(StatusCode::OK, serde_json::json!({ "id": id })),
        Err(e) => errors::order_error_to_response(e),
    }
}
