use std::sync::Arc;
use std::time::Duration;

use axum::{extract::Path, routing::get, Json, Router};
use reqwest::StatusCode;
use serde_json::{json, Value};

use storefront_api::app::{build_app, AppServices};
use storefront_infra::HttpCatalogClient;
use storefront_orders::TransitionPolicy;

struct TestServer {
    base_url: String,
    handles: Vec<tokio::task::JoinHandle<()>>,
}

async fn mock_product(Path(id): Path<String>) -> (axum::http::StatusCode, Json<Value>) {
    match id.as_str() {
        "1" => (
            axum::http::StatusCode::OK,
            Json(json!({
                "success": true,
                "data": {"id": 1, "name": "Widget", "price": "29.99", "stock": 10, "category": "tools"}
            })),
        ),
        "2" => (
            axum::http::StatusCode::OK,
            Json(json!({
                "success": true,
                "data": {"id": 2, "name": "Gadget", "price": 15.0, "stock": 2, "category": null}
            })),
        ),
        _ => (
            axum::http::StatusCode::NOT_FOUND,
            Json(json!({"success": false, "error": "Product not found"})),
        ),
    }
}

async fn serve(app: Router) -> (String, tokio::task::JoinHandle<()>) {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("failed to bind ephemeral port");
    let addr = listener.local_addr().unwrap();
    let handle = tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{}", addr), handle)
}

impl TestServer {
    async fn spawn(policy: TransitionPolicy) -> Self {
        let (catalog_url, catalog_handle) =
            serve(Router::new().route("/api/products/:id", get(mock_product))).await;

        let catalog = HttpCatalogClient::new(catalog_url, Duration::from_secs(2)).unwrap();
        let services = Arc::new(AppServices::in_memory(Arc::new(catalog), policy));

        // Same router as prod, bound to an ephemeral port.
        let (base_url, api_handle) = serve(build_app(services)).await;

        Self {
            base_url,
            handles: vec![catalog_handle, api_handle],
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        for handle in &self.handles {
            handle.abort();
        }
    }
}

async fn create_alice_order(client: &reqwest::Client, srv: &TestServer) -> Value {
    let res = client
        .post(srv.url("/api/orders"))
        .json(&json!({
            "customerName": "Alice",
            "customerEmail": "alice@example.com",
            "items": [{"productId": 1, "quantity": 2}]
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["success"], true);
    body["data"].clone()
}

async fn put_status(client: &reqwest::Client, srv: &TestServer, id: &Value, status: &str) -> reqwest::Response {
    client
        .put(srv.url(&format!("/api/orders/{id}/status")))
        .json(&json!({ "status": status }))
        .send()
        .await
        .unwrap()
}

#[tokio::test]
async fn health_reports_store_backend() {
    let srv = TestServer::spawn(TransitionPolicy::Lenient).await;

    let res = reqwest::get(srv.url("/health")).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["status"], "ok");
    assert_eq!(body["data"]["store"], "memory");
}

#[tokio::test]
async fn create_order_prices_from_catalog() {
    let srv = TestServer::spawn(TransitionPolicy::Lenient).await;
    let client = reqwest::Client::new();

    let order = create_alice_order(&client, &srv).await;
    assert_eq!(order["status"], "pending");
    assert_eq!(order["totalAmount"], 59.98);
    assert_eq!(order["customerEmail"], "alice@example.com");
    assert_eq!(order["items"].as_array().unwrap().len(), 1);
    assert_eq!(order["items"][0]["quantity"], 2);
    assert_eq!(order["items"][0]["price"], 29.99);
    assert_eq!(order["items"][0]["productName"], "Widget");

    let res = client
        .get(srv.url(&format!("/api/orders/{}", order["id"])))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["data"], order);
}

#[tokio::test]
async fn unknown_product_rejects_order_and_persists_nothing() {
    let srv = TestServer::spawn(TransitionPolicy::Lenient).await;
    let client = reqwest::Client::new();

    let res = client
        .post(srv.url("/api/orders"))
        .json(&json!({
            "customerName": "Alice",
            "customerEmail": "alice@example.com",
            "items": [{"productId": 1, "quantity": 1}, {"productId": 9999, "quantity": 1}]
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["success"], false);
    assert!(body["error"].as_str().unwrap().contains("9999"));

    let res = client
        .get(srv.url("/api/orders?customerEmail=alice@example.com"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["data"], json!([]));
}

#[tokio::test]
async fn malformed_requests_are_bad_requests() {
    let srv = TestServer::spawn(TransitionPolicy::Lenient).await;
    let client = reqwest::Client::new();

    let bodies = [
        json!({"customerEmail": "alice@example.com", "items": [{"productId": 1, "quantity": 1}]}),
        json!({"customerName": "Alice", "customerEmail": "alice@example.com", "items": []}),
        json!({"customerName": "Alice", "customerEmail": "alice@example.com", "items": [{"productId": 1, "quantity": 0}]}),
        json!({"customerName": "Alice", "customerEmail": "alice@example.com", "items": [{"productId": "abc", "quantity": 1}]}),
    ];
    for body in bodies {
        let res = client.post(srv.url("/api/orders")).json(&body).send().await.unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST, "{body}");
        let envelope: Value = res.json().await.unwrap();
        assert_eq!(envelope["success"], false);
        assert!(envelope["error"].is_string());
    }

    let res = client
        .post(srv.url("/api/orders"))
        .header("content-type", "application/json")
        .body("{not json")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let envelope: Value = res.json().await.unwrap();
    assert_eq!(envelope["success"], false);

    let res = client.get(srv.url("/api/orders?status=lost")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let res = client.get(srv.url("/api/orders/abc")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn status_updates_follow_lenient_policy() {
    let srv = TestServer::spawn(TransitionPolicy::Lenient).await;
    let client = reqwest::Client::new();
    let order = create_alice_order(&client, &srv).await;
    let id = &order["id"];

    // unknown status leaves the order untouched
    let res = put_status(&client, &srv, id, "refunded").await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let res = client.get(srv.url(&format!("/api/orders/{id}"))).send().await.unwrap();
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["data"]["status"], "pending");

    // repeating a status is idempotent
    for _ in 0..2 {
        let res = put_status(&client, &srv, id, "shipped").await;
        assert_eq!(res.status(), StatusCode::OK);
        let body: Value = res.json().await.unwrap();
        assert_eq!(body["data"]["status"], "shipped");
    }

    // terminal states can be left under the lenient default
    assert_eq!(put_status(&client, &srv, id, "delivered").await.status(), StatusCode::OK);
    let res = put_status(&client, &srv, id, "pending").await;
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["data"]["status"], "pending");

    let res = client
        .get(srv.url("/api/orders?status=pending&customerEmail=alice@example.com"))
        .send()
        .await
        .unwrap();
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["data"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn strict_policy_rejects_leaving_terminal_states() {
    let srv = TestServer::spawn(TransitionPolicy::Strict).await;
    let client = reqwest::Client::new();
    let order = create_alice_order(&client, &srv).await;
    let id = &order["id"];

    for status in ["processing", "shipped", "delivered"] {
        assert_eq!(put_status(&client, &srv, id, status).await.status(), StatusCode::OK);
    }
    let res = put_status(&client, &srv, id, "pending").await;
    assert_eq!(res.status(), StatusCode::CONFLICT);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn stale_version_is_a_conflict() {
    let srv = TestServer::spawn(TransitionPolicy::Lenient).await;
    let client = reqwest::Client::new();
    let order = create_alice_order(&client, &srv).await;
    let id = &order["id"];

    let res = client
        .put(srv.url(&format!("/api/orders/{id}/status")))
        .json(&json!({"status": "processing", "version": 1}))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let res = client
        .put(srv.url(&format!("/api/orders/{id}/status")))
        .json(&json!({"status": "shipped", "version": 1}))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn missing_orders_are_not_found() {
    let srv = TestServer::spawn(TransitionPolicy::Lenient).await;
    let client = reqwest::Client::new();

    let res = client.get(srv.url("/api/orders/424242")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["success"], false);

    let res = put_status(&client, &srv, &json!(424242), "shipped").await;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    let res = client.delete(srv.url("/api/orders/424242")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    let res = client.get(srv.url("/api/nowhere")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn delete_removes_order() {
    let srv = TestServer::spawn(TransitionPolicy::Lenient).await;
    let client = reqwest::Client::new();
    let order = create_alice_order(&client, &srv).await;
    let id = &order["id"];

    let res = client.delete(srv.url(&format!("/api/orders/{id}"))).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["data"]["id"], *id);

    let res = client.get(srv.url(&format!("/api/orders/{id}"))).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}
