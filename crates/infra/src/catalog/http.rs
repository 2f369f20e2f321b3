//! HTTP client for the catalog service's single-product endpoint.

use std::time::Duration;

use reqwest::StatusCode;
use serde::Deserialize;
use tracing::{debug, instrument, warn};

use storefront_core::ProductId;

use super::{LookupError, Product, ProductCatalog};

/// Response envelope used by every storefront service.
#[derive(Debug, Deserialize)]
struct CatalogEnvelope {
    success: bool,
    #[serde(default)]
    data: Option<Product>,
    #[serde(default)]
    error: Option<String>,
}

/// Catalog client issuing `GET {base_url}/api/products/{id}`.
///
/// Every request is bounded by the timeout given at construction, so an
/// unresponsive catalog turns into `LookupError::Unavailable` instead of a
/// hung order request.
#[derive(Debug, Clone)]
pub struct HttpCatalogClient {
    client: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl HttpCatalogClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn product_url(&self, product_id: ProductId) -> String {
        format!("{}/api/products/{}", self.base_url, product_id)
    }

    fn describe(&self, err: &reqwest::Error) -> String {
        if err.is_timeout() {
            format!("no response within {} ms", self.timeout.as_millis())
        } else if err.is_connect() {
            format!("connection failed: {err}")
        } else {
            err.to_string()
        }
    }
}

#[async_trait::async_trait]
impl ProductCatalog for HttpCatalogClient {
    #[instrument(skip(self), fields(product_id = %product_id))]
    async fn lookup(&self, product_id: ProductId) -> Result<Product, LookupError> {
        let response = self
            .client
            .get(self.product_url(product_id))
            .send()
            .await
            .map_err(|e| {
                let reason = self.describe(&e);
                warn!(%reason, "catalog lookup failed");
                LookupError::unavailable(product_id, reason)
            })?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND || status == StatusCode::BAD_REQUEST {
            debug!(%status, "catalog reported product missing");
            return Err(LookupError::NotFound(product_id));
        }
        if !status.is_success() {
            warn!(%status, "catalog returned an error status");
            return Err(LookupError::unavailable(
                product_id,
                format!("catalog responded with {status}"),
            ));
        }

        let envelope: CatalogEnvelope = response.json().await.map_err(|e| {
            let reason = format!("unreadable catalog response: {}", self.describe(&e));
            warn!(%reason, "catalog lookup failed");
            LookupError::unavailable(product_id, reason)
        })?;

        match envelope {
            CatalogEnvelope {
                success: true,
                data: Some(product),
                ..
            } => {
                debug!(price = %product.price, stock = product.stock, "product resolved");
                Ok(product)
            }
            CatalogEnvelope { error, .. } => {
                debug!(error = ?error, "catalog envelope reported failure");
                Err(LookupError::NotFound(product_id))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use axum::{Json, Router, extract::Path, http::StatusCode as AxumStatus, routing::get};
    use serde_json::json;
    use storefront_core::Money;

    async fn product_handler(Path(id): Path<String>) -> (AxumStatus, Json<serde_json::Value>) {
        match id.as_str() {
            "1" => (
                AxumStatus::OK,
                Json(json!({
                    "success": true,
                    "data": {"id": 1, "name": "Widget", "price": "29.99", "stock": 5, "category": "tools"}
                })),
            ),
            "2" => (
                AxumStatus::OK,
                Json(json!({"success": false, "error": "Product not found"})),
            ),
            "3" => (
                AxumStatus::INTERNAL_SERVER_ERROR,
                Json(json!({"success": false, "error": "database down"})),
            ),
            "4" => {
                tokio::time::sleep(Duration::from_millis(500)).await;
                (AxumStatus::OK, Json(json!({"success": true, "data": null})))
            }
            "5" => (AxumStatus::OK, Json(json!({"unexpected": true}))),
            _ => (
                AxumStatus::NOT_FOUND,
                Json(json!({"success": false, "error": "Product not found"})),
            ),
        }
    }

    async fn spawn_catalog() -> (String, tokio::task::JoinHandle<()>) {
        let app = Router::new().route("/api/products/:id", get(product_handler));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{addr}/"), handle)
    }

    fn client(base_url: &str) -> HttpCatalogClient {
        HttpCatalogClient::new(base_url, Duration::from_millis(200)).unwrap()
    }

    #[tokio::test]
    async fn resolves_existing_product() {
        let (url, handle) = spawn_catalog().await;

        let product = client(&url).lookup(ProductId::new(1)).await.unwrap();
        assert_eq!(product.name, "Widget");
        assert_eq!(product.price, Money::from_cents(2999));
        assert_eq!(product.stock, 5);
        assert_eq!(product.category.as_deref(), Some("tools"));

        handle.abort();
    }

    #[tokio::test]
    async fn missing_product_is_not_found() {
        let (url, handle) = spawn_catalog().await;
        let catalog = client(&url);

        assert_eq!(
            catalog.lookup(ProductId::new(9999)).await,
            Err(LookupError::NotFound(ProductId::new(9999)))
        );
        // success=false inside a 200 envelope
        assert_eq!(
            catalog.lookup(ProductId::new(2)).await,
            Err(LookupError::NotFound(ProductId::new(2)))
        );

        handle.abort();
    }

    #[tokio::test]
    async fn server_errors_are_unavailable() {
        let (url, handle) = spawn_catalog().await;

        let err = client(&url).lookup(ProductId::new(3)).await.unwrap_err();
        assert!(matches!(err, LookupError::Unavailable { .. }), "{err:?}");
        assert_eq!(err.product_id(), ProductId::new(3));

        handle.abort();
    }

    #[tokio::test]
    async fn slow_catalog_times_out_as_unavailable() {
        let (url, handle) = spawn_catalog().await;

        let started = std::time::Instant::now();
        let err = client(&url).lookup(ProductId::new(4)).await.unwrap_err();
        assert!(matches!(err, LookupError::Unavailable { .. }), "{err:?}");
        assert!(started.elapsed() < Duration::from_millis(450));

        handle.abort();
    }

    #[tokio::test]
    async fn malformed_body_is_unavailable() {
        let (url, handle) = spawn_catalog().await;

        let err = client(&url).lookup(ProductId::new(5)).await.unwrap_err();
        assert!(matches!(err, LookupError::Unavailable { .. }), "{err:?}");

        handle.abort();
    }

    #[tokio::test]
    async fn unreachable_catalog_is_unavailable() {
        // Bind then drop to get a port nobody listens on.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let err = client(&format!("http://{addr}"))
            .lookup(ProductId::new(1))
            .await
            .unwrap_err();
        assert!(matches!(err, LookupError::Unavailable { .. }), "{err:?}");
    }

    #[test]
    fn trims_trailing_slash_from_base_url() {
        let catalog = client("http://catalog:3001/");
        assert_eq!(catalog.base_url(), "http://catalog:3001");
        assert_eq!(catalog.product_url(ProductId::new(7)), "http://catalog:3001/api/products/7");
    }
}
