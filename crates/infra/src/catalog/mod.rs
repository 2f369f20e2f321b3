//! Catalog lookup boundary.
//!
//! The catalog service owns product data; the order service only reads single
//! products by id. Lookups distinguish "this product does not exist" from
//! "the catalog could not answer", so callers can tell a bad request from an
//! outage even though both currently reject the order.

pub mod http;
pub mod in_memory;

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use storefront_core::{Money, ProductId};

pub use http::HttpCatalogClient;
pub use in_memory::InMemoryCatalog;

/// Product as served by the catalog (read-only here).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub price: Money,
    #[serde(default)]
    pub stock: i64,
    #[serde(default)]
    pub category: Option<String>,
}

/// Why a lookup did not produce a product.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LookupError {
    /// The catalog answered and the product does not exist (or the id is malformed).
    #[error("product {0} not found")]
    NotFound(ProductId),

    /// Network failure, timeout, 5xx, or an unreadable response.
    #[error("catalog unavailable while looking up product {product_id}: {reason}")]
    Unavailable { product_id: ProductId, reason: String },
}

impl LookupError {
    pub fn unavailable(product_id: ProductId, reason: impl Into<String>) -> Self {
        Self::Unavailable {
            product_id,
            reason: reason.into(),
        }
    }

    pub fn product_id(&self) -> ProductId {
        match self {
            LookupError::NotFound(id) => *id,
            LookupError::Unavailable { product_id, .. } => *product_id,
        }
    }
}

/// Point lookup of one product by id. Read-only and idempotent.
#[async_trait::async_trait]
pub trait ProductCatalog: Send + Sync {
    async fn lookup(&self, product_id: ProductId) -> Result<Product, LookupError>;
}

#[async_trait::async_trait]
impl<C> ProductCatalog for Arc<C>
where
    C: ProductCatalog + ?Sized,
{
    async fn lookup(&self, product_id: ProductId) -> Result<Product, LookupError> {
        (**self).lookup(product_id).await
    }
}
