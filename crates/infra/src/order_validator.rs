//! Resolves requested items against the catalog and prices them.

use thiserror::Error;
use tracing::{debug, instrument};

use storefront_core::{DomainError, ProductId};
use storefront_orders::{RequestedItem, ValidatedItem, ValidatedOrder, validate_items};

use crate::catalog::{LookupError, ProductCatalog};

/// Why an item list could not be turned into a `ValidatedOrder`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Rejection {
    /// Shape or arithmetic problem found without consulting the catalog.
    #[error(transparent)]
    Invalid(#[from] DomainError),

    #[error("Product {0} not found")]
    ProductNotFound(ProductId),

    #[error("Product {product_id} could not be verified: {reason}")]
    CatalogUnavailable { product_id: ProductId, reason: String },
}

impl Rejection {
    /// The product that caused the rejection, if any.
    pub fn product_id(&self) -> Option<ProductId> {
        match self {
            Rejection::Invalid(_) => None,
            Rejection::ProductNotFound(id) => Some(*id),
            Rejection::CatalogUnavailable { product_id, .. } => Some(*product_id),
        }
    }
}

impl From<LookupError> for Rejection {
    fn from(err: LookupError) -> Self {
        match err {
            LookupError::NotFound(id) => Rejection::ProductNotFound(id),
            LookupError::Unavailable { product_id, reason } => {
                Rejection::CatalogUnavailable { product_id, reason }
            }
        }
    }
}

/// All-or-nothing item validation against a product catalog.
///
/// Lookups run one at a time in request order; the first failure discards
/// everything resolved so far.
#[derive(Debug, Clone)]
pub struct OrderValidator<C> {
    catalog: C,
}

impl<C> OrderValidator<C>
where
    C: ProductCatalog,
{
    pub fn new(catalog: C) -> Self {
        Self { catalog }
    }

    pub fn catalog(&self) -> &C {
        &self.catalog
    }

    #[instrument(skip_all, fields(item_count = items.len()), err)]
    pub async fn validate(&self, items: &[RequestedItem]) -> Result<ValidatedOrder, Rejection> {
        validate_items(items)?;

        let mut validated = Vec::with_capacity(items.len());
        for item in items {
            let product = self.catalog.lookup(item.product_id).await?;
            if product.stock < item.quantity {
                // Stock is informational only; ordering beyond it is accepted.
                debug!(
                    product_id = %item.product_id,
                    stock = product.stock,
                    quantity = item.quantity,
                    "ordering more than the catalog reports in stock"
                );
            }
            validated.push(ValidatedItem {
                product_id: item.product_id,
                product_name: product.name,
                quantity: item.quantity,
                price: product.price,
            });
        }

        let order = ValidatedOrder::from_items(validated)?;
        debug!(total = %order.total(), "items validated");
        Ok(order)
    }
}
