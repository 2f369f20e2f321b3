use std::collections::{HashMap, HashSet};
use std::sync::RwLock;
use std::sync::atomic::{AtomicUsize, Ordering};

use storefront_core::ProductId;

use super::{LookupError, Product, ProductCatalog};

/// In-memory catalog for tests/dev.
///
/// Individual products can be marked unavailable to simulate a catalog outage
/// for that id. Every lookup is counted, hits and misses alike.
#[derive(Debug, Default)]
pub struct InMemoryCatalog {
    products: RwLock<HashMap<ProductId, Product>>,
    unavailable: RwLock<HashSet<ProductId>>,
    lookups: AtomicUsize,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_products(products: impl IntoIterator<Item = Product>) -> Self {
        let catalog = Self::new();
        for product in products {
            catalog.insert(product);
        }
        catalog
    }

    pub fn insert(&self, product: Product) {
        if let Ok(mut map) = self.products.write() {
            map.insert(product.id, product);
        }
    }

    pub fn remove(&self, product_id: ProductId) -> Option<Product> {
        self.products.write().ok()?.remove(&product_id)
    }

    pub fn set_unavailable(&self, product_id: ProductId, unavailable: bool) {
        if let Ok(mut set) = self.unavailable.write() {
            if unavailable {
                set.insert(product_id);
            } else {
                set.remove(&product_id);
            }
        }
    }

    pub fn lookup_count(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl ProductCatalog for InMemoryCatalog {
    async fn lookup(&self, product_id: ProductId) -> Result<Product, LookupError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);

        let unavailable = self
            .unavailable
            .read()
            .map_err(|_| LookupError::unavailable(product_id, "lock poisoned"))?;
        if unavailable.contains(&product_id) {
            return Err(LookupError::unavailable(product_id, "simulated outage"));
        }
        drop(unavailable);

        let products = self
            .products
            .read()
            .map_err(|_| LookupError::unavailable(product_id, "lock poisoned"))?;
        products
            .get(&product_id)
            .cloned()
            .ok_or(LookupError::NotFound(product_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use storefront_core::Money;

    fn widget() -> Product {
        Product {
            id: ProductId::new(1),
            name: "Widget".to_string(),
            price: Money::from_cents(2999),
            stock: 10,
            category: None,
        }
    }

    #[tokio::test]
    async fn lookup_distinguishes_missing_from_unavailable() {
        let catalog = InMemoryCatalog::with_products([widget()]);

        assert_eq!(catalog.lookup(ProductId::new(1)).await.unwrap().name, "Widget");
        assert_eq!(
            catalog.lookup(ProductId::new(2)).await,
            Err(LookupError::NotFound(ProductId::new(2)))
        );

        catalog.set_unavailable(ProductId::new(1), true);
        assert!(matches!(
            catalog.lookup(ProductId::new(1)).await,
            Err(LookupError::Unavailable { .. })
        ));

        catalog.set_unavailable(ProductId::new(1), false);
        assert!(catalog.lookup(ProductId::new(1)).await.is_ok());
        assert_eq!(catalog.lookup_count(), 4);
    }

    #[tokio::test]
    async fn removed_products_are_not_found() {
        let catalog = InMemoryCatalog::with_products([widget()]);
        assert!(catalog.remove(ProductId::new(1)).is_some());
        assert_eq!(
            catalog.lookup(ProductId::new(1)).await,
            Err(LookupError::NotFound(ProductId::new(1)))
        );
    }
}
