use std::sync::Arc;

use thiserror::Error;
use tracing::warn;

use storefront_core::{ExpectedVersion, OrderId};
use storefront_orders::{NewOrderHeader, Order, OrderFilter, OrderHeader, OrderItem, OrderStatus, ValidatedItem};

/// Order store operation error.
///
/// These are **infrastructure errors** (connectivity, integrity, concurrency)
/// as opposed to domain errors (validation, transitions).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    /// The backing store could not be reached (pool closed, connection lost, lock poisoned).
    #[error("order store unavailable: {0}")]
    Unavailable(String),

    /// Optimistic concurrency check failed.
    #[error("version conflict: {0}")]
    Conflict(String),

    /// Referential integrity or constraint violation.
    #[error("integrity violation: {0}")]
    Integrity(String),

    /// Any other failed statement, including misuse of a finished transaction.
    #[error("query failed: {0}")]
    Query(String),
}

/// A transactional scope over the order store.
///
/// Writes made through the scope are invisible to other readers until
/// `commit()` succeeds. Calling `rollback()`, or dropping the scope without
/// committing, discards all of them.
#[async_trait::async_trait]
pub trait OrderTransaction: Send {
    /// Insert an order header; the store assigns id, version and timestamps.
    async fn insert_order(&mut self, header: &NewOrderHeader) -> Result<OrderHeader, StoreError>;

    /// Insert line items for an order created in this same scope.
    async fn insert_items(
        &mut self,
        order_id: OrderId,
        items: &[ValidatedItem],
    ) -> Result<Vec<OrderItem>, StoreError>;

    async fn commit(&mut self) -> Result<(), StoreError>;

    async fn rollback(&mut self) -> Result<(), StoreError>;
}

/// Durable persistence for orders and the items they own.
///
/// ## Implementation Requirements
///
/// - `begin()` returns an isolated unit of work (all or nothing)
/// - items reference an existing order; deleting an order removes its items
/// - a committed order is immediately visible to `get()` and `list()`
/// - `list()` returns newest first
/// - `update_status()` bumps `version` and `updated_at`, honouring `expected`
#[async_trait::async_trait]
pub trait OrderStore: Send + Sync {
    async fn begin(&self) -> Result<Box<dyn OrderTransaction>, StoreError>;

    /// Persist a header and all its items atomically.
    ///
    /// The stored line totals must add up to `header.total_amount`; any
    /// failure before commit rolls the scope back.
    async fn create_order(
        &self,
        header: &NewOrderHeader,
        items: &[ValidatedItem],
    ) -> Result<Order, StoreError> {
        let mut tx = self.begin().await?;
        let written = async {
            let row = tx.insert_order(header).await?;
            let stored = tx.insert_items(row.id, items).await?;
            let order = row.with_items(stored);
            if order.items_total() != Some(header.total_amount) {
                return Err(StoreError::Integrity(format!(
                    "stored items of order {} do not add up to {}",
                    order.id, header.total_amount
                )));
            }
            Ok::<_, StoreError>(order)
        }
        .await;

        match written {
            Ok(order) => {
                tx.commit().await?;
                Ok(order)
            }
            Err(e) => {
                if let Err(rollback_err) = tx.rollback().await {
                    warn!(error = %rollback_err, "rollback failed");
                }
                Err(e)
            }
        }
    }

    async fn get(&self, id: OrderId) -> Result<Option<Order>, StoreError>;

    async fn list(&self, filter: &OrderFilter) -> Result<Vec<Order>, StoreError>;

    /// Returns `Ok(None)` when the order does not exist.
    async fn update_status(
        &self,
        id: OrderId,
        status: OrderStatus,
        expected: ExpectedVersion,
    ) -> Result<Option<Order>, StoreError>;

    /// Delete an order and, by cascade, its items. Returns whether it existed.
    async fn delete(&self, id: OrderId) -> Result<bool, StoreError>;

    /// Short backend name for health reporting.
    fn backend(&self) -> &'static str;
}

#[async_trait::async_trait]
impl<S> OrderStore for Arc<S>
where
    S: OrderStore + ?Sized,
{
    async fn begin(&self) -> Result<Box<dyn OrderTransaction>, StoreError> {
        (**self).begin().await
    }

    async fn create_order(
        &self,
        header: &NewOrderHeader,
        items: &[ValidatedItem],
    ) -> Result<Order, StoreError> {
        (**self).create_order(header, items).await
    }

    async fn get(&self, id: OrderId) -> Result<Option<Order>, StoreError> {
        (**self).get(id).await
    }

    async fn list(&self, filter: &OrderFilter) -> Result<Vec<Order>, StoreError> {
        (**self).list(filter).await
    }

    async fn update_status(
        &self,
        id: OrderId,
        status: OrderStatus,
        expected: ExpectedVersion,
    ) -> Result<Option<Order>, StoreError> {
        (**self).update_status(id, status, expected).await
    }

    async fn delete(&self, id: OrderId) -> Result<bool, StoreError> {
        (**self).delete(id).await
    }

    fn backend(&self) -> &'static str {
        (**self).backend()
    }
}
