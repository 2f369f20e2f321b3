//! Order lifecycle orchestration.
//!
//! The lifecycle manager is the one place that decides between commit and
//! rollback and translates validator, store, and domain failures into the
//! caller-facing [`OrderError`] taxonomy.
//!
//! ## Order Creation Flow
//!
//! ```text
//! NewOrderRequest
//!   ↓
//! 1. Shape checks (name, email, non-empty items, positive quantities)
//!   ↓
//! 2. Validate items against the catalog (sequential lookups, no transaction open)
//!   ↓
//! 3. begin()
//!   ↓
//! 4. insert_order(status = pending, total)
//!   ↓
//! 5. insert_items(validated snapshots)
//!   ↓
//! 6. commit()   (any failure in 3..6 rolls back; nothing is persisted)
//! ```

use thiserror::Error;
use tracing::{Span, info, instrument, warn};

use storefront_core::{DomainError, ExpectedVersion, OrderId};
use storefront_orders::{
    NewOrderHeader, NewOrderRequest, Order, OrderFilter, OrderStatus, Transition, TransitionPolicy,
};

use crate::catalog::ProductCatalog;
use crate::order_store::{OrderStore, StoreError};
use crate::order_validator::{OrderValidator, Rejection};

/// Caller-facing failure of a lifecycle operation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OrderError {
    /// Missing or malformed input; nothing was looked up or written.
    #[error("{0}")]
    Validation(String),

    /// A referenced product does not exist or could not be verified.
    #[error("{message}")]
    Reference { product_id: String, message: String },

    #[error("Order {0} not found")]
    NotFound(OrderId),

    /// Stale version supplied by the caller or lost to a concurrent write.
    #[error("{0}")]
    Conflict(String),

    /// Status change not permitted by the active transition policy.
    #[error("{0}")]
    InvalidTransition(String),

    /// The order store failed; any open transaction was rolled back first.
    #[error("storage failure: {0}")]
    Storage(String),
}

impl OrderError {
    /// Reference error for a product id the caller supplied, used as-is in the message.
    pub fn unknown_product(raw: impl Into<String>) -> Self {
        let product_id = raw.into();
        OrderError::Reference {
            message: format!("Product {product_id} not found"),
            product_id,
        }
    }
}

impl From<DomainError> for OrderError {
    fn from(value: DomainError) -> Self {
        match value {
            DomainError::Validation(msg) => OrderError::Validation(msg),
            DomainError::InvalidId(msg) => OrderError::Validation(msg),
            DomainError::InvariantViolation(msg) => OrderError::Validation(msg),
            DomainError::Conflict(msg) => OrderError::Conflict(msg),
        }
    }
}

impl From<Rejection> for OrderError {
    fn from(value: Rejection) -> Self {
        match value {
            Rejection::Invalid(err) => err.into(),
            Rejection::ProductNotFound(id) => OrderError::unknown_product(id.to_string()),
            // The transport reason stays in the log; callers only learn which product.
            Rejection::CatalogUnavailable { product_id, .. } => OrderError::Reference {
                product_id: product_id.to_string(),
                message: format!("Product {product_id} could not be verified"),
            },
        }
    }
}

impl From<StoreError> for OrderError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::Conflict(msg) => OrderError::Conflict(msg),
            other => OrderError::Storage(other.to_string()),
        }
    }
}

/// Creates orders atomically and moves them through their status lifecycle.
///
/// ## Generic Parameters
///
/// - `S`: order store backend
/// - `C`: product catalog used for item validation
#[derive(Debug)]
pub struct OrderLifecycle<S, C> {
    store: S,
    validator: OrderValidator<C>,
    policy: TransitionPolicy,
}

impl<S, C> OrderLifecycle<S, C>
where
    S: OrderStore,
    C: ProductCatalog,
{
    /// Lifecycle with the lenient transition policy.
    pub fn new(store: S, catalog: C) -> Self {
        Self::with_policy(store, catalog, TransitionPolicy::default())
    }

    pub fn with_policy(store: S, catalog: C, policy: TransitionPolicy) -> Self {
        Self {
            store,
            validator: OrderValidator::new(catalog),
            policy,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn catalog(&self) -> &C {
        self.validator.catalog()
    }

    pub fn policy(&self) -> TransitionPolicy {
        self.policy
    }

    /// Validate, price, and persist a new order with status `pending`.
    #[instrument(
        skip_all,
        fields(
            customer_email = %request.customer_email,
            item_count = request.items.len(),
            order_id = tracing::field::Empty
        ),
        err
    )]
    pub async fn create_order(&self, request: NewOrderRequest) -> Result<Order, OrderError> {
        request.validate()?;

        let validated = self.validator.validate(&request.items).await.map_err(|rejection| {
            warn!(product_id = ?rejection.product_id(), %rejection, "order rejected");
            OrderError::from(rejection)
        })?;
        let (items, total) = validated.into_parts();

        let header = NewOrderHeader {
            customer_name: request.customer_name,
            customer_email: request.customer_email,
            status: OrderStatus::Pending,
            total_amount: total,
        };

        let order = self.store.create_order(&header, &items).await?;

        Span::current().record("order_id", order.id.get());
        info!(order_id = %order.id, total = %order.total_amount, "order created");
        Ok(order)
    }

    /// Move an order to `target`, which must name one of the known statuses.
    ///
    /// Re-applying the current status succeeds without writing. With
    /// `expected_version` the write only happens if the stored version still
    /// matches; the strict policy always conditions on the version it read.
    #[instrument(skip(self), fields(order_id = %id), err)]
    pub async fn set_status(
        &self,
        id: OrderId,
        target: &str,
        expected_version: Option<u64>,
    ) -> Result<Order, OrderError> {
        let target: OrderStatus = target.parse()?;

        let current = self.store.get(id).await?.ok_or(OrderError::NotFound(id))?;

        let transition = self.policy.check(current.status, target).map_err(|e| match e {
            DomainError::Conflict(msg) => OrderError::InvalidTransition(msg),
            other => other.into(),
        })?;

        let (from, to) = match transition {
            Transition::NoOp => {
                if let Some(v) = expected_version {
                    ExpectedVersion::Exact(v).check(current.version)?;
                }
                return Ok(current);
            }
            Transition::Change { from, to } => (from, to),
        };

        let expected = match expected_version {
            Some(v) => ExpectedVersion::Exact(v),
            None if self.policy.is_strict() => ExpectedVersion::Exact(current.version),
            None => ExpectedVersion::Any,
        };

        let updated = self
            .store
            .update_status(id, to, expected)
            .await?
            .ok_or(OrderError::NotFound(id))?;

        info!(%from, %to, version = updated.version, "order status changed");
        Ok(updated)
    }

    pub async fn get_order(&self, id: OrderId) -> Result<Order, OrderError> {
        self.store.get(id).await?.ok_or(OrderError::NotFound(id))
    }

    pub async fn list_orders(&self, filter: &OrderFilter) -> Result<Vec<Order>, OrderError> {
        Ok(self.store.list(filter).await?)
    }

    #[instrument(skip(self), fields(order_id = %id), err)]
    pub async fn delete_order(&self, id: OrderId) -> Result<(), OrderError> {
        if self.store.delete(id).await? {
            info!("order deleted");
            Ok(())
        } else {
            Err(OrderError::NotFound(id))
        }
    }
}
