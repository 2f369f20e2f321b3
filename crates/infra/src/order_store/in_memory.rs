use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, RwLock};

use chrono::Utc;
use tracing::debug;

use storefront_core::{ExpectedVersion, OrderId};
use storefront_orders::{NewOrderHeader, Order, OrderFilter, OrderHeader, OrderItem, OrderStatus, ValidatedItem};

use super::r#trait::{OrderStore, OrderTransaction, StoreError};

/// Point in the write path where a simulated failure can be injected.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum FailPoint {
    InsertOrder,
    InsertItems,
    Commit,
}

#[derive(Debug, Default)]
struct State {
    orders: BTreeMap<OrderId, Order>,
    next_order_id: i64,
    next_item_id: i64,
}

impl State {
    fn allocate_order_id(&mut self) -> OrderId {
        self.next_order_id += 1;
        OrderId::new(self.next_order_id)
    }

    fn allocate_item_id(&mut self) -> i64 {
        self.next_item_id += 1;
        self.next_item_id
    }
}

/// In-memory order store.
///
/// Intended for tests/dev. Transactions stage their writes locally and apply
/// them under a single write lock on commit. Ids come from counters that, like
/// database sequences, are not reused after a rollback.
#[derive(Debug, Default, Clone)]
pub struct InMemoryOrderStore {
    state: Arc<RwLock<State>>,
    fail_next: Arc<Mutex<Option<FailPoint>>>,
}

impl InMemoryOrderStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next write reaching `point` fail with `StoreError::Unavailable`.
    pub fn fail_next(&self, point: FailPoint) {
        if let Ok(mut slot) = self.fail_next.lock() {
            *slot = Some(point);
        }
    }

    /// Number of committed orders.
    pub fn order_count(&self) -> usize {
        self.state.read().map(|s| s.orders.len()).unwrap_or(0)
    }

    /// Number of committed item rows across all orders.
    pub fn item_count(&self) -> usize {
        self.state
            .read()
            .map(|s| s.orders.values().map(|o| o.items.len()).sum())
            .unwrap_or(0)
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, State>, StoreError> {
        self.state
            .read()
            .map_err(|_| StoreError::Unavailable("lock poisoned".to_string()))
    }

    fn write(&self) -> Result<std::sync::RwLockWriteGuard<'_, State>, StoreError> {
        self.state
            .write()
            .map_err(|_| StoreError::Unavailable("lock poisoned".to_string()))
    }
}

fn trip(fail_next: &Mutex<Option<FailPoint>>, point: FailPoint) -> Result<(), StoreError> {
    let mut slot = fail_next
        .lock()
        .map_err(|_| StoreError::Unavailable("lock poisoned".to_string()))?;
    if *slot == Some(point) {
        *slot = None;
        return Err(StoreError::Unavailable(format!("injected failure at {point:?}")));
    }
    Ok(())
}

/// Staged writes of one in-memory transaction.
struct InMemoryTransaction {
    state: Arc<RwLock<State>>,
    fail_next: Arc<Mutex<Option<FailPoint>>>,
    staged: BTreeMap<OrderId, Order>,
    finished: bool,
}

impl InMemoryTransaction {
    fn ensure_open(&self) -> Result<(), StoreError> {
        if self.finished {
            return Err(StoreError::Query("transaction already finished".to_string()));
        }
        Ok(())
    }

    fn with_state<T>(&self, f: impl FnOnce(&mut State) -> T) -> Result<T, StoreError> {
        let mut state = self
            .state
            .write()
            .map_err(|_| StoreError::Unavailable("lock poisoned".to_string()))?;
        Ok(f(&mut state))
    }
}

#[async_trait::async_trait]
impl OrderTransaction for InMemoryTransaction {
    async fn insert_order(&mut self, header: &NewOrderHeader) -> Result<OrderHeader, StoreError> {
        self.ensure_open()?;
        trip(&self.fail_next, FailPoint::InsertOrder)?;

        let id = self.with_state(State::allocate_order_id)?;
        let now = Utc::now();
        let row = OrderHeader {
            id,
            customer_name: header.customer_name.clone(),
            customer_email: header.customer_email.clone(),
            status: header.status,
            total_amount: header.total_amount,
            version: 1,
            created_at: now,
            updated_at: now,
        };
        self.staged.insert(id, row.clone().with_items(Vec::new()));
        Ok(row)
    }

    async fn insert_items(
        &mut self,
        order_id: OrderId,
        items: &[ValidatedItem],
    ) -> Result<Vec<OrderItem>, StoreError> {
        self.ensure_open()?;
        trip(&self.fail_next, FailPoint::InsertItems)?;

        if let Some(item) = items.iter().find(|i| i.quantity <= 0) {
            return Err(StoreError::Integrity(format!(
                "quantity must be positive (product {})",
                item.product_id
            )));
        }

        // Items may only hang off an order staged here; committed orders are never
        // extended after creation.
        if !self.staged.contains_key(&order_id) {
            return Err(StoreError::Integrity(format!("order {order_id} does not exist")));
        }

        let ids = self.with_state(|state| {
            items.iter().map(|_| state.allocate_item_id()).collect::<Vec<_>>()
        })?;
        let rows: Vec<OrderItem> = ids
            .into_iter()
            .zip(items)
            .map(|(id, item)| OrderItem {
                id,
                order_id,
                product_id: item.product_id,
                product_name: item.product_name.clone(),
                quantity: item.quantity,
                price: item.price,
            })
            .collect();

        if let Some(order) = self.staged.get_mut(&order_id) {
            order.items.extend(rows.iter().cloned());
        }
        Ok(rows)
    }

    async fn commit(&mut self) -> Result<(), StoreError> {
        self.ensure_open()?;
        self.finished = true;
        trip(&self.fail_next, FailPoint::Commit)?;

        let staged = std::mem::take(&mut self.staged);
        let count = staged.len();
        self.with_state(|state| state.orders.extend(staged))?;
        debug!(orders = count, "in-memory transaction committed");
        Ok(())
    }

    async fn rollback(&mut self) -> Result<(), StoreError> {
        self.finished = true;
        self.staged.clear();
        Ok(())
    }
}

#[async_trait::async_trait]
impl OrderStore for InMemoryOrderStore {
    async fn begin(&self) -> Result<Box<dyn OrderTransaction>, StoreError> {
        Ok(Box::new(InMemoryTransaction {
            state: self.state.clone(),
            fail_next: self.fail_next.clone(),
            staged: BTreeMap::new(),
            finished: false,
        }))
    }

    async fn get(&self, id: OrderId) -> Result<Option<Order>, StoreError> {
        Ok(self.read()?.orders.get(&id).cloned())
    }

    async fn list(&self, filter: &OrderFilter) -> Result<Vec<Order>, StoreError> {
        let state = self.read()?;
        let mut orders: Vec<Order> = state
            .orders
            .values()
            .filter(|o| filter.matches(o))
            .cloned()
            .collect();

        // Newest first; ids break ties between orders created in the same instant.
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(orders)
    }

    async fn update_status(
        &self,
        id: OrderId,
        status: OrderStatus,
        expected: ExpectedVersion,
    ) -> Result<Option<Order>, StoreError> {
        let mut state = self.write()?;
        let Some(order) = state.orders.get_mut(&id) else {
            return Ok(None);
        };

        expected
            .check(order.version)
            .map_err(|e| StoreError::Conflict(e.to_string()))?;

        order.status = status;
        order.version += 1;
        order.updated_at = Utc::now();
        Ok(Some(order.clone()))
    }

    async fn delete(&self, id: OrderId) -> Result<bool, StoreError> {
        Ok(self.write()?.orders.remove(&id).is_some())
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}
