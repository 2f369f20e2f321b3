//! Postgres-backed order store.
//!
//! ## Error Mapping
//!
//! | SQLx Error | PostgreSQL Error Code | StoreError | Scenario |
//! |------------|----------------------|------------|----------|
//! | Database (unique violation) | `23505` | `Conflict` | Duplicate key |
//! | Database (foreign key violation) | `23503` | `Integrity` | Item without an order |
//! | Database (check constraint violation) | `23514` | `Integrity` | Unknown status, non-positive quantity |
//! | Database (other) | Any other | `Query` | Other database errors |
//! | PoolClosed / PoolTimedOut / Io | N/A | `Unavailable` | Database unreachable |
//! | Other | N/A | `Query` | Decode failures etc. |
//!
//! ## Thread Safety
//!
//! `PostgresOrderStore` is `Send + Sync` and cheap to clone; all access goes
//! through the SQLx connection pool.

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{FromRow, PgPool, Postgres, Row, Transaction};
use tracing::{Span, info, instrument};

use storefront_core::{ExpectedVersion, Money, OrderId, ProductId};
use storefront_orders::{NewOrderHeader, Order, OrderFilter, OrderHeader, OrderItem, OrderStatus, ValidatedItem};

use super::r#trait::{OrderStore, OrderTransaction, StoreError};

/// Idempotent DDL run by [`PostgresOrderStore::ensure_schema`].
const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS orders (
        id             BIGSERIAL PRIMARY KEY,
        customer_name  TEXT NOT NULL,
        customer_email TEXT NOT NULL,
        status         TEXT NOT NULL DEFAULT 'pending'
                       CHECK (status IN ('pending', 'processing', 'shipped', 'delivered', 'cancelled')),
        total_cents    BIGINT NOT NULL CHECK (total_cents >= 0),
        version        BIGINT NOT NULL DEFAULT 1,
        created_at     TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        updated_at     TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS order_items (
        id           BIGSERIAL PRIMARY KEY,
        order_id     BIGINT NOT NULL REFERENCES orders(id) ON DELETE CASCADE,
        product_id   BIGINT NOT NULL,
        product_name TEXT NOT NULL,
        quantity     BIGINT NOT NULL CHECK (quantity > 0),
        price_cents  BIGINT NOT NULL CHECK (price_cents >= 0)
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_orders_status ON orders(status)",
    "CREATE INDEX IF NOT EXISTS idx_orders_customer_email ON orders(customer_email)",
    "CREATE INDEX IF NOT EXISTS idx_order_items_order_id ON order_items(order_id)",
];

const ORDER_COLUMNS: &str =
    "id, customer_name, customer_email, status, total_cents, version, created_at, updated_at";

const ITEM_COLUMNS: &str = "id, order_id, product_id, product_name, quantity, price_cents";

/// Postgres-backed order store.
///
/// Orders live in `orders`, their line items in `order_items` with a cascading
/// foreign key. Monetary values are stored as integer cents.
#[derive(Debug, Clone)]
pub struct PostgresOrderStore {
    pool: PgPool,
}

impl PostgresOrderStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Open a pool against `database_url`.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(5))
            .connect(database_url)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;
        info!(max_connections, "connected to postgres");
        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Create tables and indexes if they are missing.
    #[instrument(skip(self), err)]
    pub async fn ensure_schema(&self) -> Result<(), StoreError> {
        for statement in SCHEMA {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .map_err(|e| map_sqlx_error("ensure_schema", e))?;
        }
        Ok(())
    }

    /// Release every pooled connection. Further calls fail with `Unavailable`.
    pub async fn close(&self) {
        self.pool.close().await;
    }

    async fn load_items(&self, order_ids: &[i64]) -> Result<HashMap<i64, Vec<OrderItem>>, StoreError> {
        if order_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let rows = sqlx::query(&format!(
            "SELECT {ITEM_COLUMNS} FROM order_items WHERE order_id = ANY($1) ORDER BY id ASC"
        ))
        .bind(order_ids)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("load_items", e))?;

        let mut by_order: HashMap<i64, Vec<OrderItem>> = HashMap::new();
        for row in rows {
            let item = decode::<ItemRow>(&row)?;
            by_order.entry(item.order_id).or_default().push(item.into());
        }
        Ok(by_order)
    }
}

/// Transaction handle over a pooled connection.
///
/// Dropping it without `commit()` rolls back (SQLx issues the ROLLBACK when
/// the connection returns to the pool).
struct PostgresOrderTransaction {
    tx: Option<Transaction<'static, Postgres>>,
}

impl PostgresOrderTransaction {
    fn open(&mut self) -> Result<&mut Transaction<'static, Postgres>, StoreError> {
        self.tx
            .as_mut()
            .ok_or_else(|| StoreError::Query("transaction already finished".to_string()))
    }
}

#[async_trait::async_trait]
impl OrderTransaction for PostgresOrderTransaction {
    #[instrument(
        skip_all,
        fields(
            customer_email = %header.customer_email,
            total = %header.total_amount,
            order_id = tracing::field::Empty
        ),
        err
    )]
    async fn insert_order(&mut self, header: &NewOrderHeader) -> Result<OrderHeader, StoreError> {
        let tx = self.open()?;
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO orders (customer_name, customer_email, status, total_cents)
            VALUES ($1, $2, $3, $4)
            RETURNING {ORDER_COLUMNS}
            "#
        ))
        .bind(&header.customer_name)
        .bind(&header.customer_email)
        .bind(header.status.as_str())
        .bind(header.total_amount.cents())
        .fetch_one(&mut **tx)
        .await
        .map_err(|e| map_sqlx_error("insert_order", e))?;

        let order = decode::<OrderRow>(&row)?.into_header()?;
        Span::current().record("order_id", order.id.get());
        Ok(order)
    }

    #[instrument(skip_all, fields(order_id = %order_id, item_count = items.len()), err)]
    async fn insert_items(
        &mut self,
        order_id: OrderId,
        items: &[ValidatedItem],
    ) -> Result<Vec<OrderItem>, StoreError> {
        let tx = self.open()?;
        let mut stored = Vec::with_capacity(items.len());
        for item in items {
            let row = sqlx::query(&format!(
                r#"
                INSERT INTO order_items (order_id, product_id, product_name, quantity, price_cents)
                VALUES ($1, $2, $3, $4, $5)
                RETURNING {ITEM_COLUMNS}
                "#
            ))
            .bind(order_id.get())
            .bind(item.product_id.get())
            .bind(&item.product_name)
            .bind(item.quantity)
            .bind(item.price.cents())
            .fetch_one(&mut **tx)
            .await
            .map_err(|e| map_sqlx_error("insert_items", e))?;

            stored.push(decode::<ItemRow>(&row)?.into());
        }
        Ok(stored)
    }

    async fn commit(&mut self) -> Result<(), StoreError> {
        let tx = self
            .tx
            .take()
            .ok_or_else(|| StoreError::Query("transaction already finished".to_string()))?;
        tx.commit().await.map_err(|e| map_sqlx_error("commit_transaction", e))
    }

    async fn rollback(&mut self) -> Result<(), StoreError> {
        match self.tx.take() {
            Some(tx) => tx.rollback().await.map_err(|e| map_sqlx_error("rollback", e)),
            None => Ok(()),
        }
    }
}

#[async_trait::async_trait]
impl OrderStore for PostgresOrderStore {
    async fn begin(&self) -> Result<Box<dyn OrderTransaction>, StoreError> {
        let tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;
        Ok(Box::new(PostgresOrderTransaction { tx: Some(tx) }))
    }

    #[instrument(skip(self), fields(order_id = %id), err)]
    async fn get(&self, id: OrderId) -> Result<Option<Order>, StoreError> {
        let row = sqlx::query(&format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1"))
            .bind(id.get())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("get_order", e))?;

        let Some(row) = row else {
            return Ok(None);
        };
        let header = decode::<OrderRow>(&row)?.into_header()?;
        let mut items = self.load_items(&[id.get()]).await?;
        Ok(Some(header.with_items(items.remove(&id.get()).unwrap_or_default())))
    }

    #[instrument(
        skip(self),
        fields(
            status = ?filter.status,
            customer_email = ?filter.customer_email,
            order_count = tracing::field::Empty
        ),
        err
    )]
    async fn list(&self, filter: &OrderFilter) -> Result<Vec<Order>, StoreError> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {ORDER_COLUMNS}
            FROM orders
            WHERE ($1::text IS NULL OR status = $1)
              AND ($2::text IS NULL OR customer_email = $2)
            ORDER BY created_at DESC, id DESC
            "#
        ))
        .bind(filter.status.map(OrderStatus::as_str))
        .bind(filter.customer_email.as_deref())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_orders", e))?;

        let headers = rows
            .iter()
            .map(|row| decode::<OrderRow>(row)?.into_header())
            .collect::<Result<Vec<_>, _>>()?;

        let ids: Vec<i64> = headers.iter().map(|h| h.id.get()).collect();
        let mut items = self.load_items(&ids).await?;

        Span::current().record("order_count", headers.len());
        Ok(headers
            .into_iter()
            .map(|h| {
                let order_items = items.remove(&h.id.get()).unwrap_or_default();
                h.with_items(order_items)
            })
            .collect())
    }

    #[instrument(skip(self), fields(order_id = %id, status = %status, expected = ?expected), err)]
    async fn update_status(
        &self,
        id: OrderId,
        status: OrderStatus,
        expected: ExpectedVersion,
    ) -> Result<Option<Order>, StoreError> {
        let expected_version = match expected {
            ExpectedVersion::Any => None,
            ExpectedVersion::Exact(v) => Some(v as i64),
        };

        let row = sqlx::query(&format!(
            r#"
            UPDATE orders
            SET status = $2, version = version + 1, updated_at = NOW()
            WHERE id = $1 AND ($3::bigint IS NULL OR version = $3)
            RETURNING {ORDER_COLUMNS}
            "#
        ))
        .bind(id.get())
        .bind(status.as_str())
        .bind(expected_version)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("update_status", e))?;

        let Some(row) = row else {
            // Either the order is gone or its version moved on.
            let current: Option<i64> = sqlx::query_scalar("SELECT version FROM orders WHERE id = $1")
                .bind(id.get())
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| map_sqlx_error("update_status", e))?;
            return match current {
                None => Ok(None),
                Some(actual) => Err(StoreError::Conflict(format!(
                    "order {id} is at version {actual}, expected {expected:?}"
                ))),
            };
        };

        let header = decode::<OrderRow>(&row)?.into_header()?;
        let mut items = self.load_items(&[id.get()]).await?;
        Ok(Some(header.with_items(items.remove(&id.get()).unwrap_or_default())))
    }

    #[instrument(skip(self), fields(order_id = %id), err)]
    async fn delete(&self, id: OrderId) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM orders WHERE id = $1")
            .bind(id.get())
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("delete_order", e))?;
        Ok(result.rows_affected() > 0)
    }

    fn backend(&self) -> &'static str {
        "postgres"
    }
}

fn decode<'r, T: FromRow<'r, PgRow>>(row: &'r PgRow) -> Result<T, StoreError> {
    T::from_row(row).map_err(|e| StoreError::Query(format!("failed to decode row: {e}")))
}

/// Map SQLx errors to StoreError.
fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {}: {}", operation, db_err.message());
            match db_err.code().as_deref() {
                Some("23505") => StoreError::Conflict(msg),
                Some("23503") | Some("23514") => StoreError::Integrity(msg),
                _ => StoreError::Query(msg),
            }
        }
        sqlx::Error::PoolClosed => {
            StoreError::Unavailable(format!("connection pool closed in {}", operation))
        }
        sqlx::Error::PoolTimedOut => {
            StoreError::Unavailable(format!("timed out acquiring a connection in {}", operation))
        }
        sqlx::Error::Io(e) => StoreError::Unavailable(format!("io error in {}: {}", operation, e)),
        sqlx::Error::Tls(e) => StoreError::Unavailable(format!("tls error in {}: {}", operation, e)),
        _ => StoreError::Query(format!("sqlx error in {}: {}", operation, err)),
    }
}

// SQLx row types

#[derive(Debug)]
struct OrderRow {
    id: i64,
    customer_name: String,
    customer_email: String,
    status: String,
    total_cents: i64,
    version: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl<'r> FromRow<'r, PgRow> for OrderRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(OrderRow {
            id: row.try_get("id")?,
            customer_name: row.try_get("customer_name")?,
            customer_email: row.try_get("customer_email")?,
            status: row.try_get("status")?,
            total_cents: row.try_get("total_cents")?,
            version: row.try_get("version")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

impl OrderRow {
    fn into_header(self) -> Result<OrderHeader, StoreError> {
        let status = self
            .status
            .parse::<OrderStatus>()
            .map_err(|e| StoreError::Integrity(format!("order {}: {e}", self.id)))?;
        Ok(OrderHeader {
            id: OrderId::new(self.id),
            customer_name: self.customer_name,
            customer_email: self.customer_email,
            status,
            total_amount: Money::from_cents(self.total_cents),
            version: self.version as u64,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(Debug)]
struct ItemRow {
    id: i64,
    order_id: i64,
    product_id: i64,
    product_name: String,
    quantity: i64,
    price_cents: i64,
}

impl<'r> FromRow<'r, PgRow> for ItemRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(ItemRow {
            id: row.try_get("id")?,
            order_id: row.try_get("order_id")?,
            product_id: row.try_get("product_id")?,
            product_name: row.try_get("product_name")?,
            quantity: row.try_get("quantity")?,
            price_cents: row.try_get("price_cents")?,
        })
    }
}

impl From<ItemRow> for OrderItem {
    fn from(row: ItemRow) -> Self {
        OrderItem {
            id: row.id,
            order_id: OrderId::new(row.order_id),
            product_id: ProductId::new(row.product_id),
            product_name: row.product_name,
            quantity: row.quantity,
            price: Money::from_cents(row.price_cents),
        }
    }
}
