//! Order persistence: a transactional store trait plus Postgres and in-memory backends.

pub mod in_memory;
pub mod postgres;
pub mod r#trait;

pub use in_memory::{FailPoint, InMemoryOrderStore};
pub use postgres::PostgresOrderStore;
pub use r#trait::{OrderStore, OrderTransaction, StoreError};
