//! Infrastructure layer: catalog client, order persistence, orchestration, config.

pub mod catalog;
pub mod config;
pub mod order_lifecycle;
pub mod order_store;
pub mod order_validator;

pub use catalog::{HttpCatalogClient, InMemoryCatalog, LookupError, Product, ProductCatalog};
pub use config::{ConfigError, OrdersConfig};
pub use order_lifecycle::{OrderError, OrderLifecycle};
pub use order_store::{InMemoryOrderStore, OrderStore, OrderTransaction, PostgresOrderStore, StoreError};
pub use order_validator::{OrderValidator, Rejection};
