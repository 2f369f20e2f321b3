use std::sync::Arc;

use anyhow::Context;

use storefront_infra::{
    HttpCatalogClient, InMemoryOrderStore, OrderLifecycle, OrderStore, OrdersConfig, PostgresOrderStore,
    ProductCatalog,
};
use storefront_orders::TransitionPolicy;

pub type SharedStore = Arc<dyn OrderStore>;
pub type SharedCatalog = Arc<dyn ProductCatalog>;
pub type Lifecycle = OrderLifecycle<SharedStore, SharedCatalog>;

/// Everything the handlers need, shared behind one `Arc`.
pub struct AppServices {
    pub orders: Lifecycle,
    postgres: Option<PostgresOrderStore>,
}

impl AppServices {
    pub fn new(store: SharedStore, catalog: SharedCatalog, policy: TransitionPolicy) -> Self {
        Self {
            orders: OrderLifecycle::with_policy(store, catalog, policy),
            postgres: None,
        }
    }

    /// Services backed by the in-memory order store.
    pub fn in_memory(catalog: SharedCatalog, policy: TransitionPolicy) -> Self {
        Self::new(Arc::new(InMemoryOrderStore::new()), catalog, policy)
    }

    /// Wire the HTTP catalog client and the configured order store.
    pub async fn from_config(config: &OrdersConfig) -> anyhow::Result<Self> {
        let catalog: SharedCatalog = Arc::new(
            HttpCatalogClient::new(config.catalog_url.clone(), config.catalog_timeout)
                .context("failed to build catalog client")?,
        );
        tracing::info!(
            catalog_url = %config.catalog_url,
            timeout_ms = config.catalog_timeout.as_millis() as u64,
            "catalog client configured"
        );

        let Some(database_url) = config.database_url.as_deref() else {
            tracing::warn!("DATABASE_URL not set; orders are kept in memory and lost on restart");
            return Ok(Self::in_memory(catalog, config.transition_policy));
        };

        let postgres = PostgresOrderStore::connect(database_url, config.db_max_connections)
            .await
            .context("failed to connect to Postgres")?;
        postgres
            .ensure_schema()
            .await
            .context("failed to apply order schema")?;

        let mut services = Self::new(Arc::new(postgres.clone()), catalog, config.transition_policy);
        services.postgres = Some(postgres);
        Ok(services)
    }

    pub fn store_backend(&self) -> &'static str {
        self.orders.store().backend()
    }

    /// Release pooled database connections, if any.
    pub async fn shutdown(&self) {
        if let Some(postgres) = &self.postgres {
            postgres.close().await;
            tracing::info!("database pool closed");
        }
    }
}
