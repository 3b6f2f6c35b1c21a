//! Command implementations and the shared pieces they need.

pub mod cart;
pub mod catalog;
pub mod migrate;

use std::sync::Arc;

use basket_cart::remote::{MemoryCartStore, PgCartStore, RestCartStore};
use basket_cart::{
    CartConfig, Catalog, CatalogError, RemoteBackend, RemoteCartStore, StoreError, db,
};
use basket_core::ItemId;
use thiserror::Error;

/// Errors that can occur while running a command.
#[derive(Debug, Error)]
pub enum CliError {
    /// Catalog could not be loaded.
    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),

    /// Database connection error.
    #[error("Database connection error: {0}")]
    Database(#[from] sqlx::Error),

    /// A migration failed.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// REST base URL could not be joined with the table path.
    #[error("Invalid REST URL: {0}")]
    RestUrl(#[from] url::ParseError),

    /// The cart store's worker stopped unexpectedly.
    #[error("Cart store error: {0}")]
    Store(#[from] StoreError),

    /// The command needs a different backend.
    #[error("This command requires CART_REMOTE=postgres (configured: {0})")]
    RequiresPostgres(&'static str),

    /// The item id is not in the catalog.
    #[error("Unknown catalog item: {0}")]
    UnknownItem(ItemId),

    /// The persisted cart could not be loaded, so changing it would overwrite it blindly.
    #[error("Failed to load persisted cart: {0}")]
    LoadFailed(String),

    /// Output serialization failed.
    #[error("Output error: {0}")]
    Output(#[from] serde_json::Error),
}

/// Load the configured catalog, or the bundled one.
pub fn load_catalog(config: &CartConfig) -> Result<Catalog, CatalogError> {
    match &config.catalog_path {
        Some(path) => {
            tracing::debug!(path = %path.display(), "Loading catalog from file");
            Catalog::from_path(path)
        }
        None => Catalog::builtin(),
    }
}

/// Connect to the configured remote cart store.
pub async fn connect_remote(config: &CartConfig) -> Result<Arc<dyn RemoteCartStore>, CliError> {
    let remote: Arc<dyn RemoteCartStore> = match &config.remote {
        RemoteBackend::Memory => {
            tracing::warn!("Using in-memory cart storage; changes are lost when the command exits");
            Arc::new(MemoryCartStore::new())
        }
        RemoteBackend::Postgres { database_url } => {
            tracing::info!("Connecting to cart database...");
            let pool = db::create_pool(database_url).await?;
            Arc::new(PgCartStore::new(pool))
        }
        RemoteBackend::Rest { base_url, api_key } => {
            Arc::new(RestCartStore::new(base_url, api_key.clone())?)
        }
    };
    Ok(remote)
}
