//! Basket cart library.
//!
//! The in-process cart for the grocery storefront: an explicit [`CartStore`]
//! that owns the shopper's lines, prices them with quantity-tiered
//! promotions, notifies subscribers on every change, and keeps a per-user
//! copy on a remote store eventually consistent through a background
//! [`SyncWorker`].
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use basket_cart::{CartStore, Catalog, remote::MemoryCartStore};
//! use basket_core::{ItemId, UserId};
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let catalog = Arc::new(Catalog::builtin()?);
//! let store = CartStore::builder(catalog, Arc::new(MemoryCartStore::new())).spawn();
//!
//! let _listener = store.subscribe(|| tracing::info!("cart changed"));
//! store.bind_user(Some(UserId::random()));
//! store.add_item_by_id(ItemId::new(1));
//!
//! tracing::info!(total = %store.compute_total(), "priced cart");
//! store.shutdown().await?;
//! # Ok(())
//! # }
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod catalog;
pub mod clock;
pub mod config;
pub mod db;
pub mod error;
pub mod listeners;
pub mod pricing;
pub mod remote;
pub mod store;
pub mod sync;

pub use catalog::{Catalog, CatalogQuery, CatalogSort};
pub use clock::{Clock, FixedClock, SystemClock};
pub use config::{CartConfig, ConfigError, RemoteBackend};
pub use error::{CatalogError, StoreError};
pub use listeners::ListenerId;
pub use pricing::{CartLine, CartTotals, MAX_QUANTITY};
pub use remote::{PersistedCartRow, RemoteCartStore, RemoteError};
pub use store::{CartSnapshot, CartStore, CartStoreBuilder};
pub use sync::{DEFAULT_SYNC_DEBOUNCE, SyncStatus, SyncWorker};
