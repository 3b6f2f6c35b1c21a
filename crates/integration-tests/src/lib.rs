//! Integration tests for Basket.
//!
//! # Running Tests
//!
//! ```bash
//! # In-memory store behaviour
//! cargo test -p basket-integration-tests
//!
//! # Including PostgreSQL-backed tests
//! CART_TEST_DATABASE_URL=postgres://localhost/basket_test \
//!     cargo test -p basket-integration-tests -- --include-ignored
//! ```
//!
//! # Test Categories
//!
//! - `cart_store` - Local operations, loads, and writes through the store
//! - `sync_worker` - Coalescing, failures, and identity races
//! - `postgres_store` - The `PostgreSQL` backend against a live database

use std::sync::Arc;
use std::time::Duration;

use basket_cart::remote::MemoryCartStore;
use basket_cart::{CartStore, Catalog, FixedClock, PersistedCartRow, RemoteCartStore};
use basket_core::{CatalogItem, ItemId, Percent, UserId};
use chrono::{DateTime, TimeZone, Utc};
use rust_decimal::Decimal;

/// Instant every test store stamps its writes with.
#[must_use]
pub fn fixed_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0)
        .single()
        .unwrap_or_default()
}

/// A small grocery catalog: yogurt with a 3-for-20%-off tier, plain bread,
/// and cheese with a 2-for-half-price tier.
///
/// # Panics
///
/// Panics if the fixture data is invalid.
#[must_use]
#[allow(clippy::unwrap_used)]
pub fn test_catalog() -> Arc<Catalog> {
    let catalog = Catalog::new(vec![
        CatalogItem::new(ItemId::new(1), "Greek Yogurt", "Dairy", Decimal::from(89))
            .with_promo(3, Percent::new(Decimal::from(20)).unwrap()),
        CatalogItem::new(ItemId::new(3), "Borodinsky Bread", "Bakery", Decimal::from(65)),
        CatalogItem::new(ItemId::new(4), "Maasdam Cheese", "Dairy", Decimal::from(320))
            .with_promo(2, Percent::new(Decimal::from(50)).unwrap()),
    ])
    .unwrap();
    Arc::new(catalog)
}

/// Spawn a store over `remote` with the test catalog and clock.
#[must_use]
pub fn spawn_store(remote: Arc<dyn RemoteCartStore>, debounce: Duration) -> CartStore {
    CartStore::builder(test_catalog(), remote)
        .sync_debounce(debounce)
        .clock(Arc::new(FixedClock(fixed_now())))
        .spawn()
}

/// Spawn a store over a fresh in-memory remote, returning both.
#[must_use]
pub fn spawn_memory_store(debounce: Duration) -> (CartStore, Arc<MemoryCartStore>) {
    let remote = Arc::new(MemoryCartStore::new());
    let store = spawn_store(Arc::clone(&remote) as Arc<dyn RemoteCartStore>, debounce);
    (store, remote)
}

/// A persisted row without a timestamp.
#[must_use]
pub const fn row(user_id: UserId, item: i32, quantity: i32) -> PersistedCartRow {
    PersistedCartRow {
        user_id,
        item_id: ItemId::new(item),
        quantity,
        updated_at: None,
    }
}

/// `(item, quantity)` pairs of persisted rows, in row order.
#[must_use]
pub fn row_pairs(rows: &[PersistedCartRow]) -> Vec<(i32, i32)> {
    rows.iter()
        .map(|row| (row.item_id.as_i32(), row.quantity))
        .collect()
}
