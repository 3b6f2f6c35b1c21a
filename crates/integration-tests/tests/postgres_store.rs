//! Integration tests for the `PostgreSQL` cart backend.
//!
//! Require a running database named by `CART_TEST_DATABASE_URL`; the
//! migrations are applied on connect.

#![allow(clippy::unwrap_used)]

use std::sync::Arc;
use std::time::Duration;

use basket_cart::remote::PgCartStore;
use basket_cart::{RemoteCartStore, db};
use basket_core::{ItemId, UserId};
use basket_integration_tests::{fixed_now, row, row_pairs, spawn_store};
use secrecy::SecretString;

async fn connect() -> PgCartStore {
    let url = std::env::var("CART_TEST_DATABASE_URL").unwrap();
    let pool = db::create_pool(&SecretString::from(url)).await.unwrap();
    db::run_migrations(&pool).await.unwrap();
    PgCartStore::new(pool)
}

#[tokio::test]
#[ignore = "Requires running PostgreSQL"]
async fn test_replace_then_fetch() {
    let store = connect().await;
    let user = UserId::random();

    store
        .replace_rows(user, &[row(user, 1, 2), row(user, 3, 1)])
        .await
        .unwrap();
    store.replace_rows(user, &[row(user, 4, 5)]).await.unwrap();

    let rows = store.fetch_rows(user).await.unwrap();
    assert_eq!(row_pairs(&rows), vec![(4, 5)]);
    assert!(rows.iter().all(|row| row.updated_at.is_some()));
}

#[tokio::test]
#[ignore = "Requires running PostgreSQL"]
async fn test_replace_with_nothing_deletes() {
    let store = connect().await;
    let user = UserId::random();

    store.replace_rows(user, &[row(user, 1, 2)]).await.unwrap();
    store.replace_rows(user, &[]).await.unwrap();

    assert!(store.fetch_rows(user).await.unwrap().is_empty());
}

#[tokio::test]
#[ignore = "Requires running PostgreSQL"]
async fn test_rows_are_scoped_to_user() {
    let store = connect().await;
    let alice = UserId::random();
    let bob = UserId::random();

    store.replace_rows(alice, &[row(alice, 1, 1)]).await.unwrap();
    store.replace_rows(bob, &[row(bob, 3, 2)]).await.unwrap();
    store.delete_rows(alice).await.unwrap();

    assert!(store.fetch_rows(alice).await.unwrap().is_empty());
    assert_eq!(row_pairs(&store.fetch_rows(bob).await.unwrap()), vec![(3, 2)]);
}

#[tokio::test]
#[ignore = "Requires running PostgreSQL"]
async fn test_cart_store_round_trip_through_postgres() {
    let remote: Arc<dyn RemoteCartStore> = Arc::new(connect().await);
    let user = UserId::random();

    let writer = spawn_store(Arc::clone(&remote), Duration::ZERO);
    writer.bind_user(Some(user));
    writer.wait_idle().await.unwrap();
    writer.set_quantity(ItemId::new(1), 3);
    writer.shutdown().await.unwrap();

    let persisted = remote.fetch_rows(user).await.unwrap();
    assert_eq!(row_pairs(&persisted), vec![(1, 3)]);
    assert!(persisted.iter().all(|row| row.updated_at == Some(fixed_now())));

    let reader = spawn_store(remote, Duration::ZERO);
    reader.bind_user(Some(user));
    reader.wait_idle().await.unwrap();
    assert_eq!(reader.snapshot().quantity_of(ItemId::new(1)), 3);
}
