//! Database setup for the `PostgreSQL` cart backend.
//!
//! # Schema: `cart`
//!
//! - `cart_items` - One row per `(user_id, product_id)` with its quantity
//!
//! # Migrations
//!
//! Migrations are stored in `crates/cart/migrations/` and run via:
//! ```bash
//! cargo run -p basket-cli -- migrate
//! ```

use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use sqlx::PgPool;
use sqlx::migrate::{MigrateError, Migrator};
use sqlx::postgres::PgPoolOptions;

/// Embedded cart migrations.
pub static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

/// Create a `PostgreSQL` connection pool.
///
/// The cart only ever has one writer (the sync worker), so the pool is small.
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(4)
        .min_connections(1)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}

/// Apply pending migrations.
///
/// # Errors
///
/// Returns `MigrateError` if a migration fails or the recorded history
/// diverges from the embedded files.
pub async fn run_migrations(pool: &PgPool) -> Result<(), MigrateError> {
    MIGRATOR.run(pool).await
}
