//! Database migration command.
//!
//! # Usage
//!
//! ```bash
//! CART_REMOTE=postgres basket-cli migrate
//! ```
//!
//! # Environment Variables
//!
//! - `CART_DATABASE_URL` - `PostgreSQL` connection string (falls back to `DATABASE_URL`)
//!
//! # Migration Files
//!
//! `crates/cart/migrations/`

use basket_cart::{CartConfig, RemoteBackend, db};

use super::CliError;

/// Run cart database migrations.
pub async fn run(config: &CartConfig) -> Result<(), CliError> {
    let RemoteBackend::Postgres { database_url } = &config.remote else {
        return Err(CliError::RequiresPostgres(config.remote.name()));
    };

    tracing::info!("Connecting to cart database...");
    let pool = db::create_pool(database_url).await?;

    tracing::info!("Running cart migrations...");
    db::run_migrations(&pool).await?;

    tracing::info!("Cart migrations complete!");
    Ok(())
}
