//! `PostgreSQL` remote store.
//!
//! Rows live in `cart.cart_items` (see `crates/cart/migrations/`). A replace
//! runs the delete and the `UNNEST` bulk insert in one transaction, so a
//! concurrent reader never observes a half-written cart.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::{debug, instrument};
use uuid::Uuid;

use basket_core::{ItemId, UserId};

use super::{PersistedCartRow, RemoteCartStore, RemoteError};

/// Row shape returned by the fetch query.
#[derive(Debug, sqlx::FromRow)]
struct CartItemRow {
    user_id: UserId,
    product_id: ItemId,
    quantity: i32,
    updated_at: DateTime<Utc>,
}

impl From<CartItemRow> for PersistedCartRow {
    fn from(row: CartItemRow) -> Self {
        Self {
            user_id: row.user_id,
            item_id: row.product_id,
            quantity: row.quantity,
            updated_at: Some(row.updated_at),
        }
    }
}

/// [`RemoteCartStore`] backed by a `PostgreSQL` pool.
#[derive(Debug, Clone)]
pub struct PgCartStore {
    pool: PgPool,
}

impl PgCartStore {
    /// Create a store over an existing pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// The underlying pool.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }
}

type UnnestColumns = (Vec<Uuid>, Vec<i32>, Vec<i32>, Vec<DateTime<Utc>>);

/// Split rows into the parallel arrays bound to the `UNNEST` insert.
///
/// Newtype IDs are unwrapped here because `sqlx` only knows how to encode
/// arrays of the primitive column types.
fn unnest_columns(rows: &[PersistedCartRow]) -> UnnestColumns {
    let now = Utc::now();
    let mut users = Vec::with_capacity(rows.len());
    let mut items = Vec::with_capacity(rows.len());
    let mut quantities = Vec::with_capacity(rows.len());
    let mut stamps = Vec::with_capacity(rows.len());
    for row in rows {
        users.push(row.user_id.as_uuid());
        items.push(row.item_id.as_i32());
        quantities.push(row.quantity);
        stamps.push(row.updated_at.unwrap_or(now));
    }
    (users, items, quantities, stamps)
}

const INSERT_ROWS: &str = r"
    INSERT INTO cart.cart_items (user_id, product_id, quantity, updated_at)
    SELECT * FROM UNNEST($1::uuid[], $2::int4[], $3::int4[], $4::timestamptz[])
";

#[async_trait]
impl RemoteCartStore for PgCartStore {
    #[instrument(skip(self), fields(user_id = %user_id))]
    async fn fetch_rows(&self, user_id: UserId) -> Result<Vec<PersistedCartRow>, RemoteError> {
        let rows = sqlx::query_as::<_, CartItemRow>(
            r"
            SELECT user_id, product_id, quantity, updated_at
            FROM cart.cart_items
            WHERE user_id = $1
            ORDER BY id
            ",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        debug!(count = rows.len(), "Fetched persisted cart rows");
        Ok(rows.into_iter().map(PersistedCartRow::from).collect())
    }

    #[instrument(skip(self), fields(user_id = %user_id))]
    async fn delete_rows(&self, user_id: UserId) -> Result<(), RemoteError> {
        sqlx::query("DELETE FROM cart.cart_items WHERE user_id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    #[instrument(skip(self, rows), fields(count = rows.len()))]
    async fn insert_rows(&self, rows: &[PersistedCartRow]) -> Result<(), RemoteError> {
        if rows.is_empty() {
            return Ok(());
        }
        let (users, items, quantities, stamps) = unnest_columns(rows);
        sqlx::query(INSERT_ROWS)
            .bind(users)
            .bind(items)
            .bind(quantities)
            .bind(stamps)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    #[instrument(skip(self, rows), fields(user_id = %user_id, count = rows.len()))]
    async fn replace_rows(
        &self,
        user_id: UserId,
        rows: &[PersistedCartRow],
    ) -> Result<(), RemoteError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM cart.cart_items WHERE user_id = $1")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

        if !rows.is_empty() {
            let (users, items, quantities, stamps) = unnest_columns(rows);
            sqlx::query(INSERT_ROWS)
                .bind(users)
                .bind(items)
                .bind(quantities)
                .bind(stamps)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        debug!("Replaced persisted cart rows");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unnest_columns_preserves_order() {
        let user = UserId::random();
        let stamp = Utc::now();
        let rows = vec![
            PersistedCartRow {
                user_id: user,
                item_id: ItemId::new(3),
                quantity: 2,
                updated_at: Some(stamp),
            },
            PersistedCartRow {
                user_id: user,
                item_id: ItemId::new(7),
                quantity: 5,
                updated_at: Some(stamp),
            },
        ];

        let (users, items, quantities, stamps) = unnest_columns(&rows);

        assert_eq!(users, vec![user.as_uuid(), user.as_uuid()]);
        assert_eq!(items, vec![3, 7]);
        assert_eq!(quantities, vec![2, 5]);
        assert_eq!(stamps, vec![stamp, stamp]);
    }
}
