//! Remote persisted-cart storage.
//!
//! The persisted cart is one row per `(user, item)`. The cart store only needs
//! three primitives from the remote side: fetch a user's rows, delete them,
//! and bulk-insert a new set. Every sync is a full replace built from those.
//!
//! # Backends
//!
//! - [`MemoryCartStore`] - In-process map for offline use and tests
//! - [`PgCartStore`] - `PostgreSQL` via `sqlx`
//! - [`RestCartStore`] - PostgREST-style HTTP table API via `reqwest`

mod memory;
mod postgres;
mod rest;

pub use memory::MemoryCartStore;
pub use postgres::PgCartStore;
pub use rest::RestCartStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use basket_core::{ItemId, UserId};

/// Errors that can occur when talking to the remote cart store.
#[derive(Debug, Error)]
pub enum RemoteError {
    /// Database operation failed.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The remote answered with a non-success status.
    #[error("remote returned status {status}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body, for diagnostics.
        body: String,
    },

    /// A row could not be decoded.
    #[error("decode error: {0}")]
    Decode(String),

    /// The backend is unreachable (used by the in-memory store's failure injection).
    #[error("remote unavailable: {0}")]
    Unavailable(String),
}

/// One persisted cart row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedCartRow {
    pub user_id: UserId,
    #[serde(rename = "product_id")]
    pub item_id: ItemId,
    pub quantity: i32,
    /// When the row was written. Absent on rows read back from stores that
    /// do not record it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Request/response access to the per-user persisted cart.
///
/// Implementations must be safe to share across tasks; the cart store holds
/// one behind an `Arc` and only calls it from its sync worker.
#[async_trait]
pub trait RemoteCartStore: Send + Sync {
    /// Fetch every persisted row for a user. No rows is `Ok(vec![])`.
    async fn fetch_rows(&self, user_id: UserId) -> Result<Vec<PersistedCartRow>, RemoteError>;

    /// Delete every persisted row for a user.
    async fn delete_rows(&self, user_id: UserId) -> Result<(), RemoteError>;

    /// Insert a batch of rows.
    async fn insert_rows(&self, rows: &[PersistedCartRow]) -> Result<(), RemoteError>;

    /// Replace a user's persisted cart with `rows`.
    ///
    /// Deletes first, then inserts; the insert is skipped entirely for an
    /// empty cart. Backends with transactions should override this to make
    /// the pair atomic.
    async fn replace_rows(
        &self,
        user_id: UserId,
        rows: &[PersistedCartRow],
    ) -> Result<(), RemoteError> {
        self.delete_rows(user_id).await?;
        if !rows.is_empty() {
            self.insert_rows(rows).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_row_wire_format_uses_product_id() {
        let row = PersistedCartRow {
            user_id: "6f1c1b7e-2a7c-4b8e-9f59-0c4d0e6b1a11".parse().unwrap(),
            item_id: ItemId::new(3),
            quantity: 2,
            updated_at: None,
        };
        let json = serde_json::to_value(&row).unwrap();
        assert_eq!(json["product_id"], 3);
        assert_eq!(json["quantity"], 2);
        assert!(json.get("updated_at").is_none());
    }

    #[test]
    fn test_row_decodes_without_timestamp() {
        let row: PersistedCartRow = serde_json::from_str(
            r#"{"user_id": "6f1c1b7e-2a7c-4b8e-9f59-0c4d0e6b1a11", "product_id": 5, "quantity": 1}"#,
        )
        .unwrap();
        assert_eq!(row.item_id, ItemId::new(5));
        assert!(row.updated_at.is_none());
    }
}
