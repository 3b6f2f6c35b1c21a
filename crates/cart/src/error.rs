//! Error types and Sentry integration.
//!
//! Local cart operations are total and never fail. The types here cover the
//! edges: loading the catalog, talking to the sync worker, and reporting
//! remote persistence failures, which are logged and captured to Sentry but
//! never surfaced to the caller of a cart mutation.

use thiserror::Error;

use basket_core::{ItemId, UserId};

use crate::remote::RemoteError;

/// Errors raised while building a [`Catalog`](crate::Catalog).
#[derive(Debug, Error)]
pub enum CatalogError {
    /// The catalog file could not be read.
    #[error("failed to read catalog: {0}")]
    Io(#[from] std::io::Error),

    /// The catalog JSON is malformed.
    #[error("failed to parse catalog: {0}")]
    Parse(#[from] serde_json::Error),

    /// Two entries share the same id.
    #[error("duplicate catalog item id {0}")]
    DuplicateId(ItemId),

    /// An entry violates a catalog constraint.
    #[error("invalid catalog item {id}: {reason}")]
    InvalidItem {
        /// The offending item.
        id: ItemId,
        /// What is wrong with it.
        reason: String,
    },
}

/// Errors from the cart store's control surface.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The background sync worker has stopped and can no longer accept work.
    #[error("sync worker has stopped")]
    WorkerStopped,
}

/// Log and capture a remote persistence failure.
///
/// `operation` names what was attempted (`"sync"`, `"load"`). The error is
/// emitted as a structured `tracing` event and sent to Sentry when a client
/// is configured; otherwise the capture is a no-op.
pub fn report_remote_error(operation: &str, user_id: UserId, err: &RemoteError) {
    let event_id = sentry::capture_error(err);
    tracing::error!(
        operation,
        user_id = %user_id,
        error = %err,
        sentry_event_id = %event_id,
        "Remote cart operation failed"
    );
}

/// Set the Sentry user context from a bound cart identity.
pub fn set_sentry_user(user_id: UserId) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user_id.to_string()),
            ..Default::default()
        }));
    });
}

/// Clear the Sentry user context.
///
/// Called on sign-out so later reports are not attributed to the old user.
pub fn clear_sentry_user() {
    sentry::configure_scope(|scope| {
        scope.set_user(None);
    });
}

/// Add a breadcrumb for a cart action.
///
/// Breadcrumbs appear in Sentry error reports to show the trail of cart
/// mutations leading up to a failed sync.
///
/// # Example
///
/// ```rust,ignore
/// add_breadcrumb("cart", "Added item", Some(&[("item_id", "3")]));
/// ```
pub fn add_breadcrumb(category: &str, message: &str, data: Option<&[(&str, &str)]>) {
    let mut breadcrumb = sentry::Breadcrumb {
        category: Some(category.to_string()),
        message: Some(message.to_string()),
        level: sentry::Level::Info,
        ..Default::default()
    };

    if let Some(pairs) = data {
        for (key, value) in pairs {
            breadcrumb.data.insert(
                (*key).to_string(),
                serde_json::Value::String((*value).to_string()),
            );
        }
    }

    sentry::add_breadcrumb(breadcrumb);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_error_display() {
        let err = CatalogError::DuplicateId(ItemId::new(4));
        assert_eq!(err.to_string(), "duplicate catalog item id 4");

        let err = CatalogError::InvalidItem {
            id: ItemId::new(9),
            reason: "price cannot be negative".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "invalid catalog item 9: price cannot be negative"
        );
    }

    #[test]
    fn test_store_error_display() {
        assert_eq!(
            StoreError::WorkerStopped.to_string(),
            "sync worker has stopped"
        );
    }

    #[test]
    fn test_report_without_sentry_client_is_noop() {
        let err = RemoteError::Status {
            status: 503,
            body: "unavailable".to_string(),
        };
        report_remote_error("sync", UserId::random(), &err);
        add_breadcrumb("cart", "Added item", Some(&[("item_id", "1")]));
        clear_sentry_user();
    }
}
