//! In-process remote store.
//!
//! Holds persisted rows in a map keyed by user. Used when no real backend is
//! configured and as the test double for the sync worker, so it exposes
//! counters, artificial latency, and failure injection.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use basket_core::UserId;

use super::{PersistedCartRow, RemoteCartStore, RemoteError};

/// In-memory [`RemoteCartStore`].
#[derive(Debug, Default)]
pub struct MemoryCartStore {
    rows: Mutex<HashMap<UserId, Vec<PersistedCartRow>>>,
    fetch_delay: Mutex<Option<Duration>>,
    failing: AtomicBool,
    fail_budget: AtomicUsize,
    fetches: AtomicUsize,
    deletes: AtomicUsize,
    inserts: AtomicUsize,
}

impl MemoryCartStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed persisted rows for a user, replacing whatever was there.
    pub fn seed(&self, user_id: UserId, rows: Vec<PersistedCartRow>) {
        self.lock_rows().insert(user_id, rows);
    }

    /// Current persisted rows for a user.
    #[must_use]
    pub fn rows_for(&self, user_id: UserId) -> Vec<PersistedCartRow> {
        self.lock_rows().get(&user_id).cloned().unwrap_or_default()
    }

    /// Make every subsequent call fail until turned off.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Make the next `n` calls fail.
    pub fn fail_next(&self, n: usize) {
        self.fail_budget.store(n, Ordering::SeqCst);
    }

    /// Delay every fetch by `delay`, simulating a slow network.
    pub fn set_fetch_delay(&self, delay: Option<Duration>) {
        *self
            .fetch_delay
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = delay;
    }

    /// Number of `fetch_rows` calls made so far.
    #[must_use]
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    /// Number of `delete_rows` calls made so far.
    #[must_use]
    pub fn delete_count(&self) -> usize {
        self.deletes.load(Ordering::SeqCst)
    }

    /// Number of `insert_rows` calls made so far.
    #[must_use]
    pub fn insert_count(&self) -> usize {
        self.inserts.load(Ordering::SeqCst)
    }

    fn lock_rows(&self) -> MutexGuard<'_, HashMap<UserId, Vec<PersistedCartRow>>> {
        self.rows.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn check_available(&self, operation: &str) -> Result<(), RemoteError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(RemoteError::Unavailable(format!("{operation} rejected")));
        }
        let consumed = self
            .fail_budget
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if consumed {
            return Err(RemoteError::Unavailable(format!("{operation} rejected")));
        }
        Ok(())
    }
}

#[async_trait]
impl RemoteCartStore for MemoryCartStore {
    async fn fetch_rows(&self, user_id: UserId) -> Result<Vec<PersistedCartRow>, RemoteError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        let delay = *self
            .fetch_delay
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.check_available("fetch")?;
        Ok(self.rows_for(user_id))
    }

    async fn delete_rows(&self, user_id: UserId) -> Result<(), RemoteError> {
        self.deletes.fetch_add(1, Ordering::SeqCst);
        self.check_available("delete")?;
        self.lock_rows().remove(&user_id);
        debug!(user_id = %user_id, "Deleted in-memory cart rows");
        Ok(())
    }

    async fn insert_rows(&self, rows: &[PersistedCartRow]) -> Result<(), RemoteError> {
        self.inserts.fetch_add(1, Ordering::SeqCst);
        self.check_available("insert")?;
        let mut map = self.lock_rows();
        for row in rows {
            map.entry(row.user_id).or_default().push(row.clone());
        }
        Ok(())
    }
}
