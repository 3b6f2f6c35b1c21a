//! The cart store.
//!
//! [`CartStore`] is the single owner of the shopper's cart. Every operation
//! is synchronous: it takes a short lock, changes the lines, releases the
//! lock, notifies listeners, and (when a user is bound) hands a flush intent
//! to the [`SyncWorker`]. A mutation that finds nothing to change still
//! notifies and flushes, so it re-sends the current cart after a failed
//! write. Nothing here ever waits on the network.
//!
//! # Identity and epochs
//!
//! Each identity change bumps the bind epoch. Loads and flushes carry the
//! epoch they were issued under, and the worker drops any whose epoch is no
//! longer current. That keeps a slow load for a signed-out user from
//! resurrecting their cart, and keeps a flush queued before a user switch
//! from writing one user's cart into another's record.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, info, warn};

use basket_core::{CatalogItem, ItemId, UserId};

use crate::catalog::Catalog;
use crate::clock::{Clock, SystemClock};
use crate::error::{StoreError, add_breadcrumb, clear_sentry_user, set_sentry_user};
use crate::listeners::{ListenerId, Listeners};
use crate::pricing::{self, CartLine, CartTotals, MAX_QUANTITY};
use crate::remote::{PersistedCartRow, RemoteCartStore};
use crate::sync::{DEFAULT_SYNC_DEBOUNCE, Intent, SyncStatus, SyncWorker};

/// Mutable cart state guarded by the store lock.
#[derive(Debug, Default)]
struct CartState {
    lines: Vec<CartLine>,
    user: Option<UserId>,
    epoch: u64,
    version: u64,
}

/// State shared between store handles and the sync worker.
pub(crate) struct Shared {
    pub(crate) catalog: Arc<Catalog>,
    pub(crate) remote: Arc<dyn RemoteCartStore>,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) in_flight: AtomicBool,
    state: Mutex<CartState>,
    listeners: Listeners,
    version_tx: watch::Sender<u64>,
    status: Mutex<SyncStatus>,
}

impl Shared {
    fn lock_state(&self) -> MutexGuard<'_, CartState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Tell listeners and watchers that the cart reached `version`.
    ///
    /// Must be called after the state lock is released.
    fn publish(&self, version: u64) {
        self.listeners.notify();
        // a listener may already have published a newer version
        self.version_tx.send_if_modified(|current| {
            if version > *current {
                *current = version;
                true
            } else {
                false
            }
        });
    }

    pub(crate) fn is_current(&self, epoch: u64) -> bool {
        self.lock_state().epoch == epoch
    }

    /// The rows to write for a flush issued under `epoch`.
    ///
    /// `None` when the epoch is stale or nobody is bound.
    pub(crate) fn rows_for_flush(
        &self,
        epoch: u64,
        now: DateTime<Utc>,
    ) -> Option<(UserId, Vec<PersistedCartRow>)> {
        let state = self.lock_state();
        if state.epoch != epoch {
            return None;
        }
        let user_id = state.user?;
        let rows = state
            .lines
            .iter()
            .map(|line| PersistedCartRow {
                user_id,
                item_id: line.item_id(),
                quantity: i32::try_from(line.quantity).unwrap_or(i32::MAX),
                updated_at: Some(now),
            })
            .collect();
        Some((user_id, rows))
    }

    /// Install loaded lines if `epoch` is still current. Returns whether
    /// they were applied.
    pub(crate) fn apply_load(&self, epoch: u64, lines: Vec<CartLine>) -> bool {
        let version = {
            let mut state = self.lock_state();
            if state.epoch != epoch {
                return false;
            }
            state.lines = lines;
            state.version += 1;
            state.version
        };
        self.publish(version);
        true
    }

    pub(crate) fn update_status(&self, update: impl FnOnce(&mut SyncStatus)) {
        let mut status = self.status.lock().unwrap_or_else(PoisonError::into_inner);
        update(&mut status);
    }
}

/// Immutable copy of the cart at one version.
#[derive(Debug, Clone, PartialEq)]
pub struct CartSnapshot {
    /// Lines in insertion order.
    pub lines: Vec<CartLine>,
    /// Cart version the snapshot was taken at.
    pub version: u64,
}

impl CartSnapshot {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// The line for an item, if it is in the cart.
    #[must_use]
    pub fn line(&self, item_id: ItemId) -> Option<&CartLine> {
        self.lines.iter().find(|line| line.item_id() == item_id)
    }

    #[must_use]
    pub fn quantity_of(&self, item_id: ItemId) -> u32 {
        self.line(item_id).map_or(0, |line| line.quantity)
    }

    #[must_use]
    pub fn totals(&self) -> CartTotals {
        CartTotals::of(&self.lines)
    }
}

/// Configures and creates a [`CartStore`].
pub struct CartStoreBuilder {
    catalog: Arc<Catalog>,
    remote: Arc<dyn RemoteCartStore>,
    clock: Arc<dyn Clock>,
    sync_debounce: Duration,
}

impl std::fmt::Debug for CartStoreBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CartStoreBuilder")
            .field("catalog_items", &self.catalog.len())
            .field("sync_debounce", &self.sync_debounce)
            .finish_non_exhaustive()
    }
}

impl CartStoreBuilder {
    /// How long the worker waits after a flush intent before writing, so a
    /// burst of mutations becomes one write. Zero writes immediately.
    #[must_use]
    pub const fn sync_debounce(mut self, debounce: Duration) -> Self {
        self.sync_debounce = debounce;
        self
    }

    /// Clock used to stamp persisted rows and sync status.
    #[must_use]
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Create the store and its worker without starting the worker.
    #[must_use]
    pub fn build(self) -> (CartStore, SyncWorker) {
        let (intents_tx, intents_rx) = mpsc::unbounded_channel();
        let (version_tx, _) = watch::channel(0);

        let shared = Arc::new(Shared {
            catalog: self.catalog,
            remote: self.remote,
            clock: self.clock,
            in_flight: AtomicBool::new(false),
            state: Mutex::new(CartState::default()),
            listeners: Listeners::default(),
            version_tx,
            status: Mutex::new(SyncStatus::default()),
        });

        let worker = SyncWorker::new(Arc::clone(&shared), intents_rx, self.sync_debounce);
        let store = CartStore {
            shared,
            intents: intents_tx,
        };
        (store, worker)
    }

    /// Create the store and spawn its worker on the current Tokio runtime.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    #[must_use]
    pub fn spawn(self) -> CartStore {
        let (store, worker) = self.build();
        tokio::spawn(worker.run());
        store
    }
}

/// Handle to the cart. Cheap to clone; all clones share one cart.
#[derive(Clone)]
pub struct CartStore {
    shared: Arc<Shared>,
    intents: mpsc::UnboundedSender<Intent>,
}

impl std::fmt::Debug for CartStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.shared.lock_state();
        f.debug_struct("CartStore")
            .field("user", &state.user)
            .field("lines", &state.lines.len())
            .field("version", &state.version)
            .field("listeners", &self.shared.listeners)
            .finish_non_exhaustive()
    }
}

impl CartStore {
    /// Start configuring a store over `catalog` that persists to `remote`.
    #[must_use]
    pub fn builder(catalog: Arc<Catalog>, remote: Arc<dyn RemoteCartStore>) -> CartStoreBuilder {
        CartStoreBuilder {
            catalog,
            remote,
            clock: Arc::new(SystemClock),
            sync_debounce: DEFAULT_SYNC_DEBOUNCE,
        }
    }

    /// The catalog this store resolves item ids against.
    #[must_use]
    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.shared.catalog
    }

    // -------------------------------------------------------------------------
    // Mutations
    // -------------------------------------------------------------------------

    /// Add one unit of `item`, creating its line if needed.
    ///
    /// A line already at [`MAX_QUANTITY`] stays there.
    pub fn add_item(&self, item: Arc<CatalogItem>) {
        let item_id = item.id;
        self.mutate("Added item", Some(item_id), |lines| {
            match lines.iter_mut().find(|line| line.item_id() == item_id) {
                Some(line) => line.quantity = line.quantity.saturating_add(1).min(MAX_QUANTITY),
                None => lines.push(CartLine::new(item, 1)),
            }
        });
    }

    /// Add one unit of the catalog item `item_id`.
    ///
    /// Returns `false`, changing nothing, if the catalog has no such item.
    pub fn add_item_by_id(&self, item_id: ItemId) -> bool {
        match self.shared.catalog.get(item_id) {
            Some(item) => {
                self.add_item(Arc::clone(item));
                true
            }
            None => {
                debug!(item_id = %item_id, "Ignoring add of unknown catalog item");
                false
            }
        }
    }

    /// Remove the line for `item_id`.
    ///
    /// If the item is not in the cart the lines are untouched, but listeners
    /// still run and a flush is still scheduled.
    pub fn remove_item(&self, item_id: ItemId) {
        self.mutate("Removed item", Some(item_id), |lines| {
            lines.retain(|line| line.item_id() != item_id);
        });
    }

    /// Set the quantity of `item_id`.
    ///
    /// A quantity of zero or less removes the line. A positive quantity
    /// updates the line, or creates it if the catalog knows the item.
    /// Quantities beyond [`MAX_QUANTITY`] are clamped. An unknown item
    /// leaves the lines untouched.
    pub fn set_quantity(&self, item_id: ItemId, quantity: i64) {
        if quantity <= 0 {
            self.remove_item(item_id);
            return;
        }
        let quantity = u32::try_from(quantity).map_or(MAX_QUANTITY, |q| q.min(MAX_QUANTITY));
        let resolved = self.shared.catalog.get(item_id).cloned();
        let mut unknown = false;

        self.mutate("Set quantity", Some(item_id), |lines| {
            if let Some(line) = lines.iter_mut().find(|line| line.item_id() == item_id) {
                line.quantity = quantity;
                return;
            }
            match resolved {
                Some(item) => lines.push(CartLine::new(item, quantity)),
                None => unknown = true,
            }
        });

        if unknown {
            debug!(item_id = %item_id, "Ignoring quantity for unknown catalog item");
        }
    }

    /// Empty the cart.
    pub fn clear(&self) {
        self.mutate("Cleared cart", None, Vec::clear);
    }

    /// Apply `change` under the lock, then notify and schedule a flush.
    fn mutate<F>(&self, action: &str, item_id: Option<ItemId>, change: F)
    where
        F: FnOnce(&mut Vec<CartLine>),
    {
        let (version, flush_epoch) = {
            let mut state = self.shared.lock_state();
            change(&mut state.lines);
            state.version += 1;
            (state.version, state.user.map(|_| state.epoch))
        };

        let item_text = item_id.map(|id| id.to_string());
        let data = item_text.as_deref().map(|id| [("item_id", id)]);
        add_breadcrumb("cart", action, data.as_ref().map(<[_; 1]>::as_slice));

        self.shared.publish(version);
        if let Some(epoch) = flush_epoch {
            self.send(Intent::Flush { epoch });
        }
    }

    fn send(&self, intent: Intent) {
        if self.intents.send(intent).is_err() {
            warn!("Cart sync worker has stopped; change will not be persisted");
        }
    }

    // -------------------------------------------------------------------------
    // Identity
    // -------------------------------------------------------------------------

    /// Bind the cart to a signed-in user, or to nobody.
    ///
    /// Binding the identity already bound does nothing. Binding a user
    /// schedules a load of their persisted cart, which replaces the local
    /// cart when it arrives. Switching straight from one user to another
    /// empties the cart first so the old user's lines are never shown to,
    /// or persisted for, the new one. Binding nobody empties the cart
    /// immediately and never touches the remote store.
    pub fn bind_user(&self, user: Option<UserId>) {
        let (epoch, cleared_version) = {
            let mut state = self.shared.lock_state();
            if state.user == user {
                return;
            }
            let switching = state.user.is_some();
            state.user = user;
            state.epoch += 1;

            let cleared = (user.is_none() || switching).then(|| {
                state.lines.clear();
                state.version += 1;
                state.version
            });
            (state.epoch, cleared)
        };

        match user {
            Some(user_id) => {
                info!(user_id = %user_id, "Cart bound to user");
                set_sentry_user(user_id);
                if let Some(version) = cleared_version {
                    self.shared.publish(version);
                }
                self.send(Intent::Load { user_id, epoch });
            }
            None => {
                info!("Cart unbound");
                clear_sentry_user();
                if let Some(version) = cleared_version {
                    self.shared.publish(version);
                }
            }
        }
    }

    /// The currently bound user.
    #[must_use]
    pub fn current_user(&self) -> Option<UserId> {
        self.shared.lock_state().user
    }

    // -------------------------------------------------------------------------
    // Reads
    // -------------------------------------------------------------------------

    /// Copy of the current lines.
    #[must_use]
    pub fn snapshot(&self) -> CartSnapshot {
        let state = self.shared.lock_state();
        CartSnapshot {
            lines: state.lines.clone(),
            version: state.version,
        }
    }

    /// Cart total after promotional tiers.
    #[must_use]
    pub fn compute_total(&self) -> Decimal {
        pricing::total(&self.shared.lock_state().lines)
    }

    /// Cart total at full price.
    #[must_use]
    pub fn compute_original_total(&self) -> Decimal {
        pricing::original_total(&self.shared.lock_state().lines)
    }

    /// `compute_original_total() - compute_total()`, taken from one consistent view.
    #[must_use]
    pub fn compute_savings(&self) -> Decimal {
        pricing::savings(&self.shared.lock_state().lines)
    }

    /// Total number of units across lines.
    #[must_use]
    pub fn count_items(&self) -> u64 {
        pricing::item_count(&self.shared.lock_state().lines)
    }

    #[must_use]
    pub fn totals(&self) -> CartTotals {
        CartTotals::of(&self.shared.lock_state().lines)
    }

    // -------------------------------------------------------------------------
    // Subscription
    // -------------------------------------------------------------------------

    /// Register a callback run after every cart change.
    ///
    /// Callbacks run on the thread that made the change, after the store
    /// lock is released, so they may read or mutate the store.
    pub fn subscribe<F>(&self, listener: F) -> ListenerId
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.shared.listeners.add(listener)
    }

    /// Remove a callback. Returns `false` if it was not registered.
    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        self.shared.listeners.remove(id)
    }

    /// Receiver that observes the cart version after every change.
    #[must_use]
    pub fn changes(&self) -> watch::Receiver<u64> {
        self.shared.version_tx.subscribe()
    }

    // -------------------------------------------------------------------------
    // Sync control
    // -------------------------------------------------------------------------

    /// Whether a remote write is running right now.
    #[must_use]
    pub fn is_syncing(&self) -> bool {
        self.shared.in_flight.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn sync_status(&self) -> SyncStatus {
        let mut status = self
            .shared
            .status
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        status.in_flight = self.is_syncing();
        status
    }

    /// Wait until every intent queued before this call has been handled.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::WorkerStopped` if the worker is not running.
    pub async fn wait_idle(&self) -> Result<(), StoreError> {
        let (done, finished) = oneshot::channel();
        self.intents
            .send(Intent::Barrier(done))
            .map_err(|_| StoreError::WorkerStopped)?;
        finished.await.map_err(|_| StoreError::WorkerStopped)
    }

    /// Let the worker finish queued work, then stop it.
    ///
    /// Later mutations still change the local cart but are no longer persisted.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::WorkerStopped` if the worker already stopped.
    pub async fn shutdown(&self) -> Result<(), StoreError> {
        let (done, finished) = oneshot::channel();
        self.intents
            .send(Intent::Shutdown(done))
            .map_err(|_| StoreError::WorkerStopped)?;
        finished.await.map_err(|_| StoreError::WorkerStopped)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use basket_core::Percent;

    use super::*;
    use crate::remote::MemoryCartStore;

    fn catalog() -> Arc<Catalog> {
        Arc::new(
            Catalog::new(vec![
                CatalogItem::new(ItemId::new(1), "Greek Yogurt", "Dairy", Decimal::from(89))
                    .with_promo(3, Percent::new(Decimal::from(20)).unwrap()),
                CatalogItem::new(ItemId::new(3), "Borodinsky Bread", "Bakery", Decimal::from(65)),
            ])
            .unwrap(),
        )
    }

    /// Store whose worker is never run, for purely local behaviour.
    fn local_store() -> (CartStore, SyncWorker) {
        CartStore::builder(catalog(), Arc::new(MemoryCartStore::new())).build()
    }

    fn yogurt(store: &CartStore) -> Arc<CatalogItem> {
        Arc::clone(store.catalog().get(ItemId::new(1)).unwrap())
    }

    #[test]
    fn test_add_twice_makes_one_line() {
        let (store, _worker) = local_store();
        store.add_item(yogurt(&store));
        store.add_item(yogurt(&store));

        let snapshot = store.snapshot();
        assert_eq!(snapshot.lines.len(), 1);
        assert_eq!(snapshot.quantity_of(ItemId::new(1)), 2);
    }

    #[test]
    fn test_add_by_unknown_id_is_rejected() {
        let (store, _worker) = local_store();
        assert!(!store.add_item_by_id(ItemId::new(42)));
        assert!(store.snapshot().is_empty());
    }

    #[test]
    fn test_set_quantity_non_positive_removes() {
        let (store, _worker) = local_store();
        store.add_item_by_id(ItemId::new(1));
        store.add_item_by_id(ItemId::new(3));

        store.set_quantity(ItemId::new(1), 0);
        store.set_quantity(ItemId::new(3), -5);
        assert!(store.snapshot().is_empty());

        store.set_quantity(ItemId::new(3), -1);
        assert!(store.snapshot().is_empty());
    }

    #[test]
    fn test_set_quantity_creates_and_updates() {
        let (store, _worker) = local_store();
        store.set_quantity(ItemId::new(3), 4);
        assert_eq!(store.snapshot().quantity_of(ItemId::new(3)), 4);

        store.set_quantity(ItemId::new(3), 2);
        assert_eq!(store.snapshot().quantity_of(ItemId::new(3)), 2);
        assert_eq!(store.snapshot().lines.len(), 1);
    }

    #[test]
    fn test_set_quantity_unknown_item_leaves_lines() {
        let (store, _worker) = local_store();
        store.add_item_by_id(ItemId::new(3));
        let before = store.snapshot();

        store.set_quantity(ItemId::new(42), 3);

        let after = store.snapshot();
        assert_eq!(after.lines, before.lines);
        assert_eq!(after.version, before.version + 1);
    }

    #[test]
    fn test_set_quantity_saturates_at_storable_maximum() {
        let (store, _worker) = local_store();
        store.set_quantity(ItemId::new(3), i64::MAX);
        assert_eq!(store.snapshot().quantity_of(ItemId::new(3)), MAX_QUANTITY);

        store.set_quantity(ItemId::new(3), i64::from(u32::MAX));
        assert_eq!(store.snapshot().quantity_of(ItemId::new(3)), MAX_QUANTITY);

        store.add_item_by_id(ItemId::new(3));
        assert_eq!(store.snapshot().quantity_of(ItemId::new(3)), MAX_QUANTITY);
    }

    #[test]
    fn test_invariants_hold_over_mixed_operations() {
        let (store, _worker) = local_store();
        let ops: [(i32, i64); 8] = [(1, 2), (3, 1), (1, -1), (3, 7), (1, 5), (3, 0), (1, 1), (3, 2)];
        for (id, qty) in ops {
            store.add_item_by_id(ItemId::new(id));
            store.set_quantity(ItemId::new(id), qty);
            store.add_item_by_id(ItemId::new(id));

            let snapshot = store.snapshot();
            for line in &snapshot.lines {
                assert!(line.quantity >= 1);
                let same = snapshot
                    .lines
                    .iter()
                    .filter(|other| other.item_id() == line.item_id())
                    .count();
                assert_eq!(same, 1);
            }
        }
    }

    #[test]
    fn test_clear_empties_cart() {
        let (store, _worker) = local_store();
        store.add_item_by_id(ItemId::new(1));
        store.add_item_by_id(ItemId::new(3));
        store.clear();

        assert!(store.snapshot().is_empty());
        assert_eq!(store.count_items(), 0);
        assert_eq!(store.compute_total(), Decimal::ZERO);
    }

    #[test]
    fn test_pricing_through_store() {
        let (store, _worker) = local_store();
        store.set_quantity(ItemId::new(1), 2);
        assert_eq!(store.compute_total(), Decimal::from(178));
        assert_eq!(store.compute_savings(), Decimal::ZERO);

        store.add_item_by_id(ItemId::new(1));
        assert_eq!(store.compute_total(), Decimal::new(2136, 1));
        assert_eq!(store.compute_original_total(), Decimal::from(267));
        assert_eq!(
            store.compute_savings(),
            store.compute_original_total() - store.compute_total()
        );
        assert_eq!(store.count_items(), 3);
    }

    #[test]
    fn test_snapshot_is_a_copy() {
        let (store, _worker) = local_store();
        store.add_item_by_id(ItemId::new(1));
        let before = store.snapshot();
        store.add_item_by_id(ItemId::new(1));

        assert_eq!(before.quantity_of(ItemId::new(1)), 1);
        assert!(store.snapshot().version > before.version);
    }

    #[test]
    fn test_listeners_run_after_each_change() {
        let (store, _worker) = local_store();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let id = store.subscribe(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        store.add_item_by_id(ItemId::new(1));
        store.set_quantity(ItemId::new(1), 4);
        store.remove_item(ItemId::new(1));
        assert_eq!(calls.load(Ordering::SeqCst), 3);

        // nothing left to remove or clear, listeners still run
        store.remove_item(ItemId::new(1));
        store.clear();
        assert_eq!(calls.load(Ordering::SeqCst), 5);

        assert!(store.unsubscribe(id));
        store.add_item_by_id(ItemId::new(1));
        assert_eq!(calls.load(Ordering::SeqCst), 5);
    }

    #[test]
    fn test_listener_can_read_store() {
        let (store, _worker) = local_store();
        let seen = Arc::new(Mutex::new(Vec::new()));
        {
            let reader = store.clone();
            let seen = Arc::clone(&seen);
            store.subscribe(move || seen.lock().unwrap().push(reader.count_items()));
        }

        store.add_item_by_id(ItemId::new(1));
        store.add_item_by_id(ItemId::new(3));

        assert_eq!(*seen.lock().unwrap(), vec![1, 2]);
    }

    #[test]
    fn test_unbind_clears_synchronously() {
        let (store, _worker) = local_store();
        let user = UserId::random();
        store.bind_user(Some(user));
        store.add_item_by_id(ItemId::new(1));

        store.bind_user(None);

        assert!(store.snapshot().is_empty());
        assert_eq!(store.current_user(), None);
    }

    #[test]
    fn test_switching_users_clears_previous_lines() {
        let (store, _worker) = local_store();
        store.bind_user(Some(UserId::random()));
        store.add_item_by_id(ItemId::new(3));

        store.bind_user(Some(UserId::random()));

        assert!(store.snapshot().is_empty());
    }

    #[test]
    fn test_anonymous_mutations_do_not_queue_flushes() {
        let (store, mut worker) = local_store();
        store.add_item_by_id(ItemId::new(1));
        store.clear();
        assert!(worker.try_next_queued().is_none());
    }

    #[test]
    fn test_bound_mutations_queue_load_then_flush() {
        let (store, mut worker) = local_store();
        let user = UserId::random();
        store.bind_user(Some(user));
        store.bind_user(Some(user));
        store.add_item_by_id(ItemId::new(1));

        assert!(matches!(
            worker.try_next_queued(),
            Some(Intent::Load { user_id, epoch: 1 }) if user_id == user
        ));
        assert!(matches!(
            worker.try_next_queued(),
            Some(Intent::Flush { epoch: 1 })
        ));
        assert!(worker.try_next_queued().is_none());
    }

    #[test]
    fn test_unchanged_cart_still_queues_flush() {
        let (store, mut worker) = local_store();
        store.bind_user(Some(UserId::random()));
        assert!(matches!(worker.try_next_queued(), Some(Intent::Load { .. })));

        store.remove_item(ItemId::new(1));
        store.clear();
        store.set_quantity(ItemId::new(42), 2);

        for _ in 0..3 {
            assert!(matches!(
                worker.try_next_queued(),
                Some(Intent::Flush { epoch: 1 })
            ));
        }
        assert!(worker.try_next_queued().is_none());
    }

    #[test]
    fn test_changes_channel_keeps_version_from_nested_mutation() {
        let (store, _worker) = local_store();
        let changes = store.changes();
        {
            let handle = store.clone();
            store.subscribe(move || {
                if handle.snapshot().quantity_of(ItemId::new(3)) == 0 {
                    handle.add_item_by_id(ItemId::new(3));
                }
            });
        }

        store.add_item_by_id(ItemId::new(1));

        assert_eq!(store.snapshot().version, 2);
        assert_eq!(*changes.borrow(), store.snapshot().version);
    }

    #[tokio::test]
    async fn test_changes_channel_tracks_version() {
        let (store, _worker) = local_store();
        let mut changes = store.changes();

        store.add_item_by_id(ItemId::new(1));
        changes.changed().await.unwrap();
        assert_eq!(*changes.borrow_and_update(), store.snapshot().version);
    }

    #[tokio::test]
    async fn test_wait_idle_after_shutdown_fails() {
        let store = CartStore::builder(catalog(), Arc::new(MemoryCartStore::new()))
            .sync_debounce(Duration::ZERO)
            .spawn();
        store.wait_idle().await.unwrap();
        store.shutdown().await.unwrap();

        assert!(matches!(
            store.wait_idle().await,
            Err(StoreError::WorkerStopped)
        ));
    }
}
