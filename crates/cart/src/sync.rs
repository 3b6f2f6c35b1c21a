//! Background synchronization with the remote cart store.
//!
//! A single [`SyncWorker`] task owns every remote call the cart makes. The
//! store feeds it intents over an unbounded channel and never waits on it:
//!
//! - `Flush` asks for the bound user's persisted cart to be replaced with the
//!   current lines. The worker waits out the debounce window, folds every
//!   queued flush of the same epoch into one write, and reads the lines at
//!   write time, so the last write always carries the latest state.
//! - `Load` fetches a user's persisted rows and installs them as the cart,
//!   unless the bind epoch moved on while the fetch was running.
//!
//! Intents are processed strictly in order, so two writes never interleave
//! and a load always runs before flushes issued after it.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, instrument};

use basket_core::{ItemId, UserId};

use crate::catalog::Catalog;
use crate::error::report_remote_error;
use crate::pricing::{CartLine, MAX_QUANTITY};
use crate::remote::PersistedCartRow;
use crate::store::Shared;

/// Flush coalescing window used when the builder is not told otherwise.
pub const DEFAULT_SYNC_DEBOUNCE: Duration = Duration::from_millis(300);

/// Work items sent from the store to its worker.
#[derive(Debug)]
pub(crate) enum Intent {
    /// Persist the current cart for whoever is bound under `epoch`.
    Flush { epoch: u64 },
    /// Fetch `user_id`'s persisted cart and install it if `epoch` is still current.
    Load { user_id: UserId, epoch: u64 },
    /// Resolved once every earlier intent has been handled.
    Barrier(oneshot::Sender<()>),
    /// Resolved and then the worker exits.
    Shutdown(oneshot::Sender<()>),
}

/// Operator-facing view of the sync worker.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncStatus {
    /// A remote write is running right now.
    pub in_flight: bool,
    /// When the last successful write finished.
    pub last_synced_at: Option<DateTime<Utc>>,
    /// Message of the most recent remote failure, cleared by the next successful write.
    pub last_error: Option<String>,
    pub successful_syncs: u64,
    pub failed_syncs: u64,
    /// Flush intents folded into an earlier write instead of causing their own.
    pub coalesced_intents: u64,
    /// Loads thrown away because the bound identity changed while they ran.
    pub discarded_loads: u64,
}

/// The task that performs remote loads and writes for one
/// [`CartStore`](crate::CartStore).
///
/// Obtained from [`CartStoreBuilder::build`](crate::CartStoreBuilder::build);
/// drive it with [`SyncWorker::run`]. It stops after a shutdown request or
/// once every store handle has been dropped.
pub struct SyncWorker {
    shared: Arc<Shared>,
    intents: mpsc::UnboundedReceiver<Intent>,
    pending: VecDeque<Intent>,
    debounce: Duration,
}

impl std::fmt::Debug for SyncWorker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncWorker")
            .field("debounce", &self.debounce)
            .field("pending", &self.pending.len())
            .finish_non_exhaustive()
    }
}

impl SyncWorker {
    pub(crate) const fn new(
        shared: Arc<Shared>,
        intents: mpsc::UnboundedReceiver<Intent>,
        debounce: Duration,
    ) -> Self {
        Self {
            shared,
            intents,
            pending: VecDeque::new(),
            debounce,
        }
    }

    /// Process intents until shutdown or until every store handle is gone.
    pub async fn run(mut self) {
        debug!(debounce = ?self.debounce, "Cart sync worker started");

        while let Some(intent) = self.next_intent().await {
            match intent {
                Intent::Flush { epoch } => self.flush(epoch).await,
                Intent::Load { user_id, epoch } => self.load(user_id, epoch).await,
                Intent::Barrier(done) => {
                    let _ = done.send(());
                }
                Intent::Shutdown(done) => {
                    let _ = done.send(());
                    break;
                }
            }
        }

        debug!("Cart sync worker stopped");
    }

    #[cfg(test)]
    pub(crate) fn try_next_queued(&mut self) -> Option<Intent> {
        self.intents.try_recv().ok()
    }

    async fn next_intent(&mut self) -> Option<Intent> {
        match self.pending.pop_front() {
            Some(intent) => Some(intent),
            None => self.intents.recv().await,
        }
    }

    /// Pull already-queued flushes for `epoch` off the channel.
    ///
    /// Stops at the first intent of any other kind and parks it in `pending`,
    /// so ordering is preserved.
    fn absorb_flushes(&mut self, epoch: u64) -> u64 {
        let mut absorbed = 0;
        while let Ok(next) = self.intents.try_recv() {
            match next {
                Intent::Flush { epoch: queued } if queued == epoch => absorbed += 1,
                other => {
                    self.pending.push_back(other);
                    break;
                }
            }
        }
        absorbed
    }

    #[instrument(skip(self))]
    async fn flush(&mut self, epoch: u64) {
        if !self.debounce.is_zero() {
            tokio::time::sleep(self.debounce).await;
        }
        let absorbed = self.absorb_flushes(epoch);
        if absorbed > 0 {
            self.shared.update_status(|status| status.coalesced_intents += absorbed);
        }

        let now = self.shared.clock.now();
        let Some((user_id, rows)) = self.shared.rows_for_flush(epoch, now) else {
            debug!("Skipping flush for a superseded identity");
            return;
        };

        self.shared.in_flight.store(true, Ordering::SeqCst);
        let result = self.shared.remote.replace_rows(user_id, &rows).await;
        self.shared.in_flight.store(false, Ordering::SeqCst);

        match result {
            Ok(()) => {
                debug!(user_id = %user_id, rows = rows.len(), absorbed, "Cart synced");
                let finished = self.shared.clock.now();
                self.shared.update_status(|status| {
                    status.successful_syncs += 1;
                    status.last_synced_at = Some(finished);
                    status.last_error = None;
                });
            }
            Err(e) => {
                report_remote_error("sync", user_id, &e);
                self.shared.update_status(|status| {
                    status.failed_syncs += 1;
                    status.last_error = Some(e.to_string());
                });
            }
        }
    }

    #[instrument(skip(self), fields(user_id = %user_id))]
    async fn load(&mut self, user_id: UserId, epoch: u64) {
        if !self.shared.is_current(epoch) {
            debug!("Skipping load for a superseded identity");
            self.shared.update_status(|status| status.discarded_loads += 1);
            return;
        }

        let rows = match self.shared.remote.fetch_rows(user_id).await {
            Ok(rows) => rows,
            Err(e) => {
                report_remote_error("load", user_id, &e);
                self.shared
                    .update_status(|status| status.last_error = Some(e.to_string()));
                return;
            }
        };

        let lines = lines_from_rows(&self.shared.catalog, &rows);
        let line_count = lines.len();
        if self.shared.apply_load(epoch, lines) {
            info!(lines = line_count, "Loaded persisted cart");
        } else {
            debug!("Discarding persisted cart loaded for a superseded identity");
            self.shared.update_status(|status| status.discarded_loads += 1);
        }
    }
}

/// Rebuild cart lines from persisted rows.
///
/// Rows naming an item the catalog does not know are dropped, as are rows
/// with a non-positive quantity. Several rows for the same item are merged
/// by summing. Lines keep the order in which their item first appears.
pub(crate) fn lines_from_rows(catalog: &Catalog, rows: &[PersistedCartRow]) -> Vec<CartLine> {
    let mut lines: Vec<CartLine> = Vec::with_capacity(rows.len());

    for row in rows {
        let Ok(quantity) = u32::try_from(row.quantity) else {
            debug!(item_id = %row.item_id, quantity = row.quantity, "Dropping row with negative quantity");
            continue;
        };
        if quantity == 0 {
            debug!(item_id = %row.item_id, "Dropping row with zero quantity");
            continue;
        }

        if let Some(line) = find_line(&mut lines, row.item_id) {
            line.quantity = line.quantity.saturating_add(quantity).min(MAX_QUANTITY);
            continue;
        }

        match catalog.get(row.item_id) {
            Some(item) => lines.push(CartLine::new(Arc::clone(item), quantity)),
            None => debug!(item_id = %row.item_id, "Dropping row for unknown catalog item"),
        }
    }

    lines
}

fn find_line(lines: &mut [CartLine], item_id: ItemId) -> Option<&mut CartLine> {
    lines.iter_mut().find(|line| line.item_id() == item_id)
}
