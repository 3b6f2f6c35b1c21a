//! Change-listener registry.
//!
//! Listeners are zero-argument callbacks run after every cart change, in
//! registration order. A notification pass works on a snapshot of the
//! registry taken when it starts, and re-checks membership before each call:
//! a listener removed mid-pass (by itself or by another listener) is not
//! called again, and one added mid-pass first runs on the next change.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Handle returned by [`CartStore::subscribe`](crate::CartStore::subscribe),
/// used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u64);

type Callback = Arc<dyn Fn() + Send + Sync>;

#[derive(Default)]
struct Registry {
    next_id: u64,
    entries: Vec<(ListenerId, Callback)>,
}

/// Ordered set of change callbacks.
#[derive(Default)]
pub(crate) struct Listeners {
    registry: Mutex<Registry>,
}

impl std::fmt::Debug for Listeners {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Listeners")
            .field("count", &self.len())
            .finish()
    }
}

impl Listeners {
    pub(crate) fn add<F>(&self, callback: F) -> ListenerId
    where
        F: Fn() + Send + Sync + 'static,
    {
        let mut registry = self.lock();
        let id = ListenerId(registry.next_id);
        registry.next_id += 1;
        registry.entries.push((id, Arc::new(callback)));
        id
    }

    /// Returns `false` if the id was not registered.
    pub(crate) fn remove(&self, id: ListenerId) -> bool {
        let mut registry = self.lock();
        let before = registry.entries.len();
        registry.entries.retain(|(existing, _)| *existing != id);
        registry.entries.len() != before
    }

    pub(crate) fn len(&self) -> usize {
        self.lock().entries.len()
    }

    fn contains(&self, id: ListenerId) -> bool {
        self.lock().entries.iter().any(|(existing, _)| *existing == id)
    }

    /// Call every listener. Must not be called while holding the cart lock.
    pub(crate) fn notify(&self) {
        let snapshot: Vec<(ListenerId, Callback)> = self.lock().entries.clone();
        for (id, callback) in snapshot {
            if self.contains(id) {
                callback();
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, Registry> {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::OnceLock;

    use super::*;

    type Log = Arc<Mutex<Vec<&'static str>>>;

    fn recorder(log: Log, name: &'static str) -> impl Fn() + Send + Sync + 'static {
        move || log.lock().unwrap().push(name)
    }

    #[test]
    fn test_notify_in_registration_order() {
        let listeners = Listeners::default();
        let log = Arc::new(Mutex::new(Vec::new()));
        listeners.add(recorder(Arc::clone(&log), "a"));
        listeners.add(recorder(Arc::clone(&log), "b"));
        listeners.add(recorder(Arc::clone(&log), "c"));

        listeners.notify();

        assert_eq!(*log.lock().unwrap(), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_remove_unknown_returns_false() {
        let listeners = Listeners::default();
        let id = listeners.add(|| {});
        assert!(listeners.remove(id));
        assert!(!listeners.remove(id));
    }

    #[test]
    fn test_self_unsubscribe_during_notify() {
        let listeners = Arc::new(Listeners::default());
        let calls = Arc::new(AtomicUsize::new(0));
        let after = Arc::new(AtomicUsize::new(0));
        let own_id: Arc<OnceLock<ListenerId>> = Arc::new(OnceLock::new());

        let id = {
            let listeners_ref = Arc::clone(&listeners);
            let calls = Arc::clone(&calls);
            let own_id = Arc::clone(&own_id);
            listeners.add(move || {
                calls.fetch_add(1, Ordering::SeqCst);
                if let Some(id) = own_id.get() {
                    listeners_ref.remove(*id);
                }
            })
        };
        own_id.set(id).unwrap();
        {
            let after = Arc::clone(&after);
            listeners.add(move || {
                after.fetch_add(1, Ordering::SeqCst);
            });
        }

        listeners.notify();
        listeners.notify();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(after.load(Ordering::SeqCst), 2);
        assert_eq!(listeners.len(), 1);
    }

    #[test]
    fn test_listener_removed_by_earlier_listener_is_skipped() {
        let listeners = Arc::new(Listeners::default());
        let log = Arc::new(Mutex::new(Vec::new()));
        let victim: Arc<OnceLock<ListenerId>> = Arc::new(OnceLock::new());

        {
            let listeners_ref = Arc::clone(&listeners);
            let victim = Arc::clone(&victim);
            let log = Arc::clone(&log);
            listeners.add(move || {
                log.lock().unwrap().push("killer");
                if let Some(id) = victim.get() {
                    listeners_ref.remove(*id);
                }
            });
        }
        victim.set(listeners.add(recorder(Arc::clone(&log), "victim"))).unwrap();
        listeners.add(recorder(Arc::clone(&log), "bystander"));

        listeners.notify();

        assert_eq!(*log.lock().unwrap(), vec!["killer", "bystander"]);
    }

    #[test]
    fn test_listener_added_during_notify_runs_next_time() {
        let listeners = Arc::new(Listeners::default());
        let late_calls = Arc::new(AtomicUsize::new(0));
        let added = Arc::new(AtomicUsize::new(0));

        {
            let listeners_ref = Arc::clone(&listeners);
            let late_calls = Arc::clone(&late_calls);
            let added = Arc::clone(&added);
            listeners.add(move || {
                if added.fetch_add(1, Ordering::SeqCst) == 0 {
                    let late_calls = Arc::clone(&late_calls);
                    listeners_ref.add(move || {
                        late_calls.fetch_add(1, Ordering::SeqCst);
                    });
                }
            });
        }

        listeners.notify();
        assert_eq!(late_calls.load(Ordering::SeqCst), 0);

        listeners.notify();
        assert_eq!(late_calls.load(Ordering::SeqCst), 1);
    }
}
