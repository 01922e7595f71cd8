//! Store Core
//!
//! The single primitive every store kind is built on: a value, an ordered
//! set of subscriber callbacks, and an optional start hook that runs when the
//! first subscriber arrives.
//!
//! # Activation Lifecycle
//!
//! 1. `subscribe` inserts the callback. If the store had no subscribers,
//!    the start hook runs with a [`Setter`] and its returned [`Cleanup`] is
//!    kept.
//!
//! 2. The new callback is invoked once with the current value. A `set` made
//!    by the start hook itself only updates the value; the callback sees it
//!    through this first invocation.
//!
//! 3. When the last subscriber leaves, the cleanup runs and is discarded.
//!    The next subscriber starts a new cycle.
//!
//! If the start hook or the first callback panics, `subscribe` removes the
//! registration it made while unwinding, so the store goes back to idle.
//!
//! # Locking
//!
//! All mutable parts live behind one `parking_lot::Mutex`. The lock is never
//! held while user code (callbacks, hooks, cleanups) runs, so callbacks may
//! call back into the same store.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::Mutex;
use smallvec::SmallVec;
use tracing::{debug, trace};

use super::subscriber::{SubscriberId, Subscription};

/// Counter for generating unique store IDs.
static STORE_ID_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Generate a new unique store ID.
fn next_store_id() -> u64 {
    STORE_ID_COUNTER.fetch_add(1, Ordering::Relaxed)
}

/// Teardown returned by a start hook or a manual derive function.
pub type Cleanup = Box<dyn FnOnce() + Send + 'static>;

pub(crate) type Callback<T> = Arc<dyn Fn(&T) + Send + Sync + 'static>;

pub(crate) type StartHook<T> = Box<dyn Fn(Setter<T>) -> Option<Cleanup> + Send + Sync + 'static>;

/// Mutable part of a store.
struct CoreState<T> {
    value: T,

    /// Registration order is notification order.
    subscribers: IndexMap<SubscriberId, Callback<T>>,

    /// True once the start hook of the current cycle has returned.
    active: bool,

    stop: Option<Cleanup>,
}

pub(crate) struct StoreCore<T> {
    id: u64,
    start: Option<StartHook<T>>,
    state: Mutex<CoreState<T>>,
}

impl<T> StoreCore<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    pub(crate) fn new(value: T, start: Option<StartHook<T>>) -> Arc<Self> {
        Arc::new(Self {
            id: next_store_id(),
            start,
            state: Mutex::new(CoreState {
                value,
                subscribers: IndexMap::new(),
                active: false,
                stop: None,
            }),
        })
    }

    /// Current value without subscribing.
    pub(crate) fn peek(&self) -> T {
        self.state.lock().value.clone()
    }

    /// Store `value` and notify subscribers, unless it equals the current one.
    pub(crate) fn set(&self, value: T) {
        let (previous, snapshot) = {
            let mut state = self.state.lock();
            if state.value == value {
                trace!(store = self.id, "set skipped, value unchanged");
                return;
            }
            let previous = std::mem::replace(&mut state.value, value.clone());
            let snapshot = state.active.then(|| {
                state
                    .subscribers
                    .values()
                    .cloned()
                    .collect::<SmallVec<[Callback<T>; 4]>>()
            });
            (previous, snapshot)
        };
        drop(previous);

        let Some(snapshot) = snapshot else {
            return;
        };
        trace!(store = self.id, subscribers = snapshot.len(), "notifying subscribers");
        for callback in &snapshot {
            callback(&value);
        }
    }

    /// Replace the value with `f(current)`.
    ///
    /// The function runs without the lock held.
    pub(crate) fn update<F>(&self, f: F)
    where
        F: FnOnce(&T) -> T,
    {
        let current = self.peek();
        self.set(f(&current));
    }

    pub(crate) fn subscribe<F>(self: &Arc<Self>, callback: F) -> Subscription
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        let id = SubscriberId::new();
        let callback: Callback<T> = Arc::new(callback);

        let first = {
            let mut state = self.state.lock();
            state.subscribers.insert(id, Arc::clone(&callback));
            state.subscribers.len() == 1 && !state.active
        };

        let mut pending = PendingSubscription {
            core: self,
            id,
            armed: true,
        };
        if first {
            self.activate();
        }
        let value = self.peek();
        callback(&value);
        pending.armed = false;

        let core = Arc::clone(self);
        Subscription::new(move || core.unsubscribe(id))
    }

    fn activate(self: &Arc<Self>) {
        debug!(store = self.id, "store activated");
        let stop = match &self.start {
            Some(start) => start(Setter::new(Arc::clone(self))),
            None => None,
        };

        // Everyone may have left while the hook was running.
        let orphaned = {
            let mut state = self.state.lock();
            if state.subscribers.is_empty() {
                stop
            } else {
                state.active = true;
                state.stop = stop;
                None
            }
        };
        if let Some(stop) = orphaned {
            debug!(store = self.id, "store deactivated during start");
            stop();
        }
    }
}

impl<T> StoreCore<T> {
    pub(crate) fn id(&self) -> u64 {
        self.id
    }

    pub(crate) fn subscriber_count(&self) -> usize {
        self.state.lock().subscribers.len()
    }

    fn unsubscribe(&self, id: SubscriberId) {
        // The removed callback may own subscriptions to this store, so it is
        // dropped only once the lock is released.
        let (removed, deactivated, stop) = {
            let mut state = self.state.lock();
            let Some(removed) = state.subscribers.shift_remove(&id) else {
                return;
            };
            if state.subscribers.is_empty() && state.active {
                state.active = false;
                (removed, true, state.stop.take())
            } else {
                (removed, false, None)
            }
        };
        drop(removed);

        if deactivated {
            debug!(store = self.id, "store deactivated");
        }
        if let Some(stop) = stop {
            stop();
        }
    }
}

/// A registration made by `subscribe` that has not yet been handed out as a
/// [`Subscription`]. If the start hook or the first callback panics, dropping
/// it while armed removes the registration again.
struct PendingSubscription<'a, T> {
    core: &'a StoreCore<T>,
    id: SubscriberId,
    armed: bool,
}

impl<T> Drop for PendingSubscription<'_, T> {
    fn drop(&mut self) {
        if self.armed {
            debug!(store = self.core.id, "subscribe unwound, registration removed");
            self.core.unsubscribe(self.id);
        }
    }
}

/// Write access handed to start hooks and manual derive functions.
///
/// Cloning is cheap; all clones write to the same store. A setter may be
/// moved into a timer task or another thread.
pub struct Setter<T> {
    core: Arc<StoreCore<T>>,
}

impl<T> Setter<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    pub(crate) fn new(core: Arc<StoreCore<T>>) -> Self {
        Self { core }
    }

    /// Set the store's value. Equal values are ignored.
    pub fn set(&self, value: T) {
        self.core.set(value);
    }

    /// Set the store's value from its current one.
    pub fn update<F>(&self, f: F)
    where
        F: FnOnce(&T) -> T,
    {
        self.core.update(f);
    }
}

impl<T> Clone for Setter<T> {
    fn clone(&self) -> Self {
        Self {
            core: Arc::clone(&self.core),
        }
    }
}

impl<T> std::fmt::Debug for Setter<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Setter").field("store", &self.core.id).finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
