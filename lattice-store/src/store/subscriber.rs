//! Subscriber ids and subscription handles.
//!
//! Every call to `subscribe` registers a fresh entry under its own
//! [`SubscriberId`], so registering the same closure twice yields two
//! independent entries, each removed only by its own [`Subscription`].

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

/// Unique identifier for one registration on a store.
///
/// Ids come from a process-wide atomic counter and are never reused, so a
/// stale handle can never remove somebody else's callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(u64);

impl SubscriberId {
    /// Generate a new unique subscriber ID.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl Default for SubscriberId {
    fn default() -> Self {
        Self::new()
    }
}

type Release = Box<dyn FnOnce() + Send + 'static>;

/// Handle returned by `subscribe`.
///
/// Calling [`unsubscribe`](Subscription::unsubscribe) stops further
/// notifications. It may be called any number of times; only the first call
/// has an effect. Dropping the handle unsubscribes as well, unless it was
/// [`detach`](Subscription::detach)ed first.
#[must_use = "dropping a Subscription unsubscribes its callback"]
pub struct Subscription {
    release: Mutex<Option<Release>>,
}

impl Subscription {
    pub(crate) fn new<F>(release: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self {
            release: Mutex::new(Some(Box::new(release))),
        }
    }

    /// Remove the callback from its store.
    ///
    /// If this was the store's last subscriber, the store's deactivation
    /// cleanup runs before this returns.
    pub fn unsubscribe(&self) {
        // Take first so the lock is released before store code runs.
        let release = self.release.lock().take();
        if let Some(release) = release {
            release();
        }
    }

    /// Whether the callback is still registered through this handle.
    pub fn is_active(&self) -> bool {
        self.release.lock().is_some()
    }

    /// Give up the handle without unsubscribing.
    ///
    /// The callback stays registered for as long as the store lives.
    pub fn detach(self) {
        self.release.lock().take();
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.is_active())
            .finish()
    }
}
