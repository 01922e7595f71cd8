//! Writable Store
//!
//! A Writable holds a value that any owner of the handle can replace with
//! [`set`](Writable::set) or [`update`](Writable::update). Subscribers are
//! called once on subscribe and again after every change, in the order they
//! subscribed.
//!
//! Handles are cheap to clone; all clones share the same value and the same
//! subscribers.

use std::fmt::Debug;
use std::sync::Arc;

use super::core::{Cleanup, Setter, StoreCore};
use super::readable::Readable;
use super::subscriber::Subscription;
use super::Store;

/// A store whose value can be set from outside.
///
/// # Example
///
/// ```rust
/// use lattice_store::Writable;
///
/// let count = Writable::new(0);
/// let _sub = count.subscribe(|value| println!("count = {value}"));
///
/// count.set(4);              // prints "count = 4"
/// count.update(|n| n * 2);   // prints "count = 8"
/// count.set(8);              // equal value, nothing printed
/// ```
pub struct Writable<T> {
    core: Arc<StoreCore<T>>,
}

impl<T> Writable<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    /// Create a store holding `value`.
    pub fn new(value: T) -> Self {
        Self {
            core: StoreCore::new(value, None),
        }
    }

    /// Create a store whose `start` hook runs each time the subscriber count
    /// goes from zero to one.
    ///
    /// The hook receives a [`Setter`] and may return a [`Cleanup`], which
    /// runs when the subscriber count drops back to zero.
    pub fn with_start<F>(value: T, start: F) -> Self
    where
        F: Fn(Setter<T>) -> Option<Cleanup> + Send + Sync + 'static,
    {
        Self {
            core: StoreCore::new(value, Some(Box::new(start))),
        }
    }

    /// Get the store's unique ID.
    pub fn id(&self) -> u64 {
        self.core.id()
    }

    /// Set a new value and notify subscribers.
    ///
    /// Does nothing if `value` equals the current value.
    pub fn set(&self, value: T) {
        self.core.set(value);
    }

    /// Set the value computed from the current one.
    pub fn update<F>(&self, f: F)
    where
        F: FnOnce(&T) -> T,
    {
        self.core.update(f);
    }

    /// Register a callback.
    ///
    /// The callback runs immediately with the current value, then after each
    /// change until the returned [`Subscription`] is unsubscribed or dropped.
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        self.core.subscribe(callback)
    }

    /// Read the current value by subscribing and unsubscribing at once.
    ///
    /// On a store with a start hook and no subscribers this runs one full
    /// start/cleanup cycle.
    pub fn get(&self) -> T {
        read_once(&self.core)
    }

    /// A read-only view of this store.
    pub fn readonly(&self) -> Readable<T> {
        Readable::from_core(Arc::clone(&self.core))
    }

    /// Get the number of subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.core.subscriber_count()
    }
}

/// Subscribe, read the value while active, unsubscribe.
pub(crate) fn read_once<T>(core: &Arc<StoreCore<T>>) -> T
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    let subscription = core.subscribe(|_| {});
    let value = core.peek();
    subscription.unsubscribe();
    value
}

impl<T> Store for Writable<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    type Value = T;

    fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        self.core.subscribe(callback)
    }
}

impl<T> Clone for Writable<T> {
    fn clone(&self) -> Self {
        Self {
            core: Arc::clone(&self.core),
        }
    }
}

impl<T> Debug for Writable<T>
where
    T: Clone + PartialEq + Send + Sync + Debug + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Writable")
            .field("id", &self.id())
            .field("value", &self.core.peek())
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
