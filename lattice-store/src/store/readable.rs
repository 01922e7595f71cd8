//! Readable Store
//!
//! A Readable exposes subscription only. Its value is produced by the start
//! hook given at construction, which runs when the first subscriber arrives
//! and is torn down when the last one leaves. Derived stores and
//! [`Writable::readonly`](super::Writable::readonly) views are Readables too.

use std::fmt::Debug;
use std::sync::Arc;

use super::core::{Cleanup, Setter, StoreCore};
use super::subscriber::Subscription;
use super::writable::read_once;
use super::Store;

/// A store that can only be observed.
///
/// # Example
///
/// ```rust
/// use lattice_store::Readable;
///
/// let greeting = Readable::new(String::new(), |set| {
///     set.set("hello".to_string());
///     None
/// });
///
/// assert_eq!(greeting.get(), "hello");
/// ```
pub struct Readable<T> {
    core: Arc<StoreCore<T>>,
}

impl<T> Readable<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    /// Create a readable store.
    ///
    /// `start` runs each time the subscriber count goes from zero to one;
    /// the [`Cleanup`] it returns runs when the count drops back to zero.
    pub fn new<F>(value: T, start: F) -> Self
    where
        F: Fn(Setter<T>) -> Option<Cleanup> + Send + Sync + 'static,
    {
        Self::from_core(StoreCore::new(value, Some(Box::new(start))))
    }

    pub(crate) fn from_core(core: Arc<StoreCore<T>>) -> Self {
        Self { core }
    }

    /// Get the store's unique ID.
    pub fn id(&self) -> u64 {
        self.core.id()
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
    pub fn get(&self) -> T {
        read_once(&self.core)
    }

    /// Get the number of subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.core.subscriber_count()
    }
}

impl<T> Store for Readable<T>
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

impl<T> Clone for Readable<T> {
    fn clone(&self) -> Self {
        Self {
            core: Arc::clone(&self.core),
        }
    }
}

impl<T> Debug for Readable<T>
where
    T: Clone + PartialEq + Send + Sync + Debug + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Readable")
            .field("id", &self.id())
            .field("value", &self.core.peek())
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}
