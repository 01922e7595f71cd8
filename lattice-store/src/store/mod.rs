//! Stores
//!
//! This module implements subscribable stores: writable, readable, and
//! derived. Every store kind is built on the same core, so they share one
//! subscription model.
//!
//! # Concepts
//!
//! ## Writable
//!
//! A Writable holds a value that can be replaced with `set` or `update`.
//! Setting a value equal to the current one does nothing.
//!
//! ## Readable
//!
//! A Readable can only be subscribed to. Its value comes from a start hook
//! that runs when the first subscriber arrives; the cleanup the hook returns
//! runs when the last subscriber leaves.
//!
//! ## Derived
//!
//! A derived store is a Readable computed from one or more source stores.
//! It holds subscriptions to its sources only while it has subscribers
//! itself.
//!
//! # Notification Order
//!
//! Subscribing calls the callback once, synchronously, with the current
//! value. After that, each change calls every subscriber in the order they
//! subscribed, from a snapshot taken when the change was made. A callback
//! that panics unwinds through the `set` that triggered it; later
//! subscribers in that pass are not called.

mod core;
mod derived;
mod readable;
mod sources;
mod subscriber;
mod writable;

pub use self::core::{Cleanup, Setter};
pub use derived::{derived, derived_manual, derived_with};
pub use readable::Readable;
pub use sources::{OnChange, SourceSubscriptions, Sources};
pub use subscriber::{SubscriberId, Subscription};
pub use writable::Writable;

/// Anything that can be subscribed to.
///
/// Implemented by [`Writable`] and [`Readable`]; used to build source sets
/// for derived stores.
pub trait Store: Send + Sync + 'static {
    /// The type of value delivered to subscribers.
    type Value: Clone + PartialEq + Send + Sync + 'static;

    /// Register a callback, invoked immediately and after every change.
    fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&Self::Value) + Send + Sync + 'static;
}
