//! Lattice Store
//!
//! This crate provides subscribable state stores for the Lattice reactive UI
//! framework. It implements:
//!
//! - Writable stores (`set`, `update`, `subscribe`)
//! - Readable stores with lazy start/stop hooks
//! - Derived stores computed from one or more sources, with return-value
//!   and manual (setter-driven) modes
//!
//! # Architecture
//!
//! - `store::core`: the shared primitive (value, ordered subscribers,
//!   activation lifecycle)
//! - `store::writable`, `store::readable`: public store handles
//! - `store::sources`, `store::derived`: source sets and derivations
//!
//! Logging goes through `tracing`; the crate installs no subscriber.
//!
//! # Example
//!
//! ```rust
//! use lattice_store::{derived, Writable};
//!
//! let count = Writable::new(1);
//! let doubled = derived(count.clone(), |n| n * 2);
//!
//! let _sub = doubled.subscribe(|value| println!("doubled: {value}"));
//! // prints "doubled: 2"
//!
//! count.set(5);
//! // prints "doubled: 10"
//! ```

pub mod store;

pub use store::{
    derived, derived_manual, derived_with, Cleanup, Readable, Setter, Sources, Store, SubscriberId, Subscription,
    Writable,
};
