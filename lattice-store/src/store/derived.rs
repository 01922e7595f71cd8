//! Derived Stores
//!
//! A derived store is a [`Readable`] whose start hook subscribes to a set of
//! source stores and recomputes its own value whenever any of them changes.
//!
//! # Modes
//!
//! - [`derived`]: the derive function returns the new value, which is set on
//!   every recomputation.
//! - [`derived_manual`]: the derive function receives a [`Setter`] and calls
//!   it itself, now or later (for example from a timer). It may return a
//!   [`Cleanup`] that runs right before the next recomputation and when the
//!   derived store loses its last subscriber.
//!
//! # Activation
//!
//! On activation every source is subscribed in order. Each source reports its
//! current value synchronously while being subscribed; those reports only fill
//! the value slots. Once all sources are subscribed the derive function runs
//! exactly once, so subscribers never see a value computed from a partial set
//! of sources.
//!
//! On deactivation the sources are unsubscribed in order and the pending
//! cleanup, if any, runs.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::trace;

use super::core::{Cleanup, Setter, StoreCore};
use super::sources::{OnChange, Sources};
use super::Readable;

type MapFn<V, T> = Box<dyn Fn(&V) -> T + Send + Sync + 'static>;
type ManualFn<V, T> = Box<dyn Fn(&V, &Setter<T>) -> Option<Cleanup> + Send + Sync + 'static>;

/// How a derivation produces its value.
enum Combine<V, T> {
    /// Return value is the new value.
    Value(MapFn<V, T>),
    /// The function sets the value itself.
    Manual(ManualFn<V, T>),
}

struct Derivation<S: Sources, T> {
    sources: S,
    combine: Combine<S::Values, T>,
}

/// State of one activation cycle of a derived store.
struct Activation<S: Sources, T> {
    derivation: Arc<Derivation<S, T>>,
    slots: Arc<Mutex<S::Slots>>,
    set: Setter<T>,
    initialized: AtomicBool,
    pending: Mutex<Option<Cleanup>>,
}

impl<S, T> Activation<S, T>
where
    S: Sources,
    T: Clone + PartialEq + Send + Sync + 'static,
{
    /// Recompute from the current slots.
    fn sync(&self) {
        self.run_pending();

        let values = {
            let slots = self.slots.lock();
            S::collect(&slots)
        };
        let Some(values) = values else {
            trace!("derived recompute skipped, sources incomplete");
            return;
        };

        trace!("derived recompute");
        match &self.derivation.combine {
            Combine::Value(map) => self.set.set(map(&values)),
            Combine::Manual(run) => {
                let cleanup = run(&values, &self.set);
                *self.pending.lock() = cleanup;
            }
        }
    }

    fn run_pending(&self) {
        let cleanup = self.pending.lock().take();
        if let Some(cleanup) = cleanup {
            cleanup();
        }
    }
}

fn start<S, T>(derivation: &Arc<Derivation<S, T>>, set: Setter<T>) -> Option<Cleanup>
where
    S: Sources,
    T: Clone + PartialEq + Send + Sync + 'static,
{
    let activation = Arc::new(Activation {
        derivation: Arc::clone(derivation),
        slots: Arc::new(Mutex::new(derivation.sources.empty_slots())),
        set,
        initialized: AtomicBool::new(false),
        pending: Mutex::new(None),
    });

    let on_change: OnChange = {
        let activation = Arc::clone(&activation);
        Arc::new(move || {
            if activation.initialized.load(Ordering::SeqCst) {
                activation.sync();
            }
        })
    };

    let subscriptions = derivation
        .sources
        .subscribe_each(&activation.slots, &on_change);

    activation.initialized.store(true, Ordering::SeqCst);
    activation.sync();

    Some(Box::new(move || {
        for subscription in &subscriptions {
            subscription.unsubscribe();
        }
        activation.run_pending();
    }))
}

fn build<S, T>(sources: S, initial: T, combine: Combine<S::Values, T>) -> Readable<T>
where
    S: Sources,
    T: Clone + PartialEq + Send + Sync + 'static,
{
    let derivation = Arc::new(Derivation { sources, combine });
    let core = StoreCore::new(
        initial,
        Some(Box::new(move |set: Setter<T>| start(&derivation, set))),
    );
    Readable::from_core(core)
}

/// Create a store whose value is `map` applied to the values of `sources`.
///
/// Sources are subscribed only while the derived store has subscribers. The
/// first value subscribers see is already computed from every source;
/// `T::default()` only fills the store until its first activation.
///
/// # Example
///
/// ```rust
/// use lattice_store::{derived, Writable};
///
/// let a = Writable::new(2);
/// let b = Writable::new(10);
/// let sum = derived((a.clone(), b.clone()), |(x, y)| x + y);
///
/// assert_eq!(sum.get(), 12);
/// b.set(20);
/// assert_eq!(sum.get(), 22);
/// ```
pub fn derived<S, T, F>(sources: S, map: F) -> Readable<T>
where
    S: Sources,
    T: Clone + PartialEq + Default + Send + Sync + 'static,
    F: Fn(&S::Values) -> T + Send + Sync + 'static,
{
    derived_with(sources, T::default(), map)
}

/// Like [`derived`], for value types without a [`Default`].
///
/// `initial` is held until the first activation computes a real value.
pub fn derived_with<S, T, F>(sources: S, initial: T, map: F) -> Readable<T>
where
    S: Sources,
    T: Clone + PartialEq + Send + Sync + 'static,
    F: Fn(&S::Values) -> T + Send + Sync + 'static,
{
    build(sources, initial, Combine::Value(Box::new(map)))
}

/// Create a store whose value is set by `run` through the given [`Setter`].
///
/// Subscribers see `initial` until `run` sets something else. Whatever
/// [`Cleanup`] `run` returns is invoked once, before the next call to `run`
/// or when the store loses its last subscriber, whichever comes first.
///
/// # Example
///
/// ```rust
/// use lattice_store::{derived_manual, Writable};
///
/// let input = Writable::new(3);
/// let evens = derived_manual(input.clone(), 0, |n, set| {
///     if n % 2 == 0 {
///         set.set(*n);
///     }
///     None
/// });
///
/// assert_eq!(evens.get(), 0);
/// input.set(4);
/// assert_eq!(evens.get(), 4);
/// ```
pub fn derived_manual<S, T, F>(sources: S, initial: T, run: F) -> Readable<T>
where
    S: Sources,
    T: Clone + PartialEq + Send + Sync + 'static,
    F: Fn(&S::Values, &Setter<T>) -> Option<Cleanup> + Send + Sync + 'static,
{
    build(sources, initial, Combine::Manual(Box::new(run)))
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Writable;
    use std::sync::atomic::AtomicUsize;

    fn recorder<T>(store: &Readable<T>) -> (Arc<Mutex<Vec<T>>>, crate::Subscription)
    where
        T: Clone + PartialEq + Send + Sync + 'static,
    {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let subscription = store.subscribe(move |value: &T| sink.lock().push(value.clone()));
        (seen, subscription)
    }

    #[test]
    fn first_value_waits_for_all_sources() {
        let a = Writable::new(2);
        let b = Writable::new(10);
        let calls = Arc::new(AtomicUsize::new(0));
        let summed = {
            let calls = calls.clone();
            derived(vec![a.clone(), b.clone()], move |values| {
                calls.fetch_add(1, Ordering::SeqCst);
                values.iter().sum::<i32>()
            })
        };

        let (seen, _sub) = recorder(&summed);
        assert_eq!(*seen.lock(), vec![12]);
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        a.set(5);
        assert_eq!(*seen.lock(), vec![12, 15]);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn single_source_receives_bare_value() {
        let name = Writable::new("world".to_string());
        let greeting = derived(name.clone(), |name| format!("hello {name}"));

        let (seen, _sub) = recorder(&greeting);
        name.set("lattice".to_string());
        assert_eq!(*seen.lock(), vec!["hello world", "hello lattice"]);
    }

    #[test]
    fn unchanged_result_does_not_notify() {
        let n = Writable::new(1);
        let parity = derived(n.clone(), |n| n % 2);

        let (seen, _sub) = recorder(&parity);
        n.set(3);
        n.set(5);
        n.set(6);
        assert_eq!(*seen.lock(), vec![1, 0]);
    }

    #[test]
    fn sources_subscribed_only_while_active() {
        let a = Writable::new(1);
        let doubled = derived(a.clone(), |x| x * 2);
        assert_eq!(a.subscriber_count(), 0);

        let first = doubled.subscribe(|_| {});
        let second = doubled.subscribe(|_| {});
        assert_eq!(a.subscriber_count(), 1);

        first.unsubscribe();
        assert_eq!(a.subscriber_count(), 1);
        second.unsubscribe();
        assert_eq!(a.subscriber_count(), 0);
    }

    #[test]
    fn derived_of_derived() {
        let a = Writable::new(1);
        let doubled = derived(a.clone(), |x| x * 2);
        let quadrupled = derived(doubled.clone(), |x| x * 2);

        let (seen, sub) = recorder(&quadrupled);
        a.set(2);
        assert_eq!(*seen.lock(), vec![4, 8]);

        sub.unsubscribe();
        assert_eq!(doubled.subscriber_count(), 0);
        assert_eq!(a.subscriber_count(), 0);
    }

    #[test]
    fn manual_cleanup_runs_before_each_recompute_and_on_teardown() {
        let a = Writable::new(0);
        let log = Arc::new(Mutex::new(Vec::new()));
        let store = {
            let log = log.clone();
            derived_manual(a.clone(), -1, move |x, set| {
                log.lock().push(format!("run {x}"));
                set.set(*x);
                let log = log.clone();
                let x = *x;
                Some(Box::new(move || log.lock().push(format!("cleanup {x}"))))
            })
        };

        let (seen, sub) = recorder(&store);
        a.set(1);
        a.set(2);
        sub.unsubscribe();
        sub.unsubscribe();

        assert_eq!(*seen.lock(), vec![0, 1, 2]);
        assert_eq!(
            *log.lock(),
            vec!["run 0", "cleanup 0", "run 1", "cleanup 1", "run 2", "cleanup 2"]
        );
    }

    #[test]
    fn manual_without_set_keeps_initial() {
        let a = Writable::new(7);
        let store = derived_manual(a.clone(), 0, |_, _| None);
        assert_eq!(store.get(), 0);
    }

    #[test]
    fn manual_setter_used_later() {
        let a = Writable::new(1);
        let held = Arc::new(Mutex::new(None));
        let store = {
            let held = held.clone();
            derived_manual(a.clone(), 0, move |x, set| {
                *held.lock() = Some((*x, set.clone()));
                None
            })
        };

        let (seen, _sub) = recorder(&store);
        assert_eq!(*seen.lock(), vec![0]);

        let pending = held.lock().take();
        if let Some((x, set)) = pending {
            set.set(x * 100);
        }
        assert_eq!(*seen.lock(), vec![0, 100]);
    }

    #[test]
    fn teardown_unsubscribes_before_cleanup() {
        let a = Writable::new(0);
        let observed = Arc::new(Mutex::new(None));
        let store = {
            let a_for_cleanup = a.clone();
            let observed = observed.clone();
            derived_manual(a.clone(), 0, move |_, _| {
                let a = a_for_cleanup.clone();
                let observed = observed.clone();
                Some(Box::new(move || {
                    *observed.lock() = Some(a.subscriber_count());
                }))
            })
        };

        let sub = store.subscribe(|_| {});
        drop(sub);
        assert_eq!(*observed.lock(), Some(0));
    }

    #[derive(Clone, Debug, PartialEq)]
    struct Span {
        start: u32,
        end: u32,
    }

    #[test]
    fn derived_with_never_shows_the_placeholder() {
        let start = Writable::new(3);
        let end = Writable::new(8);
        let span = derived_with((start.clone(), end.clone()), Span { start: 0, end: 0 }, |(start, end)| Span {
            start: *start,
            end: *end,
        });

        let (seen, _sub) = recorder(&span);
        end.set(9);
        assert_eq!(*seen.lock(), vec![Span { start: 3, end: 8 }, Span { start: 3, end: 9 }]);
    }

    #[test]
    fn reactivation_resubscribes_sources() {
        let a = Writable::new(1);
        let runs = Arc::new(AtomicUsize::new(0));
        let store = {
            let runs = runs.clone();
            derived(a.clone(), move |x| {
                runs.fetch_add(1, Ordering::SeqCst);
                *x
            })
        };

        assert_eq!(store.get(), 1);
        a.set(2);
        assert_eq!(store.get(), 2);
        assert_eq!(runs.load(Ordering::SeqCst), 2);
    }
}
