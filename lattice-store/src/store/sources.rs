//! Source sets for derived stores.
//!
//! A derived store may read from one store, from a `Vec` of stores sharing a
//! value type, or from a tuple of up to four stores of any value types. The
//! shape of the source set decides the shape of the values handed to the
//! derive function:
//!
//! | sources                      | values           |
//! |------------------------------|------------------|
//! | `Writable<A>` / `Readable<A>`| `A`              |
//! | `Vec<S>`                     | `Vec<S::Value>`  |
//! | `(S1, S2, ...)`              | `(S1::Value, S2::Value, ...)` |

use std::sync::Arc;

use parking_lot::Mutex;
use smallvec::SmallVec;

use super::subscriber::Subscription;
use super::{Readable, Store, Writable};

/// Called by a source after it has written its latest value.
pub type OnChange = Arc<dyn Fn() + Send + Sync + 'static>;

/// Subscriptions held by one activation of a derived store, in source order.
pub type SourceSubscriptions = SmallVec<[Subscription; 4]>;

/// One or more stores a derived store reads from.
pub trait Sources: Send + Sync + 'static {
    /// What the derive function receives.
    type Values: Send + Sync + 'static;

    /// Latest value per source; a slot is empty until its source reports.
    type Slots: Send + 'static;

    /// Slots with nothing reported yet.
    fn empty_slots(&self) -> Self::Slots;

    /// Subscribe to every source in order. Each source writes its slot and
    /// then calls `on_change`.
    fn subscribe_each(&self, slots: &Arc<Mutex<Self::Slots>>, on_change: &OnChange) -> SourceSubscriptions;

    /// The full set of values, or `None` while any slot is empty.
    fn collect(slots: &Self::Slots) -> Option<Self::Values>;
}

fn subscribe_slot<S, W>(source: &S, slots: &Arc<Mutex<W>>, on_change: &OnChange, write: fn(&mut W, S::Value)) -> Subscription
where
    S: Store,
    W: Send + 'static,
{
    let slots = Arc::clone(slots);
    let on_change = Arc::clone(on_change);
    source.subscribe(move |value: &S::Value| {
        write(&mut slots.lock(), value.clone());
        on_change();
    })
}

macro_rules! impl_single_source {
    ($store:ident) => {
        impl<T> Sources for $store<T>
        where
            T: Clone + PartialEq + Send + Sync + 'static,
        {
            type Values = T;
            type Slots = Option<T>;

            fn empty_slots(&self) -> Self::Slots {
                None
            }

            fn subscribe_each(&self, slots: &Arc<Mutex<Self::Slots>>, on_change: &OnChange) -> SourceSubscriptions {
                let mut subscriptions = SourceSubscriptions::new();
                subscriptions.push(subscribe_slot(self, slots, on_change, |slot, value| {
                    *slot = Some(value);
                }));
                subscriptions
            }

            fn collect(slots: &Self::Slots) -> Option<T> {
                slots.clone()
            }
        }
    };
}

impl_single_source!(Writable);
impl_single_source!(Readable);

impl<S> Sources for Vec<S>
where
    S: Store,
{
    type Values = Vec<S::Value>;
    type Slots = Vec<Option<S::Value>>;

    fn empty_slots(&self) -> Self::Slots {
        vec![None; self.len()]
    }

    fn subscribe_each(&self, slots: &Arc<Mutex<Self::Slots>>, on_change: &OnChange) -> SourceSubscriptions {
        self.iter()
            .enumerate()
            .map(|(index, source)| {
                let slots = Arc::clone(slots);
                let on_change = Arc::clone(on_change);
                source.subscribe(move |value: &S::Value| {
                    slots.lock()[index] = Some(value.clone());
                    on_change();
                })
            })
            .collect()
    }

    fn collect(slots: &Self::Slots) -> Option<Self::Values> {
        slots.iter().cloned().collect()
    }
}

macro_rules! impl_tuple_sources {
    ($(($index:tt, $source:ident)),+) => {
        impl<$($source),+> Sources for ($($source,)+)
        where
            $($source: Store,)+
        {
            type Values = ($($source::Value,)+);
            type Slots = ($(Option<$source::Value>,)+);

            fn empty_slots(&self) -> Self::Slots {
                ($(None::<$source::Value>,)+)
            }

            fn subscribe_each(&self, slots: &Arc<Mutex<Self::Slots>>, on_change: &OnChange) -> SourceSubscriptions {
                let mut subscriptions = SourceSubscriptions::new();
                $(
                    subscriptions.push(subscribe_slot(&self.$index, slots, on_change, |slots: &mut Self::Slots, value| {
                        slots.$index = Some(value);
                    }));
                )+
                subscriptions
            }

            fn collect(slots: &Self::Slots) -> Option<Self::Values> {
                Some(($(slots.$index.clone()?,)+))
            }
        }
    };
}

impl_tuple_sources!((0, A));
impl_tuple_sources!((0, A), (1, B));
impl_tuple_sources!((0, A), (1, B), (2, C));
impl_tuple_sources!((0, A), (1, B), (2, C), (3, D));

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counter() -> (OnChange, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_clone = calls.clone();
        let on_change: OnChange = Arc::new(move || {
            calls_clone.fetch_add(1, Ordering::SeqCst);
        });
        (on_change, calls)
    }

    #[test]
    fn vec_sources_fill_slots_in_order() {
        let sources = vec![Writable::new(1), Writable::new(2), Writable::new(3)];
        let slots = Arc::new(Mutex::new(sources.empty_slots()));
        let (on_change, calls) = counter();

        assert_eq!(<Vec<Writable<i32>> as Sources>::collect(&slots.lock()), None);

        let subscriptions = sources.subscribe_each(&slots, &on_change);
        assert_eq!(subscriptions.len(), 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(<Vec<Writable<i32>> as Sources>::collect(&slots.lock()), Some(vec![1, 2, 3]));

        sources[1].set(20);
        assert_eq!(<Vec<Writable<i32>> as Sources>::collect(&slots.lock()), Some(vec![1, 20, 3]));
    }

    #[test]
    fn tuple_sources_mix_value_types() {
        let sources = (Writable::new(2), Writable::new("x".to_string()).readonly());
        let slots = Arc::new(Mutex::new(sources.empty_slots()));
        let (on_change, calls) = counter();

        let subscriptions = sources.subscribe_each(&slots, &on_change);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(
            <(Writable<i32>, Readable<String>) as Sources>::collect(&slots.lock()),
            Some((2, "x".to_string()))
        );

        drop(subscriptions);
        assert_eq!(sources.0.subscriber_count(), 0);
        assert_eq!(sources.1.subscriber_count(), 0);
    }

    #[test]
    fn empty_vec_collects_immediately() {
        let sources: Vec<Writable<u8>> = Vec::new();
        let slots = sources.empty_slots();
        assert_eq!(<Vec<Writable<u8>> as Sources>::collect(&slots), Some(Vec::new()));
    }
}
