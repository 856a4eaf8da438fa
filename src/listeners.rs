//! Publish/subscribe registry for manager callbacks.
//!
//! Listeners are invoked in registration order. Dispatch iterates over a
//! snapshot taken before the first call, so a listener may unsubscribe itself
//! (or any other listener) from inside its callback. A panicking listener is
//! caught and logged; the remaining listeners still run.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use tracing::error;

type Listener<T> = Arc<dyn Fn(&T) + Send + Sync + 'static>;

struct Registry<T> {
    next_id: u64,
    listeners: Vec<(u64, Listener<T>)>,
}

trait Detach: Send + Sync {
    fn detach(&self, id: u64);
}

impl<T: 'static> Detach for Mutex<Registry<T>> {
    fn detach(&self, id: u64) {
        let mut registry = self.lock().unwrap_or_else(PoisonError::into_inner);
        registry.listeners.retain(|(listener_id, _)| *listener_id != id);
    }
}

pub struct ListenerRegistry<T: 'static> {
    inner: Arc<Mutex<Registry<T>>>,
    name: &'static str,
}

impl<T: 'static> ListenerRegistry<T> {
    pub fn new(name: &'static str) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Registry {
                next_id: 0,
                listeners: Vec::new(),
            })),
            name,
        }
    }

    pub fn add(&self, listener: impl Fn(&T) + Send + Sync + 'static) -> Subscription {
        let listener: Listener<T> = Arc::new(listener);
        let id = {
            let mut registry = self.lock();
            let id = registry.next_id;
            registry.next_id += 1;
            registry.listeners.push((id, listener));
            id
        };

        let detach: Arc<dyn Detach> = self.inner.clone();
        Subscription {
            id,
            registry: Arc::downgrade(&detach),
        }
    }

    pub fn len(&self) -> usize {
        self.lock().listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Deliver `value` to every listener registered at the start of dispatch
    /// that is still registered when its turn comes. Must not be called while
    /// holding a lock a listener might need.
    pub fn dispatch(&self, value: &T) {
        let snapshot: Vec<(u64, Listener<T>)> = self.lock().listeners.clone();

        for (id, listener) in snapshot {
            if !self.contains(id) {
                continue;
            }
            if catch_unwind(AssertUnwindSafe(|| listener(value))).is_err() {
                error!(registry = self.name, listener = id, "Listener panicked during dispatch");
            }
        }
    }

    /// Call a single freshly-added listener, used for "current value" replay.
    pub(crate) fn deliver_to(&self, subscription: &Subscription, value: &T) {
        let listener = self
            .lock()
            .listeners
            .iter()
            .find(|(id, _)| *id == subscription.id)
            .map(|(_, listener)| listener.clone());

        if let Some(listener) = listener
            && catch_unwind(AssertUnwindSafe(|| listener(value))).is_err()
        {
            error!(registry = self.name, listener = subscription.id, "Listener panicked during replay");
        }
    }

    fn contains(&self, id: u64) -> bool {
        self.lock().listeners.iter().any(|(listener_id, _)| *listener_id == id)
    }

    fn lock(&self) -> MutexGuard<'_, Registry<T>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Token returned by `add`. Unsubscribing is idempotent and outlives the registry.
pub struct Subscription {
    id: u64,
    registry: Weak<dyn Detach>,
}

impl Subscription {
    pub fn unsubscribe(&self) {
        if let Some(registry) = self.registry.upgrade() {
            registry.detach(self.id);
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn delivers_in_registration_order() {
        let registry = ListenerRegistry::<u32>::new("test");
        let seen = Arc::new(Mutex::new(Vec::new()));

        for tag in ["a", "b", "c"] {
            let seen = seen.clone();
            let _ = registry.add(move |value: &u32| seen.lock().unwrap().push(format!("{tag}{value}")));
        }

        registry.dispatch(&1);
        registry.dispatch(&2);

        assert_eq!(*seen.lock().unwrap(), vec!["a1", "b1", "c1", "a2", "b2", "c2"]);
    }

    #[test]
    fn unsubscribe_is_idempotent() {
        let registry = ListenerRegistry::<u32>::new("test");
        let hits = Arc::new(AtomicU32::new(0));
        let counter = hits.clone();

        let sub = registry.add(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        registry.dispatch(&0);
        sub.unsubscribe();
        sub.unsubscribe();
        registry.dispatch(&0);

        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert!(registry.is_empty());
    }

    #[test]
    fn listener_can_unsubscribe_itself_during_dispatch() {
        let registry = ListenerRegistry::<u32>::new("test");
        let slot: Arc<Mutex<Option<Subscription>>> = Arc::new(Mutex::new(None));
        let hits = Arc::new(AtomicU32::new(0));
        let others = Arc::new(AtomicU32::new(0));

        let own_slot = slot.clone();
        let own_hits = hits.clone();
        let sub = registry.add(move |_| {
            own_hits.fetch_add(1, Ordering::SeqCst);
            if let Some(sub) = own_slot.lock().unwrap().as_ref() {
                sub.unsubscribe();
            }
        });
        *slot.lock().unwrap() = Some(sub);

        let other_hits = others.clone();
        let _other = registry.add(move |_| {
            other_hits.fetch_add(1, Ordering::SeqCst);
        });

        registry.dispatch(&1);
        registry.dispatch(&2);

        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(others.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn listener_removed_mid_dispatch_is_skipped() {
        let registry = ListenerRegistry::<u32>::new("test");
        let victim_slot: Arc<Mutex<Option<Subscription>>> = Arc::new(Mutex::new(None));
        let victim_hits = Arc::new(AtomicU32::new(0));

        let slot = victim_slot.clone();
        let _killer = registry.add(move |_| {
            if let Some(sub) = slot.lock().unwrap().as_ref() {
                sub.unsubscribe();
            }
        });
        let counter = victim_hits.clone();
        let victim = registry.add(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        *victim_slot.lock().unwrap() = Some(victim);

        registry.dispatch(&1);
        assert_eq!(victim_hits.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn panicking_listener_does_not_block_others() {
        let registry = ListenerRegistry::<u32>::new("test");
        let hits = Arc::new(AtomicU32::new(0));

        let _bad = registry.add(|_| panic!("listener failure"));
        let counter = hits.clone();
        let _good = registry.add(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        registry.dispatch(&1);
        registry.dispatch(&2);

        assert_eq!(hits.load(Ordering::SeqCst), 2);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn unsubscribe_after_registry_dropped_is_harmless() {
        let registry = ListenerRegistry::<u32>::new("test");
        let sub = registry.add(|_| {});
        drop(registry);
        sub.unsubscribe();
    }
}
