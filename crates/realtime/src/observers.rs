//! Per-instance observer registries.
//!
//! Callbacks run on whichever task calls [`Observers::notify`]. The registry is
//! snapshotted before dispatch, so a callback may subscribe, dispose, or call
//! back into the owning component without deadlocking.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

type Callback<T> = Arc<dyn Fn(&T) + Send + Sync>;

struct Registry<T> {
    next_id: u64,
    entries: Vec<(u64, Callback<T>)>,
}

/// A list of callbacks interested in values of type `T`.
pub struct Observers<T> {
    registry: Arc<Mutex<Registry<T>>>,
}

impl<T: 'static> Observers<T> {
    pub fn new() -> Self {
        Self {
            registry: Arc::new(Mutex::new(Registry {
                next_id: 0,
                entries: Vec::new(),
            })),
        }
    }

    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        let mut registry = lock(&self.registry);
        let id = registry.next_id;
        registry.next_id += 1;
        registry.entries.push((id, Arc::new(callback)));

        let weak: Weak<dyn Detach> = Arc::downgrade(&self.registry) as Weak<dyn Detach>;
        Subscription { registry: weak, id }
    }

    /// Calls every callback registered at the time of the call, in
    /// subscription order.
    pub fn notify(&self, value: &T) {
        let snapshot: Vec<Callback<T>> = lock(&self.registry)
            .entries
            .iter()
            .map(|(_, callback)| Arc::clone(callback))
            .collect();
        for callback in snapshot {
            callback(value);
        }
    }

    pub fn len(&self) -> usize {
        lock(&self.registry).entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        lock(&self.registry).entries.clear();
    }
}

impl<T: 'static> Default for Observers<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for Observers<T> {
    fn clone(&self) -> Self {
        Self {
            registry: Arc::clone(&self.registry),
        }
    }
}

fn lock<T>(registry: &Mutex<Registry<T>>) -> MutexGuard<'_, Registry<T>> {
    registry.lock().unwrap_or_else(PoisonError::into_inner)
}

trait Detach: Send + Sync {
    fn detach(&self, id: u64);
}

impl<T> Detach for Mutex<Registry<T>> {
    fn detach(&self, id: u64) {
        lock(self).entries.retain(|(entry, _)| *entry != id);
    }
}

/// Handle returned by [`Observers::subscribe`].
///
/// Dropping it leaves the callback registered; call [`dispose`](Self::dispose)
/// to remove it. Disposing after the registry is gone is a no-op.
#[must_use = "dropping a Subscription keeps the callback registered; call dispose() to remove it"]
pub struct Subscription {
    registry: Weak<dyn Detach>,
    id: u64,
}

impl Subscription {
    pub fn dispose(self) {
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
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_notify_reaches_every_subscriber() {
        let observers = Observers::<u32>::new();
        let total = Arc::new(AtomicUsize::new(0));
        let _subs: Vec<_> = (0..3)
            .map(|_| {
                let total = total.clone();
                observers.subscribe(move |v| {
                    total.fetch_add(*v as usize, Ordering::SeqCst);
                })
            })
            .collect();

        observers.notify(&2);
        assert_eq!(total.load(Ordering::SeqCst), 6);
    }

    #[test]
    fn test_dispose_removes_only_that_callback() {
        let observers = Observers::<()>::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let first = {
            let hits = hits.clone();
            observers.subscribe(move |_| {
                hits.fetch_add(1, Ordering::SeqCst);
            })
        };
        let _second = {
            let hits = hits.clone();
            observers.subscribe(move |_| {
                hits.fetch_add(10, Ordering::SeqCst);
            })
        };

        first.dispose();
        observers.notify(&());
        assert_eq!(hits.load(Ordering::SeqCst), 10);
        assert_eq!(observers.len(), 1);
    }

    #[test]
    fn test_callback_may_dispose_during_notify() {
        let observers = Observers::<()>::new();
        let slot: Arc<Mutex<Option<Subscription>>> = Arc::new(Mutex::new(None));
        let hits = Arc::new(AtomicUsize::new(0));

        let sub = {
            let slot = slot.clone();
            let hits = hits.clone();
            observers.subscribe(move |_| {
                hits.fetch_add(1, Ordering::SeqCst);
                if let Some(sub) = slot.lock().unwrap().take() {
                    sub.dispose();
                }
            })
        };
        *slot.lock().unwrap() = Some(sub);

        observers.notify(&());
        observers.notify(&());
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert!(observers.is_empty());
    }

    #[test]
    fn test_dispose_after_registry_dropped() {
        let observers = Observers::<()>::new();
        let sub = observers.subscribe(|_| {});
        drop(observers);
        sub.dispose();
    }

    #[test]
    fn test_registries_are_independent() {
        let a = Observers::<()>::new();
        let b = Observers::<()>::new();
        let _sub = a.subscribe(|_| {});
        assert_eq!(a.len(), 1);
        assert!(b.is_empty());
    }
}
