//! Observer Registry
//!
//! Fan-out of events to any number of independently registered listeners.
//! Registration returns a [`ListenerHandle`] that removes the listener when
//! `unregister` is called.
//!
//! Listeners are invoked outside the registry lock, in registration order.
//! A panicking listener is caught and logged so delivery to the remaining
//! listeners continues.

use std::collections::BTreeMap;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

/// Shared listener callback.
pub type Listener<T> = Arc<dyn Fn(&T) + Send + Sync>;

struct Slots<T> {
    next_id: u64,
    listeners: BTreeMap<u64, Listener<T>>,
}

/// Registry of listeners for events of type `T`.
pub struct ObserverRegistry<T> {
    slots: Arc<Mutex<Slots<T>>>,
    name: &'static str,
}

impl<T> ObserverRegistry<T> {
    /// Create an empty registry. `name` labels panics in logs.
    #[must_use]
    pub fn new(name: &'static str) -> Self {
        Self {
            slots: Arc::new(Mutex::new(Slots {
                next_id: 0,
                listeners: BTreeMap::new(),
            })),
            name,
        }
    }

    /// Number of registered listeners.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.lock().listeners.len()
    }

    /// Whether no listener is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.lock().listeners.is_empty()
    }

    /// Remove every listener.
    pub fn clear(&self) {
        self.slots.lock().listeners.clear();
    }
}

impl<T: 'static> ObserverRegistry<T> {
    /// Register a listener.
    pub fn register<F>(&self, listener: F) -> ListenerHandle
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        let id = {
            let mut slots = self.slots.lock();
            let id = slots.next_id;
            slots.next_id += 1;
            slots.listeners.insert(id, Arc::new(listener));
            id
        };

        let weak: Weak<Mutex<Slots<T>>> = Arc::downgrade(&self.slots);
        ListenerHandle {
            remove: Some(Box::new(move || {
                if let Some(slots) = weak.upgrade() {
                    slots.lock().listeners.remove(&id);
                }
            })),
        }
    }

    /// Deliver `event` to every listener.
    ///
    /// Returns how many listeners panicked.
    pub fn notify(&self, event: &T) -> usize {
        let listeners: Vec<Listener<T>> = self.slots.lock().listeners.values().cloned().collect();

        let mut failures = 0;
        for listener in listeners {
            if catch_unwind(AssertUnwindSafe(|| listener(event))).is_err() {
                failures += 1;
                tracing::error!(registry = self.name, "Listener panicked, continuing delivery");
            }
        }
        failures
    }
}

impl<T> std::fmt::Debug for ObserverRegistry<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObserverRegistry")
            .field("name", &self.name)
            .field("listeners", &self.len())
            .finish()
    }
}

/// Disposer returned from listener registration.
///
/// Dropping the handle without calling [`ListenerHandle::unregister`] leaves
/// the listener registered.
#[must_use = "keep the handle to be able to unregister the listener"]
pub struct ListenerHandle {
    remove: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl ListenerHandle {
    /// Remove the listener from its registry.
    ///
    /// Does nothing if the registry no longer exists.
    pub fn unregister(mut self) {
        if let Some(remove) = self.remove.take() {
            remove();
        }
    }

    /// Keep the listener registered for the life of its registry.
    pub fn forget(self) {}
}

impl std::fmt::Debug for ListenerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListenerHandle")
            .field("active", &self.remove.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn notifies_every_listener() {
        let registry = ObserverRegistry::<u32>::new("test");
        let total = Arc::new(AtomicUsize::new(0));

        let t1 = Arc::clone(&total);
        let _h1 = registry.register(move |v| {
            t1.fetch_add(*v as usize, Ordering::SeqCst);
        });
        let t2 = Arc::clone(&total);
        let _h2 = registry.register(move |v| {
            t2.fetch_add(*v as usize * 10, Ordering::SeqCst);
        });

        assert_eq!(registry.notify(&2), 0);
        assert_eq!(total.load(Ordering::SeqCst), 22);
    }

    #[test]
    fn unregister_stops_delivery() {
        let registry = ObserverRegistry::<()>::new("test");
        let count = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&count);
        let handle = registry.register(move |()| {
            c.fetch_add(1, Ordering::SeqCst);
        });

        registry.notify(&());
        handle.unregister();
        registry.notify(&());

        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert!(registry.is_empty());
    }

    #[test]
    fn panicking_listener_does_not_block_others() {
        let registry = ObserverRegistry::<()>::new("test");
        let count = Arc::new(AtomicUsize::new(0));

        let _bad = registry.register(|()| panic!("listener failure"));
        let c = Arc::clone(&count);
        let _good = registry.register(move |()| {
            c.fetch_add(1, Ordering::SeqCst);
        });

        assert_eq!(registry.notify(&()), 1);
        assert_eq!(count.load(Ordering::SeqCst), 1);
        // registry still usable after a panic
        assert_eq!(registry.notify(&()), 1);
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn listener_may_unregister_during_notify() {
        let registry = Arc::new(ObserverRegistry::<()>::new("test"));
        let slot: Arc<Mutex<Option<ListenerHandle>>> = Arc::new(Mutex::new(None));

        let s = Arc::clone(&slot);
        let handle = registry.register(move |()| {
            if let Some(h) = s.lock().take() {
                h.unregister();
            }
        });
        *slot.lock() = Some(handle);

        registry.notify(&());
        assert!(registry.is_empty());
    }

    #[test]
    fn unregister_after_registry_dropped_is_noop() {
        let registry = ObserverRegistry::<()>::new("test");
        let handle = registry.register(|()| {});
        drop(registry);
        handle.unregister();
    }

    #[test]
    fn clear_removes_all() {
        let registry = ObserverRegistry::<()>::new("test");
        let _a = registry.register(|()| {});
        let _b = registry.register(|()| {});
        assert_eq!(registry.len(), 2);
        registry.clear();
        assert!(registry.is_empty());
    }
}
