use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard, Weak};

type Subscriber<T> = Arc<dyn Fn(&T) + Send + Sync>;

/// Subscriber list shared by every clone of a signal.
struct Subscribers<T> {
    next_id: AtomicUsize,
    list: RwLock<Vec<(usize, Subscriber<T>)>>,
}

/// Type-erased handle so `Subscription` does not carry `T`.
trait Unsubscribe: Send + Sync {
    fn unsubscribe(&self, id: usize);
}

impl<T> Unsubscribe for Subscribers<T> {
    fn unsubscribe(&self, id: usize) {
        write(&self.list).retain(|(sid, _)| *sid != id);
    }
}

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

/// An observable in-memory value.
///
/// Clones share the same value and subscriber list. Subscribers run after
/// the write lock is released, so they may read or even write the signal.
///
/// ```
/// use larder::Signal;
///
/// let theme = Signal::new("light".to_string());
/// theme.set("dark".to_string());
/// assert_eq!(theme.get(), "dark");
/// ```
pub struct Signal<T> {
    value: Arc<RwLock<T>>,
    subscribers: Arc<Subscribers<T>>,
}

impl<T> Clone for Signal<T> {
    fn clone(&self) -> Self {
        Self {
            value: Arc::clone(&self.value),
            subscribers: Arc::clone(&self.subscribers),
        }
    }
}

impl<T: Clone + Send + Sync + 'static> Signal<T> {
    /// Create a new signal with the given initial value.
    pub fn new(initial: T) -> Self {
        Self {
            value: Arc::new(RwLock::new(initial)),
            subscribers: Arc::new(Subscribers {
                next_id: AtomicUsize::new(0),
                list: RwLock::new(Vec::new()),
            }),
        }
    }

    /// Get the current value of the signal.
    pub fn get(&self) -> T {
        read(&self.value).clone()
    }

    /// Read the value with a function without cloning.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&read(&self.value))
    }

    /// Set a new value and notify subscribers.
    pub fn set(&self, new_value: T) {
        *write(&self.value) = new_value;
        self.notify();
    }

    /// Update the value in place and notify subscribers.
    pub fn update(&self, f: impl FnOnce(&mut T)) {
        f(&mut write(&self.value));
        self.notify();
    }

    /// Set a new value, then run `then` on it before the write lock is
    /// released. Subscribers are notified afterwards.
    ///
    /// Concurrent writers observe `then` in the same order as their writes.
    pub fn set_then<R>(&self, new_value: T, then: impl FnOnce(&T) -> R) -> R {
        let result = {
            let mut value = write(&self.value);
            *value = new_value;
            then(&*value)
        };
        self.notify();
        result
    }

    /// `update` counterpart of [`Signal::set_then`].
    pub fn update_then<R>(&self, f: impl FnOnce(&mut T), then: impl FnOnce(&T) -> R) -> R {
        let result = {
            let mut value = write(&self.value);
            f(&mut *value);
            then(&*value)
        };
        self.notify();
        result
    }

    /// Register a callback for every subsequent change.
    ///
    /// The callback is not invoked with the current value. Dropping the
    /// returned guard unsubscribes.
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        let id = self.subscribers.next_id.fetch_add(1, Ordering::Relaxed);
        write(&self.subscribers.list).push((id, Arc::new(callback)));

        let registry = Arc::downgrade(&self.subscribers);
        let registry: Weak<dyn Unsubscribe> = registry;
        Subscription { id, registry }
    }

    pub fn subscriber_count(&self) -> usize {
        read(&self.subscribers.list).len()
    }

    fn notify(&self) {
        let callbacks: Vec<Subscriber<T>> = read(&self.subscribers.list)
            .iter()
            .map(|(_, cb)| Arc::clone(cb))
            .collect();
        if callbacks.is_empty() {
            return;
        }

        let snapshot = self.get();
        for callback in callbacks {
            callback(&snapshot);
        }
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for Signal<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Signal")
            .field("value", &*read(&self.value))
            .finish_non_exhaustive()
    }
}

/// RAII guard for a signal subscription.
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    id: usize,
    registry: Weak<dyn Unsubscribe>,
}

impl Subscription {
    /// Keep the subscription alive for as long as the signal lives.
    pub fn detach(self) {
        std::mem::forget(self);
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            registry.unsubscribe(self.id);
        }
    }
}
