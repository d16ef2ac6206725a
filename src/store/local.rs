use super::codec::{interpret, plan, Fetched, Persist};
use super::StoreValue;
use crate::backend::SyncBackend;
use crate::config::{HydrationPolicy, StoreOptions};
use crate::runtime::{Lifetime, Scope};
use crate::signal::{Signal, Subscription};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

struct LocalInner<T> {
    key: String,
    value: Signal<T>,
    backend: Arc<dyn SyncBackend>,
    policy: HydrationPolicy,
    written: AtomicBool,
    hydrated: AtomicBool,
    lifetime: Lifetime,
}

/// A value persisted to a synchronous backend.
///
/// Construction never touches the backend. Hydration reads it once, when
/// the current `Scope` mounts. Outside an unmounted scope, call
/// [`LocalStore::hydrate`] at the point the value should be restored.
///
/// A stored entry that fails to parse is logged and otherwise ignored: the
/// store keeps its initial value.
///
/// # Examples
///
/// ```
/// use larder::{LocalStore, MemoryStorage};
///
/// let storage = MemoryStorage::new();
/// let theme = LocalStore::new("theme", "light".to_string(), storage.clone());
///
/// theme.set("dark".to_string());
/// assert_eq!(theme.get(), "dark");
///
/// // A fresh store over the same storage picks the value up once hydrated.
/// let again = LocalStore::new("theme", "light".to_string(), storage);
/// assert_eq!(again.get(), "light");
/// again.hydrate();
/// assert_eq!(again.get(), "dark");
/// ```
pub struct LocalStore<T> {
    inner: Arc<LocalInner<T>>,
}

impl<T> Clone for LocalStore<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: StoreValue> LocalStore<T> {
    pub fn new(key: impl Into<String>, initial: T, backend: impl SyncBackend + 'static) -> Self {
        Self::with_options(key, initial, backend, StoreOptions::default())
    }

    pub fn with_options(
        key: impl Into<String>,
        initial: T,
        backend: impl SyncBackend + 'static,
        options: StoreOptions,
    ) -> Self {
        let scope = Scope::current();
        let inner = Arc::new(LocalInner {
            key: options.storage_key(&key.into()),
            value: Signal::new(initial),
            backend: Arc::new(backend),
            policy: options.hydration,
            written: AtomicBool::new(false),
            hydrated: AtomicBool::new(false),
            lifetime: scope
                .as_ref()
                .map(Scope::lifetime)
                .unwrap_or_else(Lifetime::detached),
        });

        // A mounted scope would run the callback inline, reading during
        // construction.
        if let Some(scope) = scope.filter(|scope| !scope.is_mounted()) {
            let weak = Arc::downgrade(&inner);
            scope.on_mount(move || {
                if let Some(inner) = weak.upgrade() {
                    inner.hydrate();
                }
            });
        }

        Self { inner }
    }

    /// Read the backing store into memory, once.
    ///
    /// Runs on its own when the owning scope mounts. Later calls, and calls
    /// after the scope is disposed, do nothing; use [`LocalStore::reload`]
    /// to read again.
    pub fn hydrate(&self) {
        self.inner.hydrate();
    }

    pub fn key(&self) -> &str {
        &self.inner.key
    }

    /// Current in-memory value.
    pub fn get(&self) -> T {
        self.inner.value.get()
    }

    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        self.inner.value.with(f)
    }

    /// Replace the value and persist it. Falsy values remove the entry.
    pub fn set(&self, value: T) {
        self.inner.written.store(true, Ordering::SeqCst);
        self.inner.value.set(value);
        let planned = self.inner.value.with(|v| plan(&self.inner.key, v));
        self.inner.persist(planned);
    }

    /// Mutate the value in place, then persist it.
    pub fn update(&self, f: impl FnOnce(&mut T)) {
        self.inner.written.store(true, Ordering::SeqCst);
        self.inner.value.update(f);
        let planned = self.inner.value.with(|v| plan(&self.inner.key, v));
        self.inner.persist(planned);
    }

    /// Re-read the backing store, picking up out-of-band changes.
    pub fn reload(&self) {
        if let Some(value) = self.inner.fetch() {
            self.inner.value.set(value);
        }
    }

    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        self.inner.value.subscribe(callback)
    }
}

impl<T: StoreValue> LocalInner<T> {
    fn hydrate(&self) {
        if !self.lifetime.is_alive() {
            tracing::debug!(key = %self.key, "scope gone, skipping hydration");
            return;
        }
        if self.hydrated.swap(true, Ordering::SeqCst) {
            return;
        }
        let Some(value) = self.fetch() else {
            return;
        };
        if self.policy == HydrationPolicy::PreferWrites && self.written.load(Ordering::SeqCst) {
            tracing::debug!(key = %self.key, "written before mount, keeping in-memory value");
            return;
        }
        tracing::debug!(key = %self.key, "hydrated");
        self.value.set(value);
    }

    fn fetch(&self) -> Option<T> {
        let text = match self.backend.get(&self.key) {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(key = %self.key, error = %e, "failed to read backing store");
                return None;
            }
        };
        match interpret(&self.key, text) {
            Fetched::Value(value) => Some(value),
            Fetched::Missing => None,
            Fetched::Corrupt(e) => {
                tracing::warn!(key = %self.key, error = %e, "ignoring unreadable stored value");
                None
            }
        }
    }

    /// Called without the value lock held, so a backend may read the store.
    fn persist(&self, planned: Option<Persist>) {
        let result = match planned {
            Some(Persist::Set(text)) => self.backend.set(&self.key, &text),
            Some(Persist::Remove) => self.backend.remove(&self.key),
            None => return,
        };
        if let Err(e) = result {
            tracing::warn!(key = %self.key, error = %e, "failed to persist value");
        }
    }
}
