use super::codec::{interpret, plan, Fetched, Persist};
use super::{LoadState, StoreValue};
use crate::backend::AsyncBackend;
use crate::config::{HydrationPolicy, StoreOptions};
use crate::error::{StoreError, StoreResult};
use crate::runtime::{Lifetime, Scope};
use crate::signal::{Signal, Subscription};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use tokio::sync::{mpsc, oneshot, watch};

/// Persistence work, applied in order by the store's worker.
enum Op {
    Persist(Persist),
    Flush(oneshot::Sender<()>),
}

struct DbInner<T> {
    key: String,
    value: Signal<T>,
    load_state: Signal<LoadState>,
    backend: Arc<dyn AsyncBackend>,
    policy: HydrationPolicy,
    written: AtomicBool,
    lifetime: Lifetime,
    // None when the store was built outside a tokio runtime
    ops: Option<mpsc::UnboundedSender<Op>>,
    settled: watch::Receiver<bool>,
}

/// A value persisted to an asynchronous backend.
///
/// Each store owns one worker task. Once the owning `Scope` mounts (right
/// away when there is no scope) the worker fetches the stored entry, then
/// applies persistence operations in the order the writes were made.
///
/// Unlike `LocalStore`, a stored entry that fails to parse is reported
/// through [`DbStore::load_state`] as `LoadState::LoadFailed`.
///
/// # Examples
///
/// ```
/// use larder::{DbStore, LoadState, MemoryDatabase};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let db = MemoryDatabase::new();
/// let query = DbStore::new("query", "select 1".to_string(), db.clone());
///
/// query.set("select 2".to_string());
/// assert_eq!(query.get(), "select 2");
/// query.flush().await;
///
/// let again = DbStore::new("query", String::new(), db);
/// again.settled().await;
/// assert_eq!(again.get(), "select 2");
/// assert_eq!(again.load_state(), LoadState::Loaded);
/// # }
/// ```
pub struct DbStore<T> {
    inner: Arc<DbInner<T>>,
}

impl<T> Clone for DbStore<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: StoreValue> DbStore<T> {
    pub fn new(key: impl Into<String>, initial: T, backend: impl AsyncBackend + 'static) -> Self {
        Self::with_options(key, initial, backend, StoreOptions::default())
    }

    pub fn with_options(
        key: impl Into<String>,
        initial: T,
        backend: impl AsyncBackend + 'static,
        options: StoreOptions,
    ) -> Self {
        let key = options.storage_key(&key.into());
        let scope = Scope::current();
        let backend: Arc<dyn AsyncBackend> = Arc::new(backend);
        let runtime = tokio::runtime::Handle::try_current().ok();
        if runtime.is_none() {
            tracing::warn!(key = %key, "no tokio runtime, store will neither hydrate nor persist");
        }

        let (settled_tx, settled_rx) = watch::channel(runtime.is_none());
        let (ops_tx, ops_rx) = mpsc::unbounded_channel();
        let (mount_tx, mount_rx) = oneshot::channel();

        let inner = Arc::new(DbInner {
            key: key.clone(),
            value: Signal::new(initial),
            load_state: Signal::new(LoadState::Unloaded),
            backend: Arc::clone(&backend),
            policy: options.hydration,
            written: AtomicBool::new(false),
            lifetime: scope
                .as_ref()
                .map(Scope::lifetime)
                .unwrap_or_else(Lifetime::detached),
            ops: runtime.as_ref().map(|_| ops_tx),
            settled: settled_rx,
        });

        if let Some(runtime) = runtime {
            let worker = Worker {
                key,
                backend,
                store: Arc::downgrade(&inner),
                mounted: mount_rx,
                settled: settled_tx,
                ops: ops_rx,
            };
            runtime.spawn(worker.run());
        }

        let mounted = move || {
            let _ = mount_tx.send(());
        };
        match scope {
            Some(scope) => scope.on_mount(mounted),
            None => mounted(),
        }

        Self { inner }
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

    pub fn load_state(&self) -> LoadState {
        self.inner.load_state.get()
    }

    /// Replace the value; persistence happens in the background.
    ///
    /// Falsy values delete the stored entry.
    pub fn set(&self, value: T) {
        self.inner.written.store(true, Ordering::SeqCst);
        let queued = self
            .inner
            .value
            .set_then(value, |v| self.inner.enqueue(plan(&self.inner.key, v)));
        self.inner.report(queued);
    }

    pub fn update(&self, f: impl FnOnce(&mut T)) {
        self.inner.written.store(true, Ordering::SeqCst);
        let queued = self
            .inner
            .value
            .update_then(f, |v| self.inner.enqueue(plan(&self.inner.key, v)));
        self.inner.report(queued);
    }

    /// Wait until hydration has finished, whatever its outcome.
    pub async fn settled(&self) {
        let mut settled = self.inner.settled.clone();
        let _ = settled.wait_for(|done| *done).await;
    }

    /// Wait until every write issued so far has reached the backend.
    ///
    /// Persistence starts after hydration, so this also waits for mount.
    pub async fn flush(&self) {
        let Some(ops) = &self.inner.ops else {
            return;
        };
        let (done_tx, done_rx) = oneshot::channel();
        if ops.send(Op::Flush(done_tx)).is_ok() {
            let _ = done_rx.await;
        }
    }

    /// Re-read the backing store after pending writes have landed.
    ///
    /// Before hydration has settled (an unmounted scope) writes are still
    /// queued, so the backend is read without waiting for them.
    pub async fn reload(&self) {
        if *self.inner.settled.borrow() {
            self.flush().await;
        }
        match self.inner.backend.get(&self.inner.key).await {
            Ok(text) => self.inner.apply(interpret(&self.inner.key, text), false),
            Err(e) => {
                tracing::warn!(key = %self.inner.key, error = %e, "failed to read backing store");
            }
        }
    }

    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        self.inner.value.subscribe(callback)
    }

    pub fn subscribe_load_state<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&LoadState) + Send + Sync + 'static,
    {
        self.inner.load_state.subscribe(callback)
    }
}

impl<T: StoreValue> DbInner<T> {
    /// Runs under the value's write lock, so the queue order matches the
    /// order values were stored in memory.
    fn enqueue(&self, planned: Option<Persist>) -> StoreResult<()> {
        let Some(planned) = planned else {
            return Ok(());
        };
        let Some(ops) = &self.ops else {
            return Err(self.unavailable("no tokio runtime"));
        };
        ops.send(Op::Persist(planned))
            .map_err(|_| self.unavailable("persistence worker stopped"))
    }

    fn unavailable(&self, reason: &str) -> StoreError {
        StoreError::Unavailable {
            key: self.key.clone(),
            reason: reason.to_string(),
        }
    }

    fn report(&self, queued: StoreResult<()>) {
        if let Err(e) = queued {
            tracing::warn!(key = %self.key, error = %e, "write kept in memory only");
        }
    }

    /// Apply a fetched entry. `respect_writes` is set for hydration, where
    /// the policy decides between the stored value and earlier writes.
    fn apply(&self, fetched: Fetched<T>, respect_writes: bool) {
        match fetched {
            Fetched::Missing => {
                tracing::debug!(key = %self.key, "no stored value");
            }
            Fetched::Value(value) => {
                let keep_written = respect_writes
                    && self.policy == HydrationPolicy::PreferWrites
                    && self.written.load(Ordering::SeqCst);
                if keep_written {
                    tracing::debug!(key = %self.key, "written before hydration, keeping in-memory value");
                } else {
                    self.value.set(value);
                }
                self.load_state.set(LoadState::Loaded);
            }
            Fetched::Corrupt(e) => {
                tracing::warn!(key = %self.key, error = %e, "stored value unreadable");
                self.load_state.set(LoadState::LoadFailed);
            }
        }
    }
}

struct Worker<T> {
    key: String,
    backend: Arc<dyn AsyncBackend>,
    store: Weak<DbInner<T>>,
    mounted: oneshot::Receiver<()>,
    settled: watch::Sender<bool>,
    ops: mpsc::UnboundedReceiver<Op>,
}

impl<T: StoreValue> Worker<T> {
    async fn run(self) {
        let Worker {
            key,
            backend,
            store,
            mounted,
            settled,
            mut ops,
        } = self;

        if mounted.await.is_ok() {
            hydrate(&key, &*backend, &store).await;
        } else {
            tracing::debug!(key = %key, "scope disposed before mount, skipping hydration");
        }
        settled.send_replace(true);

        while let Some(op) = ops.recv().await {
            let result = match op {
                Op::Persist(Persist::Set(text)) => backend.set(&key, text).await,
                Op::Persist(Persist::Remove) => backend.delete(&key).await,
                Op::Flush(done) => {
                    let _ = done.send(());
                    Ok(())
                }
            };
            if let Err(e) = result {
                tracing::warn!(key = %key, error = %e, "failed to persist value");
            }
        }
        tracing::trace!(key = %key, "persistence worker finished");
    }
}

async fn hydrate<T: StoreValue>(key: &str, backend: &dyn AsyncBackend, store: &Weak<DbInner<T>>) {
    let text = match backend.get(key).await {
        Ok(text) => text,
        Err(e) => {
            tracing::warn!(key = %key, error = %e, "failed to read backing store");
            return;
        }
    };
    let fetched = interpret(key, text);

    let Some(store) = store.upgrade() else {
        tracing::debug!(key = %key, "store dropped before hydration resolved");
        return;
    };
    if !store.lifetime.is_alive() {
        tracing::debug!(key = %key, "scope disposed before hydration resolved, discarding");
        return;
    }
    store.apply(fetched, true);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MemoryDatabase;
    use std::time::Duration;
    use tokio::time::timeout;

    async fn seeded(key: &str, text: &str) -> MemoryDatabase {
        let db = MemoryDatabase::new();
        db.set(key, text.to_string()).await.unwrap();
        db
    }

    #[tokio::test]
    async fn hydrates_stored_value() {
        let db = seeded("count", "7").await;
        let store = DbStore::new("count", 0, db.clone());
        assert_eq!(store.get(), 0);

        store.settled().await;
        assert_eq!(store.get(), 7);
        assert_eq!(store.load_state(), LoadState::Loaded);
        assert_eq!(db.reads(), 1);
    }

    #[tokio::test]
    async fn missing_entry_stays_unloaded() {
        let store = DbStore::new("theme", "light".to_string(), MemoryDatabase::new());
        assert_eq!(store.get(), "light");

        store.settled().await;
        assert_eq!(store.get(), "light");
        assert_eq!(store.load_state(), LoadState::Unloaded);
    }

    #[tokio::test]
    async fn corrupt_entry_fails_load() {
        let db = seeded("x", "not json").await;
        let store = DbStore::new("x", 42, db);

        store.settled().await;
        assert_eq!(store.get(), 42);
        assert_eq!(store.load_state(), LoadState::LoadFailed);
    }

    #[tokio::test]
    async fn writes_reach_backend_in_order() {
        let db = MemoryDatabase::new();
        let store = DbStore::new("n", 1, db.clone());

        store.set(2);
        store.set(3);
        store.update(|n| *n += 1);
        assert_eq!(store.get(), 4);

        store.flush().await;
        assert_eq!(db.get("n").await.unwrap().as_deref(), Some("4"));
        assert_eq!(db.mutations(), 3);
    }

    #[tokio::test]
    async fn falsy_write_deletes() {
        let db = seeded("query", "\"select 1\"").await;
        let store = DbStore::new("query", String::new(), db.clone());

        store.set(String::new());
        store.flush().await;
        assert!(!db.contains_key("query").await);
    }

    #[tokio::test(start_paused = true)]
    async fn write_during_hydration_wins_by_default() {
        let db = seeded("theme", "\"stored\"").await;
        let slow = db.with_latency(Duration::from_millis(20));
        let store = DbStore::new("theme", "initial".to_string(), slow);

        store.set("written".to_string());
        store.settled().await;

        assert_eq!(store.get(), "written");
        assert_eq!(store.load_state(), LoadState::Loaded);
    }

    #[tokio::test(start_paused = true)]
    async fn prefer_stored_overwrites_early_write() {
        let db = seeded("theme", "\"stored\"").await;
        let slow = db.with_latency(Duration::from_millis(20));
        let options = StoreOptions::new().with_policy(HydrationPolicy::PreferStored);
        let store = DbStore::with_options("theme", "initial".to_string(), slow, options);

        store.set("written".to_string());
        store.settled().await;
        assert_eq!(store.get(), "stored");

        // The write still reaches the backend after hydration.
        store.flush().await;
        assert_eq!(db.get("theme").await.unwrap().as_deref(), Some("\"written\""));
    }

    #[tokio::test]
    async fn hydration_waits_for_mount() {
        let db = seeded("count", "7").await;
        let scope = Scope::new();

        let store = scope.run(|| DbStore::new("count", 0, db.clone()));
        tokio::task::yield_now().await;
        assert_eq!(db.reads(), 0);

        scope.mount();
        store.settled().await;
        assert_eq!(store.get(), 7);
    }

    #[tokio::test(start_paused = true)]
    async fn disposed_scope_discards_hydration() {
        let db = seeded("count", "7").await;
        let slow = db.with_latency(Duration::from_millis(20));
        let scope = Scope::new();

        let store = scope.run(|| DbStore::new("count", 0, slow));
        scope.mount();
        tokio::task::yield_now().await;
        scope.dispose();

        store.settled().await;
        assert_eq!(store.get(), 0);
        assert_eq!(store.load_state(), LoadState::Unloaded);
        assert_eq!(db.reads(), 1);
    }

    #[tokio::test]
    async fn dispose_before_mount_skips_fetch() {
        let db = seeded("count", "7").await;
        let scope = Scope::new();

        let store = scope.run(|| DbStore::new("count", 0, db.clone()));
        scope.dispose();

        store.settled().await;
        assert_eq!(db.reads(), 0);
        assert_eq!(store.get(), 0);
    }

    #[tokio::test]
    async fn reload_reads_fresh_value() {
        let db = seeded("x", "1").await;
        let store = DbStore::new("x", 0, db.clone());
        store.settled().await;

        store.reload().await;
        assert_eq!(store.get(), 1);

        db.set("x", "5".to_string()).await.unwrap();
        store.reload().await;
        assert_eq!(store.get(), 5);

        db.set("x", "{".to_string()).await.unwrap();
        store.reload().await;
        assert_eq!(store.get(), 5);
        assert_eq!(store.load_state(), LoadState::LoadFailed);
    }

    #[tokio::test]
    async fn reload_before_mount_does_not_wait_for_writes() {
        let db = seeded("x", "1").await;
        let scope = Scope::new();

        let store = scope.run(|| DbStore::new("x", 0, db.clone()));
        store.set(3);
        timeout(Duration::from_secs(1), store.reload())
            .await
            .expect("reload finished before mount");
        assert_eq!(store.get(), 1);

        // The queued write still lands once the scope mounts.
        scope.mount();
        store.flush().await;
        assert_eq!(db.get("x").await.unwrap().as_deref(), Some("3"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_writes_leave_backend_matching_memory() {
        let db = MemoryDatabase::new();
        let store = DbStore::new("n", 0, db.clone());
        store.settled().await;

        let writers: Vec<_> = (1..=8)
            .map(|w| {
                let store = store.clone();
                tokio::spawn(async move {
                    for i in 0..50 {
                        store.set(w * 1000 + i);
                    }
                })
            })
            .collect();
        for writer in writers {
            writer.await.unwrap();
        }

        store.flush().await;
        let stored = db.get("n").await.unwrap();
        assert_eq!(stored, Some(store.get().to_string()));
    }

    #[test]
    fn works_in_memory_without_runtime() {
        let store = DbStore::new("theme", "light".to_string(), MemoryDatabase::new());
        store.set("dark".to_string());
        assert_eq!(store.get(), "dark");
        assert_eq!(store.load_state(), LoadState::Unloaded);

        let queued = store.inner.enqueue(Some(Persist::Remove));
        assert!(matches!(queued, Err(StoreError::Unavailable { .. })));
    }

    #[test]
    fn writes_after_runtime_shutdown_are_unavailable() {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .build()
            .unwrap();
        let store = {
            let _guard = runtime.enter();
            DbStore::new("n", 1, MemoryDatabase::new())
        };
        drop(runtime);

        let queued = store.inner.enqueue(Some(Persist::Set("2".to_string())));
        match queued {
            Err(StoreError::Unavailable { key, reason }) => {
                assert_eq!(key, "n");
                assert!(reason.contains("worker"));
            }
            other => panic!("expected unavailable, got {other:?}"),
        }
        store.set(2);
        assert_eq!(store.get(), 2);
    }
}
