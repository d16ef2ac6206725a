use super::{AsyncBackend, SyncBackend};
use crate::error::StoreResult;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

#[derive(Default)]
struct Counters {
    reads: AtomicUsize,
    mutations: AtomicUsize,
}

impl Counters {
    fn read(&self) {
        self.reads.fetch_add(1, Ordering::SeqCst);
    }

    fn mutated(&self) {
        self.mutations.fetch_add(1, Ordering::SeqCst);
    }
}

/// In-memory synchronous storage.
///
/// Clones share the same entries, so several stores (or a test) can observe
/// one storage area.
#[derive(Clone, Default)]
pub struct MemoryStorage {
    entries: Arc<RwLock<HashMap<String, String>>>,
    counters: Arc<Counters>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(key)
    }

    /// Number of `get` calls served.
    pub fn reads(&self) -> usize {
        self.counters.reads.load(Ordering::SeqCst)
    }

    /// Number of `set` and `remove` calls served.
    pub fn mutations(&self) -> usize {
        self.counters.mutations.load(Ordering::SeqCst)
    }
}

impl SyncBackend for MemoryStorage {
    fn get(&self, key: &str) -> StoreResult<Option<String>> {
        self.counters.read();
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> StoreResult<()> {
        self.counters.mutated();
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> StoreResult<()> {
        self.counters.mutated();
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        entries.remove(key);
        Ok(())
    }
}

/// In-memory asynchronous storage.
///
/// `with_latency` delays every operation, which keeps a hydration fetch in
/// flight long enough to race it against writes.
#[derive(Clone, Default)]
pub struct MemoryDatabase {
    entries: Arc<tokio::sync::RwLock<HashMap<String, String>>>,
    latency: Option<Duration>,
    counters: Arc<Counters>,
}

impl MemoryDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    /// Same entries, but every operation first sleeps for `latency`.
    pub fn with_latency(&self, latency: Duration) -> Self {
        Self {
            entries: Arc::clone(&self.entries),
            latency: Some(latency),
            counters: Arc::clone(&self.counters),
        }
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    pub async fn contains_key(&self, key: &str) -> bool {
        self.entries.read().await.contains_key(key)
    }

    pub fn reads(&self) -> usize {
        self.counters.reads.load(Ordering::SeqCst)
    }

    pub fn mutations(&self) -> usize {
        self.counters.mutations.load(Ordering::SeqCst)
    }

    async fn pause(&self) {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
    }
}

#[async_trait]
impl AsyncBackend for MemoryDatabase {
    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        self.counters.read();
        self.pause().await;
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: String) -> StoreResult<()> {
        self.counters.mutated();
        self.pause().await;
        self.entries.write().await.insert(key.to_string(), value);
        Ok(())
    }

    async fn delete(&self, key: &str) -> StoreResult<()> {
        self.counters.mutated();
        self.pause().await;
        self.entries.write().await.remove(key);
        Ok(())
    }

    async fn clear(&self) -> StoreResult<()> {
        self.counters.mutated();
        self.pause().await;
        self.entries.write().await.clear();
        Ok(())
    }
}
