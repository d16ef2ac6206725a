//! Backing-store contracts and implementations.
//!
//! Values cross this boundary as JSON text. A missing key is `Ok(None)`;
//! errors are reserved for the backend itself failing.

mod file;
mod memory;

pub use file::FileStorage;
pub use memory::{MemoryDatabase, MemoryStorage};

use crate::error::StoreResult;
use async_trait::async_trait;
use std::sync::Arc;

/// Synchronous key-value storage, in the manner of browser local storage.
pub trait SyncBackend: Send + Sync {
    fn get(&self, key: &str) -> StoreResult<Option<String>>;
    fn set(&self, key: &str, value: &str) -> StoreResult<()>;
    fn remove(&self, key: &str) -> StoreResult<()>;
}

/// Asynchronous key-value storage, in the manner of an indexed database.
#[async_trait]
pub trait AsyncBackend: Send + Sync {
    async fn get(&self, key: &str) -> StoreResult<Option<String>>;
    async fn set(&self, key: &str, value: String) -> StoreResult<()>;
    async fn delete(&self, key: &str) -> StoreResult<()>;
    /// Remove every entry.
    async fn clear(&self) -> StoreResult<()>;
}

impl<B: SyncBackend + ?Sized> SyncBackend for Arc<B> {
    fn get(&self, key: &str) -> StoreResult<Option<String>> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: &str) -> StoreResult<()> {
        (**self).set(key, value)
    }

    fn remove(&self, key: &str) -> StoreResult<()> {
        (**self).remove(key)
    }
}

#[async_trait]
impl<B: AsyncBackend + ?Sized> AsyncBackend for Arc<B> {
    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        (**self).get(key).await
    }

    async fn set(&self, key: &str, value: String) -> StoreResult<()> {
        (**self).set(key, value).await
    }

    async fn delete(&self, key: &str) -> StoreResult<()> {
        (**self).delete(key).await
    }

    async fn clear(&self) -> StoreResult<()> {
        (**self).clear().await
    }
}
