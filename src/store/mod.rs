//! Persisted reactive value stores.
//!
//! Both variants hold one named value in memory, hydrate it from a backing
//! store once the owning `Scope` mounts, and persist every write:
//! - `LocalStore<T>` - synchronous backend, parse errors are ignored
//! - `DbStore<T>` - asynchronous backend, parse errors show up in `LoadState`

mod codec;
mod db;
mod local;
mod state;

pub use db::DbStore;
pub use local::LocalStore;
pub use state::LoadState;

use crate::truthy::Truthy;
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Bounds every stored value type must satisfy.
pub trait StoreValue:
    Clone + Send + Sync + Serialize + DeserializeOwned + Truthy + 'static
{
}

impl<T> StoreValue for T where
    T: Clone + Send + Sync + Serialize + DeserializeOwned + Truthy + 'static
{
}
