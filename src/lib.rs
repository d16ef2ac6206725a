//! # Larder
//!
//! Reactive values that survive a restart.
//!
//! A store holds one named value in memory, hydrates it from a backing
//! store once its owner mounts, and persists every write back.
//!
//! ## Stores
//!
//! - `LocalStore<T>` - synchronous backend (local-storage style)
//! - `DbStore<T>` - asynchronous backend (indexed-database style) with a
//!   `LoadState` that tells "still loading" apart from "stored data is corrupt"
//!
//! Reads never touch the backend. Writes update memory at once; a falsy
//! value (see [`Truthy`]) deletes the stored entry instead of writing it.
//!
//! ## Building blocks
//!
//! - `Signal<T>` - observable in-memory cell behind every store
//! - `Scope` - mount lifecycle that defers hydration and discards late results
//! - `SyncBackend` / `AsyncBackend` - storage contracts, with in-memory and
//!   file-backed implementations
//! - `Preset<T>` - process-wide value computed once

pub mod backend;
pub mod config;
pub mod error;
pub mod preset;
pub mod runtime;
pub mod signal;
pub mod store;
pub mod truthy;

// Re-export main types for convenience
pub use backend::{AsyncBackend, FileStorage, MemoryDatabase, MemoryStorage, SyncBackend};
pub use config::{HydrationPolicy, StoreOptions};
pub use error::{StoreError, StoreResult};
pub use preset::Preset;
pub use runtime::Scope;
pub use signal::{Signal, Subscription};
pub use store::{DbStore, LoadState, LocalStore, StoreValue};
pub use truthy::Truthy;
