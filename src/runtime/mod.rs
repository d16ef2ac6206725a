//! Mount lifecycle for stores.
//!
//! A `Scope` stands in for the UI component that owns a store: hydration is
//! deferred until the scope mounts, and late results are discarded once it
//! is disposed.

mod scope;

pub use scope::{Lifetime, Scope};
