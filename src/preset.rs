//! Process-wide values computed exactly once.
//!
//! Seed data (a demo dataset, a default query) is derived once at first use
//! and then shared for the rest of the process. It is never torn down.

use std::sync::OnceLock;

/// A lazily computed, immutable, process-wide value.
///
/// ```
/// use larder::Preset;
///
/// static DEFAULT_QUERY: Preset<String> = Preset::new(|| "select 1".to_string());
///
/// assert_eq!(DEFAULT_QUERY.get(), "select 1");
/// assert!(std::ptr::eq(DEFAULT_QUERY.get(), DEFAULT_QUERY.get()));
/// ```
pub struct Preset<T> {
    cell: OnceLock<T>,
    init: fn() -> T,
}

impl<T> Preset<T> {
    pub const fn new(init: fn() -> T) -> Self {
        Self {
            cell: OnceLock::new(),
            init,
        }
    }

    /// The value, computing it on first access.
    pub fn get(&self) -> &T {
        self.cell.get_or_init(|| {
            tracing::debug!("computing preset");
            (self.init)()
        })
    }

    pub fn is_initialized(&self) -> bool {
        self.cell.get().is_some()
    }
}

impl<T> std::ops::Deref for Preset<T> {
    type Target = T;

    fn deref(&self) -> &T {
        self.get()
    }
}
