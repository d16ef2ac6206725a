use serde::{Deserialize, Serialize};
use std::fmt;

/// Progress of a store's hydration from its backing store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadState {
    /// Hydration has not found a value yet (pending, or no entry stored).
    #[default]
    Unloaded,
    Loaded,
    /// An entry exists but could not be decoded.
    LoadFailed,
}

impl LoadState {
    pub fn is_loaded(self) -> bool {
        self == LoadState::Loaded
    }

    pub fn is_failed(self) -> bool {
        self == LoadState::LoadFailed
    }
}

impl fmt::Display for LoadState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadState::Unloaded => write!(f, "unloaded"),
            LoadState::Loaded => write!(f, "loaded"),
            LoadState::LoadFailed => write!(f, "load_failed"),
        }
    }
}
