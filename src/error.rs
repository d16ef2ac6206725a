//! Error types shared by backends and stores.
//!
//! Stores never return these from `get`/`set`; they are logged and absorbed.
//! Backends and the few fallible constructors surface them directly.

/// Result type for backend and configuration operations.
pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Stored text could not be decoded into the store's value type.
    #[error("stored value for `{key}` is not valid JSON for this type: {source}")]
    HydrationParse {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to serialize value for `{key}`: {source}")]
    Serialize {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("I/O error on `{key}`: {source}")]
    Io {
        key: String,
        #[source]
        source: std::io::Error,
    },

    /// The backend could not service the request (worker gone, no runtime).
    #[error("backend unavailable for `{key}`: {reason}")]
    Unavailable { key: String, reason: String },

    #[error("invalid store options: {0}")]
    InvalidOptions(String),
}

impl StoreError {
    pub fn key(&self) -> Option<&str> {
        match self {
            StoreError::HydrationParse { key, .. }
            | StoreError::Serialize { key, .. }
            | StoreError::Io { key, .. }
            | StoreError::Unavailable { key, .. } => Some(key),
            StoreError::InvalidOptions(_) => None,
        }
    }

    /// True for the one error kind that is recorded as `LoadState::LoadFailed`.
    pub fn is_parse(&self) -> bool {
        matches!(self, StoreError::HydrationParse { .. })
    }
}
