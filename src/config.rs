//! Per-store configuration.

use crate::error::{StoreError, StoreResult};
use serde::{Deserialize, Serialize};

/// What happens when hydration resolves after the store was already written.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HydrationPolicy {
    /// A write made before hydration resolved wins; the hydrated value is dropped.
    #[default]
    PreferWrites,
    /// The hydrated value is applied regardless of earlier writes.
    PreferStored,
}

/// Options shared by `LocalStore` and `DbStore`.
///
/// ```
/// use larder::{HydrationPolicy, StoreOptions};
///
/// let options = StoreOptions::from_json(r#"{ "namespace": "explorer" }"#).unwrap();
/// assert_eq!(options.storage_key("theme"), "explorer:theme");
/// assert_eq!(options.hydration, HydrationPolicy::PreferWrites);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreOptions {
    /// Prefix joined to every key with `:`.
    pub namespace: Option<String>,
    pub hydration: HydrationPolicy,
}

impl StoreOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    pub fn with_policy(mut self, policy: HydrationPolicy) -> Self {
        self.hydration = policy;
        self
    }

    /// Parse options from JSON, rejecting an empty namespace.
    pub fn from_json(text: &str) -> StoreResult<Self> {
        let options: StoreOptions = serde_json::from_str(text)
            .map_err(|e| StoreError::InvalidOptions(e.to_string()))?;
        options.validate()?;
        Ok(options)
    }

    pub fn validate(&self) -> StoreResult<()> {
        match &self.namespace {
            Some(ns) if ns.is_empty() => Err(StoreError::InvalidOptions(
                "namespace must not be empty".to_string(),
            )),
            _ => Ok(()),
        }
    }

    /// Physical key used in the backing store.
    pub fn storage_key(&self, key: &str) -> String {
        match &self.namespace {
            Some(ns) => format!("{ns}:{key}"),
            None => key.to_string(),
        }
    }
}
