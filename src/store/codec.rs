use crate::error::{StoreError, StoreResult};
use crate::truthy::Truthy;
use serde::de::DeserializeOwned;
use serde::Serialize;

/// What a backing-store read turned out to hold.
#[derive(Debug)]
pub(crate) enum Fetched<T> {
    /// No entry, or an empty string.
    Missing,
    Value(T),
    Corrupt(StoreError),
}

pub(crate) fn interpret<T: DeserializeOwned>(key: &str, text: Option<String>) -> Fetched<T> {
    match text {
        None => Fetched::Missing,
        Some(text) if text.is_empty() => Fetched::Missing,
        Some(text) => match serde_json::from_str(&text) {
            Ok(value) => Fetched::Value(value),
            Err(source) => Fetched::Corrupt(StoreError::HydrationParse {
                key: key.to_string(),
                source,
            }),
        },
    }
}

pub(crate) fn encode<T: Serialize>(key: &str, value: &T) -> StoreResult<String> {
    serde_json::to_string(value).map_err(|source| StoreError::Serialize {
        key: key.to_string(),
        source,
    })
}

/// The backing-store mutation a write turns into.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Persist {
    Set(String),
    Remove,
}

/// Decide what a write of `value` stores. Falsy values remove the entry;
/// values that fail to serialize are logged and not persisted.
pub(crate) fn plan<T: Serialize + Truthy>(key: &str, value: &T) -> Option<Persist> {
    if !value.is_truthy() {
        return Some(Persist::Remove);
    }
    match encode(key, value) {
        Ok(text) => Some(Persist::Set(text)),
        Err(e) => {
            tracing::warn!(key = %key, error = %e, "value not persisted");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_text_is_missing() {
        assert!(matches!(interpret::<i32>("k", None), Fetched::Missing));
        assert!(matches!(
            interpret::<i32>("k", Some(String::new())),
            Fetched::Missing
        ));
    }

    #[test]
    fn corrupt_text_is_a_parse_error() {
        match interpret::<i32>("x", Some("not json".to_string())) {
            Fetched::Corrupt(err) => assert!(err.is_parse()),
            other => panic!("expected corrupt, got {other:?}"),
        }
    }

    #[test]
    fn falsy_values_plan_a_removal() {
        assert_eq!(plan("n", &0), Some(Persist::Remove));
        assert_eq!(plan("n", &None::<String>), Some(Persist::Remove));
        assert_eq!(plan("n", &3), Some(Persist::Set("3".to_string())));
    }

    #[test]
    fn json_string_value() {
        let encoded = encode("theme", &"dark").unwrap();
        assert_eq!(encoded, "\"dark\"");
        match interpret::<String>("theme", Some(encoded)) {
            Fetched::Value(v) => assert_eq!(v, "dark"),
            other => panic!("expected value, got {other:?}"),
        }
    }
}
