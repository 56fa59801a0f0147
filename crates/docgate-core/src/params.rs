//! Request parameters and the dispatcher's request type

use crate::action::Action;
use crate::{GatewayError, Result};
use docgate_store::Namespace;
use indexmap::IndexMap;

/// Multi-valued request parameters, in arrival order
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Params(IndexMap<String, Vec<String>>);

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from `(key, value)` pairs, collecting repeated keys
    pub fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        let mut params = Self::new();
        for (k, v) in pairs {
            params.insert(k, v);
        }
        params
    }

    /// Append a value to a key
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.entry(key.into()).or_default().push(value.into());
    }

    /// Replace every value of a key
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), vec![value.into()]);
    }

    /// First value of a key
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(|v| v.first()).map(String::as_str)
    }

    pub fn get_all(&self, key: &str) -> &[String] {
        self.0.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Whether a key is present with a truthy first value. Empty, `0`,
    /// `false`, `no`, `off` and `null` are falsy, ignoring case and
    /// surrounding whitespace.
    pub fn is_truthy(&self, key: &str) -> bool {
        match self.get(key) {
            None => false,
            Some(raw) => {
                let value = raw.trim().to_ascii_lowercase();
                !matches!(value.as_str(), "" | "0" | "false" | "no" | "off" | "null")
            }
        }
    }

    /// Unsigned integer parameter, or `default` when absent
    pub fn get_u64(&self, key: &str, default: u64) -> Result<u64> {
        match self.get(key) {
            None => Ok(default),
            Some(raw) => raw
                .trim()
                .parse()
                .map_err(|_| GatewayError::validation(format!("{key} must be a non-negative integer, got {raw:?}"))),
        }
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Vec<String>)> {
        self.0.iter()
    }
}

/// One dispatchable request
#[derive(Clone, Debug, PartialEq)]
pub struct CommandRequest {
    pub action: Action,
    pub database: Option<String>,
    pub collection: Option<String>,
    pub params: Params,
}

impl CommandRequest {
    pub fn new(action: Action) -> Self {
        Self {
            action,
            database: None,
            collection: None,
            params: Params::new(),
        }
    }

    pub fn with_database(mut self, database: impl Into<String>) -> Self {
        self.database = Some(database.into());
        self
    }

    pub fn with_collection(mut self, collection: impl Into<String>) -> Self {
        self.collection = Some(collection.into());
        self
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(key, value);
        self
    }

    /// Connection name selected by the `name` parameter
    pub fn connection(&self) -> Option<&str> {
        self.params.get("name")
    }

    /// Database, required by the action
    pub fn require_database(&self) -> Result<&str> {
        self.database
            .as_deref()
            .ok_or_else(|| GatewayError::validation("db must be defined"))
    }

    /// Database and collection, required by collection-scoped actions
    pub fn namespace(&self) -> Result<Namespace> {
        match (&self.database, &self.collection) {
            (Some(db), Some(coll)) if !db.is_empty() && !coll.is_empty() => {
                Ok(Namespace::new(db.clone(), coll.clone()))
            }
            _ => Err(GatewayError::validation("db and collection must be defined")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truthiness() {
        let params = Params::from_pairs([
            ("a", "1"),
            ("b", "true"),
            ("c", " False "),
            ("d", "0"),
            ("e", ""),
            ("f", "NULL"),
            ("g", "off"),
            ("h", "yes"),
        ]);
        assert!(params.is_truthy("a"));
        assert!(params.is_truthy("b"));
        assert!(params.is_truthy("h"));
        for key in ["c", "d", "e", "f", "g", "missing"] {
            assert!(!params.is_truthy(key), "{key}");
        }
    }

    #[test]
    fn test_repeated_keys_keep_first() {
        let params = Params::from_pairs([("x", "1"), ("x", "2")]);
        assert_eq!(params.get("x"), Some("1"));
        assert_eq!(params.get_all("x").len(), 2);
    }

    #[test]
    fn test_numeric_params() {
        let params = Params::from_pairs([("skip", "5"), ("limit", "-1")]);
        assert_eq!(params.get_u64("skip", 0).unwrap(), 5);
        assert_eq!(params.get_u64("batch_size", 15).unwrap(), 15);
        assert!(matches!(params.get_u64("limit", 0), Err(GatewayError::Validation(_))));
    }

    #[test]
    fn test_namespace_requires_both_parts() {
        let req = CommandRequest::new(Action::Find).with_database("t");
        assert_eq!(
            req.namespace().unwrap_err().to_string(),
            "db and collection must be defined"
        );
        let ns = req.with_collection("c").namespace().unwrap();
        assert_eq!(ns.to_string(), "t.c");
    }
}
