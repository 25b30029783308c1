use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value as Json;

use super::Value;

/// Nested property storage addressed by dot-separated paths such as
/// `"abilities.str.mod"`.
///
/// This is the property half of a derived-data draft and of the finished
/// snapshot. Maps are ordered so serialization is deterministic.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PropertyTree {
    data: BTreeMap<String, Node>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub(crate) enum Node {
    Leaf(Value),
    Nested(BTreeMap<String, Node>),
}

impl PropertyTree {
    /// Create an empty tree.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a tree from a JSON object. Arrays and nulls carry no numeric
    /// meaning for rule elements and are skipped.
    #[must_use]
    pub fn from_json(json: &Json) -> Self {
        let mut tree = Self::new();
        if let Json::Object(_) = json {
            tree.merge_json("", json);
        }
        tree
    }

    /// Set a value at a dot-separated path. Creates intermediate nested maps as needed.
    #[must_use]
    pub fn set(mut self, path: &str, value: impl Into<Value>) -> Self {
        self.insert(path, value.into());
        self
    }

    /// Insert a value at a dot-separated path (mutable reference version).
    pub fn insert(&mut self, path: &str, value: Value) {
        let segments: Vec<&str> = path.split('.').collect();
        Self::insert_recursive(&mut self.data, &segments, value);
    }

    /// Merge a JSON value under `prefix` (empty for the root). Objects are
    /// merged key by key; scalars overwrite.
    pub fn merge_json(&mut self, prefix: &str, json: &Json) {
        match json {
            Json::Object(map) => {
                for (key, child) in map {
                    let path = if prefix.is_empty() {
                        key.clone()
                    } else {
                        format!("{prefix}.{key}")
                    };
                    self.merge_json(&path, child);
                }
            }
            Json::Bool(b) if !prefix.is_empty() => self.insert(prefix, Value::Bool(*b)),
            Json::String(s) if !prefix.is_empty() => self.insert(prefix, Value::String(s.clone())),
            Json::Number(n) if !prefix.is_empty() => {
                let value = match n.as_i64() {
                    Some(i) => Value::Int(i),
                    None => Value::Float(n.as_f64().unwrap_or_default()),
                };
                self.insert(prefix, value);
            }
            _ => {}
        }
    }

    /// Look up a value by dot-separated path.
    /// Returns `None` if the path does not exist or points to a nested map.
    #[must_use]
    pub fn get(&self, path: &str) -> Option<&Value> {
        let segments: Vec<&str> = path.split('.').collect();
        Self::get_recursive(&self.data, &segments)
    }

    /// Numeric view of the value at `path`, if there is one.
    #[must_use]
    pub fn get_number(&self, path: &str) -> Option<f64> {
        self.get(path).and_then(Value::as_f64)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    fn insert_recursive(map: &mut BTreeMap<String, Node>, segments: &[&str], value: Value) {
        match segments {
            [] => {}
            [last] => {
                map.insert((*last).to_owned(), Node::Leaf(value));
            }
            [first, rest @ ..] => {
                let entry = map
                    .entry((*first).to_owned())
                    .or_insert_with(|| Node::Nested(BTreeMap::new()));
                match entry {
                    Node::Nested(nested) => {
                        Self::insert_recursive(nested, rest, value);
                    }
                    Node::Leaf(_) => {
                        let mut nested = BTreeMap::new();
                        Self::insert_recursive(&mut nested, rest, value);
                        *entry = Node::Nested(nested);
                    }
                }
            }
        }
    }

    fn get_recursive<'a>(map: &'a BTreeMap<String, Node>, segments: &[&str]) -> Option<&'a Value> {
        match segments {
            [] => None,
            [last] => match map.get(*last)? {
                Node::Leaf(v) => Some(v),
                Node::Nested(_) => None,
            },
            [first, rest @ ..] => match map.get(*first)? {
                Node::Nested(nested) => Self::get_recursive(nested, rest),
                Node::Leaf(_) => None,
            },
        }
    }

    #[cfg(feature = "binary-cache")]
    pub(crate) fn nodes(&self) -> &BTreeMap<String, Node> {
        &self.data
    }

    #[cfg(feature = "binary-cache")]
    pub(crate) fn from_nodes(data: BTreeMap<String, Node>) -> Self {
        Self { data }
    }
}
