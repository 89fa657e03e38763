//! Immutable read results from the tree database
//!
//! A [`Snapshot`] is what [`Reference::get`](super::Reference::get)
//! returns: the value captured at a path, modeled as an explicit tagged
//! union rather than a dynamically-typed wrapper. An absent path is
//! [`Snapshot::Missing`], never an error.

use crate::error::Result;
use serde_json::{Map, Value};

/// The value captured at a tree path.
///
/// Child iteration is defined per variant: insertion order for objects
/// (`serde_json` is built with `preserve_order`), index order for lists
/// (keys are the stringified indices), and empty for scalars and
/// missing data.
///
/// # Examples
///
/// ```
/// use quillbase::tree::Snapshot;
/// use serde_json::json;
///
/// let snapshot = Snapshot::from_value(json!({"b": 1, "a": 2}));
/// let keys: Vec<String> = snapshot.children().into_iter().map(|(k, _)| k).collect();
/// assert_eq!(keys, vec!["b", "a"]); // insertion order, not sorted
///
/// assert!(Snapshot::from_value(json!(null)).is_missing());
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum Snapshot {
    /// Nothing stored at the path
    Missing,
    /// A scalar (string, number, or boolean)
    Scalar(Value),
    /// A mapping; iteration follows insertion order
    Object(Map<String, Value>),
    /// A sequence; iteration follows index order
    List(Vec<Value>),
}

impl Snapshot {
    /// Classifies a raw JSON value. `null` normalizes to `Missing`.
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Null => Snapshot::Missing,
            Value::Object(map) => Snapshot::Object(map),
            Value::Array(items) => Snapshot::List(items),
            scalar => Snapshot::Scalar(scalar),
        }
    }

    /// Returns `true` when nothing was stored at the path.
    pub fn is_missing(&self) -> bool {
        matches!(self, Snapshot::Missing)
    }

    /// The captured value, or `None` when missing.
    pub fn value(&self) -> Option<Value> {
        match self {
            Snapshot::Missing => None,
            Snapshot::Scalar(v) => Some(v.clone()),
            Snapshot::Object(map) => Some(Value::Object(map.clone())),
            Snapshot::List(items) => Some(Value::Array(items.clone())),
        }
    }

    /// Borrows the object mapping, if this snapshot is one.
    pub fn as_object(&self) -> Option<&Map<String, Value>> {
        match self {
            Snapshot::Object(map) => Some(map),
            _ => None,
        }
    }

    /// Direct children as `(key, Snapshot)` pairs.
    pub fn children(&self) -> Vec<(String, Snapshot)> {
        match self {
            Snapshot::Object(map) => map
                .iter()
                .map(|(key, value)| (key.clone(), Snapshot::from_value(value.clone())))
                .collect(),
            Snapshot::List(items) => items
                .iter()
                .enumerate()
                .map(|(index, value)| (index.to_string(), Snapshot::from_value(value.clone())))
                .collect(),
            Snapshot::Missing | Snapshot::Scalar(_) => Vec::new(),
        }
    }

    /// Decodes the snapshot into a typed record.
    ///
    /// Missing data decodes to `Ok(None)`; a present value that does not
    /// match `T` is a serialization error.
    pub fn decode<T: serde::de::DeserializeOwned>(&self) -> Result<Option<T>> {
        match self.value() {
            None => Ok(None),
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
        }
    }
}
