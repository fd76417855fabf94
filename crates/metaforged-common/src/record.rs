//! Tagged-union record model shared by providers, the merger and the cache.
//!
//! A [`Record`] maps field names to [`Value`]s. A value is either a
//! [`Scalar`], an ordered list of values (multi-valued fields such as genres or
//! cast), or a nested record (notably the `art` sub-record mapping artwork type
//! to URI). Empty text, empty lists and empty records are the identity element
//! for merging; numbers and booleans are never empty.
//!
//! Serialization is untagged JSON so a cached record round-trips losslessly:
//!
//! ```
//! use metaforged_common::{Record, Value};
//!
//! let record: Record = [
//!     ("title", Value::from("The Matrix")),
//!     ("year", Value::from(1999)),
//!     ("genre", Value::from(vec!["Action", "Sci-Fi"])),
//! ]
//! .into_iter()
//! .collect();
//!
//! let json = serde_json::to_string(&record).unwrap();
//! let back: Record = serde_json::from_str(&json).unwrap();
//! assert_eq!(record, back);
//! ```

use std::collections::btree_map::{self, BTreeMap};
use std::fmt;

use serde::{Deserialize, Serialize};

/// Field name of the artwork sub-record.
pub const ART_FIELD: &str = "art";

/// A single non-collection value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl Scalar {
    /// Only empty text counts as empty; `0` and `false` are real data.
    pub fn is_empty(&self) -> bool {
        matches!(self, Scalar::Text(s) if s.is_empty())
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Bool(b) => write!(f, "{b}"),
            Scalar::Int(i) => write!(f, "{i}"),
            Scalar::Float(x) => write!(f, "{x}"),
            Scalar::Text(s) => f.write_str(s),
        }
    }
}

/// A field value: scalar, ordered sequence, or nested record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Scalar(Scalar),
    List(Vec<Value>),
    Record(Record),
}

impl Value {
    pub fn is_empty(&self) -> bool {
        match self {
            Value::Scalar(s) => s.is_empty(),
            Value::List(items) => items.is_empty(),
            Value::Record(r) => r.is_empty(),
        }
    }

    /// Short name of the variant, used in merge diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Scalar(_) => "scalar",
            Value::List(_) => "list",
            Value::Record(_) => "record",
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Scalar(Scalar::Text(s)) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Scalar(Scalar::Int(i)) => Some(*i),
            Value::Scalar(Scalar::Text(s)) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Scalar(Scalar::Float(x)) => Some(*x),
            Value::Scalar(Scalar::Int(i)) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_record(&self) -> Option<&Record> {
        match self {
            Value::Record(r) => Some(r),
            _ => None,
        }
    }

    /// Convert arbitrary JSON into a value, dropping `null`s.
    ///
    /// Returns `None` for `null` itself.
    pub fn from_json(json: serde_json::Value) -> Option<Value> {
        match json {
            serde_json::Value::Null => None,
            serde_json::Value::Bool(b) => Some(Value::Scalar(Scalar::Bool(b))),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Some(Value::Scalar(Scalar::Int(i))),
                None => n.as_f64().map(|x| Value::Scalar(Scalar::Float(x))),
            },
            serde_json::Value::String(s) => Some(Value::Scalar(Scalar::Text(s))),
            serde_json::Value::Array(items) => Some(Value::List(
                items.into_iter().filter_map(Value::from_json).collect(),
            )),
            serde_json::Value::Object(map) => Some(Value::Record(
                map.into_iter()
                    .filter_map(|(k, v)| Value::from_json(v).map(|v| (k, v)))
                    .collect(),
            )),
        }
    }
}

impl From<Scalar> for Value {
    fn from(s: Scalar) -> Self {
        Value::Scalar(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Scalar(Scalar::Text(s.to_string()))
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Scalar(Scalar::Text(s))
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Scalar(Scalar::Int(i))
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Scalar(Scalar::Int(i64::from(i)))
    }
}

impl From<u32> for Value {
    fn from(i: u32) -> Self {
        Value::Scalar(Scalar::Int(i64::from(i)))
    }
}

impl From<u16> for Value {
    fn from(i: u16) -> Self {
        Value::Scalar(Scalar::Int(i64::from(i)))
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Scalar(Scalar::Float(x))
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Scalar(Scalar::Bool(b))
    }
}

impl From<Record> for Value {
    fn from(r: Record) -> Self {
        Value::Record(r)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Value::List(items.into_iter().map(Into::into).collect())
    }
}

/// A mapping from field name to value, ordered by field name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record(BTreeMap<String, Value>);

impl Record {
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    pub fn get_mut(&mut self, field: &str) -> Option<&mut Value> {
        self.0.get_mut(field)
    }

    /// Text value of `field`, if it is a text scalar.
    pub fn get_str(&self, field: &str) -> Option<&str> {
        self.get(field).and_then(Value::as_str)
    }

    /// Whether `field` holds a non-empty value.
    pub fn has(&self, field: &str) -> bool {
        self.get(field).is_some_and(|v| !v.is_empty())
    }

    pub fn insert(&mut self, field: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.insert(field.into(), value.into())
    }

    /// Builder-style insert.
    pub fn with(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(field, value);
        self
    }

    pub fn remove(&mut self, field: &str) -> Option<Value> {
        self.0.remove(field)
    }

    pub fn contains_key(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// A record is empty when it has no field carrying a non-empty value.
    pub fn is_empty(&self) -> bool {
        self.0.values().all(Value::is_empty)
    }

    pub fn iter(&self) -> btree_map::Iter<'_, String, Value> {
        self.0.iter()
    }

    pub fn iter_mut(&mut self) -> btree_map::IterMut<'_, String, Value> {
        self.0.iter_mut()
    }

    pub fn keys(&self) -> btree_map::Keys<'_, String, Value> {
        self.0.keys()
    }

    /// The artwork sub-record, if present.
    pub fn art(&self) -> Option<&Record> {
        self.get(ART_FIELD).and_then(Value::as_record)
    }

    /// Mutable artwork sub-record, created on demand.
    ///
    /// A non-record value stored under `art` is replaced.
    pub fn art_mut(&mut self) -> &mut Record {
        let slot = self
            .0
            .entry(ART_FIELD.to_string())
            .or_insert_with(|| Value::Record(Record::new()));
        if !matches!(slot, Value::Record(_)) {
            *slot = Value::Record(Record::new());
        }
        match slot {
            Value::Record(r) => r,
            _ => unreachable!("art slot was just normalized to a record"),
        }
    }

    /// Convert a JSON object into a record. Non-objects yield an empty record.
    pub fn from_json(json: serde_json::Value) -> Record {
        match Value::from_json(json) {
            Some(Value::Record(r)) => r,
            _ => Record::new(),
        }
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Record {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

impl IntoIterator for Record {
    type Item = (String, Value);
    type IntoIter = btree_map::IntoIter<String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a Record {
    type Item = (&'a String, &'a Value);
    type IntoIter = btree_map::Iter<'a, String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_emptiness() {
        assert!(Value::from("").is_empty());
        assert!(!Value::from("x").is_empty());
        assert!(!Value::from(0).is_empty());
        assert!(!Value::from(false).is_empty());
        assert!(Value::List(vec![]).is_empty());
        assert!(Value::Record(Record::new()).is_empty());
    }

    #[test]
    fn test_record_with_only_empty_fields_is_empty() {
        let record = Record::new().with("title", "").with("genre", Vec::<String>::new());
        assert!(record.is_empty());
        assert_eq!(record.len(), 2);
    }

    #[test]
    fn test_untagged_round_trip_keeps_number_kinds() {
        let record = Record::new()
            .with("year", 1999)
            .with("rating", 8.5)
            .with("whole_rating", 8.0)
            .with("watched", true)
            .with("cast", vec![Record::new().with("name", "Keanu Reeves")]);

        let json = serde_json::to_string(&record).unwrap();
        let back: Record = serde_json::from_str(&json).unwrap();
        assert_eq!(back, record);
        assert_eq!(back.get("whole_rating"), Some(&Value::from(8.0)));
    }

    #[test]
    fn test_from_json_drops_nulls() {
        let json = serde_json::json!({
            "title": "Alien",
            "tagline": null,
            "genres": ["Horror", null],
            "art": {"poster": "http://x/p.jpg", "fanart": null}
        });
        let record = Record::from_json(json);
        assert_eq!(record.get_str("title"), Some("Alien"));
        assert!(!record.contains_key("tagline"));
        assert_eq!(record.get("genres"), Some(&Value::from(vec!["Horror"])));
        assert_eq!(record.art().unwrap().len(), 1);
    }

    #[test]
    fn test_art_mut_creates_and_replaces() {
        let mut record = Record::new().with("art", "not a record");
        record.art_mut().insert("poster", "p.jpg");
        assert_eq!(record.art().unwrap().get_str("poster"), Some("p.jpg"));
    }

    #[test]
    fn test_as_i64_parses_text() {
        assert_eq!(Value::from("42").as_i64(), Some(42));
        assert_eq!(Value::from(7).as_i64(), Some(7));
        assert_eq!(Value::from("x").as_i64(), None);
    }
}
