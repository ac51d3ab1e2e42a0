//! Structured event payloads
//!
//! A sysevent carries name/value lists. Only string and 32-bit integer values
//! are surfaced; pairs of any other native type are skipped when a decoder
//! builds an [`NvList`] through [`NvList::from_raw`].

use std::fmt;

use serde::ser::{Serialize, SerializeMap, Serializer};

/// A single supported payload value
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(untagged)]
pub enum NvValue {
    String(String),
    Int32(i32),
}

impl NvValue {
    /// Borrow the value as a string, if it is one
    pub fn as_str(&self) -> Option<&str> {
        match self {
            NvValue::String(s) => Some(s),
            NvValue::Int32(_) => None,
        }
    }

    /// Get the value as an integer, if it is one
    pub fn as_i32(&self) -> Option<i32> {
        match self {
            NvValue::Int32(v) => Some(*v),
            NvValue::String(_) => None,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            NvValue::String(_) => "string",
            NvValue::Int32(_) => "int32",
        }
    }
}

impl fmt::Display for NvValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NvValue::String(s) => write!(f, "{}", s),
            NvValue::Int32(v) => write!(f, "{}", v),
        }
    }
}

impl From<&str> for NvValue {
    fn from(value: &str) -> Self {
        NvValue::String(value.to_string())
    }
}

impl From<String> for NvValue {
    fn from(value: String) -> Self {
        NvValue::String(value)
    }
}

impl From<i32> for NvValue {
    fn from(value: i32) -> Self {
        NvValue::Int32(value)
    }
}

/// A pair value as handed over by a native decoder, before filtering
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawNvValue {
    String(String),
    Int32(i32),
    /// Any other native data type, identified by its type code
    Unsupported { type_code: i32 },
}

/// Ordered list of uniquely named values
///
/// Insertion order is preserved. Inserting a name that already exists
/// replaces its value in place.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NvList {
    pairs: Vec<(String, NvValue)>,
}

impl NvList {
    /// Create an empty list
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a list from decoder output, skipping unsupported value types
    pub fn from_raw<I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (String, RawNvValue)>,
    {
        let mut list = Self::new();
        for (name, raw) in pairs {
            match raw {
                RawNvValue::String(s) => {
                    list.insert(name, s);
                }
                RawNvValue::Int32(v) => {
                    list.insert(name, v);
                }
                RawNvValue::Unsupported { type_code } => {
                    tracing::warn!("Skipping pair {} with unknown type: {}", name, type_code);
                }
            }
        }
        list
    }

    /// Insert a value, returning the previous value for that name
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<NvValue>) -> Option<NvValue> {
        let name = name.into();
        let value = value.into();

        match self.pairs.iter_mut().find(|(n, _)| *n == name) {
            Some((_, existing)) => Some(std::mem::replace(existing, value)),
            None => {
                self.pairs.push((name, value));
                None
            }
        }
    }

    /// Builder-style insert
    pub fn with(mut self, name: impl Into<String>, value: impl Into<NvValue>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn get(&self, name: &str) -> Option<&NvValue> {
        self.pairs.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(NvValue::as_str)
    }

    pub fn get_i32(&self, name: &str) -> Option<i32> {
        self.get(name).and_then(NvValue::as_i32)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Remove a pair by name, returning its value
    pub fn remove(&mut self, name: &str) -> Option<NvValue> {
        let index = self.pairs.iter().position(|(n, _)| n == name)?;
        Some(self.pairs.remove(index).1)
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Iterate over pairs in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &NvValue)> {
        self.pairs.iter().map(|(n, v)| (n.as_str(), v))
    }

    /// Render the list as a flat JSON object
    pub fn to_json(&self) -> serde_json::Value {
        let map = self
            .pairs
            .iter()
            .map(|(n, v)| {
                let value = match v {
                    NvValue::String(s) => serde_json::Value::from(s.as_str()),
                    NvValue::Int32(i) => serde_json::Value::from(*i),
                };
                (n.clone(), value)
            })
            .collect();
        serde_json::Value::Object(map)
    }
}

impl Serialize for NvList {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.pairs.len()))?;
        for (name, value) in &self.pairs {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

impl<K, V> FromIterator<(K, V)> for NvList
where
    K: Into<String>,
    V: Into<NvValue>,
{
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let mut list = NvList::new();
        for (name, value) in iter {
            list.insert(name, value);
        }
        list
    }
}
