//! Typed attribute values and the ordered map that carries them.

use std::collections::HashMap;

use serde_json::Value as JsonValue;

/// Safety guard for `AttributeMap::get_parsed`: values above this many bytes
/// are never JSON-parsed, even if they look like JSON.
pub const DEFAULT_MAX_PARSE_SIZE: usize = 2_000_000;

/// A tagged attribute value. Nested objects and heterogeneous arrays are not
/// representable directly — they are serialized to JSON and carried as
/// `Json`.
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeValue {
    String(String),
    Bool(bool),
    Int(i64),
    Double(f64),
    /// A homogeneous array of scalars.
    Array(Vec<AttributeValue>),
    /// A complex value, already serialized to a JSON string.
    Json(String),
}

impl AttributeValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttributeValue::String(s) => Some(s),
            AttributeValue::Json(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            AttributeValue::Int(i) => Some(*i),
            AttributeValue::Double(d) => Some(*d as i64),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            AttributeValue::Int(i) => Some(*i as f64),
            AttributeValue::Double(d) => Some(*d),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            AttributeValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Coerce an arbitrary JSON value into an `AttributeValue` per
    /// `toAttributeValue`: scalar stays scalar, a homogeneous scalar array
    /// stays an array, anything else is serialized to JSON. `null` yields
    /// `None` (a no-op set).
    pub fn from_json(v: &JsonValue) -> Option<Self> {
        match v {
            JsonValue::Null => None,
            JsonValue::String(s) => Some(AttributeValue::String(s.clone())),
            JsonValue::Bool(b) => Some(AttributeValue::Bool(*b)),
            JsonValue::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Some(AttributeValue::Int(i))
                } else {
                    Some(AttributeValue::Double(n.as_f64().unwrap_or(0.0)))
                }
            }
            JsonValue::Array(items) => {
                if items.is_empty() {
                    return Some(AttributeValue::Array(Vec::new()));
                }
                let all_scalar = items
                    .iter()
                    .all(|i| matches!(i, JsonValue::String(_) | JsonValue::Bool(_) | JsonValue::Number(_)));
                let homogeneous = all_scalar
                    && items
                        .windows(2)
                        .all(|w| scalar_kind(&w[0]) == scalar_kind(&w[1]));
                if homogeneous {
                    let arr = items
                        .iter()
                        .filter_map(AttributeValue::from_json)
                        .collect();
                    Some(AttributeValue::Array(arr))
                } else {
                    Some(AttributeValue::Json(v.to_string()))
                }
            }
            JsonValue::Object(_) => Some(AttributeValue::Json(v.to_string())),
        }
    }

    /// Render back to a `serde_json::Value`, the inverse of `from_json` for
    /// scalars/arrays; `Json` values are re-parsed (falling back to the raw
    /// string on malformed JSON, matching `safeJsonParse`'s tolerance).
    pub fn to_json(&self) -> JsonValue {
        match self {
            AttributeValue::String(s) => JsonValue::String(s.clone()),
            AttributeValue::Bool(b) => JsonValue::Bool(*b),
            AttributeValue::Int(i) => JsonValue::Number((*i).into()),
            AttributeValue::Double(d) => serde_json::Number::from_f64(*d)
                .map(JsonValue::Number)
                .unwrap_or(JsonValue::Null),
            AttributeValue::Array(items) => {
                JsonValue::Array(items.iter().map(AttributeValue::to_json).collect())
            }
            AttributeValue::Json(s) => {
                serde_json::from_str(s).unwrap_or_else(|_| JsonValue::String(s.clone()))
            }
        }
    }
}

/// An ordered string-keyed map of attribute values. Lookup is O(1);
/// iteration follows insertion order.
#[derive(Debug, Clone, Default)]
pub struct AttributeMap {
    order: Vec<String>,
    values: HashMap<String, AttributeValue>,
    /// Memoized JSON parses from `get_parsed`, invalidated on `take`/`delete`.
    parsed_cache: HashMap<String, JsonValue>,
}

impl AttributeMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn get(&self, key: &str) -> Option<&AttributeValue> {
        self.values.get(key)
    }

    /// Insert or overwrite a key, preserving original insertion position on
    /// overwrite.
    pub fn set(&mut self, key: impl Into<String>, value: AttributeValue) {
        let key = key.into();
        if !self.values.contains_key(&key) {
            self.order.push(key.clone());
        }
        self.parsed_cache.remove(&key);
        self.values.insert(key, value);
    }

    /// Remove and return a value, clearing any cached JSON parse.
    pub fn take(&mut self, key: &str) -> Option<AttributeValue> {
        self.parsed_cache.remove(key);
        let value = self.values.remove(key);
        if value.is_some() {
            self.order.retain(|k| k != key);
        }
        value
    }

    /// Remove and return the first key present from `keys`, along with the
    /// key that matched.
    pub fn take_any(&mut self, keys: &[&str]) -> Option<(String, AttributeValue)> {
        for k in keys {
            if let Some(v) = self.take(k) {
                return Some((k.to_string(), v));
            }
        }
        None
    }

    pub fn delete(&mut self, key: &str) {
        self.parsed_cache.remove(key);
        if self.values.remove(key).is_some() {
            self.order.retain(|k| k != key);
        }
    }

    /// Snapshot of all remaining entries in insertion order.
    pub fn remaining(&self) -> Vec<(&str, &AttributeValue)> {
        self.order
            .iter()
            .filter_map(|k| self.values.get(k).map(|v| (k.as_str(), v)))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Parse a JSON-looking string value once and cache the result.
    /// Non-string values are returned as-is (converted). Values whose byte
    /// length exceeds `max_size` are never parsed. Parse failure caches the
    /// original string so repeated calls don't re-attempt the parse.
    pub fn get_parsed(&mut self, key: &str, max_size: usize) -> Option<JsonValue> {
        if let Some(cached) = self.parsed_cache.get(key) {
            return Some(cached.clone());
        }
        let value = self.values.get(key)?;
        let result = match value {
            AttributeValue::String(s) | AttributeValue::Json(s) => {
                if s.len() > max_size || !looks_like_json(s) {
                    JsonValue::String(s.clone())
                } else {
                    serde_json::from_str(s).unwrap_or_else(|_| JsonValue::String(s.clone()))
                }
            }
            other => other.to_json(),
        };
        self.parsed_cache.insert(key.to_string(), result.clone());
        Some(result)
    }
}

fn scalar_kind(v: &JsonValue) -> u8 {
    match v {
        JsonValue::String(_) => 0,
        JsonValue::Bool(_) => 1,
        JsonValue::Number(_) => 2,
        _ => 3,
    }
}

fn looks_like_json(s: &str) -> bool {
    let trimmed = s.trim();
    (trimmed.starts_with('{') && trimmed.ends_with('}'))
        || (trimmed.starts_with('[') && trimmed.ends_with(']'))
}

/// Parse a JSON-looking string; on failure (or if it doesn't look like JSON)
/// return the original string value unchanged.
pub fn safe_json_parse(s: &str) -> JsonValue {
    if looks_like_json(s) {
        serde_json::from_str(s).unwrap_or_else(|_| JsonValue::String(s.to_string()))
    } else {
        JsonValue::String(s.to_string())
    }
}
