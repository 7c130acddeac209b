// SPDX-FileCopyrightText: 2026 Quarry Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Data model shared by the dispatcher, worker and router.

use std::any::Any;
use std::fmt;
use std::sync::{Arc, Weak};

use serde::ser::{Serialize, SerializeMap, Serializer};

use crate::traits::DatabaseUser;

/// Caller-assigned request identifier. Uniqueness is the caller's concern.
pub type RequestId = i64;

/// Caller-owned payload carried through the service untouched.
pub type Payload = Arc<dyn Any + Send + Sync>;

/// A dynamically-typed column value as returned by the engine.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Real(v) => Some(*v),
            Value::Integer(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_blob(&self) -> Option<&[u8]> {
        match self {
            Value::Blob(v) => Some(v),
            _ => None,
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Integer(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Real(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Blob(v)
    }
}

/// One result row: column names mapped to values, in the order the engine
/// reported the columns.
///
/// Duplicate column names (e.g. `SELECT 1 AS a, 2 AS a`) are kept; lookups
/// by name return the first match.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    fields: Vec<(String, Value)>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            fields: Vec::with_capacity(capacity),
        }
    }

    /// Append a column. Order of insertion is the column order.
    pub fn push(&mut self, column: impl Into<String>, value: Value) {
        self.fields.push((column.into(), value));
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.fields
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value)
    }

    /// Value at a zero-based column index.
    pub fn value_at(&self, index: usize) -> Option<&Value> {
        self.fields.get(index).map(|(_, value)| value)
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(name, _)| name.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(name, value)| (name.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl<K: Into<String>> FromIterator<(K, Value)> for Record {
    fn from_iter<I: IntoIterator<Item = (K, Value)>>(iter: I) -> Self {
        Self {
            fields: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}

// Serialized as a JSON object; serde_json keeps insertion order only with
// `preserve_order`, so the map is written field by field.
impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (name, value) in &self.fields {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

/// Capabilities a [`DatabaseUser`] reports to the subscription check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UserCapabilities {
    pub submit_queries: bool,
    pub receive_results: bool,
}

impl UserCapabilities {
    pub const fn full() -> Self {
        Self {
            submit_queries: true,
            receive_results: true,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.submit_queries && self.receive_results
    }

    /// Comma-separated list of the capabilities this set lacks.
    pub fn missing(&self) -> String {
        let mut missing = Vec::new();
        if !self.submit_queries {
            missing.push("submit_queries");
        }
        if !self.receive_results {
            missing.push("receive_results");
        }
        missing.join(", ")
    }
}

/// Identity of a caller: the address of its `Arc` allocation.
///
/// The subscription table keeps a `Weak` per key, which keeps the allocation
/// (not the value) alive, so a key cannot be reused by a different caller
/// while it is still registered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UserKey(usize);

impl UserKey {
    pub fn of(user: &Arc<dyn DatabaseUser>) -> Self {
        Self(Arc::as_ptr(user) as *const () as usize)
    }

    pub fn of_weak(user: &Weak<dyn DatabaseUser>) -> Self {
        Self(Weak::as_ptr(user) as *const () as usize)
    }
}

/// A query waiting in the worker's queue.
pub struct QueryRequest {
    pub query: String,
    pub user: Weak<dyn DatabaseUser>,
    pub request_id: RequestId,
    pub db_name: String,
    pub data: Option<Payload>,
}

impl fmt::Debug for QueryRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryRequest")
            .field("query", &self.query)
            .field("user", &UserKey::of_weak(&self.user))
            .field("request_id", &self.request_id)
            .field("db_name", &self.db_name)
            .field("data", &self.data.is_some())
            .finish()
    }
}

/// The outcome of one request. `request_id` and `data` echo the request.
///
/// `rows` is empty both for statements that return nothing and for requests
/// that failed; the two cases look the same here.
#[derive(Clone)]
pub struct QueryResult {
    pub rows: Vec<Record>,
    pub request_id: RequestId,
    pub data: Option<Payload>,
}

impl QueryResult {
    /// An empty result echoing the request's correlation fields.
    pub fn empty(request_id: RequestId, data: Option<Payload>) -> Self {
        Self {
            rows: Vec::new(),
            request_id,
            data,
        }
    }
}

impl fmt::Debug for QueryResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryResult")
            .field("rows", &self.rows)
            .field("request_id", &self.request_id)
            .field("data", &self.data.is_some())
            .finish()
    }
}

/// Health reported by the dispatcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    /// Worker is running.
    Healthy,
    /// Running, but something is off (e.g. the last open failed).
    Degraded(String),
    /// Not running.
    Unhealthy(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_keeps_column_order() {
        let mut record = Record::new();
        record.push("b", Value::Integer(2));
        record.push("a", Value::Integer(1));
        let columns: Vec<&str> = record.columns().collect();
        assert_eq!(columns, vec!["b", "a"]);
        assert_eq!(record.value_at(0), Some(&Value::Integer(2)));
    }

    #[test]
    fn record_get_returns_first_duplicate() {
        let record: Record = vec![("a", Value::Integer(1)), ("a", Value::from("second"))]
            .into_iter()
            .collect();
        assert_eq!(record.get("a"), Some(&Value::Integer(1)));
        assert_eq!(record.len(), 2);
        assert!(record.get("missing").is_none());
    }

    #[test]
    fn record_serializes_in_column_order() {
        let record: Record = vec![
            ("zeta", Value::Null),
            ("alpha", Value::from(1.5)),
            ("mid", Value::from("x")),
        ]
        .into_iter()
        .collect();
        let json = serde_json::to_string(&record).unwrap();
        assert_eq!(json, r#"{"zeta":null,"alpha":1.5,"mid":"x"}"#);
    }

    #[test]
    fn value_accessors() {
        assert_eq!(Value::Integer(3).as_i64(), Some(3));
        assert_eq!(Value::Integer(3).as_f64(), Some(3.0));
        assert_eq!(Value::from("t").as_str(), Some("t"));
        assert_eq!(Value::from(vec![1u8, 2]).as_blob(), Some(&[1u8, 2][..]));
        assert!(Value::Null.is_null());
        assert!(Value::Text("1".into()).as_i64().is_none());
    }

    #[test]
    fn capabilities_report_missing() {
        assert!(UserCapabilities::full().is_complete());
        let caps = UserCapabilities {
            submit_queries: true,
            receive_results: false,
        };
        assert!(!caps.is_complete());
        assert_eq!(caps.missing(), "receive_results");
    }

    #[test]
    fn empty_result_echoes_correlation_fields() {
        let payload: Payload = Arc::new(42u32);
        let result = QueryResult::empty(9, Some(payload.clone()));
        assert!(result.rows.is_empty());
        assert_eq!(result.request_id, 9);
        assert!(Arc::ptr_eq(result.data.as_ref().unwrap(), &payload));
    }
}
