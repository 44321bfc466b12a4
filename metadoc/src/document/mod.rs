// Documents - one row of a doctype's live table, held as an attribute map

use crate::error::{MetadocError, Result};
use rusqlite::types::{ToSql, ToSqlOutput, Value as SqlValue, ValueRef};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Attribute map from field name to value.
pub type Data = BTreeMap<String, Value>;

/// A record of some doctype. `id` is `None` until the store assigns one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(rename = "doctype_name")]
    pub doctype: String,
    #[serde(default)]
    pub data: Data,
}

impl Document {
    pub fn new(doctype: impl Into<String>) -> Self {
        Document {
            id: None,
            doctype: doctype.into(),
            data: Data::new(),
        }
    }

    pub fn with_id(mut self, id: i64) -> Self {
        self.id = Some(id);
        self
    }

    pub fn set(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.data.insert(field.into(), value.into());
        self
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.data.get(field)
    }
}

/// An untyped scalar as stored by the engine.
///
/// Serializes as the bare JSON scalar, `null` for `Null`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Integer(i64),
    Real(f64),
    Text(String),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(n) => Some(*n),
            Value::Bool(b) => Some(*b as i64),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Integer(n) => Some(*n as f64),
            Value::Real(f) => Some(*f),
            _ => None,
        }
    }

    /// Booleans come back from storage as 0/1 integers; accept both shapes.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            Value::Integer(0) => Some(false),
            Value::Integer(1) => Some(true),
            _ => None,
        }
    }

    /// Convert a decoded JSON value. Arrays and objects have no column
    /// representation and are rejected.
    pub fn from_json(value: serde_json::Value) -> Result<Self> {
        match value {
            serde_json::Value::Null => Ok(Value::Null),
            serde_json::Value::Bool(b) => Ok(Value::Bool(b)),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Ok(Value::Integer(i))
                } else if let Some(f) = n.as_f64() {
                    Ok(Value::Real(f))
                } else {
                    Err(MetadocError::Validation(format!("Number {n} is out of range")))
                }
            }
            serde_json::Value::String(s) => Ok(Value::Text(s)),
            other => Err(MetadocError::Validation(format!(
                "Unsupported value {other}: only scalars can be stored"
            ))),
        }
    }

    /// Convert a JSON object body into an attribute map.
    pub fn map_from_json(value: serde_json::Value) -> Result<Data> {
        match value {
            serde_json::Value::Object(map) => map
                .into_iter()
                .map(|(k, v)| Ok((k, Value::from_json(v)?)))
                .collect(),
            other => Err(MetadocError::Validation(format!(
                "Document data must be a JSON object, got {other}"
            ))),
        }
    }

    /// Interpret a form-submitted string: JSON scalars (`42`, `1.5`, `true`,
    /// `null`) become typed values, anything else stays text.
    pub fn parse_form(input: &str) -> Self {
        match serde_json::from_str::<serde_json::Value>(input) {
            Ok(json) => Value::from_json(json).unwrap_or_else(|_| Value::Text(input.to_string())),
            Err(_) => Value::Text(input.to_string()),
        }
    }
}

impl From<SqlValue> for Value {
    fn from(value: SqlValue) -> Self {
        match value {
            SqlValue::Null => Value::Null,
            SqlValue::Integer(n) => Value::Integer(n),
            SqlValue::Real(f) => Value::Real(f),
            SqlValue::Text(s) => Value::Text(s),
            SqlValue::Blob(b) => Value::Text(String::from_utf8_lossy(&b).into()),
        }
    }
}

impl ToSql for Value {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            Value::Null => ToSqlOutput::Owned(SqlValue::Null),
            Value::Bool(b) => ToSqlOutput::Owned(SqlValue::Integer(*b as i64)),
            Value::Integer(n) => ToSqlOutput::Owned(SqlValue::Integer(*n)),
            Value::Real(f) => ToSqlOutput::Owned(SqlValue::Real(*f)),
            Value::Text(s) => ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes())),
        })
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Integer(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Integer(n.into())
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Real(f)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_document_serializes_to_json() {
        let doc = Document::new("Task")
            .with_id(1)
            .set("title", "write spec")
            .set("done", false)
            .set("due", Value::Null);
        let json = serde_json::to_value(&doc).unwrap();
        assert_eq!(
            json,
            json!({
                "id": 1,
                "doctype_name": "Task",
                "data": { "done": false, "due": null, "title": "write spec" }
            })
        );
    }

    #[test]
    fn test_document_deserializes_from_request_body() {
        let doc: Document = serde_json::from_value(json!({
            "doctype_name": "Task",
            "data": { "title": "x", "estimate": 1.5, "count": 3, "done": true, "note": null }
        }))
        .unwrap();
        assert_eq!(doc.id, None);
        assert_eq!(doc.get("estimate"), Some(&Value::Real(1.5)));
        assert_eq!(doc.get("count"), Some(&Value::Integer(3)));
        assert_eq!(doc.get("done"), Some(&Value::Bool(true)));
        assert_eq!(doc.get("note"), Some(&Value::Null));
    }

    #[test]
    fn test_from_json_rejects_nested_values() {
        assert!(Value::from_json(json!([1, 2])).is_err());
        assert!(Value::from_json(json!({"a": 1})).is_err());
        assert!(Value::map_from_json(json!("scalar")).is_err());
        let data = Value::map_from_json(json!({"a": 1, "b": "two"})).unwrap();
        assert_eq!(data["a"], Value::Integer(1));
        assert_eq!(data["b"], Value::Text("two".into()));
    }

    #[test]
    fn test_parse_form_values() {
        assert_eq!(Value::parse_form("42"), Value::Integer(42));
        assert_eq!(Value::parse_form("2.5"), Value::Real(2.5));
        assert_eq!(Value::parse_form("true"), Value::Bool(true));
        assert_eq!(Value::parse_form("null"), Value::Null);
        assert_eq!(Value::parse_form("write spec"), Value::Text("write spec".into()));
        assert_eq!(Value::parse_form("\"quoted\""), Value::Text("quoted".into()));
        assert_eq!(Value::parse_form("[1,2]"), Value::Text("[1,2]".into()));
    }

    #[test]
    fn test_as_bool_accepts_stored_integers() {
        assert_eq!(Value::Integer(1).as_bool(), Some(true));
        assert_eq!(Value::Integer(0).as_bool(), Some(false));
        assert_eq!(Value::Bool(true).as_bool(), Some(true));
        assert_eq!(Value::Integer(2).as_bool(), None);
        assert_eq!(Value::Text("true".into()).as_bool(), None);
    }

    #[test]
    fn test_sql_value_conversion() {
        assert_eq!(Value::from(SqlValue::Integer(7)), Value::Integer(7));
        assert_eq!(Value::from(SqlValue::Null), Value::Null);
        assert_eq!(
            Value::from(SqlValue::Blob(b"raw".to_vec())),
            Value::Text("raw".into())
        );
    }

    #[test]
    fn test_values_bind_as_parameters() {
        let conn = rusqlite::Connection::open_in_memory().unwrap();
        let params = [
            Value::Bool(true),
            Value::Integer(-3),
            Value::Real(0.5),
            Value::Text("hi".into()),
            Value::Null,
        ];
        let row: (i64, i64, f64, String, Option<String>) = conn
            .query_row(
                "SELECT ?, ?, ?, ?, ?",
                rusqlite::params_from_iter(params.iter()),
                |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?, r.get(3)?, r.get(4)?)),
            )
            .unwrap();
        assert_eq!(row, (1, -3, 0.5, "hi".to_string(), None));
    }
}
