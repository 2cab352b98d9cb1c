//! Conversion between JSON values and SQLite values.

use crate::schema::Affinity;
use rusqlite::types::{Value as SqlValue, ValueRef};
use serde_json::{Number, Value};

/// Converts a JSON value into a bindable SQLite value.
///
/// Booleans become `0`/`1`; lists and mappings are stored as JSON text.
pub fn to_sql(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Bool(b) => SqlValue::Integer(i64::from(*b)),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                SqlValue::Integer(i)
            } else {
                // u64 beyond i64::MAX or a float
                SqlValue::Real(n.as_f64().unwrap_or(f64::NAN))
            }
        }
        Value::String(s) => SqlValue::Text(s.clone()),
        Value::Array(_) | Value::Object(_) => SqlValue::Text(value.to_string()),
    }
}

/// Converts a stored SQLite value back into JSON, using the column affinity
/// to restore booleans.
pub fn from_sql(value: ValueRef<'_>, affinity: Affinity) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) if affinity == Affinity::Boolean => Value::Bool(i != 0),
        ValueRef::Integer(i) => Value::from(i),
        ValueRef::Real(f) => float(f),
        ValueRef::Text(bytes) | ValueRef::Blob(bytes) => {
            Value::String(String::from_utf8_lossy(bytes).into_owned())
        }
    }
}

/// JSON number for a float; non-finite values have no JSON form.
pub(crate) fn float(f: f64) -> Value {
    Number::from_f64(f).map(Value::Number).unwrap_or(Value::Null)
}
