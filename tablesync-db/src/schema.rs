use crate::value::float;
use serde_json::Value;

/// SQLite type affinity of a column, refined with a boolean flavor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Affinity {
    Integer,
    Text,
    Blob,
    Real,
    Numeric,
    /// Declared type mentions `BOOL`; stored as 0/1, read back as booleans.
    Boolean,
}

impl Affinity {
    /// Determines the affinity of a declared column type using SQLite's rules.
    pub fn from_decl_type(decl_type: &str) -> Self {
        let upper = decl_type.to_ascii_uppercase();
        if upper.contains("BOOL") {
            Self::Boolean
        } else if upper.contains("INT") {
            Self::Integer
        } else if upper.contains("CHAR") || upper.contains("CLOB") || upper.contains("TEXT") {
            Self::Text
        } else if upper.is_empty() || upper.contains("BLOB") {
            Self::Blob
        } else if upper.contains("REAL") || upper.contains("FLOA") || upper.contains("DOUB") {
            Self::Real
        } else {
            Self::Numeric
        }
    }
}

/// A table column as reported by `PRAGMA table_info`.
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub decl_type: String,
    pub affinity: Affinity,
    pub not_null: bool,
    /// Default value already cast to the column's affinity. Expression
    /// defaults (e.g. `CURRENT_TIMESTAMP`) are unknown until insert and
    /// appear as null.
    pub default: Value,
    pub primary_key: bool,
}

impl Column {
    pub fn new(name: impl Into<String>, decl_type: impl Into<String>) -> Self {
        let decl_type = decl_type.into();
        Self {
            name: name.into(),
            affinity: Affinity::from_decl_type(&decl_type),
            decl_type,
            not_null: false,
            default: Value::Null,
            primary_key: false,
        }
    }

    /// Applies the default clause text reported by SQLite.
    pub fn with_default_sql(mut self, default_sql: Option<&str>) -> Self {
        let parsed = default_sql.map(parse_default).unwrap_or(Value::Null);
        self.default = self.cast(&parsed);
        self
    }

    /// Casts a value for assignment to this column.
    ///
    /// Values that cannot be represented in the affinity are kept verbatim,
    /// as SQLite itself would store them.
    pub fn cast(&self, value: &Value) -> Value {
        match self.affinity {
            Affinity::Integer | Affinity::Numeric => cast_integer(value),
            Affinity::Real => cast_real(value),
            Affinity::Boolean => cast_boolean(value),
            Affinity::Text => cast_text(value),
            Affinity::Blob => value.clone(),
        }
    }

    /// Whether SQLite assigns this column from the rowid on insert.
    pub fn is_rowid_alias(&self) -> bool {
        self.primary_key && self.decl_type.eq_ignore_ascii_case("INTEGER")
    }
}

/// Column layout of one table.
#[derive(Debug, Clone, PartialEq)]
pub struct TableSchema {
    pub table: String,
    pub columns: Vec<Column>,
}

impl TableSchema {
    pub fn new(table: impl Into<String>, columns: Vec<Column>) -> Self {
        Self {
            table: table.into(),
            columns,
        }
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    /// First primary key column; composite keys report their leading column.
    pub fn primary_key(&self) -> Option<&Column> {
        self.columns.iter().find(|c| c.primary_key)
    }
}

fn cast_integer(value: &Value) -> Value {
    match value {
        Value::Bool(b) => Value::from(i64::from(*b)),
        Value::Number(n) => match n.as_f64() {
            Some(f) if n.as_i64().is_none() && n.as_u64().is_none() && is_integral(f) => {
                Value::from(f as i64)
            }
            _ => value.clone(),
        },
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                Value::Null
            } else if let Ok(i) = trimmed.parse::<i64>() {
                Value::from(i)
            } else if let Ok(f) = trimmed.parse::<f64>() {
                if is_integral(f) {
                    Value::from(f as i64)
                } else {
                    float(f)
                }
            } else {
                value.clone()
            }
        }
        Value::Null | Value::Array(_) | Value::Object(_) => value.clone(),
    }
}

fn cast_real(value: &Value) -> Value {
    match value {
        Value::Bool(b) => float(if *b { 1.0 } else { 0.0 }),
        Value::Number(n) => n.as_f64().map(float).unwrap_or_else(|| value.clone()),
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                Value::Null
            } else {
                trimmed.parse::<f64>().map(float).unwrap_or_else(|_| value.clone())
            }
        }
        Value::Null | Value::Array(_) | Value::Object(_) => value.clone(),
    }
}

fn cast_boolean(value: &Value) -> Value {
    match value {
        Value::Number(n) => match n.as_f64() {
            Some(f) => Value::Bool(f != 0.0),
            None => value.clone(),
        },
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "" => Value::Null,
            "true" | "t" | "1" | "yes" | "y" | "on" => Value::Bool(true),
            "false" | "f" | "0" | "no" | "n" | "off" => Value::Bool(false),
            _ => value.clone(),
        },
        Value::Null | Value::Bool(_) | Value::Array(_) | Value::Object(_) => value.clone(),
    }
}

fn cast_text(value: &Value) -> Value {
    match value {
        Value::Null | Value::String(_) => value.clone(),
        Value::Bool(b) => Value::String(b.to_string()),
        Value::Number(n) => Value::String(n.to_string()),
        Value::Array(_) | Value::Object(_) => Value::String(value.to_string()),
    }
}

fn is_integral(f: f64) -> bool {
    f.is_finite() && f.fract() == 0.0 && f.abs() < i64::MAX as f64
}

/// Interprets the `dflt_value` text of `PRAGMA table_info`.
fn parse_default(sql: &str) -> Value {
    let sql = sql.trim();
    if sql.len() >= 2 && sql.starts_with('\'') && sql.ends_with('\'') {
        return Value::String(sql[1..sql.len() - 1].replace("''", "'"));
    }
    if sql.eq_ignore_ascii_case("NULL") {
        return Value::Null;
    }
    if sql.eq_ignore_ascii_case("TRUE") {
        return Value::from(1);
    }
    if sql.eq_ignore_ascii_case("FALSE") {
        return Value::from(0);
    }
    let unparenthesized = sql.trim_start_matches('(').trim_end_matches(')');
    if let Ok(i) = unparenthesized.parse::<i64>() {
        return Value::from(i);
    }
    if let Ok(f) = unparenthesized.parse::<f64>() {
        return float(f);
    }
    Value::Null
}
