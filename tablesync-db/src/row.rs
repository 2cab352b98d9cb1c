use crate::schema::TableSchema;
use serde_json::{Map, Value};
use std::sync::Arc;

/// An in-memory table row that remembers the values it was loaded (or
/// created) with, so writes can be limited to what actually changed.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    schema: Arc<TableSchema>,
    original: Vec<Value>,
    values: Vec<Value>,
    persisted: bool,
}

impl Row {
    /// A new, unsaved row holding the column defaults.
    pub fn new(schema: Arc<TableSchema>) -> Self {
        let original: Vec<Value> = schema.columns.iter().map(|c| c.default.clone()).collect();
        Self {
            values: original.clone(),
            original,
            schema,
            persisted: false,
        }
    }

    /// A row read from the database; `values` follow the schema's column order.
    pub fn loaded(schema: Arc<TableSchema>, values: Vec<Value>) -> Self {
        Self {
            original: values.clone(),
            values,
            schema,
            persisted: true,
        }
    }

    pub fn schema(&self) -> &TableSchema {
        &self.schema
    }

    pub fn is_new_record(&self) -> bool {
        !self.persisted
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.schema.position(column).map(|i| &self.values[i])
    }

    /// Value the column had when the row was loaded or last saved.
    pub fn original(&self, column: &str) -> Option<&Value> {
        self.schema.position(column).map(|i| &self.original[i])
    }

    /// Casts and assigns a value. Returns `false` without touching the row
    /// when the table has no such column.
    pub fn assign(&mut self, column: &str, value: &Value) -> bool {
        let Some(index) = self.schema.position(column) else {
            return false;
        };
        self.values[index] = self.schema.columns[index].cast(value);
        true
    }

    /// Changed columns as `(column, old, new)`, in column order.
    pub fn changes(&self) -> Vec<(String, Value, Value)> {
        self.schema
            .columns
            .iter()
            .zip(self.original.iter().zip(&self.values))
            .filter(|(_, (old, new))| old != new)
            .map(|(column, (old, new))| (column.name.clone(), old.clone(), new.clone()))
            .collect()
    }

    pub fn is_changed(&self) -> bool {
        self.original != self.values
    }

    /// Current values as an attribute mapping.
    pub fn to_attributes(&self) -> Map<String, Value> {
        self.schema
            .columns
            .iter()
            .zip(&self.values)
            .map(|(column, value)| (column.name.clone(), value.clone()))
            .collect()
    }

    /// Records the current values as saved.
    pub(crate) fn mark_persisted(&mut self) {
        self.original = self.values.clone();
        self.persisted = true;
    }

    /// Sets a value without casting; used for database-assigned values.
    pub(crate) fn set_raw(&mut self, column: &str, value: Value) {
        if let Some(index) = self.schema.position(column) {
            self.values[index] = value;
        }
    }
}
