//! Per-entity customization hooks.

use crate::error::SyncResult;
use crate::registry::EntityRegistry;
use serde_json::Value;
use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::Arc;
use tablesync_db::{Row, RowStore, TableSchema};
use tablesync_model::Attributes;

/// Custom behavior for one entity type.
///
/// Both methods run inside the entity type's sync transaction. The defaults
/// do nothing, so implementors override only what they need.
pub trait EntityHandler: Send + Sync {
    /// Rewrites a canonical record's attributes before they are applied to a
    /// row. Join tables use this to turn business keys into row ids through
    /// `lookup`.
    fn prepare(&self, attributes: &mut Attributes, lookup: &ReferenceLookup<'_>) -> SyncResult<()> {
        let _ = (attributes, lookup);
        Ok(())
    }

    /// Checks a row after attributes are applied and before it is written.
    /// Returned messages are reported together with the record's key.
    fn validate(&self, row: &Row) -> Result<(), Vec<String>> {
        let _ = row;
        Ok(())
    }
}

/// Finds rows of other registered entity types by their key values, inside
/// the running transaction.
pub struct ReferenceLookup<'a> {
    store: &'a RowStore<'a>,
    registry: &'a EntityRegistry,
    schemas: RefCell<HashMap<String, Option<Arc<TableSchema>>>>,
}

impl<'a> ReferenceLookup<'a> {
    pub fn new(store: &'a RowStore<'a>, registry: &'a EntityRegistry) -> Self {
        Self {
            store,
            registry,
            schemas: RefCell::new(HashMap::new()),
        }
    }

    /// Row of `entity` whose key attribute equals `key`. `None` when there
    /// is no such row or the entity's table does not exist yet.
    pub fn find(&self, entity: &str, key: &Value) -> SyncResult<Option<Row>> {
        let Some(schema) = self.schema(entity)? else {
            return Ok(None);
        };
        let key_attribute = self.registry.key_attribute(entity)?;
        Ok(self.store.find_by(&schema, key_attribute, key)?)
    }

    /// Primary key value of the row of `entity` whose key attribute equals
    /// `key`.
    pub fn primary_key_of(&self, entity: &str, key: &Value) -> SyncResult<Option<Value>> {
        let primary_key = &self.registry.require(entity)?.definition().primary_key;
        Ok(self
            .find(entity, key)?
            .and_then(|row| row.get(primary_key).cloned()))
    }

    fn schema(&self, entity: &str) -> SyncResult<Option<Arc<TableSchema>>> {
        if let Some(cached) = self.schemas.borrow().get(entity) {
            return Ok(cached.clone());
        }
        let table = &self.registry.require(entity)?.definition().table;
        let schema = if self.store.table_exists(table)? {
            Some(Arc::new(self.store.table_schema(table)?))
        } else {
            None
        };
        self.schemas
            .borrow_mut()
            .insert(entity.to_string(), schema.clone());
        Ok(schema)
    }
}
