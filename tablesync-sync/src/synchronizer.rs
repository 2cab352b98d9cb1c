//! Transactional upsert of one entity type's canonical records.

use crate::error::{SyncError, SyncResult};
use crate::handler::ReferenceLookup;
use crate::registry::{EntityRegistry, RegisteredEntity};
use indexmap::IndexMap;
use serde_json::Value;
use std::sync::Arc;
use tablesync_db::{Database, DbError, Row, RowStore, TableSchema};
use tablesync_model::{
    Attributes, CanonicalRecord, ChangeKind, ChangeRecord, NamedInstances, key_string,
};
use tablesync_source::CanonicalLoader;
use tracing::{debug, info};

/// Upserts canonical records into the database, one entity type at a time.
///
/// Rows are never deleted. Every call to [`Synchronizer::sync`] runs in its
/// own transaction, so an entity type is either fully synchronized or left
/// exactly as it was.
#[derive(Debug, Clone)]
pub struct Synchronizer {
    db: Database,
    registry: Arc<EntityRegistry>,
    loader: CanonicalLoader,
}

impl Synchronizer {
    pub fn new(db: Database, registry: Arc<EntityRegistry>) -> Self {
        let loader = CanonicalLoader::new(registry.config().clone());
        Self {
            db,
            registry,
            loader,
        }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn registry(&self) -> &EntityRegistry {
        &self.registry
    }

    pub fn loader(&self) -> &CanonicalLoader {
        &self.loader
    }

    /// Brings the table of `entity` in line with its canonical data and
    /// returns one change record per row created or updated, in canonical
    /// order. A table that does not exist yet yields no changes.
    pub fn sync(&self, entity: &str) -> SyncResult<Vec<ChangeRecord>> {
        let registered = self.registry.require(entity)?;
        let table = registered.definition().table.as_str();

        if !self.db.table_exists(table)? {
            info!("{}: table {} does not exist, skipping", entity, table);
            return Ok(Vec::new());
        }

        let key_attribute = self.registry.key_attribute(entity)?;
        let records = self.loader.load(registered.definition())?;

        let changes = self.db.transaction(|store| {
            UpsertRun::new(store, &self.registry, registered, key_attribute)?.run(records)
        })?;

        let created = changes.iter().filter(|c| c.is_created()).count();
        info!(
            "{}: {} created, {} updated",
            entity,
            created,
            changes.len() - created
        );
        Ok(changes)
    }

    /// Named-instance table of `entity`, loaded on first use.
    pub fn named_instances(&self, entity: &str) -> SyncResult<&NamedInstances> {
        Ok(self.registry.require(entity)?.named_instances(&self.loader)?)
    }

    /// Row for the named instance `instance` of `entity`, if it has been
    /// synchronized. An instance name that does not appear in the canonical
    /// data is a configuration error.
    pub fn find_named(&self, entity: &str, instance: &str) -> SyncResult<Option<Row>> {
        let named = self.named_instances(entity)?;
        let key = named.key(instance).ok_or_else(|| {
            SyncError::Configuration(format!("{entity} has no instance named {instance:?}"))
        })?;
        let key = Value::String(key.to_string());
        self.db
            .with_store(|store| ReferenceLookup::new(store, &self.registry).find(entity, &key))
    }

    /// Whether `row` is the named instance `instance` of `entity`. Both keys
    /// are compared as the row's key column stores them.
    pub fn is_named(&self, entity: &str, instance: &str, row: &Row) -> SyncResult<bool> {
        let key_attribute = self.registry.key_attribute(entity)?;
        let Some(named_key) = self.named_instances(entity)?.key(instance) else {
            return Ok(false);
        };
        let Some(column) = row.schema().column(key_attribute) else {
            return Ok(false);
        };
        let named_key = key_string(&column.cast(&Value::String(named_key.to_string())));
        let row_key = row.get(key_attribute).and_then(key_string);
        Ok(named_key.is_some() && named_key == row_key)
    }
}

/// State of one entity type's sync inside its transaction.
struct UpsertRun<'a> {
    store: &'a RowStore<'a>,
    entity: &'a RegisteredEntity,
    key_attribute: &'a str,
    schema: Arc<TableSchema>,
    lookup: ReferenceLookup<'a>,
}

impl<'a> UpsertRun<'a> {
    fn new(
        store: &'a RowStore<'a>,
        registry: &'a EntityRegistry,
        entity: &'a RegisteredEntity,
        key_attribute: &'a str,
    ) -> SyncResult<Self> {
        let schema = Arc::new(store.table_schema(&entity.definition().table)?);
        if !schema.has_column(key_attribute) {
            return Err(SyncError::Configuration(format!(
                "{}: table {} has no key column {}",
                entity.name(),
                schema.table,
                key_attribute
            )));
        }
        Ok(Self {
            store,
            entity,
            key_attribute,
            schema,
            lookup: ReferenceLookup::new(store, registry),
        })
    }

    fn run(&self, records: Vec<CanonicalRecord>) -> SyncResult<Vec<ChangeRecord>> {
        let mut pending = self.pending(records)?;
        let keys: Vec<String> = pending.keys().cloned().collect();

        let mut rows = self
            .store
            .find_by_keys(&self.schema, self.key_attribute, &keys)?;
        rows.sort_by_key(|row| {
            self.row_key(row)
                .and_then(|key| pending.get_index_of(&key))
                .unwrap_or(usize::MAX)
        });

        let mut changes = Vec::new();
        let mut collated = false;
        for mut row in rows {
            let Some(record) = self.row_key(&row).and_then(|key| pending.shift_remove(&key)) else {
                // Matched by the column's collation, not by exact key.
                collated = true;
                continue;
            };
            changes.extend(self.update(&mut row, &record)?);
        }

        for (key, record) in pending {
            if collated {
                let existing = self.store.find_by(
                    &self.schema,
                    self.key_attribute,
                    &Value::String(key),
                )?;
                if let Some(mut row) = existing {
                    changes.extend(self.update(&mut row, &record)?);
                    continue;
                }
            }
            let mut row = Row::new(Arc::clone(&self.schema));
            self.apply(&mut row, &record)?;
            let change = change_record(&record.key, ChangeKind::Created, &row);
            self.store
                .insert(&mut row)
                .map_err(|e| self.write_error(&record.key, e))?;
            debug!("{} {}: created", self.entity.name(), record.key);
            changes.push(change);
        }

        Ok(changes)
    }

    /// Applies `record` to an existing row and writes it back. Returns `None`
    /// when nothing changed.
    fn update(&self, row: &mut Row, record: &CanonicalRecord) -> SyncResult<Option<ChangeRecord>> {
        self.apply(row, record)?;
        if !row.is_changed() {
            debug!("{} {}: unchanged", self.entity.name(), record.key);
            return Ok(None);
        }
        let change = change_record(&record.key, ChangeKind::Updated, row);
        self.store
            .update(row, self.key_attribute)
            .map_err(|e| self.write_error(&record.key, e))?;
        debug!("{} {}: updated {} attributes", self.entity.name(), record.key, change.len());
        Ok(Some(change))
    }

    /// Canonical records keyed by their key value as the key column stores
    /// it, in first-seen order.
    fn pending(
        &self,
        records: Vec<CanonicalRecord>,
    ) -> SyncResult<IndexMap<String, CanonicalRecord>> {
        let mut pending: IndexMap<String, CanonicalRecord> = IndexMap::new();
        for record in records {
            let key = self.normalize_key(&record)?;
            match pending.get_mut(&key) {
                Some(existing) => existing.merge(record),
                None => {
                    pending.insert(key, record);
                }
            }
        }
        Ok(pending)
    }

    /// Key of `record` as the key column stores it. A key the column stores
    /// as null cannot match any row.
    fn normalize_key(&self, record: &CanonicalRecord) -> SyncResult<String> {
        let raw = record
            .get(self.key_attribute)
            .cloned()
            .unwrap_or_else(|| Value::String(record.key.clone()));
        self.schema
            .column(self.key_attribute)
            .and_then(|column| key_string(&column.cast(&raw)))
            .ok_or_else(|| {
                SyncError::Configuration(format!(
                    "{} record {:?}: key {} = {} is empty for column {}.{}",
                    self.entity.name(),
                    record.key,
                    self.key_attribute,
                    raw,
                    self.schema.table,
                    self.key_attribute
                ))
            })
    }

    fn row_key(&self, row: &Row) -> Option<String> {
        row.get(self.key_attribute).and_then(key_string)
    }

    /// Applies a canonical record to a row: handler preparation, reference
    /// resolution, then every attribute the table has a column for.
    fn apply(&self, row: &mut Row, record: &CanonicalRecord) -> SyncResult<()> {
        let mut attributes = record.attributes.clone();

        if let Some(handler) = self.entity.handler() {
            handler.prepare(&mut attributes, &self.lookup)?;
        }
        self.resolve_references(&record.key, &mut attributes)?;

        for (attribute, value) in &attributes {
            if !row.assign(attribute, value) {
                debug!(
                    "{} {}: no column for attribute {}, skipping",
                    self.entity.name(),
                    record.key,
                    attribute
                );
            }
        }

        if let Some(handler) = self.entity.handler() {
            handler.validate(row).map_err(|errors| self.invalid(&record.key, errors))?;
        }
        Ok(())
    }

    fn resolve_references(
        &self,
        key: &str,
        attributes: &mut Attributes,
    ) -> SyncResult<()> {
        for reference in &self.entity.definition().references {
            let Some(attribute) = reference.attribute.as_deref() else {
                continue;
            };
            let Some(value) = attributes.remove(attribute) else {
                continue;
            };
            let resolved = if value.is_null() {
                Value::Null
            } else {
                self.lookup
                    .primary_key_of(&reference.target, &value)?
                    .ok_or_else(|| {
                        self.invalid(
                            key,
                            vec![format!(
                                "unknown {} reference {} = {}",
                                reference.target, attribute, value
                            )],
                        )
                    })?
            };
            attributes.insert(reference.column.clone(), resolved);
        }
        Ok(())
    }

    fn write_error(&self, key: &str, err: DbError) -> SyncError {
        match err {
            DbError::Constraint { message, .. } => self.invalid(key, vec![message]),
            other => other.into(),
        }
    }

    fn invalid(&self, key: &str, errors: Vec<String>) -> SyncError {
        SyncError::Validation {
            entity: self.entity.name().to_string(),
            key: key.to_string(),
            errors,
        }
    }
}

fn change_record(key: &str, kind: ChangeKind, row: &Row) -> ChangeRecord {
    let mut change = ChangeRecord::new(key, kind);
    for (column, old, new) in row.changes() {
        change.insert(column, old, new);
    }
    change
}
