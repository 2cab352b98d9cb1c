use pretty_assertions::assert_eq;
use serde_json::{Value, json};
use std::path::Path;
use std::sync::Arc;
use tablesync_db::{Database, Row};
use tablesync_model::{
    Attributes, ChangeKind, ChangeRecord, DataSource, EntityDefinition, Reference, SyncConfig,
};
use tablesync_sync::{
    EntityHandler, EntityRegistry, ReferenceLookup, SyncError, SyncResult, Synchronizer,
};
use tempfile::TempDir;

const COLORS: &str = "
CREATE TABLE colors (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL UNIQUE,
    value INTEGER,
    comment TEXT
);
";

const RED_GREEN: &str = "
- id: 1
  name: Red
  value: 16711680
- id: 2
  name: Green
  value: 65280
";

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

fn write(dir: &Path, file: &str, text: &str) {
    std::fs::write(dir.join(file), text).unwrap();
}

fn color(sources: &[&str]) -> EntityDefinition {
    sources.iter().fold(EntityDefinition::new("Color", "colors"), |def, s| {
        def.with_source(DataSource::new(*s).unwrap())
    })
}

fn setup(schema: &str) -> (TempDir, Database) {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let db = Database::open_in_memory().unwrap();
    db.execute_batch(schema).unwrap();
    (dir, db)
}

fn synchronizer(dir: &TempDir, db: &Database, defs: Vec<EntityDefinition>) -> Synchronizer {
    let config = SyncConfig::default().with_data_dir(dir.path());
    let registry = EntityRegistry::from_definitions(config, defs).unwrap();
    Synchronizer::new(db.clone(), Arc::new(registry))
}

fn with_handler(
    dir: &TempDir,
    db: &Database,
    defs: Vec<EntityDefinition>,
    handled: EntityDefinition,
    handler: impl EntityHandler + 'static,
) -> Synchronizer {
    let config = SyncConfig::default().with_data_dir(dir.path());
    let mut registry = EntityRegistry::from_definitions(config, defs).unwrap();
    registry
        .register_with_handler(handled, Arc::new(handler))
        .unwrap();
    Synchronizer::new(db.clone(), Arc::new(registry))
}

fn colors(db: &Database) -> Vec<Vec<Value>> {
    let mut rows = db
        .with_store(|store| {
            let schema = Arc::new(store.table_schema("colors")?);
            store.all(&schema)
        })
        .unwrap();
    rows.sort_by_key(|r| r.get("id").and_then(Value::as_i64));
    rows.iter()
        .map(|r| {
            ["id", "name", "value", "comment"]
                .iter()
                .map(|c| r.get(c).cloned().unwrap_or(Value::Null))
                .collect()
        })
        .collect()
}

fn created(key: &str, changes: &[(&str, Value)]) -> ChangeRecord {
    let mut record = ChangeRecord::new(key, ChangeKind::Created);
    for (attr, new) in changes {
        record.insert(*attr, Value::Null, new.clone());
    }
    record
}

// ── Create & idempotence ─────────────────────────────────────────

#[test]
fn empty_table_creates_every_record() {
    let (dir, db) = setup(COLORS);
    write(dir.path(), "colors.yml", RED_GREEN);
    let sync = synchronizer(&dir, &db, vec![color(&["colors.yml"])]);

    let changes = sync.sync("Color").unwrap();

    assert_eq!(
        changes,
        vec![
            created(
                "1",
                &[("id", json!(1)), ("name", json!("Red")), ("value", json!(16711680))]
            ),
            created(
                "2",
                &[("id", json!(2)), ("name", json!("Green")), ("value", json!(65280))]
            ),
        ]
    );
    assert_eq!(
        colors(&db),
        vec![
            vec![json!(1), json!("Red"), json!(16711680), Value::Null],
            vec![json!(2), json!("Green"), json!(65280), Value::Null],
        ]
    );
}

#[test]
fn second_run_reports_nothing() {
    let (dir, db) = setup(COLORS);
    write(dir.path(), "colors.yml", RED_GREEN);
    let sync = synchronizer(&dir, &db, vec![color(&["colors.yml"])]);

    assert_eq!(sync.sync("Color").unwrap().len(), 2);
    assert!(sync.sync("Color").unwrap().is_empty());
}

#[test]
fn csv_strings_are_typed_and_idempotent() {
    let (dir, db) = setup(COLORS);
    write(dir.path(), "colors.csv", "id,name,value\n1,Red,16711680\n2,Green,65280\n");
    let sync = synchronizer(&dir, &db, vec![color(&["colors.csv"])]);

    let changes = sync.sync("Color").unwrap();
    assert_eq!(changes[0].get("value"), Some(&(Value::Null, json!(16711680))));
    assert_eq!(changes[0].get("id"), Some(&(Value::Null, json!(1))));
    assert!(sync.sync("Color").unwrap().is_empty());
}

#[test]
fn generated_primary_key_when_keyed_by_name() {
    let (dir, db) = setup(COLORS);
    write(dir.path(), "colors.yml", "- name: Red\n- name: Green\n");
    let def = color(&["colors.yml"]).with_key_attribute("name");
    let sync = synchronizer(&dir, &db, vec![def]);

    let changes = sync.sync("Color").unwrap();
    assert_eq!(
        changes.iter().map(|c| c.key.as_str()).collect::<Vec<_>>(),
        vec!["Red", "Green"]
    );
    assert_eq!(changes[0].get("id"), None);
    assert_eq!(
        colors(&db).iter().map(|r| r[0].clone()).collect::<Vec<_>>(),
        vec![json!(1), json!(2)]
    );
    assert!(sync.sync("Color").unwrap().is_empty());
}

// ── Merge & update ───────────────────────────────────────────────

#[test]
fn later_source_overrides_earlier() {
    let (dir, db) = setup(COLORS);
    write(dir.path(), "colors.yml", "- id: 1\n  name: Red\n  value: 1\n");
    write(dir.path(), "overrides.json", r#"[{"id": 1, "value": 3, "comment": "c"}]"#);
    let sync = synchronizer(&dir, &db, vec![color(&["colors.yml", "overrides.json"])]);

    sync.sync("Color").unwrap();
    assert_eq!(
        colors(&db),
        vec![vec![json!(1), json!("Red"), json!(3), json!("c")]]
    );
}

#[test]
fn update_preserves_local_attributes() {
    let (dir, db) = setup(COLORS);
    db.execute_batch("INSERT INTO colors VALUES (1, 'Red', 0, 'local note')")
        .unwrap();
    write(dir.path(), "colors.yml", RED_GREEN);
    let sync = synchronizer(&dir, &db, vec![color(&["colors.yml"])]);

    let changes = sync.sync("Color").unwrap();

    let mut updated = ChangeRecord::new("1", ChangeKind::Updated);
    updated.insert("value", json!(0), json!(16711680));
    assert_eq!(changes[0], updated);
    assert!(changes[1].is_created());
    assert_eq!(
        colors(&db)[0],
        vec![json!(1), json!("Red"), json!(16711680), json!("local note")]
    );
}

#[test]
fn rows_missing_from_canonical_data_are_untouched() {
    let (dir, db) = setup(COLORS);
    db.execute_batch("INSERT INTO colors VALUES (99, 'Extra', 7, 'mine')")
        .unwrap();
    write(dir.path(), "colors.yml", RED_GREEN);
    let sync = synchronizer(&dir, &db, vec![color(&["colors.yml"])]);

    sync.sync("Color").unwrap();

    let all = colors(&db);
    assert_eq!(all.len(), 3);
    assert_eq!(all[2], vec![json!(99), json!("Extra"), json!(7), json!("mine")]);
}

#[test]
fn updates_follow_canonical_order() {
    let (dir, db) = setup(COLORS);
    db.execute_batch(
        "INSERT INTO colors VALUES (1, 'Red', 0, NULL);
         INSERT INTO colors VALUES (2, 'Green', 0, NULL);",
    )
    .unwrap();
    write(
        dir.path(),
        "colors.yml",
        "- id: 2\n  name: Green\n  value: 5\n- id: 1\n  name: Red\n  value: 6\n",
    );
    let sync = synchronizer(&dir, &db, vec![color(&["colors.yml"])]);

    let keys: Vec<String> = sync
        .sync("Color")
        .unwrap()
        .into_iter()
        .map(|c| c.key)
        .collect();
    assert_eq!(keys, vec!["2", "1"]);
}

#[test]
fn unsupported_attributes_are_skipped() {
    let (dir, db) = setup(COLORS);
    write(dir.path(), "colors.yml", "- id: 1\n  name: Red\n  hex: \"#ff0000\"\n");
    let sync = synchronizer(&dir, &db, vec![color(&["colors.yml"])]);

    let changes = sync.sync("Color").unwrap();
    assert_eq!(changes.len(), 1);
    assert_eq!(changes[0].get("hex"), None);
}

#[test]
fn changed_key_creates_a_new_row() {
    let (dir, db) = setup(COLORS);
    write(dir.path(), "colors.yml", "- id: 1\n  name: Red\n");
    let sync = synchronizer(&dir, &db, vec![color(&["colors.yml"])]);
    sync.sync("Color").unwrap();

    write(dir.path(), "colors.yml", "- id: 5\n  name: Crimson\n");
    let changes = sync.sync("Color").unwrap();

    assert!(changes[0].is_created());
    assert_eq!(colors(&db).len(), 2);
}

#[test]
fn case_insensitive_key_column_updates_in_place() {
    let (dir, db) = setup(
        "CREATE TABLE colors (
            id INTEGER PRIMARY KEY,
            name TEXT COLLATE NOCASE NOT NULL UNIQUE,
            value INTEGER
        );
        INSERT INTO colors (id, name, value) VALUES (1, 'red', 1);",
    );
    write(dir.path(), "colors.yml", "- name: Red\n  value: 2\n- name: Green\n  value: 3\n");
    let def = color(&["colors.yml"]).with_key_attribute("name");
    let sync = synchronizer(&dir, &db, vec![def]);

    let changes = sync.sync("Color").unwrap();

    assert_eq!(changes.len(), 2);
    assert_eq!(changes[0].key, "Red");
    assert!(!changes[0].is_created());
    assert_eq!(changes[0].get("name"), Some(&(json!("red"), json!("Red"))));
    assert_eq!(changes[0].get("value"), Some(&(json!(1), json!(2))));
    assert!(changes[1].is_created());
    assert_eq!(
        colors(&db),
        vec![
            vec![json!(1), json!("Red"), json!(2), Value::Null],
            vec![json!(2), json!("Green"), json!(3), Value::Null],
        ]
    );
    assert!(sync.sync("Color").unwrap().is_empty());
}

// ── Skips & failures ─────────────────────────────────────────────

#[test]
fn missing_table_is_a_noop() {
    let (dir, db) = setup(COLORS);
    write(dir.path(), "shapes.yml", "- id: 1\n  name: Circle\n");
    let shape = EntityDefinition::new("Shape", "shapes")
        .with_source(DataSource::new("shapes.yml").unwrap());
    let sync = synchronizer(&dir, &db, vec![shape]);

    assert!(sync.sync("Shape").unwrap().is_empty());
}

#[test]
fn uniqueness_failure_rolls_back_every_row() {
    let (dir, db) = setup(COLORS);
    write(dir.path(), "colors.yml", "- id: 1\n  name: Red\n- id: 2\n  name: Red\n");
    let sync = synchronizer(&dir, &db, vec![color(&["colors.yml"])]);

    let err = sync.sync("Color").unwrap_err();

    match err {
        SyncError::Validation { entity, key, errors } => {
            assert_eq!(entity, "Color");
            assert_eq!(key, "2");
            assert_eq!(errors.len(), 1);
        }
        other => panic!("expected validation error, got {other:?}"),
    }
    assert!(colors(&db).is_empty());
}

#[test]
fn record_without_key_is_configuration_error() {
    let (dir, db) = setup(COLORS);
    write(dir.path(), "colors.yml", "- id: 1\n  name: Red\n- name: Green\n");
    let sync = synchronizer(&dir, &db, vec![color(&["colors.yml"])]);

    let err = sync.sync("Color").unwrap_err();
    assert!(matches!(err, SyncError::Configuration(_)), "{err:?}");
    assert!(colors(&db).is_empty());
}

#[test]
fn blank_key_fails_every_run_without_writing() {
    let (dir, db) = setup(COLORS);
    write(dir.path(), "colors.csv", "id,name\n\" \",Orphan\n");
    let sync = synchronizer(&dir, &db, vec![color(&["colors.csv"])]);

    for _ in 0..2 {
        let err = sync.sync("Color").unwrap_err();
        assert!(matches!(err, SyncError::Configuration(_)), "{err:?}");
    }
    assert!(colors(&db).is_empty());
}

#[test]
fn table_without_key_column_is_configuration_error() {
    let (dir, db) = setup(COLORS);
    write(dir.path(), "colors.yml", RED_GREEN);
    let def = color(&["colors.yml"]).with_key_attribute("code");
    let sync = synchronizer(&dir, &db, vec![def]);

    let err = sync.sync("Color").unwrap_err();
    assert!(matches!(err, SyncError::Configuration(msg) if msg.contains("code")));
}

#[test]
fn malformed_source_is_parse_error() {
    let (dir, db) = setup(COLORS);
    write(dir.path(), "colors.json", "[{\"id\": 1,");
    let sync = synchronizer(&dir, &db, vec![color(&["colors.json"])]);

    let err = sync.sync("Color").unwrap_err();
    assert!(matches!(err, SyncError::Parse(_)), "{err:?}");
}

#[test]
fn missing_source_file_is_parse_error() {
    let (dir, db) = setup(COLORS);
    let sync = synchronizer(&dir, &db, vec![color(&["colors.yml"])]);

    let err = sync.sync("Color").unwrap_err();
    assert!(matches!(err, SyncError::Parse(_)), "{err:?}");
}

#[test]
fn unknown_entity_is_configuration_error() {
    let (dir, db) = setup(COLORS);
    let sync = synchronizer(&dir, &db, vec![]);
    assert!(matches!(
        sync.sync("Color").unwrap_err(),
        SyncError::Configuration(_)
    ));
}

// ── Handlers ─────────────────────────────────────────────────────

struct NonNegativeValue;

impl EntityHandler for NonNegativeValue {
    fn validate(&self, row: &Row) -> Result<(), Vec<String>> {
        match row.get("value").and_then(Value::as_i64) {
            Some(v) if v < 0 => Err(vec![format!("value must not be negative, got {v}")]),
            _ => Ok(()),
        }
    }
}

#[test]
fn handler_validation_failure_carries_record_key() {
    let (dir, db) = setup(COLORS);
    write(
        dir.path(),
        "colors.yml",
        "- id: 1\n  name: Red\n  value: 1\n- id: 2\n  name: Green\n  value: -1\n",
    );
    let sync = with_handler(&dir, &db, vec![], color(&["colors.yml"]), NonNegativeValue);

    let err = sync.sync("Color").unwrap_err();
    assert_eq!(
        err.to_string(),
        "validation failed for Color record \"2\": value must not be negative, got -1"
    );
    assert!(colors(&db).is_empty());
}

struct UppercaseName;

impl EntityHandler for UppercaseName {
    fn prepare(&self, attributes: &mut Attributes, _: &ReferenceLookup<'_>) -> SyncResult<()> {
        if let Some(Value::String(name)) = attributes.get_mut("name") {
            *name = name.to_uppercase();
        }
        Ok(())
    }
}

#[test]
fn handler_prepare_rewrites_attributes() {
    let (dir, db) = setup(COLORS);
    write(dir.path(), "colors.yml", RED_GREEN);
    let sync = with_handler(&dir, &db, vec![], color(&["colors.yml"]), UppercaseName);

    sync.sync("Color").unwrap();
    assert_eq!(colors(&db)[0][1], json!("RED"));
    assert!(sync.sync("Color").unwrap().is_empty());
}

// ── References ───────────────────────────────────────────────────

const CATALOG: &str = "
CREATE TABLE colors (id INTEGER PRIMARY KEY, name TEXT NOT NULL UNIQUE, value INTEGER, comment TEXT);
CREATE TABLE categories (id INTEGER PRIMARY KEY, code TEXT NOT NULL UNIQUE, name TEXT);
CREATE TABLE products (
    id INTEGER PRIMARY KEY,
    sku TEXT NOT NULL UNIQUE,
    category_id INTEGER REFERENCES categories(id)
);
";

fn category() -> EntityDefinition {
    EntityDefinition::new("Category", "categories")
        .with_key_attribute("code")
        .with_source(DataSource::new("categories.yml").unwrap())
}

fn product() -> EntityDefinition {
    EntityDefinition::new("Product", "products")
        .with_source(DataSource::new("products.yml").unwrap())
        .with_reference(Reference::new("category_id", "Category").via("category"))
}

fn product_category(db: &Database, id: i64) -> Value {
    db.with_store(|store| {
        let schema = Arc::new(store.table_schema("products")?);
        store.find_by(&schema, "id", &json!(id))
    })
    .unwrap()
    .and_then(|row| row.get("category_id").cloned())
    .unwrap()
}

#[test]
fn reference_resolves_business_key_to_primary_key() {
    let (dir, db) = setup(CATALOG);
    write(
        dir.path(),
        "categories.yml",
        "- code: veg\n  name: Vegetables\n- code: fruit\n  name: Fruit\n",
    );
    write(
        dir.path(),
        "products.yml",
        "- id: 1\n  sku: apple\n  category: fruit\n- id: 2\n  sku: loose\n  category: null\n",
    );
    let sync = synchronizer(&dir, &db, vec![category(), product()]);

    sync.sync("Category").unwrap();
    let changes = sync.sync("Product").unwrap();

    assert_eq!(changes[0].get("category_id"), Some(&(Value::Null, json!(2))));
    assert_eq!(changes[0].get("category"), None);
    assert_eq!(product_category(&db, 1), json!(2));
    assert_eq!(product_category(&db, 2), Value::Null);
    assert!(sync.sync("Product").unwrap().is_empty());
}

#[test]
fn reference_to_missing_row_fails_the_type() {
    let (dir, db) = setup(CATALOG);
    write(dir.path(), "categories.yml", "- code: fruit\n");
    write(
        dir.path(),
        "products.yml",
        "- id: 1\n  sku: apple\n  category: fruit\n- id: 2\n  sku: kale\n  category: veg\n",
    );
    let sync = synchronizer(&dir, &db, vec![category(), product()]);
    sync.sync("Category").unwrap();

    let err = sync.sync("Product").unwrap_err();
    match err {
        SyncError::Validation { key, errors, .. } => {
            assert_eq!(key, "2");
            assert!(errors[0].contains("unknown Category reference"), "{errors:?}");
        }
        other => panic!("expected validation error, got {other:?}"),
    }
}

#[test]
fn reference_before_target_is_synced_fails() {
    let (dir, db) = setup(CATALOG);
    write(dir.path(), "categories.yml", "- code: fruit\n");
    write(dir.path(), "products.yml", "- id: 1\n  sku: apple\n  category: fruit\n");
    let sync = synchronizer(&dir, &db, vec![category(), product()]);

    assert!(matches!(
        sync.sync("Product").unwrap_err(),
        SyncError::Validation { .. }
    ));
}

struct CategoryByCode;

impl EntityHandler for CategoryByCode {
    fn prepare(&self, attributes: &mut Attributes, lookup: &ReferenceLookup<'_>) -> SyncResult<()> {
        if let Some(code) = attributes.remove("category_code") {
            let id = lookup.primary_key_of("Category", &code)?.unwrap_or(Value::Null);
            attributes.insert("category_id".into(), id);
        }
        Ok(())
    }
}

#[test]
fn handler_resolves_references_through_lookup() {
    let (dir, db) = setup(CATALOG);
    write(dir.path(), "categories.yml", "- code: fruit\n");
    write(
        dir.path(),
        "products.yml",
        "- id: 1\n  sku: apple\n  category_code: fruit\n",
    );
    let handled = EntityDefinition::new("Product", "products")
        .with_source(DataSource::new("products.yml").unwrap())
        .with_dependency("Category");
    let sync = with_handler(&dir, &db, vec![category()], handled, CategoryByCode);

    sync.sync("Category").unwrap();
    sync.sync("Product").unwrap();
    assert_eq!(product_category(&db, 1), json!(1));
}

// ── Named instances ──────────────────────────────────────────────

#[test]
fn find_named_returns_synchronized_row() {
    let (dir, db) = setup(COLORS);
    write(
        dir.path(),
        "colors.yml",
        "red:\n  id: 1\n  name: Red\ngreen:\n  id: 2\n  name: Green\n",
    );
    let sync = synchronizer(&dir, &db, vec![color(&["colors.yml"])]);

    assert!(sync.find_named("Color", "red").unwrap().is_none());
    sync.sync("Color").unwrap();

    let red = sync.find_named("Color", "red").unwrap().unwrap();
    assert_eq!(red.get("name"), Some(&json!("Red")));
    assert!(sync.is_named("Color", "red", &red).unwrap());
    assert!(!sync.is_named("Color", "green", &red).unwrap());

    let named = sync.named_instances("Color").unwrap();
    assert_eq!(named.names().collect::<Vec<_>>(), vec!["red", "green"]);
    assert!(named.is_protected("2"));
}

#[test]
fn is_named_compares_keys_as_stored() {
    let (dir, db) = setup(COLORS);
    write(dir.path(), "colors.yml", "red:\n  id: \"01\"\n  name: Red\n");
    let sync = synchronizer(&dir, &db, vec![color(&["colors.yml"])]);
    sync.sync("Color").unwrap();

    let red = sync.find_named("Color", "red").unwrap().unwrap();
    assert_eq!(red.get("id"), Some(&json!(1)));
    assert!(sync.is_named("Color", "red", &red).unwrap());
    assert!(!sync.is_named("Color", "blue", &red).unwrap());
}

#[test]
fn find_named_with_unknown_instance() {
    let (dir, db) = setup(COLORS);
    write(dir.path(), "colors.yml", "red:\n  id: 1\n  name: Red\n");
    let sync = synchronizer(&dir, &db, vec![color(&["colors.yml"])]);

    let err = sync.find_named("Color", "blue").unwrap_err();
    assert!(matches!(err, SyncError::Configuration(msg) if msg.contains("blue")));
}
