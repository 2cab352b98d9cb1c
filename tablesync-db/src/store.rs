//! Row-level queries and writes against one connection or transaction.

use crate::error::{DbError, DbResult};
use crate::row::Row;
use crate::schema::{Column, TableSchema};
use crate::value::{from_sql, to_sql};
use rusqlite::{Connection, params, params_from_iter};
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

/// Keeps each `IN (...)` list well under SQLite's bound-parameter limit.
const KEY_CHUNK: usize = 500;

/// Reads and writes rows through a borrowed connection.
///
/// Obtained from [`crate::Database::transaction`] or
/// [`crate::Database::with_store`]; everything done through one store inside
/// a transaction commits or rolls back together.
pub struct RowStore<'c> {
    conn: &'c Connection,
}

impl<'c> RowStore<'c> {
    pub fn new(conn: &'c Connection) -> Self {
        Self { conn }
    }

    pub fn table_exists(&self, table: &str) -> DbResult<bool> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type IN ('table', 'view') AND name = ?1",
            params![table],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    pub fn table_schema(&self, table: &str) -> DbResult<TableSchema> {
        let mut stmt = self
            .conn
            .prepare(&format!("PRAGMA table_info({})", quote_ident(table)))?;
        let columns = stmt
            .query_map([], |row| {
                let name: String = row.get(1)?;
                let decl_type: Option<String> = row.get(2)?;
                let not_null: i64 = row.get(3)?;
                let default_sql: Option<String> = row.get(4)?;
                let pk: i64 = row.get(5)?;
                let mut column = Column::new(name, decl_type.unwrap_or_default())
                    .with_default_sql(default_sql.as_deref());
                column.not_null = not_null != 0;
                column.primary_key = pk > 0;
                Ok(column)
            })?
            .collect::<Result<Vec<_>, _>>()?;

        if columns.is_empty() {
            return Err(DbError::TableNotFound(table.to_string()));
        }
        Ok(TableSchema::new(table, columns))
    }

    /// Rows whose `column` value is among `keys`. Keys are cast to the
    /// column's affinity before comparison, so `"1"` finds an INTEGER `1`.
    pub fn find_by_keys(
        &self,
        schema: &Arc<TableSchema>,
        column: &str,
        keys: &[String],
    ) -> DbResult<Vec<Row>> {
        let key_column = require_column(schema, column)?;
        let mut rows = Vec::new();
        for chunk in keys.chunks(KEY_CHUNK) {
            let placeholders = vec!["?"; chunk.len()].join(", ");
            let sql = format!(
                "SELECT {} FROM {} WHERE {} IN ({placeholders})",
                select_list(schema),
                quote_ident(&schema.table),
                quote_ident(column),
            );
            let bound = chunk
                .iter()
                .map(|key| to_sql(&key_column.cast(&Value::String(key.clone()))));
            let mut stmt = self.conn.prepare(&sql)?;
            let found = stmt
                .query_map(params_from_iter(bound), |row| read_row(schema, row))?
                .collect::<Result<Vec<_>, _>>()?;
            rows.extend(found);
        }
        Ok(rows)
    }

    /// Every row of the table.
    pub fn all(&self, schema: &Arc<TableSchema>) -> DbResult<Vec<Row>> {
        let sql = format!(
            "SELECT {} FROM {}",
            select_list(schema),
            quote_ident(&schema.table)
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt
            .query_map([], |row| read_row(schema, row))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// First row whose `column` equals `value` (cast to the column's affinity).
    pub fn find_by(
        &self,
        schema: &Arc<TableSchema>,
        column: &str,
        value: &Value,
    ) -> DbResult<Option<Row>> {
        let key_column = require_column(schema, column)?;
        let sql = format!(
            "SELECT {} FROM {} WHERE {} = ?1 LIMIT 1",
            select_list(schema),
            quote_ident(&schema.table),
            quote_ident(column),
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query_map(params![to_sql(&key_column.cast(value))], |row| {
            read_row(schema, row)
        })?;
        Ok(rows.next().transpose()?)
    }

    pub fn count(&self, table: &str) -> DbResult<usize> {
        let count: i64 = self.conn.query_row(
            &format!("SELECT COUNT(*) FROM {}", quote_ident(table)),
            [],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    /// Inserts a new row, writing only columns that differ from their
    /// defaults. A rowid-alias primary key left empty is filled in from the
    /// generated rowid.
    pub fn insert(&self, row: &mut Row) -> DbResult<()> {
        let table = row.schema().table.clone();
        let changes = row.changes();
        if changes.is_empty() {
            self.conn
                .execute(&format!("INSERT INTO {} DEFAULT VALUES", quote_ident(&table)), [])
                .map_err(|e| DbError::from_write(&table, e))?;
        } else {
            let columns: Vec<String> = changes.iter().map(|(c, _, _)| quote_ident(c)).collect();
            let placeholders = vec!["?"; changes.len()].join(", ");
            let sql = format!(
                "INSERT INTO {} ({}) VALUES ({placeholders})",
                quote_ident(&table),
                columns.join(", "),
            );
            self.conn
                .execute(&sql, params_from_iter(changes.iter().map(|(_, _, new)| to_sql(new))))
                .map_err(|e| DbError::from_write(&table, e))?;
        }

        let generated = row
            .schema()
            .primary_key()
            .filter(|pk| pk.is_rowid_alias())
            .map(|pk| pk.name.clone());
        if let Some(pk) = generated {
            if row.get(&pk).is_some_and(Value::is_null) {
                row.set_raw(&pk, Value::from(self.conn.last_insert_rowid()));
            }
        }

        debug!("Inserted row into {} ({} columns)", table, changes.len());
        row.mark_persisted();
        Ok(())
    }

    /// Writes the changed columns of a loaded row, locating it by the
    /// original value of `key_column`. Returns the number of rows written.
    pub fn update(&self, row: &mut Row, key_column: &str) -> DbResult<usize> {
        let table = row.schema().table.clone();
        let changes = row.changes();
        if changes.is_empty() {
            return Ok(0);
        }
        let key = row
            .original(key_column)
            .cloned()
            .ok_or_else(|| DbError::UnknownColumn {
                table: table.clone(),
                column: key_column.to_string(),
            })?;

        let assignments: Vec<String> = changes
            .iter()
            .map(|(column, _, _)| format!("{} = ?", quote_ident(column)))
            .collect();
        let sql = format!(
            "UPDATE {} SET {} WHERE {} = ?",
            quote_ident(&table),
            assignments.join(", "),
            quote_ident(key_column),
        );
        let bound = changes
            .iter()
            .map(|(_, _, new)| to_sql(new))
            .chain(std::iter::once(to_sql(&key)));
        let written = self
            .conn
            .execute(&sql, params_from_iter(bound))
            .map_err(|e| DbError::from_write(&table, e))?;

        debug!("Updated {} row(s) in {} ({} columns)", written, table, changes.len());
        row.mark_persisted();
        Ok(written)
    }
}

fn require_column<'s>(schema: &'s TableSchema, column: &str) -> DbResult<&'s Column> {
    schema.column(column).ok_or_else(|| DbError::UnknownColumn {
        table: schema.table.clone(),
        column: column.to_string(),
    })
}

fn select_list(schema: &TableSchema) -> String {
    schema
        .columns
        .iter()
        .map(|c| quote_ident(&c.name))
        .collect::<Vec<_>>()
        .join(", ")
}

fn read_row(schema: &Arc<TableSchema>, row: &rusqlite::Row<'_>) -> rusqlite::Result<Row> {
    let mut values = Vec::with_capacity(schema.columns.len());
    for (index, column) in schema.columns.iter().enumerate() {
        values.push(from_sql(row.get_ref(index)?, column.affinity));
    }
    Ok(Row::loaded(Arc::clone(schema), values))
}

/// Quotes an identifier for interpolation into SQL.
pub(crate) fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}
