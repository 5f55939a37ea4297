//! Builds parameterized INSERT, SELECT, UPDATE, DELETE and CREATE TABLE from a table definition.

use crate::error::ConfigError;
use crate::model::{ColumnDef, TableDef};
use crate::sql::params::pg_array_literal;
use serde_json::{Map, Value};

/// Quote identifier for PostgreSQL.
fn quoted(s: &str) -> String {
    format!("\"{}\"", s.replace('"', "\"\""))
}

/// Full qualified table name.
fn qualified_table(table: &TableDef) -> String {
    format!("{}.{}", quoted(table.schema), quoted(table.name))
}

#[derive(Debug, Default)]
pub struct QueryBuf {
    pub sql: String,
    pub params: Vec<Value>,
}

impl QueryBuf {
    /// Push a parameter and return its placeholder cast to the column type. Arrays for array columns are
    /// sent as array literals; jsonb has no cast to `type[]`.
    fn push_param(&mut self, v: Value, column: &ColumnDef) -> String {
        let v = match v {
            Value::Array(items) if column.pg_type.ends_with("[]") => Value::String(pg_array_literal(&items)),
            other => other,
        };
        self.params.push(v);
        format!("${}::{}", self.params.len(), column.pg_type)
    }
}

fn select_column_list(table: &TableDef) -> String {
    table
        .columns
        .iter()
        .map(|c| quoted(c.name))
        .collect::<Vec<_>>()
        .join(", ")
}

/// SELECT by primary key.
pub fn select_by_id(table: &TableDef, id: Value) -> Result<QueryBuf, ConfigError> {
    let pk = table.primary_key()?;
    let mut q = QueryBuf::default();
    let ph = q.push_param(id, pk);
    q.sql = format!(
        "SELECT {} FROM {} WHERE {} = {}",
        select_column_list(table),
        qualified_table(table),
        quoted(pk.name),
        ph
    );
    Ok(q)
}

/// SELECT page ordered by primary key.
pub fn select_page(table: &TableDef, limit: u32, offset: u32) -> Result<QueryBuf, ConfigError> {
    let pk = table.primary_key()?;
    let mut q = QueryBuf::default();
    q.sql = format!(
        "SELECT {} FROM {} ORDER BY {} LIMIT {} OFFSET {}",
        select_column_list(table),
        qualified_table(table),
        quoted(pk.name),
        limit,
        offset
    );
    Ok(q)
}

/// INSERT the body's known columns, in table order. Absent columns are omitted so the database
/// applies defaults; the primary key is written only when the body carries it.
pub fn insert(table: &TableDef, body: &Map<String, Value>) -> Result<QueryBuf, ConfigError> {
    table.primary_key()?;
    let mut q = QueryBuf::default();
    let mut cols = Vec::new();
    let mut placeholders = Vec::new();
    for c in table.columns {
        let Some(val) = body.get(c.name) else { continue };
        if val.is_null() && c.has_default() {
            continue;
        }
        placeholders.push(q.push_param(val.clone(), c));
        cols.push(quoted(c.name));
    }
    let returning = select_column_list(table);
    q.sql = if cols.is_empty() {
        format!(
            "INSERT INTO {} DEFAULT VALUES RETURNING {}",
            qualified_table(table),
            returning
        )
    } else {
        format!(
            "INSERT INTO {} ({}) VALUES ({}) RETURNING {}",
            qualified_table(table),
            cols.join(", "),
            placeholders.join(", "),
            returning
        )
    };
    Ok(q)
}

/// UPDATE by id: SET only known non-key columns present in body, plus on-update expressions.
/// With nothing to set this degrades to a SELECT by id.
pub fn update(table: &TableDef, id: Value, body: &Map<String, Value>) -> Result<QueryBuf, ConfigError> {
    let pk = table.primary_key()?;
    let mut q = QueryBuf::default();
    let mut sets = Vec::new();
    for c in table.columns.iter().filter(|c| !c.primary_key) {
        let Some(val) = body.get(c.name) else { continue };
        let ph = q.push_param(val.clone(), c);
        sets.push(format!("{} = {}", quoted(c.name), ph));
    }
    if sets.is_empty() {
        return select_by_id(table, id);
    }
    for c in table.columns {
        if let Some(expr) = c.on_update {
            if !body.contains_key(c.name) {
                sets.push(format!("{} = {}", quoted(c.name), expr));
            }
        }
    }
    let id_ph = q.push_param(id, pk);
    q.sql = format!(
        "UPDATE {} SET {} WHERE {} = {} RETURNING {}",
        qualified_table(table),
        sets.join(", "),
        quoted(pk.name),
        id_ph,
        select_column_list(table)
    );
    Ok(q)
}

/// DELETE by id, returning the deleted row.
pub fn delete(table: &TableDef, id: Value) -> Result<QueryBuf, ConfigError> {
    let pk = table.primary_key()?;
    let mut q = QueryBuf::default();
    let ph = q.push_param(id, pk);
    q.sql = format!(
        "DELETE FROM {} WHERE {} = {} RETURNING {}",
        qualified_table(table),
        quoted(pk.name),
        ph,
        select_column_list(table)
    );
    Ok(q)
}

/// CREATE SCHEMA / CREATE TABLE IF NOT EXISTS for the table. Validates the definition first.
pub fn create_table(table: &TableDef) -> Result<Vec<String>, ConfigError> {
    table.validate()?;
    let pk = table.primary_key()?;
    let mut col_defs = Vec::with_capacity(table.columns.len() + 1);
    for c in table.columns {
        let mut def = format!("{} {}", quoted(c.name), c.pg_type);
        if c.identity {
            def.push_str(" GENERATED BY DEFAULT AS IDENTITY");
        }
        if !c.nullable {
            def.push_str(" NOT NULL");
        }
        if let Some(d) = c.default {
            def.push_str(" DEFAULT ");
            def.push_str(d);
        }
        col_defs.push(def);
    }
    col_defs.push(format!("PRIMARY KEY ({})", quoted(pk.name)));
    Ok(vec![
        format!("CREATE SCHEMA IF NOT EXISTS {}", quoted(table.schema)),
        format!(
            "CREATE TABLE IF NOT EXISTS {} (\n  {}\n)",
            qualified_table(table),
            col_defs.join(",\n  ")
        ),
    ])
}
