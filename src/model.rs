//! Persistence model binding: table metadata declared as constants on a `FromRow` type.

use crate::error::ConfigError;
use regex::Regex;
use serde::{de::DeserializeOwned, Serialize};
use sqlx::postgres::PgRow;
use sqlx::FromRow;
use std::fmt;
use std::sync::OnceLock;

/// One column of a mapped table.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ColumnDef {
    pub name: &'static str,
    /// PostgreSQL type, used for `$n::type` casts and DDL (e.g. "int4", "text", "timestamptz").
    pub pg_type: &'static str,
    pub primary_key: bool,
    pub nullable: bool,
    /// `GENERATED BY DEFAULT AS IDENTITY`.
    pub identity: bool,
    pub default: Option<&'static str>,
    /// Expression written on every update that changes at least one field (e.g. "NOW()").
    pub on_update: Option<&'static str>,
}

impl ColumnDef {
    /// Nullable, no default.
    pub const fn new(name: &'static str, pg_type: &'static str) -> Self {
        ColumnDef {
            name,
            pg_type,
            primary_key: false,
            nullable: true,
            identity: false,
            default: None,
            on_update: None,
        }
    }

    pub const fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self.nullable = false;
        self
    }

    pub const fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    pub const fn identity(mut self) -> Self {
        self.identity = true;
        self
    }

    pub const fn default(mut self, expression: &'static str) -> Self {
        self.default = Some(expression);
        self
    }

    pub const fn on_update(mut self, expression: &'static str) -> Self {
        self.on_update = Some(expression);
        self
    }

    /// Whether the database fills the column when an insert omits it.
    pub fn has_default(&self) -> bool {
        self.identity || self.default.is_some()
    }
}

/// Static description of a mapped table.
#[derive(Clone, Copy, Debug)]
pub struct TableDef {
    pub schema: &'static str,
    pub name: &'static str,
    pub columns: &'static [ColumnDef],
}

impl TableDef {
    pub const fn new(name: &'static str, columns: &'static [ColumnDef]) -> Self {
        TableDef {
            schema: "public",
            name,
            columns,
        }
    }

    pub const fn in_schema(mut self, schema: &'static str) -> Self {
        self.schema = schema;
        self
    }

    pub fn column(&self, name: &str) -> Option<&ColumnDef> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn primary_key(&self) -> Result<&ColumnDef, ConfigError> {
        let mut pks = self.columns.iter().filter(|c| c.primary_key);
        let pk = pks.next().ok_or_else(|| ConfigError::MissingPrimaryKey {
            table: self.name.to_string(),
        })?;
        if pks.next().is_some() {
            return Err(ConfigError::CompositePrimaryKey {
                table: self.name.to_string(),
            });
        }
        Ok(pk)
    }

    /// Check identifiers and key shape. Identifiers are quoted in SQL regardless; types are not.
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_identifier("schema", self.schema)?;
        check_identifier("table", self.name)?;
        for c in self.columns {
            check_identifier("column", c.name)?;
            if !type_pattern().is_match(c.pg_type) {
                return Err(ConfigError::InvalidIdentifier {
                    kind: "type",
                    name: c.pg_type.to_string(),
                });
            }
        }
        self.primary_key()?;
        Ok(())
    }
}

fn identifier_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("static pattern"))
}

fn type_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_ ]*(\([0-9, ]+\))?(\[\])?$").expect("static pattern"))
}

fn check_identifier(kind: &'static str, name: &str) -> Result<(), ConfigError> {
    if identifier_pattern().is_match(name) {
        Ok(())
    } else {
        Err(ConfigError::InvalidIdentifier {
            kind,
            name: name.to_string(),
        })
    }
}

/// A row type bound to a table. Rows are decoded with `FromRow` from `RETURNING`/`SELECT` of every column in `TABLE`.
///
/// ```rust,ignore
/// #[derive(sqlx::FromRow)]
/// struct SomeItem { id: i32, label: String }
///
/// impl Model for SomeItem {
///     type Id = i32;
///     const TABLE: TableDef = TableDef::new("some_item", &[
///         ColumnDef::new("id", "int4").primary_key().identity(),
///         ColumnDef::new("label", "text").not_null(),
///     ]);
/// }
/// ```
pub trait Model: for<'r> FromRow<'r, PgRow> + Send + Unpin + 'static {
    /// Primary key as it appears in paths and JSON.
    type Id: Serialize + DeserializeOwned + fmt::Display + Send + Sync + 'static;

    const TABLE: TableDef;
}
