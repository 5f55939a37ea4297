//! Database bootstrap: create the target database and model tables when missing.

use crate::error::{AppError, ConfigError};
use crate::model::Model;
use crate::sql;
use sqlx::postgres::PgConnectOptions;
use sqlx::{ConnectOptions, PgPool};
use std::str::FromStr;

fn quote_ident(s: &str) -> String {
    format!("\"{}\"", s.replace('"', "\"\""))
}

/// Connect to the server's `postgres` database and create the URL's database if it does not exist.
pub async fn ensure_database_exists(database_url: &str) -> Result<(), AppError> {
    let opts = PgConnectOptions::from_str(database_url)
        .map_err(|e| ConfigError::InvalidEnv {
            var: "DATABASE_URL",
            value: e.to_string(),
        })?;
    let db_name = match opts.get_database() {
        Some(name) if !name.is_empty() && name != "postgres" => name.to_string(),
        _ => return Ok(()),
    };
    let mut conn = opts.database("postgres").connect().await?;
    let exists: (bool,) = sqlx::query_as("SELECT EXISTS(SELECT 1 FROM pg_database WHERE datname = $1)")
        .bind(&db_name)
        .fetch_one(&mut conn)
        .await?;
    if !exists.0 {
        tracing::info!(database = %db_name, "creating database");
        sqlx::query(&format!("CREATE DATABASE {}", quote_ident(&db_name)))
            .execute(&mut conn)
            .await?;
    }
    Ok(())
}

/// Create the model's schema and table if they do not exist. Existing tables are left untouched.
pub async fn ensure_table<M: Model>(pool: &PgPool) -> Result<(), AppError> {
    for stmt in sql::create_table(&M::TABLE)? {
        tracing::debug!(sql = %stmt, "ddl");
        sqlx::query(&stmt).execute(pool).await?;
    }
    tracing::info!(schema = M::TABLE.schema, table = M::TABLE.name, "table ready");
    Ok(())
}
