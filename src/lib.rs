//! crudforge: generic repository and router generator for CRUD endpoints over PostgreSQL.
//!
//! A [`Model`] binds a `FromRow` type to a table. [`PgRepository`] runs create/get/list/update/delete
//! for it and answers with a read schema. [`CrudRouter`] mounts the matching HTTP routes for any
//! [`Repository`] that axum can resolve per request.

pub mod config;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod model;
pub mod repository;
pub mod routes;
pub mod sql;
pub mod state;
pub mod store;
pub mod telemetry;
pub mod validation;

pub use config::ServiceConfig;
pub use error::{AppError, ConfigError};
pub use extractors::DbSession;
pub use model::{ColumnDef, Model, TableDef};
pub use repository::{Page, PgRepository, Repository, MAX_PAGE_SIZE};
pub use routes::{common_routes, CrudRouter, Operation, DEFAULT_PAGINATION};
pub use state::AppState;
pub use store::{ensure_database_exists, ensure_table};
pub use telemetry::init_tracing;
pub use validation::{FieldRule, FieldRules, Format};
