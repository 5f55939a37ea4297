//! Demo service: mounts generated CRUD routers for two resources next to the service routes.
//!
//! Run from repo root: `cargo run -p demo-service`
//! Configure with `DATABASE_URL`, `DATABASE_MAX_CONNECTIONS`, `BIND_ADDR` (or a `.env` file).

use axum::{http::StatusCode, routing::post, Json, Router};
use chrono::{DateTime, Utc};
use crudforge::{
    common_routes, ensure_database_exists, ensure_table, init_tracing, AppError, AppState, ColumnDef,
    CrudRouter, FieldRule, FieldRules, Format, Model, Operation, PgRepository, Repository, ServiceConfig,
    TableDef,
};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use uuid::Uuid;

#[derive(Debug, sqlx::FromRow)]
struct SomeItem {
    id: i32,
    label: String,
}

impl Model for SomeItem {
    type Id = i32;

    const TABLE: TableDef = TableDef::new(
        "some_item",
        &[
            ColumnDef::new("id", "int4").primary_key().identity(),
            ColumnDef::new("label", "text").not_null(),
        ],
    );
}

#[derive(Debug, Serialize, Deserialize)]
struct SomeItemBase {
    label: String,
}

#[derive(Debug, Serialize)]
struct SomeItemRead {
    id: i32,
    label: String,
}

impl From<SomeItem> for SomeItemRead {
    fn from(item: SomeItem) -> Self {
        SomeItemRead {
            id: item.id,
            label: item.label,
        }
    }
}

type SomeItemRepository = PgRepository<SomeItem, SomeItemRead, SomeItemBase, SomeItemBase>;

/// Replaces the generated POST: trims the label before storing it.
async fn create_some_item(
    mut repo: SomeItemRepository,
    Json(item): Json<SomeItemBase>,
) -> Result<(StatusCode, Json<SomeItemRead>), AppError> {
    let label = item.label.trim().to_string();
    if label.is_empty() {
        return Err(AppError::Validation("label must not be blank".into()));
    }
    let created = repo.create(SomeItemBase { label }).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

#[derive(Debug, sqlx::FromRow)]
struct Note {
    id: Uuid,
    title: String,
    body: Option<String>,
    author_email: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Model for Note {
    type Id = Uuid;

    const TABLE: TableDef = TableDef::new(
        "notes",
        &[
            ColumnDef::new("id", "uuid").primary_key().default("gen_random_uuid()"),
            ColumnDef::new("title", "text").not_null(),
            ColumnDef::new("body", "text"),
            ColumnDef::new("author_email", "text"),
            ColumnDef::new("created_at", "timestamptz").not_null().default("NOW()"),
            ColumnDef::new("updated_at", "timestamptz")
                .not_null()
                .default("NOW()")
                .on_update("NOW()"),
        ],
    );
}

#[derive(Debug, Serialize)]
struct NoteRead {
    id: Uuid,
    title: String,
    body: Option<String>,
    author_email: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<Note> for NoteRead {
    fn from(n: Note) -> Self {
        NoteRead {
            id: n.id,
            title: n.title,
            body: n.body,
            author_email: n.author_email,
            created_at: n.created_at,
            updated_at: n.updated_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct NoteCreate {
    title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    body: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    author_email: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct NoteUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    body: Option<String>,
}

type NoteRepository = PgRepository<Note, NoteRead, NoteCreate, NoteUpdate>;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing("crudforge=info,demo_service=info");

    let config = ServiceConfig::from_env()?;
    ensure_database_exists(&config.database_url).await?;
    let pool = config.connect().await?;
    ensure_table::<SomeItem>(&pool).await?;
    ensure_table::<Note>(&pool).await?;
    let state = AppState::new(pool);

    let some_items = CrudRouter::<SomeItemRepository>::new("/some_item")
        .pagination(10)
        .without(Operation::Create);
    let some_items_paths = some_items.collection_paths();
    let mut some_items: Router<AppState> = some_items.into_router();
    for path in &some_items_paths {
        some_items = some_items.route(path, post(create_some_item));
    }

    let notes = CrudRouter::<NoteRepository>::new("/notes")
        .rules(
            FieldRules::new()
                .field("title", FieldRule::new().required().min_length(1).max_length(200))
                .field("author_email", FieldRule::new().format(Format::Email)),
        )
        .body_limit(64 * 1024);

    let app = Router::new()
        .merge(common_routes())
        .merge(some_items)
        .merge(notes.into_router())
        .with_state(state);

    let listener = TcpListener::bind(config.bind_addr).await?;
    tracing::info!("listening on {}", listener.local_addr()?);
    axum::serve(listener, app).await?;
    Ok(())
}
