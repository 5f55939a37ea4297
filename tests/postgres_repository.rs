//! Runs against a live PostgreSQL when `DATABASE_URL` is set; each test returns early otherwise.

use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use crudforge::{
    ensure_table, AppError, AppState, ColumnDef, CrudRouter, DbSession, Model, Page, PgRepository,
    Repository, TableDef,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tower::ServiceExt;

const TEST_SCHEMA: &str = "crudforge_test";

#[derive(Debug, sqlx::FromRow)]
struct Widget {
    id: i32,
    label: String,
    weight: Option<f64>,
    meta: Option<Value>,
    revision: i32,
}

impl Model for Widget {
    type Id = i32;

    const TABLE: TableDef = TableDef::new(
        "widgets",
        &[
            ColumnDef::new("id", "int4").primary_key().identity(),
            ColumnDef::new("label", "text").not_null(),
            ColumnDef::new("weight", "float8"),
            ColumnDef::new("meta", "jsonb"),
            ColumnDef::new("revision", "int4")
                .not_null()
                .default("0")
                .on_update("\"revision\" + 1"),
        ],
    )
    .in_schema(TEST_SCHEMA);
}

#[derive(Debug, PartialEq, Serialize, Deserialize)]
struct WidgetRead {
    id: i32,
    label: String,
    weight: Option<f64>,
    meta: Option<Value>,
    revision: i32,
}

impl From<Widget> for WidgetRead {
    fn from(w: Widget) -> Self {
        WidgetRead {
            id: w.id,
            label: w.label,
            weight: w.weight,
            meta: w.meta,
            revision: w.revision,
        }
    }
}

#[derive(Serialize, Deserialize)]
struct WidgetCreate {
    label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    weight: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    meta: Option<Value>,
}

#[derive(Default, Serialize, Deserialize)]
struct WidgetUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    weight: Option<f64>,
}

type WidgetRepository = PgRepository<Widget, WidgetRead, WidgetCreate, WidgetUpdate>;

/// Lives in `public` so the two tests never create the same schema concurrently.
#[derive(Debug, sqlx::FromRow)]
struct Gadget {
    id: i32,
    label: String,
}

impl Model for Gadget {
    type Id = i32;

    const TABLE: TableDef = TableDef::new(
        "gadgets",
        &[
            ColumnDef::new("id", "int4").primary_key().identity(),
            ColumnDef::new("label", "text").not_null(),
        ],
    );
}

#[derive(Debug, Serialize)]
struct GadgetRead {
    id: i32,
    label: String,
}

impl From<Gadget> for GadgetRead {
    fn from(g: Gadget) -> Self {
        GadgetRead { id: g.id, label: g.label }
    }
}

#[derive(Serialize, Deserialize)]
struct GadgetCreate {
    label: String,
}

type GadgetRepository = PgRepository<Gadget, GadgetRead, GadgetCreate, GadgetCreate>;

#[derive(Debug, sqlx::FromRow)]
struct Tagged {
    id: i32,
    tags: Option<Vec<String>>,
    scores: Option<Vec<i32>>,
    amount: Option<String>,
}

impl Model for Tagged {
    type Id = i32;

    const TABLE: TableDef = TableDef::new(
        "tagged",
        &[
            ColumnDef::new("id", "int4").primary_key().identity(),
            ColumnDef::new("tags", "text[]"),
            ColumnDef::new("scores", "int4[]"),
            ColumnDef::new("amount", "text"),
        ],
    );
}

#[derive(Debug, Serialize)]
struct TaggedRead {
    id: i32,
    tags: Option<Vec<String>>,
    scores: Option<Vec<i32>>,
    amount: Option<String>,
}

impl From<Tagged> for TaggedRead {
    fn from(t: Tagged) -> Self {
        TaggedRead {
            id: t.id,
            tags: t.tags,
            scores: t.scores,
            amount: t.amount,
        }
    }
}

#[derive(Default, Serialize, Deserialize)]
struct TaggedWrite {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tags: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    scores: Option<Vec<i32>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    amount: Option<u64>,
}

type TaggedRepository = PgRepository<Tagged, TaggedRead, TaggedWrite, TaggedWrite>;

async fn fresh_table<M: Model>() -> Option<PgPool> {
    let url = std::env::var("DATABASE_URL").ok()?;
    let pool = PgPoolOptions::new()
        .max_connections(2)
        .connect(&url)
        .await
        .expect("connect to DATABASE_URL");
    sqlx::query(&format!(
        "DROP TABLE IF EXISTS \"{}\".\"{}\"",
        M::TABLE.schema,
        M::TABLE.name
    ))
    .execute(&pool)
    .await
    .expect("drop table");
    ensure_table::<M>(&pool).await.expect("create table");
    Some(pool)
}

#[tokio::test]
async fn repository_crud_cycle() {
    let Some(pool) = fresh_table::<Widget>().await else {
        return;
    };
    let mut repo = WidgetRepository::new(DbSession::acquire(&pool).await.unwrap());

    let created = repo
        .create(WidgetCreate {
            label: "bolt".into(),
            weight: Some(2.5),
            meta: Some(json!({"size": "m"})),
        })
        .await
        .unwrap();
    assert_eq!(created.label, "bolt");
    assert_eq!(created.revision, 0);

    let fetched = repo.get(created.id).await.unwrap();
    assert_eq!(fetched, created);

    let updated = repo
        .update(
            created.id,
            WidgetUpdate {
                weight: Some(3.0),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.label, "bolt");
    assert_eq!(updated.weight, Some(3.0));
    assert_eq!(updated.revision, 1);

    let untouched = repo.update(created.id, WidgetUpdate::default()).await.unwrap();
    assert_eq!(untouched.revision, 1);

    let deleted = repo.delete(created.id).await.unwrap();
    assert_eq!(deleted.id, created.id);
    assert!(matches!(repo.get(created.id).await, Err(AppError::NotFound(_))));
    assert!(matches!(
        repo.update(created.id, WidgetUpdate::default()).await,
        Err(AppError::NotFound(_))
    ));
    assert!(matches!(repo.delete(created.id).await, Err(AppError::NotFound(_))));

    // label is NOT NULL; a serialized null in an update body reaches the database as-is.
    #[derive(Serialize, Deserialize)]
    struct NullLabel {
        label: Option<String>,
    }
    let other = repo
        .create(WidgetCreate {
            label: "nut".into(),
            weight: None,
            meta: None,
        })
        .await
        .unwrap();
    let mut raw = PgRepository::<Widget, WidgetRead, WidgetCreate, NullLabel>::new(repo.into_session());
    let err = raw.update(other.id, NullLabel { label: None }).await.unwrap_err();
    assert!(matches!(err, AppError::Db(_)));
}

#[tokio::test]
async fn list_pages_in_key_order() {
    let Some(pool) = fresh_table::<Gadget>().await else {
        return;
    };
    let mut repo = GadgetRepository::new(DbSession::acquire(&pool).await.unwrap());
    for i in 0..7 {
        repo.create(GadgetCreate {
            label: format!("g{}", i),
        })
        .await
        .unwrap();
    }

    let first = repo.list(Page::new(0, 3)).await.unwrap();
    let labels: Vec<_> = first.iter().map(|g| g.label.as_str()).collect();
    assert_eq!(labels, ["g0", "g1", "g2"]);

    let tail = repo.list(Page::new(5, 10)).await.unwrap();
    assert_eq!(tail.len(), 2);

    let app: Router = CrudRouter::<GadgetRepository>::new("/gadgets")
        .pagination(4)
        .into_router()
        .with_state(AppState::new(pool));
    let resp = app
        .clone()
        .oneshot(Request::builder().uri("/gadgets/").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = serde_json::from_slice(&to_bytes(resp.into_body(), usize::MAX).await.unwrap()).unwrap();
    assert_eq!(body.as_array().unwrap().len(), 4);

    let resp = app
        .oneshot(
            Request::builder()
                .method(Method::POST)
                .uri("/gadgets/")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(r#"{"label":"via-http"}"#))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);
}

#[tokio::test]
async fn array_columns_and_large_integers_round_trip() {
    let Some(pool) = fresh_table::<Tagged>().await else {
        return;
    };
    let mut repo = TaggedRepository::new(DbSession::acquire(&pool).await.unwrap());

    let created = repo
        .create(TaggedWrite {
            tags: Some(vec!["a".into(), "b c".into(), "quote\"d".into()]),
            scores: Some(vec![1, 2]),
            amount: Some(u64::MAX),
        })
        .await
        .unwrap();
    assert_eq!(
        created.tags.as_deref(),
        Some(&["a".to_string(), "b c".to_string(), "quote\"d".to_string()][..])
    );
    assert_eq!(created.scores, Some(vec![1, 2]));
    assert_eq!(created.amount.as_deref(), Some("18446744073709551615"));

    let updated = repo
        .update(
            created.id,
            TaggedWrite {
                tags: Some(Vec::new()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.tags, Some(Vec::new()));
    assert_eq!(updated.scores, Some(vec![1, 2]));
}
