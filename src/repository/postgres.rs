//! Repository over PostgreSQL: one statement per transaction on the request's session.

use super::{Page, Repository};
use crate::error::AppError;
use crate::extractors::DbSession;
use crate::model::Model;
use crate::sql::{self, PgBindValue, QueryBuf};
use async_trait::async_trait;
use axum::{
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::{Map, Value};
use sqlx::postgres::{PgArguments, Postgres};
use sqlx::query::QueryAs;
use sqlx::PgPool;
use std::marker::PhantomData;

/// Repository for model `M`, answering with read schema `R` and accepting create/update schemas `C`/`U`.
///
/// `C` and `U` are serialized to JSON objects; keys that name columns of `M::TABLE` are written and the
/// rest are ignored. For partial updates, `U` should skip absent fields
/// (`#[serde(skip_serializing_if = "Option::is_none")]`); a serialized `null` sets the column to NULL.
pub struct PgRepository<M, R, C, U> {
    session: DbSession,
    _schemas: PhantomData<fn() -> (M, R, C, U)>,
}

impl<M, R, C, U> PgRepository<M, R, C, U> {
    pub fn new(session: DbSession) -> Self {
        PgRepository {
            session,
            _schemas: PhantomData,
        }
    }

    pub fn into_session(self) -> DbSession {
        self.session
    }
}

impl<M, R, C, U> PgRepository<M, R, C, U>
where
    M: Model,
{
    async fn fetch_optional(&mut self, q: QueryBuf) -> Result<Option<M>, AppError> {
        tracing::debug!(sql = %q.sql, params = ?q.params, "query");
        let mut tx = self.session.begin().await?;
        let row = bind_all::<M>(&q).fetch_optional(&mut *tx).await?;
        tx.commit().await?;
        Ok(row)
    }

    async fn fetch_all(&mut self, q: QueryBuf) -> Result<Vec<M>, AppError> {
        tracing::debug!(sql = %q.sql, params = ?q.params, "query");
        let mut tx = self.session.begin().await?;
        let rows = bind_all::<M>(&q).fetch_all(&mut *tx).await?;
        tx.commit().await?;
        Ok(rows)
    }

    fn not_found(id: &M::Id) -> AppError {
        AppError::NotFound(format!("{} {}", M::TABLE.name, id))
    }
}

fn bind_all<M: Model>(q: &QueryBuf) -> QueryAs<'_, Postgres, M, PgArguments> {
    let mut query = sqlx::query_as::<_, M>(&q.sql);
    for p in &q.params {
        query = query.bind(PgBindValue::from_json(p));
    }
    query
}

/// Serialize a schema value into the column map written by insert/update.
fn to_columns<T: Serialize>(payload: &T) -> Result<Map<String, Value>, AppError> {
    match serde_json::to_value(payload)? {
        Value::Object(m) => Ok(m),
        other => Err(AppError::Validation(format!(
            "payload must be an object, got {}",
            json_kind(&other)
        ))),
    }
}

fn json_kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[async_trait]
impl<M, R, C, U> Repository for PgRepository<M, R, C, U>
where
    M: Model,
    R: From<M> + Serialize + Send + 'static,
    C: Serialize + DeserializeOwned + Send + 'static,
    U: Serialize + DeserializeOwned + Send + 'static,
{
    type Id = M::Id;
    type Read = R;
    type Create = C;
    type Update = U;

    async fn create(&mut self, payload: C) -> Result<R, AppError> {
        let body = to_columns(&payload)?;
        let q = sql::insert(&M::TABLE, &body)?;
        let row = self
            .fetch_optional(q)
            .await?
            .ok_or(AppError::Db(sqlx::Error::RowNotFound))?;
        Ok(R::from(row))
    }

    async fn get(&mut self, id: M::Id) -> Result<R, AppError> {
        let q = sql::select_by_id(&M::TABLE, serde_json::to_value(&id)?)?;
        let row = self.fetch_optional(q).await?.ok_or_else(|| Self::not_found(&id))?;
        Ok(R::from(row))
    }

    async fn list(&mut self, page: Page) -> Result<Vec<R>, AppError> {
        let q = sql::select_page(&M::TABLE, page.limit, page.offset)?;
        let rows = self.fetch_all(q).await?;
        Ok(rows.into_iter().map(R::from).collect())
    }

    async fn update(&mut self, id: M::Id, payload: U) -> Result<R, AppError> {
        let body = to_columns(&payload)?;
        let q = sql::update(&M::TABLE, serde_json::to_value(&id)?, &body)?;
        let row = self.fetch_optional(q).await?.ok_or_else(|| Self::not_found(&id))?;
        Ok(R::from(row))
    }

    async fn delete(&mut self, id: M::Id) -> Result<R, AppError> {
        let q = sql::delete(&M::TABLE, serde_json::to_value(&id)?)?;
        let row = self.fetch_optional(q).await?.ok_or_else(|| Self::not_found(&id))?;
        Ok(R::from(row))
    }
}

#[async_trait]
impl<S, M, R, C, U> FromRequestParts<S> for PgRepository<M, R, C, U>
where
    S: Send + Sync,
    PgPool: FromRef<S>,
    M: 'static,
    R: 'static,
    C: 'static,
    U: 'static,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let session = DbSession::from_request_parts(parts, state).await?;
        Ok(PgRepository::new(session))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Serialize)]
    struct Patch {
        #[serde(skip_serializing_if = "Option::is_none")]
        label: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        done: Option<bool>,
    }

    #[test]
    fn partial_update_schema_omits_absent_fields() {
        let cols = to_columns(&Patch {
            label: Some("x".into()),
            done: None,
        })
        .unwrap();
        assert_eq!(Value::Object(cols), json!({"label": "x"}));
    }

    #[test]
    fn non_object_payload_is_rejected() {
        let err = to_columns(&vec![1, 2]).unwrap_err();
        assert_eq!(err.to_string(), "validation: payload must be an object, got array");
    }
}
