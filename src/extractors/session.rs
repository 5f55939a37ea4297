//! Request-scoped database session: one pooled connection per request, returned to the pool on drop.

use crate::error::AppError;
use async_trait::async_trait;
use axum::{
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use sqlx::pool::PoolConnection;
use sqlx::{Connection, PgPool, Postgres, Transaction};

pub struct DbSession {
    conn: PoolConnection<Postgres>,
}

impl DbSession {
    pub async fn acquire(pool: &PgPool) -> Result<Self, AppError> {
        let conn = pool.acquire().await?;
        Ok(DbSession { conn })
    }

    /// Start a transaction on the session's connection. Dropping it without commit rolls back.
    pub async fn begin(&mut self) -> Result<Transaction<'_, Postgres>, AppError> {
        Ok(Connection::begin(&mut *self.conn).await?)
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for DbSession
where
    S: Send + Sync,
    PgPool: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(_parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let pool = PgPool::from_ref(state);
        tracing::debug!(idle = pool.num_idle(), size = pool.size(), "acquiring session");
        DbSession::acquire(&pool).await
    }
}
