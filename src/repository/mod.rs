//! Repository adapter: typed CRUD over a persistence model, parameterized by read/create/update schemas.

mod postgres;

pub use postgres::PgRepository;

use crate::error::AppError;
use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};

/// Hard cap on `limit` for list operations.
pub const MAX_PAGE_SIZE: u32 = 1000;

/// Offset/limit window for list operations. `limit` is clamped to [`MAX_PAGE_SIZE`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Page {
    pub offset: u32,
    pub limit: u32,
}

impl Page {
    pub fn new(offset: u32, limit: u32) -> Self {
        Page {
            offset,
            limit: limit.min(MAX_PAGE_SIZE),
        }
    }
}

/// CRUD contract used by the generated routes. Every operation returns the read schema, never the
/// stored row, and reports a missing id as [`AppError::NotFound`].
///
/// Methods take `&mut self`: a repository is built per request and owns that request's session.
#[async_trait]
pub trait Repository: Send + 'static {
    type Id: DeserializeOwned + Send + 'static;
    type Read: Serialize + Send + 'static;
    type Create: DeserializeOwned + Send + 'static;
    type Update: DeserializeOwned + Send + 'static;

    async fn create(&mut self, payload: Self::Create) -> Result<Self::Read, AppError>;

    async fn get(&mut self, id: Self::Id) -> Result<Self::Read, AppError>;

    /// Items ordered by primary key.
    async fn list(&mut self, page: Page) -> Result<Vec<Self::Read>, AppError>;

    async fn update(&mut self, id: Self::Id, payload: Self::Update) -> Result<Self::Read, AppError>;

    /// Returns the deleted item.
    async fn delete(&mut self, id: Self::Id) -> Result<Self::Read, AppError>;
}
