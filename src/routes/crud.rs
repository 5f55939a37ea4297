//! Router generator: mounts the standard CRUD routes for one repository under a prefix.
//!
//! The repository is resolved per request through its `FromRequestParts` implementation, which is
//! where it acquires its session (see [`PgRepository`](crate::PgRepository)).

use crate::handlers::crud as handlers;
use crate::repository::Repository;
use crate::validation::FieldRules;
use axum::{
    extract::{FromRequestParts, Request, State},
    routing::MethodRouter,
    Router,
};
use std::marker::PhantomData;
use std::sync::Arc;
use tower_http::limit::RequestBodyLimitLayer;

/// `limit` used by list when the query does not give one.
pub const DEFAULT_PAGINATION: u32 = 100;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Operation {
    List,
    Read,
    Create,
    Update,
    Delete,
}

impl Operation {
    pub const ALL: [Operation; 5] = [
        Operation::List,
        Operation::Read,
        Operation::Create,
        Operation::Update,
        Operation::Delete,
    ];
}

/// Builder for the routes of one resource:
///
/// | method | path              | operation |
/// |--------|-------------------|-----------|
/// | GET    | `{prefix}/`       | list (`?offset=&limit=`) |
/// | POST   | `{prefix}/`       | create    |
/// | GET    | `{prefix}/:id`    | read      |
/// | PATCH  | `{prefix}/:id`    | update    |
/// | DELETE | `{prefix}/:id`    | delete    |
///
/// The collection also answers without the trailing slash.
pub struct CrudRouter<R> {
    prefix: String,
    pagination: u32,
    operations: Vec<Operation>,
    rules: Arc<FieldRules>,
    body_limit: Option<usize>,
    _repository: PhantomData<fn() -> R>,
}

/// Leading slash, no trailing slash; the root prefix becomes "".
fn normalize_prefix(prefix: &str) -> String {
    let trimmed = prefix.trim().trim_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("/{}", trimmed)
    }
}

impl<R: Repository> CrudRouter<R> {
    pub fn new(prefix: &str) -> Self {
        CrudRouter {
            prefix: normalize_prefix(prefix),
            pagination: DEFAULT_PAGINATION,
            operations: Operation::ALL.to_vec(),
            rules: Arc::new(FieldRules::default()),
            body_limit: None,
            _repository: PhantomData,
        }
    }

    pub fn pagination(mut self, default_limit: u32) -> Self {
        self.pagination = default_limit;
        self
    }

    /// Do not mount `op`, e.g. to register a custom handler on the same path.
    pub fn without(mut self, op: Operation) -> Self {
        self.operations.retain(|o| *o != op);
        self
    }

    pub fn only(mut self, ops: &[Operation]) -> Self {
        self.operations = Operation::ALL.into_iter().filter(|o| ops.contains(o)).collect();
        self
    }

    /// Rules checked on create bodies (all) and update bodies (present fields only).
    pub fn rules(mut self, rules: FieldRules) -> Self {
        self.rules = Arc::new(rules);
        self
    }

    pub fn body_limit(mut self, bytes: usize) -> Self {
        self.body_limit = Some(bytes);
        self
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn collection_path(&self) -> String {
        format!("{}/", self.prefix)
    }

    /// Every path the collection answers on: `{prefix}/` and, unless mounted at the root, `{prefix}`.
    /// Register replacement collection handlers on all of them.
    pub fn collection_paths(&self) -> Vec<String> {
        let mut paths = vec![self.collection_path()];
        if !self.prefix.is_empty() {
            paths.push(self.prefix.clone());
        }
        paths
    }

    pub fn item_path(&self) -> String {
        format!("{}/:id", self.prefix)
    }

    fn enabled(&self, op: Operation) -> bool {
        self.operations.contains(&op)
    }

    pub fn into_router<S>(self) -> Router<S>
    where
        S: Clone + Send + Sync + 'static,
        R: FromRequestParts<S>,
    {
        let mut collection: MethodRouter<S> = MethodRouter::new();
        let mut item: MethodRouter<S> = MethodRouter::new();

        if self.enabled(Operation::List) {
            let default_limit = self.pagination;
            collection = collection.get(move |State(state): State<S>, req: Request| {
                handlers::list::<R, S>(state, req, default_limit)
            });
        }
        if self.enabled(Operation::Create) {
            let rules = Arc::clone(&self.rules);
            collection = collection.post(move |State(state): State<S>, req: Request| async move {
                handlers::create::<R, S>(state, req, &rules).await
            });
        }
        if self.enabled(Operation::Read) {
            item = item.get(|State(state): State<S>, req: Request| handlers::read::<R, S>(state, req));
        }
        if self.enabled(Operation::Update) {
            let rules = Arc::clone(&self.rules);
            item = item.patch(move |State(state): State<S>, req: Request| async move {
                handlers::update::<R, S>(state, req, &rules).await
            });
        }
        if self.enabled(Operation::Delete) {
            item = item.delete(|State(state): State<S>, req: Request| handlers::delete::<R, S>(state, req));
        }

        let mut router = Router::new();
        let has_collection = self.enabled(Operation::List) || self.enabled(Operation::Create);
        if has_collection {
            for path in self.collection_paths() {
                router = router.route(&path, collection.clone());
            }
        }
        if self.enabled(Operation::Read) || self.enabled(Operation::Update) || self.enabled(Operation::Delete) {
            router = router.route(&self.item_path(), item);
        }
        if let Some(limit) = self.body_limit {
            router = router.layer(RequestBodyLimitLayer::new(limit));
        }

        tracing::info!(
            prefix = %self.collection_path(),
            operations = ?self.operations,
            pagination = self.pagination,
            "mounted crud routes"
        );
        router
    }
}
