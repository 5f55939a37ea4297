//! Generic CRUD handlers: list, read, create, update, delete over any [`Repository`].
//!
//! Each handler checks the request inputs (id, query, body) first and resolves the repository last, so a
//! rejected request never takes a pooled connection. The router generator wires these up; they are public
//! so applications can reuse them when they replace or add routes.

use crate::error::AppError;
use crate::repository::{Page, Repository};
use crate::validation::FieldRules;
use axum::{
    body::Body,
    extract::{rejection::JsonRejection, FromRequest, FromRequestParts, Path, Query, Request},
    http::{request::Parts, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{de::DeserializeOwned, Deserialize};
use serde_json::{Map, Value};

/// Handler outcome: the success body, or the response for a rejected request.
pub type HandlerResult<T> = Result<T, Response>;

#[derive(Debug, Default, Deserialize)]
pub struct PageParams {
    pub offset: Option<u32>,
    pub limit: Option<u32>,
}

impl PageParams {
    pub fn page(&self, default_limit: u32) -> Page {
        Page::new(self.offset.unwrap_or(0), self.limit.unwrap_or(default_limit))
    }
}

fn reject(err: impl Into<AppError>) -> Response {
    err.into().into_response()
}

async fn repository<R, S>(parts: &mut Parts, state: &S) -> HandlerResult<R>
where
    R: FromRequestParts<S>,
    S: Send + Sync,
{
    R::from_request_parts(parts, state)
        .await
        .map_err(IntoResponse::into_response)
}

async fn item_id<R, S>(parts: &mut Parts, state: &S) -> HandlerResult<R::Id>
where
    R: Repository,
    S: Send + Sync,
{
    let Path(id) = Path::<R::Id>::from_request_parts(parts, state)
        .await
        .map_err(reject)?;
    Ok(id)
}

async fn json_body<S>(parts: &Parts, body: Body, state: &S) -> Result<Json<Value>, JsonRejection>
where
    S: Send + Sync,
{
    Json::<Value>::from_request(Request::from_parts(parts.clone(), body), state).await
}

/// Check the raw body against rules, then deserialize it into the schema. Anything that does not fit
/// the schema is a validation error.
fn decode_body<T, F>(body: Result<Json<Value>, JsonRejection>, check: F) -> Result<T, AppError>
where
    T: DeserializeOwned,
    F: FnOnce(&Map<String, Value>) -> Result<(), AppError>,
{
    let Json(value) = body?;
    let Value::Object(map) = &value else {
        return Err(AppError::BadRequest("body must be a JSON object".into()));
    };
    check(map)?;
    serde_json::from_value(value).map_err(|e| AppError::Validation(e.to_string()))
}

pub async fn list<R, S>(state: S, req: Request, default_limit: u32) -> HandlerResult<Json<Vec<R::Read>>>
where
    R: Repository + FromRequestParts<S>,
    S: Send + Sync,
{
    let (mut parts, _) = req.into_parts();
    let Query(params) = Query::<PageParams>::try_from_uri(&parts.uri).map_err(reject)?;
    let page = params.page(default_limit);
    let mut repo = repository::<R, S>(&mut parts, &state).await?;
    tracing::debug!(offset = page.offset, limit = page.limit, "list");
    let items = repo.list(page).await.map_err(reject)?;
    Ok(Json(items))
}

pub async fn read<R, S>(state: S, req: Request) -> HandlerResult<Json<R::Read>>
where
    R: Repository + FromRequestParts<S>,
    S: Send + Sync,
{
    let (mut parts, _) = req.into_parts();
    let id = item_id::<R, S>(&mut parts, &state).await?;
    let mut repo = repository::<R, S>(&mut parts, &state).await?;
    Ok(Json(repo.get(id).await.map_err(reject)?))
}

pub async fn create<R, S>(
    state: S,
    req: Request,
    rules: &FieldRules,
) -> HandlerResult<(StatusCode, Json<R::Read>)>
where
    R: Repository + FromRequestParts<S>,
    S: Send + Sync,
{
    let (mut parts, body) = req.into_parts();
    let body = json_body(&parts, body, &state).await;
    let payload: R::Create = decode_body(body, |m| rules.validate(m)).map_err(reject)?;
    let mut repo = repository::<R, S>(&mut parts, &state).await?;
    let created = repo.create(payload).await.map_err(reject)?;
    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn update<R, S>(state: S, req: Request, rules: &FieldRules) -> HandlerResult<Json<R::Read>>
where
    R: Repository + FromRequestParts<S>,
    S: Send + Sync,
{
    let (mut parts, body) = req.into_parts();
    let id = item_id::<R, S>(&mut parts, &state).await?;
    let body = json_body(&parts, body, &state).await;
    let payload: R::Update = decode_body(body, |m| rules.validate_partial(m)).map_err(reject)?;
    let mut repo = repository::<R, S>(&mut parts, &state).await?;
    Ok(Json(repo.update(id, payload).await.map_err(reject)?))
}

pub async fn delete<R, S>(state: S, req: Request) -> HandlerResult<Json<R::Read>>
where
    R: Repository + FromRequestParts<S>,
    S: Send + Sync,
{
    let (mut parts, _) = req.into_parts();
    let id = item_id::<R, S>(&mut parts, &state).await?;
    let mut repo = repository::<R, S>(&mut parts, &state).await?;
    Ok(Json(repo.delete(id).await.map_err(reject)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::FieldRule;
    use serde_json::json;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Label {
        label: String,
    }

    #[test]
    fn page_params_fall_back_to_default_limit() {
        let p = PageParams::default().page(10);
        assert_eq!(p, Page::new(0, 10));
        let p = PageParams {
            offset: Some(3),
            limit: Some(5),
        }
        .page(10);
        assert_eq!(p, Page::new(3, 5));
    }

    #[test]
    fn decode_body_deserializes_object() {
        let out: Label = decode_body(Ok(Json(json!({"label": "a"}))), |_| Ok(())).unwrap();
        assert_eq!(out, Label { label: "a".into() });
    }

    #[test]
    fn decode_body_rejects_non_object_and_schema_mismatch() {
        let err = decode_body::<Label, _>(Ok(Json(json!([1]))), |_| Ok(())).unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));

        let err = decode_body::<Label, _>(Ok(Json(json!({"label": 5}))), |_| Ok(())).unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn decode_body_runs_rules_first() {
        let rules = FieldRules::new().field("label", FieldRule::new().max_length(2));
        let err = decode_body::<Label, _>(Ok(Json(json!({"label": "abc"}))), |m| rules.validate(m))
            .unwrap_err();
        assert_eq!(err.to_string(), "validation: label must be at most 2 characters");
    }
}
