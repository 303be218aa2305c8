//! `/categories` handlers.
//!
//! `GET /categories/:key` treats the key as a slug; `PUT` and `DELETE` on
//! the same path treat it as an id.

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::Response;
use serde::Deserialize;

use folio_shared::{Category, CategoryId};

use crate::error::{ApiError, parse_id};
use crate::{AppState, with_cursor};

#[derive(Debug, Deserialize)]
pub(crate) struct ListParams {
    cursor: Option<String>,
    num: Option<String>,
}

pub(crate) async fn list(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Result<Response, ApiError> {
    let num = params.num.as_deref().and_then(|n| n.parse::<u32>().ok());
    let page = state.categories.fetch(params.cursor.as_deref(), num).await?;
    Ok(with_cursor(page.items, page.next_cursor))
}

pub(crate) async fn tree(State(state): State<AppState>) -> Result<Json<Vec<Category>>, ApiError> {
    Ok(Json(state.categories.tree().await?))
}

pub(crate) async fn roots(State(state): State<AppState>) -> Result<Json<Vec<Category>>, ApiError> {
    Ok(Json(state.categories.roots().await?))
}

pub(crate) async fn create(
    State(state): State<AppState>,
    payload: Result<Json<Category>, JsonRejection>,
) -> Result<(StatusCode, Json<Category>), ApiError> {
    let Json(category) = payload?;
    let stored = state.categories.store(category).await?;
    Ok((StatusCode::CREATED, Json(stored)))
}

pub(crate) async fn get_by_slug(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<Json<Category>, ApiError> {
    Ok(Json(state.categories.get_with_children(&slug).await?))
}

pub(crate) async fn get_by_id(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Category>, ApiError> {
    let id: CategoryId = parse_id(&id)?;
    Ok(Json(state.categories.get_by_id(id).await?))
}

pub(crate) async fn children(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<Json<Vec<Category>>, ApiError> {
    Ok(Json(state.categories.children_of_slug(&slug).await?))
}

pub(crate) async fn replace(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<Category>, JsonRejection>,
) -> Result<Json<Category>, ApiError> {
    let id: CategoryId = parse_id(&id)?;
    let Json(mut category) = payload?;
    category.id = id;
    Ok(Json(state.categories.update(category).await?))
}

pub(crate) async fn delete(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let id: CategoryId = parse_id(&id)?;
    state.categories.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
