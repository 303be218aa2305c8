//! `/articles` handlers.

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::Response;
use serde::Deserialize;

use folio_shared::{Article, ArticleId, ArticlePatch, ArticleResponse};

use crate::error::{ApiError, parse_id};
use crate::{AppState, with_cursor};

#[derive(Debug, Deserialize)]
pub(crate) struct ListParams {
    cursor: Option<String>,
    limit: Option<String>,
}

pub(crate) async fn list(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Result<Response, ApiError> {
    // Unparseable or zero limits fall back to the configured default.
    let limit = params.limit.as_deref().and_then(|l| l.parse::<u32>().ok());
    let page = state.articles.fetch(params.cursor.as_deref(), limit).await?;
    Ok(with_cursor(page.items, page.next_cursor))
}

pub(crate) async fn create(
    State(state): State<AppState>,
    payload: Result<Json<Article>, JsonRejection>,
) -> Result<(StatusCode, Json<Article>), ApiError> {
    let Json(article) = payload?;
    let stored = state.articles.store(article).await?;
    Ok((StatusCode::CREATED, Json(stored)))
}

pub(crate) async fn get_by_id(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ArticleResponse>, ApiError> {
    let id: ArticleId = parse_id(&id)?;
    Ok(Json(state.articles.get_by_id(id).await?))
}

pub(crate) async fn get_by_slug(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<Json<ArticleResponse>, ApiError> {
    Ok(Json(state.articles.get_by_slug(&slug).await?))
}

pub(crate) async fn patch(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<ArticlePatch>, JsonRejection>,
) -> Result<Json<ArticleResponse>, ApiError> {
    let id: ArticleId = parse_id(&id)?;
    let Json(patch) = payload?;
    Ok(Json(state.articles.update_partial(id, patch).await?))
}

pub(crate) async fn replace(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<Article>, JsonRejection>,
) -> Result<Json<Article>, ApiError> {
    let id: ArticleId = parse_id(&id)?;
    let Json(mut article) = payload?;
    article.id = id;
    Ok(Json(state.articles.update(article).await?))
}

pub(crate) async fn delete(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let id: ArticleId = parse_id(&id)?;
    state.articles.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
