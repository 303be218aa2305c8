//! HTTP API for Folio, built on axum.
//!
//! [`router`] wires the article and category handlers over an [`AppState`];
//! [`serve`] runs it on a bound listener until Ctrl-C.

mod articles;
mod categories;
pub mod cors;
pub mod error;

use std::sync::Arc;

use axum::http::{HeaderName, HeaderValue};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router, middleware};
use serde::Serialize;
use tokio::net::TcpListener;
use tracing::info;

use folio_core::{ArticleService, CategoryService};

pub use cors::CorsConfig;
pub use error::{ApiError, ErrorBody};

/// Response header carrying the cursor for the next page.
pub const X_CURSOR: HeaderName = HeaderName::from_static("x-cursor");

/// Services shared by every handler.
#[derive(Clone)]
pub struct AppState {
    pub articles: ArticleService,
    pub categories: CategoryService,
}

/// Build the full API router.
pub fn router(state: AppState, cors: CorsConfig) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/articles", get(articles::list).post(articles::create))
        .route(
            "/articles/:id",
            get(articles::get_by_id)
                .patch(articles::patch)
                .put(articles::replace)
                .delete(articles::delete),
        )
        .route("/articles/slug/:slug", get(articles::get_by_slug))
        .route("/categories", get(categories::list).post(categories::create))
        .route("/categories/tree", get(categories::tree))
        .route("/categories/roots", get(categories::roots))
        .route("/categories/id/:id", get(categories::get_by_id))
        .route(
            "/categories/:key",
            get(categories::get_by_slug)
                .put(categories::replace)
                .delete(categories::delete),
        )
        .route("/categories/:key/children", get(categories::children))
        .layer(middleware::from_fn_with_state(Arc::new(cors), cors::cors))
        .with_state(state)
}

/// Serve `app` on `listener` until Ctrl-C.
pub async fn serve(listener: TcpListener, app: Router) -> std::io::Result<()> {
    let local_addr = listener.local_addr()?;
    info!(%local_addr, "serving HTTP API");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

/// JSON list response with the `X-Cursor` header set when there is a next page.
pub(crate) fn with_cursor<T: Serialize>(items: Vec<T>, cursor: Option<String>) -> Response {
    let mut response = Json(items).into_response();
    if let Some(value) = cursor.and_then(|c| HeaderValue::from_str(&c).ok()) {
        response.headers_mut().insert(X_CURSOR, value);
    }
    response
}
