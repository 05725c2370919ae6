//! Reference implementation of the saved-names API.
//!
//! ## Endpoints
//! - `GET /api/getNames` - caller's saved names (`200`, or `401`)
//! - `POST /api/saveNames` - insert `{ "names": [...] }` (`201`, `400`, `401`, `500`)
//!
//! Any other method on either path gets `405` with an `Allow` header.

pub mod auth;
pub mod store;

use crate::model::{SavedRecord, ServerConfig};
use anyhow::{Context, Result};
use auth::TokenTable;
use axum::{
    body::Bytes,
    extract::{Json, State},
    http::{header, HeaderMap, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use store::{JsonNameStore, NameStore};

pub struct AppState {
    pub tokens: TokenTable,
    pub store: Arc<dyn NameStore>,
}

/// Errors mapped to the API's status codes and `{ "error": ... }` bodies.
#[derive(Debug)]
pub enum ApiError {
    Unauthorized,
    BadRequest,
    /// Carries the client-facing message; details are logged where they occur.
    Internal(&'static str),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ApiError::Unauthorized => (StatusCode::UNAUTHORIZED, "Authentication failed"),
            ApiError::BadRequest => (
                StatusCode::BAD_REQUEST,
                "Names are required and should be an array",
            ),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, *msg),
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

fn method_not_allowed(method: Method, allow: &'static str) -> Response {
    (
        StatusCode::METHOD_NOT_ALLOWED,
        [(header::ALLOW, allow)],
        format!("Method {method} Not Allowed"),
    )
        .into_response()
}

async fn get_only(method: Method) -> Response {
    method_not_allowed(method, "GET")
}

async fn post_only(method: Method) -> Response {
    method_not_allowed(method, "POST")
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/getNames", get(get_names).fallback(get_only))
        .route("/api/saveNames", post(save_names).fallback(post_only))
        .with_state(state)
}

async fn get_names(
    State(app): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<Vec<SavedRecord>>, ApiError> {
    let user = app.tokens.authenticate(&headers).map_err(|e| {
        tracing::warn!(error = %e, "getNames rejected");
        ApiError::Unauthorized
    })?;
    let rows = app.store.list(user).await.map_err(|source| {
        tracing::error!(error = %source, "Error fetching names");
        ApiError::Internal("Error fetching names")
    })?;
    Ok(Json(rows))
}

/// Pull `names` out of the body. Only a missing or non-array `names` is a 400;
/// what is inside the array is the insert's problem.
fn parse_names(body: &[u8]) -> Result<Vec<Value>, ApiError> {
    let value: Value = serde_json::from_slice(body).map_err(|_| ApiError::BadRequest)?;
    match value.get("names") {
        Some(Value::Array(items)) => Ok(items.clone()),
        _ => Err(ApiError::BadRequest),
    }
}

/// Names go into a text column as given; anything that is not a string fails the insert.
fn name_rows(items: Vec<Value>) -> Result<Vec<String>, ApiError> {
    items
        .into_iter()
        .map(|v| match v {
            Value::String(s) => Ok(s),
            other => {
                tracing::error!(value = %other, "Error saving names: name is not a string");
                Err(ApiError::Internal("Error saving names"))
            }
        })
        .collect()
}

async fn save_names(
    State(app): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, Json<Vec<SavedRecord>>), ApiError> {
    let user = app.tokens.authenticate(&headers).map_err(|e| {
        tracing::warn!(error = %e, "saveNames rejected");
        ApiError::Unauthorized
    })?;
    let names = name_rows(parse_names(&body)?)?;
    let rows = app.store.insert(user, &names).await.map_err(|source| {
        tracing::error!(error = %source, "Error saving names");
        ApiError::Internal("Error saving names")
    })?;
    tracing::info!(%user, count = rows.len(), "saved names");
    Ok((StatusCode::CREATED, Json(rows)))
}

/// Bind and serve until Ctrl-C.
pub async fn serve(cfg: ServerConfig) -> Result<()> {
    let store: Arc<dyn NameStore> = match &cfg.store_path {
        Some(path) => Arc::new(
            JsonNameStore::open(path)
                .with_context(|| format!("open name store {}", path.display()))?,
        ),
        None => Arc::new(JsonNameStore::in_memory()),
    };
    if cfg.tokens.is_empty() {
        tracing::warn!("no tokens configured; every request will get 401");
    }
    let state = Arc::new(AppState {
        tokens: TokenTable::new(cfg.tokens.clone()),
        store,
    });

    let listener = tokio::net::TcpListener::bind(cfg.bind)
        .await
        .with_context(|| format!("bind {}", cfg.bind))?;
    tracing::info!("saved-names API listening on http://{}", cfg.bind);

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("shutting down");
        })
        .await
        .context("serve saved-names API")
}
