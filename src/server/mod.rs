//! HTTP Server
//!
//! JSON API over the vector store: status, document and problem upserts,
//! similarity query, and per-record CRUD. One shared state value carries
//! the store handle; errors map onto a uniform JSON error body.

pub mod routes;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::model::ValidationError;
use crate::store::{StoreError, VectorStore};

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn VectorStore>,
}

/// Build the application router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/status", get(routes::status))
        .route("/documents", post(routes::create_document))
        .route("/problems", post(routes::create_problem))
        .route("/query", post(routes::query))
        .route(
            "/documents/{id}",
            get(routes::get_document)
                .put(routes::update_document)
                .delete(routes::delete_document),
        )
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Bind and serve until the process is stopped.
pub async fn serve(addr: SocketAddr, state: AppState) -> anyhow::Result<()> {
    let app = router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(addr = %addr, "API server listening");
    axum::serve(listener, app).await?;
    Ok(())
}

/// API-surface error with its HTTP mapping. The JSON body shape is the same
/// for every failure: `{"status": "error", "message": "..."}`.
#[derive(Debug)]
pub enum ApiError {
    Validation(String),
    Store(StoreError),
}

impl From<ValidationError> for ApiError {
    fn from(e: ValidationError) -> Self {
        ApiError::Validation(e.to_string())
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        ApiError::Store(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::Validation(message) => (StatusCode::BAD_REQUEST, message),
            ApiError::Store(e) => {
                let status = match &e {
                    StoreError::NotFound(_) => StatusCode::NOT_FOUND,
                    StoreError::InvalidRecord(_) => StatusCode::UNPROCESSABLE_ENTITY,
                    StoreError::Embedding(_) | StoreError::Unreachable(_) => {
                        StatusCode::BAD_GATEWAY
                    }
                    StoreError::Backend(_) => StatusCode::INTERNAL_SERVER_ERROR,
                };
                (status, e.to_string())
            }
        };
        let body = Json(json!({ "status": "error", "message": message }));
        (status, body).into_response()
    }
}
