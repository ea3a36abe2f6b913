//! Route Handlers
//!
//! Request/response shapes mirror the store model with camelCase keys.
//! Upserts accept caller-supplied ids so records can be updated in place;
//! missing ids get a type-prefixed ULID.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};
use ulid::Ulid;

use crate::model::{
    DocumentMetadata, PartialMetadata, RecordDraft, Solution, ValidationError, VectorRecord,
};
use crate::store::{QueryFilter, DEFAULT_QUERY_LIMIT};

use super::{ApiError, AppState};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpsertDocumentRequest {
    #[serde(default)]
    pub id: Option<String>,
    pub content: String,
    pub metadata: PartialMetadata,
    #[serde(default)]
    pub vetted: bool,
    #[serde(default)]
    pub vetted_by: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpsertProblemRequest {
    #[serde(default)]
    pub id: Option<String>,
    pub question: String,
    pub solution: Solution,
    pub metadata: PartialMetadata,
    #[serde(default)]
    pub vetted: bool,
    #[serde(default)]
    pub vetted_by: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryRequest {
    pub query: String,
    #[serde(default)]
    pub filter: QueryFilter,
    #[serde(default)]
    pub limit: Option<usize>,
}

/// Promote upload metadata to a full record, applying the vetting rule:
/// a vetted record must name who vetted it.
fn build_metadata(
    partial: PartialMetadata,
    vetted: bool,
    vetted_by: Option<String>,
) -> Result<DocumentMetadata, ApiError> {
    partial.validate()?;
    let mut metadata = partial.into_metadata(Utc::now());
    if vetted {
        let actor = vetted_by.ok_or(ValidationError::MissingVettedBy)?;
        metadata.approve(&actor);
    }
    Ok(metadata)
}

pub async fn status(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let collection = state.store.status().await?;
    Ok(Json(json!({ "status": "ok", "collection": collection })))
}

pub async fn create_document(
    State(state): State<AppState>,
    Json(request): Json<UpsertDocumentRequest>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let metadata = build_metadata(request.metadata, request.vetted, request.vetted_by)?;
    let id = request
        .id
        .unwrap_or_else(|| format!("{}_{}", metadata.doc_type.as_str(), Ulid::new()));

    let stored = state
        .store
        .put(RecordDraft {
            id,
            content: request.content,
            metadata,
            solution: None,
        })
        .await?;
    Ok((StatusCode::CREATED, Json(json!({ "id": stored }))))
}

pub async fn create_problem(
    State(state): State<AppState>,
    Json(request): Json<UpsertProblemRequest>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let metadata = build_metadata(request.metadata, request.vetted, request.vetted_by)?;
    let id = request
        .id
        .unwrap_or_else(|| format!("{}_{}", metadata.doc_type.as_str(), Ulid::new()));

    let stored = state
        .store
        .put(RecordDraft {
            id,
            content: request.question,
            metadata,
            solution: Some(request.solution),
        })
        .await?;
    Ok((StatusCode::CREATED, Json(json!({ "id": stored }))))
}

pub async fn query(
    State(state): State<AppState>,
    Json(request): Json<QueryRequest>,
) -> Result<Json<Value>, ApiError> {
    let limit = request.limit.unwrap_or(DEFAULT_QUERY_LIMIT);
    let results = state
        .store
        .query(&request.query, &request.filter, limit)
        .await?;
    Ok(Json(json!({ "results": results })))
}

pub async fn get_document(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<VectorRecord>, ApiError> {
    Ok(Json(state.store.get(&id).await?))
}

pub async fn update_document(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<UpsertDocumentRequest>,
) -> Result<Json<Value>, ApiError> {
    // Existence check first so an unknown id is a 404, not a create
    state.store.get(&id).await?;

    let metadata = build_metadata(request.metadata, request.vetted, request.vetted_by)?;
    let stored = state
        .store
        .put(RecordDraft {
            id,
            content: request.content,
            metadata,
            solution: None,
        })
        .await?;
    Ok(Json(json!({ "id": stored })))
}

pub async fn delete_document(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    state.store.delete(&id).await?;
    Ok(Json(json!({ "success": true })))
}
