//! Remote Vector Store
//!
//! Adapter for a Chroma-style REST service. Uses reqwest directly instead
//! of third-party wrapper crates for stability and full API control.
//! Embeddings are generated locally by the shared provider and shipped with
//! every write and query, so ranking is identical to the embedded backend.
//! Transport failures surface as `StoreError::Unreachable`; application
//! errors reported by the service surface as `StoreError::Backend`.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::OnceCell;
use tracing::{debug, info};

use super::{CollectionStatus, QueryFilter, QueryHit, StoreError, VectorStore};
use crate::embedding::EmbeddingProvider;
use crate::model::{DocumentMetadata, RecordDraft, Solution, VectorRecord};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Deserialize)]
struct RemoteCollection {
    id: String,
}

#[derive(Debug, Deserialize)]
struct RemoteGetResult {
    ids: Vec<String>,
    documents: Option<Vec<Option<String>>>,
    metadatas: Option<Vec<Option<Value>>>,
    embeddings: Option<Vec<Vec<f32>>>,
}

#[derive(Debug, Deserialize)]
struct RemoteQueryResult {
    ids: Vec<Vec<String>>,
    documents: Option<Vec<Vec<Option<String>>>>,
    metadatas: Option<Vec<Vec<Option<Value>>>>,
    distances: Option<Vec<Vec<f32>>>,
}

pub struct RemoteStore {
    http: Client,
    base_url: String,
    tenant: String,
    database: String,
    collection_name: String,
    provider: Arc<EmbeddingProvider>,
    collection_id: OnceCell<String>,
}

impl RemoteStore {
    pub fn new(base_url: &str, collection: &str, provider: Arc<EmbeddingProvider>) -> Self {
        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .unwrap_or_else(|_| Client::new());
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            tenant: "default_tenant".to_string(),
            database: "default_database".to_string(),
            collection_name: collection.to_string(),
            provider,
            collection_id: OnceCell::new(),
        }
    }

    fn transport_error(e: reqwest::Error) -> StoreError {
        if e.is_connect() || e.is_timeout() {
            StoreError::Unreachable(e.to_string())
        } else {
            StoreError::Backend(e.to_string())
        }
    }

    /// Resolve (and cache) the collection id, creating the collection with
    /// cosine space on first use.
    async fn collection_id(&self) -> Result<&str, StoreError> {
        self.collection_id
            .get_or_try_init(|| async {
                let body = json!({
                    "name": self.collection_name,
                    "get_or_create": true,
                    "metadata": { "hnsw:space": "cosine" },
                });
                let resp = self
                    .http
                    .post(format!(
                        "{}/api/v1/tenants/{}/databases/{}/collections",
                        self.base_url, self.tenant, self.database
                    ))
                    .json(&body)
                    .send()
                    .await
                    .map_err(Self::transport_error)?;

                let status = resp.status();
                let text = resp.text().await.map_err(Self::transport_error)?;
                if !status.is_success() {
                    return Err(StoreError::Backend(format!(
                        "create collection failed ({status}): {text}"
                    )));
                }

                let collection: RemoteCollection = serde_json::from_str(&text)
                    .map_err(|e| StoreError::Backend(format!("parse collection: {e}")))?;
                info!(name = %self.collection_name, id = %collection.id, "Collection get_or_create");
                Ok(collection.id)
            })
            .await
            .map(String::as_str)
    }

    async fn fetch_raw(&self, ids: Vec<String>) -> Result<RemoteGetResult, StoreError> {
        let collection_id = self.collection_id().await?;
        let body = json!({
            "ids": ids,
            "include": ["documents", "metadatas", "embeddings"],
        });
        let resp = self
            .http
            .post(format!(
                "{}/api/v1/collections/{}/get",
                self.base_url, collection_id
            ))
            .json(&body)
            .send()
            .await
            .map_err(Self::transport_error)?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(StoreError::Backend(format!("get failed ({status}): {text}")));
        }

        resp.json()
            .await
            .map_err(|e| StoreError::Backend(format!("parse get result: {e}")))
    }
}

/// Flatten a record's metadata (plus an optional solution) into the scalar
/// map the remote service stores. Dates become ISO-8601 strings; solution
/// steps are JSON-encoded into one field.
fn wire_metadata(
    metadata: &DocumentMetadata,
    solution: Option<&Solution>,
) -> Result<Value, StoreError> {
    let mut meta = serde_json::to_value(metadata)
        .map_err(|e| StoreError::InvalidRecord(format!("serialize metadata: {e}")))?;
    if let Some(solution) = solution {
        let steps = serde_json::to_string(&solution.steps)
            .map_err(|e| StoreError::InvalidRecord(format!("serialize solution: {e}")))?;
        meta["solutionSteps"] = json!(steps);
        meta["finalAnswer"] = json!(solution.final_answer);
    }
    Ok(meta)
}

/// Inverse of [`wire_metadata`].
fn record_from_wire(
    id: String,
    content: String,
    mut meta: Value,
    embedding: Vec<f32>,
) -> Result<VectorRecord, StoreError> {
    let solution = match meta.as_object_mut() {
        Some(obj) => {
            let steps = obj.remove("solutionSteps");
            let answer = obj.remove("finalAnswer");
            match (steps, answer) {
                (Some(steps), Some(answer)) => {
                    let steps: Vec<String> =
                        serde_json::from_str(steps.as_str().unwrap_or("[]")).map_err(|e| {
                            StoreError::Backend(format!("parse solution steps for {id}: {e}"))
                        })?;
                    Some(Solution {
                        steps,
                        final_answer: answer.as_str().unwrap_or_default().to_string(),
                    })
                }
                _ => None,
            }
        }
        None => None,
    };

    let metadata: DocumentMetadata = serde_json::from_value(meta)
        .map_err(|e| StoreError::Backend(format!("parse metadata for {id}: {e}")))?;

    Ok(VectorRecord {
        id,
        content,
        metadata,
        solution,
        embedding,
    })
}

/// Translate an exact-match filter into the service's `where` clause.
fn where_clause(filter: &QueryFilter) -> Option<Value> {
    let mut clauses = Vec::new();
    if let Some(t) = filter.doc_type {
        clauses.push(json!({ "type": { "$eq": t.as_str() } }));
    }
    if let Some(ref s) = filter.subject {
        clauses.push(json!({ "subject": { "$eq": s } }));
    }
    if let Some(ref l) = filter.level {
        clauses.push(json!({ "level": { "$eq": l } }));
    }
    if let Some(ref t) = filter.topic {
        clauses.push(json!({ "topic": { "$eq": t } }));
    }
    if let Some(d) = filter.difficulty {
        clauses.push(json!({ "difficulty": { "$eq": d.as_str() } }));
    }
    if let Some(ref s) = filter.source {
        clauses.push(json!({ "source": { "$eq": s } }));
    }
    if let Some(y) = filter.year {
        clauses.push(json!({ "year": { "$eq": y } }));
    }
    if let Some(v) = filter.vetted {
        clauses.push(json!({ "vetted": { "$eq": v } }));
    }

    match clauses.len() {
        0 => None,
        1 => clauses.pop(),
        _ => Some(json!({ "$and": clauses })),
    }
}

#[async_trait]
impl VectorStore for RemoteStore {
    async fn put(&self, draft: RecordDraft) -> Result<String, StoreError> {
        let embedding = self.provider.generate_embedding(&draft.content).await?;

        let mut metadata = draft.metadata;
        metadata.last_modified = Utc::now();

        // date_added is immutable: carry the existing record's value forward.
        let existing = self.fetch_raw(vec![draft.id.clone()]).await?;
        if !existing.ids.is_empty() {
            let prior_added = existing
                .metadatas
                .as_ref()
                .and_then(|m| m.first())
                .and_then(|m| m.as_ref())
                .and_then(|m| m.get("dateAdded"))
                .and_then(|v| v.as_str())
                .and_then(|s| s.parse::<DateTime<Utc>>().ok());
            if let Some(added) = prior_added {
                metadata.date_added = added;
            }
        }

        let meta = wire_metadata(&metadata, draft.solution.as_ref())?;
        let collection_id = self.collection_id().await?;
        let body = json!({
            "ids": [draft.id],
            "documents": [draft.content],
            "embeddings": [embedding],
            "metadatas": [meta],
        });

        let resp = self
            .http
            .post(format!(
                "{}/api/v1/collections/{}/upsert",
                self.base_url, collection_id
            ))
            .json(&body)
            .send()
            .await
            .map_err(Self::transport_error)?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(StoreError::Backend(format!(
                "upsert failed ({status}): {text}"
            )));
        }

        debug!(id = %draft.id, "Upserted record");
        Ok(draft.id)
    }

    async fn get(&self, id: &str) -> Result<VectorRecord, StoreError> {
        let result = self.fetch_raw(vec![id.to_string()]).await?;
        if result.ids.is_empty() {
            return Err(StoreError::NotFound(id.to_string()));
        }

        let content = result
            .documents
            .as_ref()
            .and_then(|d| d.first())
            .and_then(|d| d.clone())
            .unwrap_or_default();
        let meta = result
            .metadatas
            .as_ref()
            .and_then(|m| m.first())
            .and_then(|m| m.clone())
            .unwrap_or(Value::Null);
        let embedding = result
            .embeddings
            .as_ref()
            .and_then(|e| e.first())
            .cloned()
            .unwrap_or_default();

        record_from_wire(id.to_string(), content, meta, embedding)
    }

    async fn delete(&self, id: &str) -> Result<(), StoreError> {
        let collection_id = self.collection_id().await?;
        let resp = self
            .http
            .post(format!(
                "{}/api/v1/collections/{}/delete",
                self.base_url, collection_id
            ))
            .json(&json!({ "ids": [id] }))
            .send()
            .await
            .map_err(Self::transport_error)?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(StoreError::Backend(format!(
                "delete failed ({status}): {text}"
            )));
        }

        debug!(id = %id, "Deleted record");
        Ok(())
    }

    async fn query(
        &self,
        text: &str,
        filter: &QueryFilter,
        limit: usize,
    ) -> Result<Vec<QueryHit>, StoreError> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        let total = self.count().await?;
        if total == 0 {
            return Ok(Vec::new());
        }

        let query_embedding = self.provider.generate_embedding(text).await?;
        let collection_id = self.collection_id().await?;

        let mut body = json!({
            "query_embeddings": [query_embedding],
            "n_results": limit.min(total as usize),
            "include": ["documents", "metadatas", "distances"],
        });
        if let Some(clause) = where_clause(filter) {
            body["where"] = clause;
        }

        let resp = self
            .http
            .post(format!(
                "{}/api/v1/collections/{}/query",
                self.base_url, collection_id
            ))
            .json(&body)
            .send()
            .await
            .map_err(Self::transport_error)?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(StoreError::Backend(format!(
                "query failed ({status}): {text}"
            )));
        }

        let result: RemoteQueryResult = resp
            .json()
            .await
            .map_err(|e| StoreError::Backend(format!("parse query result: {e}")))?;

        let mut hits = Vec::new();
        for (query_idx, ids) in result.ids.iter().enumerate() {
            for (result_idx, id) in ids.iter().enumerate() {
                let content = result
                    .documents
                    .as_ref()
                    .and_then(|d| d.get(query_idx))
                    .and_then(|d| d.get(result_idx))
                    .and_then(|d| d.clone())
                    .unwrap_or_default();
                let meta = result
                    .metadatas
                    .as_ref()
                    .and_then(|m| m.get(query_idx))
                    .and_then(|m| m.get(result_idx))
                    .and_then(|m| m.clone())
                    .unwrap_or(Value::Null);
                let distance = result
                    .distances
                    .as_ref()
                    .and_then(|d| d.get(query_idx))
                    .and_then(|d| d.get(result_idx))
                    .copied()
                    .unwrap_or(f32::MAX);

                let record = record_from_wire(id.clone(), content, meta, Vec::new())?;
                hits.push(QueryHit {
                    id: record.id,
                    content: record.content,
                    metadata: record.metadata,
                    distance,
                });
            }
        }

        // The service already ranks by distance; re-sort with the id
        // tie-break so ordering matches the embedded backend exactly.
        hits.sort_by(|a, b| {
            a.distance
                .partial_cmp(&b.distance)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.id.cmp(&b.id))
        });
        hits.truncate(limit);
        Ok(hits)
    }

    async fn count(&self) -> Result<u64, StoreError> {
        let collection_id = self.collection_id().await?;
        let resp = self
            .http
            .get(format!(
                "{}/api/v1/collections/{}/count",
                self.base_url, collection_id
            ))
            .send()
            .await
            .map_err(Self::transport_error)?;

        if !resp.status().is_success() {
            return Err(StoreError::Backend(format!(
                "count failed: {}",
                resp.status()
            )));
        }

        resp.json()
            .await
            .map_err(|e| StoreError::Backend(format!("parse count: {e}")))
    }

    async fn status(&self) -> Result<CollectionStatus, StoreError> {
        Ok(CollectionStatus {
            name: self.collection_name.clone(),
            count: self.count().await?,
            embedding_model: self.provider.model_name().to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Difficulty, DocumentType, PartialMetadata};

    fn metadata() -> DocumentMetadata {
        PartialMetadata {
            doc_type: DocumentType::Exam,
            title: "Paper 1".to_string(),
            subject: "Mathematics".to_string(),
            level: "A-Level".to_string(),
            topic: "Calculus".to_string(),
            subtopic: None,
            difficulty: Difficulty::Hard,
            source: "CIE".to_string(),
            year: 2021,
            paper: Some("P1".to_string()),
            chapter: None,
        }
        .into_metadata(Utc::now())
    }

    #[test]
    fn test_wire_metadata_round_trip_with_solution() {
        let meta = metadata();
        let solution = Solution {
            steps: vec!["differentiate".to_string(), "substitute".to_string()],
            final_answer: "x = 2".to_string(),
        };

        let wire = wire_metadata(&meta, Some(&solution)).unwrap();
        assert_eq!(wire["type"], "exam");
        assert!(wire["solutionSteps"].is_string());

        let record =
            record_from_wire("p1".to_string(), "question text".to_string(), wire, Vec::new())
                .unwrap();
        assert_eq!(record.metadata, meta);
        assert_eq!(record.solution.unwrap(), solution);
    }

    #[test]
    fn test_wire_metadata_without_solution() {
        let wire = wire_metadata(&metadata(), None).unwrap();
        let record = record_from_wire("d1".to_string(), "text".to_string(), wire, Vec::new())
            .unwrap();
        assert!(record.solution.is_none());
    }

    #[test]
    fn test_where_clause_shapes() {
        assert!(where_clause(&QueryFilter::default()).is_none());

        let single = QueryFilter {
            doc_type: Some(DocumentType::Exam),
            ..Default::default()
        };
        assert_eq!(
            where_clause(&single).unwrap(),
            json!({ "type": { "$eq": "exam" } })
        );

        let multi = QueryFilter {
            doc_type: Some(DocumentType::Exam),
            year: Some(2021),
            ..Default::default()
        };
        let clause = where_clause(&multi).unwrap();
        assert_eq!(clause["$and"].as_array().unwrap().len(), 2);
    }
}
