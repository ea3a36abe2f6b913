//! Vector Store
//!
//! One interface over two interchangeable backends: an embedded local table
//! with a cosine scan, and a remote Chroma-style REST service. Callers see
//! identical behavior and one error taxonomy regardless of backend.
//!
//! Similarity is cosine end-to-end. Embeddings are unit-normalized by the
//! provider, so ranking uses a plain dot product; the `distance` reported to
//! callers is `1 - similarity`. Ties are broken by ascending record id so
//! query results are deterministic in both backends.

pub mod local;
pub mod remote;

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::{Backend, Config};
use crate::embedding::{EmbeddingError, EmbeddingProvider};
use crate::model::{Difficulty, DocumentMetadata, DocumentType, RecordDraft, VectorRecord};

pub use local::LocalStore;
pub use remote::RemoteStore;

/// Default result count for similarity queries.
pub const DEFAULT_QUERY_LIMIT: usize = 5;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Record not found: {0}")]
    NotFound(String),
    #[error("Embedding error: {0}")]
    Embedding(#[from] EmbeddingError),
    #[error("Storage backend unreachable: {0}")]
    Unreachable(String),
    #[error("Storage backend error: {0}")]
    Backend(String),
    #[error("Invalid record: {0}")]
    InvalidRecord(String),
}

/// Exact-match metadata filter. Only the given fields constrain the query;
/// an empty filter matches everything.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryFilter {
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub doc_type: Option<DocumentType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub difficulty: Option<Difficulty>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vetted: Option<bool>,
}

impl QueryFilter {
    pub fn is_empty(&self) -> bool {
        self.doc_type.is_none()
            && self.subject.is_none()
            && self.level.is_none()
            && self.topic.is_none()
            && self.difficulty.is_none()
            && self.source.is_none()
            && self.year.is_none()
            && self.vetted.is_none()
    }

    pub fn matches(&self, metadata: &DocumentMetadata) -> bool {
        if let Some(t) = self.doc_type {
            if metadata.doc_type != t {
                return false;
            }
        }
        if let Some(ref s) = self.subject {
            if &metadata.subject != s {
                return false;
            }
        }
        if let Some(ref l) = self.level {
            if &metadata.level != l {
                return false;
            }
        }
        if let Some(ref t) = self.topic {
            if &metadata.topic != t {
                return false;
            }
        }
        if let Some(d) = self.difficulty {
            if metadata.difficulty != d {
                return false;
            }
        }
        if let Some(ref s) = self.source {
            if &metadata.source != s {
                return false;
            }
        }
        if let Some(y) = self.year {
            if metadata.year != y {
                return false;
            }
        }
        if let Some(v) = self.vetted {
            if metadata.vetted != v {
                return false;
            }
        }
        true
    }
}

/// One ranked query result. `distance` is cosine distance
/// (`1 - similarity`); smaller is closer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryHit {
    pub id: String,
    pub content: String,
    pub metadata: DocumentMetadata,
    pub distance: f32,
}

/// Collection summary reported by `GET /status`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionStatus {
    pub name: String,
    pub count: u64,
    pub embedding_model: String,
}

/// Keyed record store with similarity query. Both adapters implement the
/// same contract:
/// - `put` upserts atomically (embedding + metadata together), refreshes
///   `last_modified` and preserves an existing record's `date_added`
/// - `delete` is idempotent; a deleted id never appears in `get` or `query`
/// - `query` with a filter matching nothing returns an empty list
#[async_trait]
pub trait VectorStore: Send + Sync {
    async fn put(&self, draft: RecordDraft) -> Result<String, StoreError>;
    async fn get(&self, id: &str) -> Result<VectorRecord, StoreError>;
    async fn delete(&self, id: &str) -> Result<(), StoreError>;
    async fn query(
        &self,
        text: &str,
        filter: &QueryFilter,
        limit: usize,
    ) -> Result<Vec<QueryHit>, StoreError>;
    async fn count(&self) -> Result<u64, StoreError>;
    async fn status(&self) -> Result<CollectionStatus, StoreError>;
}

/// Open the store selected by configuration.
pub async fn open_store(
    config: &Config,
    provider: Arc<EmbeddingProvider>,
) -> Result<Arc<dyn VectorStore>, StoreError> {
    match config.backend {
        Backend::Local => {
            let store = LocalStore::open(&config.data_dir, &config.collection, provider)?;
            Ok(Arc::new(store))
        }
        Backend::Remote => {
            let store = RemoteStore::new(&config.remote_url, &config.collection, provider);
            Ok(Arc::new(store))
        }
    }
}
