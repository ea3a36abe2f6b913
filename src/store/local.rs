//! Embedded Vector Store
//!
//! In-process record table with a cosine similarity scan, persisted as a
//! JSON snapshot. Writes go through an atomic tmp-then-rename so a crash
//! mid-write never corrupts the snapshot, and an upsert is observable only
//! as fully applied or not at all.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use tracing::{debug, info};

use super::{CollectionStatus, QueryFilter, QueryHit, StoreError, VectorStore};
use crate::embedding::EmbeddingProvider;
use crate::model::{RecordDraft, VectorRecord};

pub struct LocalStore {
    provider: Arc<EmbeddingProvider>,
    collection: String,
    /// Snapshot path; `None` keeps the table memory-only (tests).
    path: Option<PathBuf>,
    /// Keyed by id; BTreeMap iteration order doubles as the deterministic
    /// tie-break for equal similarities.
    records: RwLock<BTreeMap<String, VectorRecord>>,
}

impl LocalStore {
    /// Open (or create) the collection snapshot under `data_dir`.
    pub fn open(
        data_dir: &Path,
        collection: &str,
        provider: Arc<EmbeddingProvider>,
    ) -> Result<Self, StoreError> {
        fs::create_dir_all(data_dir)
            .map_err(|e| StoreError::Backend(format!("create data dir: {e}")))?;
        let path = data_dir.join(format!("{collection}.json"));

        let mut records = BTreeMap::new();
        if path.exists() {
            let raw = fs::read_to_string(&path)
                .map_err(|e| StoreError::Backend(format!("read snapshot: {e}")))?;
            let loaded: Vec<VectorRecord> = serde_json::from_str(&raw)
                .map_err(|e| StoreError::Backend(format!("parse snapshot: {e}")))?;
            for record in loaded {
                if record.embedding.len() != provider.dimension() {
                    return Err(StoreError::Backend(format!(
                        "snapshot record {} has dimension {}, store is configured for {}",
                        record.id,
                        record.embedding.len(),
                        provider.dimension()
                    )));
                }
                records.insert(record.id.clone(), record);
            }
            info!(collection = %collection, count = records.len(), "Loaded collection snapshot");
        }

        Ok(Self {
            provider,
            collection: collection.to_string(),
            path: Some(path),
            records: RwLock::new(records),
        })
    }

    /// Memory-only store, used by tests.
    pub fn in_memory(collection: &str, provider: Arc<EmbeddingProvider>) -> Self {
        Self {
            provider,
            collection: collection.to_string(),
            path: None,
            records: RwLock::new(BTreeMap::new()),
        }
    }

    /// Atomic snapshot write: tmp sibling then rename into place.
    fn persist(&self, records: &BTreeMap<String, VectorRecord>) -> Result<(), StoreError> {
        let Some(ref path) = self.path else {
            return Ok(());
        };
        let all: Vec<&VectorRecord> = records.values().collect();
        let content = serde_json::to_string(&all)
            .map_err(|e| StoreError::Backend(format!("serialize snapshot: {e}")))?;
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, content).map_err(|e| StoreError::Backend(format!("write snapshot: {e}")))?;
        fs::rename(&tmp, path).map_err(|e| StoreError::Backend(format!("commit snapshot: {e}")))?;
        Ok(())
    }
}

#[async_trait]
impl VectorStore for LocalStore {
    async fn put(&self, draft: RecordDraft) -> Result<String, StoreError> {
        let embedding = self.provider.generate_embedding(&draft.content).await?;

        let mut metadata = draft.metadata;
        metadata.last_modified = Utc::now();

        let mut records = self.records.write();
        // date_added is immutable: an upsert keeps the original.
        if let Some(existing) = records.get(&draft.id) {
            metadata.date_added = existing.metadata.date_added;
        }

        let record = VectorRecord {
            id: draft.id.clone(),
            content: draft.content,
            metadata,
            solution: draft.solution,
            embedding,
        };

        let previous = records.insert(draft.id.clone(), record);
        if let Err(e) = self.persist(&records) {
            // Roll back so a failed write leaves no partially-persisted record.
            match previous {
                Some(prev) => {
                    records.insert(draft.id.clone(), prev);
                }
                None => {
                    records.remove(&draft.id);
                }
            }
            return Err(e);
        }

        debug!(id = %draft.id, "Upserted record");
        Ok(draft.id)
    }

    async fn get(&self, id: &str) -> Result<VectorRecord, StoreError> {
        self.records
            .read()
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    async fn delete(&self, id: &str) -> Result<(), StoreError> {
        let mut records = self.records.write();
        let removed = records.remove(id);
        match removed {
            None => Ok(()), // Deleting a nonexistent id is not an error
            Some(prev) => {
                if let Err(e) = self.persist(&records) {
                    records.insert(id.to_string(), prev);
                    return Err(e);
                }
                debug!(id = %id, "Deleted record");
                Ok(())
            }
        }
    }

    async fn query(
        &self,
        text: &str,
        filter: &QueryFilter,
        limit: usize,
    ) -> Result<Vec<QueryHit>, StoreError> {
        let query_embedding = self.provider.generate_embedding(text).await?;

        let records = self.records.read();
        // Candidates collect in id order; the stable sort below preserves
        // that order for equal similarities.
        let mut scored: Vec<(f32, &VectorRecord)> = records
            .values()
            .filter(|r| filter.matches(&r.metadata))
            .map(|r| {
                let similarity: f32 = query_embedding
                    .iter()
                    .zip(r.embedding.iter())
                    .map(|(a, b)| a * b)
                    .sum();
                (similarity, r)
            })
            .collect();

        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(limit);

        Ok(scored
            .into_iter()
            .map(|(similarity, r)| QueryHit {
                id: r.id.clone(),
                content: r.content.clone(),
                metadata: r.metadata.clone(),
                distance: 1.0 - similarity,
            })
            .collect())
    }

    async fn count(&self) -> Result<u64, StoreError> {
        Ok(self.records.read().len() as u64)
    }

    async fn status(&self) -> Result<CollectionStatus, StoreError> {
        Ok(CollectionStatus {
            name: self.collection.clone(),
            count: self.records.read().len() as u64,
            embedding_model: self.provider.model_name().to_string(),
        })
    }
}
