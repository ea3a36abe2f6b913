//! Ingestion Orchestration
//!
//! Coordinates one upload: validate, spill files to scoped temp storage,
//! extract and segment, pair exam questions with solutions, and persist the
//! resulting records one by one. Once validation has passed the result is
//! always a report; an item failure is recorded and never blocks or rolls
//! back sibling items.

pub mod pairing;

use std::io::Write;
use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::{info, warn};
use ulid::Ulid;

use crate::model::{DocumentType, PartialMetadata, Problem, RecordDraft, ValidationError};
use crate::processor::{self, ProcessorError, SourceFormat};
use crate::store::VectorStore;

#[derive(Error, Debug)]
pub enum IngestError {
    #[error("Validation failed: {0}")]
    Validation(String),
}

impl From<ValidationError> for IngestError {
    fn from(e: ValidationError) -> Self {
        IngestError::Validation(e.to_string())
    }
}

/// One uploaded file: raw bytes plus the transport-declared MIME type.
#[derive(Debug, Clone)]
pub struct UploadFile {
    pub filename: String,
    pub mime: String,
    pub bytes: Vec<u8>,
}

/// One upload request. Exam uploads must carry a solution file.
#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub document: UploadFile,
    pub solution: Option<UploadFile>,
    pub metadata: PartialMetadata,
}

/// Batch outcome: how many items persisted and what failed. Error strings
/// name the item (id or question number) they belong to.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestReport {
    pub processed: usize,
    pub errors: Vec<String>,
}

impl IngestReport {
    fn failed(error: String) -> Self {
        Self {
            processed: 0,
            errors: vec![error],
        }
    }
}

/// Upload bytes spilled to a named temp file. The file is removed on drop,
/// so every exit path releases it.
struct SpilledFile {
    filename: String,
    mime: String,
    temp: NamedTempFile,
}

impl SpilledFile {
    fn spill(file: UploadFile) -> std::io::Result<Self> {
        let mut temp = NamedTempFile::new()?;
        temp.write_all(&file.bytes)?;
        Ok(Self {
            filename: file.filename,
            mime: file.mime,
            temp,
        })
    }

    fn read(&self) -> std::io::Result<Vec<u8>> {
        std::fs::read(self.temp.path())
    }
}

pub struct Ingestor {
    store: Arc<dyn VectorStore>,
}

impl Ingestor {
    pub fn new(store: Arc<dyn VectorStore>) -> Self {
        Self { store }
    }

    /// Run one upload through the pipeline.
    ///
    /// Only validation failures abort the whole batch (before anything is
    /// persisted). Every later failure is scoped to one file or item and
    /// lands in the report's `errors`.
    pub async fn ingest(&self, request: UploadRequest) -> Result<IngestReport, IngestError> {
        request.metadata.validate()?;
        let is_exam = request.metadata.doc_type == DocumentType::Exam;
        if is_exam && request.solution.is_none() {
            return Err(IngestError::Validation(
                "solution file is required for exam papers".to_string(),
            ));
        }

        let paper = match SpilledFile::spill(request.document) {
            Ok(f) => f,
            Err(e) => return Ok(IngestReport::failed(format!("failed to buffer upload: {e}"))),
        };
        let solution = match request.solution.map(SpilledFile::spill).transpose() {
            Ok(f) => f,
            Err(e) => return Ok(IngestReport::failed(format!("failed to buffer upload: {e}"))),
        };

        let report = match solution {
            Some(scheme) if is_exam => self.ingest_exam(&paper, &scheme, request.metadata).await,
            _ => self.ingest_sections(&paper, request.metadata).await,
        };

        info!(
            processed = report.processed,
            errors = report.errors.len(),
            "Ingestion complete"
        );
        Ok(report)
    }

    async fn extract_text(&self, file: &SpilledFile) -> Result<String, ProcessorError> {
        let bytes = file
            .read()
            .map_err(|e| ProcessorError::Parse(format!("read buffered upload: {e}")))?;
        let format = SourceFormat::from_mime(&file.mime)?;
        processor::extract::extract_text(bytes, format).await
    }

    /// Exam path: pair extracted questions to extracted solutions and
    /// persist one Problem per pair.
    async fn ingest_exam(
        &self,
        paper: &SpilledFile,
        scheme: &SpilledFile,
        metadata: PartialMetadata,
    ) -> IngestReport {
        let paper_text = match self.extract_text(paper).await {
            Ok(t) => t,
            Err(e) => {
                return IngestReport::failed(format!("failed to parse {}: {e}", paper.filename))
            }
        };
        let scheme_text = match self.extract_text(scheme).await {
            Ok(t) => t,
            Err(e) => {
                return IngestReport::failed(format!("failed to parse {}: {e}", scheme.filename))
            }
        };

        let questions = pairing::extract_questions(&paper_text);
        if questions.is_empty() {
            return IngestReport::failed(format!(
                "no numbered questions found in {}",
                paper.filename
            ));
        }
        let pairs = pairing::pair_problems(questions, pairing::extract_solutions(&scheme_text));

        let base = Ulid::new().to_string();
        let full_metadata = metadata.into_metadata(Utc::now());
        let mut processed = 0;
        let mut errors = Vec::new();

        for (question, solution) in pairs {
            let id = format!("{base}_q{}", question.number);
            let Some(solution) = solution else {
                warn!(id = %id, number = question.number, "Question has no matching solution");
                errors.push(format!(
                    "{id}: no matching solution for question {}",
                    question.number
                ));
                continue;
            };

            let problem = Problem {
                id: id.clone(),
                question: question.body,
                solution: pairing::parse_solution(&solution.body),
                metadata: full_metadata.clone(),
                embedding: None,
            };

            match self.store.put(problem.into_draft()).await {
                Ok(_) => processed += 1,
                Err(e) => {
                    warn!(id = %id, error = %e, "Failed to persist problem");
                    errors.push(format!("failed to persist problem {id}: {e}"));
                }
            }
        }

        IngestReport { processed, errors }
    }

    /// Non-exam path: each section becomes an independently retrievable
    /// record; an unsectioned document is stored whole.
    async fn ingest_sections(&self, file: &SpilledFile, metadata: PartialMetadata) -> IngestReport {
        let bytes = match file.read() {
            Ok(b) => b,
            Err(e) => {
                return IngestReport::failed(format!("read buffered upload: {e}"));
            }
        };
        let document = match processor::process_document(bytes, &file.mime, metadata).await {
            Ok(d) => d,
            Err(e) => {
                return IngestReport::failed(format!("failed to process {}: {e}", file.filename))
            }
        };

        let mut processed = 0;
        let mut errors = Vec::new();

        if document.sections.is_empty() {
            let id = document.id.clone();
            match self.store.put(document.into_draft()).await {
                Ok(_) => processed += 1,
                Err(e) => errors.push(format!("failed to persist document {id}: {e}")),
            }
            return IngestReport { processed, errors };
        }

        let parent_title = document.metadata.title.clone();
        for (index, section) in document.sections.iter().enumerate() {
            let id = format!("{}_section_{}", document.id, index + 1);
            let mut metadata = document.metadata.clone();
            metadata.title = format!("{} - {}", parent_title, section.title);

            let draft = RecordDraft {
                id: id.clone(),
                content: section.content.clone(),
                metadata,
                solution: None,
            };

            match self.store.put(draft).await {
                Ok(_) => processed += 1,
                Err(e) => {
                    warn!(id = %id, error = %e, "Failed to persist section");
                    errors.push(format!("failed to persist section {id}: {e}"));
                }
            }
        }

        IngestReport { processed, errors }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::EmbeddingProvider;
    use crate::model::Difficulty;
    use crate::store::{LocalStore, QueryFilter, StoreError};
    use async_trait::async_trait;
    use crate::model::VectorRecord;
    use crate::store::{CollectionStatus, QueryHit};

    fn partial(doc_type: DocumentType) -> PartialMetadata {
        PartialMetadata {
            doc_type,
            title: "Paper 1".to_string(),
            subject: "Mathematics".to_string(),
            level: "A-Level".to_string(),
            topic: "Calculus".to_string(),
            subtopic: None,
            difficulty: Difficulty::Medium,
            source: "CIE".to_string(),
            year: 2023,
            paper: Some("P1".to_string()),
            chapter: None,
        }
    }

    fn upload(content: &str) -> UploadFile {
        UploadFile {
            filename: "upload.txt".to_string(),
            mime: "text/plain".to_string(),
            bytes: content.as_bytes().to_vec(),
        }
    }

    fn local_store() -> Arc<LocalStore> {
        Arc::new(LocalStore::in_memory(
            "test",
            Arc::new(EmbeddingProvider::new()),
        ))
    }

    /// Store wrapper that rejects writes for ids with a given suffix.
    struct FailingStore {
        inner: Arc<LocalStore>,
        fail_suffix: &'static str,
    }

    #[async_trait]
    impl VectorStore for FailingStore {
        async fn put(&self, draft: RecordDraft) -> Result<String, StoreError> {
            if draft.id.ends_with(self.fail_suffix) {
                return Err(StoreError::Backend("injected write failure".to_string()));
            }
            self.inner.put(draft).await
        }
        async fn get(&self, id: &str) -> Result<VectorRecord, StoreError> {
            self.inner.get(id).await
        }
        async fn delete(&self, id: &str) -> Result<(), StoreError> {
            self.inner.delete(id).await
        }
        async fn query(
            &self,
            text: &str,
            filter: &QueryFilter,
            limit: usize,
        ) -> Result<Vec<QueryHit>, StoreError> {
            self.inner.query(text, filter, limit).await
        }
        async fn count(&self) -> Result<u64, StoreError> {
            self.inner.count().await
        }
        async fn status(&self) -> Result<CollectionStatus, StoreError> {
            self.inner.status().await
        }
    }

    #[tokio::test]
    async fn test_exam_without_solution_is_validation_error() {
        let ingestor = Ingestor::new(local_store());
        let result = ingestor
            .ingest(UploadRequest {
                document: upload("Question 1. Differentiate x^2."),
                solution: None,
                metadata: partial(DocumentType::Exam),
            })
            .await;
        assert!(matches!(result, Err(IngestError::Validation(_))));
    }

    #[tokio::test]
    async fn test_exam_upload_persists_paired_problems() {
        let store = local_store();
        let ingestor = Ingestor::new(store.clone());

        let report = ingestor
            .ingest(UploadRequest {
                document: upload(
                    "Question 1. Differentiate x^2.\nQuestion 2. Integrate 2x dx.\n",
                ),
                solution: Some(upload(
                    "Solution 1: Power rule.\nAnswer: 2x\nSolution 2: Reverse.\nAnswer: x^2 + C\n",
                )),
                metadata: partial(DocumentType::Exam),
            })
            .await
            .unwrap();

        assert_eq!(report.processed, 2);
        assert!(report.errors.is_empty());
        assert_eq!(store.count().await.unwrap(), 2);

        let hits = store
            .query("differentiate", &QueryFilter::default(), 1)
            .await
            .unwrap();
        let record = store.get(&hits[0].id).await.unwrap();
        let solution = record.solution.unwrap();
        assert_eq!(solution.final_answer, "2x");
        // Propagated metadata
        assert_eq!(record.metadata.paper.as_deref(), Some("P1"));
        assert_eq!(record.metadata.year, 2023);
    }

    #[tokio::test]
    async fn test_exam_question_without_solution_is_item_error() {
        let store = local_store();
        let ingestor = Ingestor::new(store.clone());

        let report = ingestor
            .ingest(UploadRequest {
                document: upload(
                    "Question 1. Differentiate x^2.\nQuestion 2. Integrate 2x dx.\n",
                ),
                solution: Some(upload("Solution 1: Power rule.\nAnswer: 2x\n")),
                metadata: partial(DocumentType::Exam),
            })
            .await
            .unwrap();

        assert_eq!(report.processed, 1);
        assert_eq!(report.errors.len(), 1);
        assert!(report.errors[0].contains("question 2"));
    }

    #[tokio::test]
    async fn test_sections_become_independent_records() {
        let store = local_store();
        let ingestor = Ingestor::new(store.clone());

        let report = ingestor
            .ingest(UploadRequest {
                document: upload("1. Algebra\nQuadratics.\n2. Geometry\nCircles.\n"),
                solution: None,
                metadata: partial(DocumentType::Syllabus),
            })
            .await
            .unwrap();

        assert_eq!(report.processed, 2);
        let hits = store
            .query("quadratics", &QueryFilter::default(), 2)
            .await
            .unwrap();
        let titles: Vec<&str> = hits.iter().map(|h| h.metadata.title.as_str()).collect();
        assert!(titles.contains(&"Paper 1 - 1. Algebra"));
        assert!(titles.contains(&"Paper 1 - 2. Geometry"));
    }

    #[tokio::test]
    async fn test_unsectioned_document_is_stored_whole() {
        let store = local_store();
        let ingestor = Ingestor::new(store.clone());

        let report = ingestor
            .ingest(UploadRequest {
                document: upload("free-form lecture notes without headers"),
                solution: None,
                metadata: partial(DocumentType::Notes),
            })
            .await
            .unwrap();

        assert_eq!(report.processed, 1);
        assert_eq!(store.count().await.unwrap(), 1);
        let hits = store
            .query("lecture notes", &QueryFilter::default(), 1)
            .await
            .unwrap();
        assert_eq!(hits[0].metadata.title, "Paper 1");
    }

    #[tokio::test]
    async fn test_item_failure_does_not_block_siblings() {
        let inner = local_store();
        let failing = Arc::new(FailingStore {
            inner: inner.clone(),
            fail_suffix: "_section_2",
        });
        let ingestor = Ingestor::new(failing);

        let report = ingestor
            .ingest(UploadRequest {
                document: upload(
                    "1. First\nAlpha content.\n2. Second\nBeta content.\n3. Third\nGamma content.\n",
                ),
                solution: None,
                metadata: partial(DocumentType::Syllabus),
            })
            .await
            .unwrap();

        assert_eq!(report.processed, 2);
        assert_eq!(report.errors.len(), 1);
        assert!(report.errors[0].contains("_section_2"));

        // Items 1 and 3 landed; item 2 is absent from the store
        assert_eq!(inner.count().await.unwrap(), 2);
        let hits = inner
            .query("content", &QueryFilter::default(), 10)
            .await
            .unwrap();
        assert!(hits.iter().any(|h| h.id.ends_with("_section_1")));
        assert!(hits.iter().any(|h| h.id.ends_with("_section_3")));
        assert!(hits.iter().all(|h| !h.id.ends_with("_section_2")));
    }

    #[tokio::test]
    async fn test_unparseable_file_is_reported_not_thrown() {
        let ingestor = Ingestor::new(local_store());
        let report = ingestor
            .ingest(UploadRequest {
                document: UploadFile {
                    filename: "scan.png".to_string(),
                    mime: "image/png".to_string(),
                    bytes: vec![0x89, 0x50],
                },
                solution: None,
                metadata: partial(DocumentType::Notes),
            })
            .await
            .unwrap();
        assert_eq!(report.processed, 0);
        assert_eq!(report.errors.len(), 1);
    }
}
