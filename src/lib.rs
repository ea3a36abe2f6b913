//! TutorVault Library
//!
//! Document ingestion and vector retrieval for educational material:
//! extraction and segmentation, feature-hash embeddings, a pluggable vector
//! store (embedded or remote), and a JSON HTTP API over it.

pub mod config;
pub mod embedding;
pub mod ingest;
pub mod model;
pub mod processor;
pub mod server;
pub mod store;

pub use config::{Backend, Config};
pub use embedding::{cosine_similarity, EmbeddingProvider, EMBEDDING_DIM, EMBEDDING_MODEL};
pub use ingest::{IngestReport, Ingestor, UploadFile, UploadRequest};
pub use model::{
    Difficulty, Document, DocumentMetadata, DocumentType, PartialMetadata, Problem, RecordDraft,
    Section, Solution, VectorRecord,
};
pub use processor::{process_document, ProcessorError, MAX_FILE_SIZE};
pub use store::{
    open_store, CollectionStatus, LocalStore, QueryFilter, QueryHit, RemoteStore, StoreError,
    VectorStore, DEFAULT_QUERY_LIMIT,
};
