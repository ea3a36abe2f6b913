//! Document Processing
//!
//! Turns raw uploaded bytes into a structured `Document`: text extraction
//! by MIME type, then type-driven section segmentation. Empty extracted
//! text is not fatal; the caller decides whether to proceed.

pub mod extract;
pub mod segment;

use chrono::Utc;
use thiserror::Error;
use tracing::{info, warn};
use ulid::Ulid;

use crate::model::{Document, PartialMetadata, ValidationError};

pub use extract::SourceFormat;
pub use segment::{estimate_page_number, SegmentRule, LINES_PER_PAGE};

/// Maximum upload size (50 MB) accepted for processing.
pub const MAX_FILE_SIZE: usize = 50 * 1024 * 1024;

#[derive(Error, Debug)]
pub enum ProcessorError {
    #[error("Unsupported file format: {0}")]
    InvalidFormat(String),
    #[error("Extraction failed: {0}")]
    Parse(String),
    #[error("File too large: {0} bytes (max {1} bytes)")]
    FileTooLarge(usize, usize),
    #[error("Invalid metadata: {0}")]
    Validation(#[from] ValidationError),
}

/// Process one uploaded file into a `Document`.
///
/// `metadata` lacks the generated fields; they are filled in here. The
/// returned document always carries the full extracted text, with sections
/// populated only where the type's segmentation rule matched.
pub async fn process_document(
    bytes: Vec<u8>,
    mime: &str,
    metadata: PartialMetadata,
) -> Result<Document, ProcessorError> {
    metadata.validate()?;
    if bytes.len() > MAX_FILE_SIZE {
        return Err(ProcessorError::FileTooLarge(bytes.len(), MAX_FILE_SIZE));
    }

    let format = SourceFormat::from_mime(mime)?;
    let text = extract::extract_text(bytes, format).await?;

    if text.trim().is_empty() {
        warn!(title = %metadata.title, "Extracted text is empty");
    }

    let doc_type = metadata.doc_type;
    let sections = SegmentRule::for_type(doc_type).segment(&text);
    let id = format!("{}_{}", doc_type.as_str(), Ulid::new());

    info!(
        id = %id,
        doc_type = doc_type.as_str(),
        sections = sections.len(),
        chars = text.len(),
        "Processed document"
    );

    Ok(Document {
        id,
        content: text,
        metadata: metadata.into_metadata(Utc::now()),
        sections,
        embedding: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Difficulty, DocumentType};

    fn partial(doc_type: DocumentType) -> PartialMetadata {
        PartialMetadata {
            doc_type,
            title: "Pure Mathematics".to_string(),
            subject: "Mathematics".to_string(),
            level: "A-Level".to_string(),
            topic: "Algebra".to_string(),
            subtopic: None,
            difficulty: Difficulty::Medium,
            source: "CIE".to_string(),
            year: 2023,
            paper: None,
            chapter: None,
        }
    }

    #[tokio::test]
    async fn test_unsupported_mime_is_invalid_format() {
        let result = process_document(
            b"PK\x03\x04".to_vec(),
            "application/zip",
            partial(DocumentType::Notes),
        )
        .await;
        assert!(matches!(result, Err(ProcessorError::InvalidFormat(_))));
    }

    #[tokio::test]
    async fn test_empty_text_is_not_fatal() {
        let doc = process_document(Vec::new(), "text/plain", partial(DocumentType::Notes))
            .await
            .unwrap();
        assert!(doc.content.is_empty());
        assert!(doc.sections.is_empty());
    }

    #[tokio::test]
    async fn test_syllabus_sections_extracted() {
        let text = "1. Algebra basics\nQuadratic equations and factorisation.\n\
                    2. Functions\nDomain, range and composition.\n";
        let doc = process_document(
            text.as_bytes().to_vec(),
            "text/plain",
            partial(DocumentType::Syllabus),
        )
        .await
        .unwrap();

        assert_eq!(doc.sections.len(), 2);
        assert_eq!(doc.sections[0].title, "1. Algebra basics");
        assert!(doc.sections[1].content.contains("Domain"));
        assert_eq!(doc.content, text);
    }

    #[tokio::test]
    async fn test_unmatched_text_yields_zero_sections() {
        let text = "just a flat paragraph without any recognizable headers";
        let doc = process_document(
            text.as_bytes().to_vec(),
            "text/plain",
            partial(DocumentType::Worksheet),
        )
        .await
        .unwrap();
        assert!(doc.sections.is_empty());
        assert_eq!(doc.content, text);
    }

    #[tokio::test]
    async fn test_document_id_carries_type_prefix() {
        let doc = process_document(
            b"notes".to_vec(),
            "text/markdown",
            partial(DocumentType::Notes),
        )
        .await
        .unwrap();
        assert!(doc.id.starts_with("notes_"));
    }
}
