//! Core Data Model
//!
//! Typed records for educational documents and exam problems, plus the
//! metadata validation applied at the API boundary. Dates are native
//! `DateTime<Utc>` internally and ISO-8601 strings on the wire.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("Missing required field: {0}")]
    MissingField(&'static str),
    #[error("Invalid document type: {0}")]
    InvalidType(String),
    #[error("Invalid difficulty: {0}")]
    InvalidDifficulty(String),
    #[error("vettedBy is required when vetted is true")]
    MissingVettedBy,
}

/// Kind of educational document, drives section segmentation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentType {
    Exam,
    Syllabus,
    Notes,
    Worksheet,
}

impl DocumentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentType::Exam => "exam",
            DocumentType::Syllabus => "syllabus",
            DocumentType::Notes => "notes",
            DocumentType::Worksheet => "worksheet",
        }
    }

    pub fn from_str(s: &str) -> Result<Self, ValidationError> {
        match s {
            "exam" => Ok(DocumentType::Exam),
            "syllabus" => Ok(DocumentType::Syllabus),
            "notes" => Ok(DocumentType::Notes),
            "worksheet" => Ok(DocumentType::Worksheet),
            _ => Err(ValidationError::InvalidType(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl Difficulty {
    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
        }
    }

    pub fn from_str(s: &str) -> Result<Self, ValidationError> {
        match s {
            "easy" => Ok(Difficulty::Easy),
            "medium" => Ok(Difficulty::Medium),
            "hard" => Ok(Difficulty::Hard),
            _ => Err(ValidationError::InvalidDifficulty(s.to_string())),
        }
    }
}

/// Full record metadata. `date_added` is set once at creation and never
/// changes; `last_modified` is refreshed by every mutating store operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentMetadata {
    #[serde(rename = "type")]
    pub doc_type: DocumentType,
    pub title: String,
    pub subject: String,
    pub level: String,
    pub topic: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtopic: Option<String>,
    pub difficulty: Difficulty,
    pub source: String,
    pub year: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paper: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chapter: Option<String>,
    pub date_added: DateTime<Utc>,
    pub last_modified: DateTime<Utc>,
    pub vetted: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vetted_by: Option<String>,
}

impl DocumentMetadata {
    /// Mark this record as manually approved. The only path that sets
    /// `vetted`, so an approval always carries its actor.
    pub fn approve(&mut self, actor: &str) {
        self.vetted = true;
        self.vetted_by = Some(actor.to_string());
    }
}

/// Caller-supplied metadata for new uploads. Lacks the generated fields
/// (`date_added`, `last_modified`, `vetted`), which are filled in at
/// creation time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartialMetadata {
    #[serde(rename = "type")]
    pub doc_type: DocumentType,
    pub title: String,
    pub subject: String,
    pub level: String,
    pub topic: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtopic: Option<String>,
    pub difficulty: Difficulty,
    pub source: String,
    pub year: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paper: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chapter: Option<String>,
}

impl PartialMetadata {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.title.trim().is_empty() {
            return Err(ValidationError::MissingField("title"));
        }
        if self.subject.trim().is_empty() {
            return Err(ValidationError::MissingField("subject"));
        }
        if self.level.trim().is_empty() {
            return Err(ValidationError::MissingField("level"));
        }
        if self.source.trim().is_empty() {
            return Err(ValidationError::MissingField("source"));
        }
        Ok(())
    }

    /// Promote to full metadata at creation time. Records start unvetted.
    pub fn into_metadata(self, now: DateTime<Utc>) -> DocumentMetadata {
        DocumentMetadata {
            doc_type: self.doc_type,
            title: self.title,
            subject: self.subject,
            level: self.level,
            topic: self.topic,
            subtopic: self.subtopic,
            difficulty: self.difficulty,
            source: self.source,
            year: self.year,
            paper: self.paper,
            chapter: self.chapter,
            date_added: now,
            last_modified: now,
            vetted: false,
            vetted_by: None,
        }
    }
}

/// A structurally-identified excerpt of a document. `page_number` is an
/// estimate derived from line position (40 lines per page).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Section {
    pub title: String,
    pub content: String,
    pub page_number: u32,
}

/// Worked solution for an exam problem.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Solution {
    pub steps: Vec<String>,
    pub final_answer: String,
}

/// A processed document: full extracted text plus zero-or-more sections.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub id: String,
    pub content: String,
    pub metadata: DocumentMetadata,
    #[serde(default)]
    pub sections: Vec<Section>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
}

/// One paired exam question with its solution.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Problem {
    pub id: String,
    pub question: String,
    pub solution: Solution,
    pub metadata: DocumentMetadata,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
}

/// Input to a store upsert. The store generates the embedding from
/// `content` so a persisted record is always embedding-complete.
#[derive(Debug, Clone)]
pub struct RecordDraft {
    pub id: String,
    pub content: String,
    pub metadata: DocumentMetadata,
    pub solution: Option<Solution>,
}

impl Document {
    pub fn into_draft(self) -> RecordDraft {
        RecordDraft {
            id: self.id,
            content: self.content,
            metadata: self.metadata,
            solution: None,
        }
    }
}

impl Problem {
    pub fn into_draft(self) -> RecordDraft {
        RecordDraft {
            id: self.id,
            content: self.question,
            metadata: self.metadata,
            solution: Some(self.solution),
        }
    }
}

/// A fully persisted record: embedding and metadata together. Documents
/// carry `solution: None`; problems carry their paired solution.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VectorRecord {
    pub id: String,
    pub content: String,
    pub metadata: DocumentMetadata,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub solution: Option<Solution>,
    pub embedding: Vec<f32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn partial() -> PartialMetadata {
        PartialMetadata {
            doc_type: DocumentType::Notes,
            title: "Integration by parts".to_string(),
            subject: "Mathematics".to_string(),
            level: "A-Level".to_string(),
            topic: "Calculus".to_string(),
            subtopic: None,
            difficulty: Difficulty::Medium,
            source: "CIE".to_string(),
            year: 2023,
            paper: None,
            chapter: None,
        }
    }

    #[test]
    fn test_validate_rejects_blank_title() {
        let mut meta = partial();
        meta.title = "  ".to_string();
        assert!(matches!(
            meta.validate(),
            Err(ValidationError::MissingField("title"))
        ));
    }

    #[test]
    fn test_into_metadata_defaults_unvetted() {
        let now = Utc::now();
        let meta = partial().into_metadata(now);
        assert!(!meta.vetted);
        assert!(meta.vetted_by.is_none());
        assert_eq!(meta.date_added, now);
        assert_eq!(meta.last_modified, now);
    }

    #[test]
    fn test_approve_sets_actor() {
        let mut meta = partial().into_metadata(Utc::now());
        meta.approve("admin@example.com");
        assert!(meta.vetted);
        assert_eq!(meta.vetted_by.as_deref(), Some("admin@example.com"));
    }

    #[test]
    fn test_metadata_wire_dates_are_iso8601() {
        let meta = partial().into_metadata(Utc::now());
        let json = serde_json::to_value(&meta).unwrap();
        let date = json["dateAdded"].as_str().unwrap();
        assert!(date.contains('T'), "expected ISO-8601 string, got {date}");
        assert_eq!(json["type"], "notes");
    }

    #[test]
    fn test_document_type_round_trip() {
        for s in ["exam", "syllabus", "notes", "worksheet"] {
            assert_eq!(DocumentType::from_str(s).unwrap().as_str(), s);
        }
        assert!(DocumentType::from_str("thesis").is_err());
    }
}
