//! Text Extraction
//!
//! Raw bytes to plain text, selected by MIME type. PDF extraction runs on a
//! blocking thread so it never stalls the async runtime.

use tokio::task;
use tracing::debug;

use super::ProcessorError;

/// Supported input formats, derived from the declared MIME type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    Pdf,
    Text,
    Markdown,
}

impl SourceFormat {
    pub fn from_mime(mime: &str) -> Result<Self, ProcessorError> {
        let essence = mime.split(';').next().unwrap_or(mime).trim();
        match essence {
            "application/pdf" => Ok(SourceFormat::Pdf),
            "text/plain" => Ok(SourceFormat::Text),
            "text/markdown" => Ok(SourceFormat::Markdown),
            other => Err(ProcessorError::InvalidFormat(other.to_string())),
        }
    }
}

/// Extract the full text of a document.
///
/// PDF pages are emitted one at a time by the extractor, so a failure
/// partway through surfaces as an error instead of silently truncated
/// output. Form feeds between pages are normalized to newlines to keep the
/// 40-lines-per-page estimate meaningful.
pub async fn extract_text(bytes: Vec<u8>, format: SourceFormat) -> Result<String, ProcessorError> {
    match format {
        SourceFormat::Pdf => {
            let text = task::spawn_blocking(move || pdf_extract::extract_text_from_mem(&bytes))
                .await
                .map_err(|e| ProcessorError::Parse(format!("extraction task failed: {e}")))?
                .map_err(|e| ProcessorError::Parse(format!("PDF extraction error: {e}")))?;
            debug!(chars = text.len(), "Extracted PDF text");
            Ok(text.replace('\u{c}', "\n"))
        }
        SourceFormat::Text | SourceFormat::Markdown => String::from_utf8(bytes)
            .map_err(|e| ProcessorError::Parse(format!("invalid UTF-8: {e}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_mime_known_types() {
        assert_eq!(
            SourceFormat::from_mime("application/pdf").unwrap(),
            SourceFormat::Pdf
        );
        assert_eq!(
            SourceFormat::from_mime("text/plain; charset=utf-8").unwrap(),
            SourceFormat::Text
        );
        assert_eq!(
            SourceFormat::from_mime("text/markdown").unwrap(),
            SourceFormat::Markdown
        );
    }

    #[test]
    fn test_from_mime_rejects_unknown() {
        assert!(matches!(
            SourceFormat::from_mime("image/png"),
            Err(ProcessorError::InvalidFormat(_))
        ));
    }

    #[tokio::test]
    async fn test_text_extraction_round_trips_utf8() {
        let text = extract_text("héllo\nworld".as_bytes().to_vec(), SourceFormat::Text)
            .await
            .unwrap();
        assert_eq!(text, "héllo\nworld");
    }

    #[tokio::test]
    async fn test_invalid_utf8_is_parse_error() {
        let result = extract_text(vec![0xff, 0xfe, 0x00], SourceFormat::Text).await;
        assert!(matches!(result, Err(ProcessorError::Parse(_))));
    }
}
