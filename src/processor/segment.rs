//! Section Segmentation
//!
//! One segmentation rule per document type: a header pattern plus a title
//! builder. Bodies are the spans between consecutive header matches, so no
//! lookahead is needed and rules stay extensible without branching
//! duplication. Text that matches no headers yields zero sections.

use lazy_static::lazy_static;
use regex::{Captures, Regex};

use crate::model::{DocumentType, Section};

/// Page-size heuristic used for estimated page numbers.
pub const LINES_PER_PAGE: usize = 40;

lazy_static! {
    static ref SYLLABUS_HEADER: Regex =
        Regex::new(r"(?m)^(\d+\.\s+\S[^\n]*)$").expect("syllabus header pattern");
    static ref NOTES_HEADER: Regex =
        Regex::new(r"(?m)^((?:Chapter|Topic)\s+\d+[.:]?[^\n]*)$").expect("notes header pattern");
    static ref WORKSHEET_HEADER: Regex =
        Regex::new(r"(?m)^(Exercise|Problem)\s+(\d+)[.:]").expect("worksheet header pattern");
    static ref EXAM_HEADER: Regex =
        Regex::new(r"(?m)^(?:Question|Q)\s*(\d+)[.:)]?").expect("exam header pattern");
    static ref RULES: [SegmentRule; 4] = [
        SegmentRule {
            header: &SYLLABUS_HEADER,
            title: |c| c[1].to_string(),
        },
        SegmentRule {
            header: &NOTES_HEADER,
            title: |c| c[1].to_string(),
        },
        SegmentRule {
            header: &WORKSHEET_HEADER,
            title: |c| format!("{} {}", &c[1], &c[2]),
        },
        SegmentRule {
            header: &EXAM_HEADER,
            title: |c| format!("Question {}", &c[1]),
        },
    ];
}

/// Segmentation strategy: header pattern with a capture-driven title.
pub struct SegmentRule {
    header: &'static Regex,
    title: fn(&Captures) -> String,
}

impl SegmentRule {
    pub fn for_type(doc_type: DocumentType) -> &'static SegmentRule {
        match doc_type {
            DocumentType::Syllabus => &RULES[0],
            DocumentType::Notes => &RULES[1],
            DocumentType::Worksheet => &RULES[2],
            DocumentType::Exam => &RULES[3],
        }
    }

    /// Split `text` into sections at header matches. Each body runs from the
    /// end of its header to the start of the next (or end of text).
    pub fn segment(&self, text: &str) -> Vec<Section> {
        let headers: Vec<(usize, usize, String)> = self
            .header
            .captures_iter(text)
            .map(|caps| {
                let m = caps.get(0).expect("whole match");
                (m.start(), m.end(), (self.title)(&caps))
            })
            .collect();

        headers
            .iter()
            .enumerate()
            .map(|(i, (start, end, title))| {
                let body_end = headers.get(i + 1).map(|next| next.0).unwrap_or(text.len());
                Section {
                    title: title.trim().to_string(),
                    content: text[*end..body_end].trim().to_string(),
                    page_number: estimate_page_number(text, *start),
                }
            })
            .collect()
    }
}

/// Estimate the page a byte offset falls on: ~40 lines per page,
/// `floor(lines_before / 40) + 1`.
pub fn estimate_page_number(text: &str, byte_offset: usize) -> u32 {
    let lines_before = text[..byte_offset.min(text.len())]
        .bytes()
        .filter(|b| *b == b'\n')
        .count();
    (lines_before / LINES_PER_PAGE) as u32 + 1
}
