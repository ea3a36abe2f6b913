//! Exam Pairing
//!
//! Extracts numbered questions from a paper and numbered solutions from a
//! mark scheme, then pairs them by question number. A question with no
//! matching solution stays in the output so the caller can report it.

use std::collections::HashMap;

use lazy_static::lazy_static;
use regex::Regex;

use crate::model::Solution;

lazy_static! {
    static ref QUESTION_HEADER: Regex =
        Regex::new(r"(?m)^(?:Question|Q)\s*(\d+)[.:)]?").expect("question header pattern");
    static ref SOLUTION_HEADER: Regex =
        Regex::new(r"(?m)^(?:Solution|Answer|Question|Q)\s*(\d+)[.:)]?")
            .expect("solution header pattern");
}

/// A numbered item sliced out of a paper or mark scheme.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedItem {
    pub number: u32,
    pub body: String,
}

fn extract_numbered(text: &str, header: &Regex) -> Vec<ExtractedItem> {
    let matches: Vec<(usize, usize, u32)> = header
        .captures_iter(text)
        .filter_map(|caps| {
            let m = caps.get(0)?;
            let number = caps.get(1)?.as_str().parse().ok()?;
            Some((m.start(), m.end(), number))
        })
        .collect();

    matches
        .iter()
        .enumerate()
        .map(|(i, (_, end, number))| {
            let body_end = matches.get(i + 1).map(|next| next.0).unwrap_or(text.len());
            ExtractedItem {
                number: *number,
                body: text[*end..body_end].trim().to_string(),
            }
        })
        .collect()
}

pub fn extract_questions(paper_text: &str) -> Vec<ExtractedItem> {
    extract_numbered(paper_text, &QUESTION_HEADER)
}

pub fn extract_solutions(solution_text: &str) -> Vec<ExtractedItem> {
    extract_numbered(solution_text, &SOLUTION_HEADER)
}

/// Pair each question with the solution carrying the same number. Questions
/// keep paper order; an unmatched question pairs with `None`.
pub fn pair_problems(
    questions: Vec<ExtractedItem>,
    solutions: Vec<ExtractedItem>,
) -> Vec<(ExtractedItem, Option<ExtractedItem>)> {
    let mut by_number: HashMap<u32, ExtractedItem> =
        solutions.into_iter().map(|s| (s.number, s)).collect();

    questions
        .into_iter()
        .map(|q| {
            let solution = by_number.remove(&q.number);
            (q, solution)
        })
        .collect()
}

/// Interpret a solution body as worked steps plus a final answer. An
/// explicit `Answer:` line wins; otherwise the last step stands in.
pub fn parse_solution(body: &str) -> Solution {
    let mut steps = Vec::new();
    let mut final_answer = None;

    for line in body.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if let Some(answer) = line
            .strip_prefix("Final answer:")
            .or_else(|| line.strip_prefix("Answer:"))
        {
            final_answer = Some(answer.trim().to_string());
        } else {
            steps.push(line.to_string());
        }
    }

    let final_answer = final_answer
        .or_else(|| steps.last().cloned())
        .unwrap_or_default();

    Solution {
        steps,
        final_answer,
    }
}
