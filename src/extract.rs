//! Heuristic extraction of review artifacts from free-form model output.
//!
//! None of these functions panic. Unusable input ends in either an explicit
//! [`SlrError::Extraction`] carrying the raw text, or a documented default.

use crate::error::{Result, SlrError};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Purpose used when the fallback pairing runs out of lines
pub const PURPOSE_NOT_PROVIDED: &str = "Purpose not provided";

const PURPOSE_PREFIX: &str = "purpose:";

/// Leading "Research Question 2:" labels, possibly repeated
static QUESTION_LABEL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(research question\s*\d*:?\s*)+").expect("valid question label regex")
});

/// A research question with the purpose the model gave for it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionPurpose {
    pub question: String,
    pub purpose: String,
}

impl QuestionPurpose {
    fn new(question: &str, purpose: &str) -> Self {
        Self {
            question: strip_question_label(question),
            purpose: strip_purpose_label(purpose),
        }
    }
}

fn strip_question_label(line: &str) -> String {
    QUESTION_LABEL.replace(line.trim(), "").trim().to_string()
}

fn is_purpose_line(line: &str) -> bool {
    line.get(..PURPOSE_PREFIX.len())
        .is_some_and(|head| head.eq_ignore_ascii_case(PURPOSE_PREFIX))
}

fn strip_purpose_label(line: &str) -> String {
    if is_purpose_line(line) {
        line[PURPOSE_PREFIX.len()..].trim().to_string()
    } else {
        line.trim().to_string()
    }
}

/// Parse up to `count` question/purpose pairs out of model output.
///
/// Lines are scanned in order: a "Purpose:" line closes the pending question,
/// any other line starts a new one. If that yields nothing but there are at
/// least `2 * count` lines, consecutive lines are paired up instead.
pub fn parse_question_purposes(text: &str, count: usize) -> Result<Vec<QuestionPurpose>> {
    let lines: Vec<&str> = text
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect();

    let mut pairs = Vec::new();
    let mut pending: Option<&str> = None;

    for line in &lines {
        if is_purpose_line(line) {
            match pending.take() {
                Some(question) => pairs.push(QuestionPurpose::new(question, line)),
                None => debug!(line = *line, "Purpose line without a question, ignoring"),
            }
        } else {
            pending = Some(line);
        }
    }

    if pairs.is_empty() && count > 0 && lines.len() >= count * 2 {
        debug!(lines = lines.len(), "No labelled purposes found, pairing consecutive lines");
        pairs = lines
            .chunks(2)
            .take(count)
            .map(|chunk| {
                let purpose = chunk.get(1).copied().unwrap_or(PURPOSE_NOT_PROVIDED);
                QuestionPurpose::new(chunk[0], purpose)
            })
            .collect();
    }

    if pairs.is_empty() {
        return Err(SlrError::Extraction {
            message: "Could not parse questions and purposes from the model response".to_string(),
            raw: text.to_string(),
        });
    }

    pairs.truncate(count);
    Ok(pairs)
}

fn has_boolean_operator(line: &str) -> bool {
    let upper = line.to_uppercase();
    [" AND ", " OR ", " NOT "].iter().any(|op| upper.contains(op))
}

/// Remove leading "1. " / "2. " numbering, however many times it repeats.
fn strip_numbering(line: &str) -> &str {
    let mut line = line.trim();
    while let Some(rest) = line.strip_prefix("1. ").or_else(|| line.strip_prefix("2. ")) {
        line = rest.trim_start();
    }
    line
}

/// Pick the search string out of model output.
///
/// Lines are cleaned of "1. " / "2. " numbering and checked in order. The
/// first one that is fully quoted, or that has a boolean operator and is
/// longer than 10 characters, wins. Otherwise the first non-empty line, then
/// the text as given.
pub fn extract_search_string(text: &str) -> String {
    let lines: Vec<&str> = text
        .lines()
        .map(strip_numbering)
        .filter(|l| !l.is_empty())
        .collect();

    lines
        .iter()
        .find(|l| {
            let quoted = l.len() >= 2 && l.starts_with('"') && l.ends_with('"');
            quoted || (has_boolean_operator(l) && l.chars().count() > 10)
        })
        .or_else(|| lines.first())
        .copied()
        .unwrap_or_else(|| text.trim())
        .to_string()
}

/// Outcome of a relevance check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RelevanceVerdict {
    pub relevant: bool,
    /// The reply matched neither marker and was treated as not relevant
    pub ambiguous: bool,
}

/// Classify a short "Relevant" / "Not Relevant" reply.
///
/// Negative markers win over the positive one; anything else is treated as not
/// relevant and flagged ambiguous.
pub fn classify_relevance(reply: &str) -> RelevanceVerdict {
    let lower = reply.to_lowercase();

    if lower.contains("not relevant") || lower.contains("irrelevant") {
        RelevanceVerdict {
            relevant: false,
            ambiguous: false,
        }
    } else if lower.contains("relevant") {
        RelevanceVerdict {
            relevant: true,
            ambiguous: false,
        }
    } else {
        warn!(reply = reply, "Ambiguous relevance reply, defaulting to not relevant");
        RelevanceVerdict {
            relevant: false,
            ambiguous: true,
        }
    }
}
