//! Prompts that turn screened papers into prose: answers, abstract,
//! introduction and conclusion.
//!
//! Paper info objects come straight from clients, so fields are read leniently
//! and anything missing is rendered as `N/A`.

use crate::llm::ChatMessage;
use serde_json::Value;
use tracing::warn;

/// System prompt for the summary sections
pub const SUMMARY_SYSTEM_PROMPT: &str = "You are a helpful assistant.";

/// System prompt for answering research questions
pub const ANSWER_SYSTEM_PROMPT: &str = "You are a knowledgeable assistant who can answer research questions based on provided papers information.";

const ANSWER_INSTRUCTION: &str = "Based on the provided papers information, please answer the research question. If possible, cite relevant paper titles or authors for cross-verification. Provide a comprehensive answer.";

const NOT_AVAILABLE: &str = "N/A";

/// Answers longer than this are shortened in the introduction prompt
const ANSWER_BRIEF_CHARS: usize = 150;

/// Lenient view over a client-supplied paper object
#[derive(Debug, Clone, PartialEq)]
pub struct PaperInfo {
    pub title: String,
    pub author: String,
    pub year: String,
}

impl PaperInfo {
    /// Read a paper object; `None` when the entry is not an object at all.
    pub fn from_value(value: &Value) -> Option<Self> {
        let obj = value.as_object()?;
        let field = |keys: &[&str]| {
            keys.iter()
                .filter_map(|k| obj.get(*k))
                .find_map(value_text)
                .unwrap_or_else(|| NOT_AVAILABLE.to_string())
        };

        Some(Self {
            title: field(&["title"]),
            author: field(&["creator", "author"]),
            year: field(&["year", "pub_year"]),
        })
    }
}

/// Text of a scalar JSON value; null and empty strings count as missing.
fn value_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn paper_infos(papers: &[Value]) -> Vec<PaperInfo> {
    papers
        .iter()
        .filter_map(|p| {
            let info = PaperInfo::from_value(p);
            if info.is_none() {
                warn!(entry = %p, "Skipping invalid paper entry");
            }
            info
        })
        .collect()
}

/// Question text from either a plain string or a `{question, purpose}` object.
pub fn question_text(item: &Value) -> Option<String> {
    match item {
        Value::Object(obj) => obj.get("question").and_then(value_text),
        other => value_text(other),
    }
}

/// Render research questions given either as a list or as free text.
pub fn render_questions(questions: &Value) -> String {
    match questions {
        Value::String(s) => s.clone(),
        Value::Array(items) => items
            .iter()
            .filter_map(question_text)
            .collect::<Vec<_>>()
            .join("; "),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Messages answering one research question from the supplied papers
pub fn answer_messages(question: &str, papers: &[Value]) -> Vec<ChatMessage> {
    let context = paper_infos(papers)
        .iter()
        .map(|p| format!("- Title: '{}', Author(s): {}, Year: {}.", p.title, p.author, p.year))
        .collect::<Vec<_>>()
        .join("\n");
    let context = if context.is_empty() {
        "No paper information provided.".to_string()
    } else {
        context
    };

    vec![
        ChatMessage::system(ANSWER_SYSTEM_PROMPT),
        ChatMessage::system(format!(
            "Research Question: {}\n\nPapers Information:\n{}",
            question, context
        )),
        ChatMessage::user(ANSWER_INSTRUCTION),
    ]
}

fn summary_messages(prompt: String) -> Vec<ChatMessage> {
    vec![
        ChatMessage::system(SUMMARY_SYSTEM_PROMPT),
        ChatMessage::user(prompt),
    ]
}

/// Messages for the abstract section
pub fn abstract_messages(research_questions: &str, objective: &str, search_string: &str) -> Vec<ChatMessage> {
    summary_messages(format!(
        "Based on the research questions: '{}', the objective: '{}', and the search string: '{}', generate a comprehensive abstract.",
        research_questions, objective, search_string
    ))
}

/// Messages for the conclusion section
pub fn conclusion_messages(papers: &[Value]) -> Vec<ChatMessage> {
    let mut parts = vec!["Summarize the conclusions of the following papers:".to_string()];
    parts.extend(
        paper_infos(papers)
            .into_iter()
            .map(|p| format!("- '{}' by {} ({})", p.title, p.author, p.year)),
    );
    summary_messages(parts.join(" "))
}

/// Everything the introduction prompt is built from
#[derive(Debug, Clone, Copy)]
pub struct IntroductionContext<'a> {
    pub total_papers: usize,
    pub filtered_papers: usize,
    pub research_questions: &'a [String],
    pub objective: &'a str,
    pub search_string: &'a str,
    pub answers: &'a [Value],
}

fn brief(answer: &str) -> String {
    if answer.chars().count() > ANSWER_BRIEF_CHARS {
        let head: String = answer.chars().take(ANSWER_BRIEF_CHARS).collect();
        format!("{}...", head)
    } else {
        answer.to_string()
    }
}

/// Messages for the introduction and high-level findings summary
pub fn introduction_messages(ctx: &IntroductionContext<'_>) -> Vec<ChatMessage> {
    let intro = format!(
        "This document synthesizes findings. Initially, {} papers related to \"{}\" were considered. After filtering, {} papers were thoroughly examined. The primary research objective is: {}.",
        ctx.total_papers, ctx.search_string, ctx.filtered_papers, ctx.objective
    );

    let questions = ctx
        .research_questions
        .iter()
        .map(|q| format!("- {}", q))
        .collect::<Vec<_>>()
        .join("\n");

    let findings = ctx
        .answers
        .iter()
        .filter_map(|a| {
            let question = a.get("question").and_then(Value::as_str)?;
            let answer = a.get("answer").and_then(Value::as_str)?;
            Some(format!("- For question '{}': {}", question, brief(answer)))
        })
        .collect::<Vec<_>>()
        .join("\n");

    summary_messages(format!(
        "{}\n\nKey Research Questions Addressed:\n{}\n\nSummary of Key Findings:\n{}\n\nBased on this information, generate a coherent introduction and high-level summary of the findings for a research paper section.",
        intro, questions, findings
    ))
}
