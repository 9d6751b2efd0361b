//! Prompts for planning a review: research questions and the search string.

use crate::llm::ChatMessage;

/// System prompt for research question generation
pub const QUESTIONS_SYSTEM_PROMPT: &str = "You are a helpful assistant capable of generating research questions along with their purposes for a systematic literature review.";

/// System prompt for search string generation
pub const SEARCH_STRING_SYSTEM_PROMPT: &str =
    "You are a helpful assistant that generates academic search strings.";

/// User prompt template for research questions
/// Placeholders: {objective}, {num_questions}
pub const QUESTIONS_PROMPT_TEMPLATE: &str = "You are a helpful assistant capable of generating research questions along with their purposes for a systematic literature review.
Given the research objective: '{objective}', generate {num_questions} distinct research questions, each followed by its specific purpose. Start purpose with 'Purpose: To examine', or 'Purpose: To investigate'.";

/// User prompt template for the search string
/// Placeholders: {objective}, {research_questions}
pub const SEARCH_STRING_PROMPT_TEMPLATE: &str = "Given the research objective: '{objective}', and the following research questions: {research_questions}, generate one concise and effective search string for identifying relevant literature for a systematic literature review. The search string should use appropriate keywords and boolean operators (like AND, OR). Provide only the search string itself without any extra explanation or numbering.";

/// Messages asking for `num_questions` question/purpose pairs
pub fn research_questions(objective: &str, num_questions: usize) -> Vec<ChatMessage> {
    let prompt = QUESTIONS_PROMPT_TEMPLATE
        .replace("{objective}", objective)
        .replace("{num_questions}", &num_questions.to_string());

    vec![
        ChatMessage::system(QUESTIONS_SYSTEM_PROMPT),
        ChatMessage::user(prompt),
    ]
}

/// Messages asking for a boolean search string
pub fn search_string(objective: &str, research_questions: &[String]) -> Vec<ChatMessage> {
    let prompt = SEARCH_STRING_PROMPT_TEMPLATE
        .replace("{objective}", objective)
        .replace("{research_questions}", &research_questions.join(", "));

    vec![
        ChatMessage::system(SEARCH_STRING_SYSTEM_PROMPT),
        ChatMessage::user(prompt),
    ]
}
