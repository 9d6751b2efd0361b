//! Relevance screening prompts for academic paper titles.

use crate::llm::ChatMessage;

/// System prompt for relevance screening
pub const SYSTEM_PROMPT: &str = "You are an assistant that determines paper relevance.";

/// User prompt template for a single title
/// Placeholders: {title}, {search_string}
pub const USER_PROMPT_TEMPLATE: &str = "Determine if the paper titled '{title}' is relevant to the research topic described by '{search_string}'. Respond with 'Relevant' or 'Not Relevant' only.";

/// Build the screening messages for one paper title
pub fn build_messages(title: &str, search_string: &str) -> Vec<ChatMessage> {
    let prompt = USER_PROMPT_TEMPLATE
        .replace("{title}", title)
        .replace("{search_string}", search_string);

    vec![ChatMessage::system(SYSTEM_PROMPT), ChatMessage::user(prompt)]
}
