//! Prompt module for LLM-based operations.
//!
//! Each submodule builds the chat messages for one step of the review workflow.

pub mod planning;
pub mod relevance;
pub mod synthesis;
