//! # rustslr
//!
//! Systematic Literature Review assistant - LLM & literature search service
//!
//! ## Modules
//!
//! - [`llm`] - Chat-completion gateway (OpenAI, DeepSeek)
//! - [`search`] - Literature search adapter over [`gscholar`], [`semanticscholar`] and [`scopus`]
//! - [`extract`] - Heuristic parsing of model output
//! - [`prompts`] - Prompt templates for every workflow step
//! - [`review`] - The review workflow operations
//! - [`document`] - LaTeX document assembly
//! - [`server`] - HTTP routes
//! - [`config`] - Environment-driven settings
//! - [`error`] - Custom error types
//!
//! ## Usage
//!
//! ```rust,no_run
//! use rustslr::{config::Settings, review::ReviewService};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let service = ReviewService::from_settings(Settings::from_env())?;
//!     let questions = service
//!         .generate_research_questions("LLMs for abstract screening", 3, None)
//!         .await?;
//!     println!("Generated {} questions", questions.len());
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod document;
pub mod error;
pub mod extract;
pub mod gscholar;
pub mod llm;
pub mod paper;
pub mod prompts;
pub mod review;
pub mod scopus;
pub mod search;
pub mod semanticscholar;
pub mod server;

pub use error::{Result, SlrError};
