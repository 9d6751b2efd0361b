//! Review workflow: the operations a client walks through to produce a
//! systematic literature review.
//!
//! Every operation is stateless. Required inputs are checked first, then the
//! model and its credential, and only then is anything sent upstream. Batch
//! operations run their items one after another and tolerate per-item failure.

use crate::config::{CredentialStatus, Settings};
use crate::document::{self, SummarySections};
use crate::error::{Result, SlrError};
use crate::extract::{self, QuestionPurpose, RelevanceVerdict};
use crate::llm::{CompletionOptions, LlmGateway};
use crate::paper::PaperRecord;
use crate::prompts::{planning, relevance, synthesis};
use crate::search::{SearchAdapter, SearchQuery};
use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};

const NO_ABSTRACT: &str = "No abstract provided.";
const NO_INTRODUCTION: &str = "No introduction provided.";
const NO_CONCLUSION: &str = "No conclusion provided.";

/// Answer to one research question
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Answer {
    pub question: String,
    /// Generated answer, or the failure message when `error` is set
    pub answer: String,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub error: bool,
}

/// Inputs to the introduction section
#[derive(Debug, Clone, Default)]
pub struct IntroductionInput {
    pub total_papers: usize,
    pub filtered_papers: usize,
    pub research_questions: Vec<String>,
    pub objective: String,
    pub search_string: String,
    pub answers: Vec<Value>,
}

/// Scraper proxy state reported by the key check
#[derive(Debug, Clone, Serialize)]
pub struct ProxyStatus {
    pub configured: bool,
    pub attempted: bool,
}

/// Result of the credential diagnostic
#[derive(Debug, Clone, Serialize)]
pub struct KeyReport {
    pub credentials: Vec<CredentialStatus>,
    pub scholar_proxy: ProxyStatus,
}

fn require<'a>(field: &str, value: &'a str) -> Result<&'a str> {
    let value = value.trim();
    if value.is_empty() {
        Err(SlrError::missing_field(field))
    } else {
        Ok(value)
    }
}

fn require_items<T>(field: &str, items: &[T]) -> Result<()> {
    if items.is_empty() {
        Err(SlrError::missing_field(field))
    } else {
        Ok(())
    }
}

fn or_default(value: &str, default: &str) -> String {
    if value.trim().is_empty() {
        default.to_string()
    } else {
        value.to_string()
    }
}

/// Composes the gateway, the search adapter and the extractors.
pub struct ReviewService {
    gateway: LlmGateway,
    search: SearchAdapter,
    settings: Settings,
}

impl ReviewService {
    pub fn new(settings: Settings, gateway: LlmGateway, search: SearchAdapter) -> Self {
        Self {
            gateway,
            search,
            settings,
        }
    }

    pub fn from_settings(settings: Settings) -> Result<Self> {
        let gateway = LlmGateway::from_settings(&settings)?;
        let search = SearchAdapter::from_settings(&settings)?;
        Ok(Self::new(settings, gateway, search))
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Resolve the requested model (or the default) and check it can be called.
    fn model<'a>(&'a self, requested: Option<&'a str>) -> Result<&'a str> {
        let model = requested
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .unwrap_or(self.settings.default_model.as_str());
        self.gateway.ensure_ready(model)?;
        Ok(model)
    }

    /// Generate `num_questions` research questions, each with its purpose.
    pub async fn generate_research_questions(
        &self,
        objective: &str,
        num_questions: i64,
        model: Option<&str>,
    ) -> Result<Vec<QuestionPurpose>> {
        let objective = require("objective", objective)?;
        let count = usize::try_from(num_questions)
            .ok()
            .filter(|n| *n >= 1)
            .ok_or_else(|| SlrError::Validation("num_questions must be at least 1".to_string()))?;
        let model = self.model(model)?;

        info!(model = model, count = count, "Generating research questions");
        let text = self
            .gateway
            .complete(
                &planning::research_questions(objective, count),
                model,
                CompletionOptions::GENERATION,
            )
            .await?;

        extract::parse_question_purposes(&text, count)
    }

    /// Generate one boolean search string for the objective and questions.
    pub async fn generate_search_string(
        &self,
        objective: &str,
        research_questions: &[String],
        model: Option<&str>,
    ) -> Result<String> {
        let objective = require("objective", objective)?;
        require_items("research_questions", research_questions)?;
        let model = self.model(model)?;

        info!(model = model, questions = research_questions.len(), "Generating search string");
        let text = self
            .gateway
            .complete(
                &planning::search_string(objective, research_questions),
                model,
                CompletionOptions::GENERATION,
            )
            .await?;

        let search_string = extract::extract_search_string(&text);
        if search_string.is_empty() {
            return Err(SlrError::Extraction {
                message: "Could not extract a search string".to_string(),
                raw: text,
            });
        }
        Ok(search_string)
    }

    /// Search the backend named in the query.
    pub async fn search_papers(&self, query: &SearchQuery) -> Result<Vec<PaperRecord>> {
        require("search_string", &query.query)?;
        if query.limit == 0 {
            return Err(SlrError::Validation("limit must be at least 1".to_string()));
        }
        self.search.search(query).await
    }

    /// Pull up to `limit` results from the Scholar scraper.
    pub async fn fetch_papers(&self, search_string: &str, limit: usize) -> Result<Vec<PaperRecord>> {
        let search_string = require("search_string", search_string)?;
        self.search.scholar().search(search_string, None, limit).await
    }

    /// Ask the model whether one title fits the search string.
    pub async fn check_relevance(
        &self,
        title: &str,
        search_string: &str,
        model: &str,
    ) -> Result<RelevanceVerdict> {
        let reply = self
            .gateway
            .complete(
                &relevance::build_messages(title, search_string),
                model,
                CompletionOptions::CLASSIFICATION,
            )
            .await?;
        Ok(extract::classify_relevance(&reply))
    }

    /// Keep the papers the model judges relevant, in input order.
    ///
    /// Entries without a title are skipped. A failed check counts as not
    /// relevant and the batch carries on.
    pub async fn filter_papers(
        &self,
        search_string: &str,
        papers: Vec<Value>,
        model: Option<&str>,
    ) -> Result<Vec<Value>> {
        let search_string = require("search_string", search_string)?;
        let model = self.model(model)?;
        let total = papers.len();

        let mut relevant = Vec::new();
        for (index, paper) in papers.into_iter().enumerate() {
            let title = match paper.get("title").and_then(Value::as_str).map(str::trim) {
                Some(t) if !t.is_empty() => t.to_string(),
                _ => {
                    warn!(index = index, "Skipping paper without a title");
                    continue;
                }
            };

            match self.check_relevance(&title, search_string, model).await {
                Ok(verdict) if verdict.relevant => relevant.push(paper),
                Ok(_) => {}
                Err(e) => warn!(title = %title, error = %e, "Relevance check failed, excluding paper"),
            }
        }

        info!(total = total, relevant = relevant.len(), "Paper filtering complete");
        Ok(relevant)
    }

    /// Answer each question from the supplied paper information.
    pub async fn answer_questions(
        &self,
        questions: &[String],
        papers_info: &[Value],
        model: Option<&str>,
    ) -> Result<Vec<Answer>> {
        require_items("questions", questions)?;
        require_items("papers_info", papers_info)?;
        let model = self.model(model)?;

        let mut answers = Vec::with_capacity(questions.len());
        for question in questions {
            let result = self
                .gateway
                .complete(
                    &synthesis::answer_messages(question, papers_info),
                    model,
                    CompletionOptions::ANSWER,
                )
                .await;

            answers.push(match result {
                Ok(text) => Answer {
                    question: question.clone(),
                    answer: text.trim().to_string(),
                    error: false,
                },
                Err(e) => {
                    warn!(question = %question, error = %e, "Answer generation failed");
                    Answer {
                        question: question.clone(),
                        answer: e.to_string(),
                        error: true,
                    }
                }
            });
        }
        Ok(answers)
    }

    /// Abstract section from the planning artifacts.
    pub async fn summary_abstract(
        &self,
        research_questions: &str,
        objective: &str,
        search_string: &str,
        model: Option<&str>,
    ) -> Result<String> {
        let research_questions = require("research_questions", research_questions)?;
        let objective = require("objective", objective)?;
        let search_string = require("search_string", search_string)?;
        let model = self.model(model)?;

        self.gateway
            .complete(
                &synthesis::abstract_messages(research_questions, objective, search_string),
                model,
                CompletionOptions::GENERATION,
            )
            .await
            .map(|text| text.trim().to_string())
    }

    /// Conclusion section from the screened papers.
    pub async fn summary_conclusion(&self, papers_info: &[Value], model: Option<&str>) -> Result<String> {
        require_items("papers_info", papers_info)?;
        let model = self.model(model)?;

        self.gateway
            .complete(
                &synthesis::conclusion_messages(papers_info),
                model,
                CompletionOptions::GENERATION,
            )
            .await
            .map(|text| text.trim().to_string())
    }

    /// Introduction and high-level findings section.
    pub async fn introduction_summary(
        &self,
        input: &IntroductionInput,
        model: Option<&str>,
    ) -> Result<String> {
        let objective = require("objective", &input.objective)?;
        let search_string = require("search_string", &input.search_string)?;
        require_items("research_questions", &input.research_questions)?;
        let model = self.model(model)?;

        let ctx = synthesis::IntroductionContext {
            total_papers: input.total_papers,
            filtered_papers: input.filtered_papers,
            research_questions: &input.research_questions,
            objective,
            search_string,
            answers: &input.answers,
        };

        self.gateway
            .complete(
                &synthesis::introduction_messages(&ctx),
                model,
                CompletionOptions::GENERATION,
            )
            .await
            .map(|text| text.trim().to_string())
    }

    /// Render the three sections into the configured template.
    pub fn assemble_document(&self, abstract_text: &str, introduction: &str, conclusion: &str) -> Result<String> {
        let sections = SummarySections {
            abstract_text: or_default(abstract_text, NO_ABSTRACT),
            introduction: or_default(introduction, NO_INTRODUCTION),
            conclusion: or_default(conclusion, NO_CONCLUSION),
        };
        document::render_file(&self.settings.template_path, &sections)
    }

    /// Which credentials are configured, with masked previews.
    pub fn key_report(&self) -> KeyReport {
        let scholar = self.search.scholar();
        KeyReport {
            credentials: self.settings.credential_status(),
            scholar_proxy: ProxyStatus {
                configured: scholar.proxy_configured(),
                attempted: scholar.proxy_attempted(),
            },
        }
    }
}
