//! HTTP surface of the review service.
//!
//! Every route is mounted at the root and again under `/api`. Failures are
//! always rendered as a JSON `{"error": ...}` body, including malformed
//! request bodies.

use crate::document::DOWNLOAD_NAME;
use crate::error::SlrError;
use crate::extract::QuestionPurpose;
use crate::paper::PaperRecord;
use crate::prompts::synthesis::{question_text, render_questions};
use crate::review::{Answer, IntroductionInput, KeyReport, ReviewService};
use crate::search::{SearchQuery, SearchSource, YearRange, DEFAULT_LIMIT};
use axum::{
    extract::{rejection::JsonRejection, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{de, Deserialize, Deserializer, Serialize};
use serde_json::{json, Value};
use std::str::FromStr;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{error, info};

/// Shared state handed to every handler
pub struct AppState {
    pub review: ReviewService,
}

/// Error rendered as a JSON body with the matching status code
#[derive(Debug)]
pub struct ApiError(pub SlrError);

impl From<SlrError> for ApiError {
    fn from(err: SlrError) -> Self {
        ApiError(err)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError(SlrError::Validation(format!(
            "Invalid request body: {}",
            rejection.body_text()
        )))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.0.status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        if status.is_server_error() {
            error!(error = %self.0, "Request failed");
        }

        let body = match &self.0 {
            SlrError::Api { code, .. } => json!({"error": self.0.to_string(), "status_code": code}),
            other => json!({"error": other.to_string()}),
        };
        (status, Json(body)).into_response()
    }
}

type ApiResult<T> = std::result::Result<T, ApiError>;

/// Build the application router.
pub fn router(state: Arc<AppState>) -> Router {
    let routes = Router::new()
        .route("/generate_research_questions_and_purpose", post(research_questions_handler))
        .route("/generate_search_string", post(search_string_handler))
        .route("/search_papers", post(search_papers_handler))
        .route("/fetch_papers", post(fetch_papers_handler))
        .route("/filter_papers", post(filter_papers_handler))
        .route("/answer_question", post(answer_question_handler))
        .route("/generate-summary-abstract", post(summary_abstract_handler))
        .route("/generate-summary-conclusion", post(summary_conclusion_handler))
        .route("/generate-introduction-summary", post(introduction_summary_handler))
        .route("/generate-summary-all", post(summary_all_handler))
        .route("/test-keys", get(test_keys_handler))
        .route("/health", get(health_handler));

    Router::new()
        .nest("/api", routes.clone())
        .merge(routes)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check endpoint
async fn health_handler() -> &'static str {
    "OK"
}

fn question_texts(items: &[Value]) -> Vec<String> {
    items.iter().filter_map(question_text).collect()
}

/// Whole number given either as a JSON number or as a numeric string, which
/// is what HTML form inputs post. Null and blank strings count as absent.
fn number_or_string<'de, D, T>(deserializer: D) -> std::result::Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: FromStr + TryFrom<i64>,
{
    let invalid = |shown: &dyn std::fmt::Display| {
        <D::Error as de::Error>::custom(format!("expected a whole number, got {}", shown))
    };

    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => n
            .as_i64()
            .and_then(|v| T::try_from(v).ok())
            .map(Some)
            .ok_or_else(|| invalid(&n)),
        Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
        Some(Value::String(s)) => s.trim().parse::<T>().map(Some).map_err(|_| invalid(&s)),
        Some(other) => Err(invalid(&other)),
    }
}

// ============================================================================
// Planning
// ============================================================================

#[derive(Debug, Deserialize)]
struct ResearchQuestionsRequest {
    #[serde(default)]
    objective: String,
    #[serde(default, deserialize_with = "number_or_string")]
    num_questions: Option<i64>,
    model_name: Option<String>,
}

#[derive(Debug, Serialize)]
struct ResearchQuestionsResponse {
    research_questions: Vec<QuestionPurpose>,
}

async fn research_questions_handler(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<ResearchQuestionsRequest>, JsonRejection>,
) -> ApiResult<Json<ResearchQuestionsResponse>> {
    let Json(req) = payload?;
    let num_questions = req.num_questions.unwrap_or(1);
    info!(num_questions = num_questions, "Research questions request");

    let research_questions = state
        .review
        .generate_research_questions(&req.objective, num_questions, req.model_name.as_deref())
        .await?;
    Ok(Json(ResearchQuestionsResponse { research_questions }))
}

#[derive(Debug, Deserialize)]
struct SearchStringRequest {
    #[serde(default)]
    objective: String,
    #[serde(default)]
    research_questions: Vec<Value>,
    model_name: Option<String>,
}

#[derive(Debug, Serialize)]
struct SearchStringResponse {
    search_string: String,
}

async fn search_string_handler(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<SearchStringRequest>, JsonRejection>,
) -> ApiResult<Json<SearchStringResponse>> {
    let Json(req) = payload?;
    let questions = question_texts(&req.research_questions);

    let search_string = state
        .review
        .generate_search_string(&req.objective, &questions, req.model_name.as_deref())
        .await?;
    Ok(Json(SearchStringResponse { search_string }))
}

// ============================================================================
// Search and screening
// ============================================================================

#[derive(Debug, Deserialize)]
struct SearchPapersRequest {
    #[serde(default)]
    search_string: String,
    #[serde(default, deserialize_with = "number_or_string")]
    start_year: Option<i32>,
    #[serde(default, deserialize_with = "number_or_string")]
    end_year: Option<i32>,
    #[serde(default, deserialize_with = "number_or_string")]
    limit: Option<usize>,
    source: Option<String>,
}

async fn search_papers_handler(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<SearchPapersRequest>, JsonRejection>,
) -> ApiResult<Json<Vec<PaperRecord>>> {
    let Json(req) = payload?;
    let query = SearchQuery {
        query: req.search_string,
        years: YearRange::resolve(req.start_year, req.end_year)?,
        limit: req.limit.unwrap_or(DEFAULT_LIMIT),
        source: SearchSource::from_route_value(req.source.as_deref()),
    };

    let papers = state.review.search_papers(&query).await?;
    info!(source = query.source.name(), count = papers.len(), "Search complete");
    Ok(Json(papers))
}

#[derive(Debug, Deserialize)]
struct FetchPapersRequest {
    #[serde(default)]
    search_string: String,
    #[serde(default, deserialize_with = "number_or_string")]
    limit: Option<usize>,
}

async fn fetch_papers_handler(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<FetchPapersRequest>, JsonRejection>,
) -> ApiResult<Json<Vec<PaperRecord>>> {
    let Json(req) = payload?;
    let papers = state
        .review
        .fetch_papers(&req.search_string, req.limit.unwrap_or(DEFAULT_LIMIT))
        .await?;
    Ok(Json(papers))
}

#[derive(Debug, Deserialize)]
struct FilterPapersRequest {
    #[serde(default)]
    search_string: String,
    #[serde(default)]
    papers: Vec<Value>,
    model_name: Option<String>,
}

#[derive(Debug, Serialize)]
struct FilterPapersResponse {
    filtered_papers: Vec<Value>,
}

async fn filter_papers_handler(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<FilterPapersRequest>, JsonRejection>,
) -> ApiResult<Json<FilterPapersResponse>> {
    let Json(req) = payload?;
    info!(papers = req.papers.len(), "Filter request");

    let filtered_papers = state
        .review
        .filter_papers(&req.search_string, req.papers, req.model_name.as_deref())
        .await?;
    Ok(Json(FilterPapersResponse { filtered_papers }))
}

// ============================================================================
// Synthesis
// ============================================================================

#[derive(Debug, Deserialize)]
struct AnswerQuestionRequest {
    #[serde(default)]
    questions: Vec<Value>,
    #[serde(default)]
    papers_info: Vec<Value>,
    model_name: Option<String>,
}

#[derive(Debug, Serialize)]
struct AnswerQuestionResponse {
    answers: Vec<Answer>,
}

async fn answer_question_handler(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<AnswerQuestionRequest>, JsonRejection>,
) -> ApiResult<Json<AnswerQuestionResponse>> {
    let Json(req) = payload?;
    let questions = question_texts(&req.questions);

    let answers = state
        .review
        .answer_questions(&questions, &req.papers_info, req.model_name.as_deref())
        .await?;
    Ok(Json(AnswerQuestionResponse { answers }))
}

#[derive(Debug, Deserialize)]
struct SummaryAbstractRequest {
    #[serde(default)]
    research_questions: Value,
    #[serde(default)]
    objective: String,
    #[serde(default)]
    search_string: String,
    model_name: Option<String>,
}

#[derive(Debug, Serialize)]
struct SummaryAbstractResponse {
    summary_abstract: String,
}

async fn summary_abstract_handler(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<SummaryAbstractRequest>, JsonRejection>,
) -> ApiResult<Json<SummaryAbstractResponse>> {
    let Json(req) = payload?;
    let research_questions = render_questions(&req.research_questions);

    let summary_abstract = state
        .review
        .summary_abstract(
            &research_questions,
            &req.objective,
            &req.search_string,
            req.model_name.as_deref(),
        )
        .await?;
    Ok(Json(SummaryAbstractResponse { summary_abstract }))
}

#[derive(Debug, Deserialize)]
struct SummaryConclusionRequest {
    #[serde(default)]
    papers_info: Vec<Value>,
    model_name: Option<String>,
}

#[derive(Debug, Serialize)]
struct SummaryConclusionResponse {
    summary_conclusion: String,
}

async fn summary_conclusion_handler(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<SummaryConclusionRequest>, JsonRejection>,
) -> ApiResult<Json<SummaryConclusionResponse>> {
    let Json(req) = payload?;
    let summary_conclusion = state
        .review
        .summary_conclusion(&req.papers_info, req.model_name.as_deref())
        .await?;
    Ok(Json(SummaryConclusionResponse { summary_conclusion }))
}

#[derive(Debug, Deserialize)]
struct IntroductionSummaryRequest {
    #[serde(default)]
    total_papers: Vec<Value>,
    #[serde(default)]
    filtered_papers: Vec<Value>,
    #[serde(default)]
    research_questions: Vec<Value>,
    #[serde(default)]
    objective: String,
    #[serde(default)]
    search_string: String,
    #[serde(default)]
    answers: Vec<Value>,
    model_name: Option<String>,
}

#[derive(Debug, Serialize)]
struct IntroductionSummaryResponse {
    introduction_summary: String,
}

async fn introduction_summary_handler(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<IntroductionSummaryRequest>, JsonRejection>,
) -> ApiResult<Json<IntroductionSummaryResponse>> {
    let Json(req) = payload?;
    let input = IntroductionInput {
        total_papers: req.total_papers.len(),
        filtered_papers: req.filtered_papers.len(),
        research_questions: question_texts(&req.research_questions),
        objective: req.objective,
        search_string: req.search_string,
        answers: req.answers,
    };

    let introduction_summary = state
        .review
        .introduction_summary(&input, req.model_name.as_deref())
        .await?;
    Ok(Json(IntroductionSummaryResponse { introduction_summary }))
}

#[derive(Debug, Deserialize)]
struct SummaryAllRequest {
    #[serde(default)]
    abstract_summary: String,
    #[serde(default)]
    intro_summary: String,
    #[serde(default)]
    conclusion_summary: String,
}

async fn summary_all_handler(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<SummaryAllRequest>, JsonRejection>,
) -> ApiResult<Response> {
    let Json(req) = payload?;
    let document = state.review.assemble_document(
        &req.abstract_summary,
        &req.intro_summary,
        &req.conclusion_summary,
    )?;

    Ok((
        [
            (header::CONTENT_TYPE, "application/x-tex".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", DOWNLOAD_NAME),
            ),
        ],
        document,
    )
        .into_response())
}

// ============================================================================
// Diagnostics
// ============================================================================

async fn test_keys_handler(State(state): State<Arc<AppState>>) -> Json<KeyReport> {
    Json(state.review.key_report())
}
