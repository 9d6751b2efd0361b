//! Integration tests for the HTTP API.
//!
//! LLM and literature providers are replaced by a local axum server, so every
//! route runs end to end without touching the internet.

use axum::{
    body::Body,
    extract::Query,
    http::{HeaderMap, Request, StatusCode},
    response::{Html, IntoResponse},
    routing::{get, post},
    Json, Router,
};
use rustslr::{
    config::Settings,
    review::ReviewService,
    server::{router, AppState},
};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::io::Write;
use std::sync::Arc;
use tempfile::NamedTempFile;
use tower::ServiceExt;

// ============================================================================
// Mock upstream
// ============================================================================

async fn mock_chat(headers: HeaderMap, Json(body): Json<Value>) -> impl IntoResponse {
    if headers.get("authorization").is_none() {
        return (StatusCode::UNAUTHORIZED, Json(json!({"error": "no key"})));
    }

    let prompt = body["messages"]
        .as_array()
        .and_then(|m| m.last())
        .and_then(|m| m["content"].as_str())
        .unwrap_or_default()
        .to_string();

    let reply = if prompt.contains("distinct research questions") {
        "Research Question 1: What is X?\nPurpose: To examine X.\nResearch Question 2: What is Y?\nPurpose: To investigate Y.".to_string()
    } else if prompt.contains("effective search string") {
        "Sure.\n1. \"machine learning\" AND \"healthcare\"".to_string()
    } else if prompt.contains("Determine if the paper titled") {
        if prompt.contains("cooking") {
            "Not Relevant".to_string()
        } else {
            "Relevant".to_string()
        }
    } else {
        "Generated text.".to_string()
    };

    (
        StatusCode::OK,
        Json(json!({
            "choices": [{"message": {"role": "assistant", "content": reply}}],
            "usage": {"prompt_tokens": 12, "completion_tokens": 3}
        })),
    )
}

async fn mock_semantic_scholar(
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
) -> impl IntoResponse {
    if headers.get("x-api-key").is_none() {
        return (StatusCode::FORBIDDEN, Json(json!({"message": "Forbidden"})));
    }
    (
        StatusCode::OK,
        Json(json!({
            "total": 1,
            "data": [{
                "title": format!("Result for {}", params.get("query").cloned().unwrap_or_default()),
                "authors": [{"name": "Ada Lovelace"}, {"name": "Alan Turing"}],
                "year": 2022,
                "venue": "Journal of Testing",
                "url": "https://example.org/paper",
                "abstract": null,
                "externalIds": {"DOI": "10.1000/test"},
                "openAccessPdf": null,
                "yearRange": params.get("year").cloned()
            }]
        })),
    )
}

async fn mock_scopus(
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
) -> impl IntoResponse {
    let key = headers
        .get("x-els-apikey")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    if key == "bad-key" {
        return (StatusCode::UNAUTHORIZED, "Invalid API Key".to_string()).into_response();
    }

    Json(json!({
        "search-results": {
            "entry": [{
                "dc:title": params.get("query").cloned().unwrap_or_default(),
                "dc:creator": "Smith J.",
                "dc:identifier": "SCOPUS_ID:1",
                "prism:coverDate": "2021-05-01",
                "prism:publicationName": "Proceedings of Testing",
                "prism:aggregationType": "Conference Proceeding",
                "openaccess": "1",
                "affiliation": [{"affilname": "MIT", "affiliation-country": "United States"}]
            }]
        }
    }))
    .into_response()
}

async fn mock_scholar(Query(params): Query<HashMap<String, String>>) -> Html<String> {
    if params.get("start").map(String::as_str) != Some("0") {
        return Html("<html><body></body></html>".to_string());
    }
    Html(
        r#"<html><body>
        <div class="gs_r gs_or gs_scl">
          <h3 class="gs_rt"><a href="https://example.org/a">First scraped paper</a></h3>
          <div class="gs_a">A Smith - Journal of Things, 2020 - Publisher</div>
          <div class="gs_rs">Snippet one</div>
        </div>
        <div class="gs_r gs_or gs_scl">
          <h3 class="gs_rt"><a href="https://example.org/b">Second scraped paper</a></h3>
          <div class="gs_a">B Jones - Workshop on Stuff, 2019 - Publisher</div>
        </div>
        </body></html>"#
            .to_string(),
    )
}

async fn spawn_upstream() -> String {
    let app = Router::new()
        .route("/chat/completions", post(mock_chat))
        .route("/paper/search", get(mock_semantic_scholar))
        .route("/scopus", get(mock_scopus))
        .route("/scholar", get(mock_scholar));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

// ============================================================================
// Helpers
// ============================================================================

fn settings_for(upstream: &str) -> Settings {
    Settings {
        openai_api_key: Some("sk-test-openai-key".to_string()),
        deepseek_api_key: Some("sk-test-deepseek-key".to_string()),
        semantic_scholar_api_key: Some("ss-test-key".to_string()),
        scopus_api_key: Some("scopus-test-key".to_string()),
        openai_base_url: upstream.to_string(),
        deepseek_base_url: upstream.to_string(),
        semantic_scholar_base_url: upstream.to_string(),
        scopus_base_url: format!("{}/scopus", upstream),
        scholar_base_url: upstream.to_string(),
        ..Settings::default()
    }
}

fn app(settings: Settings) -> Router {
    let review = ReviewService::from_settings(settings).unwrap();
    router(Arc::new(AppState { review }))
}

async fn app_with_upstream() -> Router {
    let upstream = spawn_upstream().await;
    app(settings_for(&upstream))
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_string(&body).unwrap()))
        .unwrap()
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, Vec<u8>) {
    let resp = ServiceExt::<Request<Body>>::oneshot(app, request).await.unwrap();
    let status = resp.status();
    let body = axum::body::to_bytes(resp.into_body(), 1_000_000).await.unwrap();
    (status, body.to_vec())
}

async fn send_json(app: Router, request: Request<Body>) -> (StatusCode, Value) {
    let (status, body) = send(app, request).await;
    (status, serde_json::from_slice(&body).unwrap())
}

// ============================================================================
// Health & diagnostics
// ============================================================================

#[tokio::test]
async fn test_health_at_root_and_api_prefix() {
    for uri in ["/health", "/api/health"] {
        let app = app(Settings::default());
        let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
        let (status, body) = send(app, request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, b"OK");
    }
}

#[tokio::test]
async fn test_keys_report_masks_secrets() {
    let settings = Settings {
        openai_api_key: Some("sk-1234567890abcdef".to_string()),
        scholar_proxy: Some("http://127.0.0.1:7890".to_string()),
        ..Settings::default()
    };
    let request = Request::builder().uri("/test-keys").body(Body::empty()).unwrap();
    let (status, json) = send_json(app(settings), request).await;

    assert_eq!(status, StatusCode::OK);
    let credentials = json["credentials"].as_array().unwrap();
    assert_eq!(credentials.len(), 4);
    assert_eq!(credentials[0]["env_var"], "OPENAI_API_KEY");
    assert_eq!(credentials[0]["configured"], true);
    assert_eq!(credentials[0]["preview"], "sk-1...cdef");
    assert_eq!(credentials[3]["env_var"], "SCOPUS_API_KEY");
    assert_eq!(credentials[3]["configured"], false);
    assert_eq!(json["scholar_proxy"]["configured"], true);
    assert_eq!(json["scholar_proxy"]["attempted"], false);
}

// ============================================================================
// Planning
// ============================================================================

#[tokio::test]
async fn test_generate_research_questions() {
    let app = app_with_upstream().await;
    let (status, json) = send_json(
        app,
        post_json(
            "/api/generate_research_questions_and_purpose",
            json!({"objective": "Study X and Y", "num_questions": 2, "model_name": "gpt-4o-mini"}),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        json["research_questions"],
        json!([
            {"question": "What is X?", "purpose": "To examine X."},
            {"question": "What is Y?", "purpose": "To investigate Y."}
        ])
    );
}

#[tokio::test]
async fn test_research_questions_truncated_to_requested_count() {
    let app = app_with_upstream().await;
    let (status, json) = send_json(
        app,
        post_json(
            "/generate_research_questions_and_purpose",
            json!({"objective": "Study X", "num_questions": 1, "model_name": "deepseek-chat"}),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["research_questions"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_num_questions_as_string() {
    let app = app_with_upstream().await;
    let (status, json) = send_json(
        app,
        post_json(
            "/generate_research_questions_and_purpose",
            json!({"objective": "Study X", "num_questions": "2"}),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["research_questions"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_missing_objective_is_400() {
    let app = app_with_upstream().await;
    let (status, json) = send_json(
        app,
        post_json("/generate_research_questions_and_purpose", json!({"num_questions": 3})),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["error"].as_str().unwrap().contains("objective"));
}

#[tokio::test]
async fn test_zero_questions_is_400() {
    let app = app_with_upstream().await;
    let (status, _) = send_json(
        app,
        post_json(
            "/generate_research_questions_and_purpose",
            json!({"objective": "X", "num_questions": 0}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_malformed_body_is_json_400() {
    let app = app(Settings::default());
    let request = Request::builder()
        .method("POST")
        .uri("/generate_search_string")
        .header("content-type", "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let (status, json) = send_json(app, request).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["error"].is_string());
}

#[tokio::test]
async fn test_generate_search_string() {
    let app = app_with_upstream().await;
    let (status, json) = send_json(
        app,
        post_json(
            "/generate_search_string",
            json!({
                "objective": "ML in healthcare",
                "research_questions": ["What is X?", {"question": "What is Y?", "purpose": "To examine Y"}]
            }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["search_string"], "\"machine learning\" AND \"healthcare\"");
}

#[tokio::test]
async fn test_unsupported_model_is_400() {
    let app = app_with_upstream().await;
    let (status, json) = send_json(
        app,
        post_json(
            "/generate_search_string",
            json!({"objective": "X", "research_questions": ["Q?"], "model_name": "claude-2"}),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["error"].as_str().unwrap().contains("claude-2"));
}

#[tokio::test]
async fn test_missing_llm_credential_is_500() {
    let upstream = spawn_upstream().await;
    let settings = Settings {
        openai_api_key: None,
        ..settings_for(&upstream)
    };
    let (status, json) = send_json(
        app(settings),
        post_json(
            "/generate-summary-conclusion",
            json!({"papers_info": [{"title": "A"}], "model_name": "gpt-4o"}),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(json["error"].as_str().unwrap().contains("OPENAI_API_KEY"));
}

// ============================================================================
// Search
// ============================================================================

#[tokio::test]
async fn test_search_routes_to_semantic_scholar() {
    let app = app_with_upstream().await;
    let (status, json) = send_json(
        app,
        post_json(
            "/api/search_papers",
            json!({"search_string": "llm", "start_year": 2020, "end_year": 2023, "limit": 5, "source": "semanticscholar"}),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let papers = json.as_array().unwrap();
    assert_eq!(papers.len(), 1);
    assert_eq!(papers[0]["source"], "semanticscholar");
    assert_eq!(papers[0]["title"], "Result for llm");
    assert_eq!(papers[0]["author"], "Ada Lovelace, Alan Turing");
    assert_eq!(papers[0]["doi"], "10.1000/test");
    assert_eq!(papers[0]["paper_type"], "Journal");
}

#[tokio::test]
async fn test_search_defaults_to_scopus() {
    let app = app_with_upstream().await;
    let (status, json) = send_json(
        app,
        post_json(
            "/search_papers",
            json!({"search_string": "llm", "start_year": 2021, "end_year": 2021, "source": "gscholar"}),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let paper = &json[0];
    assert_eq!(paper["source"], "scopus");
    assert_eq!(paper["title"], "TITLE-ABS-KEY(llm) AND PUBYEAR = 2021");
    assert_eq!(paper["year"], "2021");
    assert_eq!(paper["paper_type"], "Conference");
    assert_eq!(paper["affiliation_country"], "United States");
    assert_eq!(paper["open_access"], true);
}

#[tokio::test]
async fn test_search_accepts_numeric_strings() {
    let app = app_with_upstream().await;
    let (status, json) = send_json(
        app,
        post_json(
            "/api/search_papers",
            json!({"search_string": "llm", "start_year": "2021", "end_year": "2021", "limit": "10", "source": "scopus"}),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json[0]["title"], "TITLE-ABS-KEY(llm) AND PUBYEAR = 2021");
}

#[tokio::test]
async fn test_search_rejects_non_numeric_year() {
    let app = app_with_upstream().await;
    let (status, json) = send_json(
        app,
        post_json("/search_papers", json!({"search_string": "llm", "start_year": "soon"})),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["error"].as_str().unwrap().contains("whole number"));
}

#[tokio::test]
async fn test_search_missing_credential() {
    let upstream = spawn_upstream().await;
    let settings = Settings {
        scopus_api_key: None,
        ..settings_for(&upstream)
    };
    let (status, json) = send_json(
        app(settings),
        post_json("/search_papers", json!({"search_string": "llm"})),
    )
    .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(json["error"].as_str().unwrap().contains("SCOPUS_API_KEY"));
}

#[tokio::test]
async fn test_search_upstream_error_keeps_status_and_body() {
    let upstream = spawn_upstream().await;
    let settings = Settings {
        scopus_api_key: Some("bad-key".to_string()),
        ..settings_for(&upstream)
    };
    let (status, json) = send_json(
        app(settings),
        post_json("/search_papers", json!({"search_string": "llm"})),
    )
    .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json["status_code"], 401);
    assert!(json["error"].as_str().unwrap().contains("Invalid API Key"));
}

#[tokio::test]
async fn test_search_inverted_year_range_is_400() {
    let app = app_with_upstream().await;
    let (status, _) = send_json(
        app,
        post_json(
            "/search_papers",
            json!({"search_string": "llm", "start_year": 2024, "end_year": 2020}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_fetch_papers_from_scraper() {
    let app = app_with_upstream().await;
    let (status, json) = send_json(
        app,
        post_json("/fetch_papers", json!({"search_string": "machine learning", "limit": 2})),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let papers = json.as_array().unwrap();
    assert_eq!(papers.len(), 2);
    assert_eq!(papers[0]["title"], "First scraped paper");
    assert_eq!(papers[0]["abstract"], "Snippet one");
    assert_eq!(papers[1]["paper_type"], "Conference");
    assert_eq!(papers[1]["source"], "scholar");
}

// ============================================================================
// Screening & synthesis
// ============================================================================

#[tokio::test]
async fn test_filter_papers_skips_entries_without_title() {
    let app = app_with_upstream().await;
    let (status, json) = send_json(
        app,
        post_json(
            "/filter_papers",
            json!({
                "search_string": "\"machine learning\" AND \"healthcare\"",
                "papers": [
                    {"title": "Deep learning for diagnosis", "year": "2022"},
                    {"year": "2021"},
                    {"title": "A history of cooking"},
                    {"title": "Clinical NLP survey"}
                ]
            }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let titles: Vec<&str> = json["filtered_papers"]
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["title"].as_str().unwrap())
        .collect();
    assert_eq!(titles, vec!["Deep learning for diagnosis", "Clinical NLP survey"]);
}

#[tokio::test]
async fn test_answer_question() {
    let app = app_with_upstream().await;
    let (status, json) = send_json(
        app,
        post_json(
            "/answer_question",
            json!({
                "questions": ["What is X?", {"question": "What is Y?"}],
                "papers_info": [{"title": "A", "creator": "Smith", "year": "2020"}]
            }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let answers = json["answers"].as_array().unwrap();
    assert_eq!(answers.len(), 2);
    assert_eq!(answers[1]["question"], "What is Y?");
    assert_eq!(answers[1]["answer"], "Generated text.");
    assert!(answers[0].get("error").is_none());
}

#[tokio::test]
async fn test_summary_sections() {
    let upstream = spawn_upstream().await;

    let (status, json) = send_json(
        app(settings_for(&upstream)),
        post_json(
            "/generate-summary-abstract",
            json!({"research_questions": [{"question": "Q1?"}], "objective": "X", "search_string": "x AND y"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["summary_abstract"], "Generated text.");

    let (status, json) = send_json(
        app(settings_for(&upstream)),
        post_json(
            "/generate-introduction-summary",
            json!({
                "total_papers": [{}, {}, {}],
                "filtered_papers": [{}],
                "research_questions": ["Q1?"],
                "objective": "X",
                "search_string": "x AND y",
                "answers": [{"question": "Q1?", "answer": "Yes."}]
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["introduction_summary"], "Generated text.");

    let (status, json) = send_json(
        app(settings_for(&upstream)),
        post_json("/generate-summary-conclusion", json!({"papers_info": []})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["error"].as_str().unwrap().contains("papers_info"));
}

// ============================================================================
// Document assembly
// ============================================================================

#[tokio::test]
async fn test_summary_all_renders_document() {
    let mut template = NamedTempFile::new().unwrap();
    write!(
        template,
        "\\begin{{abstract}}{{{{abstract}}}}\\end{{abstract}}\n{{{{introduction}}}}\n{{{{conclusion}}}}"
    )
    .unwrap();
    let settings = Settings {
        template_path: template.path().to_path_buf(),
        ..Settings::default()
    };

    let request = post_json(
        "/api/generate-summary-all",
        json!({"abstract_summary": "Costs fell 40%", "conclusion_summary": "Done"}),
    );
    let resp = ServiceExt::<Request<Body>>::oneshot(app(settings), request).await.unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.headers()["content-type"], "application/x-tex");
    assert!(resp.headers()["content-disposition"]
        .to_str()
        .unwrap()
        .contains("paper_summary.tex"));

    let body = axum::body::to_bytes(resp.into_body(), 1_000_000).await.unwrap();
    let text = String::from_utf8(body.to_vec()).unwrap();
    assert!(text.contains("\\begin{abstract}Costs fell 40\\%\\end{abstract}"));
    assert!(text.contains("No introduction provided."));
    assert!(text.ends_with("Done"));
}

#[tokio::test]
async fn test_summary_all_missing_template_is_500() {
    let settings = Settings {
        template_path: "/nonexistent/latex_template.tex".into(),
        ..Settings::default()
    };
    let (status, json) = send_json(
        app(settings),
        post_json("/generate-summary-all", json!({"abstract_summary": "A"})),
    )
    .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(json["error"].as_str().unwrap().contains("template"));
}
