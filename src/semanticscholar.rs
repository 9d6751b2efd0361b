//! Semantic Scholar API Client
//!
//! Keyword search over the Academic Graph API.
//!
//! API Details:
//! - Search endpoint: GET /graph/v1/paper/search
//! - `year` accepts a range such as `2019-2024`
//! - Requires an API key in the `x-api-key` header for this service

use crate::config::SEMANTIC_SCHOLAR_KEY_VAR;
use crate::error::{Result, SlrError};
use crate::paper::{or_not_available, PaperRecord, PaperSource, PaperType};
use crate::search::YearRange;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Fields requested for every paper
const SEARCH_FIELDS: &str = "title,authors,year,url,venue,abstract,externalIds,openAccessPdf";

/// Request timeout in seconds
const REQUEST_TIMEOUT_SECS: u64 = 60;

#[derive(Debug, Deserialize)]
struct SSSearchResponse {
    data: Option<Vec<SSPaper>>,
}

#[derive(Debug, Deserialize)]
struct SSPaper {
    title: Option<String>,
    authors: Option<Vec<SSAuthor>>,
    year: Option<i32>,
    url: Option<String>,
    venue: Option<String>,
    #[serde(rename = "abstract")]
    abstract_text: Option<String>,
    #[serde(rename = "externalIds")]
    external_ids: Option<SSExternalIds>,
    #[serde(rename = "openAccessPdf")]
    oa_pdf: Option<SSOpenAccessPdf>,
}

#[derive(Debug, Deserialize)]
struct SSAuthor {
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SSOpenAccessPdf {
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SSExternalIds {
    #[serde(rename = "DOI")]
    doi: Option<String>,
}

impl From<SSPaper> for PaperRecord {
    fn from(paper: SSPaper) -> Self {
        let authors = paper
            .authors
            .unwrap_or_default()
            .into_iter()
            .filter_map(|a| a.name)
            .filter(|n| !n.trim().is_empty())
            .collect::<Vec<_>>()
            .join(", ");
        let venue = paper.venue.unwrap_or_default();

        let mut record = PaperRecord::empty(PaperSource::SemanticScholar);
        record.title = or_not_available(paper.title);
        record.author = or_not_available(Some(authors));
        record.year = or_not_available(paper.year.map(|y| y.to_string()));
        record.paper_type = PaperType::classify(&venue);
        record.venue = or_not_available(Some(venue));
        record.doi = or_not_available(paper.external_ids.and_then(|ids| ids.doi));
        record.url = or_not_available(paper.url);
        record.abstract_text = paper.abstract_text.filter(|a| !a.trim().is_empty());
        record.pdf_url = paper.oa_pdf.and_then(|p| p.url).filter(|u| !u.is_empty());
        record
    }
}

/// Client for the Semantic Scholar search endpoint
pub struct SemanticScholarClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl SemanticScholarClient {
    pub fn new(base_url: &str, api_key: Option<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| SlrError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        })
    }

    /// Search papers by keyword within a publication year range.
    ///
    /// A missing API key is reported as [`SlrError::MissingCredential`] without
    /// touching the network.
    pub async fn search(
        &self,
        query: &str,
        years: YearRange,
        limit: usize,
    ) -> Result<Vec<PaperRecord>> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or(SlrError::MissingCredential(SEMANTIC_SCHOLAR_KEY_VAR))?;

        let url = format!("{}/paper/search", self.base_url);
        let year = format!("{}-{}", years.start, years.end);
        let limit = limit.to_string();

        info!(query = query, year = %year, limit = %limit, "Starting Semantic Scholar search");
        debug!(url = %url, "Sending search request");

        let response = self
            .client
            .get(&url)
            .header("x-api-key", api_key)
            .query(&[
                ("query", query),
                ("year", year.as_str()),
                ("limit", limit.as_str()),
                ("fields", SEARCH_FIELDS),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), error = %error_text, "API error");
            return Err(SlrError::Api {
                code: status.as_u16(),
                message: error_text,
            });
        }

        let body: SSSearchResponse = response.json().await.map_err(|e| {
            SlrError::Parse(format!("Failed to parse Semantic Scholar response: {}", e))
        })?;

        let papers: Vec<PaperRecord> = body
            .data
            .unwrap_or_default()
            .into_iter()
            .map(PaperRecord::from)
            .collect();
        info!(found = papers.len(), "Semantic Scholar search complete");
        Ok(papers)
    }
}
