//! Elsevier Scopus Search API client.
//!
//! One GET per search, one page of at most `limit` entries. The query matches
//! title, abstract and keywords and is restricted to a publication year range.

use crate::config::SCOPUS_KEY_VAR;
use crate::error::{Result, SlrError};
use crate::paper::{or_not_available, PaperRecord, PaperSource, PaperType, NOT_AVAILABLE};
use crate::search::YearRange;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Request timeout in seconds
const REQUEST_TIMEOUT_SECS: u64 = 60;

#[derive(Debug, Deserialize)]
struct ScopusResponse {
    #[serde(rename = "search-results")]
    search_results: Option<ScopusResults>,
}

#[derive(Debug, Deserialize)]
struct ScopusResults {
    entry: Option<Vec<ScopusEntry>>,
}

#[derive(Debug, Deserialize)]
struct ScopusEntry {
    /// Present on the placeholder entry Scopus returns for an empty result set
    error: Option<String>,
    #[serde(rename = "dc:title")]
    title: Option<String>,
    #[serde(rename = "dc:creator")]
    creator: Option<String>,
    #[serde(rename = "dc:identifier")]
    identifier: Option<String>,
    #[serde(rename = "prism:coverDate")]
    cover_date: Option<String>,
    #[serde(rename = "prism:publicationName")]
    publication_name: Option<String>,
    #[serde(rename = "prism:aggregationType")]
    aggregation_type: Option<String>,
    #[serde(rename = "prism:volume")]
    volume: Option<String>,
    #[serde(rename = "prism:doi")]
    doi: Option<String>,
    /// "0"/"1" in practice, occasionally a bool or number
    openaccess: Option<Value>,
    affiliation: Option<Vec<ScopusAffiliation>>,
    link: Option<Vec<ScopusLink>>,
}

#[derive(Debug, Deserialize)]
struct ScopusAffiliation {
    affilname: Option<String>,
    #[serde(rename = "affiliation-country")]
    affiliation_country: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ScopusLink {
    #[serde(rename = "@ref")]
    rel: Option<String>,
    #[serde(rename = "@href")]
    href: Option<String>,
}

fn parse_open_access(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => n.as_i64().map(|n| n == 1),
        Value::String(s) => Some(s.trim() == "1" || s.eq_ignore_ascii_case("true")),
        _ => None,
    }
}

/// Paper type from Scopus' aggregation type, falling back to the venue name.
fn classify(aggregation_type: Option<&str>, venue: &str) -> PaperType {
    match aggregation_type.map(str::to_lowercase).as_deref() {
        Some("journal") => PaperType::Journal,
        Some(t) if t.contains("conference") => PaperType::Conference,
        _ => PaperType::classify(venue),
    }
}

impl From<ScopusEntry> for PaperRecord {
    fn from(entry: ScopusEntry) -> Self {
        let venue = entry.publication_name.unwrap_or_default();
        let first_affiliation = entry.affiliation.and_then(|a| a.into_iter().next());
        let year = entry
            .cover_date
            .as_deref()
            .and_then(|d| d.split('-').next())
            .map(str::to_string);
        let url = entry.link.and_then(|links| {
            links
                .into_iter()
                .find(|l| l.rel.as_deref() == Some("scopus"))
                .and_then(|l| l.href)
        });

        let mut record = PaperRecord::empty(PaperSource::Scopus);
        record.title = or_not_available(entry.title);
        record.author = or_not_available(entry.creator);
        record.year = or_not_available(year);
        record.paper_type = classify(entry.aggregation_type.as_deref(), &venue);
        record.venue = or_not_available(Some(venue));
        record.doi = or_not_available(entry.doi);
        record.url = or_not_available(url);
        record.identifier = Some(or_not_available(entry.identifier));
        record.volume = Some(or_not_available(entry.volume));
        record.open_access = Some(entry.openaccess.as_ref().and_then(parse_open_access).unwrap_or(false));
        record.affiliation = Some(
            first_affiliation
                .as_ref()
                .and_then(|a| a.affilname.clone())
                .unwrap_or_else(|| NOT_AVAILABLE.to_string()),
        );
        record.affiliation_country = Some(
            first_affiliation
                .and_then(|a| a.affiliation_country)
                .unwrap_or_else(|| NOT_AVAILABLE.to_string()),
        );
        record
    }
}

/// Scopus boolean query for a search string and year range.
pub fn build_query(search_string: &str, years: YearRange) -> String {
    if years.start == years.end {
        format!("TITLE-ABS-KEY({}) AND PUBYEAR = {}", search_string, years.start)
    } else {
        format!(
            "TITLE-ABS-KEY({}) AND PUBYEAR > {} AND PUBYEAR < {}",
            search_string,
            years.start - 1,
            years.end + 1
        )
    }
}

/// Client for the Scopus Search API
pub struct ScopusClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl ScopusClient {
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

    /// Run one search. Non-200 responses come back as [`SlrError::Api`] with
    /// the status code and body text untouched.
    pub async fn search(
        &self,
        search_string: &str,
        years: YearRange,
        limit: usize,
    ) -> Result<Vec<PaperRecord>> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or(SlrError::MissingCredential(SCOPUS_KEY_VAR))?;

        let query = build_query(search_string, years);
        let count = limit.to_string();

        info!(query = %query, count = %count, "Starting Scopus search");
        debug!(url = %self.base_url, "Sending search request");

        let response = self
            .client
            .get(&self.base_url)
            .header("X-ELS-APIKey", api_key)
            .header("Accept", "application/json")
            .query(&[("query", query.as_str()), ("count", count.as_str())])
            .send()
            .await?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            let error_text = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), error = %error_text, "Failed to fetch papers from Scopus");
            return Err(SlrError::Api {
                code: status.as_u16(),
                message: error_text,
            });
        }

        let body: ScopusResponse = response
            .json()
            .await
            .map_err(|e| SlrError::Parse(format!("Failed to parse Scopus response: {}", e)))?;

        let papers: Vec<PaperRecord> = body
            .search_results
            .and_then(|r| r.entry)
            .unwrap_or_default()
            .into_iter()
            .filter(|e| e.error.is_none())
            .map(PaperRecord::from)
            .collect();

        info!(found = papers.len(), "Scopus search complete");
        Ok(papers)
    }
}
