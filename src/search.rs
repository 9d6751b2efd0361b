//! Literature search adapter.
//!
//! Owns one client per backend and routes a [`SearchQuery`] to the right one.
//! Every backend returns the same [`PaperRecord`] shape.

use crate::config::Settings;
use crate::error::{Result, SlrError};
use crate::gscholar::ScholarClient;
use crate::paper::PaperRecord;
use crate::scopus::ScopusClient;
use crate::semanticscholar::SemanticScholarClient;
use chrono::{Datelike, Local};
use tracing::info;

/// Results returned when a request does not set a limit
pub const DEFAULT_LIMIT: usize = 10;

/// How far back the default year range reaches
const DEFAULT_YEARS_BACK: i32 = 5;

/// Inclusive publication year range
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct YearRange {
    pub start: i32,
    pub end: i32,
}

impl YearRange {
    /// Build a range, defaulting the start to five years ago and the end to
    /// the current year.
    pub fn resolve(start: Option<i32>, end: Option<i32>) -> Result<Self> {
        let current_year = Local::now().year();
        let start = start.unwrap_or(current_year - DEFAULT_YEARS_BACK);
        let end = end.unwrap_or(current_year.max(start));

        if start > end {
            return Err(SlrError::Validation(format!(
                "start_year ({}) must not be after end_year ({})",
                start, end
            )));
        }
        Ok(Self { start, end })
    }
}

/// Search backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum SearchSource {
    /// Google Scholar result pages
    #[value(name = "gscholar")]
    Scholar,
    /// Semantic Scholar Academic Graph API
    #[value(name = "semanticscholar")]
    SemanticScholar,
    /// Elsevier Scopus Search API
    #[value(name = "scopus")]
    Scopus,
}

impl SearchSource {
    /// Routing rule for the `source` field of `/search_papers`: only
    /// "semanticscholar" selects Semantic Scholar, anything else is Scopus.
    pub fn from_route_value(source: Option<&str>) -> Self {
        match source.map(str::trim) {
            Some(s) if s.eq_ignore_ascii_case("semanticscholar") => SearchSource::SemanticScholar,
            _ => SearchSource::Scopus,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            SearchSource::Scholar => "Google Scholar",
            SearchSource::SemanticScholar => "Semantic Scholar",
            SearchSource::Scopus => "Scopus",
        }
    }
}

/// One search, fully resolved
#[derive(Debug, Clone, PartialEq)]
pub struct SearchQuery {
    pub query: String,
    pub years: YearRange,
    pub limit: usize,
    pub source: SearchSource,
}

/// Dispatches searches to the configured backends.
pub struct SearchAdapter {
    scholar: ScholarClient,
    semantic_scholar: SemanticScholarClient,
    scopus: ScopusClient,
}

impl SearchAdapter {
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        Ok(Self {
            scholar: ScholarClient::new(&settings.scholar_base_url, settings.scholar_proxy.clone())?,
            semantic_scholar: SemanticScholarClient::new(
                &settings.semantic_scholar_base_url,
                settings.semantic_scholar_api_key.clone(),
            )?,
            scopus: ScopusClient::new(&settings.scopus_base_url, settings.scopus_api_key.clone())?,
        })
    }

    pub fn scholar(&self) -> &ScholarClient {
        &self.scholar
    }

    pub async fn search(&self, request: &SearchQuery) -> Result<Vec<PaperRecord>> {
        info!(
            source = request.source.name(),
            start_year = request.years.start,
            end_year = request.years.end,
            limit = request.limit,
            "Dispatching paper search"
        );

        match request.source {
            SearchSource::Scholar => {
                self.scholar
                    .search(&request.query, Some(request.years), request.limit)
                    .await
            }
            SearchSource::SemanticScholar => {
                self.semantic_scholar
                    .search(&request.query, request.years, request.limit)
                    .await
            }
            SearchSource::Scopus => {
                self.scopus
                    .search(&request.query, request.years, request.limit)
                    .await
            }
        }
    }
}
