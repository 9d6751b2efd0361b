//! Common paper record produced by every search backend.

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

/// Sentinel for fields the upstream did not provide
pub const NOT_AVAILABLE: &str = "Not Available";

/// Best-effort classification of where a paper was published
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaperType {
    Journal,
    Conference,
    #[serde(rename = "Primary Study")]
    PrimaryStudy,
}

impl PaperType {
    /// Guess the paper type from a venue name.
    pub fn classify(venue: &str) -> Self {
        let venue = venue.to_lowercase();
        if venue.contains("journal") {
            PaperType::Journal
        } else if ["conference", "proceedings", "symposium", "workshop"]
            .iter()
            .any(|k| venue.contains(k))
        {
            PaperType::Conference
        } else {
            PaperType::PrimaryStudy
        }
    }
}

/// Which backend produced a record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaperSource {
    Scholar,
    SemanticScholar,
    Scopus,
}

/// A single paper as returned to clients
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaperRecord {
    pub title: String,
    pub author: String,
    pub year: String,
    pub venue: String,
    pub doi: String,
    pub url: String,
    #[serde(rename = "abstract", default, skip_serializing_if = "Option::is_none")]
    pub abstract_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pdf_url: Option<String>,
    pub paper_type: PaperType,
    pub source: PaperSource,
    /// Provider-side identifier (e.g. "SCOPUS_ID:85012345678")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identifier: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub affiliation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub affiliation_country: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub open_access: Option<bool>,
}

impl PaperRecord {
    /// Record with every field set to its "missing" default.
    pub fn empty(source: PaperSource) -> Self {
        Self {
            title: NOT_AVAILABLE.to_string(),
            author: NOT_AVAILABLE.to_string(),
            year: NOT_AVAILABLE.to_string(),
            venue: NOT_AVAILABLE.to_string(),
            doi: NOT_AVAILABLE.to_string(),
            url: NOT_AVAILABLE.to_string(),
            abstract_text: None,
            pdf_url: None,
            paper_type: PaperType::PrimaryStudy,
            source,
            identifier: None,
            affiliation: None,
            affiliation_country: None,
            volume: None,
            open_access: None,
        }
    }
}

/// Use `value` unless it is blank, in which case fall back to [`NOT_AVAILABLE`].
pub fn or_not_available(value: Option<String>) -> String {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| NOT_AVAILABLE.to_string())
}

/// Flat row for CSV output; optional fields become empty cells.
#[derive(Debug, Serialize)]
struct CsvRow<'a> {
    title: &'a str,
    author: &'a str,
    year: &'a str,
    venue: &'a str,
    doi: &'a str,
    url: &'a str,
    paper_type: PaperType,
    source: PaperSource,
    pdf_url: &'a str,
    #[serde(rename = "abstract")]
    abstract_text: &'a str,
}

impl<'a> From<&'a PaperRecord> for CsvRow<'a> {
    fn from(p: &'a PaperRecord) -> Self {
        Self {
            title: &p.title,
            author: &p.author,
            year: &p.year,
            venue: &p.venue,
            doi: &p.doi,
            url: &p.url,
            paper_type: p.paper_type,
            source: p.source,
            pdf_url: p.pdf_url.as_deref().unwrap_or(""),
            abstract_text: p.abstract_text.as_deref().unwrap_or(""),
        }
    }
}

/// Save papers to a CSV file with a header row.
pub fn save_csv(path: &Path, papers: &[PaperRecord]) -> Result<()> {
    let mut wtr = csv::WriterBuilder::new().has_headers(true).from_path(path)?;

    for paper in papers {
        wtr.serialize(CsvRow::from(paper))?;
    }

    wtr.flush()?;
    info!(count = papers.len(), path = ?path, "Saved papers to CSV");
    Ok(())
}
