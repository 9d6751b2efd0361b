//! Google Scholar scraping backend.
//!
//! Result pages are fetched over plain HTTP and parsed with CSS selectors.
//! An optional outbound proxy is set up lazily, at most once per client, the
//! first time a request goes out. A failed proxy setup is logged and the client
//! carries on without one; it is never retried.

use crate::error::{Result, SlrError};
use crate::paper::{or_not_available, PaperRecord, PaperSource, PaperType};
use crate::search::YearRange;
use once_cell::sync::{Lazy, OnceCell};
use regex::Regex;
use scraper::{Html, Selector};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

/// User agent string for requests
const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36";

/// Results Scholar serves per page
const PAGE_SIZE: usize = 10;

/// Request timeout in seconds
const REQUEST_TIMEOUT_SECS: u64 = 30;

static YEAR_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(19|20)\d{2}\b").expect("valid year regex"));

/// One parsed entry of a Scholar result page
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScholarHit {
    pub title: String,
    pub author: String,
    pub year: String,
    pub venue: String,
    pub url: String,
    pub snippet: String,
}

impl From<ScholarHit> for PaperRecord {
    fn from(hit: ScholarHit) -> Self {
        let nonempty = |s: String| Some(s).filter(|s| !s.trim().is_empty());
        let paper_type = PaperType::classify(&hit.venue);
        let mut record = PaperRecord::empty(PaperSource::Scholar);
        record.title = or_not_available(Some(hit.title));
        record.author = or_not_available(Some(hit.author));
        record.year = or_not_available(Some(hit.year));
        record.venue = or_not_available(Some(hit.venue));
        record.url = or_not_available(Some(hit.url));
        record.abstract_text = nonempty(hit.snippet);
        record.paper_type = paper_type;
        record
    }
}

/// Scholar client owning the one-time proxy initialisation.
pub struct ScholarClient {
    base_url: String,
    proxy_url: Option<String>,
    direct: reqwest::Client,
    proxied: OnceCell<Option<reqwest::Client>>,
    proxy_attempted: AtomicBool,
}

impl ScholarClient {
    pub fn new(base_url: &str, proxy_url: Option<String>) -> Result<Self> {
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            proxy_url,
            direct: client_builder().build().map_err(|e| {
                SlrError::Config(format!("Failed to build HTTP client: {}", e))
            })?,
            proxied: OnceCell::new(),
            proxy_attempted: AtomicBool::new(false),
        })
    }

    /// Whether proxy setup has been attempted in this process.
    pub fn proxy_attempted(&self) -> bool {
        self.proxy_attempted.load(Ordering::Acquire)
    }

    pub fn proxy_configured(&self) -> bool {
        self.proxy_url.is_some()
    }

    /// Client for outgoing requests; sets up the proxy on first use.
    fn http_client(&self) -> &reqwest::Client {
        let proxied = self.proxied.get_or_init(|| self.setup_proxy());
        proxied.as_ref().unwrap_or(&self.direct)
    }

    fn setup_proxy(&self) -> Option<reqwest::Client> {
        let proxy_url = self.proxy_url.as_deref()?;
        self.proxy_attempted.store(true, Ordering::Release);

        let built = reqwest::Proxy::all(proxy_url)
            .and_then(|proxy| client_builder().proxy(proxy).build());

        match built {
            Ok(client) => {
                info!(proxy = proxy_url, "Proxy setup completed");
                Some(client)
            }
            Err(e) => {
                warn!(proxy = proxy_url, error = %e, "Proxy setup failed, continuing without proxy");
                None
            }
        }
    }

    /// Lazily paged iterator over search results.
    pub fn cursor<'a>(&'a self, query: &'a str, years: Option<YearRange>) -> ResultCursor<'a> {
        ResultCursor {
            client: self,
            query,
            years,
            next_start: 0,
            buffer: VecDeque::new(),
            exhausted: false,
        }
    }

    /// Pull up to `limit` results, stopping early when the cursor runs dry.
    pub async fn search(
        &self,
        query: &str,
        years: Option<YearRange>,
        limit: usize,
    ) -> Result<Vec<PaperRecord>> {
        info!(query = query, limit = limit, url = %self.base_url, "Starting Google Scholar query");

        let mut cursor = self.cursor(query, years);
        let mut papers = Vec::new();
        for _ in 0..limit {
            match cursor.next_hit().await? {
                Some(hit) => papers.push(PaperRecord::from(hit)),
                None => break,
            }
        }

        info!(total = papers.len(), "Google Scholar query complete");
        Ok(papers)
    }

    async fn fetch_page(&self, url: &Url) -> Result<String> {
        let response = self
            .http_client()
            .get(url.as_str())
            .header("Accept", "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8")
            .header("Accept-Language", "en-US,en;q=0.9")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(SlrError::Api {
                code: status.as_u16(),
                message,
            });
        }

        Ok(response.text().await?)
    }
}

fn client_builder() -> reqwest::ClientBuilder {
    reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
        .cookie_store(true)
}

/// Walks Scholar result pages on demand.
pub struct ResultCursor<'a> {
    client: &'a ScholarClient,
    query: &'a str,
    years: Option<YearRange>,
    next_start: usize,
    buffer: VecDeque<ScholarHit>,
    exhausted: bool,
}

impl ResultCursor<'_> {
    /// Next result, or `None` once Scholar has nothing more to give.
    ///
    /// Only a failure on the very first page is an error; later failures just
    /// end the iteration.
    pub async fn next_hit(&mut self) -> Result<Option<ScholarHit>> {
        if self.buffer.is_empty() && !self.exhausted {
            let first_page = self.next_start == 0;
            match self.load_page().await {
                Ok(0) => self.exhausted = true,
                Ok(_) => {}
                Err(e) if first_page => return Err(e),
                Err(e) => {
                    warn!(start = self.next_start, error = %e, "Stopping Scholar pagination");
                    self.exhausted = true;
                }
            }
        }
        Ok(self.buffer.pop_front())
    }

    async fn load_page(&mut self) -> Result<usize> {
        if self.next_start > 0 {
            // Random delay between pages to avoid detection
            let delay = rand::random::<u64>() % 1500 + 500;
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }

        let url = build_search_url(&self.client.base_url, self.query, self.next_start, self.years)?;
        debug!(url = %url, "Fetching Scholar page");

        let html = self.client.fetch_page(&url).await?;
        if html.contains("Solving the above CAPTCHA") || html.contains("unusual traffic") {
            return Err(SlrError::Api {
                code: 429,
                message: "Google Scholar CAPTCHA detected".to_string(),
            });
        }

        let hits = parse_result_items(&html)?;
        debug!(start = self.next_start, count = hits.len(), "Parsed Scholar page");

        self.next_start += PAGE_SIZE;
        let count = hits.len();
        self.buffer.extend(hits);
        Ok(count)
    }
}

/// Build Google Scholar search URL
fn build_search_url(
    base_url: &str,
    query: &str,
    start: usize,
    years: Option<YearRange>,
) -> Result<Url> {
    let mut url = Url::parse(&format!("{}/scholar", base_url))
        .map_err(|e| SlrError::Config(format!("Invalid Scholar base URL: {}", e)))?;

    {
        let mut params = url.query_pairs_mut();
        params.append_pair("q", query);
        params.append_pair("hl", "en-US"); // English locale keeps the markup parseable
        params.append_pair("start", &start.to_string());
        if let Some(years) = years {
            params.append_pair("as_ylo", &years.start.to_string());
            params.append_pair("as_yhi", &years.end.to_string());
        }
    }

    Ok(url)
}

fn selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| SlrError::Parse(e.to_string()))
}

/// Parse a Scholar result page. Entries without a title are dropped.
pub fn parse_result_items(html: &str) -> Result<Vec<ScholarHit>> {
    let document = Html::parse_document(html);

    let item_selector = selector("div.gs_r.gs_or.gs_scl")?;
    let title_selector = selector("h3.gs_rt")?;
    let link_selector = selector("h3.gs_rt a")?;
    let meta_selector = selector("div.gs_a")?;
    let snippet_selector = selector("div.gs_rs")?;

    let mut results = Vec::new();

    for item in document.select(&item_selector) {
        let mut hit = ScholarHit::default();

        if let Some(link) = item.select(&link_selector).next() {
            hit.title = link.text().collect::<String>().trim().to_string();
            hit.url = link.value().attr("href").unwrap_or("").to_string();
        } else if let Some(title_elem) = item.select(&title_selector).next() {
            hit.title = title_elem.text().collect::<String>().trim().to_string();
        }

        // "A Author, B Author - Venue, 2021 - publisher"
        if let Some(meta_elem) = item.select(&meta_selector).next() {
            let meta_text = meta_elem.text().collect::<String>();
            let parts: Vec<&str> = meta_text.split(" - ").collect();

            if let Some(authors) = parts.first() {
                hit.author = authors.trim().to_string();
            }

            if let Some(venue_year) = parts.get(1) {
                if let Some(year_match) = YEAR_REGEX.find(venue_year) {
                    hit.year = year_match.as_str().to_string();
                    hit.venue = venue_year[..year_match.start()]
                        .trim()
                        .trim_end_matches(',')
                        .to_string();
                } else {
                    hit.venue = venue_year.trim().to_string();
                }
            }
        }

        if let Some(snippet_elem) = item.select(&snippet_selector).next() {
            hit.snippet = snippet_elem.text().collect::<String>().trim().to_string();
        }

        if !hit.title.is_empty() {
            results.push(hit);
        }
    }

    Ok(results)
}
