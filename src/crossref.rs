//! Crossref API client for ISSN metadata harvesting.
//!
//! This module issues one `/works` query per (ISSN, month) pair, filtered by
//! publication date, and projects the returned works into flat [`Article`]
//! records ready for CSV output.

use crate::error::{HarvestError, Result};
use crate::harvest::ArticleSource;
use serde::Deserialize;
use std::future::Future;
use std::time::Duration;
use tracing::debug;

/// Crossref API base URL
const CROSSREF_API_URL: &str = "https://api.crossref.org/works";

/// Polite pool email for Crossref API
const MAILTO: &str = "issnharvest@example.com";

/// Per-request wall-clock bound
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// One article as consumed from a Crossref work.
///
/// Fields absent in the source are empty strings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Article {
    /// DOI
    pub doi: String,
    /// Article title (first of the title list, may be absent)
    pub title: String,
    /// Volume
    pub volume: String,
    /// Issue
    pub issue: String,
    /// Page range
    pub page: String,
    /// Journal title (first of the container-title list, may be absent)
    pub journal: String,
    /// Publisher
    pub publisher: String,
}

/// Outcome of a single metadata request.
///
/// Non-200 responses are surfaced explicitly instead of being collapsed into
/// an empty result, so the caller decides whether to log, retry, or abort.
#[derive(Debug, Clone)]
pub enum FetchOutcome {
    /// Status 200: the matching works (possibly empty, possibly truncated
    /// at the page-size cap).
    Fetched(Vec<Article>),
    /// Any non-200 status.
    Rejected {
        /// HTTP status code returned by the API
        status: u16,
    },
}

/// Crossref API client.
///
/// One request in flight at a time; the harvest loop paces requests with a
/// fixed delay, so the client itself carries no rate limiting.
pub struct CrossrefClient {
    client: reqwest::Client,
    page_size: u32,
}

impl CrossrefClient {
    /// Create a new CrossrefClient.
    ///
    /// # Arguments
    ///
    /// * `page_size` - Maximum works requested per query; results beyond it
    ///   are dropped (no pagination past the first page).
    pub fn new(page_size: u32) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(format!("issnharvest/0.1 (mailto:{})", MAILTO))
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| HarvestError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { client, page_size })
    }

    /// Query works for one ISSN within one month of the given year.
    ///
    /// Transport failures (timeout, connect, malformed body) propagate as
    /// errors; non-200 statuses are returned as [`FetchOutcome::Rejected`].
    async fn do_fetch(&self, issn: &str, year: i32, month: u32) -> Result<FetchOutcome> {
        // The until bound uses the literal day 31 for every month; Crossref
        // accepts it as an inclusive upper bound even for shorter months.
        let filter = format!(
            "issn:{issn},from-pub-date:{year}-{month:02}-01,until-pub-date:{year}-{month:02}-31"
        );

        let response = self
            .client
            .get(CROSSREF_API_URL)
            .query(&[
                ("filter", filter.as_str()),
                ("rows", &self.page_size.to_string()),
            ])
            .send()
            .await?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            return Ok(FetchOutcome::Rejected {
                status: status.as_u16(),
            });
        }

        let data: WorksResponse = response.json().await?;
        let articles: Vec<Article> = data.message.items.into_iter().map(parse_work).collect();

        debug!(issn, year, month, count = articles.len(), "Fetched works");
        Ok(FetchOutcome::Fetched(articles))
    }
}

impl ArticleSource for CrossrefClient {
    fn fetch(
        &self,
        issn: &str,
        year: i32,
        month: u32,
    ) -> impl Future<Output = Result<FetchOutcome>> + Send {
        self.do_fetch(issn, year, month)
    }
}

// === Crossref API Response Types ===

#[derive(Debug, Deserialize)]
struct WorksResponse {
    message: WorksMessage,
}

#[derive(Debug, Deserialize)]
struct WorksMessage {
    #[serde(default)]
    items: Vec<WorkItem>,
}

#[derive(Debug, Default, Deserialize)]
struct WorkItem {
    #[serde(rename = "DOI", default)]
    doi: String,
    #[serde(default)]
    title: Vec<String>,
    #[serde(default)]
    volume: String,
    #[serde(default)]
    issue: String,
    #[serde(default)]
    page: String,
    #[serde(rename = "container-title", default)]
    container_title: Vec<String>,
    #[serde(default)]
    publisher: String,
}

/// Project a Crossref work item into a flat article record.
fn parse_work(item: WorkItem) -> Article {
    Article {
        doi: item.doi,
        title: item.title.into_iter().next().unwrap_or_default(),
        volume: item.volume,
        issue: item.issue,
        page: item.page,
        journal: item.container_title.into_iter().next().unwrap_or_default(),
        publisher: item.publisher,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_work() {
        let item = WorkItem {
            doi: "10.1234/test".to_string(),
            title: vec!["Test Title".to_string()],
            volume: "12".to_string(),
            issue: "3".to_string(),
            page: "45-67".to_string(),
            container_title: vec!["Nature".to_string()],
            publisher: "Springer".to_string(),
        };

        let article = parse_work(item);
        assert_eq!(article.doi, "10.1234/test");
        assert_eq!(article.title, "Test Title");
        assert_eq!(article.volume, "12");
        assert_eq!(article.issue, "3");
        assert_eq!(article.page, "45-67");
        assert_eq!(article.journal, "Nature");
        assert_eq!(article.publisher, "Springer");
    }

    #[test]
    fn test_parse_work_empty_lists_become_empty_strings() {
        let article = parse_work(WorkItem::default());
        assert_eq!(article.title, "");
        assert_eq!(article.journal, "");
        assert_eq!(article.doi, "");
    }

    #[test]
    fn test_response_shape_with_defaults() {
        let value = json!({
            "message": {
                "items": [
                    {
                        "DOI": "10.5555/x",
                        "title": ["Only Title"],
                        "container-title": []
                    },
                    {}
                ]
            }
        });

        let response: WorksResponse =
            serde_json::from_value(value).expect("response shape parses");
        assert_eq!(response.message.items.len(), 2);

        let first = parse_work(
            response
                .message
                .items
                .into_iter()
                .next()
                .expect("first item"),
        );
        assert_eq!(first.doi, "10.5555/x");
        assert_eq!(first.title, "Only Title");
        assert_eq!(first.journal, "");
        assert_eq!(first.volume, "");
    }

    #[test]
    fn test_response_without_items_list() {
        let value = json!({ "message": {} });
        let response: WorksResponse =
            serde_json::from_value(value).expect("response shape parses");
        assert!(response.message.items.is_empty());
    }
}
