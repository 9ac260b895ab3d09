//! Reference search client.
//!
//! Fetches news items from `GET {base_url}/api/news?query=...` and classifies
//! the result the way the search panel reports it.

use std::fmt;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::error::{TransportError, TransportErrorKind};
use crate::session::ReferenceItem;

const NEWS_PATH: &str = "/api/news";

/// Default search timeout in seconds.
pub const DEFAULT_SEARCH_TIMEOUT_SECS: u64 = 15;

pub const SEARCH_TIMEOUT_TEXT: &str = "요청 시간이 초과되었습니다. 다시 시도해 주세요.";
pub const SEARCH_ERROR_TEXT: &str = "뉴스 검색 중 오류가 발생했습니다.";

/// Classified result of one search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchOutcome {
    /// Number of items returned.
    Found(usize),
    Empty,
    Timeout,
    /// Any other failure; carries the detail for logs.
    Failed(String),
}

impl SearchOutcome {
    /// Classifies a search result into an outcome plus the items to cache.
    pub fn classify(
        result: Result<Vec<ReferenceItem>, TransportError>,
    ) -> (Self, Vec<ReferenceItem>) {
        match result {
            Ok(items) if items.is_empty() => (SearchOutcome::Empty, items),
            Ok(items) => (SearchOutcome::Found(items.len()), items),
            Err(err) if err.kind == TransportErrorKind::Timeout => {
                (SearchOutcome::Timeout, Vec::new())
            }
            Err(err) => (SearchOutcome::Failed(err.to_string()), Vec::new()),
        }
    }

    /// User-facing text for outcomes that need one.
    pub fn notice(&self, query: &str) -> Option<String> {
        match self {
            SearchOutcome::Found(_) => None,
            SearchOutcome::Empty => Some(format!("'{query}'에 대한 최신 뉴스가 없습니다.")),
            SearchOutcome::Timeout => Some(SEARCH_TIMEOUT_TEXT.to_string()),
            SearchOutcome::Failed(_) => Some(SEARCH_ERROR_TEXT.to_string()),
        }
    }
}

/// Why a search was not started.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchRejected {
    Blank,
    InProgress,
}

impl fmt::Display for SearchRejected {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SearchRejected::Blank => write!(f, "search query is empty"),
            SearchRejected::InProgress => write!(f, "a search is already in progress"),
        }
    }
}

impl std::error::Error for SearchRejected {}

/// HTTP client for the news search endpoint.
#[derive(Debug, Clone)]
pub struct NewsSearch {
    endpoint: String,
    http: reqwest::Client,
}

impl NewsSearch {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            endpoint: format!("{}{NEWS_PATH}", base_url.trim_end_matches('/')),
            http,
        })
    }

    /// Runs one search. The caller is expected to have rejected blank queries.
    pub async fn search(&self, query: &str) -> Result<Vec<ReferenceItem>, TransportError> {
        let response = self
            .http
            .get(&self.endpoint)
            .query(&[("query", query)])
            .send()
            .await
            .map_err(|e| TransportError::from_reqwest(&e))?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            return Err(TransportError::http_status(status.as_u16(), &error_body));
        }

        response
            .json::<Vec<ReferenceItem>>()
            .await
            .map_err(|e| TransportError::from_reqwest(&e))
    }
}
