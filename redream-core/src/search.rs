//! Interpretation search: web snippets about the dream, in its original language
//!
//! `SearchProvider` is the narrow seam (`query -> snippets`); `BingSearchClient`
//! scrapes Bing's result page. The scraper depends on Bing's markup
//! (`<li class="b_algo">` containers with a `<p>` snippet) and will silently
//! find nothing if that markup changes.
//!
//! `InterpretationSearcher` never fails: provider errors and empty result sets
//! become fixed human-readable strings stored with the record.

use async_trait::async_trait;
use regex::Regex;
use reqwest::header::USER_AGENT;
use reqwest::Client;
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use thiserror::Error;

use crate::config::SearchConfig;

/// At most this many snippets are kept per search.
pub const MAX_SNIPPETS: usize = 3;

/// Separator between rendered snippets.
pub const SNIPPET_DELIMITER: &str = "<br>";

/// Stored when the provider answered but no snippet could be parsed.
pub const NO_RESULTS_PLACEHOLDER: &str = "검색 결과를 찾을 수 없습니다.";

/// Prefix of the string stored when the search request itself failed.
pub const SEARCH_ERROR_PREFIX: &str = "검색 요청 중 오류가 발생했습니다";

#[derive(Error, Debug)]
pub enum SearchError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("search provider returned status {0}")]
    Status(u16),
}

#[async_trait]
pub trait SearchProvider: Send + Sync {
    /// Issue one search and return the snippet texts in page order.
    async fn snippets(&self, query: &str) -> Result<Vec<String>, SearchError>;
}

// ============================================================================
// BingSearchClient
// ============================================================================

#[derive(Debug, Clone)]
pub struct BingSearchClient {
    client: Client,
    base_url: String,
    user_agent: String,
}

impl BingSearchClient {
    pub fn new(config: &SearchConfig) -> Result<Self, SearchError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            user_agent: config.user_agent.clone(),
        })
    }
}

#[async_trait]
impl SearchProvider for BingSearchClient {
    async fn snippets(&self, query: &str) -> Result<Vec<String>, SearchError> {
        let url = format!("{}/search", self.base_url);
        let response = self
            .client
            .get(&url)
            .query(&[("q", query)])
            .header(USER_AGENT, &self.user_agent)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(SearchError::Status(status.as_u16()));
        }

        let body = response.text().await?;
        Ok(parse_bing_snippets(&body))
    }
}

fn result_container_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?i)<li\b[^>]*\bclass\s*=\s*["'][^"']*\bb_algo\b[^"']*["'][^>]*>"#)
            .expect("valid regex")
    })
}

fn paragraph_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?is)<p\b[^>]*>(.*?)</p>").expect("valid regex"))
}

fn tag_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)<[^>]*>").expect("valid regex"))
}

fn li_tag_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)<(/?)li\b").expect("valid regex"))
}

/// Byte offset of the `</li>` closing the container whose body starts at `start`.
fn container_end(html: &str, start: usize) -> usize {
    let mut depth = 1usize;
    for caps in li_tag_re().captures_iter(&html[start..]) {
        let Some(tag) = caps.get(0) else { continue };
        if caps.get(1).map_or(false, |slash| !slash.as_str().is_empty()) {
            depth -= 1;
            if depth == 0 {
                return start + tag.start();
            }
        } else {
            depth += 1;
        }
    }
    html.len()
}

/// Extract the first `<p>` text of every `b_algo` result container.
pub fn parse_bing_snippets(html: &str) -> Vec<String> {
    result_container_re()
        .find_iter(html)
        .filter_map(|open| {
            let start = open.end();
            let section = &html[start..container_end(html, start)];
            let inner = paragraph_re().captures(section)?.get(1)?.as_str();
            let text = clean_text(inner);
            (!text.is_empty()).then_some(text)
        })
        .collect()
}

/// Strip tags, decode every HTML entity and collapse whitespace.
fn clean_text(fragment: &str) -> String {
    let stripped = tag_re().replace_all(fragment, "");
    let decoded = html_escape::decode_html_entities(&stripped);
    decoded.split_whitespace().collect::<Vec<_>>().join(" ")
}

// ============================================================================
// InterpretationSearcher
// ============================================================================

/// Degrading search stage: always yields a string to store.
#[derive(Clone)]
pub struct InterpretationSearcher {
    provider: Arc<dyn SearchProvider>,
    query_suffix: String,
}

impl InterpretationSearcher {
    pub fn new(provider: Arc<dyn SearchProvider>, query_suffix: impl Into<String>) -> Self {
        Self {
            provider,
            query_suffix: query_suffix.into(),
        }
    }

    pub fn build_query(&self, dream_text: &str) -> String {
        let text = dream_text.trim();
        if self.query_suffix.is_empty() {
            text.to_string()
        } else {
            format!("{} {}", text, self.query_suffix)
        }
    }

    pub async fn search(&self, dream_text: &str) -> String {
        let query = self.build_query(dream_text);

        match self.provider.snippets(&query).await {
            Ok(snippets) if snippets.is_empty() => {
                tracing::warn!("Interpretation search returned no parsable results");
                NO_RESULTS_PLACEHOLDER.to_string()
            }
            Ok(snippets) => {
                tracing::debug!(found = snippets.len(), "Interpretation search succeeded");
                snippets
                    .into_iter()
                    .take(MAX_SNIPPETS)
                    .collect::<Vec<_>>()
                    .join(SNIPPET_DELIMITER)
            }
            Err(e) => {
                tracing::warn!(error = %e, "Interpretation search failed, storing placeholder");
                format!("{SEARCH_ERROR_PREFIX}: {e}")
            }
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
