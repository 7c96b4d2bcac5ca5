//! Tavily search client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use tracing::{debug, instrument, warn};

use leadmagnet_core::SearchProvider;
use leadmagnet_shared::{LeadMagnetError, Result, SearchConfig, SearchResponse, redact_secrets};

use crate::{USER_AGENT, body_excerpt, endpoint};

/// Tavily `/search` client implementing [`SearchProvider`].
pub struct TavilyClient {
    client: Client,
    endpoint: String,
    api_key: String,
    search_depth: String,
    include_raw_content: bool,
}

impl TavilyClient {
    pub fn new(config: &SearchConfig, api_key: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| LeadMagnetError::Search(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            endpoint: endpoint(&config.base_url, "search").map_err(LeadMagnetError::Search)?,
            api_key: api_key.into(),
            search_depth: config.search_depth.clone(),
            include_raw_content: config.include_raw_content,
        })
    }
}

#[derive(Debug, Serialize)]
struct SearchRequest<'a> {
    query: &'a str,
    max_results: u32,
    search_depth: &'a str,
    include_raw_content: bool,
}

#[async_trait]
impl SearchProvider for TavilyClient {
    #[instrument(skip_all, fields(max_results = max_results))]
    async fn search(&self, query: &str, max_results: u32) -> Result<SearchResponse> {
        let body = SearchRequest {
            query,
            max_results,
            search_depth: &self.search_depth,
            include_raw_content: self.include_raw_content,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| LeadMagnetError::Search(format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let message = format!("HTTP {status}: {}", body_excerpt(&text));
            warn!(error = %redact_secrets(&message), "search rejected");
            return Err(LeadMagnetError::Search(message));
        }

        let text = response
            .text()
            .await
            .map_err(|e| LeadMagnetError::Search(format!("failed to read response: {e}")))?;
        let parsed: SearchResponse = serde_json::from_str(&text).map_err(|e| {
            LeadMagnetError::Search(format!("malformed response ({e}): {}", body_excerpt(&text)))
        })?;

        debug!(
            hits = parsed.results.as_ref().map(Vec::len),
            "search response received"
        );
        Ok(parsed)
    }
}
