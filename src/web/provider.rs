//! Search provider trait and the Bing implementation.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub const BING_SEARCH_URL: &str = "https://api.bing.microsoft.com/v7.0/search";

/// A single search result.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResult {
    /// Page title. May contain HTML highlighting.
    pub name: String,
    pub url: String,
    pub snippet: String,
}

/// Results of one query, in ranking order.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct SearchResponse {
    pub query: String,
    pub results: Vec<SearchResult>,
}

/// Trait for search backends.
#[async_trait]
pub trait SearchProvider: Send + Sync {
    /// Run `query` against the given market code (e.g. `de-DE`).
    ///
    /// # Errors
    ///
    /// Returns an error if the search request fails.
    async fn search(&self, query: &str, market: &str) -> Result<SearchResponse>;

    /// Get the provider name for logging/debugging.
    fn provider_name(&self) -> &'static str;
}

/// Bing Web Search API provider.
///
/// The key is optional so the tool can be registered without one; every
/// search then fails with a configuration error.
#[derive(Clone)]
pub struct BingSearchProvider {
    client: reqwest::Client,
    api_key: Option<String>,
    endpoint: String,
}

impl BingSearchProvider {
    #[must_use]
    pub fn new(api_key: Option<String>) -> Self {
        Self::with_client(reqwest::Client::new(), api_key)
    }

    /// Create a provider with a custom HTTP client.
    #[must_use]
    pub fn with_client(client: reqwest::Client, api_key: Option<String>) -> Self {
        Self {
            client,
            api_key: api_key.filter(|k| !k.is_empty()),
            endpoint: BING_SEARCH_URL.to_string(),
        }
    }

    #[must_use]
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    #[must_use]
    pub const fn has_key(&self) -> bool {
        self.api_key.is_some()
    }
}

impl std::fmt::Debug for BingSearchProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BingSearchProvider")
            .field("endpoint", &self.endpoint)
            .field("has_key", &self.has_key())
            .finish_non_exhaustive()
    }
}

/// Bing Web Search API response structures
mod bing_api {
    use serde::Deserialize;

    #[derive(Debug, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct BingSearchResponse {
        pub web_pages: Option<BingWebPages>,
    }

    #[derive(Debug, Deserialize)]
    pub struct BingWebPages {
        #[serde(default)]
        pub value: Vec<BingWebPage>,
    }

    #[derive(Debug, Deserialize)]
    pub struct BingWebPage {
        pub name: String,
        pub url: String,
        #[serde(default)]
        pub snippet: String,
    }
}

/// Convert a Bing response body into results.
pub(crate) fn parse_bing_response(query: &str, body: &str) -> Result<SearchResponse> {
    let response: bing_api::BingSearchResponse =
        serde_json::from_str(body).context("Failed to parse Bing Search API response")?;

    let results = response
        .web_pages
        .map(|pages| {
            pages
                .value
                .into_iter()
                .map(|p| SearchResult {
                    name: p.name,
                    url: p.url,
                    snippet: p.snippet,
                })
                .collect()
        })
        .unwrap_or_default();

    Ok(SearchResponse {
        query: query.to_string(),
        results,
    })
}

#[async_trait]
impl SearchProvider for BingSearchProvider {
    async fn search(&self, query: &str, market: &str) -> Result<SearchResponse> {
        let Some(api_key) = self.api_key.as_deref() else {
            anyhow::bail!("Bing search is not configured (BING_SEARCH_API_KEY is not set)");
        };

        let response = self
            .client
            .get(&self.endpoint)
            .header("Ocp-Apim-Subscription-Key", api_key)
            .query(&[
                ("q", query),
                ("textDecorations", "true"),
                ("textFormat", "HTML"),
                ("mkt", market),
            ])
            .send()
            .await
            .context("Failed to send request to Bing Search API")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Bing Search API error: {status} - {body}");
        }

        let body = response
            .text()
            .await
            .context("Failed to read Bing Search API response")?;
        parse_bing_response(query, &body)
    }

    fn provider_name(&self) -> &'static str {
        "bing"
    }
}
