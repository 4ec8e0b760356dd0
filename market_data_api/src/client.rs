//! HTTP client for the Yahoo Finance chart and quoteSummary endpoints.

use std::time::Duration;

use serde::de::DeserializeOwned;
use url::Url;

use crate::{
    query::{ChartQuery, Query, QuoteSummaryModule, QuoteSummaryQuery},
    types::{ChartResponse, QuoteSummaryResponse, TopHoldings},
    user_agent::get_user_agent,
    Error,
};

/// Per-request timeout.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// HTTP client for Yahoo Finance market data.
///
/// Sends requests with browser-like headers and a randomized user agent to
/// avoid being blocked. Each request builds a fresh `reqwest::Client` with
/// a 30-second timeout.
pub struct Client {
    /// Base URL for the API. Defaults to `https://query1.finance.yahoo.com`.
    base_api_url: String,
}

impl Default for Client {
    fn default() -> Self {
        Self::new()
    }
}

impl Client {
    /// Creates a new client pointing at the production Yahoo Finance API.
    pub fn new() -> Self {
        Self {
            base_api_url: "https://query1.finance.yahoo.com".to_string(),
        }
    }

    /// Creates a new client with a custom base URL. Used for testing with wiremock.
    pub fn with_base_url(base_url: &str) -> Self {
        Self {
            base_api_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn get_url(&self, segments: &[&str], query: &impl Query) -> Result<Url, Error> {
        let endpoint = format!("/{}", segments.join("/"));
        let mut url = Url::parse(&self.base_api_url).map_err(|e| {
            tracing::error!("Invalid base URL {}: {}", self.base_api_url, e);
            Error::RequestFailed {
                endpoint: endpoint.clone(),
                reason: e.to_string(),
            }
        })?;
        url.path_segments_mut()
            .map_err(|_| Error::RequestFailed {
                endpoint: endpoint.clone(),
                reason: "base URL cannot carry a path".to_string(),
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(query.add_to_url(&url))
    }

    async fn get<T, Q>(&self, segments: &[&str], query: &Q) -> Result<T, Error>
    where
        T: DeserializeOwned,
        Q: Query,
    {
        let endpoint = format!("/{}", segments.join("/"));
        let url = self.get_url(segments, query)?;
        let client = reqwest::Client::builder()
            .user_agent(get_user_agent())
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| {
                tracing::error!("Failed to build HTTP client: {}", e);
                Error::RequestFailed {
                    endpoint: endpoint.clone(),
                    reason: e.to_string(),
                }
            })?;
        let resp = client
            .get(url)
            .header("accept", "application/json, text/plain, */*")
            .header("accept-language", "en-US,en;q=0.9")
            .header("origin", "https://finance.yahoo.com")
            .header("referer", "https://finance.yahoo.com")
            .send()
            .await
            .map_err(|e| {
                tracing::error!("Failed to get {}: {}", endpoint, e);
                Error::RequestFailed {
                    endpoint: endpoint.clone(),
                    reason: e.to_string(),
                }
            })?;

        let status = resp.status();
        let body = resp.text().await.map_err(|e| {
            tracing::error!("Failed to read response body from {}: {}", endpoint, e);
            Error::RequestFailed {
                endpoint: endpoint.clone(),
                reason: e.to_string(),
            }
        })?;

        if !status.is_success() {
            let snippet = truncate_body(&body);
            tracing::debug!("{} returned status {}: {}", endpoint, status, snippet);
            return Err(Error::HttpStatus {
                endpoint,
                status: status.as_u16(),
                body: snippet,
            });
        }

        serde_json::from_str::<T>(&body).map_err(|e| {
            let snippet = truncate_body(&body);
            tracing::error!("Failed to parse {}: {} | body: {}", endpoint, e, snippet);
            Error::ParseFailed {
                endpoint,
                reason: e.to_string(),
            }
        })
    }

    /// Fetches daily bars for one symbol over the query's window.
    pub async fn get_chart(&self, symbol: &str, query: &ChartQuery) -> Result<ChartResponse, Error> {
        self.get::<ChartResponse, ChartQuery>(&["v8", "finance", "chart", symbol], query)
            .await
    }

    /// Fetches the raw quoteSummary payload for the requested modules.
    pub async fn get_quote_summary(
        &self,
        symbol: &str,
        query: &QuoteSummaryQuery,
    ) -> Result<QuoteSummaryResponse, Error> {
        self.get::<QuoteSummaryResponse, QuoteSummaryQuery>(
            &["v10", "finance", "quoteSummary", symbol],
            query,
        )
        .await
    }

    /// Fetches a fund's published top holdings.
    ///
    /// Returns an empty [`TopHoldings`] when Yahoo answers without the module
    /// (symbols that are not funds).
    pub async fn get_top_holdings(&self, symbol: &str) -> Result<TopHoldings, Error> {
        let query = QuoteSummaryQuery::default().with_module(QuoteSummaryModule::TopHoldings);
        let resp = self.get_quote_summary(symbol, &query).await?;
        Ok(resp.into_top_holdings().unwrap_or_default())
    }
}

fn truncate_body(body: &str) -> String {
    const MAX: usize = 2000;
    if body.len() <= MAX {
        body.to_string()
    } else {
        let cut = (0..=MAX).rev().find(|i| body.is_char_boundary(*i)).unwrap_or(0);
        format!("{}...[truncated]", &body[..cut])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_url_encodes_symbol_segment() {
        let client = Client::with_base_url("https://example.com/");
        let url = client
            .get_url(&["v10", "finance", "quoteSummary", "EUR/USD"], &QuoteSummaryQuery::default())
            .unwrap();
        assert_eq!(url.path(), "/v10/finance/quoteSummary/EUR%2FUSD");
    }

    #[test]
    fn test_truncate_body_respects_char_boundaries() {
        let body = "é".repeat(1500);
        let out = truncate_body(&body);
        assert!(out.ends_with("...[truncated]"));
        assert!(out.len() <= 2000 + "...[truncated]".len());
    }

    #[test]
    fn test_truncate_body_short_passthrough() {
        assert_eq!(truncate_body("Not Found"), "Not Found");
    }
}
