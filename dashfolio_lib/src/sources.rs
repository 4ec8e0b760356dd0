//! Yahoo Finance backed price and holdings sources.

use async_trait::async_trait;
use chrono::NaiveDate;
use market_data_api::types::DailyClose;
use market_data_api::{ChartQuery, Client};

use crate::error::DashboardError;
use crate::indirect::{Constituent, HoldingsSource};
use crate::prices::PriceSource;
use crate::retry::{with_retry, RetryConfig};

/// Price and fund-holdings source over the Yahoo Finance API, with bounded
/// retry on transient failures.
pub struct YahooSource {
    inner: Client,
    retry: RetryConfig,
}

impl Default for YahooSource {
    fn default() -> Self {
        Self::new()
    }
}

impl YahooSource {
    /// Creates a source against the production API, retry limits from the
    /// environment.
    pub fn new() -> Self {
        Self {
            inner: Client::new(),
            retry: RetryConfig::from_env(),
        }
    }

    /// Creates a source with a custom base URL. Used for testing.
    pub fn with_base_url(base_url: &str, retry: RetryConfig) -> Self {
        Self {
            inner: Client::with_base_url(base_url),
            retry,
        }
    }
}

#[async_trait]
impl PriceSource for YahooSource {
    async fn daily_closes(
        &self,
        ticker: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<DailyClose>, DashboardError> {
        let query = ChartQuery::between(start, end);
        let label = format!("chart {}", ticker);
        let result = with_retry(&self.retry, &label, || self.inner.get_chart(ticker, &query)).await;
        match result {
            Ok(resp) => Ok(resp
                .into_result()
                .map(|r| r.adjusted_closes())
                .unwrap_or_default()),
            Err(err) if err.is_not_found() => {
                tracing::warn!("Yahoo has no price data for {}", ticker);
                Ok(Vec::new())
            }
            Err(err) => Err(DashboardError::market_data(ticker, err)),
        }
    }
}

#[async_trait]
impl HoldingsSource for YahooSource {
    async fn constituents(&self, fund: &str) -> Result<Vec<Constituent>, DashboardError> {
        let label = format!("holdings {}", fund);
        let result = with_retry(&self.retry, &label, || self.inner.get_top_holdings(fund)).await;
        let top = match result {
            Ok(top) => top,
            Err(err) if err.is_not_found() => {
                tracing::warn!("Yahoo has no holdings data for {}", fund);
                return Ok(Vec::new());
            }
            Err(err) => return Err(DashboardError::market_data(fund, err)),
        };
        Ok(top
            .holdings
            .into_iter()
            .filter_map(|h| {
                let weight = h.weight().unwrap_or(f64::NAN);
                let ticker = match h.symbol {
                    Some(s) if !s.trim().is_empty() => s,
                    _ => {
                        tracing::debug!(
                            "Skipping {} constituent without symbol: {:?}",
                            fund,
                            h.holding_name
                        );
                        return None;
                    }
                };
                Some(Constituent {
                    name: h.holding_name.unwrap_or_else(|| ticker.clone()),
                    ticker,
                    weight,
                })
            })
            .collect())
    }
}
