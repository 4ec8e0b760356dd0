//! Error types for the library layer.

use std::path::PathBuf;

use thiserror::Error;

use crate::config::ConfigError;
use crate::mail::MailError;
use crate::oauth::OAuthError;
use crate::retry::Retryable;
use crate::schema::SchemaError;
use crate::sheets::SheetsError;
use crate::ticker_rewrite::TickerRewriteError;

/// Errors produced while building or distributing a dashboard.
///
/// Unresolved prices and fund weights are not errors; they travel through the
/// computation as NaN. A market data failure is logged and leaves its ticker
/// unresolved. Everything else aborts the run.
#[derive(Error, Debug)]
pub enum DashboardError {
    #[error(transparent)]
    Schema(#[from] SchemaError),
    /// A market data request kept failing after retries.
    #[error("Market data for {ticker} unavailable: {source}")]
    MarketData {
        ticker: String,
        #[source]
        source: market_data_api::Error,
    },
    #[error(transparent)]
    Sheets(#[from] SheetsError),
    #[error(transparent)]
    OAuth(#[from] OAuthError),
    #[error(transparent)]
    Mail(#[from] MailError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    TickerRewrite(#[from] TickerRewriteError),
    #[error("Failed to read portfolio CSV: {0}")]
    Csv(#[from] csv::Error),
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl DashboardError {
    pub fn market_data(ticker: &str, source: market_data_api::Error) -> Self {
        Self::MarketData {
            ticker: ticker.to_string(),
            source,
        }
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

impl Retryable for DashboardError {
    fn is_retryable(&self) -> bool {
        match self {
            Self::MarketData { source, .. } => source.is_transient(),
            Self::Sheets(e) => e.is_retryable(),
            Self::OAuth(e) => e.is_retryable(),
            _ => false,
        }
    }
}
