//! Google Sheets values API client for reading the portfolio table.

use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;
use url::Url;

use crate::normalize::RawTable;
use crate::retry::Retryable;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Error, Debug)]
pub enum SheetsError {
    #[error("Sheets request failed: {0}")]
    Network(#[from] reqwest::Error),
    #[error("Sheets API returned {status}: {body}")]
    Api { status: u16, body: String },
    #[error("Sheet {sheet} of spreadsheet {spreadsheet_id} has no rows")]
    EmptySheet {
        spreadsheet_id: String,
        sheet: String,
    },
    #[error("Invalid Sheets URL: {0}")]
    InvalidUrl(String),
}

impl Retryable for SheetsError {
    fn is_retryable(&self) -> bool {
        match self {
            Self::Network(e) => !e.is_decode(),
            Self::Api { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<serde_json::Value>>,
}

/// Where the portfolio lives in a spreadsheet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SheetRange {
    pub spreadsheet_id: String,
    pub sheet_name: String,
    pub range: String,
}

impl SheetRange {
    /// A1 notation of the range, e.g. `portfolio!A:Z`.
    pub fn a1(&self) -> String {
        format!("{}!{}", self.sheet_name, self.range)
    }
}

/// Client for `GET /v4/spreadsheets/{id}/values/{range}`.
pub struct SheetsClient {
    base_url: String,
    http: reqwest::Client,
}

impl SheetsClient {
    pub fn new() -> Result<Self, SheetsError> {
        Self::with_base_url("https://sheets.googleapis.com")
    }

    /// Creates a client with a custom base URL. Used for testing with wiremock.
    pub fn with_base_url(base_url: &str) -> Result<Self, SheetsError> {
        let http = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http,
        })
    }

    fn values_url(&self, range: &SheetRange) -> Result<Url, SheetsError> {
        let mut url =
            Url::parse(&self.base_url).map_err(|e| SheetsError::InvalidUrl(e.to_string()))?;
        url.path_segments_mut()
            .map_err(|_| SheetsError::InvalidUrl(self.base_url.clone()))?
            .pop_if_empty()
            .extend(["v4", "spreadsheets", range.spreadsheet_id.as_str(), "values"])
            .push(&range.a1());
        Ok(url)
    }

    /// Reads the range as a table whose first row holds the headers.
    pub async fn get_table(&self, access_token: &str, range: &SheetRange) -> Result<RawTable, SheetsError> {
        let url = self.values_url(range)?;
        tracing::debug!("Fetching sheet range {}", range.a1());
        let resp = self.http.get(url).bearer_auth(access_token).send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(SheetsError::Api {
                status: status.as_u16(),
                body: body.chars().take(500).collect(),
            });
        }
        let values: ValueRange = resp.json().await?;
        let grid: Vec<Vec<String>> = values
            .values
            .into_iter()
            .map(|row| row.into_iter().map(cell_text).collect())
            .collect();
        RawTable::from_values(grid).map_err(|_| SheetsError::EmptySheet {
            spreadsheet_id: range.spreadsheet_id.clone(),
            sheet: range.sheet_name.clone(),
        })
    }
}

fn cell_text(value: serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s,
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    }
}
