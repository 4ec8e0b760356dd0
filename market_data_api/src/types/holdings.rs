//! Types for the `topHoldings` module of `/v10/finance/quoteSummary/{symbol}`.

use serde::{Deserialize, Serialize};

use super::{ApiErrorBody, RawValue};

#[derive(Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct QuoteSummaryResponse {
    pub quote_summary: QuoteSummaryEnvelope,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct QuoteSummaryEnvelope {
    pub result: Option<Vec<QuoteSummaryResult>>,
    pub error: Option<ApiErrorBody>,
}

#[derive(Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct QuoteSummaryResult {
    pub top_holdings: Option<TopHoldings>,
}

/// A fund's published top positions plus its asset-class split.
#[derive(Serialize, Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct TopHoldings {
    #[serde(default)]
    pub holdings: Vec<FundHolding>,
    #[serde(default)]
    pub stock_position: Option<RawValue>,
    #[serde(default)]
    pub bond_position: Option<RawValue>,
    #[serde(default)]
    pub cash_position: Option<RawValue>,
}

/// One constituent of a fund.
///
/// `holding_percent` is a fraction of the fund (0.07 = 7 %), not a percentage.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct FundHolding {
    pub symbol: Option<String>,
    pub holding_name: Option<String>,
    #[serde(default)]
    pub holding_percent: Option<RawValue>,
}

impl FundHolding {
    pub fn weight(&self) -> Option<f64> {
        self.holding_percent.as_ref().and_then(RawValue::value)
    }
}

impl QuoteSummaryResponse {
    /// The `topHoldings` module of the first result, if Yahoo returned one.
    pub fn into_top_holdings(self) -> Option<TopHoldings> {
        self.quote_summary
            .result
            .and_then(|r| r.into_iter().next())
            .and_then(|r| r.top_holdings)
    }
}
