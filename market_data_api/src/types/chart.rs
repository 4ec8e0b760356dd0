//! Types for the `/v8/finance/chart/{symbol}` endpoint.

use chrono::{DateTime, NaiveDate};
use serde::{Deserialize, Serialize};

use super::ApiErrorBody;

/// Top-level chart payload: `{"chart": {"result": [...], "error": null}}`.
#[derive(Serialize, Deserialize, Debug)]
pub struct ChartResponse {
    pub chart: ChartEnvelope,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct ChartEnvelope {
    pub result: Option<Vec<ChartResult>>,
    pub error: Option<ApiErrorBody>,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct ChartResult {
    pub meta: ChartMeta,
    /// Bar timestamps (unix seconds, UTC). Absent when the window has no trading days.
    #[serde(default)]
    pub timestamp: Vec<i64>,
    pub indicators: Indicators,
}

#[derive(Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct ChartMeta {
    pub symbol: String,
    pub currency: Option<String>,
    pub exchange_name: Option<String>,
    pub instrument_type: Option<String>,
    /// Offset of the exchange's local time from UTC, in seconds.
    #[serde(rename = "gmtoffset", default)]
    pub gmt_offset: i64,
    pub exchange_timezone_name: Option<String>,
    pub regular_market_price: Option<f64>,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct Indicators {
    #[serde(default)]
    pub quote: Vec<Quote>,
    #[serde(default)]
    pub adjclose: Vec<AdjClose>,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct Quote {
    #[serde(default)]
    pub open: Vec<Option<f64>>,
    #[serde(default)]
    pub high: Vec<Option<f64>>,
    #[serde(default)]
    pub low: Vec<Option<f64>>,
    #[serde(default)]
    pub close: Vec<Option<f64>>,
    #[serde(default)]
    pub volume: Vec<Option<i64>>,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct AdjClose {
    #[serde(default)]
    pub adjclose: Vec<Option<f64>>,
}

/// One trading day's adjusted close, dated in the exchange's local calendar.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct DailyClose {
    pub date: NaiveDate,
    pub adj_close: f64,
}

impl ChartResponse {
    /// The first (and for single-symbol requests, only) result.
    pub fn into_result(self) -> Option<ChartResult> {
        self.chart.result.and_then(|r| r.into_iter().next())
    }
}

impl ChartResult {
    /// Adjusted closes aligned with their trading dates, ascending.
    ///
    /// Falls back to the raw close series when Yahoo omits `adjclose`. Bars
    /// with a null price are skipped.
    pub fn adjusted_closes(&self) -> Vec<DailyClose> {
        let series: &[Option<f64>] = match self.indicators.adjclose.first() {
            Some(adj) if !adj.adjclose.is_empty() => &adj.adjclose,
            _ => match self.indicators.quote.first() {
                Some(q) => &q.close,
                None => &[],
            },
        };

        let mut out: Vec<DailyClose> = self
            .timestamp
            .iter()
            .zip(series.iter())
            .filter_map(|(ts, price)| {
                let price = (*price)?;
                let local = DateTime::from_timestamp(ts + self.meta.gmt_offset, 0)?;
                Some(DailyClose {
                    date: local.date_naive(),
                    adj_close: price,
                })
            })
            .collect();
        out.sort_by_key(|c| c.date);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result_json(adjclose: serde_json::Value) -> ChartResult {
        serde_json::from_value(serde_json::json!({
            "meta": {"symbol": "VWCE.DE", "currency": "EUR", "gmtoffset": 3600},
            "timestamp": [1708588800, 1708502400, 1708675200],
            "indicators": {
                "quote": [{"close": [101.0, 100.0, 102.0]}],
                "adjclose": adjclose
            }
        }))
        .unwrap()
    }

    #[test]
    fn test_adjusted_closes_sorted_and_dated_locally() {
        let result = result_json(serde_json::json!([{"adjclose": [100.5, 99.5, null]}]));
        let closes = result.adjusted_closes();
        assert_eq!(closes.len(), 2);
        assert_eq!(closes[0].date, NaiveDate::from_ymd_opt(2024, 2, 21).unwrap());
        assert_eq!(closes[0].adj_close, 99.5);
        assert_eq!(closes[1].date, NaiveDate::from_ymd_opt(2024, 2, 22).unwrap());
        assert_eq!(closes[1].adj_close, 100.5);
    }

    #[test]
    fn test_falls_back_to_close_without_adjclose() {
        let result = result_json(serde_json::json!([]));
        let closes = result.adjusted_closes();
        assert_eq!(closes.len(), 3);
        assert_eq!(closes[2].adj_close, 102.0);
    }

    #[test]
    fn test_no_timestamps_yields_empty() {
        let result: ChartResult = serde_json::from_value(serde_json::json!({
            "meta": {"symbol": "AAPL"},
            "indicators": {"quote": [{}]}
        }))
        .unwrap();
        assert!(result.adjusted_closes().is_empty());
    }
}
