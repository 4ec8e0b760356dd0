//! Adjusted closing prices at the three reference dates.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{Days, NaiveDate};
use market_data_api::types::DailyClose;
use serde::Serialize;

use crate::error::DashboardError;

/// Pseudo-ticker of the cash position. Always priced at 1.0.
pub const CASH_TICKER: &str = "CASH";

/// The three dates every ticker is priced at, derived from the as-of date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ReferenceDates {
    pub today: NaiveDate,
    pub yesterday: NaiveDate,
    pub one_year_ago: NaiveDate,
}

impl ReferenceDates {
    pub fn for_as_of(today: NaiveDate) -> Self {
        Self {
            today,
            yesterday: today.checked_sub_days(Days::new(1)).unwrap_or(today),
            one_year_ago: today.checked_sub_days(Days::new(365)).unwrap_or(today),
        }
    }

    /// Inclusive window covering every reference date plus the one-day
    /// fallback on each side.
    pub fn fetch_window(&self) -> (NaiveDate, NaiveDate) {
        let start = self
            .one_year_ago
            .checked_sub_days(Days::new(1))
            .unwrap_or(self.one_year_ago);
        let end = self.today.checked_add_days(Days::new(1)).unwrap_or(self.today);
        (start, end)
    }
}

/// One ticker's prices at the reference dates. NaN marks an unresolved price.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PriceSnapshot {
    pub last_year: f64,
    pub yesterday: f64,
    pub today: f64,
}

impl PriceSnapshot {
    pub const CASH: Self = Self {
        last_year: 1.0,
        yesterday: 1.0,
        today: 1.0,
    };

    pub const UNRESOLVED: Self = Self {
        last_year: f64::NAN,
        yesterday: f64::NAN,
        today: f64::NAN,
    };

    pub fn daily_return(&self) -> f64 {
        self.today / self.yesterday - 1.0
    }

    pub fn annual_return(&self) -> f64 {
        self.today / self.last_year - 1.0
    }

    /// Picks the snapshot out of a close series.
    pub fn from_closes(closes: &[DailyClose], dates: &ReferenceDates) -> Self {
        Self {
            last_year: price_near(closes, dates.one_year_ago).unwrap_or(f64::NAN),
            yesterday: price_near(closes, dates.yesterday).unwrap_or(f64::NAN),
            today: price_near(closes, dates.today).unwrap_or(f64::NAN),
        }
    }
}

/// Close on `target`, else the nearest close one day either side. The
/// earlier day wins a tie.
pub fn price_near(closes: &[DailyClose], target: NaiveDate) -> Option<f64> {
    let on = |date: Option<NaiveDate>| {
        date.and_then(|d| closes.iter().find(|c| c.date == d))
            .map(|c| c.adj_close)
    };
    on(Some(target))
        .or_else(|| on(target.checked_sub_days(Days::new(1))))
        .or_else(|| on(target.checked_add_days(Days::new(1))))
}

/// Ticker-indexed price snapshots.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PriceTable {
    prices: HashMap<String, PriceSnapshot>,
}

impl PriceTable {
    pub fn insert(&mut self, ticker: impl Into<String>, snapshot: PriceSnapshot) {
        self.prices.insert(ticker.into(), snapshot);
    }

    /// Snapshot for `ticker`. Cash resolves to 1.0 everywhere, unknown
    /// tickers to NaN.
    pub fn get(&self, ticker: &str) -> PriceSnapshot {
        if ticker == CASH_TICKER {
            return PriceSnapshot::CASH;
        }
        self.prices
            .get(ticker)
            .copied()
            .unwrap_or(PriceSnapshot::UNRESOLVED)
    }

    pub fn len(&self) -> usize {
        self.prices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prices.is_empty()
    }
}

/// Source of daily adjusted closes.
#[async_trait]
pub trait PriceSource: Send + Sync {
    /// Closes for `ticker` between `start` and `end`, inclusive, ascending.
    ///
    /// An unknown ticker yields an empty series, not an error.
    async fn daily_closes(
        &self,
        ticker: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<DailyClose>, DashboardError>;
}

/// Prices every distinct ticker at the reference dates with one series
/// request per ticker. Cash is never requested.
///
/// A ticker whose fetch fails is logged and left unresolved.
pub async fn fetch_price_table<S>(source: &S, tickers: &[String], dates: &ReferenceDates) -> PriceTable
where
    S: PriceSource + ?Sized,
{
    let (start, end) = dates.fetch_window();
    let mut table = PriceTable::default();
    for ticker in tickers {
        if ticker == CASH_TICKER || table.prices.contains_key(ticker) {
            continue;
        }
        let snapshot = match source.daily_closes(ticker, start, end).await {
            Ok(closes) => PriceSnapshot::from_closes(&closes, dates),
            Err(e) => {
                tracing::warn!("Price fetch failed, leaving {} unresolved: {}", ticker, e);
                table.insert(ticker.clone(), PriceSnapshot::UNRESOLVED);
                continue;
            }
        };
        if snapshot.today.is_nan() {
            tracing::warn!("No price for {} around {}", ticker, dates.today);
        }
        table.insert(ticker.clone(), snapshot);
    }
    table
}
