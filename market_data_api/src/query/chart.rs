use std::fmt::Display;

use chrono::{Days, NaiveDate};
use url::Url;

use super::Query;

/// Bar size for the chart endpoint.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ChartInterval {
    #[default]
    OneDay,
    OneWeek,
    OneMonth,
}

impl Display for ChartInterval {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::OneDay => "1d",
            Self::OneWeek => "1wk",
            Self::OneMonth => "1mo",
        };
        write!(f, "{}", s)
    }
}

/// Query for `/v8/finance/chart/{symbol}` over an explicit date window.
///
/// `period1` is inclusive and `period2` exclusive, both as unix seconds at
/// UTC midnight.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChartQuery {
    pub period1: i64,
    pub period2: i64,
    pub interval: ChartInterval,
    pub include_events: bool,
}

impl ChartQuery {
    /// Daily bars from `start` through `end`, both inclusive.
    pub fn between(start: NaiveDate, end: NaiveDate) -> Self {
        let end_exclusive = end.checked_add_days(Days::new(1)).unwrap_or(end);
        Self {
            period1: midnight_utc(start),
            period2: midnight_utc(end_exclusive),
            interval: ChartInterval::OneDay,
            include_events: true,
        }
    }

    pub fn with_interval(mut self, interval: ChartInterval) -> Self {
        self.interval = interval;
        self
    }

    pub fn without_events(mut self) -> Self {
        self.include_events = false;
        self
    }
}

impl Query for ChartQuery {
    fn add_to_url(&self, url: &Url) -> Url {
        let mut url = url.clone();
        url.query_pairs_mut()
            .append_pair("period1", &self.period1.to_string())
            .append_pair("period2", &self.period2.to_string())
            .append_pair("interval", &self.interval.to_string());
        if self.include_events {
            url.query_pairs_mut().append_pair("events", "div,splits");
        }
        url.query_pairs_mut()
            .append_pair("includeAdjustedClose", "true");
        url
    }
}

fn midnight_utc(date: NaiveDate) -> i64 {
    date.and_hms_opt(0, 0, 0)
        .map(|dt| dt.and_utc().timestamp())
        .unwrap_or_default()
}
