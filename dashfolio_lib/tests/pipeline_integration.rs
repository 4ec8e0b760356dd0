use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{Days, NaiveDate};
use dashfolio_lib::market_data_api::types::DailyClose;
use dashfolio_lib::pipeline::{build_dashboard, DashboardSettings};
use dashfolio_lib::schema::{FieldSpec, FieldType, Schema};
use dashfolio_lib::ticker_rewrite::TickerRewrite;
use dashfolio_lib::{Constituent, DashboardError, HoldingsSource, PriceSource, RawTable, SchemaError};

const EPSILON: f64 = 1e-9;

struct StubPrices {
    series: HashMap<String, Vec<DailyClose>>,
}

#[async_trait]
impl PriceSource for StubPrices {
    async fn daily_closes(
        &self,
        ticker: &str,
        _start: NaiveDate,
        _end: NaiveDate,
    ) -> Result<Vec<DailyClose>, DashboardError> {
        Ok(self.series.get(ticker).cloned().unwrap_or_default())
    }
}

struct StubHoldings {
    funds: HashMap<String, Vec<Constituent>>,
}

#[async_trait]
impl HoldingsSource for StubHoldings {
    async fn constituents(&self, fund: &str) -> Result<Vec<Constituent>, DashboardError> {
        Ok(self.funds.get(fund).cloned().unwrap_or_default())
    }
}

fn as_of() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 6, 14).unwrap()
}

fn days_before(n: u64) -> NaiveDate {
    as_of().checked_sub_days(Days::new(n)).unwrap()
}

fn series(last_year: f64, yesterday: f64, today: f64) -> Vec<DailyClose> {
    vec![
        DailyClose { date: days_before(365), adj_close: last_year },
        DailyClose { date: days_before(1), adj_close: yesterday },
        DailyClose { date: as_of(), adj_close: today },
    ]
}

fn field(required: bool, field_type: FieldType) -> FieldSpec {
    FieldSpec {
        required,
        field_type,
        format: if field_type == FieldType::Datetime {
            Some("%Y-%m-%d".to_string())
        } else {
            None
        },
        description: String::new(),
    }
}

fn settings() -> DashboardSettings {
    DashboardSettings {
        schema: Schema::new(vec![
            ("ticker".to_string(), field(true, FieldType::String)),
            ("asset_type".to_string(), field(true, FieldType::String)),
            ("holdings".to_string(), field(true, FieldType::Float)),
            ("entry_price".to_string(), field(true, FieldType::Float)),
            ("entry_date".to_string(), field(true, FieldType::Datetime)),
            ("entry_cost".to_string(), field(false, FieldType::Float)),
            ("annual_cost".to_string(), field(false, FieldType::Float)),
            ("exit_cost_fixed_fee".to_string(), field(false, FieldType::Float)),
            ("exit_cost_pct".to_string(), field(false, FieldType::Float)),
            ("dividends_received".to_string(), field(false, FieldType::Float)),
            ("dividends_costs".to_string(), field(false, FieldType::Float)),
        ]),
        tax_rate: 0.28,
        fund_asset_types: vec!["etf".to_string(), "fund".to_string()],
        rewrite: TickerRewrite::from_pairs([("BRK.B", "BRK-B")]).unwrap(),
    }
}

fn raw(rows: &[[&str; 5]]) -> RawTable {
    let mut values = vec![vec![
        "Ticker".to_string(),
        "Asset_Type".to_string(),
        "Holdings".to_string(),
        "Entry_Price".to_string(),
        "Entry_Date".to_string(),
    ]];
    values.extend(rows.iter().map(|r| r.iter().map(|c| c.to_string()).collect()));
    RawTable::from_values(values).unwrap()
}

fn prices() -> StubPrices {
    let mut map = HashMap::new();
    map.insert("XYZ".to_string(), series(100.0, 119.0, 120.0));
    map.insert("VT".to_string(), series(90.0, 99.0, 100.0));
    map.insert("AAPL".to_string(), series(150.0, 190.0, 200.0));
    map.insert("BRK-B".to_string(), series(300.0, 400.0, 410.0));
    StubPrices { series: map }
}

fn holdings() -> StubHoldings {
    let mut funds = HashMap::new();
    funds.insert(
        "VT".to_string(),
        vec![
            Constituent { ticker: "AAPL".to_string(), name: "Apple Inc".to_string(), weight: 0.5 },
            Constituent { ticker: "BRK.B".to_string(), name: "Berkshire Hathaway".to_string(), weight: 0.25 },
            Constituent { ticker: "UNKNOWN".to_string(), name: "Unpriced Co".to_string(), weight: f64::NAN },
        ],
    );
    StubHoldings { funds }
}

#[tokio::test]
async fn reference_holding_produces_expected_kpis() {
    let entry = days_before(365).format("%Y-%m-%d").to_string();
    let table = raw(&[["xyz", "stock", "10", "100", &entry]]);
    let dashboard = build_dashboard(&table, &settings(), as_of(), &prices(), &holdings())
        .await
        .unwrap();

    let xyz = &dashboard.assets[0];
    assert_eq!(xyz.row.ticker, "XYZ");
    assert!((xyz.entry_value - 1000.0).abs() < EPSILON);
    assert!((xyz.current_value - 1200.0).abs() < EPSILON);
    assert!((xyz.net_gain_ex_dividend_pre_tax - 200.0).abs() < EPSILON);
    assert!((xyz.tax_on_gain - 56.0).abs() < EPSILON);
    assert!((xyz.net_gain - 144.0).abs() < EPSILON);
    assert!((xyz.per_annum_roa - 0.144).abs() < EPSILON);
    assert!((dashboard.summary.starting_capital - 1000.0).abs() < EPSILON);
    assert!((dashboard.summary.roc_per_annum_post_tax - 0.144).abs() < EPSILON);
    assert_eq!(dashboard.warnings.len(), 6);
}

#[tokio::test]
async fn funds_decompose_and_cash_stays_flat() {
    let entry = days_before(400).format("%Y-%m-%d").to_string();
    let table = raw(&[
        ["VT", "etf", "6", "80", &entry],
        ["CASH", "cash", "200", "1", &entry],
        ["AAPL", "stock", "1", "120", &entry],
    ]);
    let dashboard = build_dashboard(&table, &settings(), as_of(), &prices(), &holdings())
        .await
        .unwrap();

    // VT 600, CASH 200, AAPL 200
    let by_ticker: HashMap<&str, _> = dashboard
        .indirect
        .iter()
        .map(|p| (p.ticker.as_str(), p))
        .collect();

    let aapl = by_ticker["AAPL"];
    assert_eq!(aapl.name, "Apple Inc");
    assert!((aapl.current_value - 500.0).abs() < EPSILON);
    assert!((aapl.pct_of_portfolio - 0.5).abs() < EPSILON);
    assert!((aapl.annual_return - (200.0 / 150.0 - 1.0)).abs() < EPSILON);

    let brk = by_ticker["BRK-B"];
    assert!((brk.pct_of_portfolio - 0.15).abs() < EPSILON);
    assert!((brk.daily_return - (410.0 / 400.0 - 1.0)).abs() < EPSILON);

    let cash = by_ticker["CASH"];
    assert_eq!(cash.daily_return, 0.0);
    assert_eq!(cash.annual_return, 0.0);
    assert!((cash.pct_of_portfolio - 0.2).abs() < EPSILON);

    let unknown = by_ticker["UNKNOWN"];
    assert!(unknown.pct_of_portfolio.is_nan());
    assert!(unknown.daily_return.is_nan());

    let tickers: Vec<&str> = dashboard.indirect.iter().map(|p| p.ticker.as_str()).collect();
    assert_eq!(tickers, vec!["AAPL", "CASH", "BRK-B", "UNKNOWN"]);

    let cash_asset = dashboard.assets.iter().find(|a| a.row.ticker == "CASH").unwrap();
    assert_eq!(cash_asset.todays_price, 1.0);
}

#[tokio::test]
async fn entry_today_only_undefines_blended_return() {
    let old = days_before(365).format("%Y-%m-%d").to_string();
    let today = as_of().format("%Y-%m-%d").to_string();
    let table = raw(&[
        ["XYZ", "stock", "10", "100", &old],
        ["AAPL", "stock", "1", "200", &today],
    ]);
    let dashboard = build_dashboard(&table, &settings(), as_of(), &prices(), &holdings())
        .await
        .unwrap();

    assert!(dashboard.assets[1].per_annum_roa.is_nan());
    assert!(dashboard.assets[0].per_annum_roa.is_finite());
    assert!(dashboard.summary.roc_per_annum_post_tax.is_nan());
    assert!((dashboard.summary.starting_capital - 1200.0).abs() < EPSILON);
}

#[tokio::test]
async fn missing_required_column_aborts_before_pricing() {
    let table = RawTable::from_values(vec![
        vec!["ticker".to_string(), "holdings".to_string()],
        vec!["XYZ".to_string(), "1".to_string()],
    ])
    .unwrap();
    let err = build_dashboard(&table, &settings(), as_of(), &prices(), &holdings())
        .await
        .unwrap_err();
    match err {
        DashboardError::Schema(SchemaError::MissingRequired(fields)) => {
            assert_eq!(fields, vec!["asset_type", "entry_price", "entry_date"]);
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn unresolved_ticker_does_not_abort() {
    let entry = days_before(365).format("%Y-%m-%d").to_string();
    let table = raw(&[
        ["XYZ", "stock", "10", "100", &entry],
        ["DELISTED", "stock", "5", "10", &entry],
    ]);
    let dashboard = build_dashboard(&table, &settings(), as_of(), &prices(), &holdings())
        .await
        .unwrap();
    assert!(dashboard.assets[1].current_value.is_nan());
    // sums skip the unresolved row
    assert!((dashboard.summary.capital_after_liquidating_pre_tax - 1200.0).abs() < EPSILON);
    assert!((dashboard.summary.starting_capital - 1050.0).abs() < EPSILON);
}

struct FailingPrices;

#[async_trait]
impl PriceSource for FailingPrices {
    async fn daily_closes(
        &self,
        ticker: &str,
        _start: NaiveDate,
        _end: NaiveDate,
    ) -> Result<Vec<DailyClose>, DashboardError> {
        Err(DashboardError::io(ticker, std::io::Error::other("connection reset")))
    }
}

#[tokio::test]
async fn failed_price_fetch_leaves_rows_unresolved() {
    let entry = days_before(365).format("%Y-%m-%d").to_string();
    let table = raw(&[
        ["XYZ", "stock", "10", "100", &entry],
        ["CASH", "cash", "50", "1", &entry],
    ]);
    let dashboard = build_dashboard(&table, &settings(), as_of(), &FailingPrices, &holdings())
        .await
        .unwrap();
    assert!(dashboard.assets[0].todays_price.is_nan());
    assert_eq!(dashboard.assets[1].current_value, 50.0);
    assert_eq!(dashboard.indirect[0].ticker, "CASH");
}
