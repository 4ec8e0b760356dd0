use dashfolio_lib::{AssetKpis, Dashboard, IndirectPosition, PortfolioKpis, PortfolioRow};
use tabled::settings::Style;
use tabled::{Table, Tabled};

use crate::html_output::{format_number, truncate, Format};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    Table,
    Json,
    Markdown,
}

#[derive(Tabled)]
struct SummaryRow {
    #[tabled(rename = "Metric")]
    metric: String,
    #[tabled(rename = "Value")]
    value: String,
}

#[derive(Tabled)]
struct AssetRow {
    #[tabled(rename = "Ticker")]
    ticker: String,
    #[tabled(rename = "Type")]
    asset_type: String,
    #[tabled(rename = "Holdings")]
    holdings: String,
    #[tabled(rename = "Entry value")]
    entry_value: String,
    #[tabled(rename = "Current value")]
    current_value: String,
    #[tabled(rename = "Net gain")]
    net_gain: String,
    #[tabled(rename = "1d")]
    one_day: String,
    #[tabled(rename = "p.a.")]
    per_annum: String,
}

#[derive(Tabled)]
struct IndirectRow {
    #[tabled(rename = "Ticker")]
    ticker: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Value")]
    value: String,
    #[tabled(rename = "Pct")]
    pct: String,
    #[tabled(rename = "∆ daily")]
    daily: String,
    #[tabled(rename = "∆ annual")]
    annual: String,
}

#[derive(Tabled)]
struct HoldingRow {
    #[tabled(rename = "Ticker")]
    ticker: String,
    #[tabled(rename = "Type")]
    asset_type: String,
    #[tabled(rename = "Holdings")]
    holdings: String,
    #[tabled(rename = "Entry price")]
    entry_price: String,
    #[tabled(rename = "Entry date")]
    entry_date: String,
}

// -- Row builders --

fn build_summary_rows(summary: &PortfolioKpis) -> Vec<SummaryRow> {
    let labelled = summary.labelled();
    let last = labelled.len() - 1;
    labelled
        .iter()
        .enumerate()
        .map(|(i, (label, value))| SummaryRow {
            metric: label.to_string(),
            value: format_number(*value, if i == last { Format::Percent } else { Format::Currency }),
        })
        .collect()
}

fn build_asset_rows(assets: &[AssetKpis]) -> Vec<AssetRow> {
    assets
        .iter()
        .map(|a| AssetRow {
            ticker: a.row.ticker.clone(),
            asset_type: a.row.asset_type.clone(),
            holdings: format_number(a.row.holdings, Format::Decimal),
            entry_value: format_number(a.entry_value, Format::Currency),
            current_value: format_number(a.current_value, Format::Currency),
            net_gain: format_number(a.net_gain, Format::Currency),
            one_day: format_number(a.one_day_roa, Format::Percent),
            per_annum: format_number(a.per_annum_roa, Format::Percent),
        })
        .collect()
}

fn build_indirect_rows(positions: &[IndirectPosition]) -> Vec<IndirectRow> {
    positions
        .iter()
        .map(|p| IndirectRow {
            ticker: truncate(&p.ticker),
            name: truncate(&p.name),
            value: format_number(p.current_value, Format::Currency),
            pct: format_number(p.pct_of_portfolio, Format::Percent),
            daily: format_number(p.daily_return, Format::Percent),
            annual: format_number(p.annual_return, Format::Percent),
        })
        .collect()
}

fn build_holding_rows(rows: &[PortfolioRow]) -> Vec<HoldingRow> {
    rows.iter()
        .map(|r| HoldingRow {
            ticker: r.ticker.clone(),
            asset_type: r.asset_type.clone(),
            holdings: format_number(r.holdings, Format::Decimal),
            entry_price: format_number(r.entry_price, Format::Currency),
            entry_date: r.entry_date.to_string(),
        })
        .collect()
}

fn styled<T: Tabled>(rows: Vec<T>, format: &OutputFormat) -> Table {
    let mut table = Table::new(rows);
    if *format == OutputFormat::Markdown {
        table.with(Style::markdown());
    }
    table
}

// -- Terminal output --

pub fn print_dashboard(dashboard: &Dashboard, format: &OutputFormat) {
    if *format == OutputFormat::Json {
        print_json(dashboard);
        return;
    }
    println!("Portfolio as of {}", dashboard.as_of);
    println!("{}", styled(build_summary_rows(&dashboard.summary), format));
    println!("{}", styled(build_asset_rows(&dashboard.assets), format));
    println!("{}", styled(build_indirect_rows(&dashboard.indirect), format));
}

pub fn print_holdings(rows: &[PortfolioRow], format: &OutputFormat) {
    if *format == OutputFormat::Json {
        print_json(&rows);
        return;
    }
    println!("{}", styled(build_holding_rows(rows), format));
}

pub fn print_json<T: serde::Serialize>(data: &T) {
    match serde_json::to_string_pretty(data) {
        Ok(json) => println!("{}", json),
        Err(e) => eprintln!("Failed to serialize to JSON: {}", e),
    }
}
