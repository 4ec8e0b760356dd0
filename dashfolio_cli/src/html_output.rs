//! HTML rendering of the dashboard tables.
//!
//! Each document is an inline `<style>` block followed by one `<table>`.
//! Cells are formatted per column group; magnitude columns get a background
//! bar aligned at zero.

use std::io::Cursor;

use anyhow::Result;
use chrono::NaiveDate;
use dashfolio_lib::schema::Value;
use dashfolio_lib::{AssetKpis, Dashboard, IndirectPosition, PortfolioKpis};
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;

pub const SUMMARY_FILE: &str = "portfolio_global_kpis.html";
pub const PER_ASSET_FILE: &str = "portfolio_with_kpis.html";
pub const INDIRECT_FILE: &str = "portfolio_indirect_positions.html";

const MAX_TEXT_CHARS: usize = 23;
const NEGATIVE_BAR: &str = "lightcoral";
const POSITIVE_BAR: &str = "lightgreen";

const TABLE_CSS: &str = "th { text-align: center; font-weight: bold; font-size: 14px; \
font-family: monospace; width: 230px; } \
td { text-align: center; font-size: 12px; font-family: monospace; width: 230px; }";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Currency,
    Percent,
    Date,
    Decimal,
    Text,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Datum {
    Number(f64),
    Date(NaiveDate),
    Text(String),
}

impl From<&Value> for Datum {
    fn from(value: &Value) -> Self {
        match value {
            Value::Float(v) => Datum::Number(*v),
            Value::Int(v) => Datum::Number(*v as f64),
            Value::Date(d) => Datum::Date(*d),
            Value::Str(s) => Datum::Text(s.clone()),
        }
    }
}

struct Cell {
    text: String,
    style: Option<String>,
}

struct HtmlTable {
    /// Header of the row-label column; `None` hides the label column.
    index_header: Option<String>,
    headers: Vec<String>,
    rows: Vec<(String, Vec<Cell>)>,
}

/// Inserts thousands separators into the integer part.
pub(crate) fn group_thousands(value: f64, decimals: usize) -> String {
    let formatted = format!("{:.*}", decimals, value.abs());
    let (int_part, frac_part) = match formatted.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (formatted.as_str(), None),
    };
    let mut grouped = String::new();
    for (i, ch) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    let sign = if value < 0.0 && formatted.chars().any(|c| c.is_ascii_digit() && c != '0') {
        "-"
    } else {
        ""
    };
    match frac_part {
        Some(f) => format!("{sign}{grouped}.{f}"),
        None => format!("{sign}{grouped}"),
    }
}

pub(crate) fn format_number(value: f64, format: Format) -> String {
    if !value.is_finite() {
        return "-".to_string();
    }
    match format {
        Format::Currency => format!("{}€", group_thousands(value, 1)),
        Format::Percent => format!("{:.2}%", value * 100.0),
        Format::Decimal => group_thousands(value, 1),
        Format::Date | Format::Text => value.to_string(),
    }
}

pub(crate) fn truncate(text: &str) -> String {
    text.chars().take(MAX_TEXT_CHARS).collect()
}

fn format_datum(datum: &Datum, format: Format) -> String {
    match datum {
        Datum::Number(v) => format_number(*v, format),
        Datum::Date(d) => d.format("%Y-%m-%d").to_string(),
        Datum::Text(s) if format == Format::Text => truncate(s),
        Datum::Text(s) => s.clone(),
    }
}

/// Background bar for `value` in a column whose largest magnitude is
/// `max_abs`. Bars grow from the middle of the cell.
fn bar_style(value: f64, max_abs: f64) -> Option<String> {
    if !value.is_finite() || max_abs <= 0.0 {
        return None;
    }
    let half = (value.abs() / max_abs * 50.0).min(50.0);
    let style = if value < 0.0 {
        let start = 50.0 - half;
        format!(
            "background: linear-gradient(90deg, transparent {start:.1}%, {NEGATIVE_BAR} {start:.1}%, \
{NEGATIVE_BAR} 50.0%, transparent 50.0%);"
        )
    } else {
        let end = 50.0 + half;
        format!(
            "background: linear-gradient(90deg, transparent 50.0%, {POSITIVE_BAR} 50.0%, \
{POSITIVE_BAR} {end:.1}%, transparent {end:.1}%);"
        )
    };
    Some(style)
}

fn max_abs(values: impl IntoIterator<Item = f64>) -> f64 {
    values
        .into_iter()
        .filter(|v| v.is_finite())
        .fold(0.0, |acc, v| acc.max(v.abs()))
}

fn write_text<W: std::io::Write>(writer: &mut Writer<W>, tag: &str, style: Option<&str>, text: &str) -> Result<()> {
    let start = match style {
        Some(s) => BytesStart::new(tag).with_attributes([("style", s)]),
        None => BytesStart::new(tag),
    };
    writer.write_event(Event::Start(start))?;
    writer.write_event(Event::Text(BytesText::new(text)))?;
    writer.write_event(Event::End(BytesEnd::new(tag)))?;
    Ok(())
}

fn render(table: &HtmlTable) -> Result<String> {
    let mut writer = Writer::new(Cursor::new(Vec::new()));

    write_text(&mut writer, "style", None, TABLE_CSS)?;
    writer.write_event(Event::Start(BytesStart::new("table")))?;

    writer.write_event(Event::Start(BytesStart::new("thead")))?;
    writer.write_event(Event::Start(BytesStart::new("tr")))?;
    if let Some(index) = &table.index_header {
        write_text(&mut writer, "th", None, index)?;
    }
    for header in &table.headers {
        write_text(&mut writer, "th", None, header)?;
    }
    writer.write_event(Event::End(BytesEnd::new("tr")))?;
    writer.write_event(Event::End(BytesEnd::new("thead")))?;

    writer.write_event(Event::Start(BytesStart::new("tbody")))?;
    for (label, cells) in &table.rows {
        writer.write_event(Event::Start(BytesStart::new("tr")))?;
        if table.index_header.is_some() {
            write_text(&mut writer, "th", None, label)?;
        }
        for cell in cells {
            write_text(&mut writer, "td", cell.style.as_deref(), &cell.text)?;
        }
        writer.write_event(Event::End(BytesEnd::new("tr")))?;
    }
    writer.write_event(Event::End(BytesEnd::new("tbody")))?;
    writer.write_event(Event::End(BytesEnd::new("table")))?;

    let buf = writer.into_inner().into_inner();
    Ok(String::from_utf8(buf)?)
}

/// Summary as a label column and one value column.
pub fn summary_html(summary: &PortfolioKpis) -> Result<String> {
    let labelled = summary.labelled();
    let last = labelled.len() - 1;
    let rows = labelled
        .iter()
        .enumerate()
        .map(|(i, (label, value))| {
            let format = if i == last {
                Format::Percent
            } else {
                Format::Currency
            };
            let cell = Cell {
                text: format_number(*value, format),
                style: None,
            };
            (label.to_string(), vec![cell])
        })
        .collect();
    render(&HtmlTable {
        index_header: Some(String::new()),
        headers: vec!["Value".to_string()],
        rows,
    })
}

/// Per-asset rows in report order. The first ten come from the holding
/// itself; extra schema columns are inserted after them.
const ASSET_FIELDS: &[(&str, Format)] = &[
    ("asset_type", Format::Text),
    ("holdings", Format::Decimal),
    ("entry_price", Format::Currency),
    ("entry_date", Format::Date),
    ("entry_cost", Format::Currency),
    ("annual_cost", Format::Currency),
    ("exit_cost_fixed_fee", Format::Currency),
    ("exit_cost_pct", Format::Percent),
    ("dividends_received", Format::Currency),
    ("dividends_costs", Format::Currency),
    ("lastyears_price", Format::Currency),
    ("yesterdays_price", Format::Currency),
    ("todays_price", Format::Currency),
    ("today", Format::Date),
    ("years_since_entry", Format::Decimal),
    ("entry_value", Format::Currency),
    ("current_value", Format::Currency),
    ("exit_cost_total", Format::Currency),
    ("net_gain_ex_dividend_pre_tax", Format::Currency),
    ("tax_on_gain", Format::Currency),
    ("annual_costs_paid", Format::Currency),
    ("net_gain_ex_dividend", Format::Currency),
    ("net_gain", Format::Currency),
    ("1_day_roa", Format::Percent),
    ("per_annum_roa_ex_dividends", Format::Percent),
    ("per_annum_roa", Format::Percent),
];
const HOLDING_FIELD_COUNT: usize = 10;

fn asset_datum(a: &AssetKpis, field: &str) -> Datum {
    let n = Datum::Number;
    match field {
        "asset_type" => Datum::Text(a.row.asset_type.clone()),
        "holdings" => n(a.row.holdings),
        "entry_price" => n(a.row.entry_price),
        "entry_date" => Datum::Date(a.row.entry_date),
        "entry_cost" => n(a.row.entry_cost),
        "annual_cost" => n(a.row.annual_cost),
        "exit_cost_fixed_fee" => n(a.row.exit_cost_fixed_fee),
        "exit_cost_pct" => n(a.row.exit_cost_pct),
        "dividends_received" => n(a.row.dividends_received),
        "dividends_costs" => n(a.row.dividends_costs),
        "lastyears_price" => n(a.lastyears_price),
        "yesterdays_price" => n(a.yesterdays_price),
        "todays_price" => n(a.todays_price),
        "today" => Datum::Date(a.today),
        "years_since_entry" => n(a.years_since_entry),
        "entry_value" => n(a.entry_value),
        "current_value" => n(a.current_value),
        "exit_cost_total" => n(a.exit_cost_total),
        "net_gain_ex_dividend_pre_tax" => n(a.net_gain_ex_dividend_pre_tax),
        "tax_on_gain" => n(a.tax_on_gain),
        "annual_costs_paid" => n(a.annual_costs_paid),
        "net_gain_ex_dividend" => n(a.net_gain_ex_dividend),
        "net_gain" => n(a.net_gain),
        "1_day_roa" => n(a.one_day_roa),
        "per_annum_roa_ex_dividends" => n(a.per_annum_roa_ex_dividends),
        "per_annum_roa" => n(a.per_annum_roa),
        _ => Datum::Number(f64::NAN),
    }
}

/// Per-asset detail, transposed: one row per field, one column per holding.
pub fn per_asset_html(assets: &[AssetKpis]) -> Result<String> {
    let mut rows: Vec<(String, Vec<Cell>)> = ASSET_FIELDS
        .iter()
        .map(|(name, format)| {
            let cells = assets
                .iter()
                .map(|a| Cell {
                    text: format_datum(&asset_datum(a, name), *format),
                    style: None,
                })
                .collect();
            (name.to_string(), cells)
        })
        .collect();

    let extra_names: Vec<String> = assets
        .first()
        .map(|a| a.row.extra.iter().map(|(name, _)| name.clone()).collect())
        .unwrap_or_default();
    for (offset, name) in extra_names.into_iter().enumerate() {
        let cells = assets
            .iter()
            .map(|a| {
                let text = a
                    .row
                    .extra
                    .get(offset)
                    .map(|(_, v)| {
                        let datum = Datum::from(v);
                        let format = match datum {
                            Datum::Number(_) => Format::Decimal,
                            Datum::Date(_) => Format::Date,
                            Datum::Text(_) => Format::Text,
                        };
                        format_datum(&datum, format)
                    })
                    .unwrap_or_else(|| "-".to_string());
                Cell { text, style: None }
            })
            .collect();
        rows.insert(HOLDING_FIELD_COUNT + offset, (name, cells));
    }

    render(&HtmlTable {
        index_header: Some(String::new()),
        headers: assets.iter().map(|a| a.row.ticker.clone()).collect(),
        rows,
    })
}

/// Indirect positions with bars on value and both returns.
pub fn indirect_html(positions: &[IndirectPosition]) -> Result<String> {
    let value_max = max_abs(positions.iter().map(|p| p.current_value));
    let daily_max = max_abs(positions.iter().map(|p| p.daily_return));
    let annual_max = max_abs(positions.iter().map(|p| p.annual_return));

    let rows = positions
        .iter()
        .map(|p| {
            let cells = vec![
                Cell {
                    text: truncate(&p.ticker),
                    style: None,
                },
                Cell {
                    text: truncate(&p.name),
                    style: None,
                },
                Cell {
                    text: format_number(p.current_value, Format::Currency),
                    style: bar_style(p.current_value, value_max),
                },
                Cell {
                    text: format_number(p.pct_of_portfolio, Format::Percent),
                    style: None,
                },
                Cell {
                    text: format_number(p.daily_return, Format::Percent),
                    style: bar_style(p.daily_return, daily_max),
                },
                Cell {
                    text: format_number(p.annual_return, Format::Percent),
                    style: bar_style(p.annual_return, annual_max),
                },
            ];
            (p.ticker.clone(), cells)
        })
        .collect();

    render(&HtmlTable {
        index_header: None,
        headers: ["Ticker", "Name", "Value", "Pct", "∆ daily", "∆ annual"]
            .iter()
            .map(|h| h.to_string())
            .collect(),
        rows,
    })
}

/// The three documents of a run, in file order.
pub struct HtmlReport {
    pub summary: String,
    pub per_asset: String,
    pub indirect: String,
}

impl HtmlReport {
    pub fn render(dashboard: &Dashboard) -> Result<Self> {
        Ok(Self {
            summary: summary_html(&dashboard.summary)?,
            per_asset: per_asset_html(&dashboard.assets)?,
            indirect: indirect_html(&dashboard.indirect)?,
        })
    }

    pub fn files(&self) -> [(&'static str, &str); 3] {
        [
            (SUMMARY_FILE, self.summary.as_str()),
            (PER_ASSET_FILE, self.per_asset.as_str()),
            (INDIRECT_FILE, self.indirect.as_str()),
        ]
    }
}
