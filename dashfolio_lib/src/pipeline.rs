//! End-to-end dashboard computation: raw table in, KPI tables out.

use std::fs::File;
use std::path::Path;

use chrono::NaiveDate;
use serde::Serialize;

use crate::asset_kpis::{calculate_asset_kpis, AssetKpis};
use crate::config::DashboardConfig;
use crate::error::DashboardError;
use crate::indirect::{resolve_indirect_positions, HoldingsSource, IndirectPosition};
use crate::normalize::{normalize, MissingOptionalField, RawTable};
use crate::portfolio::PortfolioRow;
use crate::portfolio_kpis::{calculate_portfolio_kpis, PortfolioKpis};
use crate::prices::{fetch_price_table, PriceSource, ReferenceDates};
use crate::schema::Schema;
use crate::ticker_rewrite::TickerRewrite;

/// Everything the computation needs from the config.
#[derive(Debug, Clone)]
pub struct DashboardSettings {
    pub schema: Schema,
    pub tax_rate: f64,
    pub fund_asset_types: Vec<String>,
    pub rewrite: TickerRewrite,
}

impl DashboardSettings {
    pub fn from_config(config: &DashboardConfig) -> Result<Self, DashboardError> {
        Ok(Self {
            schema: config.portfolio_file.schema_fields.clone(),
            tax_rate: config.parameters.tax_rate,
            fund_asset_types: config.parameters.fund_asset_types.clone(),
            rewrite: TickerRewrite::from_config(&config.tickers_to_replace)?,
        })
    }
}

/// The three result tables of one run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Dashboard {
    pub as_of: NaiveDate,
    pub warnings: Vec<MissingOptionalField>,
    pub assets: Vec<AssetKpis>,
    pub summary: PortfolioKpis,
    pub indirect: Vec<IndirectPosition>,
}

/// Reads a portfolio CSV file.
pub fn read_csv_table(path: &Path) -> Result<RawTable, DashboardError> {
    let file = File::open(path).map_err(|e| DashboardError::io(path, e))?;
    Ok(RawTable::from_csv_reader(file)?)
}

/// Validates a raw table and returns its holdings without pricing them.
pub fn validate_table(
    raw: &RawTable,
    schema: &Schema,
) -> Result<(Vec<PortfolioRow>, Vec<MissingOptionalField>), DashboardError> {
    let normalized = normalize(raw, schema)?;
    let rows = PortfolioRow::from_table(&normalized.table)?;
    Ok((rows, normalized.warnings))
}

/// Computes the dashboard as of `as_of`.
///
/// Schema errors abort before any network call. Unresolved prices and
/// weights, including those whose fetch failed, flow through as NaN.
pub async fn build_dashboard<P, H>(
    raw: &RawTable,
    settings: &DashboardSettings,
    as_of: NaiveDate,
    prices: &P,
    holdings: &H,
) -> Result<Dashboard, DashboardError>
where
    P: PriceSource + ?Sized,
    H: HoldingsSource + ?Sized,
{
    let (rows, warnings) = validate_table(raw, &settings.schema)?;
    Ok(compute_dashboard(rows, warnings, settings, as_of, prices, holdings).await)
}

/// Prices already validated holdings and derives the three result tables.
pub async fn compute_dashboard<P, H>(
    rows: Vec<PortfolioRow>,
    warnings: Vec<MissingOptionalField>,
    settings: &DashboardSettings,
    as_of: NaiveDate,
    prices: &P,
    holdings: &H,
) -> Dashboard
where
    P: PriceSource + ?Sized,
    H: HoldingsSource + ?Sized,
{
    tracing::info!("Loaded {} holdings", rows.len());

    let dates = ReferenceDates::for_as_of(as_of);
    let tickers: Vec<String> = rows
        .iter()
        .filter(|r| !r.is_cash())
        .map(|r| r.ticker.clone())
        .collect();
    tracing::info!("Fetching prices as of {}", as_of);
    let price_table = fetch_price_table(prices, &tickers, &dates).await;

    let assets = calculate_asset_kpis(&rows, &price_table, as_of, settings.tax_rate);
    let summary = calculate_portfolio_kpis(&assets);

    tracing::info!("Resolving indirect positions");
    let indirect = resolve_indirect_positions(
        &assets,
        holdings,
        prices,
        &settings.rewrite,
        &settings.fund_asset_types,
        &dates,
    )
    .await;

    Dashboard {
        as_of,
        warnings,
        assets,
        summary,
        indirect,
    }
}
