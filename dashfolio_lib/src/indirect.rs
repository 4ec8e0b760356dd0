//! Decomposition of fund holdings into the underlying positions they carry.
//!
//! Runs in two auditable stages. [`expand`] maps every held position to the
//! exposures it creates (a fund to its constituents scaled by the fund's
//! value, cash to a single cash exposure, a direct holding to itself).
//! [`regroup`] then folds exposures by constituent and ranks them by share
//! of the portfolio.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::Serialize;

use crate::asset_kpis::AssetKpis;
use crate::error::DashboardError;
use crate::portfolio::CASH_ASSET_TYPE;
use crate::portfolio_kpis::nan_sum;
use crate::prices::{fetch_price_table, PriceSnapshot, PriceSource, PriceTable, ReferenceDates, CASH_TICKER};
use crate::ticker_rewrite::TickerRewrite;

/// Asset types treated as funds when none are configured.
pub const DEFAULT_FUND_ASSET_TYPES: &[&str] = &["etf", "fund"];

/// Display name of the cash exposure.
pub const CASH_NAME: &str = "Cash";

/// Portfolio value held under one (asset_type, ticker) pair.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PositionGroup {
    pub asset_type: String,
    pub ticker: String,
    pub current_value: f64,
    pub pct_of_portfolio: f64,
    #[serde(skip)]
    pub prices: PriceSnapshot,
}

/// One published constituent of a fund. `weight` is a fraction of the
/// fund; NaN when the provider left it out.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Constituent {
    pub ticker: String,
    pub name: String,
    pub weight: f64,
}

/// Source of fund constituent lists.
#[async_trait]
pub trait HoldingsSource: Send + Sync {
    /// Published constituents of `fund`. Symbols that are not funds, or
    /// that the provider does not know, yield an empty list.
    async fn constituents(&self, fund: &str) -> Result<Vec<Constituent>, DashboardError>;
}

/// Exposure to one constituent through one held position.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Exposure {
    /// Ticker of the held position the exposure comes through.
    pub via: String,
    pub ticker: String,
    pub name: String,
    pub current_value: f64,
    pub pct_of_portfolio: f64,
    pub daily_return: f64,
    pub annual_return: f64,
}

/// Aggregated exposure to one underlying instrument.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndirectPosition {
    pub ticker: String,
    pub name: String,
    pub current_value: f64,
    pub pct_of_portfolio: f64,
    pub daily_return: f64,
    pub annual_return: f64,
}

/// Sums current value per (asset_type, ticker) and computes each group's
/// share of the total. Groups keep first-seen order.
pub fn group_positions(assets: &[AssetKpis]) -> Vec<PositionGroup> {
    let mut groups: Vec<PositionGroup> = Vec::new();
    let mut index: HashMap<(String, String), usize> = HashMap::new();
    let mut values: Vec<Vec<f64>> = Vec::new();

    for asset in assets {
        let key = (asset.row.asset_type.clone(), asset.row.ticker.clone());
        let slot = *index.entry(key).or_insert_with(|| {
            groups.push(PositionGroup {
                asset_type: asset.row.asset_type.clone(),
                ticker: asset.row.ticker.clone(),
                current_value: 0.0,
                pct_of_portfolio: 0.0,
                prices: asset.prices(),
            });
            values.push(Vec::new());
            groups.len() - 1
        });
        values[slot].push(asset.current_value);
    }

    for (group, vals) in groups.iter_mut().zip(values) {
        group.current_value = nan_sum(vals);
    }
    let total = nan_sum(groups.iter().map(|g| g.current_value));
    for group in &mut groups {
        group.pct_of_portfolio = group.current_value / total;
    }
    groups
}

/// Stage one: every held position mapped to the exposures it creates.
///
/// Fund positions fan out to their constituents, scaled by constituent
/// weight, with returns from `constituent_prices`. A fund with no known
/// constituents contributes nothing. Cash becomes a single exposure with
/// weight 1.0 and flat returns. Any other holding is its own constituent,
/// named after a fund constituent with the same ticker when there is one,
/// taking the first fund in position order.
pub fn expand(
    groups: &[PositionGroup],
    constituents: &HashMap<String, Vec<Constituent>>,
    constituent_prices: &PriceTable,
    fund_asset_types: &[String],
) -> Vec<Exposure> {
    let mut names: HashMap<&str, &str> = HashMap::new();
    for group in groups {
        for c in constituents.get(&group.ticker).into_iter().flatten() {
            names.entry(c.ticker.as_str()).or_insert(c.name.as_str());
        }
    }

    let mut out = Vec::new();
    for group in groups {
        if group.asset_type == CASH_ASSET_TYPE {
            out.push(Exposure {
                via: group.ticker.clone(),
                ticker: CASH_TICKER.to_string(),
                name: CASH_NAME.to_string(),
                current_value: group.current_value,
                pct_of_portfolio: group.pct_of_portfolio,
                daily_return: 0.0,
                annual_return: 0.0,
            });
        } else if fund_asset_types.iter().any(|t| *t == group.asset_type) {
            for c in constituents.get(&group.ticker).into_iter().flatten() {
                let prices = constituent_prices.get(&c.ticker);
                out.push(Exposure {
                    via: group.ticker.clone(),
                    ticker: c.ticker.clone(),
                    name: c.name.clone(),
                    current_value: group.current_value * c.weight,
                    pct_of_portfolio: group.pct_of_portfolio * c.weight,
                    daily_return: prices.daily_return(),
                    annual_return: prices.annual_return(),
                });
            }
        } else {
            let name = names
                .get(group.ticker.as_str())
                .map(|n| n.to_string())
                .unwrap_or_else(|| group.ticker.clone());
            out.push(Exposure {
                via: group.ticker.clone(),
                ticker: group.ticker.clone(),
                name,
                current_value: group.current_value,
                pct_of_portfolio: group.pct_of_portfolio,
                daily_return: group.prices.daily_return(),
                annual_return: group.prices.annual_return(),
            });
        }
    }
    out
}

/// Stage two: folds exposures by (ticker, name) and sorts by share of the
/// portfolio, largest first.
///
/// Value and share are summed skipping unresolved contributions. Returns
/// are taken from the first contributing exposure that has one, not
/// averaged. Unresolved shares sort last.
pub fn regroup(exposures: &[Exposure]) -> Vec<IndirectPosition> {
    let mut order: Vec<(String, String)> = Vec::new();
    let mut folded: HashMap<(String, String), Vec<&Exposure>> = HashMap::new();
    for e in exposures {
        let key = (e.ticker.clone(), e.name.clone());
        folded
            .entry(key.clone())
            .or_insert_with(|| {
                order.push(key);
                Vec::new()
            })
            .push(e);
    }

    let first_defined = |items: &[&Exposure], f: fn(&Exposure) -> f64| {
        items
            .iter()
            .map(|e| f(e))
            .find(|v| !v.is_nan())
            .unwrap_or(f64::NAN)
    };

    let mut positions: Vec<IndirectPosition> = order
        .into_iter()
        .filter_map(|key| {
            let items = folded.remove(&key)?;
            Some(IndirectPosition {
                current_value: nan_sum(items.iter().map(|e| e.current_value)),
                pct_of_portfolio: nan_sum(items.iter().map(|e| e.pct_of_portfolio)),
                daily_return: first_defined(&items, |e| e.daily_return),
                annual_return: first_defined(&items, |e| e.annual_return),
                ticker: key.0,
                name: key.1,
            })
        })
        .collect();

    positions.sort_by(|a, b| match (a.pct_of_portfolio.is_nan(), b.pct_of_portfolio.is_nan()) {
        (false, false) => b.pct_of_portfolio.total_cmp(&a.pct_of_portfolio),
        (a_nan, b_nan) => a_nan.cmp(&b_nan),
    });
    positions
}

/// Resolves the portfolio's indirect positions.
///
/// Looks up constituents of every fund position once, rewrites their
/// symbols, prices all distinct constituents in one batch and runs
/// [`expand`] then [`regroup`].
pub async fn resolve_indirect_positions<H, P>(
    assets: &[AssetKpis],
    holdings: &H,
    prices: &P,
    rewrite: &TickerRewrite,
    fund_asset_types: &[String],
    dates: &ReferenceDates,
) -> Vec<IndirectPosition>
where
    H: HoldingsSource + ?Sized,
    P: PriceSource + ?Sized,
{
    let groups = group_positions(assets);

    let mut constituents: HashMap<String, Vec<Constituent>> = HashMap::new();
    for group in &groups {
        if !fund_asset_types.iter().any(|t| *t == group.asset_type)
            || constituents.contains_key(&group.ticker)
        {
            continue;
        }
        let published = match holdings.constituents(&group.ticker).await {
            Ok(published) => published,
            Err(e) => {
                tracing::warn!("Holdings lookup failed for fund {}: {}", group.ticker, e);
                Vec::new()
            }
        };
        let found: Vec<Constituent> = published
            .into_iter()
            .map(|c| Constituent {
                ticker: rewrite.apply(&c.ticker),
                ..c
            })
            .collect();
        if found.is_empty() {
            tracing::warn!("No constituents found for fund {}", group.ticker);
        } else {
            tracing::debug!("{} has {} constituents", group.ticker, found.len());
        }
        constituents.insert(group.ticker.clone(), found);
    }

    let mut tickers: Vec<String> = constituents
        .values()
        .flatten()
        .map(|c| c.ticker.clone())
        .collect();
    tickers.sort();
    tickers.dedup();
    tracing::info!(
        "Pricing {} constituents of {} funds",
        tickers.len(),
        constituents.len()
    );
    let constituent_prices = fetch_price_table(prices, &tickers, dates).await;

    let exposures = expand(&groups, &constituents, &constituent_prices, fund_asset_types);
    regroup(&exposures)
}
