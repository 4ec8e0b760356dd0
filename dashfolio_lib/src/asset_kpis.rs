//! Per-asset financial metrics.
//!
//! Pure functions of the holdings, their price snapshots, the as-of date and
//! the tax rate. Unresolved prices arrive as NaN and leave NaN in every
//! metric derived from them; nothing here fails.

use chrono::NaiveDate;
use serde::Serialize;

use crate::portfolio::PortfolioRow;
use crate::prices::{PriceSnapshot, PriceTable};

/// Flat tax on gains applied when no rate is configured.
pub const DEFAULT_TAX_RATE: f64 = 0.28;

/// A holding together with its prices and derived metrics.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AssetKpis {
    #[serde(flatten)]
    pub row: PortfolioRow,
    pub lastyears_price: f64,
    pub yesterdays_price: f64,
    pub todays_price: f64,
    pub today: NaiveDate,
    pub years_since_entry: f64,
    pub entry_value: f64,
    pub current_value: f64,
    pub exit_cost_total: f64,
    pub net_gain_ex_dividend_pre_tax: f64,
    pub tax_on_gain: f64,
    pub annual_costs_paid: f64,
    pub net_gain_ex_dividend: f64,
    pub net_gain: f64,
    pub one_day_roa: f64,
    pub per_annum_roa_ex_dividends: f64,
    pub per_annum_roa: f64,
}

impl AssetKpis {
    pub fn compute(row: &PortfolioRow, prices: PriceSnapshot, today: NaiveDate, tax_rate: f64) -> Self {
        let years_since_entry = (today - row.entry_date).num_days() as f64 / 365.0;
        let entry_value = row.holdings * row.entry_price;
        let current_value = row.holdings * prices.today;
        let exit_cost_total = row.exit_cost_fixed_fee + row.exit_cost_pct * current_value;
        let net_gain_ex_dividend_pre_tax =
            current_value - entry_value - row.entry_cost - exit_cost_total;
        let tax_on_gain = net_gain_ex_dividend_pre_tax * tax_rate;
        let annual_costs_paid = row.annual_cost * years_since_entry;
        let net_gain_ex_dividend = net_gain_ex_dividend_pre_tax - tax_on_gain - annual_costs_paid;
        let net_gain = net_gain_ex_dividend + row.dividends_received - row.dividends_costs;

        Self {
            row: row.clone(),
            lastyears_price: prices.last_year,
            yesterdays_price: prices.yesterday,
            todays_price: prices.today,
            today,
            years_since_entry,
            entry_value,
            current_value,
            exit_cost_total,
            net_gain_ex_dividend_pre_tax,
            tax_on_gain,
            annual_costs_paid,
            net_gain_ex_dividend,
            net_gain,
            one_day_roa: prices.daily_return(),
            per_annum_roa_ex_dividends: per_annum(net_gain_ex_dividend, entry_value, years_since_entry),
            per_annum_roa: per_annum(net_gain, entry_value, years_since_entry),
        }
    }

    pub fn prices(&self) -> PriceSnapshot {
        PriceSnapshot {
            last_year: self.lastyears_price,
            yesterday: self.yesterdays_price,
            today: self.todays_price,
        }
    }
}

/// Compounded yearly return of `gain` on `entry_value` held for `years`.
///
/// NaN when the holding period is not positive or the entry value is zero,
/// so an entry made today never reports an infinite or clamped return.
pub fn per_annum(gain: f64, entry_value: f64, years: f64) -> f64 {
    if years <= 0.0 || entry_value == 0.0 {
        return f64::NAN;
    }
    let growth = (gain + entry_value) / entry_value;
    let rate = growth.powf(1.0 / years) - 1.0;
    if rate.is_finite() {
        rate
    } else {
        f64::NAN
    }
}

/// Derives [`AssetKpis`] for every row, pricing each by ticker.
pub fn calculate_asset_kpis(
    rows: &[PortfolioRow],
    prices: &PriceTable,
    today: NaiveDate,
    tax_rate: f64,
) -> Vec<AssetKpis> {
    rows.iter()
        .map(|row| AssetKpis::compute(row, prices.get(&row.ticker), today, tax_rate))
        .collect()
}
