//! Portfolio-wide summary metrics.

use serde::Serialize;

use crate::asset_kpis::AssetKpis;

/// Portfolio-level aggregates of the asset KPI table.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PortfolioKpis {
    pub starting_capital: f64,
    pub costs_paid: f64,
    pub capital_after_liquidating_pre_tax: f64,
    pub capital_after_liquidating_post_tax: f64,
    pub roc_per_annum_post_tax: f64,
}

impl PortfolioKpis {
    /// Display label and value of every metric, in report order.
    pub fn labelled(&self) -> [(&'static str, f64); 5] {
        [
            ("Starting capital", self.starting_capital),
            ("Costs paid so far", self.costs_paid),
            (
                "Capital after liquidating pre-tax",
                self.capital_after_liquidating_pre_tax,
            ),
            (
                "Capital after liquidating post-tax",
                self.capital_after_liquidating_post_tax,
            ),
            ("ROC per annum post-tax", self.roc_per_annum_post_tax),
        ]
    }
}

/// Sum that skips NaN. A non-empty input of only NaN sums to NaN.
pub(crate) fn nan_sum<I: IntoIterator<Item = f64>>(values: I) -> f64 {
    let mut seen_any = false;
    let mut seen_number = false;
    let mut total = 0.0;
    for v in values {
        seen_any = true;
        if !v.is_nan() {
            seen_number = true;
            total += v;
        }
    }
    if seen_any && !seen_number {
        f64::NAN
    } else {
        total
    }
}

/// Reduces the asset table to its summary. Cash rows count like any other.
///
/// Sums skip unresolved values. The blended per-annum return is the
/// current-value-weighted mean of per-asset returns and is NaN if any
/// return is undefined or the portfolio has no value.
pub fn calculate_portfolio_kpis(assets: &[AssetKpis]) -> PortfolioKpis {
    let sum = |f: fn(&AssetKpis) -> f64| nan_sum(assets.iter().map(f));

    let current_value = sum(|a| a.current_value);
    let exit_costs = sum(|a| a.exit_cost_total);
    let pre_tax = current_value - exit_costs;

    let weighted: f64 = assets
        .iter()
        .map(|a| a.per_annum_roa * a.current_value)
        .sum();
    let roc = if current_value == 0.0 || current_value.is_nan() {
        f64::NAN
    } else {
        weighted / current_value
    };

    PortfolioKpis {
        starting_capital: sum(|a| a.entry_value),
        costs_paid: sum(|a| a.annual_costs_paid) + sum(|a| a.row.entry_cost),
        capital_after_liquidating_pre_tax: pre_tax,
        capital_after_liquidating_post_tax: pre_tax - sum(|a| a.tax_on_gain),
        roc_per_annum_post_tax: roc,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asset_kpis::calculate_asset_kpis;
    use crate::portfolio::PortfolioRow;
    use crate::prices::{PriceSnapshot, PriceTable};
    use chrono::{Days, NaiveDate};

    const EPSILON: f64 = 1e-9;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 14).unwrap()
    }

    fn row(ticker: &str, asset_type: &str, holdings: f64, entry_price: f64, days_held: u64) -> PortfolioRow {
        PortfolioRow {
            ticker: ticker.to_string(),
            asset_type: asset_type.to_string(),
            holdings,
            entry_price,
            entry_date: today().checked_sub_days(Days::new(days_held)).unwrap(),
            entry_cost: 2.0,
            annual_cost: 1.0,
            exit_cost_fixed_fee: 1.0,
            exit_cost_pct: 0.0,
            dividends_received: 0.0,
            dividends_costs: 0.0,
            extra: Vec::new(),
        }
    }

    fn prices() -> PriceTable {
        let mut prices = PriceTable::default();
        prices.insert(
            "XYZ",
            PriceSnapshot {
                last_year: 100.0,
                yesterday: 119.0,
                today: 120.0,
            },
        );
        prices.insert(
            "ABC",
            PriceSnapshot {
                last_year: 50.0,
                yesterday: 40.0,
                today: 40.0,
            },
        );
        prices
    }

    #[test]
    fn test_nan_sum() {
        assert_eq!(nan_sum(vec![1.0, f64::NAN, 2.0]), 3.0);
        assert_eq!(nan_sum(Vec::<f64>::new()), 0.0);
        assert!(nan_sum(vec![f64::NAN]).is_nan());
    }

    #[test]
    fn test_starting_capital_is_sum_of_entry_values() {
        let rows = vec![
            row("XYZ", "stock", 10.0, 100.0, 365),
            row("ABC", "stock", 20.0, 45.0, 730),
            row("CASH", "cash", 300.0, 1.0, 365),
        ];
        let assets = calculate_asset_kpis(&rows, &prices(), today(), 0.28);
        let kpis = calculate_portfolio_kpis(&assets);
        let expected: f64 = assets.iter().map(|a| a.entry_value).sum();
        assert!((kpis.starting_capital - expected).abs() < EPSILON);
        assert!((kpis.starting_capital - 2200.0).abs() < EPSILON);
    }

    #[test]
    fn test_liquidation_values_and_costs() {
        let rows = vec![
            row("XYZ", "stock", 10.0, 100.0, 365),
            row("CASH", "cash", 300.0, 1.0, 365),
        ];
        let assets = calculate_asset_kpis(&rows, &prices(), today(), 0.28);
        let kpis = calculate_portfolio_kpis(&assets);

        // annual_cost 1.0 for one year plus entry_cost 2.0, per row
        assert!((kpis.costs_paid - 6.0).abs() < EPSILON);
        assert!((kpis.capital_after_liquidating_pre_tax - (1500.0 - 2.0)).abs() < EPSILON);
        let tax: f64 = assets.iter().map(|a| a.tax_on_gain).sum();
        assert!(
            (kpis.capital_after_liquidating_post_tax - (1498.0 - tax)).abs() < EPSILON
        );

        let weighted = (assets[0].per_annum_roa * 1200.0 + assets[1].per_annum_roa * 300.0) / 1500.0;
        assert!((kpis.roc_per_annum_post_tax - weighted).abs() < EPSILON);
    }

    #[test]
    fn test_undefined_return_makes_blend_undefined() {
        let rows = vec![
            row("XYZ", "stock", 10.0, 100.0, 365),
            row("ABC", "stock", 1.0, 40.0, 0),
        ];
        let assets = calculate_asset_kpis(&rows, &prices(), today(), 0.28);
        let kpis = calculate_portfolio_kpis(&assets);
        assert!(kpis.roc_per_annum_post_tax.is_nan());
        assert!(kpis.starting_capital.is_finite());
        assert!(kpis.capital_after_liquidating_post_tax.is_finite());
    }

    #[test]
    fn test_empty_portfolio() {
        let kpis = calculate_portfolio_kpis(&[]);
        assert_eq!(kpis.starting_capital, 0.0);
        assert!(kpis.roc_per_annum_post_tax.is_nan());
    }

    #[test]
    fn test_labels_in_report_order() {
        let kpis = calculate_portfolio_kpis(&[]);
        let labels: Vec<&str> = kpis.labelled().iter().map(|(l, _)| *l).collect();
        assert_eq!(labels[0], "Starting capital");
        assert_eq!(labels[4], "ROC per annum post-tax");
    }
}
