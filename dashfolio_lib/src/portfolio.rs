//! Typed portfolio holdings extracted from the normalized table.

use chrono::NaiveDate;
use serde::Serialize;

use crate::normalize::NormalizedTable;
use crate::schema::{epoch_sentinel, SchemaError, Value};

/// Asset type of the cash pseudo-holding.
pub const CASH_ASSET_TYPE: &str = "cash";

/// Columns the KPI calculation reads. Every other schema field is carried
/// along in [`PortfolioRow::extra`].
pub const KNOWN_FIELDS: &[&str] = &[
    "ticker",
    "asset_type",
    "holdings",
    "entry_price",
    "entry_date",
    "entry_cost",
    "annual_cost",
    "exit_cost_fixed_fee",
    "exit_cost_pct",
    "dividends_received",
    "dividends_costs",
];

/// One investor holding.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PortfolioRow {
    pub ticker: String,
    pub asset_type: String,
    pub holdings: f64,
    pub entry_price: f64,
    pub entry_date: NaiveDate,
    pub entry_cost: f64,
    pub annual_cost: f64,
    pub exit_cost_fixed_fee: f64,
    pub exit_cost_pct: f64,
    pub dividends_received: f64,
    pub dividends_costs: f64,
    /// Schema fields outside [`KNOWN_FIELDS`], in schema order.
    #[serde(skip)]
    pub extra: Vec<(String, Value)>,
}

impl PortfolioRow {
    pub fn is_cash(&self) -> bool {
        self.asset_type == CASH_ASSET_TYPE
    }

    /// Reads every row of `table`.
    ///
    /// The ticker column must exist. Other known columns the schema leaves
    /// out read as their type default (0.0, "na" or 1900-01-01).
    pub fn from_table(table: &NormalizedTable) -> Result<Vec<Self>, SchemaError> {
        if table.column_index("ticker").is_none() {
            return Err(SchemaError::UndeclaredField("ticker".to_string()));
        }
        let extra_cols: Vec<(usize, &String)> = table
            .columns()
            .iter()
            .enumerate()
            .filter(|(_, name)| !KNOWN_FIELDS.contains(&name.as_str()))
            .collect();

        let rows = (0..table.len())
            .map(|i| {
                let text = |name: &str| {
                    table
                        .get(i, name)
                        .map(|v| match v {
                            Value::Str(s) => s.clone(),
                            other => other.to_string(),
                        })
                        .unwrap_or_else(|| "na".to_string())
                };
                let number = |name: &str| table.get(i, name).map(Value::as_f64).unwrap_or(0.0);
                Self {
                    ticker: text("ticker"),
                    asset_type: text("asset_type"),
                    holdings: number("holdings"),
                    entry_price: number("entry_price"),
                    entry_date: table
                        .get(i, "entry_date")
                        .and_then(Value::as_date)
                        .unwrap_or_else(epoch_sentinel),
                    entry_cost: number("entry_cost"),
                    annual_cost: number("annual_cost"),
                    exit_cost_fixed_fee: number("exit_cost_fixed_fee"),
                    exit_cost_pct: number("exit_cost_pct"),
                    dividends_received: number("dividends_received"),
                    dividends_costs: number("dividends_costs"),
                    extra: extra_cols
                        .iter()
                        .map(|(col, name)| ((*name).clone(), table.rows()[i][*col].clone()))
                        .collect(),
                }
            })
            .collect();
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::{normalize, RawTable};
    use crate::schema::{FieldSpec, FieldType, Schema};

    fn field(field_type: FieldType) -> FieldSpec {
        FieldSpec {
            required: true,
            field_type,
            format: None,
            description: String::new(),
        }
    }

    #[test]
    fn test_rows_read_known_and_extra_fields() {
        let schema = Schema::new(vec![
            ("ticker".to_string(), field(FieldType::String)),
            ("asset_type".to_string(), field(FieldType::String)),
            ("holdings".to_string(), field(FieldType::Float)),
            ("entry_price".to_string(), field(FieldType::Float)),
            ("entry_date".to_string(), field(FieldType::Datetime)),
            ("broker".to_string(), field(FieldType::String)),
        ]);
        let raw = RawTable {
            headers: vec![
                "ticker".to_string(),
                "asset_type".to_string(),
                "holdings".to_string(),
                "entry_price".to_string(),
                "entry_date".to_string(),
                "broker".to_string(),
            ],
            rows: vec![vec![
                "aapl".to_string(),
                "Stock".to_string(),
                "10".to_string(),
                "100".to_string(),
                "2023-01-02".to_string(),
                "Degiro".to_string(),
            ]],
        };
        let table = normalize(&raw, &schema).unwrap().table;
        let rows = PortfolioRow::from_table(&table).unwrap();
        assert_eq!(rows.len(), 1);
        let row = &rows[0];
        assert_eq!(row.ticker, "AAPL");
        assert_eq!(row.asset_type, "stock");
        assert_eq!(row.holdings, 10.0);
        assert_eq!(row.entry_date, NaiveDate::from_ymd_opt(2023, 1, 2).unwrap());
        assert_eq!(row.exit_cost_pct, 0.0);
        assert_eq!(
            row.extra,
            vec![("broker".to_string(), Value::Str("degiro".to_string()))]
        );
        assert!(!row.is_cash());
    }

    #[test]
    fn test_ticker_column_required() {
        let schema = Schema::new(vec![("holdings".to_string(), field(FieldType::Float))]);
        let raw = RawTable {
            headers: vec!["holdings".to_string()],
            rows: vec![vec!["1".to_string()]],
        };
        let table = normalize(&raw, &schema).unwrap().table;
        assert_eq!(
            PortfolioRow::from_table(&table),
            Err(SchemaError::UndeclaredField("ticker".to_string()))
        );
    }
}
