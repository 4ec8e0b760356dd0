//! Schema validation and coercion of the raw portfolio table.

use std::io::Read;

use serde::Serialize;

use crate::schema::{FieldType, Schema, SchemaError, Value};

/// The portfolio table as read from CSV or a spreadsheet: a header row and
/// string cells. Rows may be shorter than the header (spreadsheet APIs drop
/// trailing blanks); missing cells read as blank.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl RawTable {
    /// Builds a table from a grid whose first row holds the headers. Cells
    /// are trimmed.
    pub fn from_values(values: Vec<Vec<String>>) -> Result<Self, SchemaError> {
        let mut iter = values.into_iter();
        let headers = iter.next().ok_or(SchemaError::EmptyTable)?;
        Ok(Self {
            headers: headers.into_iter().map(|h| h.trim().to_string()).collect(),
            rows: iter
                .map(|row| row.into_iter().map(|c| c.trim().to_string()).collect())
                .collect(),
        })
    }

    pub fn from_csv_reader<R: Read>(reader: R) -> Result<Self, csv::Error> {
        let mut rdr = csv::ReaderBuilder::new()
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(reader);
        let headers = rdr.headers()?.iter().map(str::to_string).collect();
        let mut rows = Vec::new();
        for record in rdr.records() {
            let record = record?;
            rows.push(record.iter().map(str::to_string).collect());
        }
        Ok(Self { headers, rows })
    }

    fn cell(&self, row: usize, col: usize) -> &str {
        self.rows
            .get(row)
            .and_then(|r| r.get(col))
            .map(String::as_str)
            .unwrap_or("")
    }
}

/// A table whose columns are exactly the schema's fields, in schema order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct NormalizedTable {
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
}

impl NormalizedTable {
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn get(&self, row: usize, name: &str) -> Option<&Value> {
        let col = self.column_index(name)?;
        self.rows.get(row).and_then(|r| r.get(col))
    }
}

/// An optional schema field the input did not provide.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MissingOptionalField {
    pub field: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Normalized {
    pub table: NormalizedTable,
    pub warnings: Vec<MissingOptionalField>,
}

/// Validates `raw` against `schema` and coerces every cell.
///
/// Fails listing every missing required field at once. Absent optional
/// fields are filled with their type default and reported as warnings.
/// A blank cell takes the type default too, except in a required float
/// field, where it reads as NaN so the holding stays unresolved.
/// Input columns the schema does not declare are dropped. The ticker column
/// is uppercased.
pub fn normalize(raw: &RawTable, schema: &Schema) -> Result<Normalized, SchemaError> {
    let headers: Vec<String> = raw.headers.iter().map(|h| h.trim().to_lowercase()).collect();
    let source_col = |name: &str| headers.iter().position(|h| h == name);

    let missing: Vec<String> = schema
        .fields()
        .filter(|(name, spec)| spec.required && source_col(name).is_none())
        .map(|(name, _)| name.to_string())
        .collect();
    if !missing.is_empty() {
        return Err(SchemaError::MissingRequired(missing));
    }

    let mut warnings = Vec::new();
    for (name, spec) in schema.fields() {
        if !spec.required && source_col(name).is_none() {
            tracing::warn!(
                "The optional field {} is not available in the portfolio table. Field description: {}",
                name,
                spec.description
            );
            warnings.push(MissingOptionalField {
                field: name.to_string(),
                description: spec.description.clone(),
            });
        }
    }

    let plan: Vec<_> = schema
        .fields()
        .map(|(name, spec)| (name, spec, source_col(name)))
        .collect();

    let mut rows = Vec::with_capacity(raw.rows.len());
    for row_idx in 0..raw.rows.len() {
        let mut out = Vec::with_capacity(plan.len());
        for (name, spec, col) in &plan {
            let value = match col {
                None => spec.field_type.default_value(),
                Some(col)
                    if spec.required
                        && spec.field_type == FieldType::Float
                        && raw.cell(row_idx, *col).trim().is_empty() =>
                {
                    Value::Float(f64::NAN)
                }
                Some(col) => {
                    let cell = raw.cell(row_idx, *col);
                    spec.field_type
                        .parse(cell, spec.format.as_deref())
                        .map_err(|reason| SchemaError::InvalidValue {
                            row: row_idx + 1,
                            field: name.to_string(),
                            value: cell.to_string(),
                            expected: spec.field_type,
                            reason,
                        })?
                }
            };
            let value = match (*name, value) {
                ("ticker", Value::Str(s)) => Value::Str(s.to_uppercase()),
                (_, v) => v,
            };
            out.push(value);
        }
        rows.push(out);
    }

    Ok(Normalized {
        table: NormalizedTable {
            columns: schema.field_names().into_iter().map(str::to_string).collect(),
            rows,
        },
        warnings,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{FieldSpec, FieldType};
    use chrono::NaiveDate;

    fn spec(required: bool, field_type: FieldType) -> FieldSpec {
        FieldSpec {
            required,
            field_type,
            format: None,
            description: String::new(),
        }
    }

    fn schema() -> Schema {
        Schema::new(vec![
            ("ticker".to_string(), spec(true, FieldType::String)),
            ("asset_type".to_string(), spec(true, FieldType::String)),
            ("holdings".to_string(), spec(true, FieldType::Float)),
            (
                "entry_date".to_string(),
                FieldSpec {
                    format: Some("%d/%m/%Y".to_string()),
                    ..spec(true, FieldType::Datetime)
                },
            ),
            (
                "dividends_received".to_string(),
                FieldSpec {
                    description: "Cash dividends collected".to_string(),
                    ..spec(false, FieldType::Float)
                },
            ),
            ("lots".to_string(), spec(false, FieldType::Integer)),
        ])
    }

    fn raw(headers: &[&str], rows: &[&[&str]]) -> RawTable {
        RawTable {
            headers: headers.iter().map(|s| s.to_string()).collect(),
            rows: rows
                .iter()
                .map(|r| r.iter().map(|s| s.to_string()).collect())
                .collect(),
        }
    }

    #[test]
    fn test_output_columns_match_schema() {
        let table = raw(
            &["Ticker", "ASSET_TYPE", "Holdings", "Entry_Date", "Notes"],
            &[&["vwce.de", "ETF", "12.5", "26/02/2020", "core"]],
        );
        let out = normalize(&table, &schema()).unwrap();
        assert_eq!(
            out.table.columns(),
            &["ticker", "asset_type", "holdings", "entry_date", "dividends_received", "lots"]
        );
        assert_eq!(out.table.get(0, "ticker"), Some(&Value::Str("VWCE.DE".to_string())));
        assert_eq!(out.table.get(0, "asset_type"), Some(&Value::Str("etf".to_string())));
        assert_eq!(out.table.get(0, "holdings"), Some(&Value::Float(12.5)));
        assert_eq!(
            out.table.get(0, "entry_date").and_then(Value::as_date),
            NaiveDate::from_ymd_opt(2020, 2, 26)
        );
        assert_eq!(out.table.get(0, "dividends_received"), Some(&Value::Float(0.0)));
        assert_eq!(out.table.get(0, "lots"), Some(&Value::Int(0)));
        assert!(out.table.get(0, "notes").is_none());
    }

    #[test]
    fn test_missing_optional_fields_warn() {
        let table = raw(
            &["ticker", "asset_type", "holdings", "entry_date"],
            &[&["AAPL", "stock", "1", "01/01/2021"]],
        );
        let out = normalize(&table, &schema()).unwrap();
        assert_eq!(out.warnings.len(), 2);
        assert_eq!(out.warnings[0].field, "dividends_received");
        assert_eq!(out.warnings[0].description, "Cash dividends collected");
        assert_eq!(out.warnings[1].field, "lots");
    }

    #[test]
    fn test_missing_required_fields_listed_together() {
        let table = raw(&["ticker", "notes"], &[&["AAPL", "x"]]);
        let err = normalize(&table, &schema()).unwrap_err();
        assert_eq!(
            err,
            SchemaError::MissingRequired(vec![
                "asset_type".to_string(),
                "holdings".to_string(),
                "entry_date".to_string(),
            ])
        );
    }

    #[test]
    fn test_invalid_cell_reports_row_and_field() {
        let table = raw(
            &["ticker", "asset_type", "holdings", "entry_date"],
            &[
                &["AAPL", "stock", "1", "01/01/2021"],
                &["MSFT", "stock", "lots", "01/01/2021"],
            ],
        );
        match normalize(&table, &schema()).unwrap_err() {
            SchemaError::InvalidValue { row, field, value, .. } => {
                assert_eq!(row, 2);
                assert_eq!(field, "holdings");
                assert_eq!(value, "lots");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_short_rows_read_as_blank() {
        let table = raw(
            &["ticker", "asset_type", "holdings", "entry_date", "dividends_received"],
            &[&["CASH", "cash", "5000"]],
        );
        let out = normalize(&table, &schema()).unwrap();
        assert_eq!(out.table.get(0, "dividends_received"), Some(&Value::Float(0.0)));
        assert_eq!(
            out.table.get(0, "entry_date").and_then(Value::as_date),
            Some(crate::schema::epoch_sentinel())
        );
    }

    #[test]
    fn test_blank_required_float_is_unresolved() {
        let table = raw(
            &["ticker", "asset_type", "holdings", "entry_date", "dividends_received"],
            &[&["AAPL", "stock", " ", "01/01/2021", ""]],
        );
        let out = normalize(&table, &schema()).unwrap();
        assert!(out.table.get(0, "holdings").unwrap().as_f64().is_nan());
        assert_eq!(out.table.get(0, "dividends_received"), Some(&Value::Float(0.0)));
    }

    #[test]
    fn test_from_values_uses_first_row_as_header() {
        let values = vec![
            vec!["ticker ".to_string(), "holdings".to_string()],
            vec![" AAPL".to_string(), "3 ".to_string()],
        ];
        let table = RawTable::from_values(values).unwrap();
        assert_eq!(table.headers, vec!["ticker", "holdings"]);
        assert_eq!(table.rows, vec![vec!["AAPL".to_string(), "3".to_string()]]);
        assert_eq!(RawTable::from_values(vec![]), Err(SchemaError::EmptyTable));
    }

    #[test]
    fn test_from_csv_reader() {
        let csv = "ticker,asset_type,holdings\nAAPL, stock ,10\nCASH,cash\n";
        let table = RawTable::from_csv_reader(csv.as_bytes()).unwrap();
        assert_eq!(table.headers, vec!["ticker", "asset_type", "holdings"]);
        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.rows[0][1], "stock");
        assert_eq!(table.rows[1].len(), 2);
    }
}
