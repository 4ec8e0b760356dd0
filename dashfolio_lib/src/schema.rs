//! Declarative portfolio table schema and per-field type coercion.
//!
//! The schema is an ordered mapping of field name to [`FieldSpec`], loaded
//! from the `portfolio_file.schema_fields` section of the YAML config.
//! Declaration order is kept because it drives the column order of the
//! normalized table.

use std::fmt;

use chrono::{NaiveDate, NaiveDateTime};
use serde::de::{MapAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

/// Date stamped into datetime fields that are absent from the input.
pub fn epoch_sentinel() -> NaiveDate {
    NaiveDate::from_ymd_opt(1900, 1, 1).unwrap_or(NaiveDate::MIN)
}

/// Format assumed for datetime fields that declare none.
pub const DEFAULT_DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Error, Debug, PartialEq)]
pub enum SchemaError {
    #[error("Required fields missing from the portfolio table: {}", .0.join(", "))]
    MissingRequired(Vec<String>),
    #[error("Row {row}, field '{field}': cannot read {value:?} as {expected}: {reason}")]
    InvalidValue {
        row: usize,
        field: String,
        value: String,
        expected: FieldType,
        reason: String,
    },
    #[error("Schema does not declare the '{0}' field")]
    UndeclaredField(String),
    #[error("Portfolio table has no header row")]
    EmptyTable,
}

/// Column type declared in the schema.
#[derive(Deserialize, Serialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    String,
    Datetime,
    Float,
    Integer,
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::String => "string",
            Self::Datetime => "datetime",
            Self::Float => "float",
            Self::Integer => "integer",
        };
        write!(f, "{}", s)
    }
}

/// A typed cell of the normalized table.
#[derive(Serialize, Clone, Debug, PartialEq)]
#[serde(untagged)]
pub enum Value {
    Str(String),
    Date(NaiveDate),
    Float(f64),
    Int(i64),
}

impl Value {
    /// Numeric view of the cell; NaN for non-numeric cells.
    pub fn as_f64(&self) -> f64 {
        match self {
            Self::Float(v) => *v,
            Self::Int(v) => *v as f64,
            _ => f64::NAN,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            Self::Date(d) => Some(*d),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Str(s) => write!(f, "{}", s),
            Self::Date(d) => write!(f, "{}", d.format(DEFAULT_DATE_FORMAT)),
            Self::Float(v) => write!(f, "{}", v),
            Self::Int(v) => write!(f, "{}", v),
        }
    }
}

impl FieldType {
    /// Value filled in when the field is absent or the cell is blank.
    pub fn default_value(self) -> Value {
        match self {
            Self::String => Value::Str("na".to_string()),
            Self::Datetime => Value::Date(epoch_sentinel()),
            Self::Float => Value::Float(0.0),
            Self::Integer => Value::Int(0),
        }
    }

    /// Coerces one raw cell. Blank cells take the default.
    ///
    /// Strings are lowercased. Datetimes are parsed with `format`, accepting a
    /// trailing time component when the format carries one.
    pub fn parse(self, raw: &str, format: Option<&str>) -> Result<Value, String> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Ok(self.default_value());
        }
        match self {
            Self::String => Ok(Value::Str(raw.to_lowercase())),
            Self::Datetime => {
                let format = format.unwrap_or(DEFAULT_DATE_FORMAT);
                NaiveDate::parse_from_str(raw, format)
                    .or_else(|_| NaiveDateTime::parse_from_str(raw, format).map(|dt| dt.date()))
                    .map(Value::Date)
                    .map_err(|e| format!("expected format {}: {}", format, e))
            }
            Self::Float => raw
                .parse::<f64>()
                .map(Value::Float)
                .map_err(|e| e.to_string()),
            Self::Integer => match raw.parse::<i64>() {
                Ok(v) => Ok(Value::Int(v)),
                Err(e) => raw
                    .parse::<f64>()
                    .ok()
                    .filter(|v| v.is_finite())
                    .map(|v| Value::Int(v.trunc() as i64))
                    .ok_or_else(|| e.to_string()),
            },
        }
    }
}

/// One field of the schema.
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
pub struct FieldSpec {
    #[serde(default)]
    pub required: bool,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    #[serde(default)]
    pub format: Option<String>,
    #[serde(default)]
    pub description: String,
}

/// Ordered field name to [`FieldSpec`] mapping. Names are lowercase.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Schema {
    fields: Vec<(String, FieldSpec)>,
}

impl Schema {
    pub fn new(fields: Vec<(String, FieldSpec)>) -> Self {
        Self {
            fields: fields
                .into_iter()
                .map(|(name, spec)| (name.trim().to_lowercase(), spec))
                .collect(),
        }
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &FieldSpec)> {
        self.fields.iter().map(|(name, spec)| (name.as_str(), spec))
    }

    pub fn field_names(&self) -> Vec<&str> {
        self.fields.iter().map(|(name, _)| name.as_str()).collect()
    }

    pub fn get(&self, name: &str) -> Option<&FieldSpec> {
        self.fields
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, spec)| spec)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl<'de> Deserialize<'de> for Schema {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct SchemaVisitor;

        impl<'de> Visitor<'de> for SchemaVisitor {
            type Value = Schema;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a mapping of field name to field spec")
            }

            fn visit_map<A>(self, mut map: A) -> Result<Schema, A::Error>
            where
                A: MapAccess<'de>,
            {
                let mut fields: Vec<(String, FieldSpec)> = Vec::new();
                while let Some((name, spec)) = map.next_entry::<String, FieldSpec>()? {
                    let name = name.trim().to_lowercase();
                    if fields.iter().any(|(n, _)| *n == name) {
                        return Err(serde::de::Error::custom(format!(
                            "duplicate schema field '{}'",
                            name
                        )));
                    }
                    fields.push((name, spec));
                }
                Ok(Schema { fields })
            }
        }

        deserializer.deserialize_map(SchemaVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const YAML: &str = r#"
ticker:
  required: true
  type: string
  description: "Asset symbol"
entry_date:
  required: true
  type: datetime
  format: "%d/%m/%Y"
  description: "Purchase date"
Holdings:
  required: true
  type: float
  description: "Units held"
lot_count:
  type: integer
  description: "Number of purchase lots"
"#;

    #[test]
    fn test_schema_keeps_declaration_order() {
        let schema: Schema = serde_yml::from_str(YAML).unwrap();
        assert_eq!(
            schema.field_names(),
            vec!["ticker", "entry_date", "holdings", "lot_count"]
        );
        assert!(!schema.get("lot_count").unwrap().required);
        assert_eq!(
            schema.get("entry_date").unwrap().format.as_deref(),
            Some("%d/%m/%Y")
        );
    }

    #[test]
    fn test_duplicate_field_rejected() {
        let yaml = "ticker: {type: string}\nTICKER: {type: string}\n";
        let result: Result<Schema, _> = serde_yml::from_str(yaml);
        assert!(result.is_err());
    }

    #[test]
    fn test_defaults_per_type() {
        assert_eq!(FieldType::String.default_value(), Value::Str("na".to_string()));
        assert_eq!(FieldType::Datetime.default_value(), Value::Date(epoch_sentinel()));
        assert_eq!(FieldType::Float.default_value(), Value::Float(0.0));
        assert_eq!(FieldType::Integer.default_value(), Value::Int(0));
    }

    #[test]
    fn test_parse_string_lowercases() {
        assert_eq!(
            FieldType::String.parse("  ETF ", None).unwrap(),
            Value::Str("etf".to_string())
        );
    }

    #[test]
    fn test_parse_datetime_with_format() {
        let v = FieldType::Datetime.parse("26/02/2020", Some("%d/%m/%Y")).unwrap();
        assert_eq!(v, Value::Date(NaiveDate::from_ymd_opt(2020, 2, 26).unwrap()));

        let v = FieldType::Datetime
            .parse("2020-02-26 10:30:00", Some("%Y-%m-%d %H:%M:%S"))
            .unwrap();
        assert_eq!(v.as_date(), NaiveDate::from_ymd_opt(2020, 2, 26));

        assert!(FieldType::Datetime.parse("2020-02-26", Some("%d/%m/%Y")).is_err());
    }

    #[test]
    fn test_parse_numbers() {
        assert_eq!(FieldType::Float.parse("12.5", None).unwrap(), Value::Float(12.5));
        assert_eq!(FieldType::Integer.parse("7", None).unwrap(), Value::Int(7));
        assert_eq!(FieldType::Integer.parse("7.9", None).unwrap(), Value::Int(7));
        assert!(FieldType::Float.parse("twelve", None).is_err());
        assert!(FieldType::Integer.parse("NaN", None).is_err());
    }

    #[test]
    fn test_blank_cell_takes_default() {
        assert_eq!(FieldType::Float.parse("   ", None).unwrap(), Value::Float(0.0));
        assert_eq!(
            FieldType::Datetime.parse("", Some("%d/%m/%Y")).unwrap(),
            Value::Date(epoch_sentinel())
        );
    }

    #[test]
    fn test_missing_required_message_lists_all() {
        let err = SchemaError::MissingRequired(vec!["ticker".to_string(), "holdings".to_string()]);
        assert_eq!(
            err.to_string(),
            "Required fields missing from the portfolio table: ticker, holdings"
        );
    }
}
