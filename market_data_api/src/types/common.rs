use serde::{Deserialize, Serialize};

/// Error object Yahoo embeds next to (or instead of) a `result` array.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ApiErrorBody {
    pub code: String,
    pub description: String,
}

/// A formatted number as Yahoo's quoteSummary endpoints send it:
/// `{"raw": 0.0712, "fmt": "7.12%"}`. An empty object `{}` means "no value".
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct RawValue {
    #[serde(default)]
    pub raw: Option<f64>,
    #[serde(default)]
    pub fmt: Option<String>,
}

impl RawValue {
    pub fn value(&self) -> Option<f64> {
        self.raw
    }
}
